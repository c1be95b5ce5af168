//! PostgreSQL source connector implementation.
//!
//! Uses deadpool-postgres for connection pooling. Catalog queries read
//! information_schema and pg_catalog; data pages use `LIMIT .. OFFSET`.

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio_postgres::{Config as PgConfig, Row};
use tracing::{debug, info, warn};

use super::PostgresSettings;
use crate::core::identifier::Quoting;
use crate::core::schema::{
    ColumnDescriptor, ColumnStats, ForeignKeyRef, IndexInfo, PrimaryKey, TableSchema,
};
use crate::core::traits::{AggregateFn, SourceConnector};
use crate::core::value::{Page, SqlValue};
use crate::dialect::{postgres_to_canonical, CanonicalType};
use crate::drivers::common::{
    is_comparable, join_comment, measures_length, parse_settings, RawColumn, SampleCounts,
};
use crate::error::{MigrateError, Result};

const ENGINE: &str = "postgres";

/// Schema extracted when the configuration names none.
const DEFAULT_SCHEMA: &str = "public";

/// PostgreSQL implementation of [`SourceConnector`].
pub struct PostgresSource {
    settings: PostgresSettings,
    pool: Option<Pool>,
}

impl PostgresSource {
    pub fn new(settings: PostgresSettings) -> Self {
        Self {
            settings,
            pool: None,
        }
    }

    /// Build from the `postgres:` configuration sub-document. Does not connect.
    pub fn from_settings(value: &serde_yaml::Value) -> Result<Self> {
        Ok(Self::new(parse_settings(ENGINE, value)?))
    }

    async fn client(&self) -> Result<Object> {
        let pool = self
            .pool
            .as_ref()
            .ok_or_else(|| MigrateError::connection(ENGINE, "not connected"))?;
        pool.get()
            .await
            .map_err(|e| MigrateError::pool(e, "getting PostgreSQL source connection"))
    }

    fn qualify(schema: &str, table: &str) -> Result<String> {
        Quoting::Postgres.qualify(schema, table)
    }

    async fn sample_counts(
        &self,
        schema: &str,
        table: &str,
        column: &ColumnDescriptor,
        sample_rows: u64,
    ) -> Result<SampleCounts> {
        let col = Quoting::Postgres.quote(&column.name)?;
        let comparable = is_comparable(column.canonical_type);
        let distinct = if comparable {
            format!("COUNT(DISTINCT {})::int8", col)
        } else {
            "NULL::int8".to_string()
        };
        let (min, max) = if comparable {
            (format!("MIN({})::text", col), format!("MAX({})::text", col))
        } else {
            ("NULL::text".to_string(), "NULL::text".to_string())
        };
        let max_len = if measures_length(column.canonical_type) {
            format!("MAX(LENGTH({}))::int8", col)
        } else {
            "NULL::int8".to_string()
        };

        let sql = format!(
            "SELECT COUNT(*)::int8, (COUNT(*) - COUNT({c}))::int8, {distinct}, {min}, {max}, {max_len} \
             FROM (SELECT {c} FROM {t} LIMIT {n}) AS sample",
            c = col,
            t = Self::qualify(schema, table)?,
            n = sample_rows,
        );

        let client = self.client().await?;
        let row = client.query_one(sql.as_str(), &[]).await?;
        Ok(SampleCounts {
            total: row.try_get::<_, i64>(0)?,
            nulls: row.try_get::<_, i64>(1)?,
            distinct: row.try_get(2)?,
            min: row.try_get(3)?,
            max: row.try_get(4)?,
            max_len: row.try_get(5)?,
        })
    }

    /// Rows of a single-column text query.
    async fn names(&self, sql: &str, schema: &str) -> Result<Vec<String>> {
        let client = self.client().await?;
        let rows = client.query(sql, &[&schema]).await?;
        rows.iter().map(|r| Ok(r.try_get::<_, String>(0)?)).collect()
    }
}

/// Apply PostgreSQL specific refinements on top of the lookup table.
///
/// `udt_name` is more precise than `data_type` for a few types: json and
/// jsonb always map to JSON, bool to BOOL, uuid to TEXT.
fn describe_column(
    mut raw: RawColumn,
    udt_name: &str,
    identity: bool,
) -> ColumnDescriptor {
    let canonical = match udt_name {
        "json" | "jsonb" => CanonicalType::Json,
        "bool" => CanonicalType::Bool,
        "uuid" => CanonicalType::Text,
        _ => postgres_to_canonical(&raw.data_type),
    };

    if !matches!(canonical, CanonicalType::Decimal) {
        raw.precision = 0;
        raw.scale = 0;
    }

    let serial = raw
        .default
        .as_deref()
        .is_some_and(|d| d.starts_with("nextval("));
    raw.comment = join_comment(&[
        raw.comment.as_deref(),
        serial.then_some("SERIAL"),
        identity.then_some("IDENTITY"),
    ]);
    raw.into_descriptor(canonical)
}

/// Types [`convert_pg_value`] reads natively. Anything else is cast to text
/// in the SELECT list.
fn is_native_type(type_name: &str) -> bool {
    matches!(
        type_name,
        "bool"
            | "int2"
            | "int4"
            | "int8"
            | "float4"
            | "float8"
            | "numeric"
            | "text"
            | "varchar"
            | "bpchar"
            | "name"
            | "bytea"
            | "uuid"
            | "timestamp"
            | "timestamptz"
            | "date"
            | "time"
            | "json"
            | "jsonb"
    )
}

/// Convert a PostgreSQL row value to SqlValue.
fn convert_pg_value(row: &Row, idx: usize) -> Result<SqlValue> {
    let type_name = row.columns()[idx].type_().name().to_string();

    let value: SqlValue = match type_name.as_str() {
        "bool" => row.try_get::<_, Option<bool>>(idx)?.into(),
        "int2" => row.try_get::<_, Option<i16>>(idx)?.map(SqlValue::I16).into(),
        "int4" => row.try_get::<_, Option<i32>>(idx)?.into(),
        "int8" => row.try_get::<_, Option<i64>>(idx)?.into(),
        "float4" => row.try_get::<_, Option<f32>>(idx)?.map(SqlValue::F32).into(),
        "float8" => row.try_get::<_, Option<f64>>(idx)?.into(),
        "numeric" => row
            .try_get::<_, Option<rust_decimal::Decimal>>(idx)?
            .map(SqlValue::Decimal)
            .into(),
        "uuid" => row.try_get::<_, Option<uuid::Uuid>>(idx)?.map(SqlValue::Uuid).into(),
        "timestamp" => row
            .try_get::<_, Option<chrono::NaiveDateTime>>(idx)?
            .map(SqlValue::DateTime)
            .into(),
        "timestamptz" => row
            .try_get::<_, Option<chrono::DateTime<chrono::FixedOffset>>>(idx)?
            .map(SqlValue::DateTimeOffset)
            .into(),
        "date" => row
            .try_get::<_, Option<chrono::NaiveDate>>(idx)?
            .map(SqlValue::Date)
            .into(),
        "time" => row
            .try_get::<_, Option<chrono::NaiveTime>>(idx)?
            .map(SqlValue::Time)
            .into(),
        "bytea" => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(SqlValue::Bytes).into(),
        "json" | "jsonb" => row
            .try_get::<_, Option<serde_json::Value>>(idx)?
            .map(SqlValue::Json)
            .into(),
        _ => match row.try_get::<_, Option<String>>(idx) {
            Ok(v) => v.into(),
            Err(e) => {
                debug!("Unreadable {} value read as NULL: {}", type_name, e);
                SqlValue::Null
            }
        },
    };
    Ok(value)
}

fn convert_row(row: &Row) -> Result<Vec<SqlValue>> {
    (0..row.len()).map(|idx| convert_pg_value(row, idx)).collect()
}

#[async_trait]
impl SourceConnector for PostgresSource {
    fn engine(&self) -> &str {
        ENGINE
    }

    async fn connect(&mut self) -> Result<()> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&self.settings.host);
        pg_config.port(self.settings.port);
        pg_config.dbname(&self.settings.database);
        pg_config.user(&self.settings.user);
        pg_config.password(&self.settings.password);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let mgr = match self.settings.ssl_mode.connector()? {
            Some(tls) => Manager::from_config(pg_config, tls, mgr_config),
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config)
            }
        };
        let pool = Pool::builder(mgr)
            .max_size(self.settings.pool_size.max(1))
            .build()
            .map_err(|e| MigrateError::connection(ENGINE, e))?;

        let client = pool
            .get()
            .await
            .map_err(|e| MigrateError::connection(ENGINE, e))?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| MigrateError::connection(ENGINE, e))?;
        drop(client);

        info!(
            "Connected to PostgreSQL source: {}:{}/{}",
            self.settings.host, self.settings.port, self.settings.database
        );
        self.pool = Some(pool);
        Ok(())
    }

    async fn list_tables(&self, schemas: &[String]) -> Result<Vec<TableSchema>> {
        let default = [DEFAULT_SCHEMA.to_string()];
        let schemas = if schemas.is_empty() { &default[..] } else { schemas };

        let query = r#"
            SELECT
                t.table_schema::text,
                t.table_name::text,
                t.table_type::text,
                obj_description(format('%I.%I', t.table_schema, t.table_name)::regclass, 'pg_class')
            FROM information_schema.tables t
            WHERE t.table_type = 'BASE TABLE'
              AND t.table_schema = $1::text
            ORDER BY t.table_name
        "#;

        let client = self.client().await?;
        let mut tables = Vec::new();
        for schema in schemas {
            let rows = client.query(query, &[schema]).await?;
            for row in rows {
                let mut table =
                    TableSchema::new(row.try_get::<_, String>(0)?, row.try_get::<_, String>(1)?);
                table.table_kind = row.try_get(2)?;
                table.comment = row.try_get(3)?;
                tables.push(table);
            }
        }
        debug!("PostgreSQL: listed {} tables", tables.len());
        Ok(tables)
    }

    async fn get_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let query = r#"
            SELECT
                c.column_name::text,
                c.data_type::text,
                c.udt_name::text,
                COALESCE(c.character_maximum_length, 0)::int4,
                COALESCE(c.numeric_precision, 0)::int4,
                COALESCE(c.numeric_scale, 0)::int4,
                c.is_nullable = 'YES',
                c.column_default::text,
                c.ordinal_position::int4,
                c.character_set_name::text,
                c.is_identity = 'YES',
                col_description(
                    format('%I.%I', c.table_schema, c.table_name)::regclass,
                    c.ordinal_position::int
                )
            FROM information_schema.columns c
            WHERE c.table_schema = $1::text AND c.table_name = $2::text
            ORDER BY c.ordinal_position
        "#;

        let client = self.client().await?;
        let rows = client.query(query, &[&schema, &table]).await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let udt_name: String = row.try_get(2)?;
            let raw = RawColumn {
                name: row.try_get(0)?,
                data_type: row.try_get(1)?,
                max_length: row.try_get(3)?,
                precision: row.try_get(4)?,
                scale: row.try_get(5)?,
                nullable: row.try_get(6)?,
                default: row.try_get(7)?,
                ordinal: row.try_get(8)?,
                charset: row.try_get(9)?,
                comment: row.try_get(11)?,
            };
            let identity: bool = row.try_get(10)?;
            columns.push(describe_column(raw, &udt_name, identity));
        }

        debug!("Loaded {} columns for {}.{}", columns.len(), schema, table);
        Ok(columns)
    }

    async fn get_primary_keys(&self, schema: &str, table: &str) -> Result<PrimaryKey> {
        let query = r#"
            SELECT a.attname::text
            FROM pg_catalog.pg_constraint c
            JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid
            WHERE n.nspname = $1
              AND t.relname = $2
              AND c.contype = 'p'
              AND a.attnum = ANY(c.conkey)
            ORDER BY array_position(c.conkey, a.attnum)
        "#;

        let client = self.client().await?;
        let rows = client.query(query, &[&schema, &table]).await?;
        let columns = rows
            .iter()
            .map(|r| r.try_get::<_, String>(0))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(PrimaryKey::new(columns))
    }

    async fn get_foreign_keys(&self, schema: &str, table: &str) -> Result<Vec<ForeignKeyRef>> {
        let query = r#"
            SELECT a.attname::text, pn.nspname::text, pt.relname::text, pa.attname::text
            FROM pg_catalog.pg_constraint c
            JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_class pt ON pt.oid = c.confrelid
            JOIN pg_catalog.pg_namespace pn ON pn.oid = pt.relnamespace
            CROSS JOIN LATERAL unnest(c.conkey, c.confkey) WITH ORDINALITY AS k(attnum, fattnum, ord)
            JOIN pg_catalog.pg_attribute a ON a.attrelid = c.conrelid AND a.attnum = k.attnum
            JOIN pg_catalog.pg_attribute pa ON pa.attrelid = c.confrelid AND pa.attnum = k.fattnum
            WHERE c.contype = 'f'
              AND n.nspname = $1
              AND t.relname = $2
            ORDER BY c.conname, k.ord
        "#;

        let client = self.client().await?;
        let rows = client.query(query, &[&schema, &table]).await?;
        let mut fks = Vec::with_capacity(rows.len());
        for row in rows {
            fks.push(ForeignKeyRef {
                column: row.try_get(0)?,
                parent_schema: row.try_get(1)?,
                parent_table: row.try_get(2)?,
                parent_column: row.try_get(3)?,
            });
        }
        Ok(fks)
    }

    async fn get_indexes(&self, schema: &str, table: &str) -> Result<Vec<IndexInfo>> {
        let query = r#"
            SELECT i.relname::text, ix.indisunique, a.attname::text
            FROM pg_catalog.pg_index ix
            JOIN pg_catalog.pg_class t ON t.oid = ix.indrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_class i ON i.oid = ix.indexrelid
            CROSS JOIN LATERAL unnest(ix.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord)
            JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum
            WHERE n.nspname = $1
              AND t.relname = $2
              AND NOT ix.indisprimary
            ORDER BY i.relname, k.ord
        "#;

        let client = self.client().await?;
        let rows = client.query(query, &[&schema, &table]).await?;

        let mut indexes: Vec<IndexInfo> = Vec::new();
        for row in rows {
            let name: String = row.try_get(0)?;
            let unique: bool = row.try_get(1)?;
            let column: String = row.try_get(2)?;
            match indexes.last_mut() {
                Some(idx) if idx.name == name => idx.columns.push(column),
                _ => indexes.push(IndexInfo {
                    name,
                    unique,
                    columns: vec![column],
                }),
            }
        }
        Ok(indexes)
    }

    async fn get_column_stats(
        &self,
        schema: &str,
        table: &str,
        column: &ColumnDescriptor,
        sample_rows: u64,
    ) -> Result<ColumnStats> {
        match self.sample_counts(schema, table, column, sample_rows).await {
            Ok(counts) => Ok(counts.into_stats(&column.name)),
            Err(e) => {
                debug!(
                    "Stats query failed for {}.{}.{}: {}",
                    schema, table, column.name, e
                );
                Ok(ColumnStats::empty(&column.name))
            }
        }
    }

    async fn extract_chunk(
        &self,
        schema: &str,
        table: &str,
        columns: &[String],
        offset: u64,
        limit: u64,
    ) -> Result<Page> {
        let full = format!("{}.{}", schema, table);
        let qualified = Self::qualify(schema, table)?;
        let build = |cast: &[bool]| -> Result<String> {
            let mut select = Vec::with_capacity(columns.len());
            for (i, col) in columns.iter().enumerate() {
                let quoted = Quoting::Postgres.quote(col)?;
                if cast.get(i).copied().unwrap_or(false) {
                    select.push(format!("{}::text AS {}", quoted, quoted));
                } else {
                    select.push(quoted);
                }
            }
            Ok(format!(
                "SELECT {} FROM {} ORDER BY 1 LIMIT {} OFFSET {}",
                select.join(", "),
                qualified,
                limit,
                offset
            ))
        };

        let client = self.client().await?;
        let mut statement = client
            .prepare(&build(&[])?)
            .await
            .map_err(|e| MigrateError::extraction(&full, e))?;

        let cast: Vec<bool> = statement
            .columns()
            .iter()
            .map(|c| !is_native_type(c.type_().name()))
            .collect();
        if cast.iter().any(|c| *c) {
            statement = client
                .prepare(&build(&cast)?)
                .await
                .map_err(|e| MigrateError::extraction(&full, e))?;
        }

        let rows = client
            .query(&statement, &[])
            .await
            .map_err(|e| MigrateError::extraction(&full, e))?;

        let mut page = Page::new(columns.to_vec());
        page.rows.reserve(rows.len());
        for row in &rows {
            page.rows
                .push(convert_row(row).map_err(|e| MigrateError::extraction(&full, e))?);
        }
        debug!("PostgreSQL {}: read {} rows at offset {}", full, page.len(), offset);
        Ok(page)
    }

    async fn run_aggregate(
        &self,
        schema: &str,
        table: &str,
        column: &str,
        func: AggregateFn,
    ) -> Result<SqlValue> {
        let col = Quoting::Postgres.quote(column)?;
        let sql = format!(
            "SELECT {} FROM {}",
            func.expression(&col),
            Self::qualify(schema, table)?
        );
        let client = self.client().await?;
        let row = client.query_one(sql.as_str(), &[]).await?;
        convert_pg_value(&row, 0)
    }

    async fn get_row_count(&self, schema: &str, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*)::int8 FROM {}", Self::qualify(schema, table)?);
        let client = self.client().await?;
        let row = client.query_one(sql.as_str(), &[]).await?;
        Ok(row.try_get(0)?)
    }

    async fn list_views(&self, schema: &str) -> Result<Vec<String>> {
        self.names(
            "SELECT viewname::text FROM pg_catalog.pg_views WHERE schemaname = $1 ORDER BY viewname",
            schema,
        )
        .await
    }

    async fn get_view_definition(&self, schema: &str, name: &str) -> Result<Option<String>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                "SELECT definition FROM pg_catalog.pg_views WHERE schemaname = $1 AND viewname = $2",
                &[&schema, &name],
            )
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let body: Option<String> = row.try_get(0)?;
        body.map(|body| {
            Ok(format!(
                "CREATE OR REPLACE VIEW {} AS\n{}",
                Self::qualify(schema, name)?,
                body.trim()
            ))
        })
        .transpose()
    }

    /// Routines keyed by signature, e.g. `add(integer, integer)`, so every
    /// overload is captured.
    async fn list_routines(&self, schema: &str) -> Result<Vec<String>> {
        self.names(
            r#"
            SELECT p.proname::text || '(' || pg_catalog.pg_get_function_identity_arguments(p.oid) || ')'
            FROM pg_catalog.pg_proc p
            JOIN pg_catalog.pg_namespace n ON n.oid = p.pronamespace
            WHERE n.nspname = $1 AND p.prokind IN ('f', 'p')
            ORDER BY 1
            "#,
            schema,
        )
        .await
    }

    async fn get_routine_definition(&self, schema: &str, name: &str) -> Result<Option<String>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                r#"
                SELECT pg_catalog.pg_get_functiondef(p.oid)
                FROM pg_catalog.pg_proc p
                JOIN pg_catalog.pg_namespace n ON n.oid = p.pronamespace
                WHERE n.nspname = $1 AND p.prokind IN ('f', 'p')
                  AND p.proname::text || '(' || pg_catalog.pg_get_function_identity_arguments(p.oid) || ')' = $2
                "#,
                &[&schema, &name],
            )
            .await?;
        Ok(row.map(|r| r.try_get(0)).transpose()?)
    }

    async fn list_triggers(&self, schema: &str) -> Result<Vec<(String, String)>> {
        let client = self.client().await?;
        let rows = client
            .query(
                r#"
                SELECT c.relname::text, t.tgname::text
                FROM pg_catalog.pg_trigger t
                JOIN pg_catalog.pg_class c ON c.oid = t.tgrelid
                JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
                WHERE n.nspname = $1 AND NOT t.tgisinternal
                ORDER BY c.relname, t.tgname
                "#,
                &[&schema],
            )
            .await?;
        rows.iter()
            .map(|r| Ok((r.try_get(0)?, r.try_get(1)?)))
            .collect()
    }

    async fn get_trigger_definition(
        &self,
        schema: &str,
        table: &str,
        name: &str,
    ) -> Result<Option<String>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                r#"
                SELECT pg_get_triggerdef(t.oid, true)
                FROM pg_catalog.pg_trigger t
                JOIN pg_catalog.pg_class c ON c.oid = t.tgrelid
                JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
                WHERE n.nspname = $1 AND c.relname = $2 AND t.tgname = $3
                "#,
                &[&schema, &table, &name],
            )
            .await?;
        Ok(row.map(|r| r.try_get(0)).transpose()?)
    }

    async fn close(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.close();
            debug!("Closed PostgreSQL pool");
        }
    }
}
