//! MSSQL source connector implementation.
//!
//! Uses Tiberius with bb8 connection pooling. Catalog queries go through
//! INFORMATION_SCHEMA and the `sys` views; data pages are read with
//! `OFFSET .. FETCH NEXT` ordered by the first selected column.

use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel, FromSql, Query, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info, warn};

use super::MssqlSettings;
use crate::core::identifier::Quoting;
use crate::core::schema::{
    ColumnDescriptor, ColumnStats, ForeignKeyRef, IndexInfo, PrimaryKey, TableSchema,
};
use crate::core::traits::{AggregateFn, SourceConnector};
use crate::core::value::{Page, SqlValue};
use crate::dialect::{mssql_to_canonical, CanonicalType};
use crate::drivers::common::{
    is_comparable, join_comment, measures_length, parse_settings, RawColumn, SampleCounts,
};
use crate::error::{MigrateError, Result};

const ENGINE: &str = "mssql";

/// Schema extracted when the configuration names none.
const DEFAULT_SCHEMA: &str = "dbo";

/// Maximum TDS packet size (32767 bytes, ~32KB).
const TDS_MAX_PACKET_SIZE: u32 = 32767;

/// Connection acquisition timeout from pool (30 seconds).
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Idle connection timeout (5 minutes).
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// TCP keepalive interval (30 seconds).
const TCP_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Connection manager for bb8 pool with Tiberius.
#[derive(Clone)]
struct TiberiusConnectionManager {
    settings: MssqlSettings,
}

impl TiberiusConnectionManager {
    fn build_config(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.settings.host);
        config.port(self.settings.port);
        config.database(&self.settings.database);
        config.authentication(AuthMethod::sql_server(
            &self.settings.user,
            &self.settings.password,
        ));

        if self.settings.encrypt {
            if self.settings.trust_server_cert {
                config.trust_cert();
            }
            config.encryption(EncryptionLevel::Required);
        } else {
            config.encryption(EncryptionLevel::NotSupported);
        }

        config.packet_size(TDS_MAX_PACKET_SIZE);
        config
    }
}

#[async_trait]
impl bb8::ManageConnection for TiberiusConnectionManager {
    type Connection = Client<Compat<TcpStream>>;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let config = self.build_config();
        let tcp = TcpStream::connect(config.get_addr()).await.map_err(|e| {
            tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            }
        })?;
        tcp.set_nodelay(true).ok();

        // Long extractions sit idle between pages; keep NATs from dropping us.
        let std_tcp = tcp.into_std().map_err(|e| tiberius::error::Error::Io {
            kind: e.kind(),
            message: e.to_string(),
        })?;
        let socket = socket2::Socket::from(std_tcp);
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(TCP_KEEPALIVE_INTERVAL)
            .with_interval(TCP_KEEPALIVE_INTERVAL);
        if let Err(e) = socket.set_tcp_keepalive(&keepalive) {
            warn!("Failed to set TCP keepalive on MSSQL connection: {}", e);
        }
        let std_tcp: std::net::TcpStream = socket.into();
        std_tcp.set_nonblocking(true).ok();
        let tcp = TcpStream::from_std(std_tcp).map_err(|e| tiberius::error::Error::Io {
            kind: e.kind(),
            message: format!("Failed to convert socket: {}", e),
        })?;

        Client::connect(config, tcp.compat_write()).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// SQL Server implementation of [`SourceConnector`].
pub struct MssqlSource {
    settings: MssqlSettings,
    pool: Option<Pool<TiberiusConnectionManager>>,
}

impl MssqlSource {
    pub fn new(settings: MssqlSettings) -> Self {
        Self {
            settings,
            pool: None,
        }
    }

    /// Build from the `mssql:` configuration sub-document. Does not connect.
    pub fn from_settings(value: &serde_yaml::Value) -> Result<Self> {
        Ok(Self::new(parse_settings(ENGINE, value)?))
    }

    async fn client(&self) -> Result<PooledConnection<'_, TiberiusConnectionManager>> {
        let pool = self
            .pool
            .as_ref()
            .ok_or_else(|| MigrateError::connection(ENGINE, "not connected"))?;
        pool.get()
            .await
            .map_err(|e| MigrateError::pool(e, "getting MSSQL connection from pool"))
    }

    fn qualify(schema: &str, table: &str) -> Result<String> {
        Quoting::Mssql.qualify(schema, table)
    }

    /// Run a parameterized catalog query bound to `(schema, table)`.
    async fn catalog_rows(&self, sql: &str, schema: &str, table: &str) -> Result<Vec<Row>> {
        let mut client = self.client().await?;
        let mut query = Query::new(sql);
        query.bind(schema);
        query.bind(table);
        let rows = query.query(&mut client).await?.into_first_result().await?;
        Ok(rows)
    }

    async fn sample_counts(
        &self,
        schema: &str,
        table: &str,
        column: &ColumnDescriptor,
        sample_rows: u64,
    ) -> Result<SampleCounts> {
        let col = Quoting::Mssql.quote(&column.name)?;
        let comparable = is_comparable(column.canonical_type);
        let distinct = if comparable {
            format!("CAST(COUNT(DISTINCT {c}) AS BIGINT)", c = col)
        } else {
            "CAST(NULL AS BIGINT)".to_string()
        };
        let (min, max) = if comparable {
            // Style 126 renders temporal values as ISO-8601.
            let style = if column.canonical_type.is_temporal() { ", 126" } else { "" };
            (
                format!("CONVERT(NVARCHAR(4000), MIN({}){})", col, style),
                format!("CONVERT(NVARCHAR(4000), MAX({}){})", col, style),
            )
        } else {
            (
                "CAST(NULL AS NVARCHAR(4000))".to_string(),
                "CAST(NULL AS NVARCHAR(4000))".to_string(),
            )
        };
        let max_len = if measures_length(column.canonical_type) {
            format!("CAST(MAX(LEN({})) AS BIGINT)", col)
        } else {
            "CAST(NULL AS BIGINT)".to_string()
        };

        let sql = format!(
            "SELECT CAST(COUNT(*) AS BIGINT), \
             CAST(SUM(CASE WHEN {c} IS NULL THEN 1 ELSE 0 END) AS BIGINT), \
             {distinct}, {min}, {max}, {max_len} \
             FROM (SELECT TOP ({n}) {c} FROM {t}) AS sample",
            c = col,
            n = sample_rows,
            t = Self::qualify(schema, table)?,
        );

        let mut client = self.client().await?;
        let row = client.simple_query(sql).await?.into_row().await?;
        let Some(row) = row else {
            return Ok(SampleCounts::default());
        };
        Ok(SampleCounts {
            total: row.try_get::<i64, _>(0)?.unwrap_or(0),
            nulls: row.try_get::<i64, _>(1)?.unwrap_or(0),
            distinct: row.try_get::<i64, _>(2)?,
            min: row.try_get::<&str, _>(3)?.map(str::to_string),
            max: row.try_get::<&str, _>(4)?.map(str::to_string),
            max_len: row.try_get::<i64, _>(5)?,
        })
    }
}

/// Apply SQL Server specific refinements on top of the lookup table.
fn describe_column(mut raw: RawColumn, identity: bool, computed: bool) -> ColumnDescriptor {
    let native = raw.data_type.to_lowercase();
    let canonical = mssql_to_canonical(&native);

    match native.as_str() {
        "money" => {
            raw.precision = 19;
            raw.scale = 4;
        }
        "smallmoney" => {
            raw.precision = 10;
            raw.scale = 4;
        }
        _ => {}
    }
    // Integer and float precision is implied by the type itself.
    if !matches!(canonical, CanonicalType::Decimal) {
        raw.precision = 0;
        raw.scale = 0;
    }

    let flags = join_comment(&[
        raw.comment.as_deref(),
        identity.then_some("IDENTITY"),
        computed.then_some("COMPUTED"),
    ]);
    raw.comment = flags;
    raw.into_descriptor(canonical)
}

/// Convert one TDS cell to a [`SqlValue`].
///
/// Large objects (`varbinary(max)`, `nvarchar(max)`, `image`, `text`) arrive
/// fully materialized, so no further unwrapping is needed downstream.
fn convert_column_data(data: &ColumnData<'static>) -> Result<SqlValue> {
    let value: SqlValue = match data {
        ColumnData::U8(v) => v.map(|v| SqlValue::I16(v as i16)).into(),
        ColumnData::I16(v) => v.map(SqlValue::I16).into(),
        ColumnData::I32(v) => v.map(SqlValue::I32).into(),
        ColumnData::I64(v) => v.map(SqlValue::I64).into(),
        ColumnData::F32(v) => v.map(SqlValue::F32).into(),
        ColumnData::F64(v) => v.map(SqlValue::F64).into(),
        ColumnData::Bit(v) => v.map(SqlValue::Bool).into(),
        ColumnData::String(v) => v.as_ref().map(|s| SqlValue::Text(s.to_string())).into(),
        ColumnData::Guid(v) => v.map(SqlValue::Uuid).into(),
        ColumnData::Binary(v) => v.as_ref().map(|b| SqlValue::Bytes(b.to_vec())).into(),
        ColumnData::Numeric(v) => v
            .as_ref()
            .map(|n| {
                rust_decimal::Decimal::try_from_i128_with_scale(n.value(), n.scale() as u32)
                    .map(SqlValue::Decimal)
                    .unwrap_or_else(|_| {
                        SqlValue::F64(n.value() as f64 / 10f64.powi(n.scale() as i32))
                    })
            })
            .into(),
        ColumnData::Xml(v) => v
            .as_ref()
            .map(|x| SqlValue::Text(x.clone().into_owned().into_string()))
            .into(),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            chrono::NaiveDateTime::from_sql(data)?.map(SqlValue::DateTime).into()
        }
        ColumnData::Date(_) => chrono::NaiveDate::from_sql(data)?.map(SqlValue::Date).into(),
        ColumnData::Time(_) => chrono::NaiveTime::from_sql(data)?.map(SqlValue::Time).into(),
        ColumnData::DateTimeOffset(_) => {
            chrono::DateTime::<chrono::FixedOffset>::from_sql(data)?
                .map(SqlValue::DateTimeOffset)
                .into()
        }
        #[allow(unreachable_patterns)]
        _ => SqlValue::Null,
    };
    Ok(value)
}

fn convert_row(row: Row) -> Result<Vec<SqlValue>> {
    row.into_iter().map(|cell| convert_column_data(&cell)).collect()
}

#[async_trait]
impl SourceConnector for MssqlSource {
    fn engine(&self) -> &str {
        ENGINE
    }

    async fn connect(&mut self) -> Result<()> {
        let manager = TiberiusConnectionManager {
            settings: self.settings.clone(),
        };
        let pool = Pool::builder()
            .max_size(self.settings.pool_size.max(1))
            .connection_timeout(POOL_CONNECTION_TIMEOUT)
            .idle_timeout(Some(POOL_IDLE_TIMEOUT))
            .test_on_check_out(true)
            .build(manager)
            .await
            .map_err(|e| MigrateError::connection(ENGINE, e))?;

        {
            let mut conn = pool
                .get()
                .await
                .map_err(|e| MigrateError::connection(ENGINE, e))?;
            conn.simple_query("SELECT 1").await?.into_row().await?;
        }

        info!(
            "Connected to MSSQL: {}:{}/{}",
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
                t.TABLE_SCHEMA,
                t.TABLE_NAME,
                t.TABLE_TYPE,
                CAST(ep.value AS NVARCHAR(4000))
            FROM INFORMATION_SCHEMA.TABLES t
            LEFT JOIN sys.extended_properties ep
                ON ep.major_id = OBJECT_ID(QUOTENAME(t.TABLE_SCHEMA) + '.' + QUOTENAME(t.TABLE_NAME))
                AND ep.minor_id = 0
                AND ep.name = 'MS_Description'
            WHERE t.TABLE_TYPE = 'BASE TABLE'
              AND t.TABLE_SCHEMA = @P1
            ORDER BY t.TABLE_NAME
        "#;

        let mut tables = Vec::new();
        let mut client = self.client().await?;
        for schema in schemas {
            let mut q = Query::new(query);
            q.bind(schema.as_str());
            let rows = q.query(&mut client).await?.into_first_result().await?;
            for row in rows {
                let mut table = TableSchema::new(
                    row.try_get::<&str, _>(0)?.unwrap_or_default(),
                    row.try_get::<&str, _>(1)?.unwrap_or_default(),
                );
                if let Some(kind) = row.try_get::<&str, _>(2)? {
                    table.table_kind = kind.to_string();
                }
                table.comment = row.try_get::<&str, _>(3)?.map(str::to_string);
                tables.push(table);
            }
            debug!("MSSQL schema '{}': {} tables so far", schema, tables.len());
        }
        Ok(tables)
    }

    async fn get_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let query = r#"
            SELECT
                c.COLUMN_NAME,
                c.DATA_TYPE,
                CAST(ISNULL(c.CHARACTER_MAXIMUM_LENGTH, 0) AS INT),
                CAST(ISNULL(c.NUMERIC_PRECISION, 0) AS INT),
                CAST(ISNULL(c.NUMERIC_SCALE, 0) AS INT),
                CASE WHEN c.IS_NULLABLE = 'YES' THEN 1 ELSE 0 END,
                c.COLUMN_DEFAULT,
                CAST(c.ORDINAL_POSITION AS INT),
                c.CHARACTER_SET_NAME,
                CAST(ISNULL(COLUMNPROPERTY(OBJECT_ID(QUOTENAME(c.TABLE_SCHEMA) + '.' + QUOTENAME(c.TABLE_NAME)), c.COLUMN_NAME, 'IsIdentity'), 0) AS INT),
                CAST(ISNULL(COLUMNPROPERTY(OBJECT_ID(QUOTENAME(c.TABLE_SCHEMA) + '.' + QUOTENAME(c.TABLE_NAME)), c.COLUMN_NAME, 'IsComputed'), 0) AS INT)
            FROM INFORMATION_SCHEMA.COLUMNS c
            WHERE c.TABLE_SCHEMA = @P1 AND c.TABLE_NAME = @P2
            ORDER BY c.ORDINAL_POSITION
        "#;

        let rows = self.catalog_rows(query, schema, table).await?;
        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let raw = RawColumn {
                name: row.try_get::<&str, _>(0)?.unwrap_or_default().to_string(),
                data_type: row.try_get::<&str, _>(1)?.unwrap_or_default().to_string(),
                max_length: row.try_get::<i32, _>(2)?.unwrap_or(0),
                precision: row.try_get::<i32, _>(3)?.unwrap_or(0),
                scale: row.try_get::<i32, _>(4)?.unwrap_or(0),
                nullable: row.try_get::<i32, _>(5)?.unwrap_or(0) == 1,
                default: row.try_get::<&str, _>(6)?.map(str::to_string),
                ordinal: row.try_get::<i32, _>(7)?.unwrap_or(0),
                charset: row.try_get::<&str, _>(8)?.map(str::to_string),
                comment: None,
            };
            let identity = row.try_get::<i32, _>(9)?.unwrap_or(0) == 1;
            let computed = row.try_get::<i32, _>(10)?.unwrap_or(0) == 1;
            columns.push(describe_column(raw, identity, computed));
        }

        debug!("Loaded {} columns for {}.{}", columns.len(), schema, table);
        Ok(columns)
    }

    async fn get_primary_keys(&self, schema: &str, table: &str) -> Result<PrimaryKey> {
        let query = r#"
            SELECT c.COLUMN_NAME
            FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc
            JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE c
                ON c.CONSTRAINT_NAME = tc.CONSTRAINT_NAME
                AND c.TABLE_SCHEMA = tc.TABLE_SCHEMA
                AND c.TABLE_NAME = tc.TABLE_NAME
            WHERE tc.CONSTRAINT_TYPE = 'PRIMARY KEY'
              AND tc.TABLE_SCHEMA = @P1
              AND tc.TABLE_NAME = @P2
            ORDER BY c.ORDINAL_POSITION
        "#;

        let rows = self.catalog_rows(query, schema, table).await?;
        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(name) = row.try_get::<&str, _>(0)? {
                columns.push(name.to_string());
            }
        }
        Ok(PrimaryKey::new(columns))
    }

    async fn get_foreign_keys(&self, schema: &str, table: &str) -> Result<Vec<ForeignKeyRef>> {
        let query = r#"
            SELECT pc.name, rs.name, rt.name, rc.name
            FROM sys.foreign_keys fk
            JOIN sys.foreign_key_columns fkc ON fkc.constraint_object_id = fk.object_id
            JOIN sys.tables t ON t.object_id = fk.parent_object_id
            JOIN sys.schemas s ON s.schema_id = t.schema_id
            JOIN sys.columns pc
                ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id
            JOIN sys.tables rt ON rt.object_id = fk.referenced_object_id
            JOIN sys.schemas rs ON rs.schema_id = rt.schema_id
            JOIN sys.columns rc
                ON rc.object_id = fkc.referenced_object_id AND rc.column_id = fkc.referenced_column_id
            WHERE s.name = @P1 AND t.name = @P2
            ORDER BY fk.name, fkc.constraint_column_id
        "#;

        let rows = self.catalog_rows(query, schema, table).await?;
        let mut fks = Vec::with_capacity(rows.len());
        for row in rows {
            fks.push(ForeignKeyRef {
                column: row.try_get::<&str, _>(0)?.unwrap_or_default().to_string(),
                parent_schema: row.try_get::<&str, _>(1)?.unwrap_or_default().to_string(),
                parent_table: row.try_get::<&str, _>(2)?.unwrap_or_default().to_string(),
                parent_column: row.try_get::<&str, _>(3)?.unwrap_or_default().to_string(),
            });
        }
        Ok(fks)
    }

    async fn get_indexes(&self, schema: &str, table: &str) -> Result<Vec<IndexInfo>> {
        let query = r#"
            SELECT
                i.name AS index_name,
                i.is_unique,
                STUFF((
                    SELECT ',' + c2.name
                    FROM sys.index_columns ic2
                    JOIN sys.columns c2 ON ic2.object_id = c2.object_id AND ic2.column_id = c2.column_id
                    WHERE ic2.object_id = i.object_id AND ic2.index_id = i.index_id AND ic2.is_included_column = 0
                    ORDER BY ic2.key_ordinal
                    FOR XML PATH('')
                ), 1, 1, '') AS columns
            FROM sys.indexes i
            JOIN sys.tables tb ON i.object_id = tb.object_id
            JOIN sys.schemas s ON tb.schema_id = s.schema_id
            WHERE s.name = @P1
              AND tb.name = @P2
              AND i.is_primary_key = 0
              AND i.type > 0
            ORDER BY i.name
        "#;

        let rows = self.catalog_rows(query, schema, table).await?;
        let mut indexes = Vec::with_capacity(rows.len());
        for row in rows {
            let cols: &str = row.try_get(2)?.unwrap_or_default();
            indexes.push(IndexInfo {
                name: row.try_get::<&str, _>(0)?.unwrap_or_default().to_string(),
                unique: row.try_get::<bool, _>(1)?.unwrap_or(false),
                columns: cols
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect(),
            });
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
        let sql = format!(
            "SELECT {} FROM {} ORDER BY 1 OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
            Quoting::Mssql.column_list(columns)?,
            Self::qualify(schema, table)?,
            offset,
            limit
        );

        let mut client = self.client().await?;
        let rows = client
            .simple_query(sql)
            .await
            .map_err(|e| MigrateError::extraction(&full, e))?
            .into_first_result()
            .await
            .map_err(|e| MigrateError::extraction(&full, e))?;

        let mut page = Page::new(columns.to_vec());
        page.rows.reserve(rows.len());
        for row in rows {
            page.rows
                .push(convert_row(row).map_err(|e| MigrateError::extraction(&full, e))?);
        }
        debug!("MSSQL {}: read {} rows at offset {}", full, page.len(), offset);
        Ok(page)
    }

    async fn run_aggregate(
        &self,
        schema: &str,
        table: &str,
        column: &str,
        func: AggregateFn,
    ) -> Result<SqlValue> {
        let col = Quoting::Mssql.quote(column)?;
        // COUNT over a large table overflows INT; SUM over INT columns too.
        let expr = match func {
            AggregateFn::CountDistinct => format!("COUNT_BIG(DISTINCT {})", col),
            AggregateFn::Sum => format!("COALESCE(SUM(CAST({} AS FLOAT)), 0)", col),
            other => other.expression(&col),
        };
        let sql = format!("SELECT {} FROM {}", expr, Self::qualify(schema, table)?);

        let mut client = self.client().await?;
        let row = client.simple_query(sql).await?.into_row().await?;
        match row {
            Some(row) => Ok(convert_row(row)?.into_iter().next().unwrap_or(SqlValue::Null)),
            None => Ok(SqlValue::Null),
        }
    }

    async fn get_row_count(&self, schema: &str, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT_BIG(*) FROM {}", Self::qualify(schema, table)?);
        let mut client = self.client().await?;
        let row = client.simple_query(sql).await?.into_row().await?;
        Ok(row
            .map(|r| r.try_get::<i64, _>(0))
            .transpose()?
            .flatten()
            .unwrap_or(0))
    }

    async fn close(&mut self) {
        if self.pool.take().is_some() {
            debug!("Closed MSSQL pool");
        }
    }
}
