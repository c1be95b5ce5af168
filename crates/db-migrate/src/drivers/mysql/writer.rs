//! MySQL/MariaDB target connector implementation.
//!
//! Holds one dedicated session for the whole stage: `FOREIGN_KEY_CHECKS` is
//! session-scoped, so toggling it on a pooled connection and loading on
//! another would silently do nothing. Each chunk is written with batched
//! multi-row INSERT inside a single transaction.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, Pool, SslOpts, TxOpts, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::MysqlSettings;
use crate::core::identifier::Quoting;
use crate::core::mapping::{ColumnMapping, MappingDocument};
use crate::core::traits::{AggregateFn, DdlOutcome, TargetConnector};
use crate::core::value::SqlValue;
use crate::dialect::CanonicalType;
use crate::drivers::common::{parse_settings, SslMode};
use crate::error::{LoadFailure, MigrateError, Result};

const ENGINE: &str = "mysql";

/// Maximum bind parameters in one prepared statement.
const MYSQL_MAX_PLACEHOLDERS: usize = 65535;

/// Key prefix for TEXT/BLOB/JSON index columns.
const INDEX_PREFIX_LENGTH: u32 = 64;

/// `ER_TABLE_EXISTS_ERROR`
const ER_TABLE_EXISTS: u16 = 1050;
/// `ER_DUP_KEYNAME`
const ER_DUP_KEYNAME: u16 = 1061;
/// `ER_TOO_LONG_KEY`
const ER_TOO_LONG_KEY: u16 = 1071;
/// `ER_NO_SUCH_TABLE`
const ER_NO_SUCH_TABLE: u16 = 1146;
/// `ER_BLOB_KEY_WITHOUT_LENGTH`
const ER_BLOB_KEY_WITHOUT_LENGTH: u16 = 1170;

/// DDL errors treated as "already applied".
const ALREADY_EXISTS_CODES: &[u16] = &[
    ER_DUP_KEYNAME,
    ER_TABLE_EXISTS,
    ER_TOO_LONG_KEY,
    ER_BLOB_KEY_WITHOUT_LENGTH,
];

/// MySQL implementation of [`TargetConnector`].
pub struct MysqlTarget {
    settings: MysqlSettings,
    pool: Option<Pool>,
    session: Mutex<Option<Conn>>,
}

impl MysqlTarget {
    pub fn new(settings: MysqlSettings) -> Self {
        Self {
            settings,
            pool: None,
            session: Mutex::new(None),
        }
    }

    /// Build from the `mysql:` configuration sub-document. Does not connect.
    pub fn from_settings(value: &serde_yaml::Value) -> Result<Self> {
        Ok(Self::new(parse_settings(ENGINE, value)?))
    }

    fn ssl_opts(&self) -> Option<SslOpts> {
        match self.settings.ssl_mode {
            SslMode::Disable => {
                warn!("MySQL TLS is disabled. Credentials will be transmitted in plaintext.");
                None
            }
            SslMode::Require => Some(SslOpts::default().with_danger_accept_invalid_certs(true)),
            SslMode::VerifyCa | SslMode::VerifyFull => Some(SslOpts::default()),
        }
    }

    fn qualify(schema: &str, table: &str) -> Result<String> {
        Quoting::Mysql.qualify(schema, table)
    }

    /// Run a statement on the dedicated session.
    async fn query_drop(&self, sql: &str) -> std::result::Result<(), SessionError> {
        let mut guard = self.session.lock().await;
        let conn = guard.as_mut().ok_or(SessionError::NotConnected)?;
        conn.query_drop(sql).await.map_err(SessionError::Driver)
    }

    async fn query_value(&self, sql: &str) -> Result<Option<Value>> {
        let mut guard = self.session.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| MigrateError::connection(ENGINE, "not connected"))?;
        Ok(conn.exec_first(sql, ()).await?)
    }
}

/// Failure on the dedicated session, before it is classified.
enum SessionError {
    NotConnected,
    Driver(mysql_async::Error),
}

impl SessionError {
    fn into_error(self) -> MigrateError {
        match self {
            SessionError::NotConnected => MigrateError::connection(ENGINE, "not connected"),
            SessionError::Driver(e) => e.into(),
        }
    }
}

/// Native server error code, if the error came from the server.
fn server_code(err: &mysql_async::Error) -> Option<u16> {
    match err {
        mysql_async::Error::Server(e) => Some(e.code),
        _ => None,
    }
}

/// Classify a failed INSERT by its native code.
fn classify_load_error(code: Option<u16>) -> LoadFailure {
    match code {
        Some(ER_NO_SUCH_TABLE) => LoadFailure::MissingTable,
        _ => LoadFailure::Data,
    }
}

/// Split a chunk into multi-row INSERT statements that stay under the
/// placeholder limit. Yields `(sql, params, row_count)` per batch.
fn insert_batches(
    qualified: &str,
    col_list: &str,
    num_cols: usize,
    rows: &[Vec<SqlValue>],
) -> Vec<(String, Vec<Value>, usize)> {
    let max_rows_per_batch = (MYSQL_MAX_PLACEHOLDERS / num_cols.max(1)).max(1);
    let placeholders_per_row = format!("({})", vec!["?"; num_cols].join(", "));

    rows.chunks(max_rows_per_batch)
        .map(|chunk| {
            let sql = format!(
                "INSERT INTO {} ({}) VALUES {}",
                qualified,
                col_list,
                vec![placeholders_per_row.as_str(); chunk.len()].join(", ")
            );
            let params: Vec<Value> = chunk
                .iter()
                .flat_map(|row| row.iter().map(sql_value_to_mysql))
                .collect();
            (sql, params, chunk.len())
        })
        .collect()
}

/// Whether an index on this column needs a key prefix length.
fn needs_key_prefix(col: &ColumnMapping) -> bool {
    let native = col.target_type.to_uppercase();
    if native.contains("TEXT") || native.contains("BLOB") || native.contains("JSON") {
        return true;
    }
    matches!(
        col.canonical(),
        Some(CanonicalType::Clob | CanonicalType::Blob | CanonicalType::Json | CanonicalType::Xml)
    )
}

/// Convert SqlValue to mysql_async::Value.
fn sql_value_to_mysql(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::NULL,
        SqlValue::Bool(b) => Value::Int(*b as i64),
        SqlValue::I16(i) => Value::Int(*i as i64),
        SqlValue::I32(i) => Value::Int(*i as i64),
        SqlValue::I64(i) => Value::Int(*i),
        SqlValue::F32(f) => Value::Float(*f),
        SqlValue::F64(f) => Value::Double(*f),
        SqlValue::Decimal(d) => Value::Bytes(d.to_string().into_bytes()),
        SqlValue::Text(s) => Value::Bytes(s.as_bytes().to_vec()),
        SqlValue::Bytes(b) => Value::Bytes(b.clone()),
        SqlValue::Uuid(u) => Value::Bytes(u.to_string().into_bytes()),
        SqlValue::Json(v) => Value::Bytes(v.to_string().into_bytes()),
        SqlValue::DateTime(dt) => datetime_value(dt),
        SqlValue::DateTimeOffset(dto) => datetime_value(&dto.naive_utc()),
        SqlValue::Date(d) => Value::Date(d.year() as u16, d.month() as u8, d.day() as u8, 0, 0, 0, 0),
        SqlValue::Time(t) => Value::Time(
            false,
            0,
            t.hour() as u8,
            t.minute() as u8,
            t.second() as u8,
            (t.nanosecond() / 1_000).min(999_999),
        ),
    }
}

fn datetime_value(dt: &NaiveDateTime) -> Value {
    Value::Date(
        dt.year() as u16,
        dt.month() as u8,
        dt.day() as u8,
        dt.hour() as u8,
        dt.minute() as u8,
        dt.second() as u8,
        (dt.nanosecond() / 1_000).min(999_999),
    )
}

/// Convert a binary-protocol result value back to SqlValue.
///
/// DECIMAL results arrive as byte strings and are kept as text; validation
/// parses numeric text when comparing.
fn mysql_value_to_sql(value: Value) -> SqlValue {
    match value {
        Value::NULL => SqlValue::Null,
        Value::Int(i) => SqlValue::I64(i),
        Value::UInt(u) => i64::try_from(u)
            .map(SqlValue::I64)
            .unwrap_or(SqlValue::F64(u as f64)),
        Value::Float(f) => SqlValue::F32(f),
        Value::Double(d) => SqlValue::F64(d),
        Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(s) => SqlValue::Text(s),
            Err(e) => SqlValue::Bytes(e.into_bytes()),
        },
        Value::Date(year, month, day, hour, min, sec, micro) => {
            let date = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32);
            match date {
                Some(d) if hour == 0 && min == 0 && sec == 0 && micro == 0 => SqlValue::Date(d),
                Some(d) => d
                    .and_hms_micro_opt(hour as u32, min as u32, sec as u32, micro)
                    .map(SqlValue::DateTime)
                    .unwrap_or(SqlValue::Null),
                // Zero dates such as 0000-00-00 have no chrono representation.
                None => SqlValue::Text(format!(
                    "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                    year, month, day, hour, min, sec
                )),
            }
        }
        Value::Time(negative, days, hours, mins, secs, micros) => {
            let total_hours = days * 24 + hours as u32;
            let sign = if negative { "-" } else { "" };
            SqlValue::Text(format!(
                "{}{:02}:{:02}:{:02}.{:06}",
                sign, total_hours, mins, secs, micros
            ))
        }
    }
}

#[async_trait]
impl TargetConnector for MysqlTarget {
    fn engine(&self) -> &str {
        ENGINE
    }

    async fn connect(&mut self) -> Result<()> {
        let mut builder = OptsBuilder::default()
            .ip_or_hostname(self.settings.host.clone())
            .tcp_port(self.settings.port)
            .db_name(Some(self.settings.database.clone()))
            .user(Some(self.settings.user.clone()))
            .pass(Some(self.settings.password.clone()));
        if let Some(ssl) = self.ssl_opts() {
            builder = builder.ssl_opts(ssl);
        }

        let opts: Opts = builder.into();
        let pool = Pool::new(opts);

        let mut conn = pool
            .get_conn()
            .await
            .map_err(|e| MigrateError::connection(ENGINE, e))?;
        conn.query_drop("SET NAMES utf8mb4")
            .await
            .map_err(|e| MigrateError::connection(ENGINE, e))?;
        // MySQL 8.0.13+ only; older servers and MariaDB reject the variable.
        if let Err(e) = conn.query_drop("SET sql_require_primary_key = 0").await {
            debug!("sql_require_primary_key not set: {}", e);
        }

        info!(
            "Connected to MySQL target: {}:{}/{}",
            self.settings.host, self.settings.port, self.settings.database
        );
        *self.session.get_mut() = Some(conn);
        self.pool = Some(pool);
        Ok(())
    }

    fn render_create_table(
        &self,
        schema: &str,
        table: &str,
        mapping: &MappingDocument,
    ) -> Result<String> {
        let mut lines = Vec::with_capacity(mapping.columns.len() + 1);
        for col in &mapping.columns {
            let mut line = format!("{} {}", Quoting::Mysql.quote(&col.target)?, col.target_type);
            if !col.nullable || col.is_primary_key() {
                line.push_str(" NOT NULL");
            }
            if col.auto_increment {
                line.push_str(" AUTO_INCREMENT");
            }
            lines.push(line);
        }

        let pk: Vec<&str> = mapping
            .primary_key()
            .into_iter()
            .map(|c| c.target.as_str())
            .collect();
        if !pk.is_empty() {
            lines.push(format!("PRIMARY KEY ({})", Quoting::Mysql.column_list(&pk)?));
        }

        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
            Self::qualify(schema, table)?,
            lines.join(",\n    ")
        ))
    }

    fn render_indexes(
        &self,
        schema: &str,
        table: &str,
        mapping: &MappingDocument,
    ) -> Result<Vec<String>> {
        let qualified = Self::qualify(schema, table)?;
        let mut statements = Vec::new();

        for idx in mapping.grouped_indexes() {
            let mut cols = Vec::with_capacity(idx.columns.len());
            for name in &idx.columns {
                let quoted = Quoting::Mysql.quote(name)?;
                match mapping.column_by_target(name) {
                    Some(col) if needs_key_prefix(col) => {
                        cols.push(format!("{}({})", quoted, INDEX_PREFIX_LENGTH))
                    }
                    _ => cols.push(quoted),
                }
            }

            let unique = if idx.unique { "UNIQUE " } else { "" };
            statements.push(format!(
                "CREATE {}INDEX {} ON {} ({})",
                unique,
                Quoting::Mysql.quote(&idx.name)?,
                qualified,
                cols.join(", ")
            ));
        }
        Ok(statements)
    }

    async fn apply_ddl(&self, statement: &str) -> Result<DdlOutcome> {
        match self.query_drop(statement).await {
            Ok(()) => Ok(DdlOutcome::Applied),
            Err(SessionError::Driver(e)) => match server_code(&e) {
                Some(code) if ALREADY_EXISTS_CODES.contains(&code) => {
                    Ok(DdlOutcome::AlreadyExists { code: code as u32 })
                }
                _ => Err(MigrateError::Ddl {
                    statement: statement.to_string(),
                    message: e.to_string(),
                }),
            },
            Err(e) => Err(e.into_error()),
        }
    }

    async fn bulk_load(
        &self,
        schema: &str,
        table: &str,
        columns: &[String],
        rows: &[Vec<SqlValue>],
    ) -> Result<u64> {
        if rows.is_empty() || columns.is_empty() {
            return Ok(0);
        }

        let qualified = Self::qualify(schema, table)?;
        let col_list = Quoting::Mysql.column_list(columns)?;
        let batches = insert_batches(&qualified, &col_list, columns.len(), rows);

        let mut guard = self.session.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| MigrateError::connection(ENGINE, "not connected"))?;

        // One transaction per chunk: a failed batch must not leave earlier
        // batches committed, or the retry would duplicate them.
        let mut tx = conn
            .start_transaction(TxOpts::default())
            .await
            .map_err(|e| MigrateError::connection(ENGINE, e))?;

        let mut loaded = 0u64;
        for (sql, params, count) in batches {
            if let Err(e) = tx.exec_drop(sql, params).await {
                let kind = classify_load_error(server_code(&e));
                if let Err(rb) = tx.rollback().await {
                    warn!("{}: rollback failed: {}", qualified, rb);
                }
                return Err(MigrateError::load(&qualified, kind, e));
            }
            loaded += count as u64;
        }
        tx.commit().await.map_err(|e| {
            MigrateError::load(&qualified, classify_load_error(server_code(&e)), e)
        })?;

        debug!("MySQL: wrote {} rows to {}", loaded, qualified);
        Ok(loaded)
    }

    async fn get_row_count(&self, schema: &str, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", Self::qualify(schema, table)?);
        let value = self.query_value(&sql).await?;
        Ok(value
            .map(mysql_value_to_sql)
            .and_then(|v| v.as_i64())
            .unwrap_or(0))
    }

    async fn run_aggregate(
        &self,
        schema: &str,
        table: &str,
        column: &str,
        func: AggregateFn,
    ) -> Result<SqlValue> {
        let col = Quoting::Mysql.quote(column)?;
        let sql = format!(
            "SELECT {} FROM {}",
            func.expression(&col),
            Self::qualify(schema, table)?
        );
        let value = self.query_value(&sql).await?;
        Ok(value.map(mysql_value_to_sql).unwrap_or(SqlValue::Null))
    }

    async fn disable_fk_constraints(&self, schema: &str, table: &str) -> Result<()> {
        self.query_drop("SET FOREIGN_KEY_CHECKS = 0")
            .await
            .map_err(SessionError::into_error)?;
        debug!("FOREIGN_KEY_CHECKS off for {}.{}", schema, table);
        Ok(())
    }

    async fn enable_fk_constraints(&self, schema: &str, table: &str) -> Result<()> {
        self.query_drop("SET FOREIGN_KEY_CHECKS = 1")
            .await
            .map_err(SessionError::into_error)?;
        debug!("FOREIGN_KEY_CHECKS on for {}.{}", schema, table);
        Ok(())
    }

    async fn close(&mut self) {
        drop(self.session.get_mut().take());
        if let Some(pool) = self.pool.take() {
            if let Err(e) = pool.disconnect().await {
                debug!("MySQL pool disconnect: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> MysqlTarget {
        let settings: serde_yaml::Value =
            serde_yaml::from_str("host: localhost\ndatabase: sales\nuser: root").unwrap();
        MysqlTarget::from_settings(&settings).unwrap()
    }

    fn mapping() -> MappingDocument {
        serde_json::from_str(
            r#"{
                "source_table": "dbo.Orders",
                "target_table": "sales.orders",
                "source_engine": "mssql",
                "target_engine": "mysql",
                "columns": [
                    {"source": "Id", "target": "id", "canonical_type": "INT8",
                     "target_type": "BIGINT", "nullable": false, "role": "primary_key",
                     "auto_increment": true},
                    {"source": "Region", "target": "region", "canonical_type": "INT4",
                     "target_type": "INT", "nullable": false, "role": "primary_key"},
                    {"source": "Note", "target": "note", "canonical_type": "CLOB",
                     "target_type": "LONGTEXT", "nullable": true},
                    {"source": "Code", "target": "code", "canonical_type": "TEXT",
                     "target_type": "VARCHAR(20)", "nullable": true}
                ],
                "indexes": [
                    {"name": "ix_note_code", "unique": false, "column": "note"},
                    {"name": "ix_note_code", "unique": false, "column": "code"},
                    {"name": "ux_code", "unique": true, "columns": ["code"]}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_render_create_table() {
        let ddl = target()
            .render_create_table("sales", "orders", &mapping())
            .unwrap();
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS `sales`.`orders` ("));
        assert!(ddl.contains("`id` BIGINT NOT NULL AUTO_INCREMENT"));
        assert!(ddl.contains("`note` LONGTEXT,"));
        assert!(ddl.contains("PRIMARY KEY (`id`, `region`)"));
        assert!(ddl.ends_with("ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"));
        assert_eq!(ddl.matches("PRIMARY KEY").count(), 1);
    }

    #[test]
    fn test_render_indexes_groups_and_prefixes() {
        let stmts = target().render_indexes("sales", "orders", &mapping()).unwrap();
        assert_eq!(
            stmts,
            vec![
                "CREATE INDEX `ix_note_code` ON `sales`.`orders` (`note`(64), `code`)".to_string(),
                "CREATE UNIQUE INDEX `ux_code` ON `sales`.`orders` (`code`)".to_string(),
            ]
        );
    }

    #[test]
    fn test_load_error_classification() {
        assert_eq!(classify_load_error(Some(1146)), LoadFailure::MissingTable);
        assert_eq!(classify_load_error(Some(1062)), LoadFailure::Data);
        assert_eq!(classify_load_error(None), LoadFailure::Data);
    }

    #[test]
    fn test_already_exists_codes() {
        for code in [1061u16, 1050, 1071, 1170] {
            assert!(ALREADY_EXISTS_CODES.contains(&code));
        }
        assert!(!ALREADY_EXISTS_CODES.contains(&1064));
    }

    #[test]
    fn test_value_conversion_to_mysql() {
        assert_eq!(sql_value_to_mysql(&SqlValue::Bool(true)), Value::Int(1));
        assert_eq!(
            sql_value_to_mysql(&SqlValue::Decimal(rust_decimal::Decimal::new(12345, 2))),
            Value::Bytes(b"123.45".to_vec())
        );
        let dt = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_micro_opt(12, 30, 45, 123_000)
            .unwrap();
        assert_eq!(
            sql_value_to_mysql(&SqlValue::DateTime(dt)),
            Value::Date(2024, 1, 15, 12, 30, 45, 123_000)
        );
        assert_eq!(sql_value_to_mysql(&SqlValue::Null), Value::NULL);
    }

    #[test]
    fn test_value_conversion_from_mysql() {
        assert_eq!(mysql_value_to_sql(Value::Int(5)), SqlValue::I64(5));
        assert_eq!(
            mysql_value_to_sql(Value::Bytes(b"10.50".to_vec())),
            SqlValue::Text("10.50".into())
        );
        assert_eq!(
            mysql_value_to_sql(Value::Date(2024, 1, 15, 0, 0, 0, 0)),
            SqlValue::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        );
        assert!(matches!(
            mysql_value_to_sql(Value::Date(2024, 1, 15, 8, 0, 1, 0)),
            SqlValue::DateTime(_)
        ));
    }

    #[test]
    fn test_json_columns_need_prefix() {
        let doc = mapping();
        assert!(needs_key_prefix(&doc.columns[2]));
        assert!(!needs_key_prefix(&doc.columns[3]));
    }

    #[test]
    fn test_insert_batches_respect_placeholder_limit() {
        let rows: Vec<Vec<SqlValue>> = (0..13_108)
            .map(|i| (0..5).map(|c| SqlValue::I64(i * 10 + c)).collect())
            .collect();
        let batches = insert_batches("`s`.`t`", "`a`, `b`, `c`, `d`, `e`", 5, &rows);

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].2, 13_107);
        assert_eq!(batches[0].1.len(), 13_107 * 5);
        assert_eq!(batches[1].2, 1);
        assert_eq!(
            batches[1].0,
            "INSERT INTO `s`.`t` (`a`, `b`, `c`, `d`, `e`) VALUES (?, ?, ?, ?, ?)"
        );
        assert_eq!(batches[1].1[0], Value::Int(131_070));
    }

    /// Live server settings - update these to match your environment.
    fn live_target() -> MysqlTarget {
        let settings: serde_yaml::Value = serde_yaml::from_str(
            "host: localhost\nport: 3306\ndatabase: migrate_test\nuser: root\npassword: MysqlPassword123\nssl_mode: disable",
        )
        .unwrap();
        MysqlTarget::from_settings(&settings).unwrap()
    }

    /// A failure in a later batch rolls back the earlier batches of the chunk,
    /// so retrying the corrected chunk loads each row exactly once.
    #[tokio::test]
    #[ignore] // Needs a MySQL server; run with --ignored
    async fn test_failed_batch_rolls_back_whole_chunk() {
        let mut target = live_target();
        target.connect().await.expect("Failed to connect");
        target
            .apply_ddl("DROP TABLE IF EXISTS `migrate_test`.`atomic_chunk`")
            .await
            .unwrap();
        target
            .apply_ddl("CREATE TABLE `migrate_test`.`atomic_chunk` (`id` BIGINT PRIMARY KEY)")
            .await
            .unwrap();

        // One column: 65535 rows per batch. Row 65536 repeats id 0, so only
        // the second batch fails.
        let columns = vec!["id".to_string()];
        let mut rows: Vec<Vec<SqlValue>> =
            (0..MYSQL_MAX_PLACEHOLDERS as i64).map(|i| vec![SqlValue::I64(i)]).collect();
        rows.push(vec![SqlValue::I64(0)]);

        let err = target
            .bulk_load("migrate_test", "atomic_chunk", &columns, &rows)
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::Load { kind: LoadFailure::Data, .. }));
        assert_eq!(
            target.get_row_count("migrate_test", "atomic_chunk").await.unwrap(),
            0
        );

        rows.pop();
        let loaded = target
            .bulk_load("migrate_test", "atomic_chunk", &columns, &rows)
            .await
            .unwrap();
        assert_eq!(loaded, MYSQL_MAX_PLACEHOLDERS as u64);
        assert_eq!(
            target.get_row_count("migrate_test", "atomic_chunk").await.unwrap(),
            MYSQL_MAX_PLACEHOLDERS as i64
        );
        target.close().await;
    }

}
