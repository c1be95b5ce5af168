//! In-memory connectors for engine tests.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;

use crate::core::mapping::MappingDocument;
use crate::core::schema::{
    ColumnDescriptor, ColumnStats, ForeignKeyRef, IndexInfo, PrimaryKey, TableSchema,
};
use crate::core::traits::{AggregateFn, DdlOutcome, SourceConnector, TargetConnector};
use crate::core::value::{Page, SqlValue};
use crate::dialect::CanonicalType;
use crate::error::{LoadFailure, MigrateError, Result};

fn compare(a: &SqlValue, b: &SqlValue) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.to_text().cmp(&b.to_text()),
    }
}

fn aggregate<'a>(values: impl Iterator<Item = &'a SqlValue>, func: AggregateFn) -> SqlValue {
    let values: Vec<&SqlValue> = values.filter(|v| !v.is_null()).collect();
    match func {
        AggregateFn::Sum => SqlValue::F64(values.iter().filter_map(|v| v.as_f64()).sum()),
        AggregateFn::Min => values
            .into_iter()
            .min_by(|a, b| compare(a, b))
            .cloned()
            .unwrap_or(SqlValue::Null),
        AggregateFn::Max => values
            .into_iter()
            .max_by(|a, b| compare(a, b))
            .cloned()
            .unwrap_or(SqlValue::Null),
        AggregateFn::CountDistinct => {
            let distinct: BTreeSet<Option<String>> = values.iter().map(|v| v.to_text()).collect();
            SqlValue::I64(distinct.len() as i64)
        }
    }
}

fn column_index(columns: &[String], name: &str) -> Option<usize> {
    columns.iter().position(|c| c.eq_ignore_ascii_case(name))
}

struct MemoryTable {
    schema: TableSchema,
    rows: Vec<Vec<SqlValue>>,
}

impl MemoryTable {
    fn column_names(&self) -> Vec<String> {
        self.schema.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Source holding whole tables in memory.
pub(crate) struct MemorySource {
    tables: Vec<MemoryTable>,
    views: Vec<(String, String, String)>,
    routines: Vec<(String, String, String)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self {
            tables: Vec::new(),
            views: Vec::new(),
            routines: Vec::new(),
        }
    }

    fn with_table(mut self, schema: TableSchema, rows: Vec<Vec<SqlValue>>) -> Self {
        self.tables.push(MemoryTable { schema, rows });
        self
    }

    pub fn with_view(mut self, schema: &str, name: &str, definition: &str) -> Self {
        self.views
            .push((schema.to_string(), name.to_string(), definition.to_string()));
        self
    }

    /// Routine keyed by signature, as the Postgres source lists them.
    pub fn with_routine(mut self, schema: &str, signature: &str, definition: &str) -> Self {
        self.routines
            .push((schema.to_string(), signature.to_string(), definition.to_string()));
        self
    }

    fn table(&self, schema: &str, name: &str) -> Result<&MemoryTable> {
        self.tables
            .iter()
            .find(|t| {
                t.schema.name.eq_ignore_ascii_case(name)
                    && (schema.is_empty() || t.schema.schema.eq_ignore_ascii_case(schema))
            })
            .ok_or_else(|| MigrateError::extraction(name, "no such table"))
    }

    fn column_values<'a>(
        &'a self,
        schema: &str,
        table: &str,
        column: &str,
    ) -> Result<impl Iterator<Item = &'a SqlValue>> {
        let t = self.table(schema, table)?;
        let idx = column_index(&t.column_names(), column)
            .ok_or_else(|| MigrateError::extraction(table, format!("no column {}", column)))?;
        Ok(t.rows.iter().filter_map(move |row| row.get(idx)))
    }
}

#[async_trait]
impl SourceConnector for MemorySource {
    fn engine(&self) -> &str {
        "memory"
    }

    async fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn list_tables(&self, schemas: &[String]) -> Result<Vec<TableSchema>> {
        Ok(self
            .tables
            .iter()
            .filter(|t| schemas.is_empty() || schemas.contains(&t.schema.schema))
            .map(|t| TableSchema::new(t.schema.schema.clone(), t.schema.name.clone()))
            .collect())
    }

    async fn get_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnDescriptor>> {
        Ok(self.table(schema, table)?.schema.columns.clone())
    }

    async fn get_primary_keys(&self, schema: &str, table: &str) -> Result<PrimaryKey> {
        Ok(self.table(schema, table)?.schema.primary_key.clone())
    }

    async fn get_foreign_keys(&self, schema: &str, table: &str) -> Result<Vec<ForeignKeyRef>> {
        Ok(self.table(schema, table)?.schema.foreign_keys.clone())
    }

    async fn get_indexes(&self, schema: &str, table: &str) -> Result<Vec<IndexInfo>> {
        Ok(self.table(schema, table)?.schema.indexes.clone())
    }

    async fn get_column_stats(
        &self,
        schema: &str,
        table: &str,
        column: &ColumnDescriptor,
        sample_rows: u64,
    ) -> Result<ColumnStats> {
        let sample: Vec<&SqlValue> = self
            .column_values(schema, table, &column.name)?
            .take(sample_rows as usize)
            .collect();
        let mut stats = ColumnStats::empty(&column.name);
        if sample.is_empty() {
            return Ok(stats);
        }
        let nulls = sample.iter().filter(|v| v.is_null()).count();
        stats.null_rate = Some(nulls as f64 / sample.len() as f64);
        stats.distinct_count = aggregate(sample.iter().copied(), AggregateFn::CountDistinct).as_i64();
        stats.min = aggregate(sample.iter().copied(), AggregateFn::Min).to_text();
        stats.max = aggregate(sample.iter().copied(), AggregateFn::Max).to_text();
        stats.max_len = sample
            .iter()
            .filter_map(|v| v.to_text())
            .map(|s| s.chars().count() as i64)
            .max();
        Ok(stats)
    }

    async fn extract_chunk(
        &self,
        schema: &str,
        table: &str,
        columns: &[String],
        offset: u64,
        limit: u64,
    ) -> Result<Page> {
        let t = self.table(schema, table)?;
        let names = t.column_names();
        let selected: Vec<(String, usize)> = columns
            .iter()
            .filter_map(|c| column_index(&names, c).map(|i| (names[i].clone(), i)))
            .collect();

        let mut page = Page::new(selected.iter().map(|(n, _)| n.clone()).collect());
        page.rows = t
            .rows
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|row| selected.iter().map(|(_, i)| row[*i].clone()).collect())
            .collect();
        Ok(page)
    }

    async fn run_aggregate(
        &self,
        schema: &str,
        table: &str,
        column: &str,
        func: AggregateFn,
    ) -> Result<SqlValue> {
        Ok(aggregate(self.column_values(schema, table, column)?, func))
    }

    async fn get_row_count(&self, schema: &str, table: &str) -> Result<i64> {
        Ok(self.table(schema, table)?.rows.len() as i64)
    }

    async fn list_views(&self, schema: &str) -> Result<Vec<String>> {
        Ok(self
            .views
            .iter()
            .filter(|(s, _, _)| s == schema)
            .map(|(_, n, _)| n.clone())
            .collect())
    }

    async fn get_view_definition(&self, schema: &str, name: &str) -> Result<Option<String>> {
        Ok(self
            .views
            .iter()
            .find(|(s, n, _)| s == schema && n == name)
            .map(|(_, _, d)| d.clone()))
    }

    async fn list_routines(&self, schema: &str) -> Result<Vec<String>> {
        Ok(self
            .routines
            .iter()
            .filter(|(s, _, _)| s == schema)
            .map(|(_, n, _)| n.clone())
            .collect())
    }

    async fn get_routine_definition(&self, schema: &str, name: &str) -> Result<Option<String>> {
        Ok(self
            .routines
            .iter()
            .find(|(s, n, _)| s == schema && n == name)
            .map(|(_, _, d)| d.clone()))
    }

    async fn close(&mut self) {}
}

fn column(name: &str, raw: &str, canonical: CanonicalType, nullable: bool, ordinal: u32) -> ColumnDescriptor {
    ColumnDescriptor {
        name: name.to_string(),
        source_type_raw: raw.to_string(),
        canonical_type: canonical,
        length: None,
        precision: None,
        scale: None,
        nullable,
        default: None,
        ordinal,
        comment: None,
        charset: None,
    }
}

/// `dbo.customers` (`customers` rows), `dbo.notes` and `dbo.orders` (`orders`
/// rows each). Orders reference customers.
pub(crate) fn sample_source(customers: usize, orders: usize) -> MemorySource {
    let mut customer_table = TableSchema::new("dbo", "customers");
    customer_table.columns = vec![
        column("id", "int", CanonicalType::Int4, false, 1),
        column("name", "nvarchar", CanonicalType::Text, true, 2),
    ];
    customer_table.primary_key = PrimaryKey::new(vec!["id".into()]);
    customer_table.indexes = vec![IndexInfo {
        name: "ix_customers_name".into(),
        unique: false,
        columns: vec!["name".into()],
    }];
    let customer_rows = (1..=customers as i32)
        .map(|i| vec![SqlValue::I32(i), SqlValue::Text(format!("customer {}", i))])
        .collect();

    let mut notes_table = TableSchema::new("dbo", "notes");
    notes_table.columns = vec![
        column("id", "bigint", CanonicalType::Int8, false, 1),
        column("body", "nvarchar", CanonicalType::Text, true, 2),
        column("flag", "bit", CanonicalType::Bool, true, 3),
    ];
    notes_table.primary_key = PrimaryKey::new(vec!["id".into()]);
    let notes_rows = (1..=orders as i64)
        .map(|i| {
            let body = if i % 2 == 0 {
                SqlValue::Null
            } else {
                SqlValue::Text(format!("note {}", i))
            };
            vec![SqlValue::I64(i), body, SqlValue::I16((i % 2) as i16)]
        })
        .collect();

    let mut orders_table = TableSchema::new("dbo", "orders");
    orders_table.columns = vec![
        column("id", "int", CanonicalType::Int4, false, 1),
        column("customer_id", "int", CanonicalType::Int4, true, 2),
        column("amount", "decimal", CanonicalType::Decimal, true, 3),
        column("created_at", "datetime2", CanonicalType::DateTime, true, 4),
    ];
    orders_table.primary_key = PrimaryKey::new(vec!["id".into()]);
    orders_table.foreign_keys = vec![ForeignKeyRef {
        column: "customer_id".into(),
        parent_schema: "dbo".into(),
        parent_table: "customers".into(),
        parent_column: "id".into(),
    }];
    let base = NaiveDate::from_ymd_opt(2024, 1, 15)
        .and_then(|d| d.and_hms_milli_opt(12, 30, 45, 123))
        .unwrap();
    let order_rows = (0..orders as i64)
        .map(|i| {
            let customer = if customers == 0 {
                SqlValue::Null
            } else {
                SqlValue::I32((i as usize % customers) as i32 + 1)
            };
            vec![
                SqlValue::I32(i as i32 + 1),
                customer,
                SqlValue::Decimal(Decimal::new(1050 + i * 25, 2)),
                SqlValue::DateTime(base + Duration::days(i)),
            ]
        })
        .collect();

    MemorySource::new()
        .with_table(customer_table, customer_rows)
        .with_table(notes_table, notes_rows)
        .with_table(orders_table, order_rows)
}

/// Approved mappings for [`sample_source`], in file-name order.
pub(crate) fn sample_mappings() -> Vec<MappingDocument> {
    let docs = [
        r#"{"source_table": "dbo.customers", "target_table": "customers",
            "source_engine": "memory", "target_engine": "memory", "status": "approved",
            "columns": [
              {"source": "id", "target": "id", "canonical_type": "INT4", "target_type": "INT",
               "nullable": false, "role": "primary_key", "auto_increment": true},
              {"source": "name", "target": "name", "canonical_type": "TEXT", "target_type": "VARCHAR(100)"}
            ],
            "indexes": [{"name": "ix_customers_name", "columns": ["name"]}]}"#,
        r#"{"source_table": "dbo.notes", "target_table": "notes",
            "source_engine": "memory", "target_engine": "memory", "status": "approved",
            "columns": [
              {"source": "id", "target": "id", "canonical_type": "INT8", "target_type": "BIGINT",
               "nullable": false, "role": "primary_key"},
              {"source": "body", "target": "body", "canonical_type": "TEXT", "target_type": "TEXT"},
              {"source": "flag", "target": "flag", "canonical_type": "BOOL", "target_type": "TINYINT(1)"}
            ]}"#,
        r#"{"source_table": "dbo.orders", "target_table": "orders",
            "source_engine": "memory", "target_engine": "memory", "status": "approved",
            "columns": [
              {"source": "id", "target": "id", "canonical_type": "INT4", "target_type": "INT",
               "nullable": false, "role": "primary_key"},
              {"source": "customer_id", "target": "customer_id", "canonical_type": "INT4", "target_type": "INT"},
              {"source": "amount", "target": "amount", "canonical_type": "DECIMAL", "target_type": "DECIMAL(12,2)"},
              {"source": "created_at", "target": "created_at", "canonical_type": "DATETIME", "target_type": "DATETIME(3)"}
            ],
            "indexes": [{"name": "ix_orders_customer", "column": "customer_id"}]}"#,
    ];
    docs.iter()
        .map(|doc| serde_json::from_str(doc).unwrap())
        .collect()
}

/// The [`sample_mappings`] entry targeting `table`.
pub(crate) fn sample_mapping(table: &str) -> MappingDocument {
    sample_mappings()
        .into_iter()
        .find(|m| m.target_name() == table)
        .unwrap()
}

struct InjectedFailure {
    table: String,
    on_call: u32,
    remaining: u32,
    kind: LoadFailure,
}

#[derive(Default)]
struct TargetState {
    ddl: Vec<String>,
    tables: HashMap<String, (Vec<String>, Vec<Vec<SqlValue>>)>,
    load_calls: HashMap<String, u32>,
    failures: Vec<InjectedFailure>,
    fk_events: Vec<String>,
    fail_aggregates: bool,
    disconnected: bool,
}

/// Target recording DDL and rows, with injectable load failures.
pub(crate) struct MemoryTarget {
    state: Mutex<TargetState>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TargetState::default()),
        }
    }

    /// Fail `times` loads into `table`, starting at its `on_call`-th load (1-based).
    pub fn fail_load(&self, table: &str, on_call: u32, times: u32, kind: LoadFailure) {
        self.state.lock().unwrap().failures.push(InjectedFailure {
            table: table.to_string(),
            on_call,
            remaining: times,
            kind,
        });
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    /// Drop the session: every later load fails with a connection error.
    pub fn disconnect(&self) {
        self.state.lock().unwrap().disconnected = true;
    }

    pub fn fail_aggregates(&self, fail: bool) {
        self.state.lock().unwrap().fail_aggregates = fail;
    }

    pub fn applied_ddl(&self) -> Vec<String> {
        self.state.lock().unwrap().ddl.clone()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .map_or(0, |(_, rows)| rows.len())
    }

    /// Distinct values loaded into `column`, compared as text.
    pub fn distinct_count(&self, table: &str, column: &str) -> usize {
        let state = self.state.lock().unwrap();
        let Some((columns, rows)) = state.tables.get(table) else {
            return 0;
        };
        let idx = column_index(columns, column).unwrap();
        rows.iter()
            .map(|r| r[idx].to_text())
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn load_calls(&self, table: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .load_calls
            .get(table)
            .copied()
            .unwrap_or(0)
    }

    pub fn fk_events(&self) -> Vec<String> {
        self.state.lock().unwrap().fk_events.clone()
    }
}

#[async_trait]
impl TargetConnector for MemoryTarget {
    fn engine(&self) -> &str {
        "memory"
    }

    async fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    fn render_create_table(
        &self,
        schema: &str,
        table: &str,
        mapping: &MappingDocument,
    ) -> Result<String> {
        let columns: Vec<String> = mapping
            .columns
            .iter()
            .map(|c| format!("{} {}", c.target, c.target_type))
            .collect();
        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {}.{} ({})",
            schema,
            table,
            columns.join(", ")
        ))
    }

    fn render_indexes(
        &self,
        schema: &str,
        table: &str,
        mapping: &MappingDocument,
    ) -> Result<Vec<String>> {
        Ok(mapping
            .grouped_indexes()
            .iter()
            .map(|idx| {
                format!(
                    "CREATE INDEX {} ON {}.{} ({})",
                    idx.name,
                    schema,
                    table,
                    idx.columns.join(", ")
                )
            })
            .collect())
    }

    async fn apply_ddl(&self, statement: &str) -> Result<DdlOutcome> {
        let statement = statement.trim().to_string();
        if !statement.to_uppercase().starts_with("CREATE") {
            return Err(MigrateError::Ddl {
                statement,
                message: "syntax error".into(),
            });
        }
        let mut state = self.state.lock().unwrap();
        if state.ddl.contains(&statement) {
            return Ok(DdlOutcome::AlreadyExists { code: 1050 });
        }
        state.ddl.push(statement);
        Ok(DdlOutcome::Applied)
    }

    async fn bulk_load(
        &self,
        _schema: &str,
        table: &str,
        columns: &[String],
        rows: &[Vec<SqlValue>],
    ) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        if state.disconnected {
            return Err(MigrateError::connection("memory", "not connected"));
        }
        let call = {
            let calls = state.load_calls.entry(table.to_string()).or_insert(0);
            *calls += 1;
            *calls
        };
        if let Some(failure) = state
            .failures
            .iter_mut()
            .find(|f| f.table == table && call >= f.on_call && f.remaining > 0)
        {
            failure.remaining -= 1;
            return Err(MigrateError::load(table, failure.kind, "injected failure"));
        }

        let entry = state
            .tables
            .entry(table.to_string())
            .or_insert_with(|| (columns.to_vec(), Vec::new()));
        entry.1.extend(rows.iter().cloned());
        Ok(rows.len() as u64)
    }

    async fn get_row_count(&self, _schema: &str, table: &str) -> Result<i64> {
        Ok(self.row_count(table) as i64)
    }

    async fn run_aggregate(
        &self,
        _schema: &str,
        table: &str,
        column: &str,
        func: AggregateFn,
    ) -> Result<SqlValue> {
        let state = self.state.lock().unwrap();
        if state.fail_aggregates {
            return Err(MigrateError::Validation("injected aggregate failure".into()));
        }
        let (columns, rows) = state
            .tables
            .get(table)
            .ok_or_else(|| MigrateError::Validation(format!("no table {}", table)))?;
        let idx = column_index(columns, column)
            .ok_or_else(|| MigrateError::Validation(format!("no column {}", column)))?;
        Ok(aggregate(rows.iter().filter_map(|r| r.get(idx)), func))
    }

    async fn disable_fk_constraints(&self, _schema: &str, table: &str) -> Result<()> {
        self.state.lock().unwrap().fk_events.push(format!("off:{}", table));
        Ok(())
    }

    async fn enable_fk_constraints(&self, _schema: &str, table: &str) -> Result<()> {
        self.state.lock().unwrap().fk_events.push(format!("on:{}", table));
        Ok(())
    }

    async fn close(&mut self) {}
}
