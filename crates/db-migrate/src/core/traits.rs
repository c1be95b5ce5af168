//! Connector contracts.
//!
//! The pipeline never writes engine-specific SQL. It drives engines through
//! two capability traits:
//!
//! - [`SourceConnector`]: schema introspection, paged reads, aggregates
//! - [`TargetConnector`]: DDL rendering and application, bulk loads, aggregates
//!
//! Each engine has one concrete type per role. Optional capabilities
//! (views, routines, triggers, raw DDL) have default implementations that
//! report "nothing available" so engines without them need no code.
//!
//! # Design Patterns
//!
//! - **Strategy**: one connector type per engine behind a common trait
//! - **Template Method**: [`SourceConnector::load_table`] composes the
//!   per-aspect introspection calls

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::mapping::MappingDocument;
use crate::core::schema::{
    ColumnDescriptor, ColumnStats, ForeignKeyRef, IndexInfo, PrimaryKey, TableSchema,
};
use crate::core::value::{Page, SqlValue};
use crate::error::Result;

/// Aggregate functions used by validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregateFn {
    Sum,
    Min,
    Max,
    CountDistinct,
}

impl AggregateFn {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateFn::Sum => "SUM",
            AggregateFn::Min => "MIN",
            AggregateFn::Max => "MAX",
            AggregateFn::CountDistinct => "COUNT_DISTINCT",
        }
    }

    /// SQL expression over an already-quoted column.
    ///
    /// SUM is wrapped in `COALESCE(.., 0)` so an all-NULL column sums to zero
    /// on every engine.
    pub fn expression(&self, quoted_column: &str) -> String {
        match self {
            AggregateFn::Sum => format!("COALESCE(SUM({}), 0)", quoted_column),
            AggregateFn::Min => format!("MIN({})", quoted_column),
            AggregateFn::Max => format!("MAX({})", quoted_column),
            AggregateFn::CountDistinct => format!("COUNT(DISTINCT {})", quoted_column),
        }
    }
}

/// Result of applying one DDL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlOutcome {
    Applied,
    /// The engine reported an idempotent-duplicate condition with this native code.
    AlreadyExists { code: u32 },
}

/// Read-side capabilities every source engine provides.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Registry key of this engine.
    fn engine(&self) -> &str;

    /// Open the connection. Called once before any other method.
    async fn connect(&mut self) -> Result<()>;

    /// Base tables in the given schemas (connector default when empty).
    /// Returned entries carry schema, name, kind and comment only.
    async fn list_tables(&self, schemas: &[String]) -> Result<Vec<TableSchema>>;

    async fn get_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnDescriptor>>;

    async fn get_primary_keys(&self, schema: &str, table: &str) -> Result<PrimaryKey>;

    async fn get_foreign_keys(&self, schema: &str, table: &str) -> Result<Vec<ForeignKeyRef>>;

    /// Non-primary-key indexes.
    async fn get_indexes(&self, schema: &str, table: &str) -> Result<Vec<IndexInfo>>;

    /// Single-statement DDL, when the engine can produce it.
    async fn get_raw_ddl(&self, _schema: &str, _table: &str) -> Result<Option<String>> {
        Ok(None)
    }

    /// Null rate, distinct count, min and max over at most `sample_rows` rows.
    async fn get_column_stats(
        &self,
        schema: &str,
        table: &str,
        column: &ColumnDescriptor,
        sample_rows: u64,
    ) -> Result<ColumnStats>;

    /// Read `limit` rows starting at `offset`, ordered by the first column.
    async fn extract_chunk(
        &self,
        schema: &str,
        table: &str,
        columns: &[String],
        offset: u64,
        limit: u64,
    ) -> Result<Page>;

    async fn run_aggregate(
        &self,
        schema: &str,
        table: &str,
        column: &str,
        func: AggregateFn,
    ) -> Result<SqlValue>;

    async fn get_row_count(&self, schema: &str, table: &str) -> Result<i64>;

    async fn list_views(&self, _schema: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn get_view_definition(&self, _schema: &str, _name: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn list_routines(&self, _schema: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn get_routine_definition(&self, _schema: &str, _name: &str) -> Result<Option<String>> {
        Ok(None)
    }

    /// `(table, trigger)` pairs.
    async fn list_triggers(&self, _schema: &str) -> Result<Vec<(String, String)>> {
        Ok(Vec::new())
    }

    async fn get_trigger_definition(
        &self,
        _schema: &str,
        _table: &str,
        _name: &str,
    ) -> Result<Option<String>> {
        Ok(None)
    }

    /// Fill in columns, keys, indexes and raw DDL for a listed table.
    async fn load_table(&self, mut table: TableSchema) -> Result<TableSchema> {
        table.columns = self.get_columns(&table.schema, &table.name).await?;
        table.primary_key = self.get_primary_keys(&table.schema, &table.name).await?;
        table.foreign_keys = self.get_foreign_keys(&table.schema, &table.name).await?;
        table.indexes = self.get_indexes(&table.schema, &table.name).await?;
        table.raw_ddl = self.get_raw_ddl(&table.schema, &table.name).await?;
        Ok(table)
    }

    /// Release the connection. Safe to call more than once.
    async fn close(&mut self);
}

/// Write-side capabilities every target engine provides.
#[async_trait]
pub trait TargetConnector: Send + Sync {
    /// Registry key of this engine.
    fn engine(&self) -> &str;

    async fn connect(&mut self) -> Result<()>;

    /// `CREATE TABLE` for a mapping, with nullability, auto-increment and a
    /// single composite primary key from the `primary_key` role columns.
    fn render_create_table(
        &self,
        schema: &str,
        table: &str,
        mapping: &MappingDocument,
    ) -> Result<String>;

    /// One `CREATE INDEX` per grouped index in the mapping.
    fn render_indexes(
        &self,
        schema: &str,
        table: &str,
        mapping: &MappingDocument,
    ) -> Result<Vec<String>>;

    /// Execute one statement. Duplicate-object conditions are reported as
    /// [`DdlOutcome::AlreadyExists`], never as errors.
    async fn apply_ddl(&self, statement: &str) -> Result<DdlOutcome>;

    /// Insert rows; returns the number actually loaded.
    ///
    /// A missing table must surface as a `Load` error of kind
    /// [`LoadFailure::MissingTable`](crate::error::LoadFailure::MissingTable).
    async fn bulk_load(
        &self,
        schema: &str,
        table: &str,
        columns: &[String],
        rows: &[Vec<SqlValue>],
    ) -> Result<u64>;

    async fn get_row_count(&self, schema: &str, table: &str) -> Result<i64>;

    async fn run_aggregate(
        &self,
        schema: &str,
        table: &str,
        column: &str,
        func: AggregateFn,
    ) -> Result<SqlValue>;

    /// May be session-scoped rather than table-scoped depending on the engine.
    async fn disable_fk_constraints(&self, schema: &str, table: &str) -> Result<()>;

    async fn enable_fk_constraints(&self, schema: &str, table: &str) -> Result<()>;

    async fn close(&mut self);
}
