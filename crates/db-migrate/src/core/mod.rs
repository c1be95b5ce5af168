//! Core abstractions for engine-agnostic migration.
//!
//! - [`schema`]: schema and stats documents produced by extraction
//! - [`mapping`]: per-table mapping documents consumed by later stages
//! - [`value`]: SQL value representation passed between connectors
//! - [`traits`]: source and target connector contracts
//! - [`registry`]: engine name to connector constructor
//!
//! # Architecture
//!
//! The core defines engine-neutral types that are implemented by the driver
//! modules (`drivers/mssql`, `drivers/postgres`, `drivers/mysql`). Stages only
//! ever see `dyn SourceConnector` and `dyn TargetConnector`, so a new engine is
//! onboarded by writing a connector and registering it.

pub mod identifier;
pub mod mapping;
pub mod registry;
pub mod schema;
pub mod traits;
pub mod value;

// Re-export commonly used types for convenience
pub use mapping::{ColumnMapping, IndexSpec, MappingDocument};
pub use registry::ConnectorRegistry;
pub use schema::{
    ColumnDescriptor, ColumnStats, ForeignKeyRef, IndexInfo, PrimaryKey, SchemaDocument,
    SqlObject, SqlObjectKind, StatsDocument, TableSchema, TableStats,
};
pub use traits::{AggregateFn, DdlOutcome, SourceConnector, TargetConnector};
pub use value::{Page, SqlValue};
