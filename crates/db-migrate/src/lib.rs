//! # db-migrate
//!
//! Heterogeneous schema and data migration between relational engines.
//!
//! A run moves through independent, re-runnable stages that communicate only
//! through artifact files scoped by a run id:
//!
//! - **Extract**: schema document, stats document and view/routine/trigger SQL
//!   from a source engine
//! - **Apply schema**: target DDL rendered from approved mapping documents and
//!   applied idempotently
//! - **Migrate**: chunked extract, transform and load with checkpointed resume,
//!   bounded retry and dead-letter capture
//! - **Validate**: row count, aggregate and distinct-count checks against both
//!   engines
//!
//! Engines plug in through [`SourceConnector`] and [`TargetConnector`] and are
//! looked up by name in the [`ConnectorRegistry`]. Built in: SQL Server and
//! PostgreSQL sources, MySQL/MariaDB target.
//!
//! ## Example
//!
//! ```rust,no_run
//! use db_migrate::{Config, ConnectorRegistry, MigrationEngine, RunPaths};
//! use db_migrate::run::load_mappings;
//!
//! # async fn run() -> db_migrate::Result<()> {
//! let config = Config::load("config.yaml")?;
//! let registry = ConnectorRegistry::with_builtins();
//!
//! let mut source = registry.create_source(&config.source.engine, config.source.settings()?)?;
//! let mut target = registry.create_target(&config.target.engine, config.target.settings()?)?;
//! source.connect().await?;
//! target.connect().await?;
//!
//! let paths = RunPaths::new(&config.artifacts.root, "run-20240115-123045-a1b2c3");
//! let mappings: Vec<_> = load_mappings(&paths.approved_dir())?
//!     .into_iter()
//!     .map(|(_, doc)| doc)
//!     .collect();
//!
//! let engine = MigrationEngine::new(
//!     source.as_ref(),
//!     target.as_ref(),
//!     config.migration.clone(),
//!     config.target.schema_name(),
//!     paths,
//! );
//! let summary = engine.migrate_all(&mappings, &[]).await;
//! println!("Migrated {} rows", summary.total_rows());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod ddl;
pub mod dialect;
pub mod drivers;
pub mod error;
pub mod extract;
pub mod migrate;
pub mod run;
pub mod topo;
pub mod validate;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, SourceConfig, TargetConfig, ValidationConfig};
pub use core::{
    ConnectorRegistry, MappingDocument, SchemaDocument, SourceConnector, SqlValue,
    TargetConnector,
};
pub use dialect::CanonicalType;
pub use error::{MigrateError, Result};
pub use migrate::{MigrationEngine, MigrationSummary, TableSummary};
pub use run::{RunManifest, RunPaths};
pub use validate::{ValidationReport, Validator};
