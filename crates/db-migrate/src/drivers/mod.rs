//! Database driver implementations.
//!
//! Each driver module implements one side of the connector contracts in
//! [`crate::core::traits`]:
//!
//! - [`mssql`]: Microsoft SQL Server source (tiberius + bb8)
//! - [`postgres`]: PostgreSQL source (tokio-postgres + deadpool-postgres)
//! - [`mysql`]: MySQL/MariaDB target (mysql_async)
//! - [`common`]: shared catalog helpers and TLS setup
//!
//! # Adding New Databases
//!
//! 1. Create a new module under `drivers/` with a settings struct and a
//!    connector type implementing `SourceConnector` or `TargetConnector`
//! 2. Give the connector a `from_settings(&serde_yaml::Value)` constructor
//! 3. Register it in [`ConnectorRegistry::with_builtins`](crate::core::ConnectorRegistry::with_builtins)

pub mod common;
pub mod mssql;
pub mod mysql;
pub mod postgres;

pub use common::SslMode;
pub use mssql::{MssqlSettings, MssqlSource};
pub use mysql::{MysqlSettings, MysqlTarget};
pub use postgres::{PostgresSettings, PostgresSource};
