//! PostgreSQL source connector.
//!
//! - [`PostgresSettings`]: the `postgres:` configuration sub-document
//! - [`PostgresSource`]: [`SourceConnector`](crate::core::SourceConnector) over
//!   tokio-postgres + deadpool-postgres, including view, routine and trigger capture

mod reader;

pub use reader::PostgresSource;

use serde::{Deserialize, Serialize};

use crate::drivers::common::SslMode;

/// Connection settings for a PostgreSQL source.
#[derive(Clone, Serialize, Deserialize)]
pub struct PostgresSettings {
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub database: String,

    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub ssl_mode: SslMode,

    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_port() -> u16 {
    5432
}

fn default_pool_size() -> usize {
    4
}

impl std::fmt::Debug for PostgresSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .field("pool_size", &self.pool_size)
            .finish()
    }
}
