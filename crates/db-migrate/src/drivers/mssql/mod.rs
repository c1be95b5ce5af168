//! Microsoft SQL Server source connector.
//!
//! - [`MssqlSettings`]: the `mssql:` configuration sub-document
//! - [`MssqlSource`]: [`SourceConnector`](crate::core::SourceConnector) over tiberius + bb8

mod reader;

pub use reader::MssqlSource;

use serde::{Deserialize, Serialize};

/// Connection settings for a SQL Server source.
#[derive(Clone, Serialize, Deserialize)]
pub struct MssqlSettings {
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub database: String,

    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Require TLS on the TDS connection.
    #[serde(default = "default_true")]
    pub encrypt: bool,

    /// Accept self-signed server certificates.
    #[serde(default)]
    pub trust_server_cert: bool,

    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

fn default_port() -> u16 {
    1433
}

fn default_true() -> bool {
    true
}

fn default_pool_size() -> u32 {
    4
}

impl std::fmt::Debug for MssqlSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("encrypt", &self.encrypt)
            .field("trust_server_cert", &self.trust_server_cert)
            .field("pool_size", &self.pool_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults_and_redaction() {
        let settings: MssqlSettings = serde_yaml::from_str(
            "host: sql.local\ndatabase: Sales\nuser: sa\npassword: Sup3rSecret",
        )
        .unwrap();
        assert_eq!(settings.port, 1433);
        assert!(settings.encrypt);
        assert!(!settings.trust_server_cert);

        let debug = format!("{:?}", settings);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("Sup3rSecret"));
    }
}
