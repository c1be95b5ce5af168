//! MySQL/MariaDB target connector.
//!
//! - [`MysqlSettings`]: the `mysql:` (or `mariadb:`) configuration sub-document
//! - [`MysqlTarget`]: [`TargetConnector`](crate::core::TargetConnector) over mysql_async
//!
//! # Supported Versions
//!
//! - MySQL 5.7+, 8.0+
//! - MariaDB 10.2+

mod writer;

pub use writer::MysqlTarget;

use serde::{Deserialize, Serialize};

use crate::drivers::common::SslMode;

/// Connection settings for a MySQL or MariaDB target.
#[derive(Clone, Serialize, Deserialize)]
pub struct MysqlSettings {
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub database: String,

    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub ssl_mode: SslMode,
}

fn default_port() -> u16 {
    3306
}

impl std::fmt::Debug for MysqlSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MysqlSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults_and_redaction() {
        let settings: MysqlSettings =
            serde_yaml::from_str("host: db\ndatabase: sales\nuser: root\npassword: hunter2")
                .unwrap();
        assert_eq!(settings.port, 3306);
        assert_eq!(settings.ssl_mode, SslMode::Disable);

        let debug = format!("{:?}", settings);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
    }
}
