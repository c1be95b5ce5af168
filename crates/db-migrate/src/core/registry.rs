//! Connector registry for explicit dependency injection.
//!
//! [`ConnectorRegistry`] maps engine names to connector constructors. It is
//! built once at startup and passed by reference; nothing registers itself
//! through import side effects.
//!
//! # Design Rationale
//!
//! - **No global state**: the table is an ordinary value
//! - **Explicit registration**: builtins are listed in one place
//! - **Testable**: tests build a registry holding in-memory connectors

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::traits::{SourceConnector, TargetConnector};
use crate::error::{MigrateError, Result};

/// Builds a source connector from its engine sub-document.
pub type SourceFactory =
    Arc<dyn Fn(&serde_yaml::Value) -> Result<Box<dyn SourceConnector>> + Send + Sync>;

/// Builds a target connector from its engine sub-document.
pub type TargetFactory =
    Arc<dyn Fn(&serde_yaml::Value) -> Result<Box<dyn TargetConnector>> + Send + Sync>;

/// Engine name to connector constructor.
///
/// # Example
///
/// ```rust,ignore
/// let registry = ConnectorRegistry::with_builtins();
/// let source = registry.create_source("mssql", config.source.settings()?)?;
/// ```
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    sources: BTreeMap<String, SourceFactory>,
    targets: BTreeMap<String, TargetFactory>,
}

impl ConnectorRegistry {
    /// A registry with nothing registered.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry holding every connector shipped with the crate.
    pub fn with_builtins() -> Self {
        use crate::drivers::{MssqlSource, MysqlTarget, PostgresSource};

        let mssql: SourceFactory = Arc::new(|settings| {
            Ok(Box::new(MssqlSource::from_settings(settings)?) as Box<dyn SourceConnector>)
        });
        let postgres: SourceFactory = Arc::new(|settings| {
            Ok(Box::new(PostgresSource::from_settings(settings)?) as Box<dyn SourceConnector>)
        });
        let mysql: TargetFactory = Arc::new(|settings| {
            Ok(Box::new(MysqlTarget::from_settings(settings)?) as Box<dyn TargetConnector>)
        });

        Self::empty()
            .with_source("mssql", mssql)
            .with_source("postgres", postgres.clone())
            .with_source("postgresql", postgres)
            .with_target("mysql", mysql.clone())
            .with_target("mariadb", mysql)
    }

    /// Register a source constructor under `name`.
    pub fn with_source(mut self, name: impl Into<String>, factory: SourceFactory) -> Self {
        self.sources.insert(name.into().to_lowercase(), factory);
        self
    }

    /// Register a target constructor under `name`.
    pub fn with_target(mut self, name: impl Into<String>, factory: TargetFactory) -> Self {
        self.targets.insert(name.into().to_lowercase(), factory);
        self
    }

    /// Registered source engine names, sorted.
    pub fn source_engines(&self) -> Vec<&str> {
        self.sources.keys().map(String::as_str).collect()
    }

    /// Registered target engine names, sorted.
    pub fn target_engines(&self) -> Vec<&str> {
        self.targets.keys().map(String::as_str).collect()
    }

    /// Construct an unconnected source connector.
    pub fn create_source(
        &self,
        engine: &str,
        settings: &serde_yaml::Value,
    ) -> Result<Box<dyn SourceConnector>> {
        let factory = self.sources.get(&engine.to_lowercase()).ok_or_else(|| {
            MigrateError::UnknownEngine {
                role: "source",
                name: engine.to_string(),
                valid: self.source_engines().join(", "),
            }
        })?;
        factory(settings)
    }

    /// Construct an unconnected target connector.
    pub fn create_target(
        &self,
        engine: &str,
        settings: &serde_yaml::Value,
    ) -> Result<Box<dyn TargetConnector>> {
        let factory = self.targets.get(&engine.to_lowercase()).ok_or_else(|| {
            MigrateError::UnknownEngine {
                role: "target",
                name: engine.to_string(),
                valid: self.target_engines().join(", "),
            }
        })?;
        factory(settings)
    }
}

impl std::fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorRegistry")
            .field("sources", &self.source_engines())
            .field("targets", &self.target_engines())
            .finish()
    }
}
