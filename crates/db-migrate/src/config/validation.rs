//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.engine.trim().is_empty() {
        return Err(MigrateError::Config("source.engine is required".into()));
    }
    config.source.settings()?;

    // Target validation
    if config.target.engine.trim().is_empty() {
        return Err(MigrateError::Config("target.engine is required".into()));
    }
    config.target.settings()?;
    if config.target.schema_name().is_empty() {
        return Err(MigrateError::Config(
            "target.schema is required when the target settings have no database".into(),
        ));
    }

    // Migration config validation
    let m = &config.migration;
    if m.chunk_size == 0 {
        return Err(MigrateError::Config(
            "migration.chunk_size must be at least 1".into(),
        ));
    }
    if m.max_chunk_failures == 0 {
        return Err(MigrateError::Config(
            "migration.max_chunk_failures must be at least 1".into(),
        ));
    }
    if m.retry_max_delay_ms < m.retry_base_delay_ms {
        return Err(MigrateError::Config(format!(
            "migration.retry_max_delay_ms ({}) must not be below retry_base_delay_ms ({})",
            m.retry_max_delay_ms, m.retry_base_delay_ms
        )));
    }

    // Validation config
    let v = &config.validation;
    if !(v.row_count_tolerance >= 0.0) {
        return Err(MigrateError::Config(
            "validation.row_count_tolerance must be non-negative".into(),
        ));
    }
    if !(v.float_tolerance >= 0.0) {
        return Err(MigrateError::Config(
            "validation.float_tolerance must be non-negative".into(),
        ));
    }
    if v.sample_rows == 0 {
        return Err(MigrateError::Config(
            "validation.sample_rows must be at least 1".into(),
        ));
    }

    if config.artifacts.root.as_os_str().is_empty() {
        return Err(MigrateError::Config("artifacts.root is required".into()));
    }

    Ok(())
}
