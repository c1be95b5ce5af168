//! Configuration type definitions.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source engine envelope.
    pub source: SourceConfig,

    /// Target engine envelope.
    pub target: TargetConfig,

    /// Migration engine behavior.
    #[serde(default)]
    pub migration: MigrationConfig,

    /// Validation tolerances.
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Where run artifacts live.
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
}

/// Source envelope: `{engine, database, schema_filter, <engine>: {...}}`.
///
/// The `<engine>` sub-document is owned by the connector; the core only
/// routes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Registry key (`mssql`, `postgres`).
    pub engine: String,

    /// Logical database name used in artifact file names.
    #[serde(default)]
    pub database: String,

    /// Schemas to extract. Empty means the connector default.
    #[serde(default)]
    pub schema_filter: Vec<String>,

    /// Per-engine connection sub-documents keyed by engine name.
    #[serde(flatten)]
    pub engines: BTreeMap<String, serde_yaml::Value>,
}

impl SourceConfig {
    /// Connection settings for the selected engine.
    pub fn settings(&self) -> Result<&serde_yaml::Value> {
        engine_settings(&self.engines, &self.engine, "source")
    }

    /// Logical database name, falling back to the connector's `database`.
    pub fn database_name(&self) -> String {
        if !self.database.is_empty() {
            return self.database.clone();
        }
        self.settings()
            .ok()
            .and_then(|v| v.get("database"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| self.engine.clone())
    }
}

/// Target envelope: `{engine, schema, <engine>: {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Registry key (`mysql`, `mariadb`).
    pub engine: String,

    /// Schema (database, on MySQL) that receives every table.
    #[serde(default)]
    pub schema: String,

    /// Per-engine connection sub-documents keyed by engine name.
    #[serde(flatten)]
    pub engines: BTreeMap<String, serde_yaml::Value>,
}

impl TargetConfig {
    /// Connection settings for the selected engine.
    pub fn settings(&self) -> Result<&serde_yaml::Value> {
        engine_settings(&self.engines, &self.engine, "target")
    }

    /// Target schema, falling back to the connector's `database`.
    pub fn schema_name(&self) -> String {
        if !self.schema.is_empty() {
            return self.schema.clone();
        }
        self.settings()
            .ok()
            .and_then(|v| v.get("database"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_default()
    }
}

fn engine_settings<'a>(
    engines: &'a BTreeMap<String, serde_yaml::Value>,
    engine: &str,
    role: &str,
) -> Result<&'a serde_yaml::Value> {
    engines
        .get(engine)
        .or_else(|| engines.get(&engine.to_lowercase()))
        .ok_or_else(|| {
            MigrateError::Config(format!("{}.{} settings are required", role, engine))
        })
}

/// Migration engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Rows per extracted page.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Load attempts per page before the page is dead-lettered.
    #[serde(default = "default_max_chunk_failures")]
    pub max_chunk_failures: u32,

    /// Disable target FK checks while a table loads.
    #[serde(default = "default_true")]
    pub disable_fk_during_load: bool,

    /// First retry delay; doubles on each attempt.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Upper bound on a single retry delay.
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Order tables parent-first using schema-document foreign keys.
    #[serde(default)]
    pub dependency_order: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_chunk_failures: default_max_chunk_failures(),
            disable_fk_during_load: true,
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            dependency_order: false,
        }
    }
}

/// Validation engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Allowed row count drift as a fraction of the source count.
    #[serde(default)]
    pub row_count_tolerance: f64,

    /// Relative tolerance for numeric aggregates.
    #[serde(default = "default_float_tolerance")]
    pub float_tolerance: f64,

    /// Sample size for column stats during extraction.
    #[serde(default = "default_sample_rows")]
    pub sample_rows: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            row_count_tolerance: 0.0,
            float_tolerance: default_float_tolerance(),
            sample_rows: default_sample_rows(),
        }
    }
}

/// Artifact storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Root directory for every artifact kind.
    #[serde(default = "default_artifacts_root")]
    pub root: PathBuf,

    /// Runs kept by `clean`.
    #[serde(default = "default_keep_runs")]
    pub keep_runs: usize,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            root: default_artifacts_root(),
            keep_runs: default_keep_runs(),
        }
    }
}

// Default value functions for serde
fn default_chunk_size() -> u64 {
    100_000
}

fn default_max_chunk_failures() -> u32 {
    5
}

fn default_retry_base_delay_ms() -> u64 {
    2_000
}

fn default_retry_max_delay_ms() -> u64 {
    30_000
}

fn default_float_tolerance() -> f64 {
    0.0001
}

fn default_sample_rows() -> u64 {
    1_000
}

fn default_artifacts_root() -> PathBuf {
    PathBuf::from("artifacts")
}

fn default_keep_runs() -> usize {
    10
}

fn default_true() -> bool {
    true
}
