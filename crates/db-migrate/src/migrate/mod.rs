//! Chunked migration engine.
//!
//! Per table: optionally disable target FK checks, then loop
//! extract → transform → load with bounded retry, writing a checkpoint after
//! each confirmed load, and finally re-enable FK checks. A page that cannot be
//! loaded is written to a dead-letter CSV unless the target table is missing.
//!
//! Chunk N+1 is never read before chunk N is loaded or abandoned; checkpoint
//! correctness depends on that ordering.

pub mod checkpoint;
pub mod dead_letter;
pub mod retry;
pub mod transform;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use dead_letter::write_dead_letter;
pub use retry::{load_with_retry, LoadOutcome, RetryPolicy};
pub use transform::transform_page;

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::MigrationConfig;
use crate::core::mapping::MappingDocument;
use crate::core::traits::{SourceConnector, TargetConnector};
use crate::error::Result;
use crate::run::RunPaths;

/// Outcome of one table, as reported by `migrate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub table: String,
    pub rows_loaded: u64,
    pub failures: u32,
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of [`MigrationEngine::migrate_all`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationSummary {
    pub run_id: String,
    pub tables: Vec<TableSummary>,
}

impl MigrationSummary {
    pub fn failed_tables(&self) -> usize {
        self.tables.iter().filter(|t| t.failures > 0).count()
    }

    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|t| t.rows_loaded).sum()
    }
}

/// Drives tables from one connected source into one connected target.
pub struct MigrationEngine<'a> {
    source: &'a dyn SourceConnector,
    target: &'a dyn TargetConnector,
    config: MigrationConfig,
    target_schema: String,
    paths: RunPaths,
    policy: RetryPolicy,
}

impl<'a> MigrationEngine<'a> {
    pub fn new(
        source: &'a dyn SourceConnector,
        target: &'a dyn TargetConnector,
        config: MigrationConfig,
        target_schema: impl Into<String>,
        paths: RunPaths,
    ) -> Self {
        let policy = RetryPolicy::from_config(&config);
        Self {
            source,
            target,
            config,
            target_schema: target_schema.into(),
            paths,
            policy,
        }
    }

    pub fn checkpoints(&self) -> CheckpointStore {
        CheckpointStore::new(self.paths.checkpoints_dir())
    }

    /// Migrate one table, resuming from its checkpoint. Returns rows loaded
    /// in total, including rows loaded by earlier attempts of this run.
    pub async fn migrate_table(&self, mapping: &MappingDocument) -> Result<u64> {
        let table = mapping.target_name();
        let disable_fk = self.config.disable_fk_during_load;

        if disable_fk {
            if let Err(e) = self
                .target
                .disable_fk_constraints(&self.target_schema, table)
                .await
            {
                warn!("{}: could not disable FK checks: {}", table, e);
            }
        }

        let result = self.chunk_loop(mapping).await;

        if disable_fk {
            if let Err(e) = self
                .target
                .enable_fk_constraints(&self.target_schema, table)
                .await
            {
                warn!("{}: could not re-enable FK checks: {}", table, e);
            }
        }
        result
    }

    async fn chunk_loop(&self, mapping: &MappingDocument) -> Result<u64> {
        let (source_schema, source_table) = mapping.source_parts();
        let table = mapping.target_name();
        let source_columns = mapping.source_columns();
        let target_columns = mapping.target_columns();
        let store = self.checkpoints();

        let (mut offset, mut rows_loaded) = match store.load(table)? {
            Some(cp) => {
                info!(
                    "{}: resuming at offset {} ({} rows already loaded)",
                    table, cp.last_offset, cp.rows_loaded
                );
                (cp.last_offset, cp.rows_loaded)
            }
            None => (0, 0),
        };

        let start = Instant::now();
        let label = format!("{}.{}", self.target_schema, table);
        loop {
            let page = self
                .source
                .extract_chunk(
                    source_schema,
                    source_table,
                    &source_columns,
                    offset,
                    self.config.chunk_size,
                )
                .await?;
            if page.is_empty() {
                break;
            }

            let read = page.len() as u64;
            let rows = transform_page(&page, mapping);

            let loaded = load_with_retry(&self.policy, &label, || {
                self.target
                    .bulk_load(&self.target_schema, table, &target_columns, &rows)
            })
            .await;

            match loaded {
                Ok(n) => {
                    rows_loaded += n;
                    offset += read;
                    store.save(&Checkpoint::new(table, offset, rows_loaded))?;
                    debug!("{}: loaded {} rows, offset now {}", table, n, offset);
                }
                Err(e) => {
                    if e.is_missing_table() {
                        error!("{}: target table is missing; re-apply the schema", label);
                    } else if e.is_data_load() {
                        if let Err(dlq) = write_dead_letter(
                            &self.paths.dlq_dir(),
                            table,
                            offset,
                            &target_columns,
                            &rows,
                        ) {
                            error!("{}: could not write dead-letter file: {}", label, dlq);
                        }
                    }
                    return Err(e);
                }
            }
        }

        info!(
            "{}: {} rows in {:.1}s",
            table,
            rows_loaded,
            start.elapsed().as_secs_f64()
        );
        Ok(rows_loaded)
    }

    /// Migrate every mapping in order, optionally restricted to `only`
    /// (matched against source or target table names, case-insensitive).
    ///
    /// A failing table is recorded with zero rows and does not stop the rest.
    pub async fn migrate_all(
        &self,
        mappings: &[MappingDocument],
        only: &[String],
    ) -> MigrationSummary {
        let run_id = self.paths.run_id().to_string();
        let selected: Vec<&MappingDocument> = mappings
            .iter()
            .filter(|m| only.is_empty() || only.iter().any(|t| matches_table(m, t)))
            .collect();
        info!("Migrating {} table(s) for run {}", selected.len(), run_id);

        let mut tables = Vec::with_capacity(selected.len());
        for mapping in selected {
            let table = mapping.target_name().to_string();
            let summary = match self.migrate_table(mapping).await {
                Ok(rows_loaded) => TableSummary {
                    table,
                    rows_loaded,
                    failures: 0,
                    run_id: run_id.clone(),
                    error: None,
                },
                Err(e) => {
                    error!("{}: failed - {}", table, e);
                    TableSummary {
                        table,
                        rows_loaded: 0,
                        failures: 1,
                        run_id: run_id.clone(),
                        error: Some(e.to_string()),
                    }
                }
            };
            tables.push(summary);
        }

        let summary = MigrationSummary { run_id, tables };
        info!(
            "Migration finished: {} rows, {} failed table(s)",
            summary.total_rows(),
            summary.failed_tables()
        );
        summary
    }
}

fn matches_table(mapping: &MappingDocument, name: &str) -> bool {
    let (_, source_table) = mapping.source_parts();
    mapping.target_name().eq_ignore_ascii_case(name)
        || mapping.target_table.eq_ignore_ascii_case(name)
        || mapping.source_table.eq_ignore_ascii_case(name)
        || source_table.eq_ignore_ascii_case(name)
}
