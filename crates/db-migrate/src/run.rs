//! Run identifiers and the per-run artifact layout.
//!
//! Every artifact a stage writes lives under `<root>/<kind>/<run_id>/`, so
//! concurrent and historical runs never collide:
//!
//! ```text
//! artifacts/
//!   schemas/<run>/<database>_schema.json, views/, routines/, triggers/
//!   stats/<run>/<database>_stats.json
//!   mappings/<run>/draft/*.json
//!   mappings/<run>/approved/*.json, views/, routines/, triggers/
//!   ddl/<run>/*.sql
//!   checkpoints/<run>/<table>.json
//!   dlq/<run>/<table>_offset_<n>.csv
//!   reports/<run>/validation_<timestamp>.json
//!   runs/<run>/manifest.json
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::identifier::{bare_table_name, file_stem};
use crate::core::mapping::MappingDocument;
use crate::core::schema::{SchemaDocument, SqlObjectKind};
use crate::error::{MigrateError, Result};

/// Artifact kinds, each a top-level directory with one sub-directory per run.
pub const ARTIFACT_KINDS: &[&str] = &[
    "schemas",
    "stats",
    "mappings",
    "ddl",
    "checkpoints",
    "dlq",
    "reports",
    "runs",
];

/// New run identifier: `run-YYYYMMDD-HHMMSS-xxxxxx`.
///
/// Lexical order equals creation order to the second; the random suffix
/// separates runs started in the same second.
pub fn new_run_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("run-{}-{}", Utc::now().format("%Y%m%d-%H%M%S"), &suffix[..6])
}

/// Written by `extract`, the first stage of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub source_engine: String,
    pub target_engine: String,
    pub config_hash: String,
}

/// Paths of every artifact belonging to one run.
#[derive(Debug, Clone)]
pub struct RunPaths {
    root: PathBuf,
    run_id: String,
}

impl RunPaths {
    pub fn new(root: impl Into<PathBuf>, run_id: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            run_id: run_id.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn kind_dir(&self, kind: &str) -> PathBuf {
        self.root.join(kind).join(&self.run_id)
    }

    pub fn schemas_dir(&self) -> PathBuf {
        self.kind_dir("schemas")
    }

    pub fn schema_doc_path(&self, database: &str) -> PathBuf {
        self.schemas_dir()
            .join(format!("{}_schema.json", file_stem(database)))
    }

    /// Captured source SQL for one object kind.
    pub fn source_objects_dir(&self, kind: SqlObjectKind) -> PathBuf {
        self.schemas_dir().join(kind.dir_name())
    }

    pub fn stats_dir(&self) -> PathBuf {
        self.kind_dir("stats")
    }

    pub fn stats_doc_path(&self, database: &str) -> PathBuf {
        self.stats_dir()
            .join(format!("{}_stats.json", file_stem(database)))
    }

    pub fn drafts_dir(&self) -> PathBuf {
        self.kind_dir("mappings").join("draft")
    }

    pub fn approved_dir(&self) -> PathBuf {
        self.kind_dir("mappings").join("approved")
    }

    /// Approved target-dialect SQL for one object kind.
    pub fn approved_objects_dir(&self, kind: SqlObjectKind) -> PathBuf {
        self.approved_dir().join(kind.dir_name())
    }

    pub fn ddl_dir(&self) -> PathBuf {
        self.kind_dir("ddl")
    }

    pub fn checkpoints_dir(&self) -> PathBuf {
        self.kind_dir("checkpoints")
    }

    pub fn dlq_dir(&self) -> PathBuf {
        self.kind_dir("dlq")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.kind_dir("reports")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.kind_dir("runs").join("manifest.json")
    }

    /// The schema document of this run, if extraction has written one.
    ///
    /// With several databases extracted under one run the first by file name wins.
    pub fn find_schema_doc(&self) -> Result<Option<SchemaDocument>> {
        let dir = self.schemas_dir();
        if !dir.is_dir() {
            return Ok(None);
        }
        let mut candidates: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with("_schema.json"))
            })
            .collect();
        candidates.sort();
        match candidates.first() {
            Some(path) => Ok(Some(read_json(path)?)),
            None => Ok(None),
        }
    }
}

/// Write a value as single-line JSON, atomically (temp file, then rename).
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string(value)?;
    let temp_path = path.with_extension("json.tmp");
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// `*.json` files directly inside `dir`, sorted by file name.
/// A missing directory has no files.
pub fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

/// Every mapping document in a directory, in file-name order.
pub fn load_mappings(dir: &Path) -> Result<Vec<(PathBuf, MappingDocument)>> {
    json_files(dir)?
        .into_iter()
        .map(|path| {
            let doc = MappingDocument::load(&path)?;
            Ok((path, doc))
        })
        .collect()
}

fn mapping_matches(path: &Path, doc: &MappingDocument, table: &str) -> bool {
    let stem_matches = path
        .file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.eq_ignore_ascii_case(&file_stem(table)));
    stem_matches
        || doc.source_table.eq_ignore_ascii_case(table)
        || doc.target_table.eq_ignore_ascii_case(table)
        || bare_table_name(&doc.source_table).eq_ignore_ascii_case(table)
        || doc.target_name().eq_ignore_ascii_case(table)
}

/// Move draft mappings into the approved directory.
///
/// `tables` selects drafts by file stem, source table or target table; an
/// empty selection approves every draft. A selected table without a draft is
/// an error and nothing is moved.
pub fn approve(paths: &RunPaths, tables: &[String]) -> Result<Vec<PathBuf>> {
    let drafts = load_mappings(&paths.drafts_dir())?;

    let selected: Vec<&PathBuf> = if tables.is_empty() {
        drafts.iter().map(|(p, _)| p).collect()
    } else {
        let mut selected = Vec::with_capacity(tables.len());
        for table in tables {
            let found = drafts
                .iter()
                .find(|(path, doc)| mapping_matches(path, doc, table))
                .ok_or_else(|| {
                    MigrateError::Mapping(format!(
                        "no draft mapping for '{}' in run {}",
                        table,
                        paths.run_id()
                    ))
                })?;
            if !selected.contains(&&found.0) {
                selected.push(&found.0);
            }
        }
        selected
    };

    let approved_dir = paths.approved_dir();
    std::fs::create_dir_all(&approved_dir)?;

    let mut moved = Vec::with_capacity(selected.len());
    for draft in selected {
        let Some(name) = draft.file_name() else {
            continue;
        };
        let dest = approved_dir.join(name);
        std::fs::rename(draft, &dest)?;
        debug!("Approved {}", dest.display());
        moved.push(dest);
    }
    info!("Approved {} mapping(s) for run {}", moved.len(), paths.run_id());
    Ok(moved)
}

/// Delete all but the newest `keep` runs from every artifact kind.
///
/// Runs are ordered by identifier. Returns the removed run identifiers.
pub fn cleanup_old_runs(root: &Path, keep: usize) -> Result<Vec<String>> {
    let mut runs = BTreeSet::new();
    for kind in ARTIFACT_KINDS {
        let dir = root.join(kind);
        if !dir.is_dir() {
            continue;
        }
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    runs.insert(name.to_string());
                }
            }
        }
    }

    let remove: Vec<String> = runs
        .iter()
        .rev()
        .skip(keep)
        .cloned()
        .collect();

    for run_id in &remove {
        for kind in ARTIFACT_KINDS {
            let dir = root.join(kind).join(run_id);
            if dir.is_dir() {
                std::fs::remove_dir_all(&dir)?;
            }
        }
        info!("Removed run {}", run_id);
    }
    Ok(remove)
}
