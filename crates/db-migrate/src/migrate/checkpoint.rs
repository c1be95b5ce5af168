//! Per-table checkpoint files.
//!
//! A checkpoint is the only persisted migration progress. It is rewritten
//! atomically after every confirmed chunk load, never before.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::identifier::file_stem;
use crate::error::Result;
use crate::run::{json_files, read_json, write_json_atomic};

/// Migration progress for one table in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub table: String,
    pub last_offset: u64,
    pub rows_loaded: u64,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(table: impl Into<String>, last_offset: u64, rows_loaded: u64) -> Self {
        Self {
            table: table.into(),
            last_offset,
            rows_loaded,
            updated_at: Utc::now(),
        }
    }
}

/// Checkpoint directory of one run.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(table)))
    }

    pub fn load(&self, table: &str) -> Result<Option<Checkpoint>> {
        let path = self.path(table);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(read_json(&path)?))
    }

    pub fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        write_json_atomic(&self.path(&checkpoint.table), checkpoint)
    }

    /// All checkpoints of the run, by file name.
    pub fn list(&self) -> Result<Vec<Checkpoint>> {
        json_files(&self.dir)?
            .iter()
            .map(|path| read_json(path))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_checkpoint_is_none() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("cp"));
        assert!(store.load("orders").unwrap().is_none());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_save_overwrites_and_lists() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());

        store.save(&Checkpoint::new("orders", 100, 100)).unwrap();
        store.save(&Checkpoint::new("orders", 200, 200)).unwrap();
        store.save(&Checkpoint::new("customers", 50, 50)).unwrap();

        let cp = store.load("orders").unwrap().unwrap();
        assert_eq!((cp.last_offset, cp.rows_loaded), (200, 200));

        let all = store.list().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].table, "customers");

        let raw = std::fs::read_to_string(store.path("orders")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        for key in ["table", "last_offset", "rows_loaded", "updated_at"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }
}
