//! Mapping documents: the per-table contract produced by the external proposal
//! step and consumed by DDL generation, migration and validation.
//!
//! A mapping lives in `mappings/<run>/draft/` until approved, then in
//! `mappings/<run>/approved/`. Status is a location, the `status` field is
//! informational only.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::identifier::{bare_table_name, split_qualified};
use crate::core::schema::SchemaDocument;
use crate::dialect::CanonicalType;
use crate::error::{MigrateError, Result};

/// Role value marking primary key columns.
pub const ROLE_PRIMARY_KEY: &str = "primary_key";

/// How one source column becomes one target column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub source: String,
    pub target: String,
    pub canonical_type: String,
    pub target_type: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub auto_increment: bool,
}

fn default_true() -> bool {
    true
}

impl ColumnMapping {
    pub fn is_primary_key(&self) -> bool {
        self.role.as_deref() == Some(ROLE_PRIMARY_KEY)
    }

    /// Parsed canonical type; `None` when the document carries an unknown name.
    pub fn canonical(&self) -> Option<CanonicalType> {
        CanonicalType::parse(&self.canonical_type).ok()
    }
}

/// Raw index entry as written by the proposal step.
///
/// Some producers write one entry per index with `columns`, others one entry
/// per indexed column with `column`. [`MappingDocument::grouped_indexes`]
/// folds both shapes together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

/// Index after grouping entries by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub unique: bool,
    pub columns: Vec<String>,
}

/// One table's mapping document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingDocument {
    pub source_table: String,
    pub target_table: String,
    pub source_engine: String,
    pub target_engine: String,
    #[serde(default = "default_status")]
    pub status: String,
    pub columns: Vec<ColumnMapping>,
    #[serde(default)]
    pub indexes: Vec<IndexEntry>,
}

fn default_status() -> String {
    "draft".to_string()
}

impl MappingDocument {
    /// Read a mapping document from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            MigrateError::Mapping(format!("{}: {}", path.display(), e))
        })
    }

    /// Source `(schema, table)`; the schema is empty when unqualified.
    pub fn source_parts(&self) -> (&str, &str) {
        let (schema, table) = split_qualified(&self.source_table);
        (schema.unwrap_or(""), table)
    }

    /// Target table name with any schema qualifier removed.
    pub fn target_name(&self) -> &str {
        bare_table_name(&self.target_table)
    }

    /// Columns tagged `role=primary_key`, in document order.
    pub fn primary_key(&self) -> Vec<&ColumnMapping> {
        self.columns.iter().filter(|c| c.is_primary_key()).collect()
    }

    /// Target column names in document order.
    pub fn target_columns(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.target.clone()).collect()
    }

    /// Source column names in document order.
    pub fn source_columns(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.source.clone()).collect()
    }

    /// Look up a column mapping by target name.
    pub fn column_by_target(&self, target: &str) -> Option<&ColumnMapping> {
        self.columns.iter().find(|c| c.target.eq_ignore_ascii_case(target))
    }

    /// Group raw index entries by name, keeping first-seen order for both
    /// indexes and columns. An index is unique if any of its entries says so.
    pub fn grouped_indexes(&self) -> Vec<IndexSpec> {
        let mut grouped: Vec<IndexSpec> = Vec::new();
        for entry in &self.indexes {
            let cols: Vec<String> = match (&entry.columns, &entry.column) {
                (Some(cols), _) => cols.clone(),
                (None, Some(col)) => vec![col.clone()],
                (None, None) => Vec::new(),
            };

            let pos = match grouped.iter().position(|s| s.name == entry.name) {
                Some(pos) => pos,
                None => {
                    grouped.push(IndexSpec {
                        name: entry.name.clone(),
                        unique: false,
                        columns: Vec::new(),
                    });
                    grouped.len() - 1
                }
            };
            let spec = &mut grouped[pos];
            spec.unique |= entry.unique;
            for col in cols {
                if !spec.columns.contains(&col) {
                    spec.columns.push(col);
                }
            }
        }
        grouped.retain(|s| !s.columns.is_empty());
        grouped
    }

    /// Collect every consistency problem in the document.
    ///
    /// When a schema document is supplied, every `source` column must resolve
    /// against the source table it describes.
    pub fn problems(&self, schema: Option<&SchemaDocument>) -> Vec<String> {
        let mut problems = Vec::new();

        if self.source_table.trim().is_empty() {
            problems.push("source_table is empty".to_string());
        }
        if self.target_table.trim().is_empty() {
            problems.push("target_table is empty".to_string());
        }
        if self.columns.is_empty() {
            problems.push("columns is empty".to_string());
        }

        let mut seen_targets = HashSet::new();
        for col in &self.columns {
            if col.source.trim().is_empty() || col.target.trim().is_empty() {
                problems.push("column entry with empty source or target".to_string());
            }
            if !seen_targets.insert(col.target.to_lowercase()) {
                problems.push(format!("target column '{}' appears more than once", col.target));
            }
            if col.canonical().is_none() {
                problems.push(format!(
                    "column '{}' has unknown canonical_type '{}'",
                    col.source, col.canonical_type
                ));
            }
            if col.target_type.trim().is_empty() {
                problems.push(format!("column '{}' has empty target_type", col.source));
            }
        }

        let mut pk_sources = HashSet::new();
        for col in self.primary_key() {
            if !pk_sources.insert(col.source.to_lowercase()) {
                problems.push(format!("primary key lists '{}' more than once", col.source));
            }
        }
        if self
            .grouped_indexes()
            .iter()
            .any(|idx| idx.name.eq_ignore_ascii_case("PRIMARY"))
            && !pk_sources.is_empty()
        {
            problems.push("index named PRIMARY duplicates the primary_key role set".to_string());
        }

        for idx in self.grouped_indexes() {
            for col in &idx.columns {
                if self.column_by_target(col).is_none() {
                    problems.push(format!(
                        "index '{}' references unknown target column '{}'",
                        idx.name, col
                    ));
                }
            }
        }

        if let Some(doc) = schema {
            match doc.find_table(&self.source_table) {
                Some(table) => {
                    for col in &self.columns {
                        if table.column(&col.source).is_none() {
                            problems.push(format!(
                                "source column '{}' not found in {}",
                                col.source,
                                table.full_name()
                            ));
                        }
                    }
                }
                None => problems.push(format!(
                    "source table '{}' not found in schema document",
                    self.source_table
                )),
            }
        }

        problems
    }

    /// Fail with every problem joined into one [`MigrateError::Mapping`].
    pub fn validate(&self, schema: Option<&SchemaDocument>) -> Result<()> {
        let problems = self.problems(schema);
        if problems.is_empty() {
            Ok(())
        } else {
            Err(MigrateError::Mapping(format!(
                "{}: {}",
                self.source_table,
                problems.join("; ")
            )))
        }
    }
}
