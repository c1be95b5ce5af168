//! Schema and statistics documents produced by extraction.
//!
//! These types are the on-disk contract read by the mapping-proposal step, so
//! field names are part of the compatibility surface. All of them serialize to
//! single-line JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::identifier::split_qualified;
use crate::dialect::CanonicalType;

/// One source column, immutable after extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Native type name exactly as the source reported it.
    pub source_type_raw: String,
    pub canonical_type: CanonicalType,
    #[serde(default)]
    pub length: Option<u32>,
    #[serde(default)]
    pub precision: Option<u32>,
    #[serde(default)]
    pub scale: Option<u32>,
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<String>,
    pub ordinal: u32,
    /// Engine notes such as `IDENTITY`, `COMPUTED` or `SERIAL`.
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub charset: Option<String>,
}

/// Primary key columns in key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrimaryKey {
    pub columns: Vec<String>,
    #[serde(rename = "type", default = "default_pk_type")]
    pub kind: String,
}

fn default_pk_type() -> String {
    "pk".to_string()
}

impl PrimaryKey {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            kind: default_pk_type(),
        }
    }
}

/// Single-column foreign key reference. Composite keys appear as one entry per column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub column: String,
    pub parent_schema: String,
    pub parent_table: String,
    pub parent_column: String,
}

/// Non-primary-key index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub unique: bool,
    pub columns: Vec<String>,
}

/// One extracted table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub schema: String,
    pub name: String,
    #[serde(default = "default_table_kind")]
    pub table_kind: String,
    #[serde(default)]
    pub comment: Option<String>,
    pub columns: Vec<ColumnDescriptor>,
    #[serde(default)]
    pub primary_key: PrimaryKey,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyRef>,
    #[serde(default)]
    pub indexes: Vec<IndexInfo>,
    #[serde(default)]
    pub raw_ddl: Option<String>,
}

fn default_table_kind() -> String {
    "BASE TABLE".to_string()
}

impl TableSchema {
    /// Create an empty table entry.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            table_kind: default_table_kind(),
            comment: None,
            columns: Vec::new(),
            primary_key: PrimaryKey::default(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
            raw_ddl: None,
        }
    }

    /// `schema.name`
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Schema document, one per source database per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub source_engine: String,
    pub database: String,
    pub extracted_at: DateTime<Utc>,
    pub tables: Vec<TableSchema>,
}

impl SchemaDocument {
    /// Find a table by `schema.name` or bare name (case-insensitive).
    pub fn find_table(&self, qualified: &str) -> Option<&TableSchema> {
        let (schema, name) = split_qualified(qualified);
        self.tables.iter().find(|t| {
            t.name.eq_ignore_ascii_case(name)
                && schema.map_or(true, |s| t.schema.eq_ignore_ascii_case(s))
        })
    }
}

/// Column profile over a bounded sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub name: String,
    pub null_rate: Option<f64>,
    pub distinct_count: Option<i64>,
    pub min: Option<String>,
    pub max: Option<String>,
    pub max_len: Option<i64>,
}

impl ColumnStats {
    /// Stats entry with every measurement missing.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableStats {
    pub schema: String,
    pub name: String,
    pub row_count: Option<i64>,
    pub columns: Vec<ColumnStats>,
}

/// Stats document written next to the schema document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsDocument {
    pub source_engine: String,
    pub database: String,
    pub extracted_at: DateTime<Utc>,
    pub sample_rows: u64,
    pub tables: Vec<TableStats>,
}

/// Kind of captured SQL-bearing object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlObjectKind {
    View,
    Routine,
    Trigger,
}

impl SqlObjectKind {
    pub const ALL: [SqlObjectKind; 3] = [
        SqlObjectKind::View,
        SqlObjectKind::Routine,
        SqlObjectKind::Trigger,
    ];

    /// Artifact sub-directory holding this kind.
    pub fn dir_name(&self) -> &'static str {
        match self {
            SqlObjectKind::View => "views",
            SqlObjectKind::Routine => "routines",
            SqlObjectKind::Trigger => "triggers",
        }
    }
}

/// View, routine or trigger body captured from the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlObject {
    pub kind: SqlObjectKind,
    pub schema: String,
    pub name: String,
    /// Owning table, triggers only.
    pub table: Option<String>,
    pub definition: String,
}

impl SqlObject {
    /// `<schema>.<name>.sql`, or `<schema>.<table>.<name>.sql` for triggers.
    ///
    /// Routine signatures flatten to a file-safe stem: `add(integer, text)`
    /// becomes `add_integer_text`.
    pub fn file_name(&self) -> String {
        let name = object_stem(&self.name);
        match &self.table {
            Some(table) => format!("{}.{}.{}.sql", self.schema, table, name),
            None => format!("{}.{}.sql", self.schema, name),
        }
    }
}

/// Collapse each run of characters outside `[A-Za-z0-9_-]` to one `_`.
fn object_stem(name: &str) -> String {
    let mut stem = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            stem.push(c);
        } else if !stem.ends_with('_') {
            stem.push('_');
        }
    }
    stem.trim_end_matches('_').to_string()
}
