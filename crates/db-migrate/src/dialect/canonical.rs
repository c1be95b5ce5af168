//! Hub-and-spoke canonical type vocabulary.
//!
//! Every source engine maps its native type names onto this fixed set, and
//! every target engine renders each member from a template. Adding an engine
//! means adding one native map or one template column, never a pairwise
//! mapper.
//!
//! ```text
//! Source DB    →  CanonicalType  →  Target DB
//!   MSSQL int  →      INT4       →  MySQL INT
//!   PG numeric →     DECIMAL     →  MySQL DECIMAL(p,s)
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MigrateError;

/// Engine-neutral column type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CanonicalType {
    // ===== Integer Types =====
    Int1,
    Int2,
    Int4,
    Int8,

    // ===== Exact / Approximate Numeric =====
    Decimal,
    Float4,
    Float8,

    // ===== Character Types =====
    Text,
    Ntext,
    Char,
    Clob,

    // ===== Temporal Types =====
    Date,
    DateTime,
    DateTimeTz,

    // ===== Boolean =====
    Bool,

    // ===== Binary Types =====
    Bytes,
    VarBytes,
    Blob,

    // ===== Structured Text =====
    Json,
    Xml,
}

impl CanonicalType {
    /// The whole vocabulary, in declaration order.
    pub const ALL: [CanonicalType; 20] = [
        CanonicalType::Int1,
        CanonicalType::Int2,
        CanonicalType::Int4,
        CanonicalType::Int8,
        CanonicalType::Decimal,
        CanonicalType::Float4,
        CanonicalType::Float8,
        CanonicalType::Text,
        CanonicalType::Ntext,
        CanonicalType::Char,
        CanonicalType::Clob,
        CanonicalType::Date,
        CanonicalType::DateTime,
        CanonicalType::DateTimeTz,
        CanonicalType::Bool,
        CanonicalType::Bytes,
        CanonicalType::VarBytes,
        CanonicalType::Blob,
        CanonicalType::Json,
        CanonicalType::Xml,
    ];

    /// Upper-case wire name used in schema and mapping documents.
    pub fn name(&self) -> &'static str {
        match self {
            CanonicalType::Int1 => "INT1",
            CanonicalType::Int2 => "INT2",
            CanonicalType::Int4 => "INT4",
            CanonicalType::Int8 => "INT8",
            CanonicalType::Decimal => "DECIMAL",
            CanonicalType::Float4 => "FLOAT4",
            CanonicalType::Float8 => "FLOAT8",
            CanonicalType::Text => "TEXT",
            CanonicalType::Ntext => "NTEXT",
            CanonicalType::Char => "CHAR",
            CanonicalType::Clob => "CLOB",
            CanonicalType::Date => "DATE",
            CanonicalType::DateTime => "DATETIME",
            CanonicalType::DateTimeTz => "DATETIMETZ",
            CanonicalType::Bool => "BOOL",
            CanonicalType::Bytes => "BYTES",
            CanonicalType::VarBytes => "VARBYTES",
            CanonicalType::Blob => "BLOB",
            CanonicalType::Json => "JSON",
            CanonicalType::Xml => "XML",
        }
    }

    /// Parse a canonical name, ignoring case and any parameter list
    /// (`"decimal(18,4)"` parses as `DECIMAL`).
    pub fn parse(raw: &str) -> Result<Self, MigrateError> {
        let base = raw.split('(').next().unwrap_or_default().trim().to_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name() == base)
            .ok_or_else(|| MigrateError::UnknownType(raw.to_string()))
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            CanonicalType::Int1 | CanonicalType::Int2 | CanonicalType::Int4 | CanonicalType::Int8
        )
    }

    /// Integer, decimal or floating point.
    pub fn is_numeric(&self) -> bool {
        self.is_integer()
            || matches!(
                self,
                CanonicalType::Decimal | CanonicalType::Float4 | CanonicalType::Float8
            )
    }

    /// Date, timestamp or timestamp with time zone.
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            CanonicalType::Date | CanonicalType::DateTime | CanonicalType::DateTimeTz
        )
    }
}

impl fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CanonicalType {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
