//! Helpers shared by the engine connectors.
//!
//! - [`tls`]: rustls setup for PostgreSQL connections
//! - [`RawColumn`]: catalog row shape both source engines read columns into

pub mod tls;

pub use tls::SslMode;

use serde::de::DeserializeOwned;

use crate::core::schema::{ColumnDescriptor, ColumnStats};
use crate::dialect::CanonicalType;
use crate::error::{MigrateError, Result};

/// Deserialize a connector's engine sub-document.
pub(crate) fn parse_settings<T: DeserializeOwned>(
    engine: &str,
    value: &serde_yaml::Value,
) -> Result<T> {
    serde_yaml::from_value(value.clone())
        .map_err(|e| MigrateError::Config(format!("{} settings: {}", engine, e)))
}

/// Column metadata as read from an information_schema style catalog.
///
/// Sizes use the catalog convention: zero or negative means "not reported"
/// (SQL Server reports `-1` for `MAX` types).
#[derive(Debug, Clone, Default)]
pub(crate) struct RawColumn {
    pub name: String,
    pub data_type: String,
    pub max_length: i32,
    pub precision: i32,
    pub scale: i32,
    pub nullable: bool,
    pub default: Option<String>,
    pub ordinal: i32,
    pub charset: Option<String>,
    pub comment: Option<String>,
}

impl RawColumn {
    pub fn into_descriptor(self, canonical: CanonicalType) -> ColumnDescriptor {
        ColumnDescriptor {
            source_type_raw: self.data_type,
            canonical_type: canonical,
            length: positive(self.max_length),
            precision: positive(self.precision),
            scale: if self.scale >= 0 && positive(self.precision).is_some() {
                Some(self.scale as u32)
            } else {
                None
            },
            nullable: self.nullable,
            default: self.default,
            ordinal: self.ordinal.max(0) as u32,
            comment: self.comment,
            charset: self.charset,
            name: self.name,
        }
    }
}

fn positive(v: i32) -> Option<u32> {
    (v > 0).then_some(v as u32)
}

/// Whether MIN, MAX and COUNT(DISTINCT) are meaningful for a column type.
///
/// Large objects, booleans and JSON are excluded because at least one source
/// engine rejects ordering or equality on them.
pub(crate) fn is_comparable(ct: CanonicalType) -> bool {
    !matches!(
        ct,
        CanonicalType::Bool
            | CanonicalType::Clob
            | CanonicalType::Blob
            | CanonicalType::Bytes
            | CanonicalType::VarBytes
            | CanonicalType::Json
            | CanonicalType::Xml
    )
}

/// Whether the stats query should report the longest value.
pub(crate) fn measures_length(ct: CanonicalType) -> bool {
    matches!(
        ct,
        CanonicalType::Text | CanonicalType::Ntext | CanonicalType::Char
    )
}

/// Raw numbers returned by a sampled stats query.
#[derive(Debug, Default)]
pub(crate) struct SampleCounts {
    pub total: i64,
    pub nulls: i64,
    pub distinct: Option<i64>,
    pub min: Option<String>,
    pub max: Option<String>,
    pub max_len: Option<i64>,
}

impl SampleCounts {
    pub fn into_stats(self, name: &str) -> ColumnStats {
        ColumnStats {
            name: name.to_string(),
            null_rate: (self.total > 0).then(|| self.nulls as f64 / self.total as f64),
            distinct_count: self.distinct,
            min: self.min,
            max: self.max,
            max_len: self.max_len,
        }
    }
}

/// Join comment fragments, skipping empty ones.
pub(crate) fn join_comment(parts: &[Option<&str>]) -> Option<String> {
    let parts: Vec<&str> = parts
        .iter()
        .flatten()
        .copied()
        .filter(|p| !p.trim().is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_column_sizes() {
        let raw = RawColumn {
            name: "Body".into(),
            data_type: "nvarchar".into(),
            max_length: -1,
            precision: 0,
            scale: 0,
            nullable: true,
            ordinal: 3,
            ..Default::default()
        };
        let col = raw.into_descriptor(CanonicalType::Ntext);
        assert_eq!(col.length, None);
        assert_eq!(col.precision, None);
        assert_eq!(col.scale, None);
        assert_eq!(col.ordinal, 3);
        assert_eq!(col.source_type_raw, "nvarchar");
    }

    #[test]
    fn test_join_comment() {
        assert_eq!(join_comment(&[None, Some("IDENTITY")]), Some("IDENTITY".into()));
        assert_eq!(
            join_comment(&[Some("orders"), Some("IDENTITY")]),
            Some("orders; IDENTITY".into())
        );
        assert_eq!(join_comment(&[Some(" "), None]), None);
    }

    #[test]
    fn test_sample_counts_null_rate() {
        let stats = SampleCounts {
            total: 4,
            nulls: 1,
            distinct: Some(3),
            ..Default::default()
        }
        .into_stats("c");
        assert_eq!(stats.null_rate, Some(0.25));
        assert_eq!(SampleCounts::default().into_stats("c").null_rate, None);
    }

    #[test]
    fn test_comparable_types() {
        assert!(is_comparable(CanonicalType::DateTime));
        assert!(!is_comparable(CanonicalType::Bool));
        assert!(measures_length(CanonicalType::Ntext));
        assert!(!measures_length(CanonicalType::Int4));
    }

    #[test]
    fn test_parse_settings_error_names_engine() {
        #[derive(Debug, serde::Deserialize)]
        struct S {
            #[allow(dead_code)]
            host: String,
        }
        let value: serde_yaml::Value = serde_yaml::from_str("port: 1").unwrap();
        let err = parse_settings::<S>("mssql", &value).unwrap_err();
        assert!(err.to_string().contains("mssql settings"));
    }
}
