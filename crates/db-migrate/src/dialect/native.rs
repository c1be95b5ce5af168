//! Native → canonical lookup tables for source engines.
//!
//! Keys are lower-cased native type names. Unknown names fall back to
//! [`CanonicalType::Text`] so extraction never stops on an unexpected type;
//! the raw native name stays in `source_type_raw` for review.

use super::canonical::CanonicalType;

/// SQL Server type names.
pub const MSSQL_TYPE_MAP: &[(&str, CanonicalType)] = &[
    ("bigint", CanonicalType::Int8),
    ("int", CanonicalType::Int4),
    ("smallint", CanonicalType::Int2),
    ("tinyint", CanonicalType::Int1),
    ("decimal", CanonicalType::Decimal),
    ("numeric", CanonicalType::Decimal),
    ("money", CanonicalType::Decimal),
    ("smallmoney", CanonicalType::Decimal),
    ("float", CanonicalType::Float8),
    ("real", CanonicalType::Float4),
    ("varchar", CanonicalType::Text),
    ("nvarchar", CanonicalType::Ntext),
    ("char", CanonicalType::Char),
    ("nchar", CanonicalType::Char),
    ("text", CanonicalType::Clob),
    ("ntext", CanonicalType::Clob),
    ("date", CanonicalType::Date),
    ("datetime", CanonicalType::DateTime),
    ("datetime2", CanonicalType::DateTime),
    ("smalldatetime", CanonicalType::DateTime),
    ("datetimeoffset", CanonicalType::DateTimeTz),
    ("time", CanonicalType::DateTime),
    ("bit", CanonicalType::Bool),
    ("binary", CanonicalType::Bytes),
    ("varbinary", CanonicalType::VarBytes),
    ("image", CanonicalType::Blob),
    ("xml", CanonicalType::Xml),
    ("uniqueidentifier", CanonicalType::Text),
];

/// PostgreSQL `data_type` names as reported by information_schema.
pub const POSTGRES_TYPE_MAP: &[(&str, CanonicalType)] = &[
    ("bigint", CanonicalType::Int8),
    ("integer", CanonicalType::Int4),
    ("smallint", CanonicalType::Int2),
    ("serial", CanonicalType::Int4),
    ("bigserial", CanonicalType::Int8),
    ("numeric", CanonicalType::Decimal),
    ("double precision", CanonicalType::Float8),
    ("real", CanonicalType::Float4),
    ("character varying", CanonicalType::Text),
    ("varchar", CanonicalType::Text),
    ("character", CanonicalType::Char),
    ("char", CanonicalType::Char),
    ("text", CanonicalType::Clob),
    ("date", CanonicalType::Date),
    ("timestamp without time zone", CanonicalType::DateTime),
    ("timestamp with time zone", CanonicalType::DateTimeTz),
    ("boolean", CanonicalType::Bool),
    ("bytea", CanonicalType::Blob),
    ("json", CanonicalType::Json),
    ("jsonb", CanonicalType::Json),
    ("xml", CanonicalType::Xml),
    ("uuid", CanonicalType::Text),
    ("inet", CanonicalType::Text),
    ("cidr", CanonicalType::Text),
    ("macaddr", CanonicalType::Text),
    ("interval", CanonicalType::Text),
    ("money", CanonicalType::Decimal),
];

fn lookup(map: &[(&str, CanonicalType)], native: &str) -> CanonicalType {
    let key = native.trim().to_lowercase();
    map.iter()
        .find(|(name, _)| *name == key)
        .map(|(_, t)| *t)
        .unwrap_or(CanonicalType::Text)
}

/// Map a SQL Server native type name.
pub fn mssql_to_canonical(native: &str) -> CanonicalType {
    lookup(MSSQL_TYPE_MAP, native)
}

/// Map a PostgreSQL native type name.
pub fn postgres_to_canonical(native: &str) -> CanonicalType {
    lookup(POSTGRES_TYPE_MAP, native)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_native_entry_is_canonical() {
        for (name, t) in MSSQL_TYPE_MAP.iter().chain(POSTGRES_TYPE_MAP.iter()) {
            assert!(CanonicalType::ALL.contains(t), "{} maps outside vocabulary", name);
            assert_eq!(CanonicalType::parse(t.name()).unwrap(), *t);
        }
    }

    #[test]
    fn test_unknown_native_defaults_to_text() {
        assert_eq!(mssql_to_canonical("geography"), CanonicalType::Text);
        assert_eq!(postgres_to_canonical("tsvector"), CanonicalType::Text);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(mssql_to_canonical("DATETIME2"), CanonicalType::DateTime);
        assert_eq!(postgres_to_canonical("Timestamp With Time Zone"), CanonicalType::DateTimeTz);
    }

    #[test]
    fn test_keys_are_lowercase() {
        for (name, _) in MSSQL_TYPE_MAP.iter().chain(POSTGRES_TYPE_MAP.iter()) {
            assert_eq!(*name, name.to_lowercase());
        }
    }
}
