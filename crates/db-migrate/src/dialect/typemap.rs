//! Canonical → target-native type templates.
//!
//! Templates may contain `{n}` (length), `{p}` (precision) and `{s}` (scale)
//! placeholders. Every canonical type has a template for every engine listed
//! in [`TARGET_ENGINES`]; the closure test at the bottom of this file keeps
//! it that way.

use super::canonical::CanonicalType;
use crate::error::{MigrateError, Result};

/// Target engines that have a full template column.
pub const TARGET_ENGINES: &[&str] = &[
    "postgres",
    "mysql",
    "mssql",
    "snowflake",
    "bigquery",
    "azure_synapse",
    "redshift",
];

const DEFAULT_LENGTH: u32 = 255;
const DEFAULT_PRECISION: u32 = 38;
const DEFAULT_SCALE: u32 = 0;

/// Look up the raw template for a canonical type on a target engine.
pub fn template(canonical: CanonicalType, engine: &str) -> Option<&'static str> {
    let engine = normalize_engine(engine);
    let t = match engine.as_str() {
        "postgres" => postgres_template(canonical),
        "mysql" => mysql_template(canonical),
        "mssql" => mssql_template(canonical),
        "snowflake" => snowflake_template(canonical),
        "bigquery" => bigquery_template(canonical),
        "azure_synapse" => synapse_template(canonical),
        "redshift" => redshift_template(canonical),
        _ => return None,
    };
    Some(t)
}

/// Resolve a canonical type name to a target-native column type.
///
/// Parameters after `(` in `canonical` are ignored. Missing length, precision
/// and scale default to 255, 38 and 0.
///
/// # Errors
///
/// - [`MigrateError::UnknownType`] if the base name is not canonical.
/// - [`MigrateError::UnsupportedMapping`] if the engine has no template.
pub fn resolve_target_type(
    canonical: &str,
    target_engine: &str,
    length: Option<u32>,
    precision: Option<u32>,
    scale: Option<u32>,
) -> Result<String> {
    let ct = CanonicalType::parse(canonical)?;
    let tpl = template(ct, target_engine).ok_or_else(|| MigrateError::UnsupportedMapping {
        canonical: ct.name().to_string(),
        engine: target_engine.to_string(),
    })?;

    let n = length.filter(|v| *v > 0).unwrap_or(DEFAULT_LENGTH);
    let p = precision.filter(|v| *v > 0).unwrap_or(DEFAULT_PRECISION);
    let s = scale.unwrap_or(DEFAULT_SCALE);

    Ok(tpl
        .replace("{n}", &n.to_string())
        .replace("{p}", &p.to_string())
        .replace("{s}", &s.to_string()))
}

fn normalize_engine(engine: &str) -> String {
    match engine.to_lowercase().as_str() {
        "postgresql" | "pg" => "postgres".to_string(),
        "mariadb" => "mysql".to_string(),
        "sqlserver" | "sql_server" => "mssql".to_string(),
        "synapse" => "azure_synapse".to_string(),
        other => other.to_string(),
    }
}

fn postgres_template(t: CanonicalType) -> &'static str {
    match t {
        CanonicalType::Int8 => "BIGINT",
        CanonicalType::Int4 => "INTEGER",
        CanonicalType::Int2 | CanonicalType::Int1 => "SMALLINT",
        CanonicalType::Decimal => "NUMERIC({p},{s})",
        CanonicalType::Float8 => "DOUBLE PRECISION",
        CanonicalType::Float4 => "REAL",
        CanonicalType::Text | CanonicalType::Ntext => "VARCHAR({n})",
        CanonicalType::Char => "CHAR({n})",
        CanonicalType::Clob => "TEXT",
        CanonicalType::Date => "DATE",
        CanonicalType::DateTime => "TIMESTAMP WITHOUT TIME ZONE",
        CanonicalType::DateTimeTz => "TIMESTAMPTZ",
        CanonicalType::Bool => "BOOLEAN",
        CanonicalType::Bytes | CanonicalType::VarBytes | CanonicalType::Blob => "BYTEA",
        CanonicalType::Json => "JSONB",
        CanonicalType::Xml => "XML",
    }
}

fn mysql_template(t: CanonicalType) -> &'static str {
    match t {
        CanonicalType::Int8 => "BIGINT",
        CanonicalType::Int4 => "INT",
        CanonicalType::Int2 => "SMALLINT",
        CanonicalType::Int1 => "TINYINT",
        CanonicalType::Decimal => "DECIMAL({p},{s})",
        CanonicalType::Float8 => "DOUBLE",
        CanonicalType::Float4 => "FLOAT",
        CanonicalType::Text | CanonicalType::Ntext => "VARCHAR({n})",
        CanonicalType::Char => "CHAR({n})",
        CanonicalType::Clob | CanonicalType::Xml => "LONGTEXT",
        CanonicalType::Date => "DATE",
        CanonicalType::DateTime => "DATETIME(6)",
        CanonicalType::DateTimeTz => "TIMESTAMP",
        CanonicalType::Bool => "TINYINT(1)",
        CanonicalType::Bytes => "BINARY({n})",
        CanonicalType::VarBytes => "VARBINARY({n})",
        CanonicalType::Blob => "LONGBLOB",
        CanonicalType::Json => "JSON",
    }
}

fn mssql_template(t: CanonicalType) -> &'static str {
    match t {
        CanonicalType::Int8 => "BIGINT",
        CanonicalType::Int4 => "INT",
        CanonicalType::Int2 => "SMALLINT",
        CanonicalType::Int1 => "TINYINT",
        CanonicalType::Decimal => "DECIMAL({p},{s})",
        CanonicalType::Float8 => "FLOAT",
        CanonicalType::Float4 => "REAL",
        CanonicalType::Text => "VARCHAR({n})",
        CanonicalType::Ntext => "NVARCHAR({n})",
        CanonicalType::Char => "CHAR({n})",
        CanonicalType::Clob | CanonicalType::Json => "NVARCHAR(MAX)",
        CanonicalType::Date => "DATE",
        CanonicalType::DateTime => "DATETIME2",
        CanonicalType::DateTimeTz => "DATETIMEOFFSET",
        CanonicalType::Bool => "BIT",
        CanonicalType::Bytes => "BINARY({n})",
        CanonicalType::VarBytes => "VARBINARY({n})",
        CanonicalType::Blob => "VARBINARY(MAX)",
        CanonicalType::Xml => "XML",
    }
}

fn snowflake_template(t: CanonicalType) -> &'static str {
    match t {
        CanonicalType::Int8 => "NUMBER(18,0)",
        CanonicalType::Int4 => "NUMBER(9,0)",
        CanonicalType::Int2 => "NUMBER(5,0)",
        CanonicalType::Int1 => "NUMBER(3,0)",
        CanonicalType::Decimal => "NUMBER({p},{s})",
        CanonicalType::Float8 | CanonicalType::Float4 => "FLOAT",
        CanonicalType::Text | CanonicalType::Ntext => "VARCHAR({n})",
        CanonicalType::Char => "CHAR({n})",
        CanonicalType::Clob | CanonicalType::Xml => "VARCHAR(16777216)",
        CanonicalType::Date => "DATE",
        CanonicalType::DateTime => "TIMESTAMP_NTZ",
        CanonicalType::DateTimeTz => "TIMESTAMP_TZ",
        CanonicalType::Bool => "BOOLEAN",
        CanonicalType::Bytes => "BINARY({n})",
        CanonicalType::VarBytes => "VARBINARY({n})",
        CanonicalType::Blob => "BINARY",
        CanonicalType::Json => "VARIANT",
    }
}

fn bigquery_template(t: CanonicalType) -> &'static str {
    match t {
        CanonicalType::Int8 | CanonicalType::Int4 | CanonicalType::Int2 | CanonicalType::Int1 => {
            "INT64"
        }
        CanonicalType::Decimal => "NUMERIC({p},{s})",
        CanonicalType::Float8 | CanonicalType::Float4 => "FLOAT64",
        CanonicalType::Text
        | CanonicalType::Ntext
        | CanonicalType::Char
        | CanonicalType::Clob
        | CanonicalType::Xml => "STRING",
        CanonicalType::Date => "DATE",
        CanonicalType::DateTime => "DATETIME",
        CanonicalType::DateTimeTz => "TIMESTAMP",
        CanonicalType::Bool => "BOOL",
        CanonicalType::Bytes | CanonicalType::VarBytes | CanonicalType::Blob => "BYTES",
        CanonicalType::Json => "JSON",
    }
}

fn synapse_template(t: CanonicalType) -> &'static str {
    match t {
        CanonicalType::Int8 => "BIGINT",
        CanonicalType::Int4 => "INT",
        CanonicalType::Int2 => "SMALLINT",
        CanonicalType::Int1 => "TINYINT",
        CanonicalType::Decimal => "DECIMAL({p},{s})",
        CanonicalType::Float8 => "FLOAT",
        CanonicalType::Float4 => "REAL",
        CanonicalType::Text => "VARCHAR({n})",
        CanonicalType::Ntext => "NVARCHAR({n})",
        CanonicalType::Char => "CHAR({n})",
        CanonicalType::Clob | CanonicalType::Json => "NVARCHAR(MAX)",
        CanonicalType::Date => "DATE",
        CanonicalType::DateTime => "DATETIME2",
        CanonicalType::DateTimeTz => "DATETIMEOFFSET",
        CanonicalType::Bool => "BIT",
        CanonicalType::Bytes => "BINARY({n})",
        CanonicalType::VarBytes => "VARBINARY({n})",
        CanonicalType::Blob => "VARBINARY(MAX)",
        CanonicalType::Xml => "XML",
    }
}

fn redshift_template(t: CanonicalType) -> &'static str {
    match t {
        CanonicalType::Int8 => "BIGINT",
        CanonicalType::Int4 => "INTEGER",
        CanonicalType::Int2 | CanonicalType::Int1 => "SMALLINT",
        CanonicalType::Decimal => "DECIMAL({p},{s})",
        CanonicalType::Float8 => "DOUBLE PRECISION",
        CanonicalType::Float4 => "REAL",
        CanonicalType::Text | CanonicalType::Ntext => "VARCHAR({n})",
        CanonicalType::Char => "CHAR({n})",
        CanonicalType::Clob | CanonicalType::Blob | CanonicalType::Xml => "VARCHAR(65535)",
        CanonicalType::Date => "DATE",
        CanonicalType::DateTime => "TIMESTAMP",
        CanonicalType::DateTimeTz => "TIMESTAMPTZ",
        CanonicalType::Bool => "BOOLEAN",
        CanonicalType::Bytes | CanonicalType::VarBytes => "VARCHAR({n})",
        CanonicalType::Json => "SUPER",
    }
}
