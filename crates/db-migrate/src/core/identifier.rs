//! Identifier handling: quoting for each engine, splitting qualified names,
//! and turning table names into safe artifact file names.
//!
//! Identifiers cannot be bound as statement parameters, so every table and
//! column name that reaches generated SQL goes through [`Quoting`].

use crate::error::{MigrateError, Result};

/// Conservative limit across engines (PostgreSQL 63, MySQL 64, SQL Server 128).
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Reject empty identifiers, null bytes and over-long names.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config("Identifier cannot be empty".to_string()));
    }
    if name.contains('\0') {
        return Err(MigrateError::Config(format!(
            "Identifier contains a null byte: {:?}",
            name
        )));
    }
    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "Identifier exceeds {} bytes: {:?}",
            MAX_IDENTIFIER_LENGTH, name
        )));
    }
    Ok(())
}

/// Engine-specific identifier quoting style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quoting {
    /// `[name]`, closing bracket doubled.
    Mssql,
    /// `"name"`, double quote doubled.
    Postgres,
    /// `` `name` ``, backtick doubled.
    Mysql,
}

impl Quoting {
    /// Validate and quote one identifier.
    pub fn quote(&self, name: &str) -> Result<String> {
        validate_identifier(name)?;
        Ok(match self {
            Quoting::Mssql => format!("[{}]", name.replace(']', "]]")),
            Quoting::Postgres => format!("\"{}\"", name.replace('"', "\"\"")),
            Quoting::Mysql => format!("`{}`", name.replace('`', "``")),
        })
    }

    /// Quote `schema.table`; an empty schema yields just the quoted table.
    pub fn qualify(&self, schema: &str, table: &str) -> Result<String> {
        if schema.is_empty() {
            return self.quote(table);
        }
        Ok(format!("{}.{}", self.quote(schema)?, self.quote(table)?))
    }

    /// Quote a list of column names and join them with `", "`.
    pub fn column_list<S: AsRef<str>>(&self, columns: &[S]) -> Result<String> {
        let quoted: Result<Vec<String>> = columns.iter().map(|c| self.quote(c.as_ref())).collect();
        Ok(quoted?.join(", "))
    }
}

/// Split `schema.table` at the last dot. A bare name has no schema.
pub fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.rsplit_once('.') {
        Some((schema, table)) if !schema.is_empty() => (Some(schema), table),
        Some((_, table)) => (None, table),
        None => (None, name),
    }
}

/// Drop any schema qualifier from a table name.
pub fn bare_table_name(name: &str) -> &str {
    split_qualified(name).1
}

/// Make a table name safe to use as a file stem.
pub fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0' => '_',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_rejects_bad_names() {
        assert!(validate_identifier("users").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("us\0ers").is_err());
        assert!(validate_identifier(&"x".repeat(129)).is_err());
        assert!(validate_identifier(&"x".repeat(128)).is_ok());
    }

    #[test]
    fn test_quote_escapes_per_engine() {
        assert_eq!(Quoting::Mssql.quote("a]b").unwrap(), "[a]]b]");
        assert_eq!(Quoting::Postgres.quote("a\"b").unwrap(), "\"a\"\"b\"");
        assert_eq!(Quoting::Mysql.quote("a`b").unwrap(), "`a``b`");
    }

    #[test]
    fn test_quote_injection_stays_inside_quotes() {
        let quoted = Quoting::Mysql.quote("x`; DROP TABLE t; --").unwrap();
        assert_eq!(quoted, "`x``; DROP TABLE t; --`");
    }

    #[test]
    fn test_qualify() {
        assert_eq!(Quoting::Mssql.qualify("dbo", "Orders").unwrap(), "[dbo].[Orders]");
        assert_eq!(Quoting::Mysql.qualify("", "orders").unwrap(), "`orders`");
        assert!(Quoting::Postgres.qualify("pub\0lic", "t").is_err());
    }

    #[test]
    fn test_column_list() {
        let cols = vec!["id".to_string(), "name".to_string()];
        assert_eq!(Quoting::Mysql.column_list(&cols).unwrap(), "`id`, `name`");
    }

    #[test]
    fn test_split_qualified() {
        assert_eq!(split_qualified("dbo.Orders"), (Some("dbo"), "Orders"));
        assert_eq!(split_qualified("Orders"), (None, "Orders"));
        assert_eq!(split_qualified("db.dbo.Orders"), (Some("db.dbo"), "Orders"));
        assert_eq!(split_qualified(".Orders"), (None, "Orders"));
        assert_eq!(bare_table_name("shop.orders"), "orders");
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("dbo.Orders"), "dbo.Orders");
        assert_eq!(file_stem("a/b:c"), "a_b_c");
    }
}
