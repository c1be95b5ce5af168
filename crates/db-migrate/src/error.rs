//! Error types for the migration library.

use thiserror::Error;

/// Structured classification of a failed target load.
///
/// Connectors derive this from the native driver error code so the migration
/// engine never has to inspect message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadFailure {
    /// The target table does not exist. Schema application must be redone.
    MissingTable,
    /// The server rejected the rows (constraint violation, bad value).
    Data,
}

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Canonical type name is not part of the fixed vocabulary
    #[error("Unknown canonical type: {0}")]
    UnknownType(String),

    /// Target engine has no rendering template for a canonical type
    #[error("No {engine} mapping for canonical type {canonical}")]
    UnsupportedMapping { canonical: String, engine: String },

    /// Engine name missing from the connector registry
    #[error("Unknown {role} engine '{name}'. Valid engines: {valid}")]
    UnknownEngine {
        role: &'static str,
        name: String,
        valid: String,
    },

    /// Mapping document is missing keys or inconsistent with the schema
    #[error("Invalid mapping document: {0}")]
    Mapping(String),

    /// Could not open a connection
    #[error("Connection to {engine} failed: {message}")]
    Connection { engine: String, message: String },

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Schema extraction failed
    #[error("Schema extraction failed: {0}")]
    SchemaExtraction(String),

    /// Reading rows from the source failed for a specific table
    #[error("Extraction failed for table {table}: {message}")]
    Extraction { table: String, message: String },

    /// Loading a page into the target failed
    #[error("Load failed for table {table}: {message}")]
    Load {
        table: String,
        kind: LoadFailure,
        message: String,
    },

    /// A DDL statement failed with something other than "already exists"
    #[error("DDL failed: {message}\n  Statement: {statement}")]
    Ddl { statement: String, message: String },

    /// Validation stage error (report could not be produced)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// SQL Server driver error
    #[error("SQL Server error: {0}")]
    Mssql(#[from] tiberius::error::Error),

    /// PostgreSQL driver error
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// MySQL driver error
    #[error("MySQL error: {0}")]
    Mysql(#[from] mysql_async::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Dead-letter CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Connection error
    pub fn connection(engine: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Connection {
            engine: engine.into(),
            message: message.to_string(),
        }
    }

    /// Create an Extraction error
    pub fn extraction(table: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Extraction {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a Load error
    pub fn load(table: impl Into<String>, kind: LoadFailure, message: impl ToString) -> Self {
        MigrateError::Load {
            table: table.into(),
            kind,
            message: message.to_string(),
        }
    }

    /// True when the error says the target table does not exist.
    pub fn is_missing_table(&self) -> bool {
        matches!(
            self,
            MigrateError::Load {
                kind: LoadFailure::MissingTable,
                ..
            }
        )
    }

    /// True when the load was rejected because of the rows themselves.
    pub fn is_data_load(&self) -> bool {
        matches!(
            self,
            MigrateError::Load {
                kind: LoadFailure::Data,
                ..
            }
        )
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_)
            | MigrateError::UnknownType(_)
            | MigrateError::UnsupportedMapping { .. }
            | MigrateError::UnknownEngine { .. }
            | MigrateError::Mapping(_)
            | MigrateError::Yaml(_) => 2,
            MigrateError::Connection { .. } | MigrateError::Pool { .. } => 3,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
