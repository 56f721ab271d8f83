//! Error types for the migration library.

use std::fmt;

use thiserror::Error;

/// Stage of a table migration at which an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Up-front `COUNT(*)` probe.
    RowCount,
    /// Page query against the source.
    Fetch,
    /// Converting a driver row into [`crate::core::SqlValue`]s.
    Decode,
    /// Bulk insert against the target.
    Insert,
    /// Catalog queries used to rebuild the table list.
    Introspect,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::RowCount => "row-count",
            Stage::Fetch => "fetch",
            Stage::Decode => "decode",
            Stage::Insert => "insert",
            Stage::Introspect => "introspect",
        };
        f.write_str(s)
    }
}

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// SQL Server driver error
    #[error("SQL Server error: {0}")]
    Mssql(#[from] tiberius::error::Error),

    /// PostgreSQL driver error
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// MySQL driver error
    #[error("MySQL error: {0}")]
    MySql(#[from] mysql_async::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// A stage of one table's migration failed
    #[error("Table {table} failed during {stage}: {message}")]
    Query {
        table: String,
        stage: Stage,
        message: String,
    },

    /// A table task stopped without producing a result (panic)
    #[error("Transfer failed for table {table}: {message}")]
    Transfer { table: String, message: String },

    /// Tables whose dependencies can never be satisfied
    #[error("Circular dependency detected between tables: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    /// Row count validation failed
    #[error("Validation failed: {0}")]
    Validation(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Migration was cancelled (SIGINT or a failing sibling table)
    #[error("Migration cancelled")]
    Cancelled,
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl fmt::Display, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Query error for one table and stage
    pub fn query(table: impl Into<String>, stage: Stage, message: impl fmt::Display) -> Self {
        MigrateError::Query {
            table: table.into(),
            stage,
            message: message.to_string(),
        }
    }

    /// Name of the table this error is attributed to, if any.
    pub fn table(&self) -> Option<&str> {
        match self {
            MigrateError::Query { table, .. } | MigrateError::Transfer { table, .. } => {
                Some(table)
            }
            _ => None,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) | MigrateError::Json(_) => 1,
            MigrateError::DependencyCycle(_) => 2,
            MigrateError::Pool { .. } => 3,
            MigrateError::Mssql(_)
            | MigrateError::Postgres(_)
            | MigrateError::MySql(_)
            | MigrateError::Query { .. }
            | MigrateError::Transfer { .. } => 4,
            MigrateError::Validation(_) => 6,
            MigrateError::Io(_) => 7,
            MigrateError::Cancelled => 130,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_names_table_and_stage() {
        let err = MigrateError::query("orders", Stage::Insert, "duplicate key");
        assert_eq!(
            err.to_string(),
            "Table orders failed during insert: duplicate key"
        );
        assert_eq!(err.table(), Some("orders"));
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(MigrateError::Config("x".into()).exit_code(), 1);
        assert_eq!(
            MigrateError::DependencyCycle(vec!["a".into(), "b".into()]).exit_code(),
            2
        );
        assert_eq!(MigrateError::pool("refused", "connect").exit_code(), 3);
        assert_eq!(MigrateError::Cancelled.exit_code(), 130);
    }

    #[test]
    fn test_cycle_message_lists_tables() {
        let err = MigrateError::DependencyCycle(vec!["a".into(), "b".into()]);
        assert!(err.to_string().contains("a, b"));
    }
}
