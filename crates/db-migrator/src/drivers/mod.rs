//! Database driver implementations.
//!
//! - [`mssql`]: Microsoft SQL Server (tiberius + bb8)
//! - [`postgres`]: PostgreSQL (tokio-postgres + deadpool)
//! - [`mysql`]: MySQL/MariaDB (mysql_async)
//! - [`common`]: Shared utilities (TLS, hex literals)
//!
//! Each driver provides a `Dialect`, a `SourceReader` and a `TargetWriter`.
//! [`connect_source`] and [`connect_target`] pick the implementation from the
//! configured driver tag.
//!
//! Oracle is not supported. Configurations written for the Go tool with
//! `driver: godror` (or `oracle`) are rejected at load time with a
//! configuration error (exit code 1).

pub mod common;
pub mod mssql;
pub mod mysql;
pub mod postgres;

use std::sync::Arc;

pub use common::{SslMode, TlsBuilder};
pub use mssql::{MssqlDialect, MssqlReader, MssqlWriter};
pub use mysql::{MysqlDialect, MysqlReader, MysqlWriter};
pub use postgres::{PostgresDialect, PostgresReader, PostgresWriter};

use crate::config::DatabaseConfig;
use crate::core::traits::{Dialect, PageRequest, SourceReader, TargetWriter};
use crate::error::{MigrateError, Result};

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    Mssql,
    Postgres,
    Mysql,
}

impl DriverKind {
    /// Resolve a driver tag, accepting common aliases.
    pub fn from_db_type(db_type: &str) -> Result<Self> {
        match db_type.to_lowercase().as_str() {
            "mssql" | "sqlserver" | "sql_server" => Ok(DriverKind::Mssql),
            "postgres" | "postgresql" | "pg" => Ok(DriverKind::Postgres),
            "mysql" | "mariadb" => Ok(DriverKind::Mysql),
            tag @ ("godror" | "oracle" | "oci8") => Err(MigrateError::Config(format!(
                "Database type '{}' (Oracle) is not supported. Supported types: mssql, postgres, mysql",
                tag
            ))),
            other => Err(MigrateError::Config(format!(
                "Unknown database type: '{}'. Supported types: mssql, postgres, mysql",
                other
            ))),
        }
    }

    pub fn dialect(&self) -> DialectImpl {
        match self {
            DriverKind::Mssql => DialectImpl::Mssql(MssqlDialect::new()),
            DriverKind::Postgres => DialectImpl::Postgres(PostgresDialect::new()),
            DriverKind::Mysql => DialectImpl::Mysql(MysqlDialect::new()),
        }
    }
}

/// Enum-based static dispatch for dialects.
#[derive(Debug, Clone)]
pub enum DialectImpl {
    Mssql(MssqlDialect),
    Postgres(PostgresDialect),
    Mysql(MysqlDialect),
}

macro_rules! dispatch {
    ($self:ident, $d:ident => $body:expr) => {
        match $self {
            DialectImpl::Mssql($d) => $body,
            DialectImpl::Postgres($d) => $body,
            DialectImpl::Mysql($d) => $body,
        }
    };
}

impl Dialect for DialectImpl {
    fn name(&self) -> &str {
        dispatch!(self, d => d.name())
    }

    fn quote_ident(&self, name: &str) -> String {
        dispatch!(self, d => d.quote_ident(name))
    }

    fn quote_literal(&self, value: &str) -> String {
        dispatch!(self, d => d.quote_literal(value))
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        dispatch!(self, d => d.bool_literal(value))
    }

    fn bytes_literal(&self, value: &[u8]) -> String {
        dispatch!(self, d => d.bytes_literal(value))
    }

    fn build_page_query(&self, req: &PageRequest) -> String {
        dispatch!(self, d => d.build_page_query(req))
    }

    fn build_count_query(&self, schema: &str, table: &str) -> String {
        dispatch!(self, d => d.build_count_query(schema, table))
    }

    fn max_rows_per_insert(&self) -> Option<usize> {
        dispatch!(self, d => d.max_rows_per_insert())
    }

    fn param_placeholder(&self, index: usize) -> String {
        dispatch!(self, d => d.param_placeholder(index))
    }

    fn build_list_tables_query(&self) -> String {
        dispatch!(self, d => d.build_list_tables_query())
    }

    fn build_list_columns_query(&self) -> String {
        dispatch!(self, d => d.build_list_columns_query())
    }

    fn build_list_dependencies_query(&self) -> String {
        dispatch!(self, d => d.build_list_dependencies_query())
    }
}

impl DialectImpl {
    /// Create a dialect implementation from a database type string.
    pub fn from_db_type(db_type: &str) -> Result<Self> {
        Ok(DriverKind::from_db_type(db_type)?.dialect())
    }
}

/// Open a pooled reader for the configured source.
pub async fn connect_source(config: &DatabaseConfig) -> Result<Arc<dyn SourceReader>> {
    let reader: Arc<dyn SourceReader> = match DriverKind::from_db_type(&config.driver)? {
        DriverKind::Mssql => Arc::new(MssqlReader::new(config).await?),
        DriverKind::Postgres => Arc::new(PostgresReader::new(config).await?),
        DriverKind::Mysql => Arc::new(MysqlReader::new(config).await?),
    };
    Ok(reader)
}

/// Open a pooled writer for the configured target.
pub async fn connect_target(config: &DatabaseConfig) -> Result<Arc<dyn TargetWriter>> {
    let writer: Arc<dyn TargetWriter> = match DriverKind::from_db_type(&config.driver)? {
        DriverKind::Mssql => Arc::new(MssqlWriter::new(config).await?),
        DriverKind::Postgres => Arc::new(PostgresWriter::new(config).await?),
        DriverKind::Mysql => Arc::new(MysqlWriter::new(config).await?),
    };
    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_impl_from_db_type() {
        assert_eq!(DialectImpl::from_db_type("mssql").unwrap().name(), "mssql");
        assert_eq!(DialectImpl::from_db_type("postgres").unwrap().name(), "postgres");
        assert_eq!(DialectImpl::from_db_type("MySQL").unwrap().name(), "mysql");

        // Alternative names
        assert!(DialectImpl::from_db_type("sqlserver").is_ok());
        assert!(DialectImpl::from_db_type("postgresql").is_ok());
        assert!(DialectImpl::from_db_type("pg").is_ok());
        assert!(DialectImpl::from_db_type("mariadb").is_ok());

        // Oracle has no driver here
        let err = DialectImpl::from_db_type("godror").unwrap_err();
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("(Oracle) is not supported"));
    }

    #[test]
    fn test_dialect_impl_dispatch() {
        let pg = DialectImpl::from_db_type("pg").unwrap();
        assert_eq!(pg.quote_ident("table"), "\"table\"");
        assert_eq!(pg.param_placeholder(1), "$1");

        let mssql = DialectImpl::from_db_type("mssql").unwrap();
        assert_eq!(mssql.quote_ident("table"), "[table]");
        assert_eq!(mssql.param_placeholder(1), "@P1");
        assert_eq!(mssql.max_rows_per_insert(), Some(1000));

        let mysql = DialectImpl::from_db_type("mysql").unwrap();
        assert_eq!(mysql.quote_ident("table"), "`table`");
        assert_eq!(mysql.param_placeholder(3), "?");
    }
}
