//! Core traits for database-agnostic data migration.
//!
//! - [`SourceReader`]: row counts, page reads and catalog queries on the source
//! - [`TargetWriter`]: bulk inserts and row counts on the target
//! - [`Dialect`]: SQL syntax strategy for different database engines
//!
//! The migration engine only talks to these traits, so tables can be driven
//! against in-memory implementations in tests.

use async_trait::async_trait;

use crate::error::Result;

use super::value::Batch;

/// A bounded page of one source table.
#[derive(Debug, Clone)]
pub struct PageRequest {
    /// Schema name.
    pub schema: String,
    /// Table name.
    pub table: String,
    /// Columns to read, in output order.
    pub columns: Vec<String>,
    /// Rows to skip.
    pub offset: u64,
    /// Maximum rows to return.
    pub limit: usize,
}

impl PageRequest {
    pub fn new(schema: &str, table: &str, columns: &[String], limit: usize) -> Self {
        Self {
            schema: schema.to_string(),
            table: table.to_string(),
            columns: columns.to_vec(),
            offset: 0,
            limit,
        }
    }

    /// The request for the page that follows this one.
    pub fn advance(&mut self) {
        self.offset += self.limit as u64;
    }
}

/// Read data and catalog metadata from a source database.
///
/// Readers hold no cursor state; callers own the page offset. Implementations
/// must be safe to call from many tables at once (they sit on a pool).
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Fetch one page of rows in the engine's natural order.
    async fn fetch_page(&self, req: &PageRequest) -> Result<Batch>;

    /// `COUNT(*)` of a table.
    async fn row_count(&self, schema: &str, table: &str) -> Result<i64>;

    /// Base tables in a schema, sorted by name.
    async fn list_tables(&self, schema: &str) -> Result<Vec<String>>;

    /// Column names of a table in ordinal order.
    async fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<String>>;

    /// Tables referenced by the table's foreign keys.
    async fn list_dependencies(&self, schema: &str, table: &str) -> Result<Vec<String>>;

    /// Run a trivial query to prove connectivity.
    async fn health_check(&self) -> Result<()>;

    /// Get the database type identifier (e.g., "mssql", "postgres").
    fn db_type(&self) -> &str;

    /// Close the connection pool.
    async fn close(&self);
}

/// Write rows to a target database.
#[async_trait]
pub trait TargetWriter: Send + Sync {
    /// Insert every row of the batch into `schema.table`.
    ///
    /// Returns the number of rows written. A batch is either written in full
    /// or the call fails.
    async fn write_batch(
        &self,
        schema: &str,
        table: &str,
        cols: &[String],
        batch: &Batch,
    ) -> Result<u64>;

    /// `COUNT(*)` of a table.
    async fn row_count(&self, schema: &str, table: &str) -> Result<i64>;

    /// Run a trivial query to prove connectivity.
    async fn health_check(&self) -> Result<()>;

    /// Get the database type identifier (e.g., "mssql", "postgres").
    fn db_type(&self) -> &str;

    /// Close the connection pool.
    async fn close(&self);
}

/// SQL syntax strategy for different database engines.
///
/// Provides database-specific SQL generation while keeping the
/// core migration logic database-agnostic.
pub trait Dialect: Send + Sync {
    /// Get the dialect identifier (e.g., "mssql", "postgres").
    fn name(&self) -> &str;

    /// Quote an identifier (table name, column name, etc.).
    fn quote_ident(&self, name: &str) -> String;

    /// `schema.table` with both parts quoted.
    fn qualify(&self, schema: &str, table: &str) -> String {
        format!("{}.{}", self.quote_ident(schema), self.quote_ident(table))
    }

    /// Quoted, comma-separated column list.
    fn column_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Quote a string literal, doubling embedded single quotes.
    fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Literal for a boolean value.
    fn bool_literal(&self, value: bool) -> &'static str {
        if value {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    /// Literal for a binary value.
    fn bytes_literal(&self, value: &[u8]) -> String;

    /// Build the query reading one page of a table.
    fn build_page_query(&self, req: &PageRequest) -> String;

    /// Build the row count query for a table.
    fn build_count_query(&self, schema: &str, table: &str) -> String {
        format!("SELECT COUNT(*) FROM {}", self.qualify(schema, table))
    }

    /// `INSERT INTO schema.table (cols) VALUES ` prefix of a bulk insert.
    fn build_insert_prefix(&self, schema: &str, table: &str, columns: &[String]) -> String {
        format!(
            "INSERT INTO {} ({}) VALUES ",
            self.qualify(schema, table),
            self.column_list(columns)
        )
    }

    /// Most rows a single `VALUES` list may carry, if the engine has a limit.
    fn max_rows_per_insert(&self) -> Option<usize> {
        None
    }

    /// Get a parameter placeholder for the given 1-based index.
    ///
    /// - MSSQL: `@P1`, `@P2`, etc.
    /// - PostgreSQL: `$1`, `$2`, etc.
    /// - MySQL: `?`
    fn param_placeholder(&self, index: usize) -> String;

    /// Query listing base tables of a schema, one name per row, sorted.
    /// Binds the schema as parameter 1.
    fn build_list_tables_query(&self) -> String;

    /// Query listing a table's columns, one name per row, in ordinal order.
    /// Binds schema and table as parameters 1 and 2.
    fn build_list_columns_query(&self) -> String;

    /// Query listing the tables a table references through foreign keys.
    /// Binds schema and table as parameters 1 and 2.
    fn build_list_dependencies_query(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_advance() {
        let cols = vec!["id".to_string()];
        let mut req = PageRequest::new("dbo", "orders", &cols, 1000);
        assert_eq!(req.offset, 0);
        req.advance();
        req.advance();
        assert_eq!(req.offset, 2000);
        assert_eq!(req.limit, 1000);
    }
}
