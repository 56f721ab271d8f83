//! MSSQL SQL dialect (Strategy pattern).
//!
//! SQL Server has no `LIMIT`, so pages are windowed with `ROW_NUMBER()`.

use crate::core::traits::{Dialect, PageRequest};
use crate::drivers::common::hex;

/// SQL Server caps a single `VALUES` list at 1000 rows.
pub const MSSQL_MAX_INSERT_ROWS: usize = 1000;

/// Microsoft SQL Server dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct MssqlDialect;

impl MssqlDialect {
    /// Create a new MSSQL dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for MssqlDialect {
    fn name(&self) -> &str {
        "mssql"
    }

    fn quote_ident(&self, name: &str) -> String {
        // Handle names that contain closing brackets by doubling them
        format!("[{}]", name.replace(']', "]]"))
    }

    fn quote_literal(&self, value: &str) -> String {
        format!("N'{}'", value.replace('\'', "''"))
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }

    fn bytes_literal(&self, value: &[u8]) -> String {
        format!("0x{}", hex(value))
    }

    fn build_page_query(&self, req: &PageRequest) -> String {
        let cols = self.column_list(&req.columns);
        let end_row = req.offset + req.limit as u64;
        format!(
            r#"WITH numbered AS (
    SELECT {cols}, ROW_NUMBER() OVER (ORDER BY (SELECT NULL)) AS __rn
    FROM {table}
)
SELECT {cols} FROM numbered WHERE __rn > {start} AND __rn <= {end_row}"#,
            table = self.qualify(&req.schema, &req.table),
            start = req.offset,
        )
    }

    fn build_count_query(&self, schema: &str, table: &str) -> String {
        format!(
            "SELECT CAST(COUNT(*) AS BIGINT) FROM {}",
            self.qualify(schema, table)
        )
    }

    fn max_rows_per_insert(&self) -> Option<usize> {
        Some(MSSQL_MAX_INSERT_ROWS)
    }

    fn param_placeholder(&self, index: usize) -> String {
        format!("@P{}", index)
    }

    fn build_list_tables_query(&self) -> String {
        "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
         WHERE TABLE_SCHEMA = @P1 AND TABLE_TYPE = 'BASE TABLE' \
         ORDER BY TABLE_NAME"
            .to_string()
    }

    fn build_list_columns_query(&self) -> String {
        "SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.COLUMNS \
         WHERE TABLE_SCHEMA = @P1 AND TABLE_NAME = @P2 \
         ORDER BY ORDINAL_POSITION"
            .to_string()
    }

    fn build_list_dependencies_query(&self) -> String {
        r#"SELECT DISTINCT rt.name
FROM sys.foreign_keys fk
JOIN sys.tables t ON fk.parent_object_id = t.object_id
JOIN sys.schemas s ON t.schema_id = s.schema_id
JOIN sys.tables rt ON fk.referenced_object_id = rt.object_id
WHERE s.name = @P1 AND t.name = @P2
ORDER BY rt.name"#
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        let dialect = MssqlDialect::new();
        assert_eq!(dialect.quote_ident("name"), "[name]");
        assert_eq!(dialect.quote_ident("table]name"), "[table]]name]");
        assert_eq!(dialect.qualify("dbo", "Users"), "[dbo].[Users]");
    }

    #[test]
    fn test_build_page_query_windows_by_row_number() {
        let dialect = MssqlDialect::new();
        let cols = vec!["Id".to_string(), "Name".to_string()];
        let mut req = PageRequest::new("dbo", "Users", &cols, 1000);
        req.advance();
        let sql = dialect.build_page_query(&req);

        assert!(sql.contains("ROW_NUMBER() OVER (ORDER BY (SELECT NULL)) AS __rn"));
        assert!(sql.contains("FROM [dbo].[Users]"));
        assert!(sql.contains("__rn > 1000 AND __rn <= 2000"));
        assert!(sql.ends_with("SELECT [Id], [Name] FROM numbered WHERE __rn > 1000 AND __rn <= 2000"));
    }

    #[test]
    fn test_count_query() {
        let dialect = MssqlDialect::new();
        assert_eq!(
            dialect.build_count_query("dbo", "Users"),
            "SELECT CAST(COUNT(*) AS BIGINT) FROM [dbo].[Users]"
        );
    }

    #[test]
    fn test_catalog_queries_bind_schema_and_table() {
        let dialect = MssqlDialect::new();
        assert_eq!(dialect.param_placeholder(2), "@P2");
        let sql = dialect.build_list_columns_query();
        assert!(sql.contains("TABLE_SCHEMA = @P1 AND TABLE_NAME = @P2"));
        let sql = dialect.build_list_dependencies_query();
        assert!(sql.contains("s.name = @P1 AND t.name = @P2"));
    }

    #[test]
    fn test_insert_prefix() {
        let dialect = MssqlDialect::new();
        let cols = vec!["Id".to_string()];
        assert_eq!(
            dialect.build_insert_prefix("dbo", "Users", &cols),
            "INSERT INTO [dbo].[Users] ([Id]) VALUES "
        );
        assert_eq!(dialect.max_rows_per_insert(), Some(1000));
    }
}
