//! MySQL SQL dialect (Strategy pattern).
//!
//! In MySQL a "schema" is a database, so catalog queries filter on
//! `TABLE_SCHEMA`.

use crate::core::traits::{Dialect, PageRequest};
use crate::drivers::common::hex;

/// MySQL/MariaDB dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    /// Create a new MySQL dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for MysqlDialect {
    fn name(&self) -> &str {
        "mysql"
    }

    fn quote_ident(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn quote_literal(&self, value: &str) -> String {
        // Backslash is an escape character unless NO_BACKSLASH_ESCAPES is set.
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
    }

    fn bytes_literal(&self, value: &[u8]) -> String {
        format!("X'{}'", hex(value))
    }

    fn build_page_query(&self, req: &PageRequest) -> String {
        format!(
            "SELECT {} FROM {} LIMIT {} OFFSET {}",
            self.column_list(&req.columns),
            self.qualify(&req.schema, &req.table),
            req.limit,
            req.offset
        )
    }

    fn param_placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn build_list_tables_query(&self) -> String {
        "SELECT TABLE_NAME FROM information_schema.TABLES \
         WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE' \
         ORDER BY TABLE_NAME"
            .to_string()
    }

    fn build_list_columns_query(&self) -> String {
        "SELECT COLUMN_NAME FROM information_schema.COLUMNS \
         WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
         ORDER BY ORDINAL_POSITION"
            .to_string()
    }

    fn build_list_dependencies_query(&self) -> String {
        "SELECT DISTINCT REFERENCED_TABLE_NAME FROM information_schema.KEY_COLUMN_USAGE \
         WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
         AND REFERENCED_TABLE_NAME IS NOT NULL \
         ORDER BY REFERENCED_TABLE_NAME"
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        let dialect = MysqlDialect::new();
        assert_eq!(dialect.quote_ident("name"), "`name`");
        assert_eq!(dialect.quote_ident("table`name"), "`table``name`");
    }

    #[test]
    fn test_quote_literal_escapes_backslash() {
        let dialect = MysqlDialect::new();
        assert_eq!(dialect.quote_literal(r"a\'b"), r"'a\\''b'");
    }

    #[test]
    fn test_build_page_query() {
        let dialect = MysqlDialect::new();
        let cols = vec!["id".to_string()];
        let mut req = PageRequest::new("shop", "orders", &cols, 100);
        req.advance();
        assert_eq!(
            dialect.build_page_query(&req),
            "SELECT `id` FROM `shop`.`orders` LIMIT 100 OFFSET 100"
        );
    }

    #[test]
    fn test_dependencies_query() {
        let sql = MysqlDialect::new().build_list_dependencies_query();
        assert!(sql.contains("TABLE_SCHEMA = ? AND TABLE_NAME = ?"));
        assert!(sql.contains("REFERENCED_TABLE_NAME IS NOT NULL"));
    }
}
