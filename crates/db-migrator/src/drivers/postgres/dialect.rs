//! PostgreSQL SQL dialect (Strategy pattern).

use crate::core::traits::{Dialect, PageRequest};
use crate::drivers::common::hex;

/// PostgreSQL dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Create a new PostgreSQL dialect instance.
    pub fn new() -> Self {
        Self
    }

    /// Page query that casts the flagged columns to `text`.
    ///
    /// `text_columns` runs parallel to `req.columns`; missing entries mean no cast.
    pub fn build_text_page_query(&self, req: &PageRequest, text_columns: &[bool]) -> String {
        let cols = req
            .columns
            .iter()
            .enumerate()
            .map(|(idx, c)| {
                if text_columns.get(idx).copied().unwrap_or(false) {
                    format!("{}::text", self.quote_ident(c))
                } else {
                    self.quote_ident(c)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        self.page_query(&cols, req)
    }

    fn page_query(&self, select_list: &str, req: &PageRequest) -> String {
        format!(
            "SELECT {} FROM {} LIMIT {} OFFSET {}",
            select_list,
            self.qualify(&req.schema, &req.table),
            req.limit,
            req.offset
        )
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn quote_ident(&self, name: &str) -> String {
        // Handle names that contain double quotes by doubling them
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn bytes_literal(&self, value: &[u8]) -> String {
        format!("'\\x{}'", hex(value))
    }

    fn build_page_query(&self, req: &PageRequest) -> String {
        self.page_query(&self.column_list(&req.columns), req)
    }

    fn param_placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn build_list_tables_query(&self) -> String {
        "SELECT table_name::text FROM information_schema.tables \
         WHERE table_schema = $1 AND table_type = 'BASE TABLE' \
         ORDER BY table_name"
            .to_string()
    }

    fn build_list_columns_query(&self) -> String {
        "SELECT column_name::text FROM information_schema.columns \
         WHERE table_schema = $1 AND table_name = $2 \
         ORDER BY ordinal_position"
            .to_string()
    }

    fn build_list_dependencies_query(&self) -> String {
        r#"SELECT DISTINCT ccu.table_name::text
FROM information_schema.table_constraints AS tc
JOIN information_schema.constraint_column_usage AS ccu
  ON ccu.constraint_name = tc.constraint_name
 AND ccu.constraint_schema = tc.constraint_schema
WHERE tc.constraint_type = 'FOREIGN KEY'
  AND tc.table_schema = $1
  AND tc.table_name = $2
ORDER BY 1"#
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.quote_ident("name"), "\"name\"");
        assert_eq!(dialect.quote_ident("table\"name"), "\"table\"\"name\"");
        assert_eq!(dialect.quote_ident("Users"), "\"Users\"");
    }

    #[test]
    fn test_build_page_query() {
        let dialect = PostgresDialect::new();
        let cols = vec!["id".to_string(), "name".to_string()];
        let mut req = PageRequest::new("public", "users", &cols, 500);
        assert_eq!(
            dialect.build_page_query(&req),
            "SELECT \"id\", \"name\" FROM \"public\".\"users\" LIMIT 500 OFFSET 0"
        );
        req.advance();
        assert!(dialect.build_page_query(&req).ends_with("LIMIT 500 OFFSET 500"));
    }

    #[test]
    fn test_text_page_query_casts_flagged_columns() {
        let dialect = PostgresDialect::new();
        let cols = vec!["id".to_string(), "span".to_string(), "addr".to_string()];
        let req = PageRequest::new("public", "events", &cols, 100);
        assert_eq!(
            dialect.build_text_page_query(&req, &[false, true, true]),
            "SELECT \"id\", \"span\"::text, \"addr\"::text FROM \"public\".\"events\" LIMIT 100 OFFSET 0"
        );
        assert_eq!(
            dialect.build_text_page_query(&req, &[]),
            dialect.build_page_query(&req)
        );
    }

    #[test]
    fn test_count_query() {
        let dialect = PostgresDialect::new();
        assert_eq!(
            dialect.build_count_query("public", "users"),
            "SELECT COUNT(*) FROM \"public\".\"users\""
        );
    }

    #[test]
    fn test_no_insert_row_limit() {
        assert_eq!(PostgresDialect::new().max_rows_per_insert(), None);
    }

    #[test]
    fn test_list_tables_query() {
        let sql = PostgresDialect::new().build_list_tables_query();
        assert!(sql.contains("table_schema = $1"));
        assert!(sql.contains("BASE TABLE"));
    }
}
