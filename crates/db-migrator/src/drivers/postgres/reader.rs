//! PostgreSQL source reader implementation.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use deadpool_postgres::Pool;
use rust_decimal::Decimal;
use tokio_postgres::types::{FromSql, Type};
use tracing::debug;
use uuid::Uuid;

use super::dialect::PostgresDialect;
use super::pool;
use crate::config::DatabaseConfig;
use crate::core::traits::{Dialect, PageRequest, SourceReader};
use crate::core::value::{Batch, SqlValue};
use crate::error::{MigrateError, Result, Stage};

/// PostgreSQL source reader.
pub struct PostgresReader {
    pool: Pool,
    dialect: PostgresDialect,
}

impl PostgresReader {
    /// Connect using the source side of the configuration.
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        Ok(Self {
            pool: pool::connect(config, "source").await?,
            dialect: PostgresDialect::new(),
        })
    }

    async fn query_names(
        &self,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
        context: &str,
    ) -> Result<Vec<String>> {
        let client = pool::get_conn(&self.pool, context).await?;
        let rows = client.query(sql, params).await?;
        rows.iter()
            .map(|row| row.try_get::<_, String>(0))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| MigrateError::query(context, Stage::Introspect, e))
    }
}

#[async_trait]
impl SourceReader for PostgresReader {
    async fn fetch_page(&self, req: &PageRequest) -> Result<Batch> {
        debug!("{}: fetching rows {}..{}", req.table, req.offset, req.offset + req.limit as u64);
        let client = pool::get_conn(&self.pool, &req.table).await?;

        // Column types come from an empty page whose SQL is the same for every
        // page of the table, so the cached statement is reused per connection.
        let shape = PageRequest {
            offset: 0,
            limit: 0,
            ..req.clone()
        };
        let stmt = client
            .prepare_cached(&self.dialect.build_page_query(&shape))
            .await
            .map_err(|e| MigrateError::query(&req.table, Stage::Fetch, e))?;
        let text_columns: Vec<bool> = stmt
            .columns()
            .iter()
            .map(|c| needs_text_cast(c.type_()))
            .collect();

        let sql = if text_columns.contains(&true) {
            self.dialect.build_text_page_query(req, &text_columns)
        } else {
            self.dialect.build_page_query(req)
        };
        let rows = client
            .query(sql.as_str(), &[])
            .await
            .map_err(|e| MigrateError::query(&req.table, Stage::Fetch, e))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let values = (0..row.len())
                .map(|idx| convert_pg_value(row, idx))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| MigrateError::query(&req.table, Stage::Decode, e))?;
            out.push(values);
        }
        Ok(Batch::new(out, req.offset))
    }

    async fn row_count(&self, schema: &str, table: &str) -> Result<i64> {
        let sql = self.dialect.build_count_query(schema, table);
        let client = pool::get_conn(&self.pool, table).await?;
        let row = client
            .query_one(sql.as_str(), &[])
            .await
            .map_err(|e| MigrateError::query(table, Stage::RowCount, e))?;
        row.try_get::<_, i64>(0)
            .map_err(|e| MigrateError::query(table, Stage::RowCount, e))
    }

    async fn list_tables(&self, schema: &str) -> Result<Vec<String>> {
        self.query_names(&self.dialect.build_list_tables_query(), &[&schema], "list_tables")
            .await
    }

    async fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        self.query_names(
            &self.dialect.build_list_columns_query(),
            &[&schema, &table],
            "list_columns",
        )
        .await
    }

    async fn list_dependencies(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        self.query_names(
            &self.dialect.build_list_dependencies_query(),
            &[&schema, &table],
            "list_dependencies",
        )
        .await
    }

    async fn health_check(&self) -> Result<()> {
        let client = pool::get_conn(&self.pool, "health_check").await?;
        client.simple_query("SELECT 1").await?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "postgres"
    }

    async fn close(&self) {
        self.pool.close();
    }
}

/// Type names decoded natively by [`convert_pg_value`].
const NATIVE_TYPES: &[&str] = &[
    "bool",
    "int2",
    "int4",
    "int8",
    "oid",
    "float4",
    "float8",
    "numeric",
    "uuid",
    "timestamp",
    "timestamptz",
    "date",
    "time",
    "bytea",
    "json",
    "jsonb",
];

/// True when a column must be selected as `::text` to be readable.
///
/// Covers `interval`, `inet`, `money`, arrays, user enums and anything else
/// that is neither decoded natively nor accepted as a Rust `String`.
fn needs_text_cast(ty: &Type) -> bool {
    !NATIVE_TYPES.contains(&ty.name()) && !<String as FromSql>::accepts(ty)
}

/// Decode one column by its runtime type name.
fn convert_pg_value(
    row: &tokio_postgres::Row,
    idx: usize,
) -> std::result::Result<SqlValue<'static>, tokio_postgres::Error> {
    let value = match row.columns()[idx].type_().name() {
        "bool" => row.try_get::<_, Option<bool>>(idx)?.into(),
        "int2" => row.try_get::<_, Option<i16>>(idx)?.into(),
        "int4" => row.try_get::<_, Option<i32>>(idx)?.into(),
        "int8" => row.try_get::<_, Option<i64>>(idx)?.into(),
        "oid" => row.try_get::<_, Option<u32>>(idx)?.map(i64::from).into(),
        "float4" => row.try_get::<_, Option<f32>>(idx)?.into(),
        "float8" => row.try_get::<_, Option<f64>>(idx)?.into(),
        "numeric" => row.try_get::<_, Option<Decimal>>(idx)?.into(),
        "uuid" => row.try_get::<_, Option<Uuid>>(idx)?.into(),
        "timestamp" => row.try_get::<_, Option<NaiveDateTime>>(idx)?.into(),
        "timestamptz" => row.try_get::<_, Option<DateTime<Utc>>>(idx)?.into(),
        "date" => row.try_get::<_, Option<NaiveDate>>(idx)?.into(),
        "time" => row.try_get::<_, Option<NaiveTime>>(idx)?.into(),
        "bytea" => row.try_get::<_, Option<Vec<u8>>>(idx)?.into(),
        "json" | "jsonb" => row
            .try_get::<_, Option<serde_json::Value>>(idx)?
            .map(|v| v.to_string())
            .into(),
        // text-like columns and anything cast to text by the page query
        _ => row.try_get::<_, Option<String>>(idx)?.into(),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_cast_for_types_without_native_decoding() {
        for ty in [
            Type::INTERVAL,
            Type::INET,
            Type::MONEY,
            Type::TIMETZ,
            Type::INT4_ARRAY,
            Type::TEXT_ARRAY,
            Type::XML,
        ] {
            assert!(needs_text_cast(&ty), "{} should be cast to text", ty.name());
        }
    }

    #[test]
    fn test_no_cast_for_decoded_types() {
        for ty in [
            Type::INT4,
            Type::NUMERIC,
            Type::TIMESTAMPTZ,
            Type::JSONB,
            Type::BYTEA,
            Type::TEXT,
            Type::VARCHAR,
            Type::BPCHAR,
            Type::NAME,
        ] {
            assert!(!needs_text_cast(&ty), "{} should not be cast", ty.name());
        }
    }
}
