//! MSSQL source reader implementation.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use tiberius::{ColumnData, FromSql, Query, Row};
use tracing::debug;

use super::dialect::MssqlDialect;
use super::pool::{self, MssqlPool};
use crate::config::DatabaseConfig;
use crate::core::traits::{Dialect, PageRequest, SourceReader};
use crate::core::value::{Batch, SqlValue};
use crate::error::{MigrateError, Result, Stage};

/// MSSQL source reader.
pub struct MssqlReader {
    pool: MssqlPool,
    dialect: MssqlDialect,
}

impl MssqlReader {
    /// Connect using the source side of the configuration.
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        Ok(Self {
            pool: pool::connect(config, "source").await?,
            dialect: MssqlDialect::new(),
        })
    }

    /// Run a catalog query binding `params`, returning the first column of each row.
    async fn query_names(&self, sql: &str, params: &[&str], context: &str) -> Result<Vec<String>> {
        let mut conn = pool::get_conn(&self.pool, context).await?;
        let mut query = Query::new(sql);
        for p in params {
            query.bind(*p);
        }
        let rows = query.query(&mut *conn).await?.into_first_result().await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get::<&str, _>(0).map(str::to_string))
            .collect())
    }
}

#[async_trait]
impl SourceReader for MssqlReader {
    async fn fetch_page(&self, req: &PageRequest) -> Result<Batch> {
        let sql = self.dialect.build_page_query(req);
        debug!("{}: fetching rows {}..{}", req.table, req.offset, req.offset + req.limit as u64);

        let mut conn = pool::get_conn(&self.pool, &req.table).await?;
        let rows = conn
            .simple_query(sql)
            .await
            .map_err(|e| MigrateError::query(&req.table, Stage::Fetch, e))?
            .into_first_result()
            .await
            .map_err(|e| MigrateError::query(&req.table, Stage::Fetch, e))?;

        let rows = rows
            .into_iter()
            .map(convert_row)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| MigrateError::query(&req.table, Stage::Decode, e))?;

        Ok(Batch::new(rows, req.offset))
    }

    async fn row_count(&self, schema: &str, table: &str) -> Result<i64> {
        let sql = self.dialect.build_count_query(schema, table);
        let mut conn = pool::get_conn(&self.pool, table).await?;
        let row = conn
            .simple_query(sql)
            .await
            .map_err(|e| MigrateError::query(table, Stage::RowCount, e))?
            .into_row()
            .await
            .map_err(|e| MigrateError::query(table, Stage::RowCount, e))?;
        Ok(row.and_then(|r| r.get::<i64, _>(0)).unwrap_or(0))
    }

    async fn list_tables(&self, schema: &str) -> Result<Vec<String>> {
        self.query_names(&self.dialect.build_list_tables_query(), &[schema], "list_tables")
            .await
    }

    async fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        self.query_names(
            &self.dialect.build_list_columns_query(),
            &[schema, table],
            "list_columns",
        )
        .await
    }

    async fn list_dependencies(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        self.query_names(
            &self.dialect.build_list_dependencies_query(),
            &[schema, table],
            "list_dependencies",
        )
        .await
    }

    async fn health_check(&self) -> Result<()> {
        let mut conn = pool::get_conn(&self.pool, "health_check").await?;
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "mssql"
    }

    async fn close(&self) {
        // bb8 closes connections when the pool is dropped.
    }
}

fn convert_row(row: Row) -> tiberius::Result<Vec<SqlValue<'static>>> {
    row.into_iter().map(|data| convert_column(&data)).collect()
}

/// Convert one TDS column value into a driver-neutral value.
fn convert_column(data: &ColumnData<'static>) -> tiberius::Result<SqlValue<'static>> {
    let value = match data {
        ColumnData::U8(v) => (*v).into(),
        ColumnData::I16(v) => (*v).into(),
        ColumnData::I32(v) => (*v).into(),
        ColumnData::I64(v) => (*v).into(),
        ColumnData::F32(v) => (*v).into(),
        ColumnData::F64(v) => (*v).into(),
        ColumnData::Bit(v) => (*v).into(),
        ColumnData::Guid(v) => (*v).into(),
        ColumnData::String(v) => v.as_ref().map(|s| s.to_string()).into(),
        ColumnData::Binary(v) => v.as_ref().map(|b| b.to_vec()).into(),
        ColumnData::Xml(v) => v.as_ref().map(|x| (**x).clone().into_string()).into(),
        ColumnData::Numeric(_) => Decimal::from_sql(data)?.into(),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(data)?.into()
        }
        ColumnData::Date(_) => NaiveDate::from_sql(data)?.into(),
        ColumnData::Time(_) => NaiveTime::from_sql(data)?.into(),
        ColumnData::DateTimeOffset(_) => DateTime::<FixedOffset>::from_sql(data)?.into(),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[test]
    fn test_convert_scalar_columns() {
        assert_eq!(convert_column(&ColumnData::I32(Some(7))).unwrap(), SqlValue::I32(7));
        assert_eq!(convert_column(&ColumnData::I64(None)).unwrap(), SqlValue::Null);
        assert_eq!(convert_column(&ColumnData::Bit(Some(true))).unwrap(), SqlValue::Bool(true));
        assert_eq!(
            convert_column(&ColumnData::String(Some(Cow::Borrowed("abc")))).unwrap(),
            SqlValue::text_owned("abc".into())
        );
        assert_eq!(
            convert_column(&ColumnData::Binary(Some(Cow::Owned(vec![1, 2])))).unwrap(),
            SqlValue::bytes_owned(vec![1, 2])
        );
    }

    #[test]
    fn test_convert_null_temporal() {
        assert!(convert_column(&ColumnData::DateTime2(None)).unwrap().is_null());
        assert!(convert_column(&ColumnData::Numeric(None)).unwrap().is_null());
    }
}
