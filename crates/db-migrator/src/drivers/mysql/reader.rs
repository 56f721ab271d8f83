//! MySQL source reader implementation.
//!
//! Pages are read through the binary protocol so values arrive typed.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use mysql_async::consts::ColumnType;
use mysql_async::prelude::*;
use mysql_async::{Column, Pool, Row, Value};
use tracing::debug;

use super::dialect::MysqlDialect;
use super::pool;
use crate::config::DatabaseConfig;
use crate::core::traits::{Dialect, PageRequest, SourceReader};
use crate::core::value::{Batch, SqlValue};
use crate::error::{MigrateError, Result, Stage};

/// Character set number MySQL reports for binary columns.
const BINARY_CHARSET: u16 = 63;

/// MySQL source reader.
pub struct MysqlReader {
    pool: Pool,
    dialect: MysqlDialect,
}

impl MysqlReader {
    /// Connect using the source side of the configuration.
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        Ok(Self {
            pool: pool::connect(config, "source").await?,
            dialect: MysqlDialect::new(),
        })
    }

    async fn query_names(
        &self,
        sql: String,
        params: Vec<String>,
        context: &str,
    ) -> Result<Vec<String>> {
        let mut conn = pool::get_conn(&self.pool, context).await?;
        let names: Vec<String> = conn.exec(sql, params).await?;
        Ok(names)
    }
}

#[async_trait]
impl SourceReader for MysqlReader {
    async fn fetch_page(&self, req: &PageRequest) -> Result<Batch> {
        let sql = self.dialect.build_page_query(req);
        debug!("{}: fetching rows {}..{}", req.table, req.offset, req.offset + req.limit as u64);

        let mut conn = pool::get_conn(&self.pool, &req.table).await?;
        let rows: Vec<Row> = conn
            .exec(sql, ())
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
        let count: Option<i64> = conn
            .query_first(sql)
            .await
            .map_err(|e| MigrateError::query(table, Stage::RowCount, e))?;
        Ok(count.unwrap_or(0))
    }

    async fn list_tables(&self, schema: &str) -> Result<Vec<String>> {
        self.query_names(
            self.dialect.build_list_tables_query(),
            vec![schema.to_string()],
            "list_tables",
        )
        .await
    }

    async fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        self.query_names(
            self.dialect.build_list_columns_query(),
            vec![schema.to_string(), table.to_string()],
            "list_columns",
        )
        .await
    }

    async fn list_dependencies(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        self.query_names(
            self.dialect.build_list_dependencies_query(),
            vec![schema.to_string(), table.to_string()],
            "list_dependencies",
        )
        .await
    }

    async fn health_check(&self) -> Result<()> {
        let mut conn = pool::get_conn(&self.pool, "health_check").await?;
        conn.query_drop("SELECT 1").await?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "mysql"
    }

    async fn close(&self) {
        if let Err(e) = self.pool.clone().disconnect().await {
            debug!("MySQL source pool disconnect: {}", e);
        }
    }
}

fn convert_row(mut row: Row) -> std::result::Result<Vec<SqlValue<'static>>, String> {
    let columns = row.columns();
    (0..columns.len())
        .map(|idx| {
            let value = row.take::<Value, _>(idx).unwrap_or(Value::NULL);
            convert_value(&columns[idx], value)
        })
        .collect()
}

/// Convert one binary-protocol value using its column metadata.
fn convert_value(column: &Column, value: Value) -> std::result::Result<SqlValue<'static>, String> {
    let converted = match value {
        Value::NULL => SqlValue::Null,
        Value::Int(v) => SqlValue::I64(v),
        Value::UInt(v) => SqlValue::U64(v),
        Value::Float(v) => SqlValue::F32(v),
        Value::Double(v) => SqlValue::F64(v),
        Value::Bytes(bytes) => {
            let is_binary = column.character_set() == BINARY_CHARSET
                && !matches!(
                    column.column_type(),
                    ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL
                );
            if is_binary {
                SqlValue::bytes_owned(bytes)
            } else {
                match String::from_utf8(bytes) {
                    Ok(s) => SqlValue::text_owned(s),
                    Err(e) => SqlValue::bytes_owned(e.into_bytes()),
                }
            }
        }
        Value::Date(year, month, day, hour, minute, second, micros) => {
            let date_only = column.column_type() == ColumnType::MYSQL_TYPE_DATE;
            match NaiveDate::from_ymd_opt(year.into(), month.into(), day.into()) {
                Some(date) if date_only => SqlValue::Date(date),
                Some(date) => {
                    let time = NaiveTime::from_hms_micro_opt(
                        hour.into(),
                        minute.into(),
                        second.into(),
                        micros,
                    )
                    .ok_or_else(|| format!("column {}: invalid time", column.name_str()))?;
                    SqlValue::DateTime(date.and_time(time))
                }
                // zero dates such as 0000-00-00 are allowed outside strict mode
                None => {
                    let mut text = format!("{year:04}-{month:02}-{day:02}");
                    if !date_only {
                        text.push_str(&format!(" {hour:02}:{minute:02}:{second:02}"));
                        if micros > 0 {
                            text.push_str(&format!(".{micros:06}"));
                        }
                    }
                    SqlValue::text_owned(text)
                }
            }
        }
        Value::Time(false, 0, hours, minutes, seconds, micros) => {
            NaiveTime::from_hms_micro_opt(hours.into(), minutes.into(), seconds.into(), micros)
                .map(SqlValue::Time)
                .ok_or_else(|| format!("column {}: invalid time", column.name_str()))?
        }
        // TIME can exceed a day or be negative; keep it as text
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            let sign = if negative { "-" } else { "" };
            let total_hours = days * 24 + u32::from(hours);
            SqlValue::text_owned(format!(
                "{sign}{total_hours:02}:{minutes:02}:{seconds:02}.{micros:06}"
            ))
        }
    };
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(ty: ColumnType) -> Column {
        Column::new(ty).with_name(b"created_at")
    }

    #[test]
    fn test_zero_datetime_passes_through_as_text() {
        let value = convert_value(
            &column(ColumnType::MYSQL_TYPE_DATETIME),
            Value::Date(0, 0, 0, 0, 0, 0, 0),
        )
        .unwrap();
        assert_eq!(value, SqlValue::text_owned("0000-00-00 00:00:00".to_string()));
    }

    #[test]
    fn test_zero_date_passes_through_as_text() {
        let value =
            convert_value(&column(ColumnType::MYSQL_TYPE_DATE), Value::Date(0, 0, 0, 0, 0, 0, 0))
                .unwrap();
        assert_eq!(value, SqlValue::text_owned("0000-00-00".to_string()));
    }

    #[test]
    fn test_valid_datetime_is_typed() {
        let value = convert_value(
            &column(ColumnType::MYSQL_TYPE_DATETIME),
            Value::Date(2024, 3, 9, 14, 5, 7, 250_000),
        )
        .unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_micro_opt(14, 5, 7, 250_000)
            .unwrap();
        assert_eq!(value, SqlValue::DateTime(expected));
    }

    #[test]
    fn test_long_time_becomes_text() {
        let value = convert_value(
            &column(ColumnType::MYSQL_TYPE_TIME),
            Value::Time(true, 1, 2, 3, 4, 0),
        )
        .unwrap();
        assert_eq!(value, SqlValue::text_owned("-26:03:04.000000".to_string()));
    }
}
