//! MySQL/MariaDB target writer implementation.

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Pool, TxOpts};
use tracing::debug;

use super::dialect::MysqlDialect;
use super::pool;
use crate::config::DatabaseConfig;
use crate::core::traits::{Dialect, TargetWriter};
use crate::core::value::Batch;
use crate::error::{MigrateError, Result, Stage};
use crate::serializer::build_insert_statements;

/// MySQL target writer.
pub struct MysqlWriter {
    pool: Pool,
    dialect: MysqlDialect,
}

impl MysqlWriter {
    /// Connect using the target side of the configuration.
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        Ok(Self {
            pool: pool::connect(config, "target").await?,
            dialect: MysqlDialect::new(),
        })
    }
}

#[async_trait]
impl TargetWriter for MysqlWriter {
    async fn write_batch(
        &self,
        schema: &str,
        table: &str,
        cols: &[String],
        batch: &Batch,
    ) -> Result<u64> {
        let statements = build_insert_statements(&self.dialect, schema, table, cols, &batch.rows);
        if statements.is_empty() {
            return Ok(0);
        }
        debug!("{}: inserting {} rows", table, batch.len());

        let mut conn = pool::get_conn(&self.pool, table).await?;
        let mut tx = conn
            .start_transaction(TxOpts::default())
            .await
            .map_err(|e| MigrateError::query(table, Stage::Insert, e))?;
        let mut affected = 0u64;
        for stmt in &statements {
            tx.query_drop(stmt.as_str())
                .await
                .map_err(|e| MigrateError::query(table, Stage::Insert, e))?;
            affected += tx.affected_rows();
        }
        tx.commit()
            .await
            .map_err(|e| MigrateError::query(table, Stage::Insert, e))?;
        Ok(affected)
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
            debug!("MySQL target pool disconnect: {}", e);
        }
    }
}
