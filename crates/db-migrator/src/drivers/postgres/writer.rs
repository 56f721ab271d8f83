//! PostgreSQL target writer implementation.

use async_trait::async_trait;
use deadpool_postgres::Pool;
use tracing::debug;

use super::dialect::PostgresDialect;
use super::pool;
use crate::config::DatabaseConfig;
use crate::core::traits::{Dialect, TargetWriter};
use crate::core::value::Batch;
use crate::error::{MigrateError, Result, Stage};
use crate::serializer::build_insert_statements;

/// PostgreSQL target writer.
pub struct PostgresWriter {
    pool: Pool,
    dialect: PostgresDialect,
}

impl PostgresWriter {
    /// Connect using the target side of the configuration.
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        Ok(Self {
            pool: pool::connect(config, "target").await?,
            dialect: PostgresDialect::new(),
        })
    }
}

#[async_trait]
impl TargetWriter for PostgresWriter {
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

        let mut client = pool::get_conn(&self.pool, table).await?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| MigrateError::query(table, Stage::Insert, e))?;
        let mut affected = 0u64;
        for stmt in &statements {
            affected += tx
                .execute(stmt.as_str(), &[])
                .await
                .map_err(|e| MigrateError::query(table, Stage::Insert, e))?;
        }
        tx.commit()
            .await
            .map_err(|e| MigrateError::query(table, Stage::Insert, e))?;
        Ok(affected)
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
