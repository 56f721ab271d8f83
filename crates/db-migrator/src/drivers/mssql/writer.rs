//! MSSQL target writer implementation.
//!
//! Batches are written as multi-row `INSERT ... VALUES` statements inside one
//! transaction, chunked to SQL Server's 1000-row `VALUES` limit.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::dialect::MssqlDialect;
use super::pool::{self, MssqlClient, MssqlPool};
use crate::config::DatabaseConfig;
use crate::core::traits::{Dialect, TargetWriter};
use crate::core::value::Batch;
use crate::error::{MigrateError, Result, Stage};
use crate::serializer::build_insert_statements;

/// MSSQL target writer.
pub struct MssqlWriter {
    pool: MssqlPool,
    dialect: MssqlDialect,
}

impl MssqlWriter {
    /// Connect using the target side of the configuration.
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        Ok(Self {
            pool: pool::connect(config, "target").await?,
            dialect: MssqlDialect::new(),
        })
    }
}

async fn execute_all(conn: &mut MssqlClient, statements: &[String]) -> tiberius::Result<u64> {
    let mut affected = 0u64;
    for stmt in statements {
        affected += conn.execute(stmt.as_str(), &[]).await?.total();
    }
    Ok(affected)
}

#[async_trait]
impl TargetWriter for MssqlWriter {
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
        debug!(
            "{}: inserting {} rows in {} statement(s)",
            table,
            batch.len(),
            statements.len()
        );

        let mut conn = pool::get_conn(&self.pool, table).await?;
        conn.simple_query("BEGIN TRANSACTION")
            .await
            .map_err(|e| MigrateError::query(table, Stage::Insert, e))?
            .into_results()
            .await
            .map_err(|e| MigrateError::query(table, Stage::Insert, e))?;

        match execute_all(&mut conn, &statements).await {
            Ok(affected) => {
                conn.simple_query("COMMIT TRANSACTION")
                    .await
                    .map_err(|e| MigrateError::query(table, Stage::Insert, e))?
                    .into_results()
                    .await
                    .map_err(|e| MigrateError::query(table, Stage::Insert, e))?;
                Ok(affected)
            }
            Err(e) => {
                match conn.simple_query("IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION").await {
                    Ok(stream) => {
                        let _ = stream.into_results().await;
                    }
                    Err(rollback_err) => warn!("{}: rollback failed: {}", table, rollback_err),
                }
                Err(MigrateError::query(table, Stage::Insert, e))
            }
        }
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

    async fn health_check(&self) -> Result<()> {
        let mut conn = pool::get_conn(&self.pool, "health_check").await?;
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "mssql"
    }

    async fn close(&self) {}
}
