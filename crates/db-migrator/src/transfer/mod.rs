//! Paged copy of one table from source to target.
//!
//! A [`TableMigrationTask`] walks the source table page by page: fetch
//! `[offset, offset + batch_size)`, write the rows to the target, bump the
//! table's progress counter, and advance. A page shorter than the batch size
//! is the last one.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::core::{PageRequest, SourceReader, TableDescriptor, TargetWriter};
use crate::error::{MigrateError, Result};
use crate::progress::{ProgressCounter, ProgressReporter};

/// Connections and settings shared by every table task of a run.
#[derive(Clone)]
pub struct TransferContext {
    pub source: Arc<dyn SourceReader>,
    pub target: Arc<dyn TargetWriter>,
    pub source_schema: String,
    pub target_schema: String,
    pub batch_size: usize,
    pub reporter: ProgressReporter,
}

/// Final state of one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Completed,
    Failed,
    Cancelled,
    /// Never dispatched because the run stopped first.
    Skipped,
}

/// Outcome of one table's migration.
#[derive(Debug, Clone, Serialize)]
pub struct TableResult {
    pub table: String,
    pub status: TableStatus,
    pub rows_total: i64,
    pub rows_migrated: i64,
    pub pages: u64,
    pub duration_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TableResult {
    fn new(table: &str, status: TableStatus, counter: &ProgressCounter) -> Self {
        Self {
            table: table.to_string(),
            status,
            rows_total: counter.total(),
            rows_migrated: counter.migrated(),
            pages: 0,
            duration_secs: 0.0,
            error: None,
        }
    }

    /// Result for a table whose task never started.
    pub fn skipped(table: &str, counter: &ProgressCounter) -> Self {
        Self::new(table, TableStatus::Skipped, counter)
    }

    pub fn is_completed(&self) -> bool {
        self.status == TableStatus::Completed
    }
}

/// Copies one table.
pub struct TableMigrationTask {
    table: TableDescriptor,
    counter: Arc<ProgressCounter>,
}

impl TableMigrationTask {
    pub fn new(table: TableDescriptor, counter: Arc<ProgressCounter>) -> Self {
        Self { table, counter }
    }

    pub fn name(&self) -> &str {
        &self.table.name
    }

    /// Result for a task that was cancelled before it was dispatched.
    ///
    /// No reporter is started and nothing is read.
    pub fn skip(self) -> TableRun {
        TableRun {
            result: TableResult::skipped(&self.table.name, &self.counter),
            outcome: Err(MigrateError::Cancelled),
        }
    }

    /// Copy every page, reporting progress while running.
    ///
    /// The periodic reporter is stopped and the final report emitted on every
    /// exit path. `cancel` is checked before each page, so a cancelled run
    /// stops after the batch in flight.
    #[instrument(name = "table", skip_all, fields(table = %self.table.name))]
    pub async fn run(self, ctx: &TransferContext, cancel: &CancellationToken) -> TableRun {
        let started = Instant::now();
        let guard = ctx
            .reporter
            .start(&self.table.name, Arc::clone(&self.counter));

        let mut pages = 0u64;
        let outcome = self.copy_pages(ctx, cancel, &mut pages).await;
        guard.finish().await;

        let status = match &outcome {
            Ok(()) => TableStatus::Completed,
            Err(MigrateError::Cancelled) => TableStatus::Cancelled,
            Err(_) => TableStatus::Failed,
        };
        let mut result = TableResult::new(&self.table.name, status, &self.counter);
        result.pages = pages;
        result.duration_secs = started.elapsed().as_secs_f64();
        result.error = outcome.as_ref().err().map(|e| e.to_string());

        if result.is_completed() {
            info!(
                "{}: migrated {} rows in {} pages ({:.1}s)",
                self.table.name, result.rows_migrated, pages, result.duration_secs
            );
        }

        TableRun { result, outcome }
    }

    async fn copy_pages(
        &self,
        ctx: &TransferContext,
        cancel: &CancellationToken,
        pages: &mut u64,
    ) -> Result<()> {
        let mut req = PageRequest::new(
            &ctx.source_schema,
            &self.table.name,
            &self.table.columns,
            ctx.batch_size,
        );

        loop {
            if cancel.is_cancelled() {
                return Err(MigrateError::Cancelled);
            }

            let batch = ctx.source.fetch_page(&req).await?;
            *pages += 1;
            let last = batch.is_last(req.limit);

            if !batch.is_empty() {
                let written = ctx
                    .target
                    .write_batch(&ctx.target_schema, &self.table.name, &self.table.columns, &batch)
                    .await?;
                self.counter.add(written);
            }

            debug!(
                "{}: page at offset {} had {} rows",
                self.table.name,
                req.offset,
                batch.len()
            );

            if last {
                return Ok(());
            }
            req.advance();
        }
    }
}

/// A table result paired with the error that ended it, if any.
pub struct TableRun {
    pub result: TableResult,
    pub outcome: Result<()>,
}
