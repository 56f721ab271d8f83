//! Wave-barrier dispatch of table migration tasks.
//!
//! Waves come from [`DependencyGraph`]. Every table of a wave runs as its own
//! task; the next wave starts only after all of them have finished. The first
//! failure cancels the run: siblings stop at their next batch boundary, no
//! further wave is dispatched, and that error is returned.

mod graph;

pub use graph::{DependencyGraph, Wave};

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{MigrateError, Result};
use crate::progress::{ProgressCounter, ProgressMap};
use crate::transfer::{TableMigrationTask, TableResult, TableStatus, TransferContext};

/// Runs the waves of a graph.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    max_parallel_tables: usize,
}

/// What a scheduler run produced.
#[derive(Debug)]
pub struct ScheduleReport {
    /// One entry per table, in configured order.
    pub tables: Vec<TableResult>,
    /// Waves actually dispatched.
    pub waves_run: usize,
    /// The error that stopped the run.
    pub error: Option<MigrateError>,
}

impl ScheduleReport {
    pub fn into_result(self) -> Result<Vec<TableResult>> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.tables),
        }
    }
}

impl Scheduler {
    /// `max_parallel_tables == 0` leaves waves unbounded.
    pub fn new(max_parallel_tables: usize) -> Self {
        Self {
            max_parallel_tables,
        }
    }

    pub async fn run(
        &self,
        graph: &DependencyGraph,
        progress: &ProgressMap,
        ctx: &TransferContext,
        cancel: &CancellationToken,
    ) -> ScheduleReport {
        let semaphore = (self.max_parallel_tables > 0)
            .then(|| Arc::new(Semaphore::new(self.max_parallel_tables)));

        let mut results: HashMap<String, TableResult> = HashMap::new();
        let mut first_error: Option<MigrateError> = None;
        let mut waves_run = 0;

        for (n, wave) in graph.waves().enumerate() {
            if first_error.is_some() {
                break;
            }
            if cancel.is_cancelled() {
                first_error = Some(MigrateError::Cancelled);
                break;
            }

            let names: Vec<&str> = wave.iter().map(|t| t.name.as_str()).collect();
            info!("Wave {}/{}: {}", n + 1, graph.len(), names.join(", "));
            waves_run += 1;

            let mut set = JoinSet::new();
            for table in &wave {
                let counter = counter_for(progress, &table.name);
                let task = TableMigrationTask::new((*table).clone(), counter);
                let ctx = ctx.clone();
                let cancel = cancel.clone();
                let semaphore = semaphore.clone();

                set.spawn(async move {
                    let _permit = match semaphore {
                        Some(sem) => {
                            let acquired = tokio::select! {
                                biased;
                                _ = cancel.cancelled() => None,
                                permit = sem.acquire_owned() => permit.ok(),
                            };
                            match acquired {
                                Some(permit) => Some(permit),
                                None => return task.skip(),
                            }
                        }
                        None => None,
                    };
                    task.run(&ctx, &cancel).await
                });
            }

            let mut panics = Vec::new();
            while let Some(joined) = set.join_next().await {
                let run = match joined {
                    Ok(run) => run,
                    Err(e) => {
                        error!("Table task panicked: {}", e);
                        cancel.cancel();
                        panics.push(e.to_string());
                        continue;
                    }
                };

                if let Err(e) = run.outcome {
                    if matches!(e, MigrateError::Cancelled) {
                        if run.result.status == TableStatus::Skipped {
                            warn!("{}: not started after cancellation", run.result.table);
                        } else {
                            warn!("{}: stopped after cancellation", run.result.table);
                        }
                    } else if first_error.is_none() {
                        error!("{}", e);
                        cancel.cancel();
                        first_error = Some(e);
                    } else {
                        error!("{}", e);
                    }
                }
                results.insert(run.result.table.clone(), run.result);
            }

            // Tables without a result are the ones whose task panicked.
            let mut panics = panics.into_iter();
            for table in &wave {
                if results.contains_key(&table.name) {
                    continue;
                }
                let message = format!("task panicked: {}", panics.next().unwrap_or_default());
                if first_error.is_none() {
                    first_error = Some(MigrateError::Transfer {
                        table: table.name.clone(),
                        message: message.clone(),
                    });
                }
                let counter = counter_for(progress, &table.name);
                let mut result = TableResult::skipped(&table.name, &counter);
                result.status = TableStatus::Failed;
                result.error = Some(message);
                results.insert(table.name.clone(), result);
            }
        }

        if first_error.is_none() && cancel.is_cancelled() {
            first_error = Some(MigrateError::Cancelled);
        }

        let tables = graph
            .tables()
            .iter()
            .map(|t| {
                results.remove(&t.name).unwrap_or_else(|| {
                    TableResult::skipped(&t.name, &counter_for(progress, &t.name))
                })
            })
            .collect();

        ScheduleReport {
            tables,
            waves_run,
            error: first_error,
        }
    }
}

fn counter_for(progress: &ProgressMap, table: &str) -> Arc<ProgressCounter> {
    progress
        .get(table)
        .unwrap_or_else(|| Arc::new(ProgressCounter::new(0)))
}
