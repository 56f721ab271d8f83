//! Periodic progress reporting tied to one table task's lifetime.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{ProgressCounter, ProgressSink};

/// Spawns the reporting task for a table.
#[derive(Clone)]
pub struct ProgressReporter {
    sink: Arc<dyn ProgressSink>,
    interval: Duration,
}

impl ProgressReporter {
    pub fn new(sink: Arc<dyn ProgressSink>, interval: Duration) -> Self {
        Self { sink, interval }
    }

    /// Start reporting `table` every interval until the guard is finished or dropped.
    pub fn start(&self, table: &str, counter: Arc<ProgressCounter>) -> ReporterGuard {
        let started = Instant::now();
        let token = CancellationToken::new();

        let handle = {
            let token = token.clone();
            let sink = Arc::clone(&self.sink);
            let counter = Arc::clone(&counter);
            let table = table.to_string();
            let period = self.interval;
            tokio::spawn(async move {
                let mut ticker = interval_at(started + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {
                            sink.report(&counter.snapshot(&table, started.elapsed()));
                        }
                    }
                }
            })
        };

        ReporterGuard {
            table: table.to_string(),
            counter,
            sink: Arc::clone(&self.sink),
            started,
            token,
            handle: Some(handle),
        }
    }
}

/// Handle to a running reporter.
///
/// [`ReporterGuard::finish`] stops the periodic task and emits the final
/// report. Dropping the guard without finishing still stops the task.
pub struct ReporterGuard {
    table: String,
    counter: Arc<ProgressCounter>,
    sink: Arc<dyn ProgressSink>,
    started: Instant,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ReporterGuard {
    /// Stop periodic reports, wait for the task to exit, then report once more.
    pub async fn finish(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        self.sink
            .report(&self.counter.snapshot(&self.table, self.started.elapsed()));
    }
}

impl Drop for ReporterGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::MemorySink;

    #[tokio::test(start_paused = true)]
    async fn test_reports_every_interval_then_final() {
        let sink = Arc::new(MemorySink::new());
        let reporter = ProgressReporter::new(sink.clone(), Duration::from_secs(1));
        let counter = Arc::new(ProgressCounter::new(100));

        let guard = reporter.start("orders", Arc::clone(&counter));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        counter.add(40);
        tokio::time::sleep(Duration::from_millis(1000)).await;
        guard.finish().await;

        let reports = sink.reports_for("orders");
        assert_eq!(reports.len(), 3, "two ticks plus the final report");
        assert_eq!(reports[0].migrated, 0);
        assert_eq!(reports[1].migrated, 40);
        assert_eq!(reports[2].migrated, 40);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_reports_after_finish() {
        let sink = Arc::new(MemorySink::new());
        let reporter = ProgressReporter::new(sink.clone(), Duration::from_secs(1));
        let guard = reporter.start("t", Arc::new(ProgressCounter::new(1)));
        guard.finish().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(sink.reports().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_reporter() {
        let sink = Arc::new(MemorySink::new());
        let reporter = ProgressReporter::new(sink.clone(), Duration::from_secs(1));
        let guard = reporter.start("t", Arc::new(ProgressCounter::new(1)));
        drop(guard);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(sink.reports().is_empty());
    }
}
