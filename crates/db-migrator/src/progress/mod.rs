//! Per-table progress counters and their textual reports.
//!
//! Every table gets a [`ProgressCounter`] before scheduling starts. Only the
//! table's own migration task adds to it; reporters read it concurrently.
//! Counters are plain atomics, so unrelated tables never contend.

mod reporter;

pub use reporter::{ProgressReporter, ReporterGuard};

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tracing::info;

/// Rows migrated so far against the row count probed up front.
#[derive(Debug)]
pub struct ProgressCounter {
    migrated: AtomicI64,
    total: i64,
}

impl ProgressCounter {
    pub fn new(total: i64) -> Self {
        Self {
            migrated: AtomicI64::new(0),
            total: total.max(0),
        }
    }

    /// Record rows durably written to the target.
    pub fn add(&self, rows: u64) {
        self.migrated.fetch_add(rows as i64, Ordering::Relaxed);
    }

    pub fn migrated(&self) -> i64 {
        self.migrated.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> i64 {
        self.total
    }

    /// Point-in-time view for reporting.
    pub fn snapshot(&self, table: &str, elapsed: Duration) -> ProgressSnapshot {
        ProgressSnapshot {
            table: table.to_string(),
            migrated: self.migrated(),
            total: self.total,
            elapsed,
        }
    }
}

/// Counters for every table in a run, keyed by table name.
///
/// The set of tables is fixed at construction; lookups need no lock.
#[derive(Debug, Default)]
pub struct ProgressMap {
    counters: HashMap<String, Arc<ProgressCounter>>,
}

impl ProgressMap {
    pub fn new<I, S>(totals: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        Self {
            counters: totals
                .into_iter()
                .map(|(name, total)| (name.into(), Arc::new(ProgressCounter::new(total))))
                .collect(),
        }
    }

    pub fn get(&self, table: &str) -> Option<Arc<ProgressCounter>> {
        self.counters.get(table).cloned()
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Sum of migrated rows over all tables.
    pub fn migrated_total(&self) -> i64 {
        self.counters.values().map(|c| c.migrated()).sum()
    }
}

/// One progress observation for one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub table: String,
    pub migrated: i64,
    pub total: i64,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Completion in percent, always within `[0, 100]`; zero for empty tables.
    pub fn percentage(&self) -> f64 {
        if self.total <= 0 {
            return 0.0;
        }
        (self.migrated as f64 / self.total as f64 * 100.0).clamp(0.0, 100.0)
    }

    /// Remaining time extrapolated from throughput so far.
    ///
    /// `None` until the first batch has been written.
    pub fn eta(&self) -> Option<Duration> {
        if self.migrated <= 0 {
            return None;
        }
        let remaining = (self.total - self.migrated).max(0) as f64;
        let per_row = self.elapsed.as_secs_f64() / self.migrated as f64;
        Some(Duration::from_secs_f64(per_row * remaining))
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "table {}: {}/{} rows migrated ({:.2}%)",
            self.table,
            self.migrated,
            self.total,
            self.percentage()
        )?;
        if let Some(eta) = self.eta() {
            write!(f, ", Estimated time left: {}", format_duration(eta))?;
        }
        Ok(())
    }
}

/// Compact `1h02m03s` style rendering; sub-second values show milliseconds.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs == 0 {
        return format!("{}ms", d.subsec_millis());
    }
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h{:02}m{:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m{:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}

/// Destination for progress reports.
pub trait ProgressSink: Send + Sync {
    fn report(&self, snapshot: &ProgressSnapshot);
}

/// Emits each report as an `info` event on the `progress` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn report(&self, snapshot: &ProgressSnapshot) {
        info!(
            target: "progress",
            table = %snapshot.table,
            migrated = snapshot.migrated,
            total = snapshot.total,
            "{}",
            snapshot
        );
    }
}

/// Keeps every report in memory; used by tests and `--output-json` callers.
#[derive(Debug, Default)]
pub struct MemorySink {
    reports: Mutex<Vec<ProgressSnapshot>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<ProgressSnapshot> {
        self.reports
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Reports for one table, in emission order.
    pub fn reports_for(&self, table: &str) -> Vec<ProgressSnapshot> {
        self.reports()
            .into_iter()
            .filter(|r| r.table == table)
            .collect()
    }
}

impl ProgressSink for MemorySink {
    fn report(&self, snapshot: &ProgressSnapshot) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(snapshot.clone());
        }
    }
}
