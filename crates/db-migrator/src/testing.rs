//! In-memory reader and writer used by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::{Batch, PageRequest, Row, SourceReader, SqlValue, TargetWriter};
use crate::error::{MigrateError, Result, Stage};

/// `n` single-column rows holding `0..n`.
pub fn rows(n: usize) -> Vec<Row> {
    (0..n).map(|i| vec![SqlValue::I64(i as i64)]).collect()
}

/// Source backed by a map of table name to rows.
#[derive(Default)]
pub struct MemorySource {
    tables: HashMap<String, Vec<Row>>,
    columns: HashMap<String, Vec<String>>,
    deps: HashMap<String, Vec<String>>,
    fail_fetch: HashSet<String>,
    fetch_delay: Option<Duration>,
    pub pages: Mutex<Vec<(String, u64, usize)>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: &str, rows: Vec<Row>) -> Self {
        self.tables.insert(name.to_string(), rows);
        self
    }

    pub fn with_columns(mut self, name: &str, cols: &[&str]) -> Self {
        self.columns
            .insert(name.to_string(), cols.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn with_deps(mut self, name: &str, deps: &[&str]) -> Self {
        self.deps
            .insert(name.to_string(), deps.iter().map(|d| d.to_string()).collect());
        self
    }

    pub fn failing_fetch(mut self, name: &str) -> Self {
        self.fail_fetch.insert(name.to_string());
        self
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    /// `(table, offset, rows returned)` for every page served.
    pub fn pages_for(&self, table: &str) -> Vec<(u64, usize)> {
        self.pages
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _, _)| t == table)
            .map(|(_, o, n)| (*o, *n))
            .collect()
    }
}

#[async_trait]
impl SourceReader for MemorySource {
    async fn fetch_page(&self, req: &PageRequest) -> Result<Batch> {
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_fetch.contains(&req.table) {
            return Err(MigrateError::query(&req.table, Stage::Fetch, "connection reset"));
        }
        let all = self.tables.get(&req.table).cloned().unwrap_or_default();
        let page: Vec<Row> = all
            .into_iter()
            .skip(req.offset as usize)
            .take(req.limit)
            .collect();
        self.pages
            .lock()
            .unwrap()
            .push((req.table.clone(), req.offset, page.len()));
        Ok(Batch::new(page, req.offset))
    }

    async fn row_count(&self, _schema: &str, table: &str) -> Result<i64> {
        Ok(self.tables.get(table).map(|r| r.len() as i64).unwrap_or(0))
    }

    async fn list_tables(&self, _schema: &str) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn list_columns(&self, _schema: &str, table: &str) -> Result<Vec<String>> {
        Ok(self.columns.get(table).cloned().unwrap_or_default())
    }

    async fn list_dependencies(&self, _schema: &str, table: &str) -> Result<Vec<String>> {
        Ok(self.deps.get(table).cloned().unwrap_or_default())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(&self) {}
}

/// Target that counts written rows per table.
#[derive(Default)]
pub struct MemoryTarget {
    fail_insert: HashSet<String>,
    fail_after: HashMap<String, usize>,
    counts: Mutex<HashMap<String, i64>>,
    pub batches: Mutex<Vec<(String, usize)>>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_insert(mut self, name: &str) -> Self {
        self.fail_insert.insert(name.to_string());
        self
    }

    /// Accept `ok_batches` batches for `name`, then fail every later one.
    pub fn failing_insert_after(mut self, name: &str, ok_batches: usize) -> Self {
        self.fail_after.insert(name.to_string(), ok_batches);
        self
    }

    pub fn with_count(self, name: &str, rows: i64) -> Self {
        self.counts.lock().unwrap().insert(name.to_string(), rows);
        self
    }

    pub fn written(&self, table: &str) -> i64 {
        self.counts.lock().unwrap().get(table).copied().unwrap_or(0)
    }

    /// Tables in the order their first batch arrived.
    pub fn first_write_order(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for (t, _) in self.batches.lock().unwrap().iter() {
            if !seen.contains(t) {
                seen.push(t.clone());
            }
        }
        seen
    }
}

#[async_trait]
impl TargetWriter for MemoryTarget {
    async fn write_batch(
        &self,
        _schema: &str,
        table: &str,
        _cols: &[String],
        batch: &Batch,
    ) -> Result<u64> {
        if self.fail_insert.contains(table) {
            return Err(MigrateError::query(table, Stage::Insert, "duplicate key"));
        }
        let mut batches = self.batches.lock().unwrap();
        if let Some(&ok) = self.fail_after.get(table) {
            if batches.iter().filter(|(t, _)| t == table).count() >= ok {
                return Err(MigrateError::query(table, Stage::Insert, "disk full"));
            }
        }
        batches.push((table.to_string(), batch.len()));
        drop(batches);
        *self
            .counts
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default() += batch.len() as i64;
        Ok(batch.len() as u64)
    }

    async fn row_count(&self, _schema: &str, table: &str) -> Result<i64> {
        Ok(self.written(table))
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(&self) {}
}
