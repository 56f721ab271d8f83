//! Migration orchestrator: connects both sides and coordinates a run.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::core::{Dialect, PageRequest, SourceReader, TargetWriter};
use crate::drivers::{connect_source, connect_target, DialectImpl};
use crate::error::{MigrateError, Result};
use crate::introspect::recreate_tables;
use crate::progress::{LogSink, ProgressMap, ProgressReporter, ProgressSink};
use crate::scheduler::{DependencyGraph, Scheduler, Wave};
use crate::transfer::{TableResult, TableStatus, TransferContext};

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
    Cancelled,
}

/// Result of a migration run.
#[derive(Debug, Serialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: RunStatus,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Waves in dispatch order.
    pub waves: Vec<Wave>,

    /// Per-table outcome, in configured order.
    pub tables: Vec<TableResult>,

    /// Total rows written to the target.
    pub rows_migrated: i64,

    /// Average throughput (rows/second).
    pub rows_per_second: i64,

    /// Message of the error that stopped the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip)]
    failure: Option<MigrateError>,
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The error that stopped the run, if any.
    pub fn failure(&self) -> Option<&MigrateError> {
        self.failure.as_ref()
    }

    /// `Ok(self)` for a completed run, otherwise the stopping error.
    pub fn into_result(mut self) -> Result<Self> {
        match self.failure.take() {
            Some(e) => Err(e),
            None => Ok(self),
        }
    }

    /// Tables that did not complete.
    pub fn failed_tables(&self) -> Vec<&str> {
        self.tables
            .iter()
            .filter(|t| t.status == TableStatus::Failed)
            .map(|t| t.table.as_str())
            .collect()
    }
}

/// Row counts of one table on both sides.
#[derive(Debug, Clone, Serialize)]
pub struct TableValidation {
    pub table: String,
    pub source_rows: i64,
    pub target_rows: i64,
    pub matches: bool,
}

/// Row count comparison for every configured table.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub tables: Vec<TableValidation>,
}

impl ValidationReport {
    pub fn mismatches(&self) -> Vec<&TableValidation> {
        self.tables.iter().filter(|t| !t.matches).collect()
    }

    /// `Validation` error naming every mismatching table.
    pub fn ensure_consistent(&self) -> Result<()> {
        let bad = self.mismatches();
        if bad.is_empty() {
            return Ok(());
        }
        let detail: Vec<String> = bad
            .iter()
            .map(|t| format!("{} (source={}, target={})", t.table, t.source_rows, t.target_rows))
            .collect();
        Err(MigrateError::Validation(format!(
            "row count mismatch: {}",
            detail.join(", ")
        )))
    }
}

/// Connectivity of one side.
#[derive(Debug, Clone, Serialize)]
pub struct SideHealth {
    pub db_type: String,
    pub latency_ms: u64,
}

/// Connectivity of both sides.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub source: SideHealth,
    pub target: SideHealth,
}

/// Migration orchestrator.
pub struct Orchestrator {
    config: Config,
    source: Arc<dyn SourceReader>,
    target: Arc<dyn TargetWriter>,
    sink: Arc<dyn ProgressSink>,
}

impl Orchestrator {
    /// Connect to both databases.
    ///
    /// Pool sizes not set in the config are sized from the host.
    pub async fn new(config: Config) -> Result<Self> {
        let tuned = config.clone().with_auto_tuning();
        let source = connect_source(&tuned.source).await?;
        let target = connect_target(&tuned.target).await?;
        Ok(Self::with_components(config, source, target))
    }

    /// Build an orchestrator over already-open reader and writer.
    pub fn with_components(
        config: Config,
        source: Arc<dyn SourceReader>,
        target: Arc<dyn TargetWriter>,
    ) -> Self {
        Self {
            config,
            source,
            target,
            sink: Arc::new(LogSink),
        }
    }

    /// Send progress reports somewhere other than the log.
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Wave layout for a config, without touching any database.
    pub fn plan(config: &Config) -> Result<Vec<Wave>> {
        Ok(DependencyGraph::build(config.tables.clone())?.plan())
    }

    /// First page query of every table, as the source engine will receive it.
    pub fn page_queries(config: &Config) -> Result<Vec<(String, String)>> {
        let dialect = DialectImpl::from_db_type(&config.source.driver)?;
        Ok(config
            .tables
            .iter()
            .map(|t| {
                let req =
                    PageRequest::new(&config.source.schema, &t.name, &t.columns, config.batch_size);
                (t.name.clone(), dialect.build_page_query(&req))
            })
            .collect())
    }

    /// Run the migration.
    ///
    /// Errors before the first wave (dependency cycle, row-count probe) are
    /// returned directly. Errors during the waves end the run and are carried
    /// in the returned result.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        info!("Starting migration run: {}", run_id);
        info!("Config hash: {}", self.config.hash());

        let graph = DependencyGraph::build(self.config.tables.clone())?;
        info!(
            "{} tables in {} waves ({} -> {})",
            graph.tables().len(),
            graph.len(),
            self.source.db_type(),
            self.target.db_type()
        );

        let progress = self.probe_row_counts(&graph).await?;

        let ctx = TransferContext {
            source: Arc::clone(&self.source),
            target: Arc::clone(&self.target),
            source_schema: self.config.source.schema.clone(),
            target_schema: self.config.target.schema.clone(),
            batch_size: self.config.batch_size,
            reporter: ProgressReporter::new(
                Arc::clone(&self.sink),
                Duration::from_millis(self.config.progress_interval_ms),
            ),
        };

        let report = Scheduler::new(self.config.max_parallel_tables)
            .run(&graph, &progress, &ctx, cancel)
            .await;

        let completed_at = Utc::now();
        let duration = timer.elapsed().as_secs_f64();
        let rows_migrated = progress.migrated_total();
        let status = match &report.error {
            None => RunStatus::Completed,
            Some(MigrateError::Cancelled) => RunStatus::Cancelled,
            Some(_) => RunStatus::Failed,
        };

        match &report.error {
            None => info!(
                "Migration completed: {} rows in {:.1}s",
                rows_migrated, duration
            ),
            Some(e) => error!("Migration stopped after {} waves: {}", report.waves_run, e),
        }

        Ok(MigrationResult {
            run_id,
            status,
            started_at,
            completed_at,
            duration_seconds: duration,
            waves: graph.plan(),
            tables: report.tables,
            rows_migrated,
            rows_per_second: if duration > 0.0 {
                (rows_migrated as f64 / duration) as i64
            } else {
                0
            },
            error: report.error.as_ref().map(|e| e.to_string()),
            failure: report.error,
        })
    }

    /// One `COUNT(*)` per table against the source, fixing each table's total.
    async fn probe_row_counts(&self, graph: &DependencyGraph) -> Result<ProgressMap> {
        let schema = &self.config.source.schema;
        let counts = try_join_all(graph.tables().iter().map(|t| async move {
            let rows = self.source.row_count(schema, &t.name).await?;
            Ok::<_, MigrateError>((t.name.clone(), rows))
        }))
        .await?;
        Ok(ProgressMap::new(counts))
    }

    /// Compare row counts of every configured table on both sides.
    pub async fn validate(&self) -> Result<ValidationReport> {
        let source_schema = &self.config.source.schema;
        let target_schema = &self.config.target.schema;
        let mut tables = Vec::with_capacity(self.config.tables.len());

        for table in &self.config.tables {
            let source_rows = self.source.row_count(source_schema, &table.name).await?;
            let target_rows = self.target.row_count(target_schema, &table.name).await?;
            let matches = source_rows == target_rows;

            if matches {
                info!("{}: {} rows (match)", table.name, source_rows);
            } else {
                warn!(
                    "{}: source={} target={} (MISMATCH)",
                    table.name, source_rows, target_rows
                );
            }
            tables.push(TableValidation {
                table: table.name.clone(),
                source_rows,
                target_rows,
                matches,
            });
        }

        Ok(ValidationReport { tables })
    }

    /// Run a trivial query on each side.
    pub async fn health_check(&self) -> Result<HealthReport> {
        let started = Instant::now();
        self.source.health_check().await?;
        let source = SideHealth {
            db_type: self.source.db_type().to_string(),
            latency_ms: started.elapsed().as_millis() as u64,
        };

        let started = Instant::now();
        self.target.health_check().await?;
        let target = SideHealth {
            db_type: self.target.db_type().to_string(),
            latency_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            "Health check passed: source {} ({}ms), target {} ({}ms)",
            source.db_type, source.latency_ms, target.db_type, target.latency_ms
        );
        Ok(HealthReport { source, target })
    }

    /// The current config with `tables` rebuilt from the source catalog.
    pub async fn recreate_config(&self) -> Result<Config> {
        let tables = recreate_tables(self.source.as_ref(), &self.config.source.schema).await?;
        if tables.is_empty() {
            return Err(MigrateError::Config(format!(
                "no tables found in source schema '{}'",
                self.config.source.schema
            )));
        }
        let mut config = self.config.clone();
        config.tables = tables;
        config.validate()?;
        Ok(config)
    }

    /// Close both pools.
    pub async fn close(&self) {
        self.source.close().await;
        self.target.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::core::TableDescriptor;
    use crate::progress::MemorySink;
    use crate::testing::{rows, MemorySource, MemoryTarget};

    fn side(driver: &str, schema: &str) -> DatabaseConfig {
        DatabaseConfig {
            driver: driver.into(),
            dsn: "memory".into(),
            schema: schema.into(),
            ssl_mode: "disable".into(),
            max_connections: None,
        }
    }

    fn config(tables: Vec<TableDescriptor>) -> Config {
        Config {
            source: side("mssql", "dbo"),
            target: side("postgres", "public"),
            batch_size: 1000,
            max_parallel_tables: 0,
            progress_interval_ms: 1000,
            tables,
        }
    }

    fn ab_tables() -> Vec<TableDescriptor> {
        vec![
            TableDescriptor::new("a", ["id"], Vec::<String>::new()),
            TableDescriptor::new("b", ["id"], ["a"]),
        ]
    }

    fn ab_source() -> MemorySource {
        MemorySource::new()
            .with_table("a", rows(2500))
            .with_table("b", rows(10))
    }

    #[tokio::test]
    async fn test_run_migrates_every_table() {
        let target = Arc::new(MemoryTarget::new());
        let sink = Arc::new(MemorySink::new());
        let orch = Orchestrator::with_components(
            config(ab_tables()),
            Arc::new(ab_source()),
            target.clone(),
        )
        .with_sink(sink.clone());

        let result = orch.run(&CancellationToken::new()).await.unwrap();

        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.rows_migrated, 2510);
        assert_eq!(result.waves.len(), 2);
        assert_eq!(result.tables[0].pages, 3);
        assert_eq!(target.written("a"), 2500);
        assert_eq!(target.written("b"), 10);

        let json = result.to_json().unwrap();
        assert!(json.contains("\"status\": \"completed\""));
        assert!(!json.contains("\"error\""));
        assert!(result.into_result().is_ok());
    }

    #[tokio::test]
    async fn test_run_reports_failure_with_typed_error() {
        let orch = Orchestrator::with_components(
            config(ab_tables()),
            Arc::new(ab_source()),
            Arc::new(MemoryTarget::new().failing_insert("b")),
        )
        .with_sink(Arc::new(MemorySink::new()));

        let result = orch.run(&CancellationToken::new()).await.unwrap();

        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.failed_tables(), vec!["b"]);
        assert_eq!(result.failure().unwrap().exit_code(), 4);
        assert!(result.to_json().unwrap().contains("failed during insert"));
        assert!(result.into_result().is_err());
    }

    #[tokio::test]
    async fn test_cycle_fails_before_any_data_moves() {
        let tables = vec![
            TableDescriptor::new("a", ["id"], ["b"]),
            TableDescriptor::new("b", ["id"], ["a"]),
        ];
        let target = Arc::new(MemoryTarget::new());
        let orch = Orchestrator::with_components(
            config(tables),
            Arc::new(ab_source()),
            target.clone(),
        );

        let err = orch.run(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, MigrateError::DependencyCycle(_)));
        assert_eq!(target.written("a"), 0);
    }

    #[test]
    fn test_plan_without_connections() {
        let waves = Orchestrator::plan(&config(ab_tables())).unwrap();
        assert_eq!(waves.len(), 2);
        assert_eq!(waves[1].tables, vec!["b"]);
    }

    #[test]
    fn test_page_queries_use_source_dialect() {
        let queries = Orchestrator::page_queries(&config(ab_tables())).unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].0, "a");
        assert!(queries[0].1.contains("ROW_NUMBER()"));
        assert!(queries[0].1.contains("[dbo].[a]"));
    }

    #[tokio::test]
    async fn test_validate_flags_mismatches() {
        let orch = Orchestrator::with_components(
            config(ab_tables()),
            Arc::new(ab_source()),
            Arc::new(MemoryTarget::new().with_count("a", 2500).with_count("b", 7)),
        );

        let report = orch.validate().await.unwrap();
        assert_eq!(report.mismatches().len(), 1);
        let err = report.ensure_consistent().unwrap_err();
        assert_eq!(err.exit_code(), 6);
        assert!(err.to_string().contains("b (source=10, target=7)"));
    }

    #[tokio::test]
    async fn test_recreate_config_replaces_tables() {
        let source = MemorySource::new()
            .with_table("customers", rows(0))
            .with_table("orders", rows(0))
            .with_columns("customers", &["id"])
            .with_columns("orders", &["id", "customer_id"])
            .with_deps("orders", &["customers"]);
        let orch = Orchestrator::with_components(
            config(Vec::new()),
            Arc::new(source),
            Arc::new(MemoryTarget::new()),
        );

        let config = orch.recreate_config().await.unwrap();
        assert_eq!(config.tables.len(), 2);
        assert_eq!(config.tables[1].dependencies, vec!["customers"]);
        assert_eq!(config.batch_size, 1000);
    }

    #[tokio::test]
    async fn test_health_check() {
        let orch = Orchestrator::with_components(
            config(ab_tables()),
            Arc::new(MemorySource::new()),
            Arc::new(MemoryTarget::new()),
        );
        let report = orch.health_check().await.unwrap();
        assert_eq!(report.source.db_type, "memory");
    }
}
