//! Configuration type definitions with auto-tuning based on system resources.

use std::fmt;

use serde::{Deserialize, Serialize};
use sysinfo::System;
use tracing::info;

use crate::core::TableDescriptor;

/// System resource information for auto-tuning.
#[derive(Debug, Clone)]
pub struct SystemResources {
    /// Total RAM in GB.
    pub total_memory_gb: f64,
    /// Number of CPU cores.
    pub cpu_cores: usize,
}

impl SystemResources {
    /// Detect system resources.
    pub fn detect() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu();

        Self {
            total_memory_gb: sys.total_memory() as f64 / (1024.0 * 1024.0 * 1024.0),
            cpu_cores: sys.cpus().len().max(1),
        }
    }

    /// Log detected system resources.
    pub fn log(&self) {
        info!(
            "System resources: {:.1} GB RAM, {} CPU cores",
            self.total_memory_gb, self.cpu_cores
        );
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database rows are read from.
    pub source: DatabaseConfig,

    /// Database rows are written to.
    pub target: DatabaseConfig,

    /// Rows fetched and inserted per page.
    #[serde(default = "default_batch_size", alias = "batchSize")]
    pub batch_size: usize,

    /// Upper bound on tables running at once inside a wave (0 = no bound).
    #[serde(default, alias = "maxParallelTables")]
    pub max_parallel_tables: usize,

    /// Interval between progress reports in milliseconds.
    #[serde(default = "default_progress_interval_ms", alias = "progressIntervalMs")]
    pub progress_interval_ms: u64,

    /// Tables to migrate.
    #[serde(default)]
    pub tables: Vec<TableDescriptor>,
}

impl Config {
    /// Apply auto-tuned defaults based on system resources.
    /// Only fills in values that weren't explicitly set in the config file.
    pub fn with_auto_tuning(mut self) -> Self {
        let resources = SystemResources::detect();
        resources.log();
        self.source.apply_auto_tuning(&resources);
        self.target.apply_auto_tuning(&resources);
        info!(
            "Auto-tuned config: source_conns={}, target_conns={}",
            self.source.get_max_connections(),
            self.target.get_max_connections(),
        );
        self
    }
}

/// Connection settings for one side of the migration.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Driver tag: `mssql`, `postgres` or `mysql` (aliases accepted).
    pub driver: String,

    /// Driver-native connection string.
    ///
    /// SQL Server takes an ADO string (`server=tcp:host,1433;user=sa;...`),
    /// PostgreSQL a libpq key/value string or URL, MySQL a `mysql://` URL.
    pub dsn: String,

    /// Schema the configured tables live in.
    pub schema: String,

    /// TLS mode for PostgreSQL connections (default: "disable").
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,

    /// Maximum pooled connections. Auto-tuned from CPU cores if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<usize>,
}

impl DatabaseConfig {
    fn apply_auto_tuning(&mut self, resources: &SystemResources) {
        if self.max_connections.is_none() {
            let conns = (resources.cpu_cores * 2).clamp(4, 32);
            self.max_connections = Some(conns);
        }
    }

    pub fn get_max_connections(&self) -> usize {
        self.max_connections.unwrap_or(8)
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("driver", &self.driver)
            .field("dsn", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

// Default value functions for serde
fn default_batch_size() -> usize {
    1000
}

fn default_progress_interval_ms() -> u64 {
    1000
}

fn default_ssl_mode() -> String {
    "disable".to_string()
}
