//! # db-migrator
//!
//! Dependency-aware table replication between relational databases.
//!
//! Tables are copied from a source engine (SQL Server, PostgreSQL, MySQL) to
//! a target engine with:
//!
//! - **Foreign-key ordering**: tables run in waves, dependencies first
//! - **Concurrent waves**: independent tables copy in parallel
//! - **Paged copies** in bounded batches through dialect-specific queries
//! - **Live progress** per table with a time-left estimate
//! - **Catalog introspection** to rebuild the table list from the source
//!
//! Oracle sources are not supported: a `driver: godror` configuration is
//! rejected with a configuration error.
//!
//! ## Example
//!
//! ```rust,no_run
//! use db_migrator::{Config, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> db_migrator::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let result = orchestrator.run(&CancellationToken::new()).await?;
//!     println!("Migrated {} rows", result.rows_migrated);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod introspect;
pub mod orchestrator;
pub mod progress;
pub mod scheduler;
pub mod serializer;
pub mod transfer;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use config::{Config, DatabaseConfig};
pub use crate::core::{
    Batch, Dialect, PageRequest, SourceReader, SqlValue, TableDescriptor, TargetWriter,
};
pub use error::{MigrateError, Result, Stage};
pub use orchestrator::{
    HealthReport, MigrationResult, Orchestrator, RunStatus, ValidationReport,
};
pub use progress::{LogSink, ProgressSink, ProgressSnapshot};
pub use scheduler::{DependencyGraph, Scheduler, Wave};
pub use transfer::{TableMigrationTask, TableResult, TableStatus};
