//! Configuration validation.

use std::collections::HashSet;

use super::{Config, DatabaseConfig};
use crate::drivers::DriverKind;
use crate::drivers::common::SslMode;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    validate_settings(config)?;

    if config.tables.is_empty() {
        return Err(MigrateError::Config(
            "tables must list at least one table".into(),
        ));
    }

    let mut names = HashSet::new();
    for table in &config.tables {
        if table.name.trim().is_empty() {
            return Err(MigrateError::Config("table name cannot be empty".into()));
        }
        if !names.insert(table.name.as_str()) {
            return Err(MigrateError::Config(format!(
                "table '{}' is listed more than once",
                table.name
            )));
        }
        if table.columns.is_empty() {
            return Err(MigrateError::Config(format!(
                "table '{}' has no columns",
                table.name
            )));
        }
        let mut columns = HashSet::new();
        for column in &table.columns {
            if !columns.insert(column.as_str()) {
                return Err(MigrateError::Config(format!(
                    "table '{}' lists column '{}' twice",
                    table.name, column
                )));
            }
        }
    }

    Ok(())
}

/// Connections and run settings only; the table list may still be empty.
pub fn validate_settings(config: &Config) -> Result<()> {
    validate_database("source", &config.source)?;
    validate_database("target", &config.target)?;

    if config.batch_size == 0 {
        return Err(MigrateError::Config("batch_size must be at least 1".into()));
    }
    if config.progress_interval_ms == 0 {
        return Err(MigrateError::Config(
            "progress_interval_ms must be at least 1".into(),
        ));
    }
    Ok(())
}

fn validate_database(side: &str, db: &DatabaseConfig) -> Result<()> {
    DriverKind::from_db_type(&db.driver)
        .map_err(|_| MigrateError::Config(format!("{side}.driver '{}' is not supported", db.driver)))?;
    if db.dsn.trim().is_empty() {
        return Err(MigrateError::Config(format!("{side}.dsn is required")));
    }
    if db.schema.trim().is_empty() {
        return Err(MigrateError::Config(format!("{side}.schema is required")));
    }
    SslMode::parse(&db.ssl_mode)?;
    if let Some(0) = db.max_connections {
        return Err(MigrateError::Config(format!(
            "{side}.max_connections must be at least 1"
        )));
    }
    Ok(())
}
