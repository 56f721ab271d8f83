//! Configuration loading, validation and persistence.

mod types;
mod validation;

pub use types::*;

use crate::error::{MigrateError, Result};
use sha2::{Digest, Sha256};
use std::path::Path;

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| MigrateError::Config(format!("cannot read {}: {}", path.display(), e)))
}

impl Config {
    /// Load configuration from a YAML or JSON file (chosen by extension).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = read(path)?;
        if is_json(path) {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    /// Load a configuration whose table list may be empty or stale.
    ///
    /// Used before rebuilding `tables` from the source catalog.
    pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = read(path)?;
        let config: Config = if is_json(path) {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };
        validation::validate_settings(&config)?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration back to disk, YAML or pretty JSON by extension.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = if is_json(path) {
            serde_json::to_string_pretty(self)?
        } else {
            serde_yaml::to_string(self)?
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// SHA256 fingerprint of the configuration, logged at run start.
    pub fn hash(&self) -> String {
        let yaml = serde_yaml::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
