//! Upgrade Configuration
//!
//! Page and pack sizes for every step plus the progress log interval.
//! Resolution order: built-in defaults, then an optional JSON file, then
//! `RULEGRAPH_<FIELD>` environment variables (e.g. `RULEGRAPH_ALARM_PAGE_SIZE`).

use crate::services::bulk_updater::{DEFAULT_PAGE_SIZE, DEFAULT_REPORT_EVERY};
use crate::services::graph_rewriter::DEFAULT_PACK_SIZE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

const ENV_PREFIX: &str = "RULEGRAPH_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value '{value}' for {var}")]
    InvalidEnv { var: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeConfig {
    pub tenant_page_size: usize,
    pub entity_view_page_size: usize,
    /// Alarms are light; they are paged ten times wider than other entities
    pub alarm_page_size: usize,
    pub device_profile_page_size: usize,
    pub nested_rule_node_pack_size: usize,
    /// Log a progress line every N processed entities (0 disables)
    pub report_every: u64,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            tenant_page_size: DEFAULT_PAGE_SIZE,
            entity_view_page_size: DEFAULT_PAGE_SIZE,
            alarm_page_size: 1000,
            device_profile_page_size: DEFAULT_PAGE_SIZE,
            nested_rule_node_pack_size: DEFAULT_PACK_SIZE,
            report_every: DEFAULT_REPORT_EVERY,
        }
    }
}

impl UpgradeConfig {
    /// Defaults overlaid with the fields present in a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Apply `RULEGRAPH_*` overrides from the process environment
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse = |field: &str| -> Result<Option<u64>, ConfigError> {
            let var = format!("{ENV_PREFIX}{}", field.to_ascii_uppercase());
            match lookup(&var) {
                None => Ok(None),
                Some(value) => value
                    .trim()
                    .parse::<u64>()
                    .map(Some)
                    .map_err(|_| ConfigError::InvalidEnv { var, value }),
            }
        };

        let sizes = [
            ("tenant_page_size", &mut self.tenant_page_size),
            ("entity_view_page_size", &mut self.entity_view_page_size),
            ("alarm_page_size", &mut self.alarm_page_size),
            ("device_profile_page_size", &mut self.device_profile_page_size),
            ("nested_rule_node_pack_size", &mut self.nested_rule_node_pack_size),
        ];
        for (field, slot) in sizes {
            if let Some(value) = parse(field)? {
                *slot = value as usize;
            }
        }
        if let Some(value) = parse("report_every")? {
            self.report_every = value;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sizes = [
            ("tenant_page_size", self.tenant_page_size),
            ("entity_view_page_size", self.entity_view_page_size),
            ("alarm_page_size", self.alarm_page_size),
            ("device_profile_page_size", self.device_profile_page_size),
            ("nested_rule_node_pack_size", self.nested_rule_node_pack_size),
        ];
        for (field, value) in sizes {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{field} must be greater than 0")));
            }
        }
        Ok(())
    }
}
