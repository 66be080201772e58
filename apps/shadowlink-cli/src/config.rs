//! Environment configuration.
//!
//! Command-line flags override these values.

use std::path::PathBuf;

use shadowlink_sync::{FailurePolicy, ReconciliationConfig};

use crate::logging::LogFormat;

/// Default location of the snapshot file.
pub const DEFAULT_DATA_PATH: &str = "./shadowlink.json";

/// Settings read from `SHADOWLINK_*` variables.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Snapshot file holding kinds, records and metadata.
    pub data_path: PathBuf,

    /// Reconciliation page size. Default: 500.
    pub page_size: usize,

    /// What a live pass does after a failed action. Default: fail fast.
    pub failure_policy: FailurePolicy,

    /// Log line format. Default: human-readable text.
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        let reconciliation = ReconciliationConfig::default();
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            page_size: reconciliation.page_size,
            failure_policy: reconciliation.failure_policy,
            log_format: LogFormat::default(),
        }
    }
}

impl Settings {
    /// Load settings from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load settings from a custom variable reader.
    ///
    /// Tests supply variables this way without touching the process
    /// environment.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let defaults = Self::default();

        let data_path = reader("SHADOWLINK_DATA")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_path);

        let page_size = match reader("SHADOWLINK_PAGE_SIZE") {
            Ok(raw) => raw.trim().parse::<usize>().map_err(|e| {
                ConfigError::InvalidValue("SHADOWLINK_PAGE_SIZE".into(), e.to_string())
            })?,
            Err(_) => defaults.page_size,
        };

        let failure_policy = match reader("SHADOWLINK_FAILURE_POLICY") {
            Ok(raw) => raw
                .parse::<FailurePolicy>()
                .map_err(|e| ConfigError::InvalidValue("SHADOWLINK_FAILURE_POLICY".into(), e))?,
            Err(_) => defaults.failure_policy,
        };

        let log_format = match reader("SHADOWLINK_LOG_FORMAT") {
            Ok(raw) => raw
                .parse::<LogFormat>()
                .map_err(|e| ConfigError::InvalidValue("SHADOWLINK_LOG_FORMAT".into(), e))?,
            Err(_) => defaults.log_format,
        };

        let settings = Self {
            data_path,
            page_size,
            failure_policy,
            log_format,
        };
        settings
            .reconciliation()
            .validate()
            .map_err(|e| ConfigError::InvalidValue("SHADOWLINK_PAGE_SIZE".into(), e.to_string()))?;
        Ok(settings)
    }

    /// Engine configuration derived from these settings.
    #[must_use]
    pub fn reconciliation(&self) -> ReconciliationConfig {
        ReconciliationConfig::default()
            .with_page_size(self.page_size)
            .with_failure_policy(self.failure_policy)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}
