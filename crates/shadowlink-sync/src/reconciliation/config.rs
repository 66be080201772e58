//! Reconciliation configuration.

use serde::{Deserialize, Serialize};

use shadowlink_core::{ShadowlinkError, ShadowlinkResult};

/// Largest accepted page size.
pub const MAX_PAGE_SIZE: usize = 10_000;

/// What a live pass does when an action fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop on the first error and report the failing record.
    #[default]
    FailFast,
    /// Record the failure and keep going.
    Continue,
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "fail_fast" => Ok(Self::FailFast),
            "continue" => Ok(Self::Continue),
            _ => Err(format!(
                "Unknown failure policy: {s} (expected fail_fast or continue)"
            )),
        }
    }
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FailFast => write!(f, "fail_fast"),
            Self::Continue => write!(f, "continue"),
        }
    }
}

/// Configuration for the reconciliation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// Records fetched per repository page, and actions applied per chunk.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Behavior on action failure.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

fn default_page_size() -> usize {
    500
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl ReconciliationConfig {
    /// Override the page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Override the failure policy.
    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> ShadowlinkResult<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ShadowlinkError::configuration(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReconciliationConfig::default();
        assert_eq!(config.page_size, 500);
        assert_eq!(config.failure_policy, FailurePolicy::FailFast);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_page_size_bounds() {
        assert!(ReconciliationConfig::default().with_page_size(0).validate().is_err());
        assert!(ReconciliationConfig::default().with_page_size(1).validate().is_ok());
        assert!(ReconciliationConfig::default()
            .with_page_size(MAX_PAGE_SIZE + 1)
            .validate()
            .is_err());
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: ReconciliationConfig = serde_json::from_str(r#"{"page_size": 50}"#).unwrap();
        assert_eq!(config.page_size, 50);
        assert_eq!(config.failure_policy, FailurePolicy::FailFast);

        let config: ReconciliationConfig =
            serde_json::from_str(r#"{"failure_policy": "continue"}"#).unwrap();
        assert_eq!(config.page_size, 500);
        assert_eq!(config.failure_policy, FailurePolicy::Continue);
    }

    #[test]
    fn test_failure_policy_parse() {
        assert_eq!("fail-fast".parse(), Ok(FailurePolicy::FailFast));
        assert_eq!("CONTINUE".parse(), Ok(FailurePolicy::Continue));
        assert!("retry".parse::<FailurePolicy>().is_err());
    }
}
