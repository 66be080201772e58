//! Shared reconciliation enums.

use serde::{Deserialize, Serialize};

/// Whether a pass applies its plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationMode {
    /// Plan and report only.
    DryRun,
    /// Plan, then apply.
    #[default]
    Live,
}

impl ReconciliationMode {
    /// Build from a dry-run flag.
    #[must_use]
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run {
            Self::DryRun
        } else {
            Self::Live
        }
    }

    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        matches!(self, Self::DryRun)
    }
}

impl std::fmt::Display for ReconciliationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DryRun => write!(f, "dry_run"),
            Self::Live => write!(f, "live"),
        }
    }
}

/// Terminal status of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every planned action was attempted.
    Completed,
    /// Stopped on an error.
    Failed,
    /// Stopped by the cancellation token.
    Cancelled,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A repair the engine can plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Bring a linked mirror's name/slug in line with its source.
    Update,
    /// Create a mirror for an unlinked source.
    Create,
    /// Delete an orphaned mirror.
    Delete,
    /// Write missing association metadata.
    Link,
}

impl ActionType {
    /// Apply order of a live pass.
    pub const APPLY_ORDER: [ActionType; 4] = [
        ActionType::Update,
        ActionType::Create,
        ActionType::Delete,
        ActionType::Link,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Link => "link",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
