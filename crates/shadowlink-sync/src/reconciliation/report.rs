//! Reconciliation report.
//!
//! What a pass found and what it did, in a shape the CLI can render as a
//! table or serialize as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shadowlink_core::Relationship;

use super::plan::{PlanItem, ReconciliationPlan};
use super::statistics::RunStatistics;
use super::types::{ActionType, ReconciliationMode, RunStatus};

/// Headline result of a pass.
///
/// Zero touched records is reported three different ways so callers can
/// tell a converged relationship from an empty dry run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "count", rename_all = "snake_case")]
pub enum ReconciliationOutcome {
    /// Live pass with nothing to repair.
    AlreadyInSync,
    /// Dry run with nothing to repair.
    NothingPlanned,
    /// Dry run; this many actions would be applied.
    Planned(u32),
    /// Live pass; this many records were touched.
    Applied(u32),
}

impl ReconciliationOutcome {
    /// Records touched (always zero for dry runs).
    #[must_use]
    pub fn touched(&self) -> u32 {
        match self {
            Self::Applied(n) => *n,
            _ => 0,
        }
    }
}

impl std::fmt::Display for ReconciliationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyInSync => write!(f, "already in sync"),
            Self::NothingPlanned => write!(f, "dry run: nothing to do"),
            Self::Planned(n) => write!(f, "dry run: {n} action(s) planned"),
            Self::Applied(n) => write!(f, "{n} record(s) touched"),
        }
    }
}

/// An action that failed during a live pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionFailure {
    /// Action that failed.
    pub action: ActionType,
    /// Record the action was about (`source:<id>` or `mirror:<id>`).
    pub record: String,
    /// Error class (`validation`, `repository`, ...).
    pub error_kind: String,
    /// Error message.
    pub message: String,
}

/// Complete reconciliation report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Pass ID.
    pub run_id: Uuid,
    /// Relationship reconciled.
    pub relationship: Relationship,
    /// Dry run or live.
    pub mode: ReconciliationMode,
    /// How the pass ended.
    pub status: RunStatus,
    /// Started at.
    pub started_at: DateTime<Utc>,
    /// Completed at.
    pub completed_at: DateTime<Utc>,
    /// Everything the scan planned, in apply order.
    #[serde(default)]
    pub items: Vec<PlanItem>,
    /// Counters.
    pub statistics: RunStatistics,
    /// Failures recorded under the `continue` policy, or the one that aborted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ActionFailure>,
    /// Headline result.
    pub outcome: ReconciliationOutcome,
}

impl ReconciliationReport {
    /// Assemble a report.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn build(
        run_id: Uuid,
        relationship: Relationship,
        mode: ReconciliationMode,
        status: RunStatus,
        started_at: DateTime<Utc>,
        plan: &ReconciliationPlan,
        statistics: RunStatistics,
        failures: Vec<ActionFailure>,
    ) -> Self {
        // A cut-short pass cannot claim the relationship is in sync.
        let nothing_found = plan.is_empty() && status != RunStatus::Cancelled;
        let outcome = match (mode, nothing_found) {
            (ReconciliationMode::DryRun, true) => ReconciliationOutcome::NothingPlanned,
            (ReconciliationMode::DryRun, false) => {
                ReconciliationOutcome::Planned(statistics.planned.total())
            }
            (ReconciliationMode::Live, true) => ReconciliationOutcome::AlreadyInSync,
            (ReconciliationMode::Live, false) => ReconciliationOutcome::Applied(statistics.touched()),
        };

        Self {
            run_id,
            relationship,
            mode,
            status,
            started_at,
            completed_at: Utc::now(),
            items: plan.iter().cloned().collect(),
            statistics,
            failures,
            outcome,
        }
    }

    /// Records touched.
    #[must_use]
    pub fn touched(&self) -> u32 {
        self.outcome.touched()
    }

    /// Planned items of one action.
    pub fn items_for(&self, action: ActionType) -> impl Iterator<Item = &PlanItem> {
        self.items.iter().filter(move |i| i.action == action)
    }
}
