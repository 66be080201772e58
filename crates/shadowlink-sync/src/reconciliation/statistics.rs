//! Run statistics tracking for reconciliation.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::types::ActionType;

/// Counts per action type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCounts {
    #[serde(default)]
    pub update: u32,
    #[serde(default)]
    pub create: u32,
    #[serde(default)]
    pub delete: u32,
    #[serde(default)]
    pub link: u32,
}

impl ActionCounts {
    /// Count for one action type.
    #[must_use]
    pub fn get(&self, action: ActionType) -> u32 {
        match action {
            ActionType::Update => self.update,
            ActionType::Create => self.create,
            ActionType::Delete => self.delete,
            ActionType::Link => self.link,
        }
    }

    /// Increment the count for one action type.
    pub fn increment(&mut self, action: ActionType) {
        match action {
            ActionType::Update => self.update += 1,
            ActionType::Create => self.create += 1,
            ActionType::Delete => self.delete += 1,
            ActionType::Link => self.link += 1,
        }
    }

    /// Sum over all action types.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.update + self.create + self.delete + self.link
    }
}

/// Statistics for a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Published source records read.
    #[serde(default)]
    pub sources_scanned: u32,
    /// Mirror records read.
    #[serde(default)]
    pub mirrors_scanned: u32,
    /// Actions found by the scan.
    #[serde(default)]
    pub planned: ActionCounts,
    /// Actions applied successfully.
    #[serde(default)]
    pub applied: ActionCounts,
    /// Actions whose record vanished before they ran.
    #[serde(default)]
    pub skipped: u32,
    /// Actions that failed.
    #[serde(default)]
    pub failed: u32,
    /// Wall time in milliseconds.
    #[serde(default)]
    pub duration_ms: u64,
}

impl RunStatistics {
    /// Create new empty statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records touched by the pass.
    #[must_use]
    pub fn touched(&self) -> u32 {
        self.applied.total()
    }

    /// Percentage of planned actions attempted so far.
    #[must_use]
    pub fn progress_percentage(&self) -> f64 {
        let planned = self.planned.total();
        if planned == 0 {
            return 100.0;
        }
        let attempted = self.applied.total() + self.skipped + self.failed;
        (f64::from(attempted) / f64::from(planned)) * 100.0
    }
}

/// Accumulates statistics while a pass runs.
pub struct StatisticsTracker {
    stats: RunStatistics,
    start_time: Instant,
}

impl StatisticsTracker {
    /// Start tracking now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stats: RunStatistics::new(),
            start_time: Instant::now(),
        }
    }

    pub fn add_sources_scanned(&mut self, count: usize) {
        self.stats.sources_scanned += u32::try_from(count).unwrap_or(u32::MAX);
    }

    pub fn add_mirrors_scanned(&mut self, count: usize) {
        self.stats.mirrors_scanned += u32::try_from(count).unwrap_or(u32::MAX);
    }

    /// Record a planned action.
    pub fn record_planned(&mut self, action: ActionType) {
        self.stats.planned.increment(action);
    }

    /// Record a successfully applied action.
    pub fn record_applied(&mut self, action: ActionType) {
        self.stats.applied.increment(action);
    }

    pub fn record_skipped(&mut self) {
        self.stats.skipped += 1;
    }

    pub fn record_failed(&mut self) {
        self.stats.failed += 1;
    }

    /// Elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.start_time.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Snapshot current statistics.
    #[must_use]
    pub fn snapshot(&self) -> RunStatistics {
        RunStatistics {
            duration_ms: self.elapsed_ms(),
            ..self.stats.clone()
        }
    }
}

impl Default for StatisticsTracker {
    fn default() -> Self {
        Self::new()
    }
}
