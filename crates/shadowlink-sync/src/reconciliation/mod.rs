//! # Reconciliation Engine
//!
//! Batch convergence of one relationship over its entire collections, using
//! only the two repositories and the association store. Safe to run after
//! bulk imports or outages because it does not rely on per-change events.
//!
//! ## Overview
//!
//! - Source scan: published sources with no mirror (`to_create`), linked
//!   mirrors whose name/slug drifted (`to_update`), pairs matched by slug but
//!   missing association metadata (`to_link`)
//! - Mirror scan: mirrors with no valid source (`to_delete`), or matched to a
//!   source by slug (`to_link`)
//! - Dry run: report the plan and apply nothing
//! - Live: apply updates, creations, deletions, then links
//!
//! Every action is individually idempotent, so a pass that stops part-way
//! (error or cancellation) is completed by the next one.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  ReconciliationEngine                    │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌────────────┐    ┌────────────────┐    ┌────────────┐  │
//! │  │ scan pages │───►│ Reconciliation │───►│   apply    │  │
//! │  │ (read-only)│    │      Plan      │    │ (live only)│  │
//! │  └────────────┘    └────────────────┘    └────────────┘  │
//! │         │                  │                   │         │
//! │         ▼                  ▼                   ▼         │
//! │  ┌──────────────────────────────────────────────────┐    │
//! │  │   StatisticsTracker ──► ReconciliationReport     │    │
//! │  └──────────────────────────────────────────────────┘    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use shadowlink_sync::reconciliation::{ReconciliationEngine, ReconciliationMode};
//! use tokio_util::sync::CancellationToken;
//!
//! let engine = registry.engine(&relationship)?;
//! let cancel = CancellationToken::new();
//!
//! let report = engine.run(ReconciliationMode::DryRun, &cancel).await?;
//! println!("{}", report.outcome);
//! ```

pub mod config;
pub mod engine;
pub mod plan;
pub mod report;
pub mod statistics;
pub mod types;

pub use config::{FailurePolicy, ReconciliationConfig, MAX_PAGE_SIZE};
pub use engine::{ReconciliationEngine, ReconciliationError, ReconciliationResult};
pub use plan::{PlanItem, ReconciliationPlan};
pub use report::{ActionFailure, ReconciliationOutcome, ReconciliationReport};
pub use statistics::{ActionCounts, RunStatistics, StatisticsTracker};
pub use types::{ActionType, ReconciliationMode, RunStatus};
