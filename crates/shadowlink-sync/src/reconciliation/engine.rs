//! Reconciliation engine orchestrator.
//!
//! A pass scans both collections page by page into a [`ReconciliationPlan`]
//! without mutating anything, then (live mode only) applies the plan.

use chrono::Utc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shadowlink_core::{
    MirrorId, MirrorRecord, NewMirror, Relationship, ShadowlinkError, ShadowlinkResult, SourceId,
    SourceRecord,
};

use super::config::{FailurePolicy, ReconciliationConfig};
use super::plan::{PlanItem, ReconciliationPlan};
use super::report::{ActionFailure, ReconciliationReport};
use super::statistics::StatisticsTracker;
use super::types::{ActionType, ReconciliationMode, RunStatus};
use crate::dispatch::internally;
use crate::repository::{RecordRef, SyncStores};

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconciliationError {
    /// Unknown kind or unusable configuration. Raised before any work.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A repository failed while the collections were being scanned.
    #[error("Scanning {collection} failed: {source}")]
    Scan {
        collection: &'static str,
        #[source]
        source: ShadowlinkError,
    },

    /// Planning was cancelled before the plan was complete.
    #[error("Reconciliation cancelled while planning")]
    Cancelled,

    /// A live pass stopped on a failed action.
    #[error("{action} of {record} failed: {source}")]
    Aborted {
        /// Action that failed.
        action: ActionType,
        /// Record the action was about.
        record: String,
        /// Underlying error.
        #[source]
        source: ShadowlinkError,
        /// What had been done before the failure.
        report: Box<ReconciliationReport>,
    },
}

impl ReconciliationError {
    /// The report of the partial pass, when the pass got that far.
    #[must_use]
    pub fn partial_report(&self) -> Option<&ReconciliationReport> {
        match self {
            Self::Aborted { report, .. } => Some(report),
            _ => None,
        }
    }

    /// The classified repository-level error behind this one, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&ShadowlinkError> {
        match self {
            Self::Scan { source, .. } | Self::Aborted { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type for reconciliation operations.
pub type ReconciliationResult<T> = Result<T, ReconciliationError>;

fn configuration_message(e: ShadowlinkError) -> String {
    match e {
        ShadowlinkError::Configuration { message } => message,
        other => other.to_string(),
    }
}

fn scan_error(collection: &'static str) -> impl Fn(ShadowlinkError) -> ReconciliationError {
    move |source| {
        if source.is_fatal() {
            ReconciliationError::Configuration(configuration_message(source))
        } else {
            ReconciliationError::Scan { collection, source }
        }
    }
}

fn incomplete_item(field: &str) -> ShadowlinkError {
    ShadowlinkError::validation(field, "plan item is missing this record reference")
}

/// Converges one relationship over its entire collections.
pub struct ReconciliationEngine {
    relationship: Relationship,
    stores: SyncStores,
    config: ReconciliationConfig,
}

impl ReconciliationEngine {
    /// Create an engine with the default configuration.
    #[must_use]
    pub fn new(relationship: Relationship, stores: SyncStores) -> Self {
        Self::with_config(relationship, stores, ReconciliationConfig::default())
    }

    /// Create with custom configuration.
    #[must_use]
    pub fn with_config(
        relationship: Relationship,
        stores: SyncStores,
        config: ReconciliationConfig,
    ) -> Self {
        Self {
            relationship,
            stores,
            config,
        }
    }

    #[must_use]
    pub fn relationship(&self) -> &Relationship {
        &self.relationship
    }

    #[must_use]
    pub fn config(&self) -> &ReconciliationConfig {
        &self.config
    }

    /// Plan and report without mutating anything.
    pub async fn dry_run(&self) -> ReconciliationResult<ReconciliationReport> {
        self.run(ReconciliationMode::DryRun, &CancellationToken::new())
            .await
    }

    /// Plan and apply.
    pub async fn reconcile(&self) -> ReconciliationResult<ReconciliationReport> {
        self.run(ReconciliationMode::Live, &CancellationToken::new())
            .await
    }

    /// Compute the plan only.
    pub async fn plan(&self, cancel: &CancellationToken) -> ReconciliationResult<ReconciliationPlan> {
        self.validate_config()?;
        let mut tracker = StatisticsTracker::new();
        match self.scan(cancel, &mut tracker).await? {
            (_, true) => Err(ReconciliationError::Cancelled),
            (plan, false) => Ok(plan),
        }
    }

    /// Run one pass.
    ///
    /// Cancellation is honoured between pages and between apply chunks; a
    /// cancelled pass returns a report with [`RunStatus::Cancelled`].
    #[instrument(skip(self, cancel), fields(relationship = %self.relationship))]
    pub async fn run(
        &self,
        mode: ReconciliationMode,
        cancel: &CancellationToken,
    ) -> ReconciliationResult<ReconciliationReport> {
        self.validate_config()?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut tracker = StatisticsTracker::new();

        info!(run_id = %run_id, mode = %mode, page_size = self.config.page_size, "Reconciliation started");

        let (plan, cancelled) = self.scan(cancel, &mut tracker).await?;
        let report = |status, tracker: &StatisticsTracker, failures| {
            ReconciliationReport::build(
                run_id,
                self.relationship.clone(),
                mode,
                status,
                started_at,
                &plan,
                tracker.snapshot(),
                failures,
            )
        };

        if cancelled {
            warn!(run_id = %run_id, "Reconciliation cancelled while planning");
            return Ok(report(RunStatus::Cancelled, &tracker, vec![]));
        }

        info!(
            run_id = %run_id,
            create = plan.to_create.len(),
            update = plan.to_update.len(),
            delete = plan.to_delete.len(),
            link = plan.to_link.len(),
            "Plan computed"
        );

        if mode.is_dry_run() || plan.is_empty() {
            let done = report(RunStatus::Completed, &tracker, vec![]);
            info!(run_id = %run_id, outcome = %done.outcome, "Reconciliation finished");
            return Ok(done);
        }

        let items: Vec<&PlanItem> = plan.iter().collect();
        let mut failures = Vec::new();

        for chunk in items.chunks(self.config.page_size) {
            if cancel.is_cancelled() {
                warn!(run_id = %run_id, "Reconciliation cancelled while applying");
                return Ok(report(RunStatus::Cancelled, &tracker, failures));
            }

            for item in chunk {
                match self.apply_item(item).await {
                    Ok(()) => {
                        debug!(action = %item.action, record = %item.record_label(), "Applied");
                        tracker.record_applied(item.action);
                    }
                    Err(e) if e.is_not_found() => {
                        debug!(action = %item.action, record = %item.record_label(), "Record vanished, skipping");
                        tracker.record_skipped();
                    }
                    Err(e) => {
                        tracker.record_failed();
                        warn!(
                            action = %item.action,
                            record = %item.record_label(),
                            error = %e,
                            "Reconciliation action failed"
                        );
                        failures.push(ActionFailure {
                            action: item.action,
                            record: item.record_label(),
                            error_kind: e.kind().to_string(),
                            message: e.to_string(),
                        });

                        if e.is_fatal() || self.config.failure_policy == FailurePolicy::FailFast {
                            return Err(ReconciliationError::Aborted {
                                action: item.action,
                                record: item.record_label(),
                                source: e,
                                report: Box::new(report(RunStatus::Failed, &tracker, failures)),
                            });
                        }
                    }
                }
            }
        }

        let done = report(RunStatus::Completed, &tracker, failures);
        info!(
            run_id = %run_id,
            outcome = %done.outcome,
            failed = done.statistics.failed,
            skipped = done.statistics.skipped,
            "Reconciliation finished"
        );
        Ok(done)
    }

    fn validate_config(&self) -> ReconciliationResult<()> {
        self.config
            .validate()
            .map_err(|e| ReconciliationError::Configuration(configuration_message(e)))
    }

    /// Page through both collections. Returns the plan and whether the scan
    /// was cut short by cancellation.
    async fn scan(
        &self,
        cancel: &CancellationToken,
        tracker: &mut StatisticsTracker,
    ) -> ReconciliationResult<(ReconciliationPlan, bool)> {
        let rel = &self.relationship;
        let page_size = self.config.page_size;
        let mut plan = ReconciliationPlan::new();

        let mut page = 0;
        loop {
            if cancel.is_cancelled() {
                return Ok((plan, true));
            }
            let sources = self
                .stores
                .sources
                .list_published(&rel.source_kind, page, page_size)
                .await
                .map_err(scan_error("sources"))?;
            tracker.add_sources_scanned(sources.len());
            debug!(page, count = sources.len(), "Scanned source page");

            for source in &sources {
                if source.kind != rel.source_kind || !source.is_published() {
                    continue;
                }
                self.classify_source(source, &mut plan)
                    .await
                    .map_err(scan_error("sources"))?;
            }
            if sources.len() < page_size {
                break;
            }
            page += 1;
        }

        let mut page = 0;
        loop {
            if cancel.is_cancelled() {
                return Ok((plan, true));
            }
            let mirrors = self
                .stores
                .mirrors
                .list_published(&rel.mirror_kind, page, page_size)
                .await
                .map_err(scan_error("mirrors"))?;
            tracker.add_mirrors_scanned(mirrors.len());
            debug!(page, count = mirrors.len(), "Scanned mirror page");

            for mirror in &mirrors {
                if mirror.kind != rel.mirror_kind {
                    continue;
                }
                self.classify_mirror(mirror, &mut plan)
                    .await
                    .map_err(scan_error("mirrors"))?;
            }
            if mirrors.len() < page_size {
                break;
            }
            page += 1;
        }

        for item in plan.iter() {
            tracker.record_planned(item.action);
        }
        Ok((plan, false))
    }

    /// Verdict for a published source: keep, update, link or create.
    async fn classify_source(
        &self,
        source: &SourceRecord,
        plan: &mut ReconciliationPlan,
    ) -> ShadowlinkResult<()> {
        let associations = &self.stores.associations;

        if let Some(mirror_id) = associations.get_mirror_id(source.id).await? {
            if let Some(mirror) = self.live_mirror(mirror_id).await? {
                let back = associations.get_source_id(mirror_id).await?;
                if back == Some(source.id) {
                    if mirror.is_in_sync_with(source) {
                        plan.keep(source.id, mirror_id);
                    } else {
                        plan.push(PlanItem::update(source.id, mirror_id, source.mirror_fields()));
                    }
                    return Ok(());
                }

                // When the mirror belongs to another live source, our link is stale.
                let taken = match back {
                    Some(other) => {
                        self.owns_mirror(other, mirror_id).await?
                            || self.is_foreign_source(other).await?
                    }
                    None => false,
                };
                if !taken {
                    plan.push(PlanItem::link(source.id, mirror_id, source.mirror_fields()));
                    return Ok(());
                }
            }
        }

        if let Some(mirror) = self
            .stores
            .mirrors
            .find_by_slug(&self.relationship.mirror_kind, &source.slug)
            .await?
        {
            if !plan.is_mirror_claimed(mirror.id) && self.mirror_is_free_for(&mirror, source.id).await? {
                plan.push(PlanItem::link(source.id, mirror.id, source.mirror_fields()));
                return Ok(());
            }
        }

        plan.push(PlanItem::create(source.id, source.mirror_fields()));
        Ok(())
    }

    /// Verdict for a mirror no source claimed: link or delete.
    async fn classify_mirror(
        &self,
        mirror: &MirrorRecord,
        plan: &mut ReconciliationPlan,
    ) -> ShadowlinkResult<()> {
        if plan.is_mirror_claimed(mirror.id) {
            return Ok(());
        }

        if let Some(back) = self.stores.associations.get_source_id(mirror.id).await? {
            if self.is_foreign_source(back).await? {
                debug!(mirror_id = %mirror.id, source_id = %back, "Mirror belongs to another source kind");
                return Ok(());
            }
            // Source published after the source scan passed its page.
            if !plan.is_source_claimed(back) && self.owns_mirror(back, mirror.id).await? {
                plan.keep(back, mirror.id);
                return Ok(());
            }
        }

        if let Some(source) = self
            .stores
            .sources
            .find_by_slug(&self.relationship.source_kind, &mirror.slug)
            .await?
        {
            if source.is_published() && !plan.is_source_claimed(source.id) {
                plan.push(PlanItem::link(source.id, mirror.id, source.mirror_fields()));
                return Ok(());
            }
        }

        plan.push(PlanItem::delete(
            mirror.id,
            mirror.name.clone(),
            mirror.slug.clone(),
        ));
        Ok(())
    }

    async fn live_mirror(&self, mirror_id: MirrorId) -> ShadowlinkResult<Option<MirrorRecord>> {
        Ok(self
            .stores
            .mirrors
            .get(mirror_id)
            .await?
            .filter(|m| m.kind == self.relationship.mirror_kind))
    }

    /// Whether `source_id` is a live, published source whose link points at
    /// `mirror_id`.
    async fn owns_mirror(&self, source_id: SourceId, mirror_id: MirrorId) -> ShadowlinkResult<bool> {
        let live = self
            .stores
            .sources
            .get(source_id)
            .await?
            .is_some_and(|s| s.kind == self.relationship.source_kind && s.is_published());
        if !live {
            return Ok(false);
        }
        Ok(self.stores.associations.get_mirror_id(source_id).await? == Some(mirror_id))
    }

    async fn mirror_is_free_for(
        &self,
        mirror: &MirrorRecord,
        source_id: SourceId,
    ) -> ShadowlinkResult<bool> {
        match self.stores.associations.get_source_id(mirror.id).await? {
            None => Ok(true),
            Some(back) if back == source_id => Ok(true),
            Some(back) => Ok(!self.owns_mirror(back, mirror.id).await?
                && !self.is_foreign_source(back).await?),
        }
    }

    /// Whether `source_id` exists under a kind other than this relationship's.
    async fn is_foreign_source(&self, source_id: SourceId) -> ShadowlinkResult<bool> {
        Ok(self
            .stores
            .sources
            .get(source_id)
            .await?
            .is_some_and(|s| s.kind != self.relationship.source_kind))
    }

    async fn apply_item(&self, item: &PlanItem) -> ShadowlinkResult<()> {
        internally(self.apply_action(item)).await
    }

    async fn apply_action(&self, item: &PlanItem) -> ShadowlinkResult<()> {
        let associations = &self.stores.associations;

        match item.action {
            ActionType::Update => {
                let mirror_id = item.mirror_id.ok_or_else(|| incomplete_item("mirror_id"))?;
                self.stores.mirrors.update(mirror_id, item.fields()).await?;
            }
            ActionType::Create => {
                let source_id = item.source_id.ok_or_else(|| incomplete_item("source_id"))?;
                let mirror = self
                    .stores
                    .mirrors
                    .create(NewMirror::from_fields(
                        &self.relationship.mirror_kind,
                        item.fields(),
                    ))
                    .await?;
                associations.set_link(source_id, mirror.id).await?;
            }
            ActionType::Delete => {
                let mirror_id = item.mirror_id.ok_or_else(|| incomplete_item("mirror_id"))?;
                // Clear first: the back-reference is unreadable once the mirror is gone.
                associations.clear_link(RecordRef::Mirror(mirror_id)).await?;
                self.stores.mirrors.delete(mirror_id).await?;
            }
            ActionType::Link => {
                let source_id = item.source_id.ok_or_else(|| incomplete_item("source_id"))?;
                let mirror_id = item.mirror_id.ok_or_else(|| incomplete_item("mirror_id"))?;
                let mirror = self
                    .stores
                    .mirrors
                    .get(mirror_id)
                    .await?
                    .ok_or_else(|| ShadowlinkError::not_found("MirrorRecord", mirror_id))?;
                associations.set_link(source_id, mirror_id).await?;
                if mirror.name != item.name || mirror.slug != item.slug {
                    self.stores.mirrors.update(mirror_id, item.fields()).await?;
                }
            }
        }
        Ok(())
    }
}
