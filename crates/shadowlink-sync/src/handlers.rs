//! Sync trigger handlers
//!
//! Three handlers keep one relationship in sync as records change:
//!
//! - source created/updated -> create, link or update its mirror
//! - source about to be deleted -> delete its mirror and clear the link
//! - mirror created outside shadowlink -> originate (or link) a source record
//!
//! Each invocation re-fetches the authoritative record, resolves to at most
//! one record mutation plus the matching association write, and never
//! retries. A failed mutation leaves the pair un-synced until the next event
//! or the next reconciliation pass.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use shadowlink_core::{
    MirrorId, MirrorRecord, NewMirror, NewSource, Relationship, ShadowlinkResult, SourceId,
};

use crate::dispatch::{
    internally, EventOrigin, HookDispatcher, HookPoint, TriggerEvent, TriggerHandler,
};
use crate::locks::{slug_key, source_key, KeyedLocks};
use crate::repository::{RecordRef, SyncStores};

/// Why a handler did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The record no longer exists.
    RecordMissing,
    /// The record belongs to another kind.
    KindMismatch,
    /// The source record is not published.
    NotPublished,
    /// The event was raised by shadowlink itself.
    InternalOrigin,
    /// The matching counterpart is already linked to another live record.
    LinkedElsewhere,
}

/// Result of a single handler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// A mirror record was created and linked.
    MirrorCreated(MirrorId),
    /// The linked mirror's name/slug were brought in line with the source.
    MirrorUpdated(MirrorId),
    /// The linked mirror was deleted and the link cleared.
    MirrorDeleted(MirrorId),
    /// A source record was originated from a mirror and linked.
    SourceCreated(SourceId),
    /// An existing pair was (re)linked without creating anything.
    Linked {
        /// Source side.
        source_id: SourceId,
        /// Mirror side.
        mirror_id: MirrorId,
    },
    /// A dangling link was removed; there was nothing left to delete.
    LinkCleared,
    /// Already in sync.
    Unchanged,
    /// Not applicable to this relationship.
    Skipped(SkipReason),
}

impl HandlerOutcome {
    /// Whether a record was created, updated or deleted.
    #[must_use]
    pub fn mutated_record(&self) -> bool {
        matches!(
            self,
            HandlerOutcome::MirrorCreated(_)
                | HandlerOutcome::MirrorUpdated(_)
                | HandlerOutcome::MirrorDeleted(_)
                | HandlerOutcome::SourceCreated(_)
        )
    }
}

/// Handler state for one relationship.
pub struct SyncHandlers {
    relationship: Relationship,
    stores: SyncStores,
    locks: Arc<KeyedLocks>,
}

impl SyncHandlers {
    /// Create handlers for a relationship.
    pub fn new(relationship: Relationship, stores: SyncStores, locks: Arc<KeyedLocks>) -> Self {
        Self {
            relationship,
            stores,
            locks,
        }
    }

    /// The relationship these handlers serve.
    #[must_use]
    pub fn relationship(&self) -> &Relationship {
        &self.relationship
    }

    /// React to a source record being created or updated.
    #[instrument(skip(self), fields(relationship = %self.relationship))]
    pub async fn on_source_upserted(&self, source_id: SourceId) -> ShadowlinkResult<HandlerOutcome> {
        let _guard = self.locks.lock(source_key(source_id)).await;
        let rel = &self.relationship;

        let Some(source) = self.stores.sources.get(source_id).await? else {
            debug!("Source record is gone");
            return Ok(HandlerOutcome::Skipped(SkipReason::RecordMissing));
        };
        if source.kind != rel.source_kind {
            return Ok(HandlerOutcome::Skipped(SkipReason::KindMismatch));
        }
        if !source.is_published() {
            debug!(status = %source.status, "Source is not published");
            return Ok(HandlerOutcome::Skipped(SkipReason::NotPublished));
        }

        if let Some(mirror_id) = self.stores.associations.get_mirror_id(source_id).await? {
            match self.stores.mirrors.get(mirror_id).await? {
                Some(mirror) if mirror.kind == rel.mirror_kind => {
                    // Re-entrancy guard: a mirror already in sync ends the chain.
                    if mirror.is_in_sync_with(&source) {
                        return Ok(HandlerOutcome::Unchanged);
                    }
                    self.stores
                        .mirrors
                        .update(mirror_id, source.mirror_fields())
                        .await?;
                    info!(mirror_id = %mirror_id, name = %source.title, slug = %source.slug, "Mirror updated");
                    return Ok(HandlerOutcome::MirrorUpdated(mirror_id));
                }
                _ => {
                    warn!(mirror_id = %mirror_id, "Source points at a missing mirror, dropping the link");
                    self.stores
                        .associations
                        .clear_link(RecordRef::Source(source_id))
                        .await?;
                }
            }
        }

        if let Some(existing) = self
            .stores
            .mirrors
            .find_by_slug(&rel.mirror_kind, &source.slug)
            .await?
        {
            if self.mirror_is_free_for(&existing, source_id).await? {
                self.stores
                    .associations
                    .set_link(source_id, existing.id)
                    .await?;
                if !existing.is_in_sync_with(&source) {
                    self.stores
                        .mirrors
                        .update(existing.id, source.mirror_fields())
                        .await?;
                }
                info!(mirror_id = %existing.id, "Existing mirror linked by slug");
                return Ok(HandlerOutcome::Linked {
                    source_id,
                    mirror_id: existing.id,
                });
            }
            warn!(mirror_id = %existing.id, slug = %source.slug, "Mirror with this slug belongs to another source");
            return Ok(HandlerOutcome::Skipped(SkipReason::LinkedElsewhere));
        }

        let mirror = internally(
            self.stores
                .mirrors
                .create(NewMirror::from_fields(&rel.mirror_kind, source.mirror_fields())),
        )
        .await?;
        self.stores
            .associations
            .set_link(source_id, mirror.id)
            .await?;

        info!(mirror_id = %mirror.id, slug = %mirror.slug, "Mirror created");
        Ok(HandlerOutcome::MirrorCreated(mirror.id))
    }

    /// React to a source record about to be deleted.
    #[instrument(skip(self), fields(relationship = %self.relationship))]
    pub async fn on_source_deleted(&self, source_id: SourceId) -> ShadowlinkResult<HandlerOutcome> {
        let _guard = self.locks.lock(source_key(source_id)).await;
        let rel = &self.relationship;

        if let Some(source) = self.stores.sources.get(source_id).await? {
            if source.kind != rel.source_kind {
                return Ok(HandlerOutcome::Skipped(SkipReason::KindMismatch));
            }
        }

        let Some(mirror_id) = self.stores.associations.get_mirror_id(source_id).await? else {
            debug!("Source has no mirror");
            return Ok(HandlerOutcome::Unchanged);
        };

        let deleted = match self.stores.mirrors.get(mirror_id).await? {
            Some(mirror) if mirror.kind != rel.mirror_kind => {
                return Ok(HandlerOutcome::Skipped(SkipReason::KindMismatch));
            }
            Some(_) => match self.stores.mirrors.delete(mirror_id).await {
                Ok(()) => true,
                Err(e) if e.is_not_found() => false,
                Err(e) => return Err(e),
            },
            None => false,
        };

        self.stores
            .associations
            .clear_link(RecordRef::Source(source_id))
            .await?;

        if deleted {
            info!(mirror_id = %mirror_id, "Mirror deleted with its source");
            Ok(HandlerOutcome::MirrorDeleted(mirror_id))
        } else {
            debug!(mirror_id = %mirror_id, "Mirror was already gone");
            Ok(HandlerOutcome::LinkCleared)
        }
    }

    /// React to a mirror record created outside the source-upsert path.
    #[instrument(skip(self), fields(relationship = %self.relationship))]
    pub async fn on_mirror_created(
        &self,
        mirror_id: MirrorId,
        origin: EventOrigin,
    ) -> ShadowlinkResult<HandlerOutcome> {
        if origin == EventOrigin::Internal {
            return Ok(HandlerOutcome::Skipped(SkipReason::InternalOrigin));
        }
        let rel = &self.relationship;

        let Some(mirror) = self.stores.mirrors.get(mirror_id).await? else {
            return Ok(HandlerOutcome::Skipped(SkipReason::RecordMissing));
        };
        if mirror.kind != rel.mirror_kind {
            return Ok(HandlerOutcome::Skipped(SkipReason::KindMismatch));
        }

        let _guard = self
            .locks
            .lock(slug_key(&rel.source_kind, &mirror.slug))
            .await;

        if let Some(source_id) = self.stores.associations.get_source_id(mirror_id).await? {
            if let Some(source) = self.stores.sources.get(source_id).await? {
                if source.kind == rel.source_kind {
                    return Ok(HandlerOutcome::Unchanged);
                }
                debug!(source_id = %source_id, kind = %source.kind, "Mirror belongs to another source kind");
                return Ok(HandlerOutcome::Skipped(SkipReason::LinkedElsewhere));
            }
        }

        // Guard by identity rather than by association: a host that cannot
        // flag origin delivers mirrors created by `on_source_upserted` here
        // before the link is written.
        match self
            .stores
            .sources
            .find_by_slug(&rel.source_kind, &mirror.slug)
            .await?
        {
            None => {
                let source = internally(
                    self.stores
                        .sources
                        .create(NewSource::from_fields(&rel.source_kind, mirror.source_fields())),
                )
                .await?;
                self.stores
                    .associations
                    .set_link(source.id, mirror_id)
                    .await?;
                info!(source_id = %source.id, slug = %source.slug, "Source originated from mirror");
                Ok(HandlerOutcome::SourceCreated(source.id))
            }
            Some(source) => {
                if let Some(linked) = self.stores.associations.get_mirror_id(source.id).await? {
                    if linked != mirror_id && self.mirror_is_live(linked).await? {
                        warn!(source_id = %source.id, linked_mirror = %linked, "Source already has a mirror");
                        return Ok(HandlerOutcome::Skipped(SkipReason::LinkedElsewhere));
                    }
                }
                self.stores
                    .associations
                    .set_link(source.id, mirror_id)
                    .await?;
                info!(source_id = %source.id, "Association repaired for existing source");
                Ok(HandlerOutcome::Linked {
                    source_id: source.id,
                    mirror_id,
                })
            }
        }
    }

    /// Attach the three handlers to a dispatcher.
    ///
    /// Returns how many were newly attached (0 when already wired).
    pub fn attach_to(self: &Arc<Self>, dispatcher: &dyn HookDispatcher) -> usize {
        let rel = &self.relationship;
        let attached = [
            dispatcher.attach(
                HookPoint::SourceUpserted,
                &rel.source_kind,
                Arc::new(SourceUpsertHandler(self.clone())),
            ),
            dispatcher.attach(
                HookPoint::SourceDeleted,
                &rel.source_kind,
                Arc::new(SourceDeleteHandler(self.clone())),
            ),
            dispatcher.attach(
                HookPoint::MirrorCreated,
                &rel.mirror_kind,
                Arc::new(MirrorCreateHandler(self.clone())),
            ),
        ];
        attached.iter().filter(|newly| **newly).count()
    }

    async fn mirror_is_free_for(
        &self,
        mirror: &MirrorRecord,
        source_id: SourceId,
    ) -> ShadowlinkResult<bool> {
        match self.stores.associations.get_source_id(mirror.id).await? {
            None => Ok(true),
            Some(linked) if linked == source_id => Ok(true),
            Some(linked) => Ok(!self.holds_mirror(linked).await?),
        }
    }

    /// A published source of this relationship, or any source of another
    /// kind, keeps its mirror.
    async fn holds_mirror(&self, source_id: SourceId) -> ShadowlinkResult<bool> {
        Ok(self
            .stores
            .sources
            .get(source_id)
            .await?
            .is_some_and(|s| s.kind != self.relationship.source_kind || s.is_published()))
    }

    async fn mirror_is_live(&self, mirror_id: MirrorId) -> ShadowlinkResult<bool> {
        Ok(self
            .stores
            .mirrors
            .get(mirror_id)
            .await?
            .is_some_and(|m| m.kind == self.relationship.mirror_kind))
    }

    fn handler_name(&self, hook: HookPoint) -> String {
        format!(
            "shadowlink:{}:{}:{}",
            self.relationship.source_kind, self.relationship.mirror_kind, hook
        )
    }
}

/// Dispatcher adapter for [`SyncHandlers::on_source_upserted`].
pub struct SourceUpsertHandler(pub Arc<SyncHandlers>);

#[async_trait]
impl TriggerHandler for SourceUpsertHandler {
    fn name(&self) -> String {
        self.0.handler_name(HookPoint::SourceUpserted)
    }

    async fn handle(&self, event: &TriggerEvent) -> ShadowlinkResult<HandlerOutcome> {
        self.0
            .on_source_upserted(SourceId::from_uuid(event.record_id))
            .await
    }
}

/// Dispatcher adapter for [`SyncHandlers::on_source_deleted`].
pub struct SourceDeleteHandler(pub Arc<SyncHandlers>);

#[async_trait]
impl TriggerHandler for SourceDeleteHandler {
    fn name(&self) -> String {
        self.0.handler_name(HookPoint::SourceDeleted)
    }

    async fn handle(&self, event: &TriggerEvent) -> ShadowlinkResult<HandlerOutcome> {
        self.0
            .on_source_deleted(SourceId::from_uuid(event.record_id))
            .await
    }
}

/// Dispatcher adapter for [`SyncHandlers::on_mirror_created`].
pub struct MirrorCreateHandler(pub Arc<SyncHandlers>);

#[async_trait]
impl TriggerHandler for MirrorCreateHandler {
    fn name(&self) -> String {
        self.0.handler_name(HookPoint::MirrorCreated)
    }

    async fn handle(&self, event: &TriggerEvent) -> ShadowlinkResult<HandlerOutcome> {
        self.0
            .on_mirror_created(MirrorId::from_uuid(event.record_id), event.origin)
            .await
    }
}
