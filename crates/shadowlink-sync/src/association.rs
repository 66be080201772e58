//! Association Store
//!
//! Maps a source record to its mirror record and back. The link is not an
//! entity of its own: it is stored as one metadata value on each side
//! (`shadow_mirror_id` on the source, `shadow_source_id` on the mirror) so
//! either direction resolves with a single lookup.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use shadowlink_core::{
    MirrorId, ShadowlinkResult, SourceId, MIRROR_ID_META_KEY, SOURCE_ID_META_KEY,
};

use crate::repository::{RecordMetadata, RecordRef};

/// Bidirectional source <-> mirror lookup.
///
/// Implementations only touch metadata and never raise trigger events.
#[async_trait]
pub trait AssociationStore: Send + Sync {
    /// The mirror linked to a source record.
    async fn get_mirror_id(&self, source_id: SourceId) -> ShadowlinkResult<Option<MirrorId>>;

    /// The source linked to a mirror record.
    async fn get_source_id(&self, mirror_id: MirrorId) -> ShadowlinkResult<Option<SourceId>>;

    /// Link two records in both directions.
    ///
    /// Idempotent. Any previous link held by either record is dropped first.
    async fn set_link(&self, source_id: SourceId, mirror_id: MirrorId) -> ShadowlinkResult<()>;

    /// Remove the link held by the given record.
    ///
    /// The counterpart's back-reference is removed too when it still points
    /// at this record. Missing links are not errors.
    async fn clear_link(&self, end: RecordRef) -> ShadowlinkResult<()>;
}

/// [`AssociationStore`] persisted as record metadata.
pub struct MetaAssociationStore<M: RecordMetadata + ?Sized> {
    meta: Arc<M>,
}

impl<M: RecordMetadata + ?Sized> MetaAssociationStore<M> {
    /// Create a store backed by the given metadata layer.
    pub fn new(meta: Arc<M>) -> Self {
        Self { meta }
    }
}

#[async_trait]
impl<M: RecordMetadata + ?Sized> AssociationStore for MetaAssociationStore<M> {
    async fn get_mirror_id(&self, source_id: SourceId) -> ShadowlinkResult<Option<MirrorId>> {
        let value = self
            .meta
            .get_meta(RecordRef::Source(source_id), MIRROR_ID_META_KEY)
            .await?;
        Ok(value.and_then(|v| match v.parse() {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(source_id = %source_id, value = %v, error = %e, "Ignoring unparsable mirror link");
                None
            }
        }))
    }

    async fn get_source_id(&self, mirror_id: MirrorId) -> ShadowlinkResult<Option<SourceId>> {
        let value = self
            .meta
            .get_meta(RecordRef::Mirror(mirror_id), SOURCE_ID_META_KEY)
            .await?;
        Ok(value.and_then(|v| match v.parse() {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(mirror_id = %mirror_id, value = %v, error = %e, "Ignoring unparsable source link");
                None
            }
        }))
    }

    async fn set_link(&self, source_id: SourceId, mirror_id: MirrorId) -> ShadowlinkResult<()> {
        if let Some(previous) = self.get_mirror_id(source_id).await? {
            if previous != mirror_id && self.get_source_id(previous).await? == Some(source_id) {
                self.meta
                    .delete_meta(RecordRef::Mirror(previous), SOURCE_ID_META_KEY)
                    .await?;
            }
        }
        if let Some(previous) = self.get_source_id(mirror_id).await? {
            if previous != source_id && self.get_mirror_id(previous).await? == Some(mirror_id) {
                self.meta
                    .delete_meta(RecordRef::Source(previous), MIRROR_ID_META_KEY)
                    .await?;
            }
        }

        self.meta
            .set_meta(
                RecordRef::Source(source_id),
                MIRROR_ID_META_KEY,
                &mirror_id.to_string(),
            )
            .await?;
        self.meta
            .set_meta(
                RecordRef::Mirror(mirror_id),
                SOURCE_ID_META_KEY,
                &source_id.to_string(),
            )
            .await?;

        debug!(source_id = %source_id, mirror_id = %mirror_id, "Link written");
        Ok(())
    }

    async fn clear_link(&self, end: RecordRef) -> ShadowlinkResult<()> {
        match end {
            RecordRef::Source(source_id) => {
                let counterpart = self.get_mirror_id(source_id).await?;
                self.meta.delete_meta(end, MIRROR_ID_META_KEY).await?;
                if let Some(mirror_id) = counterpart {
                    if self.get_source_id(mirror_id).await? == Some(source_id) {
                        self.meta
                            .delete_meta(RecordRef::Mirror(mirror_id), SOURCE_ID_META_KEY)
                            .await?;
                    }
                }
            }
            RecordRef::Mirror(mirror_id) => {
                let counterpart = self.get_source_id(mirror_id).await?;
                self.meta.delete_meta(end, SOURCE_ID_META_KEY).await?;
                if let Some(source_id) = counterpart {
                    if self.get_mirror_id(source_id).await? == Some(mirror_id) {
                        self.meta
                            .delete_meta(RecordRef::Source(source_id), MIRROR_ID_META_KEY)
                            .await?;
                    }
                }
            }
        }

        debug!(record = %end, "Link cleared");
        Ok(())
    }
}
