//! Record repository contracts
//!
//! The storage engine behind source and mirror collections is an external
//! collaborator. shadowlink only consumes it through these traits, split by
//! capability the way connector capabilities are split.

use std::sync::Arc;

use async_trait::async_trait;

use shadowlink_core::{
    MirrorFields, MirrorId, MirrorRecord, NewMirror, NewSource, ShadowlinkResult, SourceFields,
    SourceId, SourceRecord,
};

use crate::association::AssociationStore;

/// CRUD contract for a source collection.
#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// Fetch a record by ID.
    async fn get(&self, id: SourceId) -> ShadowlinkResult<Option<SourceRecord>>;

    /// Find the record of `kind` with the given slug.
    async fn find_by_slug(&self, kind: &str, slug: &str) -> ShadowlinkResult<Option<SourceRecord>>;

    /// Create a record.
    ///
    /// Fails with `Validation` on malformed fields.
    async fn create(&self, record: NewSource) -> ShadowlinkResult<SourceRecord>;

    /// Replace the fields of a record.
    ///
    /// Fails with `NotFound` if the ID is absent.
    async fn update(&self, id: SourceId, fields: SourceFields) -> ShadowlinkResult<SourceRecord>;

    /// Delete a record.
    ///
    /// Fails with `NotFound` if the ID is absent.
    async fn delete(&self, id: SourceId) -> ShadowlinkResult<()>;

    /// One page (0-based) of published records of `kind`, in a stable order.
    async fn list_published(
        &self,
        kind: &str,
        page: usize,
        page_size: usize,
    ) -> ShadowlinkResult<Vec<SourceRecord>>;
}

/// CRUD contract for a mirror collection.
///
/// Mirror records have no status; `list_published` returns every record of
/// the kind.
#[async_trait]
pub trait MirrorRepository: Send + Sync {
    /// Fetch a record by ID.
    async fn get(&self, id: MirrorId) -> ShadowlinkResult<Option<MirrorRecord>>;

    /// Find the record of `kind` with the given slug.
    async fn find_by_slug(&self, kind: &str, slug: &str) -> ShadowlinkResult<Option<MirrorRecord>>;

    /// Create a record.
    async fn create(&self, record: NewMirror) -> ShadowlinkResult<MirrorRecord>;

    /// Replace the fields of a record.
    async fn update(&self, id: MirrorId, fields: MirrorFields) -> ShadowlinkResult<MirrorRecord>;

    /// Delete a record.
    async fn delete(&self, id: MirrorId) -> ShadowlinkResult<()>;

    /// One page (0-based) of records of `kind`, in a stable order.
    async fn list_published(
        &self,
        kind: &str,
        page: usize,
        page_size: usize,
    ) -> ShadowlinkResult<Vec<MirrorRecord>>;
}

/// Reference to a record on either side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordRef {
    /// A source record.
    Source(SourceId),
    /// A mirror record.
    Mirror(MirrorId),
}

impl std::fmt::Display for RecordRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordRef::Source(id) => write!(f, "source:{id}"),
            RecordRef::Mirror(id) => write!(f, "mirror:{id}"),
        }
    }
}

/// Scalar metadata attached to records.
///
/// Metadata writes must never raise trigger events.
#[async_trait]
pub trait RecordMetadata: Send + Sync {
    /// Read a metadata value.
    async fn get_meta(&self, record: RecordRef, key: &str) -> ShadowlinkResult<Option<String>>;

    /// Write a metadata value. Fails with `NotFound` if the record is absent.
    async fn set_meta(&self, record: RecordRef, key: &str, value: &str) -> ShadowlinkResult<()>;

    /// Remove a metadata value. Absent records and keys are not errors.
    async fn delete_meta(&self, record: RecordRef, key: &str) -> ShadowlinkResult<()>;
}

/// Which kinds the host platform knows about.
pub trait KindCatalog: Send + Sync {
    /// Whether `kind` is a declared source kind.
    fn is_source_kind(&self, kind: &str) -> bool;

    /// Whether `kind` is a declared mirror kind.
    fn is_mirror_kind(&self, kind: &str) -> bool;
}

/// The shared collaborators every relationship works against.
#[derive(Clone)]
pub struct SyncStores {
    /// Source collection.
    pub sources: Arc<dyn SourceRepository>,
    /// Mirror collection.
    pub mirrors: Arc<dyn MirrorRepository>,
    /// Association metadata.
    pub associations: Arc<dyn AssociationStore>,
}

impl SyncStores {
    /// Bundle the collaborators.
    pub fn new(
        sources: Arc<dyn SourceRepository>,
        mirrors: Arc<dyn MirrorRepository>,
        associations: Arc<dyn AssociationStore>,
    ) -> Self {
        Self {
            sources,
            mirrors,
            associations,
        }
    }
}
