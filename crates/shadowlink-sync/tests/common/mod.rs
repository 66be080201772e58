//! Shared fixtures for the sync integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use shadowlink_core::{
    MirrorFields, MirrorId, MirrorRecord, NewMirror, NewSource, RecordStatus, Relationship,
    ShadowlinkError, ShadowlinkResult, SourceFields, SourceId, SourceRecord, MIRROR_ID_META_KEY,
    SOURCE_ID_META_KEY,
};
use shadowlink_sync::{
    AssociationStore, InProcessDispatcher, MemoryStore, MetaAssociationStore, MirrorRepository,
    RecordMetadata, RecordRef, RelationshipRegistry, SourceRepository, SyncHandlers, SyncStores,
};

pub const SOURCE_KIND: &str = "staff";
pub const MIRROR_KIND: &str = "offices";

/// A store, a dispatcher and a registry with `staff -> offices` registered.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub dispatcher: Arc<InProcessDispatcher>,
    pub associations: Arc<dyn AssociationStore>,
    pub stores: SyncStores,
    pub registry: RelationshipRegistry,
    pub relationship: Relationship,
}

impl Harness {
    /// Store raises lifecycle hooks, like a host platform.
    pub fn wired() -> Self {
        let harness = Self::unwired();
        harness.store.attach_dispatcher(&harness.dispatcher);
        harness
    }

    /// Store mutations bypass the handlers (bulk import, outage, out-of-band edits).
    pub fn unwired() -> Self {
        Self::with_mirrors(|store| store.clone() as Arc<dyn MirrorRepository>)
    }

    /// Like [`Self::unwired`] but the sync engine sees a replacement mirror
    /// repository built around the store.
    pub fn with_mirrors(
        mirrors: impl FnOnce(&Arc<MemoryStore>) -> Arc<dyn MirrorRepository>,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        store.declare_source_kind(SOURCE_KIND).unwrap();
        store.declare_mirror_kind(MIRROR_KIND).unwrap();

        let dispatcher = Arc::new(InProcessDispatcher::new());
        let associations: Arc<dyn AssociationStore> =
            Arc::new(MetaAssociationStore::new(store.clone()));
        let stores = SyncStores::new(
            store.clone(),
            mirrors(&store),
            associations.clone(),
        );
        let registry = RelationshipRegistry::new(stores.clone(), store.clone(), dispatcher.clone());
        let relationship = registry.register(SOURCE_KIND, MIRROR_KIND).unwrap();

        Self {
            store,
            dispatcher,
            associations,
            stores,
            registry,
            relationship,
        }
    }

    pub fn handlers(&self) -> Arc<SyncHandlers> {
        self.registry.get(SOURCE_KIND, MIRROR_KIND).unwrap()
    }

    pub async fn create_source(&self, title: &str, slug: &str) -> SourceRecord {
        self.create_source_with_status(title, slug, RecordStatus::Published)
            .await
    }

    pub async fn create_source_with_status(
        &self,
        title: &str,
        slug: &str,
        status: RecordStatus,
    ) -> SourceRecord {
        SourceRepository::create(
            self.store.as_ref(),
            NewSource {
                kind: SOURCE_KIND.to_string(),
                title: title.to_string(),
                slug: slug.to_string(),
                status,
            },
        )
        .await
        .unwrap()
    }

    pub async fn update_source(&self, source: &SourceRecord, title: &str, slug: &str) -> SourceRecord {
        SourceRepository::update(
            self.store.as_ref(),
            source.id,
            SourceFields {
                title: title.to_string(),
                slug: slug.to_string(),
                status: source.status,
            },
        )
        .await
        .unwrap()
    }

    pub async fn create_mirror(&self, name: &str, slug: &str) -> MirrorRecord {
        MirrorRepository::create(
            self.store.as_ref(),
            NewMirror {
                kind: MIRROR_KIND.to_string(),
                name: name.to_string(),
                slug: slug.to_string(),
            },
        )
        .await
        .unwrap()
    }

    pub fn sources(&self) -> Vec<SourceRecord> {
        self.store.sources_of(SOURCE_KIND)
    }

    pub fn mirrors(&self) -> Vec<MirrorRecord> {
        self.store.mirrors_of(MIRROR_KIND)
    }

    pub async fn source(&self, id: SourceId) -> Option<SourceRecord> {
        SourceRepository::get(self.store.as_ref(), id).await.unwrap()
    }

    pub async fn mirror(&self, id: MirrorId) -> Option<MirrorRecord> {
        MirrorRepository::get(self.store.as_ref(), id).await.unwrap()
    }

    /// The "in sync" predicate over every published source.
    pub async fn assert_in_sync(&self) {
        for source in self.sources().into_iter().filter(SourceRecord::is_published) {
            let mirror_id = self
                .associations
                .get_mirror_id(source.id)
                .await
                .unwrap()
                .unwrap_or_else(|| panic!("{} has no mirror", source.slug));
            let mirror = self.mirror(mirror_id).await.expect("linked mirror exists");
            assert!(mirror.is_in_sync_with(&source), "{} drifted", source.slug);
            assert_eq!(
                self.associations.get_source_id(mirror_id).await.unwrap(),
                Some(source.id)
            );
        }
    }

    /// Whether any record's metadata still references `id`.
    pub async fn meta_references(&self, id: &str) -> bool {
        for source in self.store.sources_of(SOURCE_KIND) {
            let value = self
                .store
                .get_meta(RecordRef::Source(source.id), MIRROR_ID_META_KEY)
                .await
                .unwrap();
            if value.as_deref() == Some(id) {
                return true;
            }
        }
        for mirror in self.store.mirrors_of(MIRROR_KIND) {
            let value = self
                .store
                .get_meta(RecordRef::Mirror(mirror.id), SOURCE_ID_META_KEY)
                .await
                .unwrap();
            if value.as_deref() == Some(id) {
                return true;
            }
        }
        false
    }
}

/// Mirror repository that delegates to a [`MemoryStore`] and can be told to
/// fail creates, to lose a mirror right before updating it, or to cancel a
/// token once a create has gone through.
pub struct FlakyMirrors {
    inner: Arc<MemoryStore>,
    fail_creates: AtomicBool,
    vanish_on_update: AtomicBool,
    create_calls: AtomicUsize,
    cancel_after_create: Option<CancellationToken>,
}

impl FlakyMirrors {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_creates: AtomicBool::new(false),
            vanish_on_update: AtomicBool::new(false),
            create_calls: AtomicUsize::new(0),
            cancel_after_create: None,
        }
    }

    pub fn failing_creates(self) -> Self {
        self.fail_creates.store(true, Ordering::SeqCst);
        self
    }

    /// The mirror is deleted out-of-band just before an update reaches it.
    pub fn vanishing_updates(self) -> Self {
        self.vanish_on_update.store(true, Ordering::SeqCst);
        self
    }

    pub fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel_after_create = Some(token);
        self
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MirrorRepository for FlakyMirrors {
    async fn get(&self, id: MirrorId) -> ShadowlinkResult<Option<MirrorRecord>> {
        MirrorRepository::get(self.inner.as_ref(), id).await
    }

    async fn find_by_slug(&self, kind: &str, slug: &str) -> ShadowlinkResult<Option<MirrorRecord>> {
        MirrorRepository::find_by_slug(self.inner.as_ref(), kind, slug).await
    }

    async fn create(&self, record: NewMirror) -> ShadowlinkResult<MirrorRecord> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(ShadowlinkError::repository("mirror collection is read-only"));
        }
        let created = MirrorRepository::create(self.inner.as_ref(), record).await?;
        if let Some(token) = &self.cancel_after_create {
            token.cancel();
        }
        Ok(created)
    }

    async fn update(&self, id: MirrorId, fields: MirrorFields) -> ShadowlinkResult<MirrorRecord> {
        if self.vanish_on_update.load(Ordering::SeqCst) {
            MirrorRepository::delete(self.inner.as_ref(), id).await?;
        }
        MirrorRepository::update(self.inner.as_ref(), id, fields).await
    }

    async fn delete(&self, id: MirrorId) -> ShadowlinkResult<()> {
        MirrorRepository::delete(self.inner.as_ref(), id).await
    }

    async fn list_published(
        &self,
        kind: &str,
        page: usize,
        page_size: usize,
    ) -> ShadowlinkResult<Vec<MirrorRecord>> {
        MirrorRepository::list_published(self.inner.as_ref(), kind, page, page_size).await
    }
}
