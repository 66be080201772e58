//! In-memory record store
//!
//! A reference adapter for every collaborator contract: both repositories,
//! record metadata and the kind catalog. Records are kept in insertion
//! order, which makes `list_published` pagination stable.
//!
//! When attached to an [`InProcessDispatcher`] the store raises the same
//! lifecycle hooks a host platform would: source create/update, source
//! delete (before removal) and mirror create. Metadata writes and mirror
//! updates/deletes raise nothing. Events carry the origin of the mutation
//! that raised them (see [`crate::dispatch::internally`]).

use std::sync::{Arc, PoisonError, RwLock, Weak};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use shadowlink_core::{
    validate_kind_name, MirrorFields, MirrorId, MirrorRecord, NewMirror, NewSource, RecordMeta,
    ShadowlinkError, ShadowlinkResult, SourceFields, SourceId, SourceRecord,
};

use crate::dispatch::{HookPoint, InProcessDispatcher, TriggerEvent};
use crate::repository::{
    KindCatalog, MirrorRepository, RecordMetadata, RecordRef, SourceRepository,
};

/// Serializable contents of a [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Declared source kinds.
    #[serde(default)]
    pub source_kinds: Vec<String>,
    /// Declared mirror kinds.
    #[serde(default)]
    pub mirror_kinds: Vec<String>,
    /// Source records, in insertion order.
    #[serde(default)]
    pub sources: Vec<SourceRecord>,
    /// Mirror records, in insertion order.
    #[serde(default)]
    pub mirrors: Vec<MirrorRecord>,
}

/// In-memory implementation of the record collaborators.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<Snapshot>,
    dispatcher: RwLock<Option<Weak<InProcessDispatcher>>>,
}

fn validate_slug(slug: &str) -> ShadowlinkResult<()> {
    if slug.is_empty() {
        return Err(ShadowlinkError::validation("slug", "must not be empty"));
    }
    if slug.chars().any(char::is_whitespace) {
        return Err(ShadowlinkError::validation(
            "slug",
            format!("'{slug}' must not contain whitespace"),
        ));
    }
    Ok(())
}

fn validate_display(field: &str, value: &str) -> ShadowlinkResult<()> {
    if value.trim().is_empty() {
        return Err(ShadowlinkError::validation(field, "must not be empty"));
    }
    Ok(())
}

fn slug_taken(slug: &str, kind: &str) -> ShadowlinkError {
    ShadowlinkError::validation("slug", format!("'{slug}' is already used in kind '{kind}'"))
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from a snapshot, checking its kind names.
    pub fn from_snapshot(snapshot: Snapshot) -> ShadowlinkResult<Self> {
        for kind in snapshot.source_kinds.iter().chain(&snapshot.mirror_kinds) {
            validate_kind_name(kind)?;
        }
        Ok(Self {
            state: RwLock::new(snapshot),
            dispatcher: RwLock::new(None),
        })
    }

    /// Copy of the current contents.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.read().clone()
    }

    /// Declare a source kind.
    pub fn declare_source_kind(&self, kind: &str) -> ShadowlinkResult<()> {
        validate_kind_name(kind)?;
        let mut state = self.write();
        if !state.source_kinds.iter().any(|k| k == kind) {
            state.source_kinds.push(kind.to_string());
        }
        Ok(())
    }

    /// Declare a mirror kind.
    pub fn declare_mirror_kind(&self, kind: &str) -> ShadowlinkResult<()> {
        validate_kind_name(kind)?;
        let mut state = self.write();
        if !state.mirror_kinds.iter().any(|k| k == kind) {
            state.mirror_kinds.push(kind.to_string());
        }
        Ok(())
    }

    /// Raise lifecycle hooks on `dispatcher` from now on.
    ///
    /// The store only keeps a weak reference.
    pub fn attach_dispatcher(&self, dispatcher: &Arc<InProcessDispatcher>) {
        *self
            .dispatcher
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::downgrade(dispatcher));
    }

    /// Every source record of `kind`, any status.
    #[must_use]
    pub fn sources_of(&self, kind: &str) -> Vec<SourceRecord> {
        self.read()
            .sources
            .iter()
            .filter(|s| s.kind == kind)
            .cloned()
            .collect()
    }

    /// Every mirror record of `kind`.
    #[must_use]
    pub fn mirrors_of(&self, kind: &str) -> Vec<MirrorRecord> {
        self.read()
            .mirrors
            .iter()
            .filter(|m| m.kind == kind)
            .cloned()
            .collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Snapshot> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Snapshot> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    async fn raise(&self, hook: HookPoint, kind: &str, record_id: Uuid) -> ShadowlinkResult<()> {
        let dispatcher = self
            .dispatcher
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade);

        if let Some(dispatcher) = dispatcher {
            dispatcher
                .dispatch(&TriggerEvent::from_current(hook, kind, record_id))
                .await?;
        }
        Ok(())
    }

    fn meta_of<'a>(state: &'a mut Snapshot, record: RecordRef) -> Option<&'a mut RecordMeta> {
        match record {
            RecordRef::Source(id) => state
                .sources
                .iter_mut()
                .find(|s| s.id == id)
                .map(|s| &mut s.meta),
            RecordRef::Mirror(id) => state
                .mirrors
                .iter_mut()
                .find(|m| m.id == id)
                .map(|m| &mut m.meta),
        }
    }
}

#[async_trait]
impl SourceRepository for MemoryStore {
    async fn get(&self, id: SourceId) -> ShadowlinkResult<Option<SourceRecord>> {
        Ok(self.read().sources.iter().find(|s| s.id == id).cloned())
    }

    async fn find_by_slug(&self, kind: &str, slug: &str) -> ShadowlinkResult<Option<SourceRecord>> {
        Ok(self
            .read()
            .sources
            .iter()
            .find(|s| s.kind == kind && s.slug == slug)
            .cloned())
    }

    async fn create(&self, record: NewSource) -> ShadowlinkResult<SourceRecord> {
        validate_display("title", &record.title)?;
        validate_slug(&record.slug)?;

        let created = {
            let mut state = self.write();
            if !state.source_kinds.contains(&record.kind) {
                return Err(ShadowlinkError::validation(
                    "kind",
                    format!("'{}' is not a source kind", record.kind),
                ));
            }
            if state
                .sources
                .iter()
                .any(|s| s.kind == record.kind && s.slug == record.slug)
            {
                return Err(slug_taken(&record.slug, &record.kind));
            }

            let created = SourceRecord {
                id: SourceId::new(),
                kind: record.kind,
                title: record.title,
                slug: record.slug,
                status: record.status,
                meta: RecordMeta::new(),
                modified_at: Utc::now(),
            };
            state.sources.push(created.clone());
            created
        };

        debug!(source_id = %created.id, kind = %created.kind, "Source record created");
        self.raise(HookPoint::SourceUpserted, &created.kind, *created.id.as_uuid())
            .await?;
        Ok(created)
    }

    async fn update(&self, id: SourceId, fields: SourceFields) -> ShadowlinkResult<SourceRecord> {
        validate_display("title", &fields.title)?;
        validate_slug(&fields.slug)?;

        let updated = {
            let mut state = self.write();
            let Some(index) = state.sources.iter().position(|s| s.id == id) else {
                return Err(ShadowlinkError::not_found("SourceRecord", id));
            };
            let kind = state.sources[index].kind.clone();
            if state
                .sources
                .iter()
                .any(|s| s.id != id && s.kind == kind && s.slug == fields.slug)
            {
                return Err(slug_taken(&fields.slug, &kind));
            }

            let record = &mut state.sources[index];
            record.title = fields.title;
            record.slug = fields.slug;
            record.status = fields.status;
            record.modified_at = Utc::now();
            record.clone()
        };

        self.raise(HookPoint::SourceUpserted, &updated.kind, *id.as_uuid())
            .await?;
        Ok(updated)
    }

    async fn delete(&self, id: SourceId) -> ShadowlinkResult<()> {
        let kind = self
            .read()
            .sources
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.kind.clone())
            .ok_or_else(|| ShadowlinkError::not_found("SourceRecord", id))?;

        self.raise(HookPoint::SourceDeleted, &kind, *id.as_uuid())
            .await?;

        self.write().sources.retain(|s| s.id != id);
        debug!(source_id = %id, "Source record deleted");
        Ok(())
    }

    async fn list_published(
        &self,
        kind: &str,
        page: usize,
        page_size: usize,
    ) -> ShadowlinkResult<Vec<SourceRecord>> {
        Ok(self
            .read()
            .sources
            .iter()
            .filter(|s| s.kind == kind && s.is_published())
            .skip(page.saturating_mul(page_size))
            .take(page_size)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MirrorRepository for MemoryStore {
    async fn get(&self, id: MirrorId) -> ShadowlinkResult<Option<MirrorRecord>> {
        Ok(self.read().mirrors.iter().find(|m| m.id == id).cloned())
    }

    async fn find_by_slug(&self, kind: &str, slug: &str) -> ShadowlinkResult<Option<MirrorRecord>> {
        Ok(self
            .read()
            .mirrors
            .iter()
            .find(|m| m.kind == kind && m.slug == slug)
            .cloned())
    }

    async fn create(&self, record: NewMirror) -> ShadowlinkResult<MirrorRecord> {
        validate_display("name", &record.name)?;
        validate_slug(&record.slug)?;

        let created = {
            let mut state = self.write();
            if !state.mirror_kinds.contains(&record.kind) {
                return Err(ShadowlinkError::validation(
                    "kind",
                    format!("'{}' is not a mirror kind", record.kind),
                ));
            }
            if state
                .mirrors
                .iter()
                .any(|m| m.kind == record.kind && m.slug == record.slug)
            {
                return Err(slug_taken(&record.slug, &record.kind));
            }

            let created = MirrorRecord {
                id: MirrorId::new(),
                kind: record.kind,
                name: record.name,
                slug: record.slug,
                meta: RecordMeta::new(),
                modified_at: Utc::now(),
            };
            state.mirrors.push(created.clone());
            created
        };

        debug!(mirror_id = %created.id, kind = %created.kind, "Mirror record created");
        self.raise(HookPoint::MirrorCreated, &created.kind, *created.id.as_uuid())
            .await?;
        Ok(created)
    }

    async fn update(&self, id: MirrorId, fields: MirrorFields) -> ShadowlinkResult<MirrorRecord> {
        validate_display("name", &fields.name)?;
        validate_slug(&fields.slug)?;

        let mut state = self.write();
        let Some(index) = state.mirrors.iter().position(|m| m.id == id) else {
            return Err(ShadowlinkError::not_found("MirrorRecord", id));
        };
        let kind = state.mirrors[index].kind.clone();
        if state
            .mirrors
            .iter()
            .any(|m| m.id != id && m.kind == kind && m.slug == fields.slug)
        {
            return Err(slug_taken(&fields.slug, &kind));
        }

        let record = &mut state.mirrors[index];
        record.name = fields.name;
        record.slug = fields.slug;
        record.modified_at = Utc::now();
        Ok(record.clone())
    }

    async fn delete(&self, id: MirrorId) -> ShadowlinkResult<()> {
        let mut state = self.write();
        let before = state.mirrors.len();
        state.mirrors.retain(|m| m.id != id);
        if state.mirrors.len() == before {
            return Err(ShadowlinkError::not_found("MirrorRecord", id));
        }
        Ok(())
    }

    async fn list_published(
        &self,
        kind: &str,
        page: usize,
        page_size: usize,
    ) -> ShadowlinkResult<Vec<MirrorRecord>> {
        Ok(self
            .read()
            .mirrors
            .iter()
            .filter(|m| m.kind == kind)
            .skip(page.saturating_mul(page_size))
            .take(page_size)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RecordMetadata for MemoryStore {
    async fn get_meta(&self, record: RecordRef, key: &str) -> ShadowlinkResult<Option<String>> {
        let state = self.read();
        let meta = match record {
            RecordRef::Source(id) => state.sources.iter().find(|s| s.id == id).map(|s| &s.meta),
            RecordRef::Mirror(id) => state.mirrors.iter().find(|m| m.id == id).map(|m| &m.meta),
        };
        Ok(meta.and_then(|m| m.get(key)).cloned())
    }

    async fn set_meta(&self, record: RecordRef, key: &str, value: &str) -> ShadowlinkResult<()> {
        let mut state = self.write();
        let meta = Self::meta_of(&mut state, record).ok_or_else(|| match record {
            RecordRef::Source(id) => ShadowlinkError::not_found("SourceRecord", id),
            RecordRef::Mirror(id) => ShadowlinkError::not_found("MirrorRecord", id),
        })?;
        meta.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete_meta(&self, record: RecordRef, key: &str) -> ShadowlinkResult<()> {
        let mut state = self.write();
        if let Some(meta) = Self::meta_of(&mut state, record) {
            meta.remove(key);
        }
        Ok(())
    }
}

impl KindCatalog for MemoryStore {
    fn is_source_kind(&self, kind: &str) -> bool {
        self.read().source_kinds.iter().any(|k| k == kind)
    }

    fn is_mirror_kind(&self, kind: &str) -> bool {
        self.read().mirror_kinds.iter().any(|k| k == kind)
    }
}
