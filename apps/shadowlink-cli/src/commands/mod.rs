//! CLI command implementations

pub mod check;
pub mod sync;

use std::sync::Arc;

use shadowlink_core::Relationship;
use shadowlink_sync::{
    InProcessDispatcher, MemoryStore, MetaAssociationStore, ReconciliationConfig,
    RelationshipRegistry, SyncStores,
};

use crate::config::Settings;
use crate::error::CliResult;
use crate::store::SnapshotFile;

/// A loaded snapshot with a registry over it.
///
/// The store is not attached to the dispatcher: commands only run
/// reconciliation and inspection, never the live handlers.
pub(crate) struct Workspace {
    pub file: SnapshotFile,
    pub store: Arc<MemoryStore>,
    pub registry: RelationshipRegistry,
}

impl Workspace {
    pub fn open(settings: &Settings, reconciliation: ReconciliationConfig) -> CliResult<Self> {
        let file = SnapshotFile::new(&settings.data_path);
        let store = file.load()?;

        let stores = SyncStores::new(
            store.clone(),
            store.clone(),
            Arc::new(MetaAssociationStore::new(store.clone())),
        );
        let registry = RelationshipRegistry::new(
            stores,
            store.clone(),
            Arc::new(InProcessDispatcher::new()),
        )
        .with_reconciliation_config(reconciliation);

        Ok(Self {
            file,
            store,
            registry,
        })
    }

    /// Register `source_kind -> mirror_kind`, failing on unknown kinds.
    pub fn relationship(&self, source_kind: &str, mirror_kind: &str) -> CliResult<Relationship> {
        Ok(self.registry.register(source_kind, mirror_kind)?)
    }
}
