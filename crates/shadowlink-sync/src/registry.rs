//! Relationship Registry
//!
//! The table of configured (source kind, mirror kind) pairs. One registry is
//! built at startup and passed by reference to whatever wires the host's
//! dispatch mechanism; handlers never look it up themselves.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};

use shadowlink_core::{Relationship, ShadowlinkError, ShadowlinkResult};

use crate::dispatch::HookDispatcher;
use crate::handlers::SyncHandlers;
use crate::inspect::LinkInspector;
use crate::locks::KeyedLocks;
use crate::reconciliation::{ReconciliationConfig, ReconciliationEngine};
use crate::repository::{KindCatalog, SyncStores};

/// Process-wide table of configured relationships.
pub struct RelationshipRegistry {
    stores: SyncStores,
    catalog: Arc<dyn KindCatalog>,
    dispatcher: Arc<dyn HookDispatcher>,
    locks: Arc<KeyedLocks>,
    reconciliation: ReconciliationConfig,
    entries: RwLock<BTreeMap<Relationship, Arc<SyncHandlers>>>,
}

impl RelationshipRegistry {
    /// Create an empty registry.
    pub fn new(
        stores: SyncStores,
        catalog: Arc<dyn KindCatalog>,
        dispatcher: Arc<dyn HookDispatcher>,
    ) -> Self {
        Self {
            stores,
            catalog,
            dispatcher,
            locks: Arc::new(KeyedLocks::new()),
            reconciliation: ReconciliationConfig::default(),
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Configuration handed to engines built by [`Self::engine`].
    #[must_use]
    pub fn with_reconciliation_config(mut self, config: ReconciliationConfig) -> Self {
        self.reconciliation = config;
        self
    }

    /// Register a relationship and attach its three handlers.
    ///
    /// Fails with `Configuration` when either kind is unknown, or when a
    /// different relationship already uses one of the kinds on the same
    /// side: links live under one metadata key per side, so two
    /// relationships sharing a kind would claim each other's records.
    /// Registering the same pair twice is a no-op.
    pub fn register(&self, source_kind: &str, mirror_kind: &str) -> ShadowlinkResult<Relationship> {
        let relationship = Relationship::new(source_kind, mirror_kind)?;

        if !self.catalog.is_source_kind(source_kind) {
            return Err(ShadowlinkError::configuration(format!(
                "unknown source kind '{source_kind}'"
            )));
        }
        if !self.catalog.is_mirror_kind(mirror_kind) {
            return Err(ShadowlinkError::configuration(format!(
                "unknown mirror kind '{mirror_kind}'"
            )));
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&relationship) {
            debug!(relationship = %relationship, "Relationship already registered");
            return Ok(relationship);
        }
        if let Some(taken) = entries.keys().find(|rel| rel.source_kind == source_kind) {
            return Err(ShadowlinkError::configuration(format!(
                "source kind '{source_kind}' is already mirrored by '{taken}'"
            )));
        }
        if let Some(taken) = entries.keys().find(|rel| rel.mirror_kind == mirror_kind) {
            return Err(ShadowlinkError::configuration(format!(
                "mirror kind '{mirror_kind}' is already used by '{taken}'"
            )));
        }

        let handlers = Arc::new(SyncHandlers::new(
            relationship.clone(),
            self.stores.clone(),
            self.locks.clone(),
        ));
        let attached = handlers.attach_to(self.dispatcher.as_ref());
        entries.insert(relationship.clone(), handlers);

        info!(relationship = %relationship, attached, "Relationship registered");
        Ok(relationship)
    }

    /// Every registered relationship, ordered by kind names.
    #[must_use]
    pub fn relationships(&self) -> Vec<Relationship> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Handlers of one relationship.
    #[must_use]
    pub fn get(&self, source_kind: &str, mirror_kind: &str) -> Option<Arc<SyncHandlers>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(rel, _)| rel.source_kind == source_kind && rel.mirror_kind == mirror_kind)
            .map(|(_, handlers)| handlers.clone())
    }

    /// Relationships whose source side is `kind`.
    #[must_use]
    pub fn for_source_kind(&self, kind: &str) -> Vec<Relationship> {
        self.filtered(|rel| rel.source_kind == kind)
    }

    /// Relationships whose mirror side is `kind`.
    #[must_use]
    pub fn for_mirror_kind(&self, kind: &str) -> Vec<Relationship> {
        self.filtered(|rel| rel.mirror_kind == kind)
    }

    /// Build a reconciliation engine for a registered relationship.
    pub fn engine(&self, relationship: &Relationship) -> ShadowlinkResult<ReconciliationEngine> {
        self.ensure_registered(relationship)?;
        Ok(ReconciliationEngine::with_config(
            relationship.clone(),
            self.stores.clone(),
            self.reconciliation.clone(),
        ))
    }

    /// Build a link inspector for a registered relationship.
    pub fn inspector(&self, relationship: &Relationship) -> ShadowlinkResult<LinkInspector> {
        self.ensure_registered(relationship)?;
        Ok(LinkInspector::new(relationship.clone(), self.stores.clone()))
    }

    /// Lock table shared by every relationship's handlers.
    #[must_use]
    pub fn locks(&self) -> &Arc<KeyedLocks> {
        &self.locks
    }

    fn ensure_registered(&self, relationship: &Relationship) -> ShadowlinkResult<()> {
        let known = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(relationship);
        if known {
            Ok(())
        } else {
            Err(ShadowlinkError::configuration(format!(
                "relationship '{relationship}' is not registered"
            )))
        }
    }

    fn filtered(&self, keep: impl Fn(&Relationship) -> bool) -> Vec<Relationship> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|rel| keep(rel))
            .cloned()
            .collect()
    }
}
