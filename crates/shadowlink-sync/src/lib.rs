//! # shadowlink Sync Engine
//!
//! Keeps source records and their mirror records in bidirectional sync.
//!
//! This crate provides:
//! - The association store: source <-> mirror links kept as record metadata
//! - Trigger handlers for source upsert, source delete and mirror create
//! - A dispatch seam for attaching handlers to the host's lifecycle hooks
//! - The relationship registry, built once at startup
//! - The reconciliation engine: paginated plan, dry run, live apply
//! - Read-only link inspection for single records
//! - An in-memory reference store
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌──────────────────┐
//! │  Host lifecycle │────►│  HookDispatcher  │────►│   SyncHandlers   │
//! │     events      │     │                  │     │ (per relationship│
//! └─────────────────┘     └──────────────────┘     └────────┬─────────┘
//!                                                           │
//!                      ┌────────────────────────────────────┼──────────────┐
//!                      ▼                                    ▼              ▼
//!              ┌───────────────┐                   ┌──────────────┐ ┌──────────────┐
//!              │   Source /    │◄──────────────────│ Association  │ │  KeyedLocks  │
//!              │   Mirror      │                   │    Store     │ │              │
//!              │ repositories  │                   └──────────────┘ └──────────────┘
//!              └───────▲───────┘                          ▲
//!                      │                                  │
//!              ┌───────┴──────────────────────────────────┴───────┐
//!              │              ReconciliationEngine                │
//!              │   (operator-invoked batch pass, dry run / live)  │
//!              └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use shadowlink_sync::{
//!     InProcessDispatcher, MemoryStore, MetaAssociationStore, RelationshipRegistry, SyncStores,
//! };
//!
//! let store = Arc::new(MemoryStore::new());
//! store.declare_source_kind("staff")?;
//! store.declare_mirror_kind("offices")?;
//!
//! let dispatcher = Arc::new(InProcessDispatcher::new());
//! store.attach_dispatcher(&dispatcher);
//!
//! let stores = SyncStores::new(
//!     store.clone(),
//!     store.clone(),
//!     Arc::new(MetaAssociationStore::new(store.clone())),
//! );
//! let registry = RelationshipRegistry::new(stores, store.clone(), dispatcher.clone());
//! let relationship = registry.register("staff", "offices")?;
//!
//! // Creating a published staff record now creates its office.
//! let report = registry.engine(&relationship)?.dry_run().await?;
//! assert_eq!(report.touched(), 0);
//! ```

pub mod association;
pub mod dispatch;
pub mod handlers;
pub mod inspect;
pub mod locks;
pub mod memory;
pub mod reconciliation;
pub mod registry;
pub mod repository;

pub use association::{AssociationStore, MetaAssociationStore};
pub use dispatch::{
    current_origin, internally, EventOrigin, HookDispatcher, HookPoint, InProcessDispatcher,
    TriggerEvent, TriggerHandler,
};
pub use handlers::{
    HandlerOutcome, MirrorCreateHandler, SkipReason, SourceDeleteHandler, SourceUpsertHandler,
    SyncHandlers,
};
pub use inspect::{LinkCheck, LinkInspector, LinkState};
pub use locks::KeyedLocks;
pub use memory::{MemoryStore, Snapshot};
pub use reconciliation::{
    FailurePolicy, ReconciliationConfig, ReconciliationEngine, ReconciliationError,
    ReconciliationMode, ReconciliationOutcome, ReconciliationReport, ReconciliationResult,
    RunStatus,
};
pub use registry::RelationshipRegistry;
pub use repository::{
    KindCatalog, MirrorRepository, RecordMetadata, RecordRef, SourceRepository, SyncStores,
};
