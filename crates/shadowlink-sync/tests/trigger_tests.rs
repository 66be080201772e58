//! Trigger Handler Tests
//!
//! Drives the three handlers through the in-process dispatcher (store
//! raising hooks like a host would) and directly:
//! - source create/update/delete round trip
//! - mirror-originated source records
//! - guards against duplicate records and trigger loops
//! - kind and status filters

mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use common::{FlakyMirrors, Harness, MIRROR_KIND, SOURCE_KIND};
use shadowlink_core::{NewMirror, RecordStatus, Relationship, ShadowlinkResult};
use shadowlink_sync::{
    EventOrigin, HandlerOutcome, HookDispatcher, HookPoint, MirrorRepository, RecordRef,
    SkipReason, SourceRepository, SyncHandlers, TriggerEvent, TriggerHandler,
};

// =============================================================================
// Source-side triggers
// =============================================================================

#[tokio::test]
async fn test_published_source_gets_exactly_one_linked_mirror() {
    let h = Harness::wired();

    let jane = h.create_source("Jane Doe", "jane-doe").await;

    let mirrors = h.mirrors();
    assert_eq!(mirrors.len(), 1);
    assert_eq!(mirrors[0].name, "Jane Doe");
    assert_eq!(mirrors[0].slug, "jane-doe");
    assert_eq!(
        h.associations.get_mirror_id(jane.id).await.unwrap(),
        Some(mirrors[0].id)
    );
    assert_eq!(
        h.associations.get_source_id(mirrors[0].id).await.unwrap(),
        Some(jane.id)
    );
    // The mirror-create hook fired for the new mirror but found the source by slug.
    assert_eq!(h.sources().len(), 1);
}

#[tokio::test]
async fn test_rename_updates_the_linked_mirror() {
    let h = Harness::wired();
    let jane = h.create_source("Jane Doe", "jane-doe").await;
    let mirror_id = h.mirrors()[0].id;

    h.update_source(&jane, "Jane R. Doe", "jane-doe").await;

    let mirrors = h.mirrors();
    assert_eq!(mirrors.len(), 1);
    assert_eq!(mirrors[0].id, mirror_id);
    assert_eq!(mirrors[0].name, "Jane R. Doe");
    h.assert_in_sync().await;
}

#[tokio::test]
async fn test_round_trip_create_update_delete() {
    let h = Harness::wired();

    let source = h.create_source("Front Desk", "front-desk").await;
    h.assert_in_sync().await;

    let source = h.update_source(&source, "Reception", "reception").await;
    h.assert_in_sync().await;
    assert_eq!(h.mirrors()[0].slug, "reception");

    let mirror_id = h.mirrors()[0].id;
    SourceRepository::delete(h.store.as_ref(), source.id)
        .await
        .unwrap();

    assert!(h.sources().is_empty());
    assert!(h.mirrors().is_empty());
    assert!(!h.meta_references(&source.id.to_string()).await);
    assert!(!h.meta_references(&mirror_id.to_string()).await);
}

#[tokio::test]
async fn test_draft_sources_are_ignored_until_published() {
    let h = Harness::wired();

    let draft = h
        .create_source_with_status("Jane Doe", "jane-doe", RecordStatus::AutoDraft)
        .await;
    assert!(h.mirrors().is_empty());

    let outcome = h.handlers().on_source_upserted(draft.id).await.unwrap();
    assert_eq!(outcome, HandlerOutcome::Skipped(SkipReason::NotPublished));

    SourceRepository::update(
        h.store.as_ref(),
        draft.id,
        shadowlink_core::SourceFields {
            title: "Jane Doe".into(),
            slug: "jane-doe".into(),
            status: RecordStatus::Published,
        },
    )
    .await
    .unwrap();

    assert_eq!(h.mirrors().len(), 1);
    h.assert_in_sync().await;
}

#[tokio::test]
async fn test_upsert_handler_is_idempotent() {
    let h = Harness::unwired();
    let source = h.create_source("Jane Doe", "jane-doe").await;
    let handlers = h.handlers();

    let first = handlers.on_source_upserted(source.id).await.unwrap();
    let second = handlers.on_source_upserted(source.id).await.unwrap();

    assert!(matches!(first, HandlerOutcome::MirrorCreated(_)));
    assert_eq!(second, HandlerOutcome::Unchanged);
    assert_eq!(h.mirrors().len(), 1);
}

#[tokio::test]
async fn test_stale_link_is_treated_as_absent() {
    let h = Harness::unwired();
    let source = h.create_source("Jane Doe", "jane-doe").await;
    let handlers = h.handlers();

    let HandlerOutcome::MirrorCreated(old) = handlers.on_source_upserted(source.id).await.unwrap()
    else {
        panic!("expected a mirror to be created");
    };
    // Mirror removed out-of-band; the source still points at it.
    MirrorRepository::delete(h.store.as_ref(), old).await.unwrap();

    let outcome = handlers.on_source_upserted(source.id).await.unwrap();

    let HandlerOutcome::MirrorCreated(new) = outcome else {
        panic!("expected a replacement mirror, got {outcome:?}");
    };
    assert_ne!(old, new);
    h.assert_in_sync().await;
}

#[tokio::test]
async fn test_upsert_adopts_unlinked_mirror_with_same_slug() {
    let h = Harness::unwired();
    let source = h.create_source("Jane Doe", "jane-doe").await;
    let existing = h.create_mirror("Jane", "jane-doe").await;

    let outcome = h.handlers().on_source_upserted(source.id).await.unwrap();

    assert_eq!(
        outcome,
        HandlerOutcome::Linked {
            source_id: source.id,
            mirror_id: existing.id
        }
    );
    assert_eq!(h.mirrors().len(), 1);
    assert_eq!(h.mirror(existing.id).await.unwrap().name, "Jane Doe");
}

#[tokio::test]
async fn test_concurrent_upserts_create_one_mirror() {
    let h = Harness::unwired();
    let source = h.create_source("Jane Doe", "jane-doe").await;
    let handlers = h.handlers();
    let source_id = source.id;

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let handlers = Arc::clone(&handlers);
            tokio::spawn(async move { handlers.on_source_upserted(source_id).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(h.mirrors().len(), 1);
    h.assert_in_sync().await;
}

#[tokio::test]
async fn test_delete_without_mirror_is_noop() {
    let h = Harness::unwired();
    let source = h.create_source("Jane Doe", "jane-doe").await;

    let outcome = h.handlers().on_source_deleted(source.id).await.unwrap();
    assert_eq!(outcome, HandlerOutcome::Unchanged);
}

#[tokio::test]
async fn test_delete_with_already_missing_mirror_clears_link() {
    let h = Harness::unwired();
    let source = h.create_source("Jane Doe", "jane-doe").await;
    let handlers = h.handlers();
    let HandlerOutcome::MirrorCreated(mirror_id) =
        handlers.on_source_upserted(source.id).await.unwrap()
    else {
        panic!("expected a mirror to be created");
    };
    MirrorRepository::delete(h.store.as_ref(), mirror_id)
        .await
        .unwrap();

    let outcome = handlers.on_source_deleted(source.id).await.unwrap();

    assert_eq!(outcome, HandlerOutcome::LinkCleared);
    assert_eq!(h.associations.get_mirror_id(source.id).await.unwrap(), None);
}

// =============================================================================
// Mirror-side trigger
// =============================================================================

#[tokio::test]
async fn test_operator_created_mirror_originates_a_source() {
    let h = Harness::wired();

    let mirror = h.create_mirror("Front Desk", "front-desk").await;

    let sources = h.sources();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].title, "Front Desk");
    assert_eq!(sources[0].slug, "front-desk");
    assert_eq!(sources[0].status, RecordStatus::Published);
    // The new source's own upsert hook linked the existing mirror instead of creating one.
    assert_eq!(h.mirrors().len(), 1);
    assert_eq!(
        h.associations.get_source_id(mirror.id).await.unwrap(),
        Some(sources[0].id)
    );
    h.assert_in_sync().await;
}

#[tokio::test]
async fn test_mirror_for_existing_slug_repairs_link_without_duplicate() {
    let h = Harness::unwired();
    let source = h.create_source("Jane Doe", "jane-doe").await;
    h.store.attach_dispatcher(&h.dispatcher);

    let mirror = h.create_mirror("Jane Doe", "jane-doe").await;

    let matching: Vec<_> = h
        .sources()
        .into_iter()
        .filter(|s| s.slug == "jane-doe")
        .collect();
    assert_eq!(matching.len(), 1);
    assert_eq!(
        h.associations.get_mirror_id(source.id).await.unwrap(),
        Some(mirror.id)
    );
}

#[tokio::test]
async fn test_internal_mirror_event_is_noop() {
    let h = Harness::unwired();
    let mirror = h.create_mirror("Front Desk", "front-desk").await;

    let outcome = h
        .handlers()
        .on_mirror_created(mirror.id, EventOrigin::Internal)
        .await
        .unwrap();

    assert_eq!(outcome, HandlerOutcome::Skipped(SkipReason::InternalOrigin));
    assert!(h.sources().is_empty());

    let outcomes = h
        .dispatcher
        .dispatch(
            &TriggerEvent::new(HookPoint::MirrorCreated, MIRROR_KIND, *mirror.id.as_uuid())
                .internal(),
        )
        .await
        .unwrap();
    assert_eq!(
        outcomes,
        vec![HandlerOutcome::Skipped(SkipReason::InternalOrigin)]
    );
}

#[tokio::test]
async fn test_mirror_handler_is_idempotent() {
    let h = Harness::unwired();
    let mirror = h.create_mirror("Front Desk", "front-desk").await;
    let handlers = h.handlers();

    let first = handlers
        .on_mirror_created(mirror.id, EventOrigin::External)
        .await
        .unwrap();
    let second = handlers
        .on_mirror_created(mirror.id, EventOrigin::External)
        .await
        .unwrap();

    assert!(matches!(first, HandlerOutcome::SourceCreated(_)));
    assert_eq!(second, HandlerOutcome::Unchanged);
    assert_eq!(h.sources().len(), 1);
}

// =============================================================================
// Kind filters and dispatch wiring
// =============================================================================

#[tokio::test]
async fn test_events_for_other_kinds_are_skipped() {
    let h = Harness::unwired();
    h.store.declare_source_kind("news").unwrap();
    let news = SourceRepository::create(
        h.store.as_ref(),
        shadowlink_core::NewSource {
            kind: "news".into(),
            title: "Launch".into(),
            slug: "launch".into(),
            status: RecordStatus::Published,
        },
    )
    .await
    .unwrap();

    let outcome = h.handlers().on_source_upserted(news.id).await.unwrap();

    assert_eq!(outcome, HandlerOutcome::Skipped(SkipReason::KindMismatch));
    assert!(h.mirrors().is_empty());
}

#[tokio::test]
async fn test_event_for_missing_record_is_skipped() {
    let h = Harness::wired();

    let outcomes = h
        .dispatcher
        .dispatch(&TriggerEvent::new(
            HookPoint::SourceUpserted,
            SOURCE_KIND,
            Uuid::new_v4(),
        ))
        .await
        .unwrap();

    assert_eq!(
        outcomes,
        vec![HandlerOutcome::Skipped(SkipReason::RecordMissing)]
    );
}

#[tokio::test]
async fn test_handler_errors_surface_to_the_caller() {
    let h = Harness::with_mirrors(|store| {
        Arc::new(FlakyMirrors::new(store.clone()).failing_creates()) as Arc<dyn MirrorRepository>
    });
    h.store.attach_dispatcher(&h.dispatcher);

    let err = SourceRepository::create(
        h.store.as_ref(),
        shadowlink_core::NewSource {
            kind: SOURCE_KIND.into(),
            title: "Jane Doe".into(),
            slug: "jane-doe".into(),
            status: RecordStatus::Published,
        },
    )
    .await
    .unwrap_err();

    // No retry: the source exists, its mirror does not, until the next event or pass.
    assert_eq!(err.kind(), "repository");
    assert_eq!(h.sources().len(), 1);
    assert!(h.mirrors().is_empty());
}

#[tokio::test]
async fn test_duplicate_mirror_slug_is_rejected_before_hooks_run() {
    let h = Harness::wired();
    h.create_source("Jane Doe", "jane-doe").await;

    let err = MirrorRepository::create(
        h.store.as_ref(),
        NewMirror {
            kind: MIRROR_KIND.into(),
            name: "Jane Doe".into(),
            slug: "jane-doe".into(),
        },
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), "validation");
    assert_eq!(h.mirrors().len(), 1);
    assert_eq!(h.sources().len(), 1);
}

#[tokio::test]
async fn test_independent_relationships_do_not_interfere() {
    let h = Harness::wired();
    h.store.declare_source_kind("events").unwrap();
    h.store.declare_mirror_kind("venues").unwrap();
    h.registry.register("events", "venues").unwrap();

    h.create_source("Jane Doe", "jane-doe").await;
    SourceRepository::create(
        h.store.as_ref(),
        shadowlink_core::NewSource {
            kind: "events".into(),
            title: "Summit".into(),
            slug: "summit".into(),
            status: RecordStatus::Published,
        },
    )
    .await
    .unwrap();

    assert_eq!(h.mirrors().len(), 1);
    let venues = h.store.mirrors_of("venues");
    assert_eq!(venues.len(), 1);
    assert_eq!(venues[0].slug, "summit");
    assert_eq!(h.sources().len(), 1);
}

#[tokio::test]
async fn test_metadata_writes_raise_no_events() {
    let h = Harness::wired();
    let source = h
        .create_source_with_status("Jane Doe", "jane-doe", RecordStatus::Draft)
        .await;

    h.associations
        .clear_link(RecordRef::Source(source.id))
        .await
        .unwrap();

    assert!(h.mirrors().is_empty());
}

#[tokio::test]
async fn test_second_relationship_on_a_mirror_kind_is_refused() {
    let h = Harness::wired();
    h.store.declare_source_kind("doctors").unwrap();

    let err = h.registry.register("doctors", MIRROR_KIND).unwrap_err();
    assert_eq!(err.kind(), "configuration");

    h.create_source("Jane Doe", "jane-doe").await;

    assert!(h.store.sources_of("doctors").is_empty());
    assert_eq!(h.sources().len(), 1);
    assert_eq!(h.mirrors().len(), 1);
}

#[tokio::test]
async fn test_mirror_linked_to_another_source_kind_is_left_alone() {
    let h = Harness::wired();
    h.store.declare_source_kind("doctors").unwrap();
    h.create_source("Jane Doe", "jane-doe").await;
    let mirror = h.mirrors().remove(0);

    // Handlers built outside the registry, over the same mirror kind.
    let doctors = SyncHandlers::new(
        Relationship::new("doctors", MIRROR_KIND).unwrap(),
        h.stores.clone(),
        h.registry.locks().clone(),
    );
    let outcome = doctors
        .on_mirror_created(mirror.id, EventOrigin::External)
        .await
        .unwrap();

    assert_eq!(outcome, HandlerOutcome::Skipped(SkipReason::LinkedElsewhere));
    assert!(h.store.sources_of("doctors").is_empty());
    h.assert_in_sync().await;
}

// =============================================================================
// Event origin
// =============================================================================

/// Records the origin of every mirror-created event it sees.
#[derive(Default)]
struct OriginRecorder {
    seen: Mutex<Vec<EventOrigin>>,
}

impl OriginRecorder {
    fn seen(&self) -> Vec<EventOrigin> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl TriggerHandler for OriginRecorder {
    fn name(&self) -> String {
        "origin-recorder".to_string()
    }

    async fn handle(&self, event: &TriggerEvent) -> ShadowlinkResult<HandlerOutcome> {
        self.seen.lock().unwrap().push(event.origin);
        Ok(HandlerOutcome::Unchanged)
    }
}

fn record_origins(h: &Harness) -> Arc<OriginRecorder> {
    let recorder = Arc::new(OriginRecorder::default());
    h.dispatcher
        .attach(HookPoint::MirrorCreated, MIRROR_KIND, recorder.clone());
    recorder
}

#[tokio::test]
async fn test_handler_created_mirror_is_raised_as_internal() {
    let h = Harness::wired();
    let recorder = record_origins(&h);

    h.create_source("Jane Doe", "jane-doe").await;

    assert_eq!(recorder.seen(), vec![EventOrigin::Internal]);
    assert_eq!(h.sources().len(), 1);
}

#[tokio::test]
async fn test_operator_created_mirror_is_raised_as_external() {
    let h = Harness::wired();
    let recorder = record_origins(&h);

    h.create_mirror("Front Desk", "front-desk").await;

    assert_eq!(recorder.seen(), vec![EventOrigin::External]);
}

#[tokio::test]
async fn test_reconciliation_created_mirror_is_raised_as_internal() {
    let h = Harness::unwired();
    h.create_source("Jane Doe", "jane-doe").await;
    h.store.attach_dispatcher(&h.dispatcher);
    let recorder = record_origins(&h);

    h.registry
        .engine(&h.relationship)
        .unwrap()
        .reconcile()
        .await
        .unwrap();

    assert_eq!(recorder.seen(), vec![EventOrigin::Internal]);
    assert_eq!(h.sources().len(), 1);
    h.assert_in_sync().await;
}
