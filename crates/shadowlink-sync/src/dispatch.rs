//! Trigger dispatch
//!
//! The host platform owns event delivery. shadowlink only needs a place to
//! attach its handlers ([`HookDispatcher`]) and a shape for the events they
//! receive ([`TriggerEvent`]). [`InProcessDispatcher`] is a small dispatcher
//! that runs handlers inline on the caller's task; hosts without a hook
//! system of their own can use it directly.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use shadowlink_core::ShadowlinkResult;

use crate::handlers::HandlerOutcome;

/// Point in a record's lifecycle a handler can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
    /// A source record was created or updated.
    SourceUpserted,
    /// A source record is about to be deleted.
    SourceDeleted,
    /// A mirror record was created.
    MirrorCreated,
}

impl HookPoint {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            HookPoint::SourceUpserted => "source_upserted",
            HookPoint::SourceDeleted => "source_deleted",
            HookPoint::MirrorCreated => "mirror_created",
        }
    }
}

impl std::fmt::Display for HookPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who caused the mutation behind an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOrigin {
    /// An operator, an import, or any path outside shadowlink.
    #[default]
    External,
    /// A shadowlink handler or reconciliation pass.
    Internal,
}

tokio::task_local! {
    static MUTATION_ORIGIN: EventOrigin;
}

/// Run `mutation` with every event it raises tagged [`EventOrigin::Internal`].
///
/// Handlers and reconciliation wrap their own record writes in this so that
/// a store raising hooks can tell them apart from operator edits.
pub async fn internally<F: Future>(mutation: F) -> F::Output {
    MUTATION_ORIGIN.scope(EventOrigin::Internal, mutation).await
}

/// Origin of the mutation running on the current task.
#[must_use]
pub fn current_origin() -> EventOrigin {
    MUTATION_ORIGIN.try_with(|origin| *origin).unwrap_or_default()
}

/// An event delivered to trigger handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// Lifecycle point.
    pub hook: HookPoint,
    /// Kind of the record the event is about.
    pub kind: String,
    /// Raw ID of the record; handlers re-fetch the record itself.
    pub record_id: Uuid,
    /// Origin of the mutation, when the host can tell.
    #[serde(default)]
    pub origin: EventOrigin,
}

impl TriggerEvent {
    /// Create an externally originated event.
    pub fn new(hook: HookPoint, kind: impl Into<String>, record_id: Uuid) -> Self {
        Self {
            hook,
            kind: kind.into(),
            record_id,
            origin: EventOrigin::External,
        }
    }

    /// Mark the event as raised by shadowlink itself.
    #[must_use]
    pub fn internal(mut self) -> Self {
        self.origin = EventOrigin::Internal;
        self
    }

    /// Create an event tagged with the origin of the running mutation.
    pub fn from_current(hook: HookPoint, kind: impl Into<String>, record_id: Uuid) -> Self {
        Self {
            origin: current_origin(),
            ..Self::new(hook, kind, record_id)
        }
    }
}

/// A handler attached to a hook point.
#[async_trait]
pub trait TriggerHandler: Send + Sync {
    /// Stable name; attaching the same name twice is a no-op.
    fn name(&self) -> String;

    /// Handle one event.
    async fn handle(&self, event: &TriggerEvent) -> ShadowlinkResult<HandlerOutcome>;
}

/// Host-side registration point for trigger handlers.
pub trait HookDispatcher: Send + Sync {
    /// Attach `handler` to `hook` for records of `kind`.
    ///
    /// Returns `false` when a handler with the same name is already attached.
    fn attach(&self, hook: HookPoint, kind: &str, handler: Arc<dyn TriggerHandler>) -> bool;
}

type HandlerTable = HashMap<(HookPoint, String), Vec<Arc<dyn TriggerHandler>>>;

/// Dispatcher that runs handlers inline, in attach order.
#[derive(Default)]
pub struct InProcessDispatcher {
    handlers: RwLock<HandlerTable>,
}

impl InProcessDispatcher {
    /// Create an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handlers attached to a hook point for a kind.
    #[must_use]
    pub fn handler_count(&self, hook: HookPoint, kind: &str) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(hook, kind.to_string()))
            .map_or(0, Vec::len)
    }

    /// Deliver an event to every matching handler.
    ///
    /// Stops at the first error and returns it; retrying is the caller's call.
    #[instrument(skip(self, event), fields(hook = %event.hook, kind = %event.kind, record_id = %event.record_id))]
    pub async fn dispatch(&self, event: &TriggerEvent) -> ShadowlinkResult<Vec<HandlerOutcome>> {
        // Snapshot so no lock is held while handlers run; handlers may
        // mutate records and trigger nested dispatches.
        let handlers: Vec<Arc<dyn TriggerHandler>> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(event.hook, event.kind.clone()))
            .cloned()
            .unwrap_or_default();

        if handlers.is_empty() {
            debug!("No handlers attached");
            return Ok(vec![]);
        }

        let mut outcomes = Vec::with_capacity(handlers.len());
        for handler in handlers {
            match handler.handle(event).await {
                Ok(outcome) => {
                    debug!(handler = %handler.name(), outcome = ?outcome, "Handler finished");
                    outcomes.push(outcome);
                }
                Err(e) => {
                    warn!(handler = %handler.name(), error = %e, "Handler failed");
                    return Err(e);
                }
            }
        }
        Ok(outcomes)
    }
}

impl HookDispatcher for InProcessDispatcher {
    fn attach(&self, hook: HookPoint, kind: &str, handler: Arc<dyn TriggerHandler>) -> bool {
        let mut table = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let attached = table.entry((hook, kind.to_string())).or_default();

        let name = handler.name();
        if attached.iter().any(|h| h.name() == name) {
            return false;
        }
        attached.push(handler);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadowlink_core::ShadowlinkError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        name: &'static str,
        calls: AtomicUsize,
        fail: bool,
    }

    impl Counting {
        fn new(name: &'static str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl TriggerHandler for Counting {
        fn name(&self) -> String {
            self.name.to_string()
        }

        async fn handle(&self, _event: &TriggerEvent) -> ShadowlinkResult<HandlerOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ShadowlinkError::repository("store offline"))
            } else {
                Ok(HandlerOutcome::Unchanged)
            }
        }
    }

    #[test]
    fn test_attach_same_name_twice_is_noop() {
        let dispatcher = InProcessDispatcher::new();
        assert!(dispatcher.attach(HookPoint::SourceUpserted, "staff", Counting::new("a", false)));
        assert!(!dispatcher.attach(HookPoint::SourceUpserted, "staff", Counting::new("a", false)));
        assert_eq!(dispatcher.handler_count(HookPoint::SourceUpserted, "staff"), 1);
    }

    #[tokio::test]
    async fn test_dispatch_filters_by_hook_and_kind() {
        let dispatcher = InProcessDispatcher::new();
        let handler = Counting::new("a", false);
        dispatcher.attach(HookPoint::SourceUpserted, "staff", handler.clone());

        let id = Uuid::new_v4();
        dispatcher
            .dispatch(&TriggerEvent::new(HookPoint::SourceUpserted, "staff", id))
            .await
            .unwrap();
        dispatcher
            .dispatch(&TriggerEvent::new(HookPoint::SourceDeleted, "staff", id))
            .await
            .unwrap();
        dispatcher
            .dispatch(&TriggerEvent::new(HookPoint::SourceUpserted, "news", id))
            .await
            .unwrap();

        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dispatch_stops_at_first_error() {
        let dispatcher = InProcessDispatcher::new();
        let failing = Counting::new("failing", true);
        let after = Counting::new("after", false);
        dispatcher.attach(HookPoint::MirrorCreated, "offices", failing.clone());
        dispatcher.attach(HookPoint::MirrorCreated, "offices", after.clone());

        let event = TriggerEvent::new(HookPoint::MirrorCreated, "offices", Uuid::new_v4());
        let err = dispatcher.dispatch(&event).await.unwrap_err();

        assert_eq!(err.kind(), "repository");
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(after.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_internal_marker() {
        let event = TriggerEvent::new(HookPoint::MirrorCreated, "offices", Uuid::new_v4());
        assert_eq!(event.origin, EventOrigin::External);
        assert_eq!(event.internal().origin, EventOrigin::Internal);
    }

    #[tokio::test]
    async fn test_origin_follows_the_internal_scope() {
        let id = Uuid::new_v4();
        assert_eq!(current_origin(), EventOrigin::External);

        let inside = internally(async {
            TriggerEvent::from_current(HookPoint::MirrorCreated, "offices", id)
        })
        .await;

        assert_eq!(inside.origin, EventOrigin::Internal);
        assert_eq!(
            TriggerEvent::from_current(HookPoint::MirrorCreated, "offices", id).origin,
            EventOrigin::External
        );
    }
}
