//! Per-key mutual exclusion.
//!
//! Handlers run a read-modify-write sequence ("create the mirror if it is
//! absent, then link it"). Two concurrent invocations for the same record
//! would both see "absent" and create duplicates, so each sequence holds the
//! lock for its key until the link is written.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Lazily created async locks keyed by string.
///
/// Slots are dropped once no guard or waiter references them.
#[derive(Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: impl Into<String>) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.retain(|_, weak| weak.strong_count() > 0);

            let key = key.into();
            match slots.get(&key).and_then(Weak::upgrade) {
                Some(slot) => slot,
                None => {
                    let slot = Arc::new(AsyncMutex::new(()));
                    slots.insert(key, Arc::downgrade(&slot));
                    slot
                }
            }
        };
        slot.lock_owned().await
    }

    /// Number of keys currently held or awaited.
    #[must_use]
    pub fn active_keys(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

/// Lock key for handlers acting on a source record.
#[must_use]
pub fn source_key(id: impl std::fmt::Display) -> String {
    format!("source:{id}")
}

/// Lock key for handlers acting on a slug within a kind.
#[must_use]
pub fn slug_key(kind: &str, slug: &str) -> String {
    format!("slug:{kind}:{slug}")
}
