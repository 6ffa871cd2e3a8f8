//! Listener registry.
//!
//! Insertion-ordered, duplicate-free (per [`ListenerId`]), and safe to
//! mutate while the read task is dispatching: dispatch iterates a
//! snapshot, so a callback adding or removing listeners affects the
//! next event, never the one in flight.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::listener::{ListenerId, RegisteredListener};

pub(crate) struct ListenerRegistry {
    next_id: AtomicU64,
    entries: RwLock<Vec<(ListenerId, RegisteredListener)>>,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn add(&self, listener: RegisteredListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.write().push((id, listener));
        id
    }

    /// Remove a listener. Returns `false` when the id is unknown
    /// (already removed, or never registered here).
    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    /// Snapshot of the current listeners, in registration order.
    pub(crate) fn snapshot(&self) -> Vec<RegisteredListener> {
        self.entries
            .read()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }
}
