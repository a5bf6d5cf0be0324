// ── Activity log ──
//
// Ring-bounded feed of recent device actions, newest first. Rebuilt each
// session; never persisted.

use std::sync::Arc;

use tokio::sync::watch;

use crate::model::ActivityEntry;

pub(crate) const DEFAULT_CAPACITY: usize = 5;

pub struct ActivityLog {
    capacity: usize,
    entries: watch::Sender<Arc<Vec<ActivityEntry>>>,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ActivityLog {
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (entries, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            capacity: capacity.max(1),
            entries,
        }
    }

    /// Prepend an entry, evicting the oldest beyond capacity.
    pub fn record(&self, device_name: impl Into<String>, action: impl Into<String>) -> ActivityEntry {
        let entry = ActivityEntry::new(device_name, action);
        let capacity = self.capacity;
        self.entries.send_modify(|entries| {
            let mut next = Vec::with_capacity(capacity);
            next.push(entry.clone());
            next.extend(entries.iter().take(capacity - 1).cloned());
            *entries = Arc::new(next);
        });
        entry
    }

    /// Current entries, newest first.
    pub fn entries(&self) -> Arc<Vec<ActivityEntry>> {
        self.entries.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<ActivityEntry>>> {
        self.entries.subscribe()
    }

    pub fn clear(&self) {
        self.entries.send_replace(Arc::new(Vec::new()));
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
