// ── Generic reactive entity collection ──
//
// Ordered storage keyed by entity id, with push-based snapshot
// notification via a `watch` channel. Order is the hub's order as of the
// last bulk replace; upserts of new keys append.

use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use indexmap::IndexMap;
use tokio::sync::watch;

use crate::model::{Automation, Device, Room};

/// Entities addressable by a string id.
pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for Device {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for Room {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for Automation {
    fn key(&self) -> &str {
        &self.id
    }
}

pub(crate) type Snapshot<T> = Arc<Vec<Arc<T>>>;

/// An ordered, reactive collection for a single entity type.
///
/// Every mutation rebuilds the snapshot that subscribers receive.
pub(crate) struct EntityCollection<T: Keyed + Send + Sync + 'static> {
    by_key: RwLock<IndexMap<String, Arc<T>>>,
    snapshot: watch::Sender<Snapshot<T>>,
}

impl<T: Keyed + Send + Sync + 'static> EntityCollection<T> {
    pub(crate) fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            by_key: RwLock::new(IndexMap::new()),
            snapshot,
        }
    }

    /// Replace the whole collection in one step. Readers never observe an
    /// empty intermediate state. Returns the previous contents.
    pub(crate) fn replace_all(&self, items: Vec<T>) -> IndexMap<String, Arc<T>> {
        let fresh: IndexMap<String, Arc<T>> = items
            .into_iter()
            .map(|item| (item.key().to_owned(), Arc::new(item)))
            .collect();
        let mut map = self.write();
        let previous = std::mem::replace(&mut *map, fresh);
        self.rebuild_snapshot(&map);
        previous
    }

    /// Insert or update an entity. Returns the stored `Arc`.
    pub(crate) fn upsert(&self, item: T) -> Arc<T> {
        let item = Arc::new(item);
        let mut map = self.write();
        map.insert(item.key().to_owned(), Arc::clone(&item));
        self.rebuild_snapshot(&map);
        item
    }

    /// Apply `f` to a copy of the entity under `key` and store the result.
    /// Returns `(before, after)`, or `None` if the key is absent.
    pub(crate) fn modify(&self, key: &str, f: impl FnOnce(&mut T)) -> Option<(Arc<T>, Arc<T>)>
    where
        T: Clone,
    {
        let mut map = self.write();
        let before = Arc::clone(map.get(key)?);
        let mut updated = T::clone(&before);
        f(&mut updated);
        let after = Arc::new(updated);
        map.insert(key.to_owned(), Arc::clone(&after));
        self.rebuild_snapshot(&map);
        Some((before, after))
    }

    pub(crate) fn get(&self, key: &str) -> Option<Arc<T>> {
        self.by_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Snapshot<T> {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn clear(&self) {
        let mut map = self.write();
        map.clear();
        self.rebuild_snapshot(&map);
    }

    pub(crate) fn len(&self) -> usize {
        self.by_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn write(&self) -> RwLockWriteGuard<'_, IndexMap<String, Arc<T>>> {
        self.by_key.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rebuild under the write lock so snapshots publish in mutation order.
    fn rebuild_snapshot(&self, map: &IndexMap<String, Arc<T>>) {
        let values: Vec<Arc<T>> = map.values().cloned().collect();
        // `send_replace` updates unconditionally, even with zero receivers.
        self.snapshot.send_replace(Arc::new(values));
    }
}
