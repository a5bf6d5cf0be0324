// ── Device registry ──
//
// Authoritative local copy of devices, rooms and automations. Only the
// synchronizer and the hub's command path mutate it, through the
// operations below. Device mutations publish on the registry's event bus.
//
// Mutation and emission happen under one emit lock, so subscribers see
// events in commit order. Handlers must not mutate the registry
// synchronously from inside a callback.

pub mod activity;
pub(crate) mod collection;
pub mod events;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::debug;

pub use activity::ActivityLog;
pub use collection::Keyed;
pub use events::{BusEvent, EventBus, EventKind, RegistryEvent, Subscription};

use self::collection::{EntityCollection, Snapshot};
use crate::error::CoreError;
use crate::model::{Automation, Device, DevicePatch, Room};

/// An optimistic mutation awaiting the hub's answer.
///
/// Resolve it with [`Registry::commit`] or [`Registry::rollback`].
#[derive(Debug)]
#[must_use = "a pending mutation must be committed or rolled back"]
pub struct Pending {
    id: String,
    patch: DevicePatch,
    previous: Arc<Device>,
    generation: u64,
}

impl Pending {
    pub fn device_id(&self) -> &str {
        &self.id
    }

    /// The device as it was before the patch.
    pub fn previous(&self) -> &Arc<Device> {
        &self.previous
    }
}

pub struct Registry {
    devices: EntityCollection<Device>,
    rooms: EntityCollection<Room>,
    automations: EntityCollection<Automation>,
    /// Bumped by every bulk device replace.
    generation: AtomicU64,
    /// Device id -> number of unresolved optimistic mutations.
    pending: Mutex<HashMap<String, usize>>,
    last_sync: RwLock<Option<DateTime<Utc>>>,
    bus: EventBus<RegistryEvent>,
    emit: Mutex<()>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_bus(EventBus::new())
    }

    /// Build a registry publishing on an existing bus.
    pub fn with_bus(bus: EventBus<RegistryEvent>) -> Self {
        Self {
            devices: EntityCollection::new(),
            rooms: EntityCollection::new(),
            automations: EntityCollection::new(),
            generation: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
            last_sync: RwLock::new(None),
            bus,
            emit: Mutex::new(()),
        }
    }

    pub fn bus(&self) -> &EventBus<RegistryEvent> {
        &self.bus
    }

    pub fn subscribe(
        &self,
        kind: EventKind,
        handler: impl Fn(&RegistryEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.bus.subscribe(kind, handler)
    }

    // ── Reads ────────────────────────────────────────────────────

    /// All devices, in hub order.
    pub fn list(&self) -> Snapshot<Device> {
        self.devices.snapshot()
    }

    pub fn by_room(&self, room_id: &str) -> Vec<Arc<Device>> {
        self.devices
            .snapshot()
            .iter()
            .filter(|d| d.room_id.as_deref() == Some(room_id))
            .cloned()
            .collect()
    }

    pub fn device(&self, id: &str) -> Option<Arc<Device>> {
        self.devices.get(id)
    }

    /// Case-insensitive lookup: an exact name wins, otherwise a unique
    /// substring match.
    pub fn find_device_by_name(&self, name: &str) -> Result<Arc<Device>, CoreError> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return Err(CoreError::validation("device name is empty"));
        }
        let devices = self.devices.snapshot();

        if let Some(exact) = devices.iter().find(|d| d.name.to_lowercase() == needle) {
            return Ok(Arc::clone(exact));
        }

        let partial: Vec<&Arc<Device>> = devices
            .iter()
            .filter(|d| d.name.to_lowercase().contains(&needle))
            .collect();
        match partial.as_slice() {
            [only] => Ok(Arc::clone(only)),
            [] => Err(CoreError::DeviceNotFound {
                identifier: name.to_owned(),
            }),
            many => Err(CoreError::validation(format!(
                "'{name}' matches {} devices: {}",
                many.len(),
                many.iter().map(|d| d.name.as_str()).collect::<Vec<_>>().join(", ")
            ))),
        }
    }

    pub fn rooms(&self) -> Snapshot<Room> {
        self.rooms.snapshot()
    }

    pub fn room(&self, id: &str) -> Option<Arc<Room>> {
        self.rooms.get(id)
    }

    pub fn automations(&self) -> Snapshot<Automation> {
        self.automations.snapshot()
    }

    pub fn automation(&self, id: &str) -> Option<Arc<Automation>> {
        self.automations.get(id)
    }

    pub fn watch_devices(&self) -> watch::Receiver<Snapshot<Device>> {
        self.devices.subscribe()
    }

    pub fn watch_rooms(&self) -> watch::Receiver<Snapshot<Room>> {
        self.rooms.subscribe()
    }

    pub fn watch_automations(&self) -> watch::Receiver<Snapshot<Automation>> {
        self.automations.subscribe()
    }

    /// When the last successful device fetch was applied.
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        *self.last_sync.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending_counts().contains_key(id)
    }

    // ── Bulk writes ──────────────────────────────────────────────

    /// Replace the device set with a fresh fetch and publish
    /// `DevicesReplaced`.
    ///
    /// Returns devices whose power state differs from the previous
    /// authoritative copy and which have no optimistic mutation in flight:
    /// changes made outside this client.
    pub fn replace_all(&self, devices: Vec<Device>) -> Vec<Arc<Device>> {
        let _emit = self.emit_lock();
        self.replace_devices_locked(devices)
    }

    /// `replace_all`, applied only if `still_current` holds once the emit
    /// lock is taken. Returns `None` when the fetch was discarded.
    pub fn replace_all_if(
        &self,
        devices: Vec<Device>,
        still_current: impl FnOnce() -> bool,
    ) -> Option<Vec<Arc<Device>>> {
        let _emit = self.emit_lock();
        still_current().then(|| self.replace_devices_locked(devices))
    }

    pub fn replace_rooms(&self, rooms: Vec<Room>) {
        self.rooms.replace_all(rooms);
    }

    pub fn replace_rooms_if(
        &self,
        rooms: Vec<Room>,
        still_current: impl FnOnce() -> bool,
    ) -> bool {
        let _emit = self.emit_lock();
        if !still_current() {
            return false;
        }
        self.rooms.replace_all(rooms);
        true
    }

    pub fn replace_automations(&self, automations: Vec<Automation>) {
        self.automations.replace_all(automations);
    }

    pub fn replace_automations_if(
        &self,
        automations: Vec<Automation>,
        still_current: impl FnOnce() -> bool,
    ) -> bool {
        let _emit = self.emit_lock();
        if !still_current() {
            return false;
        }
        self.automations.replace_all(automations);
        true
    }

    fn replace_devices_locked(&self, devices: Vec<Device>) -> Vec<Arc<Device>> {
        let previous = self.devices.replace_all(devices);
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.last_sync.write().unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());

        let snapshot = self.devices.snapshot();
        let external = {
            let pending = self.pending_counts();
            snapshot
                .iter()
                .filter(|d| !pending.contains_key(&d.id))
                .filter(|d| previous.get(&d.id).is_some_and(|old| old.is_on != d.is_on))
                .cloned()
                .collect()
        };

        debug!(count = snapshot.len(), "device set replaced");
        self.bus.publish(&RegistryEvent::DevicesReplaced(snapshot));
        external
    }

    /// Apply hub-confirmed device states (e.g. a bulk lights toggle),
    /// publishing `DeviceChanged` for each device that actually changed.
    pub fn merge_devices(&self, devices: Vec<Device>) -> Vec<Arc<Device>> {
        let _emit = self.emit_lock();
        let mut changed = Vec::new();
        for device in devices {
            if self.devices.get(&device.id).as_deref() == Some(&device) {
                continue;
            }
            let stored = self.devices.upsert(device);
            self.bus
                .publish(&RegistryEvent::DeviceChanged(Arc::clone(&stored)));
            changed.push(stored);
        }
        changed
    }

    /// Drop everything (logout).
    pub fn clear(&self) {
        let _emit = self.emit_lock();
        self.devices.clear();
        self.rooms.clear();
        self.automations.clear();
        self.pending_counts().clear();
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.last_sync.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.bus
            .publish(&RegistryEvent::DevicesReplaced(self.devices.snapshot()));
    }

    // ── Optimistic mutations ─────────────────────────────────────

    /// Patch device `id` locally before the hub confirms, publishing
    /// `DeviceChanged` for that device only.
    pub fn apply_optimistic(&self, id: &str, patch: DevicePatch) -> Result<Pending, CoreError> {
        let _emit = self.emit_lock();
        let current = self.devices.get(id).ok_or_else(|| CoreError::DeviceNotFound {
            identifier: id.to_owned(),
        })?;
        if patch.temperature.is_some() && !current.is_thermostat() {
            return Err(CoreError::validation(format!(
                "{} is not a thermostat",
                current.name
            )));
        }
        if let Some(room_id) = &patch.room_id {
            if self.rooms.get(room_id).is_none() {
                return Err(CoreError::RoomNotFound {
                    identifier: room_id.clone(),
                });
            }
        }

        let (previous, updated) = self
            .devices
            .modify(id, |device| patch.apply(device))
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: id.to_owned(),
            })?;
        *self.pending_counts().entry(id.to_owned()).or_insert(0) += 1;

        self.bus.publish(&RegistryEvent::DeviceChanged(updated));
        Ok(Pending {
            id: id.to_owned(),
            patch,
            previous,
            generation: self.generation.load(Ordering::SeqCst),
        })
    }

    /// Settle a pending mutation after the hub accepted it.
    ///
    /// A no-op when a poll has replaced the device set since the patch
    /// was applied (the fetched state is at least as new). Otherwise the
    /// hub's copy of the device, if it returned one, becomes authoritative.
    pub fn commit(&self, pending: Pending, confirmed: Option<Device>) -> Option<Arc<Device>> {
        let _emit = self.emit_lock();
        self.release(&pending.id);
        if self.generation.load(Ordering::SeqCst) != pending.generation {
            debug!(device_id = %pending.id, "poll superseded optimistic change; commit skipped");
            return None;
        }

        let confirmed = confirmed.filter(|d| d.id == pending.id)?;
        if self.devices.get(&pending.id).as_deref() == Some(&confirmed) {
            return None;
        }
        let stored = self.devices.upsert(confirmed);
        self.bus
            .publish(&RegistryEvent::DeviceChanged(Arc::clone(&stored)));
        Some(stored)
    }

    /// Undo a pending mutation after the hub refused it, restoring the
    /// patched fields from the pre-patch snapshot and publishing
    /// `DeviceChanged`.
    ///
    /// A no-op when a poll has replaced the device set since the patch
    /// was applied, or the device no longer exists.
    pub fn rollback(&self, pending: Pending) -> Option<Arc<Device>> {
        let _emit = self.emit_lock();
        self.release(&pending.id);
        if self.generation.load(Ordering::SeqCst) != pending.generation {
            debug!(device_id = %pending.id, "poll superseded optimistic change; rollback skipped");
            return None;
        }

        let (_, restored) = self.devices.modify(&pending.id, |device| {
            pending.patch.revert(device, &pending.previous);
        })?;
        self.bus
            .publish(&RegistryEvent::DeviceChanged(Arc::clone(&restored)));
        Some(restored)
    }

    // ── Private helpers ──────────────────────────────────────────

    fn emit_lock(&self) -> MutexGuard<'_, ()> {
        self.emit.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending_counts(&self) -> MutexGuard<'_, HashMap<String, usize>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, id: &str) {
        let mut pending = self.pending_counts();
        if let Some(count) = pending.get_mut(id) {
            *count -= 1;
            if *count == 0 {
                pending.remove(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::model::DeviceKind;
    use pretty_assertions::assert_eq;

    fn light(id: &str, name: &str, is_on: bool) -> Device {
        Device {
            id: id.into(),
            name: name.into(),
            kind: DeviceKind::Light,
            room_id: None,
            is_on,
            temperature: None,
            is_external: false,
            external_ref: None,
        }
    }

    /// Collect the power state carried by every `DeviceChanged` event.
    fn watch_changes(registry: &Registry) -> (Arc<Mutex<Vec<bool>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = registry.subscribe(EventKind::DeviceChanged, move |event| {
            if let RegistryEvent::DeviceChanged(device) = event {
                sink.lock().unwrap().push(device.is_on);
            }
        });
        (seen, sub)
    }

    fn lamp_registry() -> Registry {
        let registry = Registry::new();
        registry.replace_all(vec![light("1", "Desk Lamp", false)]);
        registry
    }

    #[test]
    fn optimistic_patch_is_visible_and_rollback_restores_it() {
        let registry = lamp_registry();
        let (seen, _sub) = watch_changes(&registry);

        let pending = registry.apply_optimistic("1", DevicePatch::power(true)).unwrap();
        assert!(registry.list()[0].is_on);
        assert_eq!(*seen.lock().unwrap(), vec![true]);

        let restored = registry.rollback(pending).unwrap();
        assert!(!restored.is_on);
        assert!(!registry.list()[0].is_on);
        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
        assert!(!registry.is_pending("1"));
    }

    #[test]
    fn commit_after_a_poll_is_a_no_op() {
        let registry = lamp_registry();
        let pending = registry.apply_optimistic("1", DevicePatch::power(true)).unwrap();
        registry.replace_all(vec![light("1", "Desk Lamp", false)]);

        let (seen, _sub) = watch_changes(&registry);
        let committed = registry.commit(pending, Some(light("1", "Desk Lamp", true)));

        assert!(committed.is_none());
        assert!(seen.lock().unwrap().is_empty());
        assert!(!registry.list()[0].is_on);
        assert!(!registry.is_pending("1"));
    }

    #[test]
    fn rollback_after_a_poll_keeps_the_fetched_state() {
        let registry = lamp_registry();
        let pending = registry.apply_optimistic("1", DevicePatch::power(true)).unwrap();
        registry.replace_all(vec![light("1", "Desk Lamp", true)]);

        let (seen, _sub) = watch_changes(&registry);
        assert!(registry.rollback(pending).is_none());

        assert!(seen.lock().unwrap().is_empty());
        assert!(registry.list()[0].is_on);
    }

    #[test]
    fn devices_with_pending_changes_are_not_reported_as_external() {
        let registry = Registry::new();
        registry.replace_all(vec![light("1", "Desk Lamp", false), light("2", "Porch", false)]);
        let _pending = registry.apply_optimistic("1", DevicePatch::power(true)).unwrap();

        let external =
            registry.replace_all(vec![light("1", "Desk Lamp", true), light("2", "Porch", true)]);

        let names: Vec<&str> = external.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Porch"]);
    }

    #[test]
    fn conditional_replace_is_dropped_when_no_longer_current() {
        let registry = lamp_registry();
        let before = registry.last_sync();

        let applied = registry.replace_all_if(vec![light("1", "Desk Lamp", true)], || false);
        assert!(applied.is_none());
        assert!(!registry.list()[0].is_on);
        assert_eq!(registry.last_sync(), before);

        assert!(!registry.replace_rooms_if(
            vec![Room {
                id: "r1".into(),
                name: "Office".into(),
            }],
            || false,
        ));
        assert!(registry.rooms().is_empty());
    }
}
