// ── Hub facade ──
//
// One `Hub` per signed-in application session. It owns the session
// manager, request pipeline, registry (with its event bus), activity log
// and synchronizer, and routes typed `Command`s to the hub API.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use secrecy::SecretString;
use serde::de::IgnoredAny;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use homelink_api::models::{
    AutomationCreate, DeviceCreate, DeviceResponse, Registration, RoomUpsert,
};
use homelink_api::{HubClient, endpoints};

use crate::command::{Command, CommandResult, NewAutomation, NewDevice};
use crate::config::HubConfig;
use crate::credentials::CredentialStore;
use crate::error::CoreError;
use crate::model::{Automation, Device, DevicePatch, UserProfile};
use crate::pipeline::RequestPipeline;
use crate::session::{SessionManager, SessionState};
use crate::store::{ActivityLog, Registry};
use crate::sync::{PollReport, Synchronizer, power_action};

/// Activity entries for automation changes are attributed to this name.
const AUTOMATION_ACTOR: &str = "Automation";

/// The main entry point for consumers. Cheaply cloneable.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

struct HubInner {
    config: HubConfig,
    session: SessionManager,
    pipeline: RequestPipeline,
    registry: Arc<Registry>,
    activity: Arc<ActivityLog>,
    sync: Synchronizer,
    cancel: Mutex<Option<CancellationToken>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl HubInner {
    fn clear_local_state(&self) {
        self.registry.clear();
        self.activity.clear();
    }
}

// Background tasks hold no strong reference to the hub, so dropping the
// last `Hub` without `stop()` still ends them.
impl Drop for HubInner {
    fn drop(&mut self) {
        let cancel = self
            .cancel
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
    }
}

impl Hub {
    /// Build a hub for `config`, restoring any session held by `store`.
    /// Does not start polling; call [`start()`](Self::start).
    pub fn new(config: HubConfig, store: Arc<dyn CredentialStore>) -> Result<Self, CoreError> {
        let client = HubClient::new(config.api_url.clone(), &config.transport())?;
        Ok(Self::with_client(config, client, store))
    }

    /// Build a hub around a pre-built client.
    pub fn with_client(
        config: HubConfig,
        client: HubClient,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        let session = SessionManager::new(client, store, &config);
        let pipeline = session.pipeline();
        let registry = Arc::new(Registry::new());
        let activity = Arc::new(ActivityLog::new(config.activity_capacity));
        let sync = Synchronizer::new(
            pipeline.clone(),
            Arc::clone(&registry),
            Arc::clone(&activity),
            config.poll.clone(),
        );

        Self {
            inner: Arc::new(HubInner {
                config,
                session,
                pipeline,
                registry,
                activity,
                sync,
                cancel: Mutex::new(None),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    pub fn session(&self) -> &SessionManager {
        &self.inner.session
    }

    pub fn pipeline(&self) -> &RequestPipeline {
        &self.inner.pipeline
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    pub fn activity(&self) -> &Arc<ActivityLog> {
        &self.inner.activity
    }

    pub fn synchronizer(&self) -> &Synchronizer {
        &self.inner.sync
    }

    // ── Session ──────────────────────────────────────────────────

    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<UserProfile, CoreError> {
        self.inner.session.login(username, password).await
    }

    pub async fn register(&self, registration: &Registration) -> Result<UserProfile, CoreError> {
        self.inner.session.register(registration).await
    }

    /// End the session and drop all synchronized state.
    pub fn logout(&self) {
        self.inner.session.logout();
        self.inner.clear_local_state();
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Spawn the poll timers and a watcher that drops local state when
    /// the session ends (e.g. a rejected refresh). Idempotent.
    pub fn start(&self) {
        let mut cancel_slot = self.inner.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        if cancel_slot.is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        let mut handles = self.inner.sync.spawn(&cancel);
        handles.push(tokio::spawn(session_watch_task(
            Arc::downgrade(&self.inner),
            self.inner.session.subscribe_state(),
            cancel.clone(),
        )));

        *cancel_slot = Some(cancel);
        self.inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(handles);
        info!("synchronizer started");
    }

    /// Cancel background tasks and wait for them to finish.
    pub async fn stop(&self) {
        let cancel = self
            .inner
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(cancel) = cancel else {
            return;
        };
        cancel.cancel();

        let handles: Vec<JoinHandle<()>> = self
            .inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        info!("synchronizer stopped");
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Run one full poll now, regardless of tier.
    pub async fn refresh_all(&self) -> PollReport {
        self.inner.sync.poll().await
    }

    // ── Commands ─────────────────────────────────────────────────

    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        if cmd.is_user_action() {
            self.inner.sync.note_user_action();
        }
        debug!(?cmd, "executing command");

        match cmd {
            Command::ToggleDevice { id } => self.toggle_device(&id).await.map(CommandResult::Device),
            Command::SetTemperature { id, value } => self
                .set_temperature(&id, value)
                .await
                .map(CommandResult::Device),
            Command::ToggleAllLights { on } => self
                .toggle_all_lights(on)
                .await
                .map(CommandResult::Devices),
            Command::AddDevice(new) => self.add_device(&new).await.map(|()| CommandResult::Ok),
            Command::RemoveDevice { id } => {
                self.remove_device(&id).await.map(|()| CommandResult::Ok)
            }
            Command::AddRoom { name } => self.add_room(&name).await.map(|()| CommandResult::Ok),
            Command::EditRoom { id, name } => {
                self.edit_room(&id, &name).await.map(|()| CommandResult::Ok)
            }
            Command::RemoveRoom { id } => self.remove_room(&id).await.map(|()| CommandResult::Ok),
            Command::AddAutomation(new) => {
                self.add_automation(&new).await.map(|()| CommandResult::Ok)
            }
            Command::RemoveAutomation { id } => {
                self.remove_automation(&id).await.map(|()| CommandResult::Ok)
            }
            Command::ToggleAutomation { id } => self
                .toggle_automation(&id)
                .await
                .map(CommandResult::Automation),
        }
    }

    /// Toggle the device whose name matches `name` (case-insensitive exact
    /// match first, then a unique substring).
    pub async fn toggle_device_by_name(&self, name: &str) -> Result<Arc<Device>, CoreError> {
        let device = self.inner.registry.find_device_by_name(name)?;
        match self
            .execute(Command::ToggleDevice {
                id: device.id.clone(),
            })
            .await?
        {
            CommandResult::Device(device) => Ok(device),
            _ => Ok(device),
        }
    }

    // ── Device operations ────────────────────────────────────────

    async fn toggle_device(&self, id: &str) -> Result<Arc<Device>, CoreError> {
        let generation = self.inner.session.generation();
        let registry = &self.inner.registry;
        let current = registry.device(id).ok_or_else(|| missing_device(id))?;
        let pending = registry.apply_optimistic(id, DevicePatch::power(!current.is_on))?;

        match self
            .inner
            .pipeline
            .send::<DeviceResponse>(&endpoints::toggle_device(id))
            .await
        {
            Ok(raw) => {
                let confirmed = Device::from(raw);
                self.record_activity(
                    generation,
                    confirmed.name.clone(),
                    power_action(confirmed.is_on),
                );
                registry.commit(pending, Some(confirmed.clone()));
                Ok(Arc::new(confirmed))
            }
            Err(e) => {
                registry.rollback(pending);
                Err(e.or_not_found(|| missing_device(id)))
            }
        }
    }

    async fn set_temperature(&self, id: &str, value: f64) -> Result<Arc<Device>, CoreError> {
        let generation = self.inner.session.generation();
        if !value.is_finite() {
            return Err(CoreError::validation("temperature must be a finite number"));
        }
        let registry = &self.inner.registry;
        let pending = registry.apply_optimistic(id, DevicePatch::temperature(value))?;

        match self
            .inner
            .pipeline
            .send::<DeviceResponse>(&endpoints::set_temperature(id, value))
            .await
        {
            Ok(raw) => {
                let confirmed = Device::from(raw);
                self.record_activity(
                    generation,
                    confirmed.name.clone(),
                    format!("temperature set to {value}°F"),
                );
                registry.commit(pending, Some(confirmed.clone()));
                Ok(Arc::new(confirmed))
            }
            Err(e) => {
                registry.rollback(pending);
                Err(e.or_not_found(|| missing_device(id)))
            }
        }
    }

    async fn toggle_all_lights(&self, on: bool) -> Result<Vec<Arc<Device>>, CoreError> {
        let generation = self.inner.session.generation();
        let raw: Vec<DeviceResponse> = self
            .inner
            .pipeline
            .send(&endpoints::toggle_all_lights(on))
            .await?;
        let lights: Vec<Device> = raw.into_iter().map(Device::from).collect();
        if self.inner.session.is_current(generation) {
            for light in &lights {
                self.record_activity(generation, light.name.clone(), power_action(on));
            }
            self.inner.registry.merge_devices(lights.clone());
        }
        Ok(lights.into_iter().map(Arc::new).collect())
    }

    async fn add_device(&self, new: &NewDevice) -> Result<(), CoreError> {
        let generation = self.inner.session.generation();
        if new.name.trim().is_empty() {
            return Err(CoreError::validation("device name is required"));
        }
        if let Some(room_id) = &new.room_id {
            if self.inner.registry.room(room_id).is_none() {
                return Err(CoreError::RoomNotFound {
                    identifier: room_id.clone(),
                });
            }
        }

        let _: IgnoredAny = self
            .inner
            .pipeline
            .send(&endpoints::create_device(&DeviceCreate::from(new)))
            .await?;
        self.refetch_devices().await;
        self.record_activity(generation, new.name.clone(), "added to system");
        Ok(())
    }

    async fn remove_device(&self, id: &str) -> Result<(), CoreError> {
        let generation = self.inner.session.generation();
        let known = self.inner.registry.device(id);
        let _: IgnoredAny = self
            .inner
            .pipeline
            .send(&endpoints::delete_device(id))
            .await
            .map_err(|e| e.or_not_found(|| missing_device(id)))?;
        self.refetch_devices().await;
        if let Some(device) = known {
            self.record_activity(generation, device.name.clone(), "removed from system");
        }
        Ok(())
    }

    // ── Room operations ──────────────────────────────────────────

    async fn add_room(&self, name: &str) -> Result<(), CoreError> {
        let room = room_payload(name)?;
        let _: IgnoredAny = self
            .inner
            .pipeline
            .send(&endpoints::create_room(&room))
            .await?;
        self.refetch_rooms().await;
        Ok(())
    }

    async fn edit_room(&self, id: &str, name: &str) -> Result<(), CoreError> {
        let room = room_payload(name)?;
        let _: IgnoredAny = self
            .inner
            .pipeline
            .send(&endpoints::update_room(id, &room))
            .await
            .map_err(|e| e.or_not_found(|| missing_room(id)))?;
        self.refetch_rooms().await;
        Ok(())
    }

    async fn remove_room(&self, id: &str) -> Result<(), CoreError> {
        let _: IgnoredAny = self
            .inner
            .pipeline
            .send(&endpoints::delete_room(id))
            .await
            .map_err(|e| e.or_not_found(|| missing_room(id)))?;
        self.refetch_rooms().await;
        Ok(())
    }

    // ── Automation operations ────────────────────────────────────

    async fn add_automation(&self, new: &NewAutomation) -> Result<(), CoreError> {
        let generation = self.inner.session.generation();
        if new.name.trim().is_empty() {
            return Err(CoreError::validation("automation name is required"));
        }
        let _: IgnoredAny = self
            .inner
            .pipeline
            .send(&endpoints::create_automation(&AutomationCreate::from(new)))
            .await?;
        self.refetch_automations().await;
        self.record_activity(generation, AUTOMATION_ACTOR, format!("Added \"{}\"", new.name));
        Ok(())
    }

    async fn remove_automation(&self, id: &str) -> Result<(), CoreError> {
        let generation = self.inner.session.generation();
        let known = self.inner.registry.automation(id);
        let _: IgnoredAny = self
            .inner
            .pipeline
            .send(&endpoints::delete_automation(id))
            .await
            .map_err(|e| e.or_not_found(|| missing_automation(id)))?;
        self.refetch_automations().await;
        if let Some(automation) = known {
            self.record_activity(
                generation,
                AUTOMATION_ACTOR,
                format!("Removed \"{}\"", automation.name),
            );
        }
        Ok(())
    }

    async fn toggle_automation(&self, id: &str) -> Result<Arc<Automation>, CoreError> {
        let generation = self.inner.session.generation();
        let before = self.inner.registry.automation(id);
        let _: IgnoredAny = self
            .inner
            .pipeline
            .send(&endpoints::toggle_automation(id))
            .await
            .map_err(|e| e.or_not_found(|| missing_automation(id)))?;
        self.refetch_automations().await;

        let after = self.inner.registry.automation(id).or_else(|| {
            before.as_ref().map(|a| {
                Arc::new(Automation {
                    enabled: !a.enabled,
                    ..Automation::clone(a)
                })
            })
        });
        let after = after.ok_or_else(|| missing_automation(id))?;
        let state = if after.enabled { "enabled" } else { "disabled" };
        self.record_activity(generation, AUTOMATION_ACTOR, format!("{} {state}", after.name));
        Ok(after)
    }

    /// Activity belongs to the session the action ran under; entries for
    /// a session that has since ended are dropped.
    fn record_activity(
        &self,
        generation: u64,
        actor: impl Into<String>,
        action: impl Into<String>,
    ) {
        if self.inner.session.is_current(generation) {
            self.inner.activity.record(actor, action);
        } else {
            debug!("session ended during command; activity not recorded");
        }
    }

    // ── Refetch helpers ──────────────────────────────────────────

    // A failed refetch after a successful write leaves the registry stale
    // until the next poll; the write itself still succeeded.

    async fn refetch_devices(&self) {
        if let Err(e) = self.inner.sync.refresh_devices().await {
            warn!(error = %e, "device refetch failed");
        }
    }

    async fn refetch_rooms(&self) {
        if let Err(e) = self.inner.sync.refresh_rooms().await {
            warn!(error = %e, "room refetch failed");
        }
    }

    async fn refetch_automations(&self) {
        if let Err(e) = self.inner.sync.refresh_automations().await {
            warn!(error = %e, "automation refetch failed");
        }
    }
}

fn room_payload(name: &str) -> Result<RoomUpsert, CoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CoreError::validation("room name is required"));
    }
    Ok(RoomUpsert {
        name: name.to_owned(),
    })
}

fn missing_device(id: &str) -> CoreError {
    CoreError::DeviceNotFound {
        identifier: id.to_owned(),
    }
}

fn missing_room(id: &str) -> CoreError {
    CoreError::RoomNotFound {
        identifier: id.to_owned(),
    }
}

fn missing_automation(id: &str) -> CoreError {
    CoreError::AutomationNotFound {
        identifier: id.to_owned(),
    }
}

/// Drop registry and activity state once the session ends underneath us.
async fn session_watch_task(
    hub: Weak<HubInner>,
    mut state: watch::Receiver<SessionState>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                if current != SessionState::Anonymous {
                    continue;
                }
                let Some(inner) = hub.upgrade() else {
                    break;
                };
                debug!("session ended; clearing synchronized state");
                inner.clear_local_state();
            }
        }
    }
}
