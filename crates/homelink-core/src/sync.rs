// ── Synchronizer ──
//
// Keeps the registry fresh under an adaptive polling regime. Three tier
// timers tick independently at fixed cadences; each tick polls only if
// the time since the last user action falls in that tier's band. The
// timers are never re-created, so cadence does not drift.
//
//   since last action   tier     cadence
//   < 3 s               burst    500 ms
//   3 s .. 30 s         active   5 s
//   >= 30 s             idle     30 s

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use homelink_api::endpoints;
use homelink_api::models::{AutomationResponse, DeviceResponse, RoomResponse};

use crate::config::PollConfig;
use crate::error::{AuthFailure, CoreError};
use crate::model::{Automation, Device, Room};
use crate::pipeline::RequestPipeline;
use crate::session::SessionManager;
use crate::store::{ActivityLog, Registry};

// ── PollTier ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum PollTier {
    Burst,
    Active,
    Idle,
}

impl PollTier {
    pub const ALL: [Self; 3] = [Self::Burst, Self::Active, Self::Idle];

    pub fn interval(self, poll: &PollConfig) -> Duration {
        match self {
            Self::Burst => poll.burst_interval,
            Self::Active => poll.active_interval,
            Self::Idle => poll.idle_interval,
        }
    }

    /// Whether `elapsed` since the last user action lies in this band.
    pub fn covers(self, elapsed: Duration, poll: &PollConfig) -> bool {
        match self {
            Self::Burst => elapsed < poll.burst_window,
            Self::Active => elapsed >= poll.burst_window && elapsed < poll.active_window,
            Self::Idle => elapsed >= poll.active_window,
        }
    }

    pub fn for_elapsed(elapsed: Duration, poll: &PollConfig) -> Self {
        Self::ALL
            .into_iter()
            .find(|tier| tier.covers(elapsed, poll))
            .unwrap_or(Self::Idle)
    }
}

/// Which fetches of one poll succeeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct PollReport {
    pub devices: bool,
    pub rooms: bool,
    pub automations: bool,
}

// ── Synchronizer ─────────────────────────────────────────────────

/// Background poller feeding the registry. Cheaply cloneable.
#[derive(Clone)]
pub struct Synchronizer {
    inner: Arc<SyncInner>,
}

struct SyncInner {
    pipeline: RequestPipeline,
    registry: Arc<Registry>,
    activity: Arc<ActivityLog>,
    poll: PollConfig,
    last_user_action: Mutex<Instant>,
    /// Held for the duration of a poll; a tick that finds it taken skips.
    poll_lock: tokio::sync::Mutex<()>,
    polls: AtomicU64,
}

impl Synchronizer {
    /// The last-action clock starts at construction, so a fresh
    /// synchronizer begins in the burst tier.
    pub fn new(
        pipeline: RequestPipeline,
        registry: Arc<Registry>,
        activity: Arc<ActivityLog>,
        poll: PollConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                pipeline,
                registry,
                activity,
                poll,
                last_user_action: Mutex::new(Instant::now()),
                poll_lock: tokio::sync::Mutex::new(()),
                polls: AtomicU64::new(0),
            }),
        }
    }

    /// Record a user-initiated mutation. This is the only input to the
    /// polling cadence.
    pub fn note_user_action(&self) {
        *self
            .inner
            .last_user_action
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    pub fn since_last_action(&self) -> Duration {
        self.inner
            .last_user_action
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    pub fn current_tier(&self) -> PollTier {
        PollTier::for_elapsed(self.since_last_action(), &self.inner.poll)
    }

    /// Number of polls performed so far.
    pub fn poll_count(&self) -> u64 {
        self.inner.polls.load(Ordering::Relaxed)
    }

    /// Spawn the three tier timers. They stop when `cancel` fires.
    pub fn spawn(&self, cancel: &CancellationToken) -> Vec<JoinHandle<()>> {
        PollTier::ALL
            .into_iter()
            .map(|tier| tokio::spawn(tier_task(self.clone(), tier, cancel.clone())))
            .collect()
    }

    /// Handle one tick of `tier`'s timer. Returns whether a poll ran.
    pub async fn on_tick(&self, tier: PollTier) -> bool {
        let elapsed = self.since_last_action();
        if !tier.covers(elapsed, &self.inner.poll) {
            trace!(%tier, ?elapsed, "tick outside band");
            return false;
        }
        if !self.session().has_session() {
            trace!(%tier, "no session; skipping poll");
            return false;
        }
        let Ok(_guard) = self.inner.poll_lock.try_lock() else {
            debug!(%tier, "previous poll still running; skipping");
            return false;
        };

        debug!(%tier, "polling hub");
        self.poll_unlocked().await;
        true
    }

    /// Fetch devices, rooms and automations, in that order. Each fetch is
    /// independent; a failure is logged and leaves that part of the
    /// registry as it was.
    pub async fn poll(&self) -> PollReport {
        let _guard = self.inner.poll_lock.lock().await;
        self.poll_unlocked().await
    }

    async fn poll_unlocked(&self) -> PollReport {
        self.inner.polls.fetch_add(1, Ordering::Relaxed);
        let mut report = PollReport::default();

        match self.refresh_devices().await {
            Ok(()) => report.devices = true,
            Err(e) => warn!(error = %e, "device fetch failed; keeping previous devices"),
        }
        match self.refresh_rooms().await {
            Ok(()) => report.rooms = true,
            Err(e) => warn!(error = %e, "room fetch failed; keeping previous rooms"),
        }
        match self.refresh_automations().await {
            Ok(()) => report.automations = true,
            Err(e) => warn!(error = %e, "automation fetch failed; keeping previous automations"),
        }
        report
    }

    /// Fetch devices and replace the registry's set. Power changes made
    /// outside this client are written to the activity log.
    ///
    /// A fetch that returns after the session it started under has ended
    /// is discarded.
    pub async fn refresh_devices(&self) -> Result<(), CoreError> {
        let generation = self.session().generation();
        let raw: Vec<DeviceResponse> = self.inner.pipeline.send(&endpoints::list_devices()).await?;
        let devices: Vec<Device> = raw.into_iter().map(Device::from).collect();

        let external = self
            .inner
            .registry
            .replace_all_if(devices, || self.session().is_current(generation))
            .ok_or_else(|| session_ended("devices"))?;

        for device in external {
            if !self.session().is_current(generation) {
                break;
            }
            debug!(device_id = %device.id, is_on = device.is_on, "external change observed");
            self.inner
                .activity
                .record(device.name.clone(), power_action(device.is_on));
        }
        Ok(())
    }

    pub async fn refresh_rooms(&self) -> Result<(), CoreError> {
        let generation = self.session().generation();
        let raw: Vec<RoomResponse> = self.inner.pipeline.send(&endpoints::list_rooms()).await?;
        let applied = self.inner.registry.replace_rooms_if(
            raw.into_iter().map(Room::from).collect(),
            || self.session().is_current(generation),
        );
        if applied { Ok(()) } else { Err(session_ended("rooms")) }
    }

    pub async fn refresh_automations(&self) -> Result<(), CoreError> {
        let generation = self.session().generation();
        let raw: Vec<AutomationResponse> = self
            .inner
            .pipeline
            .send(&endpoints::list_automations())
            .await?;
        let applied = self.inner.registry.replace_automations_if(
            raw.into_iter().map(Automation::from).collect(),
            || self.session().is_current(generation),
        );
        if applied { Ok(()) } else { Err(session_ended("automations")) }
    }

    fn session(&self) -> &SessionManager {
        self.inner.pipeline.session()
    }
}

fn session_ended(what: &str) -> CoreError {
    debug!(what, "session ended during fetch; result discarded");
    CoreError::auth(
        AuthFailure::NotAuthenticated,
        format!("session ended before {what} could be applied"),
    )
}

pub(crate) fn power_action(is_on: bool) -> &'static str {
    if is_on { "turned on" } else { "turned off" }
}

async fn tier_task(sync: Synchronizer, tier: PollTier, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(tier.interval(&sync.inner.poll));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                sync.on_tick(tier).await;
            }
        }
    }
    debug!(%tier, "poll timer stopped");
}
