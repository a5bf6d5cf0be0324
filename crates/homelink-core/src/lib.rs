//! Session, synchronization and device-state layer between `homelink-api`
//! and UI consumers (CLI, voice shells).
//!
//! - **[`Hub`]** is the facade: it owns the session, the request pipeline,
//!   the device [`Registry`] and the [`ActivityLog`], and routes typed
//!   [`Command`]s. [`Hub::start()`] spawns the adaptive poll timers.
//!
//! - **[`SessionManager`]** runs login, registration, logout and profile
//!   operations, persists credentials through a [`CredentialStore`] and
//!   performs single-flight token refresh.
//!
//! - **[`RequestPipeline`]** attaches the bearer token to every request,
//!   refreshes proactively when the token is near expiry and retries once
//!   after a 401.
//!
//! - **[`Registry`]** holds devices, rooms and automations as `watch`
//!   snapshots, applies optimistic patches with commit/rollback and
//!   publishes [`RegistryEvent`]s on its [`EventBus`].
//!
//! - **[`Synchronizer`]** polls on burst, active and idle tiers chosen by
//!   time since the last user action.

pub mod command;
pub mod config;
pub(crate) mod convert;
pub mod credentials;
pub mod error;
pub mod hub;
pub mod model;
pub mod pipeline;
pub mod session;
pub mod store;
pub mod sync;
pub mod token;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandResult, NewAutomation, NewDevice};
pub use config::{HubConfig, PollConfig, TlsVerification};
pub use credentials::{CredentialStore, MemoryCredentialStore};
pub use error::{AuthFailure, CoreError};
pub use hub::Hub;
pub use pipeline::RequestPipeline;
pub use session::{SessionManager, SessionState};
pub use store::{ActivityLog, EventBus, EventKind, Registry, RegistryEvent, Subscription};
pub use sync::{PollReport, PollTier, Synchronizer};

pub use model::{
    ActivityEntry, Automation, AutomationKind, Device, DeviceKind, DevicePatch, Room, UserProfile,
};

// Request payloads consumers build directly.
pub use homelink_api::models::{ProfileUpdate, Registration};
