// ── Command API ──
//
// Every user-initiated write flows through `Command`. The hub routes each
// variant to its endpoint, applies optimistic registry changes where the
// operation has an obvious local effect, and records activity on success.

pub mod requests;

use std::sync::Arc;

pub use requests::{NewAutomation, NewDevice};

use crate::model::{Automation, Device};

/// All write operations against the hub.
#[derive(Debug, Clone)]
pub enum Command {
    // ── Device operations ────────────────────────────────────────────
    ToggleDevice { id: String },
    SetTemperature { id: String, value: f64 },
    ToggleAllLights { on: bool },
    AddDevice(NewDevice),
    RemoveDevice { id: String },

    // ── Room operations ──────────────────────────────────────────────
    AddRoom { name: String },
    EditRoom { id: String, name: String },
    RemoveRoom { id: String },

    // ── Automation operations ────────────────────────────────────────
    AddAutomation(NewAutomation),
    RemoveAutomation { id: String },
    ToggleAutomation { id: String },
}

impl Command {
    /// Whether the command counts as user activity for poll cadence.
    pub fn is_user_action(&self) -> bool {
        matches!(
            self,
            Self::ToggleDevice { .. }
                | Self::SetTemperature { .. }
                | Self::ToggleAllLights { .. }
                | Self::AddDevice(_)
                | Self::RemoveDevice { .. }
        )
    }
}

/// Result of a successfully executed command.
#[derive(Debug, Clone)]
pub enum CommandResult {
    Ok,
    Device(Arc<Device>),
    Devices(Vec<Arc<Device>>),
    Automation(Arc<Automation>),
}
