//! Shared helpers for command handlers.

use std::path::Path;
use std::sync::Arc;

use secrecy::SecretString;

use homelink_core::{Automation, CoreError, Device, Hub, Room};

use crate::error::CliError;

pub fn require_session(hub: &Hub) -> Result<(), CliError> {
    if hub.session().has_session() {
        Ok(())
    } else {
        Err(CliError::NotSignedIn)
    }
}

/// Fill the registry with devices and rooms for a one-shot command.
pub async fn load_devices(hub: &Hub) -> Result<(), CliError> {
    require_session(hub)?;
    hub.synchronizer().refresh_devices().await?;
    hub.synchronizer().refresh_rooms().await?;
    Ok(())
}

pub async fn load_rooms(hub: &Hub) -> Result<(), CliError> {
    require_session(hub)?;
    hub.synchronizer().refresh_rooms().await?;
    Ok(())
}

pub async fn load_automations(hub: &Hub) -> Result<(), CliError> {
    require_session(hub)?;
    hub.synchronizer().refresh_automations().await?;
    Ok(())
}

/// Resolve a device by id, then by name.
pub fn resolve_device(hub: &Hub, identifier: &str) -> Result<Arc<Device>, CliError> {
    if let Some(device) = hub.registry().device(identifier) {
        return Ok(device);
    }
    Ok(hub.registry().find_device_by_name(identifier)?)
}

/// Resolve a room by id, then by exact (case-insensitive) name.
pub fn resolve_room(hub: &Hub, identifier: &str) -> Result<Arc<Room>, CliError> {
    if let Some(room) = hub.registry().room(identifier) {
        return Ok(room);
    }
    hub.registry()
        .rooms()
        .iter()
        .find(|r| r.name.eq_ignore_ascii_case(identifier))
        .cloned()
        .ok_or_else(|| {
            CoreError::RoomNotFound {
                identifier: identifier.into(),
            }
            .into()
        })
}

pub fn resolve_automation(hub: &Hub, identifier: &str) -> Result<Arc<Automation>, CliError> {
    if let Some(automation) = hub.registry().automation(identifier) {
        return Ok(automation);
    }
    hub.registry()
        .automations()
        .iter()
        .find(|a| a.name.eq_ignore_ascii_case(identifier))
        .cloned()
        .ok_or_else(|| {
            CoreError::AutomationNotFound {
                identifier: identifier.into(),
            }
            .into()
        })
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(CliError::prompt)
}

/// Use `provided`, else prompt without echo.
pub fn password(provided: Option<String>, prompt: &str) -> Result<SecretString, CliError> {
    let raw = match provided {
        Some(value) => value,
        None => rpassword::prompt_password(prompt).map_err(CliError::prompt)?,
    };
    Ok(SecretString::from(raw))
}

pub fn parse_json(field: &str, text: &str) -> Result<serde_json::Value, CliError> {
    serde_json::from_str(text).map_err(|e| CliError::Validation {
        field: field.into(),
        reason: format!("invalid JSON: {e}"),
    })
}

pub fn read_json_file(field: &str, path: &Path) -> Result<serde_json::Value, CliError> {
    let contents = std::fs::read_to_string(path)?;
    parse_json(field, &contents)
}
