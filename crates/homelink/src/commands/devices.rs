//! Device command handlers.

use std::sync::Arc;

use tabled::Tabled;

use homelink_core::{Command as CoreCommand, CommandResult, Device, Hub, NewDevice};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Room")]
    room: String,
    #[tabled(rename = "Power")]
    power: String,
    #[tabled(rename = "Temp")]
    temperature: String,
}

fn device_row(hub: &Hub, d: &Arc<Device>, color: bool) -> DeviceRow {
    DeviceRow {
        id: d.id.clone(),
        name: d.name.clone(),
        kind: d.kind.to_string(),
        room: room_name(hub, d),
        power: output::power_label(d.is_on, color),
        temperature: d
            .temperature
            .map(|t| format!("{t}°F"))
            .unwrap_or_default(),
    }
}

fn room_name(hub: &Hub, d: &Device) -> String {
    d.room_id
        .as_deref()
        .map(|id| hub.registry().room(id).map_or_else(|| id.to_owned(), |r| r.name.clone()))
        .unwrap_or_default()
}

fn detail(hub: &Hub, d: &Arc<Device>) -> String {
    let mut lines = vec![
        format!("ID:    {}", d.id),
        format!("Name:  {}", d.name),
        format!("Type:  {}", d.kind),
        format!("Room:  {}", room_name(hub, d)),
        format!("Power: {}", if d.is_on { "on" } else { "off" }),
    ];
    if let Some(t) = d.temperature {
        lines.push(format!("Temp:  {t}°F"));
    }
    if d.is_external {
        lines.push(format!(
            "Bridged: {}",
            d.external_ref.as_deref().unwrap_or("yes")
        ));
    }
    lines.join("\n")
}

fn show_device(hub: &Hub, device: &Arc<Device>, global: &GlobalOpts) {
    let out = output::render_single(global.output, device, |d| detail(hub, d), |d| d.id.clone());
    output::print_output(&out, global.quiet);
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(hub: &Hub, args: DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    util::load_devices(hub).await?;
    let color = output::should_color(global.color);

    match args.command {
        DevicesCommand::List { room } => {
            let devices: Vec<Arc<Device>> = match room {
                Some(room) => {
                    let room = util::resolve_room(hub, &room)?;
                    hub.registry().by_room(&room.id)
                }
                None => hub.registry().list().iter().cloned().collect(),
            };
            let out = output::render_list(
                global.output,
                &devices,
                |d| device_row(hub, d, color),
                |d| d.id.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Get { device } => {
            let device = util::resolve_device(hub, &device)?;
            show_device(hub, &device, global);
            Ok(())
        }

        DevicesCommand::Toggle { device } => {
            let target = util::resolve_device(hub, &device)?;
            let result = hub
                .execute(CoreCommand::ToggleDevice {
                    id: target.id.clone(),
                })
                .await?;
            if let CommandResult::Device(updated) = result {
                output::status(
                    &format!(
                        "{} is now {}",
                        updated.name,
                        if updated.is_on { "on" } else { "off" }
                    ),
                    global.quiet,
                );
            }
            Ok(())
        }

        DevicesCommand::Temperature { device, value } => {
            let target = util::resolve_device(hub, &device)?;
            hub.execute(CoreCommand::SetTemperature {
                id: target.id.clone(),
                value,
            })
            .await?;
            output::status(
                &format!("{} set to {value}°F", target.name),
                global.quiet,
            );
            Ok(())
        }

        DevicesCommand::Lights { state } => {
            let result = hub
                .execute(CoreCommand::ToggleAllLights { on: state.is_on() })
                .await?;
            if let CommandResult::Devices(lights) = result {
                let out = output::render_list(
                    global.output,
                    &lights,
                    |d| device_row(hub, d, color),
                    |d| d.id.clone(),
                );
                output::print_output(&out, global.quiet);
            }
            Ok(())
        }

        DevicesCommand::Add {
            name,
            kind,
            room,
            attributes,
        } => {
            let mut new = NewDevice::new(name.clone(), kind.into());
            if let Some(room) = room {
                new = new.in_room(util::resolve_room(hub, &room)?.id.clone());
            }
            if let Some(path) = attributes {
                new.attributes = util::read_json_file("attributes", &path)?;
            }
            hub.execute(CoreCommand::AddDevice(new)).await?;
            output::status(&format!("Added {name}"), global.quiet);
            Ok(())
        }

        DevicesCommand::Remove { device } => {
            let target = util::resolve_device(hub, &device)?;
            if !util::confirm(&format!("Remove device {}?", target.name), global.yes)? {
                return Ok(());
            }
            hub.execute(CoreCommand::RemoveDevice {
                id: target.id.clone(),
            })
            .await?;
            output::status(&format!("Removed {}", target.name), global.quiet);
            Ok(())
        }
    }
}
