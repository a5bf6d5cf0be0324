//! Room command handlers.

use std::sync::Arc;

use tabled::Tabled;

use homelink_core::{Command as CoreCommand, Hub, Room};

use crate::cli::{GlobalOpts, RoomsArgs, RoomsCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct RoomRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Devices")]
    devices: usize,
}

pub async fn handle(hub: &Hub, args: RoomsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        RoomsCommand::List => {
            util::load_devices(hub).await?;
            let rooms: Vec<Arc<Room>> = hub.registry().rooms().iter().cloned().collect();
            let out = output::render_list(
                global.output,
                &rooms,
                |r| RoomRow {
                    id: r.id.clone(),
                    name: r.name.clone(),
                    devices: hub.registry().by_room(&r.id).len(),
                },
                |r| r.id.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        RoomsCommand::Add { name } => {
            util::require_session(hub)?;
            hub.execute(CoreCommand::AddRoom { name: name.clone() })
                .await?;
            output::status(&format!("Added room {}", name.trim()), global.quiet);
            Ok(())
        }

        RoomsCommand::Rename { room, name } => {
            util::load_rooms(hub).await?;
            let target = util::resolve_room(hub, &room)?;
            hub.execute(CoreCommand::EditRoom {
                id: target.id.clone(),
                name: name.clone(),
            })
            .await?;
            output::status(
                &format!("Renamed {} to {}", target.name, name.trim()),
                global.quiet,
            );
            Ok(())
        }

        RoomsCommand::Remove { room } => {
            util::load_rooms(hub).await?;
            let target = util::resolve_room(hub, &room)?;
            if !util::confirm(&format!("Remove room {}?", target.name), global.yes)? {
                return Ok(());
            }
            hub.execute(CoreCommand::RemoveRoom {
                id: target.id.clone(),
            })
            .await?;
            output::status(&format!("Removed room {}", target.name), global.quiet);
            Ok(())
        }
    }
}
