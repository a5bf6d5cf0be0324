pub mod auth;
pub mod automations;
pub mod config_cmd;
pub mod devices;
pub mod rooms;
pub mod util;
pub mod watch;

use homelink_core::Hub;

use crate::cli::{Command, GlobalOpts};
use crate::config::Resolved;
use crate::error::CliError;

/// Route a hub command to its handler.
pub async fn dispatch(
    cmd: Command,
    hub: &Hub,
    resolved: &Resolved,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Login(args) => auth::login(hub, args, resolved, global).await,
        Command::Register(args) => auth::register(hub, args, global).await,
        Command::Logout => {
            auth::logout(hub, global);
            Ok(())
        }
        Command::Whoami => auth::whoami(hub, global),
        Command::Profile(args) => auth::profile(hub, args, global).await,
        Command::Password => auth::password(hub, global).await,
        Command::Devices(args) => devices::handle(hub, args, global).await,
        Command::Rooms(args) => rooms::handle(hub, args, global).await,
        Command::Automations(args) => automations::handle(hub, args, global).await,
        Command::Watch(args) => watch::handle(hub, args, global).await,
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
