//! `watch`: run the synchronizer and stream activity until interrupted.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use serde_json::json;
use tokio::sync::mpsc;

use homelink_core::{ActivityEntry, Device, EventKind, Hub, RegistryEvent, SessionState};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::util;

/// Device-set changes between two polls.
#[derive(Debug, Default, PartialEq, Eq)]
struct SetDelta {
    added: Vec<String>,
    removed: Vec<String>,
}

fn device_names(devices: &[Arc<Device>]) -> BTreeMap<String, String> {
    devices
        .iter()
        .map(|d| (d.id.clone(), d.name.clone()))
        .collect()
}

fn diff(before: &BTreeMap<String, String>, after: &BTreeMap<String, String>) -> SetDelta {
    SetDelta {
        added: after
            .iter()
            .filter(|(id, _)| !before.contains_key(*id))
            .map(|(_, name)| name.clone())
            .collect(),
        removed: before
            .iter()
            .filter(|(id, _)| !after.contains_key(*id))
            .map(|(_, name)| name.clone())
            .collect(),
    }
}

fn emit(format: OutputFormat, at: DateTime<Utc>, device: &str, action: &str) {
    let line = match format {
        OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml => json!({
            "timestamp": at.to_rfc3339(),
            "device": device,
            "action": action,
        })
        .to_string(),
        OutputFormat::Table | OutputFormat::Plain => format!(
            "[{}] {device} {action}",
            at.with_timezone(&Local).format("%H:%M:%S")
        ),
    };
    println!("{line}");
}

fn emit_activity(format: OutputFormat, entry: &ActivityEntry) {
    emit(format, entry.timestamp, &entry.device_name, &entry.action);
}

pub async fn handle(hub: &Hub, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    util::load_devices(hub).await?;
    hub.synchronizer().refresh_automations().await?;

    let (tx, mut replaced) = mpsc::unbounded_channel();
    let _subscription = hub
        .registry()
        .subscribe(EventKind::DevicesReplaced, move |event| {
            if let RegistryEvent::DevicesReplaced(devices) = event {
                let _ = tx.send(Arc::clone(devices));
            }
        });
    let mut known = device_names(&hub.registry().list());
    let mut activity = hub.activity().subscribe();
    let mut session = hub.session().subscribe_state();
    let mut printed = HashSet::new();

    output::status(
        &format!("Watching {} devices; Ctrl-C to stop", known.len()),
        global.quiet,
    );
    hub.start();

    let deadline = async {
        match args.duration {
            Some(limit) => tokio::time::sleep(*limit).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let outcome = loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => break Ok(()),
            () = &mut deadline => break Ok(()),
            Ok(()) = session.changed() => {
                if *session.borrow_and_update() == SessionState::Anonymous {
                    let message = hub
                        .session()
                        .last_error()
                        .unwrap_or_else(|| "session ended".into());
                    break Err(CliError::SessionExpired { message });
                }
            }
            Ok(()) = activity.changed() => {
                let entries = activity.borrow_and_update().clone();
                for entry in entries.iter().rev() {
                    if printed.insert(entry.id) {
                        emit_activity(global.output, entry);
                    }
                }
                printed.retain(|id| entries.iter().any(|e| e.id == *id));
            }
            Some(devices) = replaced.recv() => {
                let next = device_names(&devices);
                let delta = diff(&known, &next);
                let now = Utc::now();
                for name in &delta.added {
                    emit(global.output, now, name, "appeared");
                }
                for name in &delta.removed {
                    emit(global.output, now, name, "disappeared");
                }
                known = next;
            }
        }
    };

    hub.stop().await;
    outcome
}
