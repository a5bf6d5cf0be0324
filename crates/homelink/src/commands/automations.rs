//! Automation command handlers.

use std::sync::Arc;

use tabled::Tabled;

use homelink_core::{Automation, Command as CoreCommand, CommandResult, Hub, NewAutomation};

use crate::cli::{AutomationsArgs, AutomationsCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct AutomationRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Enabled")]
    enabled: String,
    #[tabled(rename = "Condition")]
    condition: String,
}

impl From<&Arc<Automation>> for AutomationRow {
    fn from(a: &Arc<Automation>) -> Self {
        Self {
            id: a.id.clone(),
            name: a.name.clone(),
            kind: a.kind.to_string(),
            enabled: if a.enabled { "yes" } else { "no" }.into(),
            condition: a.condition.to_string(),
        }
    }
}

pub async fn handle(
    hub: &Hub,
    args: AutomationsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    util::load_automations(hub).await?;

    match args.command {
        AutomationsCommand::List => {
            let automations: Vec<Arc<Automation>> =
                hub.registry().automations().iter().cloned().collect();
            let out = output::render_list(
                global.output,
                &automations,
                |a| AutomationRow::from(a),
                |a| a.id.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        AutomationsCommand::Add {
            name,
            kind,
            condition,
            action,
            disabled,
        } => {
            let new = NewAutomation {
                name: name.clone(),
                kind: kind.into(),
                condition: util::parse_json("condition", &condition)?,
                action: util::parse_json("action", &action)?,
                enabled: !disabled,
            };
            hub.execute(CoreCommand::AddAutomation(new)).await?;
            output::status(&format!("Added automation {name}"), global.quiet);
            Ok(())
        }

        AutomationsCommand::Remove { automation } => {
            let target = util::resolve_automation(hub, &automation)?;
            if !util::confirm(&format!("Remove automation {}?", target.name), global.yes)? {
                return Ok(());
            }
            hub.execute(CoreCommand::RemoveAutomation {
                id: target.id.clone(),
            })
            .await?;
            output::status(&format!("Removed automation {}", target.name), global.quiet);
            Ok(())
        }

        AutomationsCommand::Toggle { automation } => {
            let target = util::resolve_automation(hub, &automation)?;
            let result = hub
                .execute(CoreCommand::ToggleAutomation {
                    id: target.id.clone(),
                })
                .await?;
            if let CommandResult::Automation(updated) = result {
                let state = if updated.enabled { "enabled" } else { "disabled" };
                output::status(&format!("{} {state}", updated.name), global.quiet);
            }
            Ok(())
        }
    }
}
