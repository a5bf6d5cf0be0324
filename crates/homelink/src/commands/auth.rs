//! Session command handlers.

use std::io::IsTerminal;

use secrecy::{ExposeSecret, SecretString};

use homelink_core::{Hub, ProfileUpdate, Registration, UserProfile};

use crate::cli::{GlobalOpts, LoginArgs, ProfileArgs, RegisterArgs};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

use super::util;

fn detail(user: &UserProfile) -> String {
    [
        format!("Username: {}", user.username),
        format!("Name:     {}", user.display_name()),
        format!("Email:    {}", user.email.as_deref().unwrap_or("-")),
        format!("Role:     {}", user.role.as_deref().unwrap_or("-")),
        format!("ID:       {}", user.id),
    ]
    .join("\n")
}

fn show(user: &UserProfile, global: &GlobalOpts) {
    let out = output::render_single(global.output, user, detail, |u| u.username.clone());
    output::print_output(&out, global.quiet);
}

pub async fn login(
    hub: &Hub,
    args: LoginArgs,
    resolved: &Resolved,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let username = match args.username.or_else(|| resolved.profile.username.clone()) {
        Some(name) => name,
        None => dialoguer::Input::<String>::new()
            .with_prompt("Username")
            .interact_text()
            .map_err(CliError::prompt)?,
    };
    let password = util::password(args.password, "Password: ")?;

    let user = hub.login(&username, &password).await?;
    output::status(&format!("Signed in as {}", user.display_name()), global.quiet);
    Ok(())
}

pub async fn register(hub: &Hub, args: RegisterArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let password = util::password(args.password, "Choose a password: ")?;
    if !global.yes {
        confirm_password(&password)?;
    }
    let registration = Registration {
        username: args.username,
        email: args.email,
        password,
        first_name: args.first_name,
        last_name: args.last_name,
    };
    let user = hub.register(&registration).await?;
    output::status(
        &format!("Account created; signed in as {}", user.username),
        global.quiet,
    );
    Ok(())
}

/// Interactive shells type the password twice; piped input is taken as is.
fn confirm_password(password: &SecretString) -> Result<(), CliError> {
    if !std::io::stdin().is_terminal() {
        return Ok(());
    }
    let again = util::password(None, "Repeat password: ")?;
    if again.expose_secret() == password.expose_secret() {
        Ok(())
    } else {
        Err(CliError::Validation {
            field: "password".into(),
            reason: "passwords do not match".into(),
        })
    }
}

pub fn logout(hub: &Hub, global: &GlobalOpts) {
    let had_session = hub.session().has_session();
    hub.logout();
    if had_session {
        output::status("Signed out", global.quiet);
    } else {
        output::status("No active session", global.quiet);
    }
}

pub fn whoami(hub: &Hub, global: &GlobalOpts) -> Result<(), CliError> {
    let user = hub.session().user().ok_or(CliError::NotSignedIn)?;
    show(&user, global);
    Ok(())
}

pub async fn profile(hub: &Hub, args: ProfileArgs, global: &GlobalOpts) -> Result<(), CliError> {
    util::require_session(hub)?;
    let update = ProfileUpdate {
        first_name: args.first_name,
        last_name: args.last_name,
        email: args.email,
    };
    let user = hub.session().update_profile(&update).await?;
    show(&user, global);
    Ok(())
}

pub async fn password(hub: &Hub, global: &GlobalOpts) -> Result<(), CliError> {
    util::require_session(hub)?;
    let current = util::password(None, "Current password: ")?;
    let new = util::password(None, "New password: ")?;
    hub.session().change_password(&current, &new).await?;
    output::status("Password changed", global.quiet);
    Ok(())
}
