//! Config subcommand handlers.

use std::fmt::Write as _;

use homelink_config::{
    Config, CredentialBackend, Profile, config_path, load_config, save_config,
};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, StoreChoice};
use crate::config::active_profile_name;
use crate::error::CliError;
use crate::output;

impl From<StoreChoice> for CredentialBackend {
    fn from(choice: StoreChoice) -> Self {
        match choice {
            StoreChoice::Keyring => Self::Keyring,
            StoreChoice::File => Self::File,
            StoreChoice::Memory => Self::Memory,
        }
    }
}

fn backend_name(backend: CredentialBackend) -> &'static str {
    match backend {
        CredentialBackend::Keyring => "keyring",
        CredentialBackend::File => "file",
        CredentialBackend::Memory => "memory",
    }
}

/// TOML-like rendering with profiles in name order.
fn format_config(cfg: &Config) -> String {
    let mut out = String::new();
    if let Some(default) = &cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(
        out,
        "credential_store = \"{}\"",
        backend_name(cfg.defaults.credential_store)
    );

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "api_url = \"{}\"", p.api_url);
        if let Some(u) = &p.username {
            let _ = writeln!(out, "username = \"{u}\"");
        }
        if let Some(t) = p.timeout {
            let _ = writeln!(out, "timeout = {t}");
        }
        if let Some(m) = p.expiry_margin {
            let _ = writeln!(out, "expiry_margin = {m}");
        }
        if let Some(store) = p.credential_store {
            let _ = writeln!(out, "credential_store = \"{}\"", backend_name(store));
        }
        if let Some(ca) = &p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if p.insecure {
            let _ = writeln!(out, "insecure = true");
        }
    }
    out
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init {
            api_url,
            name,
            credential_store,
            username,
        } => {
            let mut cfg = load_config()?;
            let mut profile = Profile::new(api_url);
            profile.credential_store = credential_store.map(CredentialBackend::from);
            profile.username = username;
            // Reject bad URLs before writing anything.
            homelink_config::profile_to_hub_config(&profile, &cfg.defaults)?;

            if cfg.profiles.is_empty() {
                cfg.default_profile = Some(name.clone());
            }
            cfg.profiles.insert(name.clone(), profile);
            save_config(&cfg)?;
            output::status(
                &format!("Profile '{name}' written to {}", config_path().display()),
                global.quiet,
            );
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = load_config()?;
            let out = output::render_single(global.output, &cfg, format_config, |_| {
                config_path().display().to_string()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = load_config()?;
            let active = active_profile_name(global, &cfg);
            let mut names: Vec<_> = cfg.profiles.keys().cloned().collect();
            names.sort();
            let lines: Vec<String> = names
                .into_iter()
                .map(|n| {
                    if n == active {
                        format!("* {n}")
                    } else {
                        format!("  {n}")
                    }
                })
                .collect();
            output::print_output(&lines.join("\n"), global.quiet);
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = load_config()?;
            if !cfg.profiles.contains_key(&name) {
                return Err(homelink_config::ConfigError::UnknownProfile { name }.into());
            }
            cfg.default_profile = Some(name.clone());
            save_config(&cfg)?;
            output::status(&format!("Default profile set to '{name}'"), global.quiet);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_lists_profiles_in_order() {
        let mut cfg = Config::default();
        cfg.profiles
            .insert("zeta".into(), Profile::new("http://z.local/api"));
        cfg.profiles
            .insert("alpha".into(), Profile::new("http://a.local/api"));

        let text = format_config(&cfg);
        let alpha = text.find("[profiles.alpha]");
        let zeta = text.find("[profiles.zeta]");
        assert!(alpha.is_some() && zeta.is_some());
        assert!(alpha < zeta);
        assert!(text.contains("credential_store = \"keyring\""));
    }
}
