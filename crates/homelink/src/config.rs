//! CLI configuration: profile resolution with `GlobalOpts` overrides.

use std::sync::Arc;

use homelink_config::{
    Config, Profile, config_path, load_config, open_credential_store, profile_to_hub_config,
};
use homelink_core::{CredentialStore, HubConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Everything a command needs to build a `Hub`.
pub struct Resolved {
    pub profile_name: String,
    pub profile: Profile,
    pub hub: HubConfig,
    pub store: Arc<dyn CredentialStore>,
}

pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Resolve the active profile, letting flags override its values. With no
/// profile on disk, `--api-url` alone is enough.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let config = load_config()?;
    let profile_name = active_profile_name(global, &config);

    let mut profile = match (config.profiles.get(&profile_name), &global.api_url) {
        (Some(profile), _) => profile.clone(),
        (None, Some(url)) => Profile::new(url.clone()),
        (None, None) if global.profile.is_some() => {
            return Err(homelink_config::ConfigError::UnknownProfile { name: profile_name }.into());
        }
        (None, None) => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };

    if let Some(url) = &global.api_url {
        profile.api_url.clone_from(url);
    }
    if global.timeout.is_some() {
        profile.timeout = global.timeout;
    }
    if global.insecure {
        profile.insecure = true;
    }

    let hub = profile_to_hub_config(&profile, &config.defaults)?;
    let store = open_credential_store(&profile, &profile_name, &config.defaults);
    Ok(Resolved {
        profile_name,
        profile,
        hub,
        store,
    })
}
