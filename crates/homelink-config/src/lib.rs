//! Configuration for homelink clients.
//!
//! TOML profiles merged with `HOMELINK_` environment variables, translation
//! to `homelink_core::HubConfig`, and the durable credential store
//! backends the session manager persists through.

mod store;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use homelink_core::{CredentialStore, HubConfig, MemoryCredentialStore, TlsVerification};

pub use store::{FileCredentialStore, KeyringCredentialStore};

/// Environment prefix; nested keys use `__`, e.g.
/// `HOMELINK_PROFILES__HOME__API_URL`.
pub const ENV_PREFIX: &str = "HOMELINK_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' is not defined")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Pick `requested`, else the configured default profile.
    pub fn profile(&self, requested: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = requested
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|p| (name.to_owned(), p))
            .ok_or_else(|| ConfigError::UnknownProfile {
                name: name.to_owned(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub credential_store: CredentialBackend,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            credential_store: CredentialBackend::default(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    10
}

/// Where session credentials are persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    /// OS keyring, falling back to `file` when no keyring is reachable.
    #[default]
    Keyring,
    File,
    /// Nothing survives the process.
    Memory,
}

/// A named hub profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// API root, e.g. "http://hub.local:5000/api".
    pub api_url: String,

    /// Username offered by `login` when none is given.
    pub username: Option<String>,

    /// Override the request timeout (seconds).
    pub timeout: Option<u64>,

    /// Seconds before token expiry at which a refresh is forced.
    pub expiry_margin: Option<u64>,

    pub credential_store: Option<CredentialBackend>,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Accept invalid certificates (self-signed hubs).
    #[serde(default)]
    pub insecure: bool,
}

impl Profile {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            username: None,
            timeout: None,
            expiry_margin: None,
            credential_store: None,
            ca_cert: None,
            insecure: false,
        }
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("io", "homelink", "homelink")
}

fn home_fallback(leaf: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("homelink");
    p.push(leaf);
    p
}

/// `config.toml` under the platform config directory.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Credential file for `profile_name` under the platform data directory.
pub fn credentials_path(profile_name: &str) -> PathBuf {
    let leaf = format!("credentials-{profile_name}.json");
    project_dirs().map_or_else(|| home_fallback(&leaf), |dirs| dirs.data_dir().join(&leaf))
}

// ── Loading / saving ────────────────────────────────────────────────

/// Load the config from the canonical path plus environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` (missing file is fine) plus environment.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()?;
    Ok(config)
}

pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(&config_path(), cfg)
}

pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(cfg)?)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `HubConfig` from a profile, filling gaps from `defaults`.
pub fn profile_to_hub_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<HubConfig, ConfigError> {
    let api_url: url::Url = profile.api_url.parse().map_err(|_| ConfigError::Validation {
        field: "api_url".into(),
        reason: format!("invalid URL: {}", profile.api_url),
    })?;
    if !matches!(api_url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation {
            field: "api_url".into(),
            reason: format!("unsupported scheme '{}'", api_url.scheme()),
        });
    }

    let mut config = HubConfig::new(api_url);
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout).max(1));
    if let Some(margin) = profile.expiry_margin {
        config.expiry_margin = Duration::from_secs(margin);
    }
    config.tls = if profile.insecure {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ca) = &profile.ca_cert {
        TlsVerification::CustomCa(ca.clone())
    } else {
        TlsVerification::SystemDefaults
    };
    Ok(config)
}

/// Open the credential store chosen for `profile_name`.
pub fn open_credential_store(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Arc<dyn CredentialStore> {
    match profile.credential_store.unwrap_or(defaults.credential_store) {
        CredentialBackend::Memory => Arc::new(MemoryCredentialStore::new()),
        CredentialBackend::File => Arc::new(FileCredentialStore::new(credentials_path(profile_name))),
        CredentialBackend::Keyring => match KeyringCredentialStore::probe(profile_name) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!(error = %e, "keyring unavailable; storing credentials in a file");
                Arc::new(FileCredentialStore::new(credentials_path(profile_name)))
            }
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|jail| {
            let cfg = load_config_from(&jail.directory().join("absent.toml")).unwrap();
            assert_eq!(cfg, Config::default());
            Ok(())
        });
    }

    #[test]
    fn file_and_env_merge() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                default_profile = "home"

                [profiles.home]
                api_url = "http://hub.local:5000/api"
                credential_store = "file"
                "#,
            )?;
            jail.set_env("HOMELINK_PROFILES__HOME__TIMEOUT", "4");
            jail.set_env("HOMELINK_DEFAULTS__OUTPUT", "json");

            let cfg = load_config_from(&jail.directory().join("config.toml")).unwrap();
            let (name, home) = cfg.profile(None).unwrap();
            assert_eq!(name, "home");
            assert_eq!(home.timeout, Some(4));
            assert_eq!(home.credential_store, Some(CredentialBackend::File));
            assert_eq!(cfg.defaults.output, "json");
            Ok(())
        });
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let cfg = Config::default();
        assert!(matches!(
            cfg.profile(Some("cabin")),
            Err(ConfigError::UnknownProfile { name }) if name == "cabin"
        ));
    }

    #[test]
    fn hub_config_from_profile() {
        let mut profile = Profile::new("https://hub.example/api");
        profile.timeout = Some(3);
        profile.expiry_margin = Some(60);

        let hub = profile_to_hub_config(&profile, &Defaults::default()).unwrap();
        assert_eq!(hub.timeout, Duration::from_secs(3));
        assert_eq!(hub.expiry_margin, Duration::from_secs(60));
        assert_eq!(hub.tls, TlsVerification::SystemDefaults);

        profile.insecure = true;
        let hub = profile_to_hub_config(&profile, &Defaults::default()).unwrap();
        assert_eq!(hub.tls, TlsVerification::DangerAcceptInvalid);
    }

    #[test]
    fn rejects_bad_urls() {
        for url in ["not a url", "ftp://hub/api"] {
            let err = profile_to_hub_config(&Profile::new(url), &Defaults::default()).unwrap_err();
            assert!(matches!(err, ConfigError::Validation { .. }), "{url}");
        }
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        Jail::expect_with(|_jail| {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("nested").join("config.toml");
            let mut cfg = Config::default();
            cfg.profiles
                .insert("default".into(), Profile::new("http://127.0.0.1:5000/api"));

            save_config_to(&path, &cfg).unwrap();
            let loaded = load_config_from(&path).unwrap();
            assert_eq!(loaded, cfg);
            Ok(())
        });
    }
}
