// ── Runtime hub configuration ──
//
// These types describe *how* to talk to a hub and how aggressively to
// poll it. They never touch disk: `homelink-config` (or a test) builds a
// `HubConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use homelink_api::{TlsMode, TransportConfig};

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed hubs on the LAN).
    DangerAcceptInvalid,
}

/// Cadences and band boundaries for the three polling tiers.
///
/// A tier's timer always ticks at its own cadence; its handler only polls
/// while the time since the last user action lies inside its band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    pub burst_interval: Duration,
    pub active_interval: Duration,
    pub idle_interval: Duration,
    /// Upper bound of the burst band (exclusive).
    pub burst_window: Duration,
    /// Upper bound of the active band (exclusive).
    pub active_window: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            burst_interval: Duration::from_millis(500),
            active_interval: Duration::from_secs(5),
            idle_interval: Duration::from_secs(30),
            burst_window: Duration::from_secs(3),
            active_window: Duration::from_secs(30),
        }
    }
}

/// Configuration for one hub connection.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// API root, e.g. `http://hub.local:5000/api`.
    pub api_url: Url,
    pub tls: TlsVerification,
    /// Per-call bound applied by the request pipeline.
    pub timeout: Duration,
    /// Safety margin subtracted from token expiry.
    pub expiry_margin: Duration,
    pub poll: PollConfig,
    /// Number of activity entries retained, newest first.
    pub activity_capacity: usize,
}

impl HubConfig {
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(10),
            expiry_margin: Duration::from_secs(30),
            poll: PollConfig::default(),
            activity_capacity: 5,
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: match &self.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
                TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
            },
            timeout: self.timeout,
        }
    }

    pub(crate) fn expiry_margin_ms(&self) -> i64 {
        i64::try_from(self.expiry_margin.as_millis()).unwrap_or(i64::MAX)
    }
}
