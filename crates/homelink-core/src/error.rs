// ── Core error types ──
//
// User-facing errors from homelink-core. Consumers never see raw HTTP
// status codes or JSON parse failures; the `From<homelink_api::Error>`
// impl folds transport-layer errors into the auth / network split the
// session layer reasons about.

use thiserror::Error;

/// Why an authentication-class error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum AuthFailure {
    /// Login or register was refused by the hub.
    InvalidCredentials,
    /// The refresh token was rejected; the session has been cleared.
    RefreshRejected,
    /// An authenticated call was attempted without a session.
    NotAuthenticated,
    /// The hub answered 401 to an authenticated call.
    Rejected,
}

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Session errors ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    Auth { message: String, kind: AuthFailure },

    // ── Transport errors ─────────────────────────────────────────────
    /// Timeouts, unreachable hosts, malformed responses and non-auth
    /// HTTP failures. Never triggers a logout.
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// HTTP status when the hub answered with a non-auth failure.
        status: Option<u16>,
    },

    // ── Input errors ─────────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    Validation { message: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("Room not found: {identifier}")]
    RoomNotFound { identifier: String },

    #[error("Automation not found: {identifier}")]
    AutomationNotFound { identifier: String },

    // ── Persistence errors ───────────────────────────────────────────
    #[error("Credential storage error: {message}")]
    Storage { message: String },
}

impl CoreError {
    pub(crate) fn auth(kind: AuthFailure, message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
            kind,
        }
    }

    pub(crate) fn not_authenticated() -> Self {
        Self::auth(AuthFailure::NotAuthenticated, "not logged in")
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// The authentication failure kind, if this is an auth error.
    pub fn auth_failure(&self) -> Option<AuthFailure> {
        match self {
            Self::Auth { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    pub(crate) fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            status: None,
        }
    }

    /// HTTP status carried by a network error, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Network { status, .. } => *status,
            _ => None,
        }
    }

    /// Replace a hub 404 with the entity-specific error from `missing`.
    pub(crate) fn or_not_found(self, missing: impl FnOnce() -> CoreError) -> CoreError {
        if self.http_status() == Some(404) {
            missing()
        } else {
            self
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::DeviceNotFound { .. } | Self::RoomNotFound { .. } | Self::AutomationNotFound { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<homelink_api::Error> for CoreError {
    fn from(err: homelink_api::Error) -> Self {
        match err {
            homelink_api::Error::Authentication { message } => {
                CoreError::auth(AuthFailure::Rejected, message)
            }
            homelink_api::Error::Api { status, message } => CoreError::Network {
                message: format!("hub answered HTTP {status}: {message}"),
                status: Some(status),
            },
            homelink_api::Error::Deserialization { message, .. } => {
                CoreError::network(format!("malformed response: {message}"))
            }
            homelink_api::Error::Timeout { timeout_ms } => {
                CoreError::network(format!("request timed out after {timeout_ms}ms"))
            }
            err @ (homelink_api::Error::Transport(_)
            | homelink_api::Error::InvalidUrl(_)
            | homelink_api::Error::Tls(_)) => CoreError::network(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_maps_to_auth() {
        let err: CoreError = homelink_api::Error::Authentication {
            message: "Token has expired".into(),
        }
        .into();
        assert_eq!(err.auth_failure(), Some(AuthFailure::Rejected));
        assert_eq!(err.to_string(), "Authentication failed: Token has expired");
    }

    #[test]
    fn timeout_is_network_never_auth() {
        let err: CoreError = homelink_api::Error::Timeout { timeout_ms: 10_000 }.into();
        assert!(err.is_network());
        assert!(!err.is_auth());
    }

    #[test]
    fn server_errors_carry_message() {
        let err: CoreError = homelink_api::Error::Api {
            status: 500,
            message: "database unavailable".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Network error: hub answered HTTP 500: database unavailable"
        );
    }

    #[test]
    fn not_found_is_replaced_only_for_404() {
        let missing = || CoreError::DeviceNotFound {
            identifier: "9".into(),
        };
        let err: CoreError = homelink_api::Error::Api {
            status: 404,
            message: "Device not found".into(),
        }
        .into();
        assert!(err.or_not_found(missing).is_not_found());

        let err: CoreError = homelink_api::Error::Api {
            status: 503,
            message: "busy".into(),
        }
        .into();
        assert_eq!(err.or_not_found(missing).http_status(), Some(503));
    }

    #[test]
    fn auth_failure_display_is_snake_case() {
        assert_eq!(AuthFailure::RefreshRejected.to_string(), "refresh_rejected");
    }
}
