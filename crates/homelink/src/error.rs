//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with help
//! text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use homelink_config::ConfigError;
use homelink_core::{AuthFailure, CoreError};

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Session ──────────────────────────────────────────────────────
    #[error("Not signed in")]
    #[diagnostic(code(homelink::not_signed_in), help("Run: homelink login"))]
    NotSignedIn,

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(homelink::auth_failed),
        help("Check your username and password, then run: homelink login")
    )]
    AuthFailed { message: String },

    #[error("Session expired: {message}")]
    #[diagnostic(code(homelink::session_expired), help("Sign in again with: homelink login"))]
    SessionExpired { message: String },

    // ── Hub ──────────────────────────────────────────────────────────
    #[error("Could not reach the hub: {message}")]
    #[diagnostic(
        code(homelink::connection_failed),
        help(
            "Check that the hub is running and the API URL is right.\n\
             Current URL comes from: homelink config show"
        )
    )]
    Connection { message: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(homelink::not_found),
        help("Run: homelink {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid {field}: {reason}")]
    #[diagnostic(code(homelink::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("No hub configured")]
    #[diagnostic(
        code(homelink::no_config),
        help(
            "Create a profile with: homelink config init --api-url <URL>\n\
             Or pass --api-url / set HOMELINK_API_URL.\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(homelink::config))]
    Config(#[from] ConfigError),

    #[error("Credential storage failed: {message}")]
    #[diagnostic(code(homelink::storage))]
    Storage { message: String },

    // ── Interactive / IO ─────────────────────────────────────────────
    #[error("Prompt failed: {0}")]
    #[diagnostic(
        code(homelink::prompt),
        help("Pass values as flags or environment variables in non-interactive shells.")
    )]
    Prompt(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotSignedIn | Self::AuthFailed { .. } | Self::SessionExpired { .. } => {
                exit_code::AUTH
            }
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::NoConfig { .. } | Self::Config(_) => exit_code::USAGE,
            Self::Connection { .. } => exit_code::CONNECTION,
            Self::Storage { .. } | Self::Prompt(_) | Self::Io(_) => exit_code::GENERAL,
        }
    }

    pub fn not_found(resource_type: &str, identifier: &str, list_command: &str) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            identifier: identifier.into(),
            list_command: list_command.into(),
        }
    }

    pub fn prompt(e: impl std::fmt::Display) -> Self {
        Self::Prompt(e.to_string())
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Auth {
                kind: AuthFailure::NotAuthenticated,
                ..
            } => CliError::NotSignedIn,
            CoreError::Auth {
                kind: AuthFailure::RefreshRejected,
                message,
            } => CliError::SessionExpired { message },
            CoreError::Auth { message, .. } => CliError::AuthFailed { message },
            CoreError::Network { message, .. } => CliError::Connection { message },
            CoreError::Validation { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },
            CoreError::DeviceNotFound { identifier } => {
                CliError::not_found("device", &identifier, "devices list")
            }
            CoreError::RoomNotFound { identifier } => {
                CliError::not_found("room", &identifier, "rooms list")
            }
            CoreError::AutomationNotFound { identifier } => {
                CliError::not_found("automation", &identifier, "automations list")
            }
            CoreError::Storage { message } => CliError::Storage { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        let cases = [
            (
                CoreError::Auth {
                    message: "bad".into(),
                    kind: AuthFailure::InvalidCredentials,
                },
                exit_code::AUTH,
            ),
            (
                CoreError::DeviceNotFound {
                    identifier: "9".into(),
                },
                exit_code::NOT_FOUND,
            ),
            (
                CoreError::Validation {
                    message: "nope".into(),
                },
                exit_code::USAGE,
            ),
            (
                CoreError::Network {
                    message: "down".into(),
                    status: Some(503),
                },
                exit_code::CONNECTION,
            ),
        ];
        for (core, code) in cases {
            assert_eq!(CliError::from(core).exit_code(), code);
        }
    }
}
