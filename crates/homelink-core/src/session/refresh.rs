// ── Single-flight token refresh ──
//
// At most one `POST /auth/refresh` is in flight per session manager.
// The first caller installs a shared future in the slot; concurrent
// callers clone and await it. Whoever observes completion clears the
// slot, but only if it still holds the same flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use secrecy::SecretString;
use tracing::{debug, info, warn};

use homelink_api::endpoints;
use homelink_api::models::RefreshResponse;

use super::{SessionManager, SessionState};
use crate::error::{AuthFailure, CoreError};

/// How a refresh attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new access token is installed.
    Refreshed,
    /// The refresh token was missing or refused; the session was cleared.
    Rejected(String),
    /// Transient failure (timeout, unreachable hub, 5xx); the stale
    /// session is kept so a later call can retry.
    Failed(String),
}

impl RefreshOutcome {
    pub fn into_result(self) -> Result<(), CoreError> {
        match self {
            Self::Refreshed => Ok(()),
            Self::Rejected(message) => Err(CoreError::auth(AuthFailure::RefreshRejected, message)),
            Self::Failed(message) => Err(CoreError::network(message)),
        }
    }
}

type Flight = Shared<BoxFuture<'static, RefreshOutcome>>;

#[derive(Default)]
pub(super) struct RefreshSlot {
    current: Mutex<Option<(u64, Flight)>>,
    next_id: AtomicU64,
}

impl SessionManager {
    /// Refresh the access token, joining an in-flight refresh if one exists.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        self.refresh_outcome().await.into_result()
    }

    pub(crate) async fn refresh_outcome(&self) -> RefreshOutcome {
        let (id, flight) = {
            let mut current = self
                .inner
                .refresh
                .current
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some((id, flight)) = current.as_ref() {
                debug!(flight = id, "joining in-flight token refresh");
                (*id, flight.clone())
            } else {
                let id = self.inner.refresh.next_id.fetch_add(1, Ordering::Relaxed);
                let this = self.clone();
                let flight = async move { this.run_refresh().await }.boxed().shared();
                *current = Some((id, flight.clone()));
                (id, flight)
            }
        };

        let outcome = flight.await;

        let mut current = self
            .inner
            .refresh
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if current.as_ref().is_some_and(|(held, _)| *held == id) {
            *current = None;
        }
        outcome
    }

    async fn run_refresh(&self) -> RefreshOutcome {
        let generation = self.generation();
        let Some(refresh_token) = self.refresh_token() else {
            warn!("no refresh token available; ending session");
            self.logout();
            return RefreshOutcome::Rejected("no refresh token available".into());
        };

        self.set_state(SessionState::Refreshing);
        let req = endpoints::refresh(&refresh_token);
        let result = self
            .pipeline()
            .send_unintercepted::<RefreshResponse>(&req)
            .await;

        match result {
            Ok(resp) => {
                let access = SecretString::from(resp.access_token);
                if self.replace_access(generation, access) {
                    info!("access token refreshed");
                    RefreshOutcome::Refreshed
                } else if self.is_authenticated() {
                    debug!("session replaced during refresh; using the new session");
                    RefreshOutcome::Refreshed
                } else {
                    RefreshOutcome::Rejected("session ended during refresh".into())
                }
            }
            Err(e) if e.is_unauthorized() => {
                let message = e
                    .server_message()
                    .unwrap_or("refresh token rejected")
                    .to_owned();
                warn!(reason = %message, "refresh token rejected; ending session");
                if self.generation() == generation {
                    self.logout();
                } else {
                    self.settle_state();
                }
                RefreshOutcome::Rejected(message)
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed; keeping current session");
                self.settle_state();
                let message = match CoreError::from(e) {
                    CoreError::Network { message, .. } => message,
                    other => other.to_string(),
                };
                RefreshOutcome::Failed(message)
            }
        }
    }
}
