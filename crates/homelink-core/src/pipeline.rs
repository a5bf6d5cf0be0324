// ── Request pipeline ──
//
// Every authenticated call goes through `RequestPipeline::send`:
//
// 1. Auth endpoints (login, register, refresh) and requests that carry
//    their own bearer bypass interception.
// 2. If the access token is expired and a refresh token exists, refresh
//    first (joining any in-flight refresh).
// 3. Send with the current access token.
// 4. On a 401, refresh once and resend once. A second 401 is returned
//    as-is; there is never a third attempt.

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;

use homelink_api::ApiRequest;

use crate::error::{AuthFailure, CoreError};
use crate::session::{RefreshOutcome, SessionManager};

/// Authenticated request sender bound to one session manager.
#[derive(Clone)]
pub struct RequestPipeline {
    session: SessionManager,
}

impl RequestPipeline {
    pub(crate) fn new(session: SessionManager) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub async fn send<T: DeserializeOwned>(&self, req: &ApiRequest) -> Result<T, CoreError> {
        if req.is_auth_endpoint() || req.bearer().is_some() {
            return Ok(self.send_unintercepted(req).await?);
        }

        let token = self.ready_token().await?;
        match self.session.send_raw(req, Some(&token)).await {
            Err(e) if e.is_unauthorized() => self.retry_after_refresh(req, &token, e).await,
            other => Ok(other?),
        }
    }

    /// Send without touching session state, using the request's pinned
    /// bearer if it has one.
    pub(crate) async fn send_unintercepted<T: DeserializeOwned>(
        &self,
        req: &ApiRequest,
    ) -> Result<T, homelink_api::Error> {
        self.session.send_raw(req, req.bearer()).await
    }

    /// The access token to send with, refreshed first if it has expired.
    async fn ready_token(&self) -> Result<SecretString, CoreError> {
        let token = self
            .session
            .access_token()
            .ok_or_else(CoreError::not_authenticated)?;

        if !self.session.access_expired() || self.session.refresh_token().is_none() {
            return Ok(token);
        }

        debug!("access token expired; refreshing before send");
        self.session.refresh_outcome().await.into_result()?;
        self.session
            .access_token()
            .ok_or_else(CoreError::not_authenticated)
    }

    async fn retry_after_refresh<T: DeserializeOwned>(
        &self,
        req: &ApiRequest,
        sent: &SecretString,
        original: homelink_api::Error,
    ) -> Result<T, CoreError> {
        // Another caller may already have refreshed while this request was
        // in flight; if so, retry with that token instead of refreshing again.
        let current = self.session.access_token();
        let already_rotated = current
            .as_ref()
            .is_some_and(|t| t.expose_secret() != sent.expose_secret());

        if !already_rotated {
            debug!(request = %req, "unauthorized; refreshing and retrying once");
            match self.session.refresh_outcome().await {
                RefreshOutcome::Refreshed => {}
                RefreshOutcome::Rejected(_) | RefreshOutcome::Failed(_) => {
                    return Err(original.into());
                }
            }
        }

        let token = self.session.access_token().ok_or_else(|| {
            CoreError::auth(AuthFailure::Rejected, original.to_string())
        })?;
        Ok(self.session.send_raw(req, Some(&token)).await?)
    }
}
