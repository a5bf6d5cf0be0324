// ── Session manager ──
//
// Owns the signed-in session (user record, access grant, refresh token)
// and its persistence. All network traffic goes through the
// `RequestPipeline`; refresh is single-flight (see `refresh.rs`).
//
// A generation counter is bumped whenever a session is installed or
// cleared. Work that started under one generation (a refresh, a profile
// re-read) only writes back if the generation is unchanged, so a logout
// in the middle of a refresh is never undone.

pub mod refresh;
mod validate;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::de::{DeserializeOwned, IgnoredAny};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use homelink_api::models::{
    LoginResponse, MeResponse, ProfileUpdate, RegisterResponse, Registration,
};
use homelink_api::{ApiRequest, HubClient, endpoints};

pub use refresh::RefreshOutcome;
use refresh::RefreshSlot;

use crate::config::HubConfig;
use crate::convert::merge_profile;
use crate::credentials::{
    ACCESS_TOKEN_KEY, CredentialStore, REFRESH_TOKEN_KEY, SESSION_KEYS, USER_KEY,
};
use crate::error::{AuthFailure, CoreError};
use crate::model::UserProfile;
use crate::pipeline::RequestPipeline;
use crate::token;

// ── SessionState ─────────────────────────────────────────────────

/// Lifecycle state, observable through [`SessionManager::subscribe_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    Anonymous,
    /// Reading a stored session at startup.
    Hydrating,
    Authenticating,
    Authenticated,
    Refreshing,
}

// ── Session ──────────────────────────────────────────────────────

/// An access token and the expiry decoded from it. A token whose expiry
/// cannot be decoded is stamped as already expired, so the pair is always
/// set together.
struct AccessGrant {
    token: SecretString,
    expires_at_ms: i64,
}

impl AccessGrant {
    fn new(token: SecretString) -> Self {
        let expires_at_ms = token::decode_expiry(token.expose_secret()).unwrap_or(0);
        Self {
            token,
            expires_at_ms,
        }
    }
}

struct Session {
    user: UserProfile,
    access: AccessGrant,
    refresh_token: Option<SecretString>,
}

// ── SessionManager ───────────────────────────────────────────────

/// Authenticated session owner. Cheaply cloneable.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    client: HubClient,
    store: Arc<dyn CredentialStore>,
    timeout: Duration,
    expiry_margin_ms: i64,
    session: RwLock<Option<Session>>,
    generation: AtomicU64,
    state: watch::Sender<SessionState>,
    last_error: Mutex<Option<String>>,
    refresh: RefreshSlot,
}

impl SessionManager {
    /// Build a manager and hydrate it from `store`.
    pub fn new(client: HubClient, store: Arc<dyn CredentialStore>, config: &HubConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Anonymous);
        let manager = Self {
            inner: Arc::new(SessionInner {
                client,
                store,
                timeout: config.timeout,
                expiry_margin_ms: config.expiry_margin_ms(),
                session: RwLock::new(None),
                generation: AtomicU64::new(0),
                state,
                last_error: Mutex::new(None),
                refresh: RefreshSlot::default(),
            }),
        };
        manager.hydrate();
        manager
    }

    /// Restore the persisted session, if both the user record and an
    /// access token are stored. Returns whether a session was restored.
    pub fn hydrate(&self) -> bool {
        self.set_state(SessionState::Hydrating);
        let restored = match self.load_persisted() {
            Ok(Some(session)) => {
                debug!(user = %session.user.username, "restored stored session");
                let mut guard = self.write();
                *guard = Some(session);
                self.inner.generation.fetch_add(1, Ordering::SeqCst);
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "could not read stored session");
                false
            }
        };
        self.settle_state();
        restored
    }

    /// A request pipeline bound to this session.
    pub fn pipeline(&self) -> RequestPipeline {
        RequestPipeline::new(self.clone())
    }

    // ── Read accessors ───────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.read().as_ref().map(|s| s.user.clone())
    }

    /// A session exists, whether or not its access token is still fresh.
    pub fn has_session(&self) -> bool {
        self.read().is_some()
    }

    /// A session exists and its access token is not expired.
    pub fn is_authenticated(&self) -> bool {
        self.read().as_ref().is_some_and(|s| {
            !token::is_expired(
                Some(s.access.expires_at_ms),
                token::now_ms(),
                self.inner.expiry_margin_ms,
            )
        })
    }

    pub fn expires_at_ms(&self) -> Option<i64> {
        self.read().as_ref().map(|s| s.access.expires_at_ms)
    }

    /// Message of the last failed session operation.
    pub fn last_error(&self) -> Option<String> {
        self.inner
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn access_token(&self) -> Option<SecretString> {
        self.read().as_ref().map(|s| s.access.token.clone())
    }

    pub(crate) fn refresh_token(&self) -> Option<SecretString> {
        self.read().as_ref().and_then(|s| s.refresh_token.clone())
    }

    pub(crate) fn access_expired(&self) -> bool {
        !self.is_authenticated()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// The session that was live at `generation` is still the live one.
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation && self.has_session()
    }

    // ── Operations ───────────────────────────────────────────────

    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<UserProfile, CoreError> {
        self.clear_last_error();
        let result = self.login_inner(username.trim(), password).await;
        self.finish(result)
    }

    async fn login_inner(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<UserProfile, CoreError> {
        validate::login(username, password)?;
        self.set_state(SessionState::Authenticating);

        let pipeline = self.pipeline();
        let resp: LoginResponse = pipeline
            .send_unintercepted(&endpoints::login(username, password))
            .await
            .map_err(credential_error)?;

        let access = SecretString::from(resp.access_token);
        let me: MeResponse = pipeline
            .send(&endpoints::me().with_bearer(access.clone()))
            .await?;

        let base = UserProfile {
            id: resp.user_id,
            username: resp.username,
            ..UserProfile::default()
        };
        let user = merge_profile(base, me);
        self.install(Session {
            user: user.clone(),
            access: AccessGrant::new(access),
            refresh_token: Some(SecretString::from(resp.refresh_token)),
        });
        Ok(user)
    }

    /// Create an account and sign in as it.
    pub async fn register(&self, registration: &Registration) -> Result<UserProfile, CoreError> {
        self.clear_last_error();
        let result = self.register_inner(registration).await;
        self.finish(result)
    }

    async fn register_inner(&self, reg: &Registration) -> Result<UserProfile, CoreError> {
        validate::registration(reg)?;
        self.set_state(SessionState::Authenticating);

        let resp: RegisterResponse = self
            .pipeline()
            .send_unintercepted(&endpoints::register(reg))
            .await
            .map_err(credential_error)?;

        let user = UserProfile {
            id: resp.user_id,
            username: reg.username.clone(),
            email: Some(reg.email.clone()),
            first_name: non_empty(&reg.first_name),
            last_name: non_empty(&reg.last_name),
            role: None,
        };
        self.install(Session {
            user: user.clone(),
            access: AccessGrant::new(SecretString::from(resp.access_token)),
            refresh_token: Some(SecretString::from(resp.refresh_token)),
        });
        Ok(user)
    }

    /// Clear stored and in-memory session state. Storage failures are
    /// logged; the in-memory session is cleared regardless.
    pub fn logout(&self) {
        for key in SESSION_KEYS {
            if let Err(e) = self.inner.store.remove(key) {
                warn!(key, error = %e, "failed to clear stored credential");
            }
        }

        let had_session = {
            let mut guard = self.write();
            let had = guard.take().is_some();
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            had
        };
        self.set_state(SessionState::Anonymous);
        if had_session {
            info!("session ended");
        }
    }

    /// `PATCH /auth/me`, then re-read the profile and persist it.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, CoreError> {
        self.clear_last_error();
        let result = self.update_profile_inner(update).await;
        self.finish(result)
    }

    async fn update_profile_inner(&self, update: &ProfileUpdate) -> Result<UserProfile, CoreError> {
        validate::profile_update(update)?;
        let generation = self.generation();
        let base = self.user().ok_or_else(CoreError::not_authenticated)?;

        let pipeline = self.pipeline();
        let _: IgnoredAny = pipeline.send(&endpoints::update_me(update)).await?;
        let me: MeResponse = pipeline.send(&endpoints::me()).await?;

        let user = merge_profile(base, me);
        self.replace_user(generation, user.clone())?;
        Ok(user)
    }

    /// Change the account password. The new password must satisfy the
    /// same rule as registration.
    pub async fn change_password(
        &self,
        current: &SecretString,
        new: &SecretString,
    ) -> Result<(), CoreError> {
        self.clear_last_error();
        let result = self.change_password_inner(current, new).await;
        self.finish(result)
    }

    async fn change_password_inner(
        &self,
        current: &SecretString,
        new: &SecretString,
    ) -> Result<(), CoreError> {
        if current.expose_secret().is_empty() {
            return Err(CoreError::validation("current password is required"));
        }
        validate::password(new.expose_secret())?;
        let _: IgnoredAny = self
            .pipeline()
            .send(&endpoints::change_password(current, new))
            .await?;
        info!("password changed");
        Ok(())
    }

    // ── Transport ────────────────────────────────────────────────

    /// Send through the raw client under the per-call timeout. An elapsed
    /// timeout is reported as `Error::Timeout`, never as an auth failure.
    pub(crate) async fn send_raw<T: DeserializeOwned>(
        &self,
        req: &ApiRequest,
        bearer: Option<&SecretString>,
    ) -> Result<T, homelink_api::Error> {
        let timeout = self.inner.timeout;
        match tokio::time::timeout(timeout, self.inner.client.send(req, bearer)).await {
            Ok(result) => result,
            Err(_) => Err(homelink_api::Error::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    // ── Internals ────────────────────────────────────────────────

    fn read(&self) -> RwLockReadGuard<'_, Option<Session>> {
        self.inner
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Session>> {
        self.inner
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: SessionState) {
        self.inner.state.send_replace(state);
    }

    /// Settle on `Authenticated` or `Anonymous` depending on whether a
    /// session is held.
    fn settle_state(&self) {
        let state = if self.has_session() {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        };
        self.set_state(state);
    }

    fn clear_last_error(&self) {
        *self
            .inner
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn finish<T>(&self, result: Result<T, CoreError>) -> Result<T, CoreError> {
        if let Err(e) = &result {
            let message = match e {
                CoreError::Auth { message, .. }
                | CoreError::Network { message, .. }
                | CoreError::Validation { message } => message.clone(),
                other => other.to_string(),
            };
            *self
                .inner
                .last_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(message);
            self.settle_state();
        }
        result
    }

    fn load_persisted(&self) -> Result<Option<Session>, CoreError> {
        let store = &self.inner.store;
        let (Some(user_json), Some(access)) = (store.get(USER_KEY)?, store.get(ACCESS_TOKEN_KEY)?)
        else {
            return Ok(None);
        };
        let user: UserProfile = serde_json::from_str(&user_json).map_err(|e| CoreError::Storage {
            message: format!("stored user record is unreadable: {e}"),
        })?;
        let refresh_token = store.get(REFRESH_TOKEN_KEY)?.map(SecretString::from);
        Ok(Some(Session {
            user,
            access: AccessGrant::new(SecretString::from(access)),
            refresh_token,
        }))
    }

    fn persist(&self, session: &Session) -> Result<(), CoreError> {
        let store = &self.inner.store;
        let user_json = serde_json::to_string(&session.user).map_err(|e| CoreError::Storage {
            message: format!("cannot encode user record: {e}"),
        })?;
        store.set(USER_KEY, &user_json)?;
        store.set(ACCESS_TOKEN_KEY, session.access.token.expose_secret())?;
        match &session.refresh_token {
            Some(token) => store.set(REFRESH_TOKEN_KEY, token.expose_secret()),
            None => store.remove(REFRESH_TOKEN_KEY),
        }
    }

    fn install(&self, session: Session) {
        if let Err(e) = self.persist(&session) {
            warn!(error = %e, "failed to persist session; keeping it in memory only");
        }
        let username = session.user.username.clone();
        {
            let mut guard = self.write();
            *guard = Some(session);
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
        }
        self.set_state(SessionState::Authenticated);
        info!(user = %username, "session established");
    }

    /// Swap in a refreshed access token if the session is still the one
    /// the refresh started under.
    fn replace_access(&self, generation: u64, token: SecretString) -> bool {
        {
            let mut guard = self.write();
            if self.generation() != generation {
                return false;
            }
            let Some(session) = guard.as_mut() else {
                return false;
            };
            session.access = AccessGrant::new(token.clone());
        }
        if let Err(e) = self.inner.store.set(ACCESS_TOKEN_KEY, token.expose_secret()) {
            warn!(error = %e, "failed to persist refreshed access token");
        }
        self.set_state(SessionState::Authenticated);
        true
    }

    fn replace_user(&self, generation: u64, user: UserProfile) -> Result<(), CoreError> {
        {
            let mut guard = self.write();
            if self.generation() != generation {
                return Err(CoreError::not_authenticated());
            }
            let Some(session) = guard.as_mut() else {
                return Err(CoreError::not_authenticated());
            };
            session.user = user.clone();
        }
        match serde_json::to_string(&user) {
            Ok(json) => {
                if let Err(e) = self.inner.store.set(USER_KEY, &json) {
                    warn!(error = %e, "failed to persist updated profile");
                }
            }
            Err(e) => warn!(error = %e, "cannot encode updated profile"),
        }
        Ok(())
    }
}

/// Map a login/register failure: auth statuses become `InvalidCredentials`,
/// server-side validation statuses become `Validation`.
fn credential_error(err: homelink_api::Error) -> CoreError {
    match err {
        homelink_api::Error::Authentication { message }
        | homelink_api::Error::Api {
            status: 403,
            message,
        } => CoreError::auth(AuthFailure::InvalidCredentials, message),
        homelink_api::Error::Api {
            status: 400 | 409 | 422,
            message,
        } => CoreError::Validation { message },
        other => CoreError::from(other),
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}
