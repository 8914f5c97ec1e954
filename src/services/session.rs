//! Session store
//!
//! Owns the resident session, its persisted copy and the credential cookies
//! persisted next to it:
//! - login / register / whoAmI adopt a server-issued identity
//! - logout always clears local state, whatever the server says
//! - refresh replaces the session in place (used by re-authentication)
//! - restore adopts a persisted session at startup if it has not expired
//!
//! Every identity change resets the authorization cache and starts a fresh
//! admin check in the background.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use std::sync::Arc;
use tokio::sync::watch;

use super::admin::{AdminCheck, AuthorizationCache};
use crate::api::{
    ApiError, ApiRequest, ApiResponse, CallContext, ReauthMiddleware, SessionRecovery, Transport,
};
use crate::models::{parse_expiry, AuthUser, Credentials, Identity, RegistrationDetails, Session};
use crate::storage::{KeyValueStore, CREDENTIALS_KEY, EXPIRATION_KEY, USER_KEY};

const LOGIN_PATH: &str = "/auth/login";
const REGISTER_PATH: &str = "/auth/register";
const LOGOUT_PATH: &str = "/auth/logout";
const REFRESH_PATH: &str = "/auth/refresh";
const WHO_AM_I_PATH: &str = "/auth/whoAmI";

/// Error types for session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The server rejected the credentials
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Invalid input, rejected before any network call
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Transport failure or unexpected response
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SessionError {
    /// Map a transport error from an auth endpoint
    fn from_auth_failure(error: ApiError) -> Self {
        match error {
            ApiError::Status { status, message }
                if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN =>
            {
                SessionError::AuthenticationError(message)
            }
            other => SessionError::Api(other),
        }
    }
}

/// Resident session, its persisted copy and the transitions between them
pub struct SessionStore {
    transport: Arc<Transport>,
    storage: Arc<dyn KeyValueStore>,
    session: watch::Sender<Option<Session>>,
    authorization: Arc<AuthorizationCache>,
}

impl SessionStore {
    /// Create an anonymous store. Call [`restore`](Self::restore) to adopt a
    /// persisted session.
    pub fn new(transport: Arc<Transport>, storage: Arc<dyn KeyValueStore>) -> Self {
        let (session, receiver) = watch::channel(None);
        let authorization = Arc::new(AuthorizationCache::new(transport.clone(), receiver));
        Self {
            transport,
            storage,
            session,
            authorization,
        }
    }

    /// Register this store as the re-authentication target of `reauth`
    pub fn attach(self: &Arc<Self>, reauth: &ReauthMiddleware) {
        let recovery: Arc<dyn SessionRecovery> = self.clone();
        reauth.bind(Arc::downgrade(&recovery));
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// True iff a session is resident
    pub fn is_logged_in(&self) -> bool {
        self.session.borrow().is_some()
    }

    /// Clone of the resident session
    pub fn current(&self) -> Option<Session> {
        self.session.borrow().clone()
    }

    /// Watch the resident session
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }

    pub fn authorization(&self) -> &Arc<AuthorizationCache> {
        &self.authorization
    }

    /// Last resolved admin flag for the resident session
    pub fn is_admin(&self) -> bool {
        self.authorization.is_admin()
    }

    /// Shared admin check for the resident session
    pub fn admin_check(&self) -> AdminCheck {
        self.authorization.admin_check()
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Log in with username and password
    ///
    /// # Errors
    ///
    /// - `ValidationError` if username or password is empty (no request is made)
    /// - `AuthenticationError` if the server rejects the credentials
    /// - `Api` for any other failure
    ///
    /// Any failure after validation leaves the store logged out.
    pub async fn login(&self, credentials: Credentials) -> Result<Session, SessionError> {
        validate_credentials(&credentials)?;
        let request = ApiRequest::post(LOGIN_PATH).json(&credentials)?;
        let result = self.authenticate(request).await;
        if let Ok(session) = &result {
            tracing::info!("Logged in as {}", session.username);
        }
        result
    }

    /// Register a new account and log in as it
    ///
    /// Same contract as [`login`](Self::login). Validation rejects empty
    /// fields, an email without `@` and a mismatched password confirmation.
    pub async fn register(&self, details: RegistrationDetails) -> Result<Session, SessionError> {
        validate_registration(&details)?;
        let request = ApiRequest::post(REGISTER_PATH).json(&details)?;
        let result = self.authenticate(request).await;
        if let Ok(session) = &result {
            tracing::info!("Registered and logged in as {}", session.username);
        }
        result
    }

    /// Log out
    ///
    /// The remote call is best-effort; local state is cleared regardless.
    pub async fn logout(&self) {
        let request = ApiRequest::post(LOGOUT_PATH);
        if let Err(e) = self.transport.send_with(request, CallContext::without_reauth()).await {
            tracing::warn!("Remote logout failed, clearing local session anyway: {}", e);
        }
        self.clear().await;
        tracing::info!("Logged out");
    }

    /// Ask the server who the current credentials belong to
    ///
    /// An expired access cookie is refreshed like on any other call. Success
    /// behaves like login. Any remaining failure logs the store out and
    /// yields `None`.
    pub async fn who_am_i(&self) -> Option<Session> {
        let session = match self.transport.send(ApiRequest::get(WHO_AM_I_PATH)).await {
            Ok(response) => session_from_response(&response),
            Err(e) => Err(e),
        };

        match session {
            Ok(session) => {
                self.install(session.clone(), true).await;
                Some(session)
            }
            Err(e) => {
                tracing::info!("No active session on the server: {}", e);
                self.logout().await;
                None
            }
        }
    }

    /// Alias of [`who_am_i`](Self::who_am_i)
    pub async fn fetch_user(&self) -> Option<Session> {
        self.who_am_i().await
    }

    /// Obtain a fresh session from the refresh credential
    ///
    /// An identity in the response replaces the resident session; the
    /// authorization cache is only reset if the identity id changed. An empty
    /// response keeps the resident session.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let request = ApiRequest::post(REFRESH_PATH);
        let response = self
            .transport
            .send_with(request, CallContext::without_reauth())
            .await?;

        if response.is_empty() {
            self.persist_credentials().await;
            tracing::debug!("Session refreshed");
            return Ok(());
        }

        let session = session_from_response(&response)?;
        let changed = self
            .session
            .borrow()
            .as_ref()
            .map_or(true, |current| current.id != session.id);
        self.install(session, changed).await;
        tracing::debug!("Session refreshed with a new expiry");
        Ok(())
    }

    /// Adopt the persisted session and credentials if the session exists and
    /// has not expired
    ///
    /// Stale or unreadable entries are removed. Returns the adopted session.
    pub async fn restore(&self) -> Option<Session> {
        let user = self.read_key(USER_KEY).await;
        let expiration = self.read_key(EXPIRATION_KEY).await;
        if user.is_none() && expiration.is_none() {
            return None;
        }

        match parse_persisted(user.as_deref(), expiration.as_deref()) {
            Some(session) if !session.is_expired() => {
                self.restore_credentials().await;
                tracing::info!(
                    "Restored session for {} (expires {})",
                    session.username,
                    session.expires_at
                );
                self.install(session.clone(), true).await;
                Some(session)
            }
            Some(_) => {
                tracing::info!("Persisted session has expired, starting anonymous");
                self.forget().await;
                None
            }
            None => {
                tracing::warn!("Persisted session is unreadable, starting anonymous");
                self.forget().await;
                None
            }
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn authenticate(&self, request: ApiRequest) -> Result<Session, SessionError> {
        let result = match self.transport.send_with(request, CallContext::without_reauth()).await {
            Ok(response) => session_from_response(&response).map_err(SessionError::from),
            Err(e) => Err(SessionError::from_auth_failure(e)),
        };

        match result {
            Ok(session) => {
                self.install(session.clone(), true).await;
                Ok(session)
            }
            Err(e) => {
                self.clear().await;
                Err(e)
            }
        }
    }

    /// Make `session` resident and persist it with the current credentials
    async fn install(&self, session: Session, reset_authorization: bool) {
        self.persist(&session).await;
        self.persist_credentials().await;
        self.session.send_replace(Some(session));
        if reset_authorization {
            self.authorization.reset();
            self.authorization.spawn_check();
        }
    }

    /// Drop the resident session, the credentials, the persisted copies and
    /// the admin flag
    async fn clear(&self) {
        self.session.send_replace(None);
        self.authorization.reset();
        self.transport.clear_credentials();
        self.forget().await;
    }

    async fn persist(&self, session: &Session) {
        let identity = match serde_json::to_string(&session.identity()) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Failed to serialize session identity: {}", e);
                return;
            }
        };
        if let Err(e) = self.storage.set(USER_KEY, &identity).await {
            tracing::warn!("Failed to persist session: {:#}", e);
            return;
        }
        if let Err(e) = self
            .storage
            .set(EXPIRATION_KEY, &session.expires_at.to_rfc3339())
            .await
        {
            tracing::warn!("Failed to persist session expiry: {:#}", e);
        }
    }

    async fn persist_credentials(&self) {
        let result = match self.transport.credentials() {
            Ok(Some(snapshot)) => self.storage.set(CREDENTIALS_KEY, &snapshot).await,
            Ok(None) => self.storage.remove(CREDENTIALS_KEY).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!("Failed to persist credentials: {:#}", e);
        }
    }

    async fn restore_credentials(&self) {
        let Some(snapshot) = self.read_key(CREDENTIALS_KEY).await else {
            tracing::debug!("No persisted credentials, the first call will need a login");
            return;
        };
        if let Err(e) = self.transport.load_credentials(&snapshot) {
            tracing::warn!("Persisted credentials are unreadable: {:#}", e);
        }
    }

    async fn forget(&self) {
        for key in [USER_KEY, EXPIRATION_KEY, CREDENTIALS_KEY] {
            if let Err(e) = self.storage.remove(key).await {
                tracing::warn!("Failed to remove persisted '{}': {:#}", key, e);
            }
        }
    }

    async fn read_key(&self, key: &str) -> Option<String> {
        match self.storage.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Failed to read persisted '{}': {:#}", key, e);
                None
            }
        }
    }
}

#[async_trait]
impl SessionRecovery for SessionStore {
    async fn reauthenticate(&self) -> Result<(), ApiError> {
        self.refresh().await
    }

    async fn force_logout(&self) {
        self.logout().await;
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("session", &*self.session.borrow())
            .field("authorization", &self.authorization)
            .finish()
    }
}

fn session_from_response(response: &ApiResponse) -> Result<Session, ApiError> {
    let user: AuthUser = response.decode()?;
    Session::from_auth_user(user).map_err(ApiError::Decode)
}

fn parse_persisted(user: Option<&str>, expiration: Option<&str>) -> Option<Session> {
    let identity: Identity = serde_json::from_str(user?).ok()?;
    let expires_at = parse_expiry(expiration?)?;
    if identity.id.is_empty() {
        return None;
    }
    Some(Session::new(identity, expires_at))
}

/// Validate login input
fn validate_credentials(credentials: &Credentials) -> Result<(), SessionError> {
    if credentials.username.trim().is_empty() {
        return Err(SessionError::ValidationError("Username cannot be empty".to_string()));
    }
    if credentials.password.is_empty() {
        return Err(SessionError::ValidationError("Password cannot be empty".to_string()));
    }
    Ok(())
}

/// Validate registration input
fn validate_registration(details: &RegistrationDetails) -> Result<(), SessionError> {
    if details.username.trim().is_empty() {
        return Err(SessionError::ValidationError("Username cannot be empty".to_string()));
    }
    let email = details.email.trim();
    if email.is_empty() {
        return Err(SessionError::ValidationError("Email cannot be empty".to_string()));
    }
    if !email.contains('@') {
        return Err(SessionError::ValidationError("Invalid email format".to_string()));
    }
    if details.password.is_empty() {
        return Err(SessionError::ValidationError("Password cannot be empty".to_string()));
    }
    if details.password != details.password_confirmation {
        return Err(SessionError::ValidationError("Passwords do not match".to_string()));
    }
    Ok(())
}

/// Seconds until the session expires, for display
pub fn remaining_seconds(session: &Session) -> i64 {
    (session.expires_at - Utc::now()).num_seconds().max(0)
}
