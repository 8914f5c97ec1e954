//! Session model
//!
//! The locally held record of an authenticated identity and its expiry,
//! plus the wire shapes the auth endpoints exchange.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::deserialize_id;

/// Lifetime assumed when the server omits an expiry
pub const DEFAULT_SESSION_LIFETIME_DAYS: i64 = 7;

/// Identity part of a session, persisted under the `user` key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// User ID (opaque, normalized to a string)
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub username: String,
    pub email: String,
}

/// Authenticated session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// User ID
    pub id: String,
    pub username: String,
    pub email: String,
    /// Expiration timestamp
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Build a session from an identity and its expiry
    pub fn new(identity: Identity, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: identity.id,
            username: identity.username,
            email: identity.email,
            expires_at,
        }
    }

    /// Build a session from an auth endpoint response
    ///
    /// Rejects an empty id or an expiry string that cannot be parsed.
    /// A missing expiry falls back to [`DEFAULT_SESSION_LIFETIME_DAYS`].
    pub fn from_auth_user(user: AuthUser) -> Result<Self, String> {
        if user.id.trim().is_empty() {
            return Err("identity has an empty id".to_string());
        }
        let expires_at = match user.expiry.as_deref() {
            Some(raw) => parse_expiry(raw)
                .ok_or_else(|| format!("unrecognized expiry timestamp '{}'", raw))?,
            None => Utc::now() + Duration::days(DEFAULT_SESSION_LIFETIME_DAYS),
        };
        Ok(Self {
            id: user.id,
            username: user.username,
            email: user.email,
            expires_at,
        })
    }

    /// Identity half, as persisted
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Identity returned by login, register, refresh and whoAmI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(
        default,
        alias = "expiresAt",
        alias = "expires_at",
        alias = "expiration"
    )]
    pub expiry: Option<String>,
}

/// Login request body
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Registration request body
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationDetails {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

impl RegistrationDetails {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        password_confirmation: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            password_confirmation: password_confirmation.into(),
        }
    }
}

/// Parse an ISO-8601-like expiry timestamp
///
/// Accepts RFC 3339, a date-time without offset (taken as UTC) and a bare
/// `YYYY-MM-DD` date (midnight UTC).
pub fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
