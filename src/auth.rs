//! User registration and session tokens.
//!
//! Passwords are stored as SHA-256 digests salted with the user id. Session
//! tokens are random UUIDs that expire after a fixed lifetime. This is
//! enough to keep experiments of different users apart; it is not meant to
//! withstand a determined attacker.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{AuthFailure, Result};

/// Identifier of a user (typically an email address).
pub type UserId = String;

/// Registration payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Registration {
    /// The new user's id.
    #[serde(rename = "_id")]
    pub user_id: UserId,
    /// Display name.
    pub name: String,
    /// Password.
    pub password: String,
    /// Must equal `password`.
    pub confirm_password: String,
}

/// Login payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Credentials {
    /// The user's id.
    #[serde(rename = "_id")]
    pub user_id: UserId,
    /// The user's password.
    pub password: String,
}

/// An authenticated session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// The logged-in user.
    pub user_id: UserId,
    /// Opaque bearer token.
    pub token: String,
    /// When the token stops being accepted.
    pub expires_at: DateTime<Utc>,
}

struct User {
    name: String,
    password_digest: String,
}

/// In-memory user and session registry.
pub struct AuthStore {
    users: RwLock<HashMap<UserId, User>>,
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl AuthStore {
    /// Creates an empty store whose sessions live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Register a new user.
    ///
    /// # Errors
    ///
    /// Returns [`AuthFailure::InvalidRegistration`] for an empty id or
    /// password or mismatched passwords, and [`AuthFailure::AlreadyRegistered`]
    /// if the id is taken.
    pub fn register(&self, registration: Registration) -> Result<UserId> {
        let Registration {
            user_id,
            name,
            password,
            confirm_password,
        } = registration;
        if user_id.trim().is_empty() {
            return Err(AuthFailure::InvalidRegistration("empty user id".into()).into());
        }
        if password.is_empty() {
            return Err(AuthFailure::InvalidRegistration("empty password".into()).into());
        }
        if password != confirm_password {
            return Err(AuthFailure::InvalidRegistration("passwords do not match".into()).into());
        }

        let mut users = self.users.write();
        if users.contains_key(&user_id) {
            return Err(AuthFailure::AlreadyRegistered(user_id).into());
        }
        let password_digest = digest(&user_id, &password);
        users.insert(
            user_id.clone(),
            User {
                name,
                password_digest,
            },
        );
        Ok(user_id)
    }

    /// Display name of a registered user.
    #[must_use]
    pub fn display_name(&self, user_id: &str) -> Option<String> {
        self.users.read().get(user_id).map(|u| u.name.clone())
    }

    /// Check credentials and open a session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthFailure::UnknownUser`] or [`AuthFailure::InvalidPassword`].
    pub fn login(&self, credentials: &Credentials) -> Result<Session> {
        {
            let users = self.users.read();
            let Some(user) = users.get(&credentials.user_id) else {
                return Err(AuthFailure::UnknownUser(credentials.user_id.clone()).into());
            };
            if user.password_digest != digest(&credentials.user_id, &credentials.password) {
                return Err(AuthFailure::InvalidPassword.into());
            }
        }

        let session = Session {
            user_id: credentials.user_id.clone(),
            token: Uuid::new_v4().to_string(),
            expires_at: Utc::now() + self.ttl,
        };
        let mut sessions = self.sessions.write();
        sessions.retain(|_, s| s.expires_at > Utc::now());
        sessions.insert(session.token.clone(), session.clone());
        Ok(session)
    }

    /// Close a session. Unknown tokens are ignored.
    pub fn logout(&self, token: &str) {
        self.sessions.write().remove(token);
    }

    /// Resolve a token to its user.
    ///
    /// # Errors
    ///
    /// Returns [`AuthFailure::InvalidToken`] for an unknown token and
    /// [`AuthFailure::ExpiredToken`] for an expired one (which is then
    /// forgotten).
    pub fn authenticate(&self, token: &str) -> Result<UserId> {
        {
            let sessions = self.sessions.read();
            let Some(session) = sessions.get(token) else {
                return Err(AuthFailure::InvalidToken.into());
            };
            if session.expires_at > Utc::now() {
                return Ok(session.user_id.clone());
            }
        }
        self.sessions.write().remove(token);
        Err(AuthFailure::ExpiredToken.into())
    }
}

fn digest(user_id: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}
