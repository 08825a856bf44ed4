//! Session Manager - Authentication token lifecycle
//!
//! ```text
//! Unauthenticated --login ok--> Authenticated --expiry passes--> Expired
//!        ^                           ^                              |
//!        +------ login fails --------+-------- login ok ------------+
//! ```
//!
//! Expiry is detected lazily when a token is requested. There is no refresh:
//! an expired session stays expired until the user logs in again.

use crate::core::error::{PublishError, Result};
use crate::core::traits::Authenticator;
use crate::security::token_mask::mask_secret;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Login credentials
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"****")
            .finish()
    }
}

/// What the platform returns for a successful login
#[derive(Debug)]
pub struct LoginGrant {
    pub token: SecretString,
    pub expires_at: Option<DateTime<Utc>>,
}

/// An issued token with its validity window
#[derive(Clone)]
pub struct AuthSession {
    token: SecretString,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn new(token: SecretString, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token,
            issued_at,
            expires_at,
        }
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("token", &mask_secret(&self.token))
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
    Expired,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "unauthenticated"),
            Self::Authenticated => write!(f, "authenticated"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// Owner of the process-wide authentication state
///
/// `login` holds the write lock for the whole exchange, so a concurrent
/// `current_token` sees either the old session or the new one.
pub struct SessionManager {
    session: RwLock<Option<AuthSession>>,
    clock: Arc<dyn Clock>,
    default_ttl: chrono::Duration,
}

impl SessionManager {
    /// Create an unauthenticated manager using the system clock
    ///
    /// # Arguments
    ///
    /// * `default_ttl` - Lifetime assumed when a login reply carries no expiry
    pub fn new(default_ttl: chrono::Duration) -> Self {
        Self::with_clock(default_ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(default_ttl: chrono::Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            session: RwLock::new(None),
            clock,
            default_ttl,
        }
    }

    /// Adopt a session persisted by an earlier `login`
    pub async fn restore(&self, token: SecretString, expires_at: DateTime<Utc>) {
        let now = self.clock.now();
        let session = AuthSession::new(token, now.min(expires_at), expires_at);
        debug!(token = %mask_secret(session.token()), %expires_at, "restored session");
        *self.session.write().await = Some(session);
    }

    /// Exchange credentials for a new session
    ///
    /// Supersedes any previous session. On failure the manager is left
    /// unauthenticated and the error is an [`PublishError::Auth`].
    pub async fn login<A>(&self, authenticator: &A, credentials: &Credentials) -> Result<AuthSession>
    where
        A: Authenticator + ?Sized,
    {
        let mut slot = self.session.write().await;
        *slot = None;

        let grant = match authenticator.authenticate(credentials).await {
            Ok(grant) => grant,
            Err(error) => {
                warn!(user = %credentials.username, "login failed: {}", error);
                return Err(match error {
                    PublishError::Auth { .. } => error,
                    other => PublishError::Auth {
                        message: other.to_string(),
                    },
                });
            }
        };

        let issued_at = self.clock.now();
        let expires_at = grant.expires_at.unwrap_or_else(|| {
            issued_at
                .checked_add_signed(self.default_ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });
        let session = AuthSession::new(grant.token, issued_at, expires_at);

        info!(
            user = %credentials.username,
            token = %mask_secret(session.token()),
            %expires_at,
            "logged in"
        );
        *slot = Some(session.clone());
        Ok(session)
    }

    pub async fn state(&self) -> SessionState {
        match self.session.read().await.as_ref() {
            None => SessionState::Unauthenticated,
            Some(session) if session.is_expired_at(self.clock.now()) => SessionState::Expired,
            Some(_) => SessionState::Authenticated,
        }
    }

    /// Token for the next request
    ///
    /// Fails fast with [`PublishError::AuthExpired`] once the expiry has
    /// passed and with [`PublishError::NotAuthenticated`] before any login.
    pub async fn current_token(&self) -> Result<SecretString> {
        match self.session.read().await.as_ref() {
            None => Err(PublishError::NotAuthenticated),
            Some(session) if session.is_expired_at(self.clock.now()) => {
                Err(PublishError::AuthExpired {
                    expired_at: session.expires_at(),
                })
            }
            Some(session) => Ok(session.token().clone()),
        }
    }

    pub async fn session(&self) -> Option<AuthSession> {
        self.session.read().await.clone()
    }

    pub async fn logout(&self) {
        *self.session.write().await = None;
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}
