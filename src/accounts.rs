//! In-process account directory and session table.
//!
//! Stands in for the external auth collaborator: it turns a bearer token into a
//! principal and a principal into a preference list. Password storage here is
//! salted SHA-256 and is not a security contract.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::error::{AuthError, NotFoundError};

/// Authenticated identity (the account email).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal(String);

impl Principal {
    pub fn new(email: impl Into<String>) -> Self {
        Self(email.into())
    }

    pub fn email(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub email: String,
    pub preferences: Vec<String>,
    #[serde(rename = "isFirstTime")]
    pub is_first_time: bool,
}

#[derive(Debug)]
struct Account {
    profile: Profile,
    salt: String,
    password_hash: String,
}

/// Bearer sessions stop resolving after this long.
pub const DEFAULT_SESSION_LIFETIME: Duration = Duration::from_secs(7 * 24 * 3600);

#[derive(Debug, Clone)]
struct Session {
    principal: Principal,
    expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct AccountStore {
    accounts: RwLock<HashMap<String, Account>>,
    sessions: RwLock<HashMap<String, Session>>,
    session_lifetime: TimeDelta,
}

impl Default for AccountStore {
    fn default() -> Self {
        Self::with_session_lifetime(DEFAULT_SESSION_LIFETIME)
    }
}

impl AccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_lifetime(lifetime: Duration) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            session_lifetime: TimeDelta::from_std(lifetime).unwrap_or_else(|_| TimeDelta::days(36_500)),
        }
    }

    pub fn signup(&self, email: &str, password: &str) -> Result<Profile, AuthError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let mut accounts = write(&self.accounts);
        if accounts.contains_key(email) {
            return Err(AuthError::EmailTaken);
        }
        let salt = uuid::Uuid::new_v4().simple().to_string();
        let profile = Profile {
            email: email.to_string(),
            preferences: Vec::new(),
            is_first_time: true,
        };
        accounts.insert(
            email.to_string(),
            Account {
                profile: profile.clone(),
                password_hash: hash_password(&salt, password),
                salt,
            },
        );
        tracing::info!(target: "auth", email, "account created");
        Ok(profile)
    }

    /// Check credentials and open a session. Returns the bearer token.
    pub fn login(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        let ok = read(&self.accounts)
            .get(email)
            .is_some_and(|a| a.password_hash == hash_password(&a.salt, password));
        if !ok {
            tracing::warn!(target: "auth", email, "login rejected");
            return Err(AuthError::InvalidCredentials);
        }
        Ok(self.issue_session(&Principal::new(email)))
    }

    /// Open a session for an already-authenticated principal.
    pub fn issue_session(&self, principal: &Principal) -> String {
        self.issue_session_at(principal, Utc::now())
    }

    fn issue_session_at(&self, principal: &Principal, now: DateTime<Utc>) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        let expires_at = now
            .checked_add_signed(self.session_lifetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut sessions = write(&self.sessions);
        // tokens nobody logs out of would otherwise accumulate forever
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        let pruned = before - sessions.len();
        if pruned > 0 {
            tracing::debug!(target: "auth", pruned, "expired sessions dropped");
        }
        sessions.insert(
            token.clone(),
            Session {
                principal: principal.clone(),
                expires_at,
            },
        );
        token
    }

    /// Drop the session named by the request's bearer token, if any.
    pub fn logout(&self, headers: &HeaderMap) {
        if let Some(token) = bearer_token(headers) {
            write(&self.sessions).remove(token);
        }
    }

    pub fn current_principal(&self, headers: &HeaderMap) -> Option<Principal> {
        self.principal_at(headers, Utc::now())
    }

    fn principal_at(&self, headers: &HeaderMap, now: DateTime<Utc>) -> Option<Principal> {
        let token = bearer_token(headers)?;
        let session = read(&self.sessions).get(token).cloned()?;
        if session.expires_at > now {
            return Some(session.principal);
        }
        write(&self.sessions).remove(token);
        tracing::info!(target: "auth", email = session.principal.email(), "session expired");
        None
    }

    pub fn session_count(&self) -> usize {
        read(&self.sessions).len()
    }

    pub fn profile(&self, principal: &Principal) -> Result<Profile, NotFoundError> {
        read(&self.accounts)
            .get(principal.email())
            .map(|a| a.profile.clone())
            .ok_or(NotFoundError::Profile)
    }

    pub fn preferences_for(&self, principal: &Principal) -> Result<Vec<String>, NotFoundError> {
        self.profile(principal).map(|p| p.preferences)
    }

    /// Replace the preference list and mark onboarding as done.
    pub fn update_preferences(
        &self,
        principal: &Principal,
        preferences: Vec<String>,
    ) -> Result<(), NotFoundError> {
        let mut accounts = write(&self.accounts);
        let account = accounts
            .get_mut(principal.email())
            .ok_or(NotFoundError::Profile)?;
        account.profile.preferences = preferences;
        account.profile.is_first_time = false;
        Ok(())
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = raw.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

fn hash_password(salt: &str, password: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(g) => g,
        Err(poison) => poison.into_inner(),
    }
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(g) => g,
        Err(poison) => poison.into_inner(),
    }
}
