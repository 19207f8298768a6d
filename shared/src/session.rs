//! Stored operator session and the seven-day expiry policy.
//!
//! The login surface writes three storage keys; this module owns reading
//! them back. Expiry is a pure comparison so the decision is the same no
//! matter which code path asks.

use serde::{Deserialize, Serialize};

use crate::{UnixTimeMs, SESSION_MAX_AGE_MS};

pub const KEY_USER: &str = "user";
pub const KEY_TOKEN: &str = "token";
pub const KEY_LOGIN_TIMESTAMP: &str = "loginTimestamp";

/// Every key the session occupies, in clearing order.
pub const ALL_KEYS: [&str; 3] = [KEY_USER, KEY_TOKEN, KEY_LOGIN_TIMESTAMP];

/// Profile blob stored at login time. Fields default individually so an
/// older stored shape still restores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoredUser {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: StoredUser,
    pub token: String,
    pub logged_in_at: UnixTimeMs,
}

/// Accumulates the three storage reads while they are in flight.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionLoad {
    pub user: Option<StoredUser>,
    pub token: Option<String>,
    pub login_timestamp: Option<UnixTimeMs>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionVerdict {
    Active(Session),
    /// Nothing (usable) in storage.
    Absent,
    /// Credentials present but past [`SESSION_MAX_AGE_MS`], or with a
    /// missing or mangled login timestamp. Fails closed.
    Expired,
}

/// True once `now` is more than [`SESSION_MAX_AGE_MS`] past the login.
/// A clock that moved backwards reads as age zero.
#[must_use]
pub fn is_expired(logged_in_at: UnixTimeMs, now: UnixTimeMs) -> bool {
    now.0.saturating_sub(logged_in_at.0) > SESSION_MAX_AGE_MS
}

#[must_use]
pub fn evaluate(load: &SessionLoad, now: UnixTimeMs) -> SessionVerdict {
    let (Some(user), Some(token)) = (load.user.as_ref(), load.token.as_ref()) else {
        return SessionVerdict::Absent;
    };
    let Some(logged_in_at) = load.login_timestamp else {
        return SessionVerdict::Expired;
    };
    if is_expired(logged_in_at, now) {
        return SessionVerdict::Expired;
    }
    SessionVerdict::Active(Session {
        user: user.clone(),
        token: token.clone(),
        logged_in_at,
    })
}

/// JSON profile written by the login surface. `None` for bytes that do not
/// parse; a mangled profile reads the same as no profile.
#[must_use]
pub fn parse_user(bytes: &[u8]) -> Option<StoredUser> {
    serde_json::from_slice(bytes).ok()
}

/// Bare string, not JSON.
#[must_use]
pub fn parse_token(bytes: &[u8]) -> Option<String> {
    let token = String::from_utf8(bytes.to_vec()).ok()?;
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_owned())
}

/// Stringified epoch milliseconds.
#[must_use]
pub fn parse_login_timestamp(bytes: &[u8]) -> Option<UnixTimeMs> {
    let raw = std::str::from_utf8(bytes).ok()?;
    raw.trim().parse().ok().map(UnixTimeMs)
}
