use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::config::Settings;
use crate::error::Error;
use crate::permissions::ActionType;
use crate::schema::{Id, User, UserRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
    Reset,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenClaims {
    pub sub: Id,
    pub kind: TokenKind,
    iat: i64,
    exp: i64,
}

impl TokenClaims {
    fn new(sub: Id, kind: TokenKind, ttl: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub,
            kind,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }
}

/// Resolved identity for an authenticated call. Built from the central
/// user row, never from request parameters.
#[derive(Debug, Clone)]
pub struct SessionData {
    pub user_id: Id,
    pub username: String,
    pub role: UserRole,
    pub is_admin: bool,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), Error> {
        if !action.permitted(self) {
            return Err(Error::Forbidden(String::from(
                "You don't have permission to perform this action",
            )));
        }
        Ok(())
    }
}

impl From<&User> for SessionData {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
            is_admin: user.role == UserRole::Admin,
        }
    }
}

fn ttl_for(kind: TokenKind, settings: &Settings) -> Duration {
    match kind {
        TokenKind::Access => Duration::minutes(settings.access_token_ttl_minutes),
        TokenKind::Refresh => Duration::days(settings.refresh_token_ttl_days),
        TokenKind::Reset => Duration::hours(settings.reset_token_ttl_hours),
    }
}

fn signing_key(settings: &Settings) -> Result<Hmac<Sha256>, Error> {
    Hmac::new_from_slice(settings.secret_key.as_bytes())
        .map_err(|_| Error::Storage(String::from("invalid signing key")))
}

pub fn issue_token(user_id: Id, kind: TokenKind, settings: &Settings) -> Result<String, Error> {
    let key = signing_key(settings)?;
    let claims = TokenClaims::new(user_id, kind, ttl_for(kind, settings));

    claims
        .sign_with_key(&key)
        .map_err(|_| Error::Storage(String::from("token signing failed")))
}

/// Signature-checks, expiry-checks, and rejects kind mismatches. Every
/// failure collapses to `None`; callers map that to one unauthenticated
/// outcome without distinguishing the reason.
pub fn verify_token(token: &str, expected: TokenKind, settings: &Settings) -> Option<TokenClaims> {
    let key = signing_key(settings).ok()?;
    let claims: TokenClaims = token.verify_with_key(&key).ok()?;

    if claims.kind != expected {
        return None;
    }
    if claims.exp <= Utc::now().timestamp() {
        return None;
    }

    Some(claims)
}
