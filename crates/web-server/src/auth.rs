//! Stateless sessions and password digests.
//!
//! A session token is `<user_id>.<expires_unix>.<hex hmac>`, signed with the
//! configured session secret. It is accepted either as an
//! `Authorization: Bearer` header or as the `folio_session` cookie.
//! Passwords are stored as bcrypt digests.

use crate::{AppState, error::AppError};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "folio_session";

fn mac_for(key: &[u8]) -> HmacSha256 {
    HmacSha256::new_from_slice(key).expect("HMAC can take key of any size")
}

/// Issues and checks session tokens.
#[derive(Clone)]
pub struct SessionKeys {
    secret: Arc<[u8]>,
    ttl: Duration,
}

impl SessionKeys {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            secret: Arc::from(secret.as_bytes()),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    fn sign(&self, payload: &str) -> String {
        let mut mac = mac_for(&self.secret);
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    pub fn issue(&self, user_id: Uuid, now: DateTime<Utc>) -> String {
        let expires = (now + self.ttl).timestamp();
        let payload = format!("{user_id}.{expires}");
        let signature = self.sign(&payload);
        format!("{payload}.{signature}")
    }

    /// Returns the user a token belongs to, or `None` when it is malformed,
    /// forged, or expired.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Option<Uuid> {
        let (payload, signature) = token.rsplit_once('.')?;
        let (user_id, expires) = payload.split_once('.')?;

        let signature = hex::decode(signature).ok()?;
        let mut mac = mac_for(&self.secret);
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).ok()?;

        let expires: i64 = expires.parse().ok()?;
        if now.timestamp() >= expires {
            return None;
        }
        Uuid::parse_str(user_id).ok()
    }

    /// `Set-Cookie` value carrying a fresh token.
    pub fn cookie(&self, token: &str) -> String {
        format!(
            "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.ttl.num_seconds()
        )
    }
}

/// `Set-Cookie` value that clears the session cookie.
pub fn expired_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

pub const PASSWORD_COST: u32 = 10;

/// Salted bcrypt digest of `password`. bcrypt is deliberately slow, so it runs
/// on the blocking pool.
pub async fn hash_password(password: String) -> Result<String, AppError> {
    let digest = tokio::task::spawn_blocking(move || bcrypt::hash(password, PASSWORD_COST)).await??;
    Ok(digest)
}

/// Checks `password` against a stored bcrypt digest.
pub async fn verify_password(password: String, stored: String) -> Result<bool, AppError> {
    let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &stored)).await??;
    Ok(matches)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

fn cookie_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| token)
}

/// The authenticated caller. Handlers taking this extractor reject
/// anonymous requests with 401.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .or_else(|| cookie_token(&parts.headers))
            .ok_or(AppError::Unauthorized)?;

        state
            .sessions
            .verify(token, Utc::now())
            .map(AuthUser)
            .ok_or(AppError::Unauthorized)
    }
}
