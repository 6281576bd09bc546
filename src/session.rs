//! Stateless session cookie: `identity:issuedAt:signature`.
//!
//! The signature is an HMAC-SHA256 over `identity:issuedAt` keyed by the
//! configured secret. Nothing is stored server side; every request
//! recomputes it.

use axum::http::{header, HeaderMap};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "session";
/// Cookie lifetime; tokens older than this are refused as well.
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 3600);
/// Tolerated clock skew for tokens stamped in the future.
const MAX_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("malformed session token")]
    Malformed,
    #[error("session signature mismatch")]
    BadSignature,
    #[error("session expired")]
    Expired,
}

pub fn sign(identity: &str, issued_at: i64, secret_key: &str) -> String {
    hex::encode(mac_for(identity, issued_at, secret_key).finalize().into_bytes())
}

fn mac_for(identity: &str, issued_at: i64, secret_key: &str) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(identity.as_bytes());
    mac.update(b":");
    mac.update(issued_at.to_string().as_bytes());
    mac
}

/// Token for `identity` stamped with the current time.
pub fn issue(identity: &str, secret_key: &str) -> String {
    issue_at(identity, chrono::Utc::now().timestamp(), secret_key)
}

pub fn issue_at(identity: &str, issued_at: i64, secret_key: &str) -> String {
    let signature = sign(identity, issued_at, secret_key);
    format!("{identity}:{issued_at}:{signature}")
}

/// Check a token against the current time and return its identity.
pub fn verify(token: &str, secret_key: &str) -> Result<String, SessionError> {
    verify_at(token, secret_key, chrono::Utc::now().timestamp())
}

pub fn verify_at(token: &str, secret_key: &str, now: i64) -> Result<String, SessionError> {
    let parts: Vec<&str> = token.split(':').collect();
    let [identity, issued_at, signature] = parts.as_slice() else {
        return Err(SessionError::Malformed);
    };
    let issued_at: i64 = issued_at.parse().map_err(|_| SessionError::Malformed)?;
    let provided = hex::decode(signature).map_err(|_| SessionError::BadSignature)?;

    // Constant-time comparison.
    mac_for(identity, issued_at, secret_key)
        .verify_slice(&provided)
        .map_err(|_| SessionError::BadSignature)?;

    let age = now - issued_at;
    if age > SESSION_TTL.as_secs() as i64 || age < -MAX_SKEW_SECS {
        return Err(SessionError::Expired);
    }
    Ok(identity.to_string())
}

/// `Set-Cookie` value for a fresh session.
pub fn session_cookie(token: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        SESSION_TTL.as_secs()
    )
}

/// `Set-Cookie` value that drops the session immediately.
pub fn cleared_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

pub fn extract_session_cookie(headers: &HeaderMap) -> Option<String> {
    for value in headers.get_all(header::COOKIE) {
        let Ok(cookie_str) = value.to_str() else {
            continue;
        };
        for part in cookie_str.split(';') {
            let part = part.trim();
            if let Some(val) = part.strip_prefix(&format!("{}=", SESSION_COOKIE)) {
                if !val.is_empty() {
                    return Some(val.to_string());
                }
            }
        }
    }
    None
}
