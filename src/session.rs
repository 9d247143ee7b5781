use axum::http::{header, HeaderMap};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::errors::AppError;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "feedforward_session";
pub const TOKEN_PREFIX: &str = "feedback_";
pub const SESSION_MAX_AGE_SECS: i64 = 30 * 24 * 60 * 60;

const COOKIE_ATTRIBUTES: &str = "Path=/; SameSite=Lax; Secure; HttpOnly";

/// Issues anonymous reviewer sessions and signs the feedback claims bound to them.
///
/// A claim remembers which feedback a session submitted for a project short
/// id, so the reviewer can come back and edit it. Claim cookie values are
/// `<feedback_id>.<hex hmac>`, the MAC covering `session|short_id|feedback_id`.
#[derive(Clone)]
pub struct SessionSigner {
    key: Vec<u8>,
}

impl SessionSigner {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    /// A fresh opaque session token.
    pub fn issue_token(&self) -> String {
        format!("{}{}", TOKEN_PREFIX, Uuid::new_v4().simple())
    }

    /// Session token from the request cookies, if well-formed.
    pub fn session_from(&self, headers: &HeaderMap) -> Option<String> {
        read_cookie(headers, SESSION_COOKIE).filter(|token| is_session_token(token))
    }

    pub fn sign_claim(
        &self,
        session: &str,
        short_id: &str,
        feedback_id: &str,
    ) -> Result<String, AppError> {
        check_identifier("shortId", short_id)?;
        check_identifier("feedbackId", feedback_id)?;

        let mac = self.mac_for(session, short_id, feedback_id);
        Ok(format!(
            "{}.{}",
            feedback_id,
            hex::encode(mac.finalize().into_bytes())
        ))
    }

    /// Returns the feedback id when `value` was signed for this session and short id.
    pub fn verify_claim(&self, session: &str, short_id: &str, value: &str) -> Option<String> {
        let (feedback_id, signature) = value.rsplit_once('.')?;
        let signature = hex::decode(signature).ok()?;
        self.mac_for(session, short_id, feedback_id)
            .verify_slice(&signature)
            .ok()?;
        Some(feedback_id.to_string())
    }

    fn mac_for(&self, session: &str, short_id: &str, feedback_id: &str) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length");
        mac.update(session.as_bytes());
        mac.update(b"|");
        mac.update(short_id.as_bytes());
        mac.update(b"|");
        mac.update(feedback_id.as_bytes());
        mac
    }
}

pub fn is_session_token(token: &str) -> bool {
    token
        .strip_prefix(TOKEN_PREFIX)
        .map(|rest| rest.len() == 32 && rest.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}

pub fn claim_cookie_name(short_id: &str) -> String {
    format!("{}{}", TOKEN_PREFIX, short_id)
}

pub fn session_cookie(token: &str) -> String {
    build_cookie(SESSION_COOKIE, token, SESSION_MAX_AGE_SECS)
}

pub fn build_cookie(name: &str, value: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; Max-Age={}; {}",
        name, value, max_age_secs, COOKIE_ATTRIBUTES
    )
}

/// A cookie that tells the browser to drop `name` immediately.
pub fn expired_cookie(name: &str) -> String {
    format!(
        "{}=; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; {}",
        name, COOKIE_ATTRIBUTES
    )
}

/// Value of the named cookie across all `Cookie` headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// Ids end up in cookie names and MAC input, so only allow URL-safe characters.
fn check_identifier(field: &str, value: &str) -> Result<(), AppError> {
    let valid = !value.is_empty()
        && value.len() <= 128
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(AppError::Validation(format!(
            "{} must be 1-128 characters of letters, digits, '-' or '_'",
            field
        )));
    }
    Ok(())
}

pub fn validate_short_id(short_id: &str) -> Result<(), AppError> {
    check_identifier("shortId", short_id)
}
