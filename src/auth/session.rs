//! Session management
//!
//! Sessions are HMAC-signed bearer tokens handed to the frontend after
//! login. No server-side session storage needed.

use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::AppError;
use crate::github::GitHubUser;

type HmacSha256 = Hmac<Sha256>;

/// User session data
///
/// Carried inside the signed token. Contains the GitHub identity the
/// stored GitHub token is keyed by.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    /// GitHub user ID
    pub github_id: u64,
    /// GitHub username
    pub github_username: String,
    /// When session was created
    pub created_at: DateTime<Utc>,
    /// When session expires
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Start a session for a freshly authenticated GitHub user
    ///
    /// # Arguments
    /// * `user` - Profile returned by GitHub
    /// * `max_age_seconds` - Session lifetime
    pub fn for_user(user: &GitHubUser, max_age_seconds: i64) -> Self {
        let now = Utc::now();
        Self {
            github_id: user.id,
            github_username: user.login.clone(),
            created_at: now,
            expires_at: now + Duration::seconds(max_age_seconds),
        }
    }

    /// Check if session is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

fn mac_for(secret: &str) -> Result<HmacSha256, AppError> {
    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| AppError::Encryption(e.to_string()))
}

/// Create a signed session token
///
/// Token format: base64(payload).base64(hmac_sha256(payload))
///
/// # Arguments
/// * `session` - Session data to encode
/// * `secret` - HMAC secret key
pub fn create_session_token(session: &Session, secret: &str) -> Result<String, AppError> {
    let payload = serde_json::to_vec(session).map_err(|e| AppError::Internal(e.into()))?;
    let payload_b64 = general_purpose::URL_SAFE_NO_PAD.encode(payload);

    let mut mac = mac_for(secret)?;
    mac.update(payload_b64.as_bytes());
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", payload_b64, signature_b64))
}

/// Verify and decode a session token
///
/// # Errors
/// `InvalidSignature` if the signature does not match, `Unauthorized`
/// if the token is malformed or expired
pub fn verify_session_token(token: &str, secret: &str) -> Result<Session, AppError> {
    let (payload_b64, signature_b64) = token.split_once('.').ok_or(AppError::Unauthorized)?;
    if signature_b64.contains('.') {
        return Err(AppError::Unauthorized);
    }

    let signature = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AppError::Unauthorized)?;

    let mut mac = mac_for(secret)?;
    mac.update(payload_b64.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| AppError::InvalidSignature)?;

    let payload = general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AppError::Unauthorized)?;
    let session: Session = serde_json::from_slice(&payload).map_err(|_| AppError::Unauthorized)?;

    if session.is_expired() {
        return Err(AppError::Unauthorized);
    }

    Ok(session)
}
