//! Signed session tokens.
//!
//! A token is `base64url(claims JSON) "." hex(MAC)`, where the MAC is a
//! BLAKE3 keyed hash of the base64 segment. The MAC key is derived from the
//! 32-byte server secret so the raw secret never keys anything directly.
//!
//! Verification is stateless: the same token, secret and clock always give
//! the same answer.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::constants::{KDF_CONTEXT_SESSION_MAC, SESSION_SECRET_SIZE};
use crate::error::SessionError;
use crate::types::Principal;

pub type SessionSecret = [u8; SESSION_SECRET_SIZE];

/// Claims carried inside a session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    /// Stable user id.
    pub sub: String,
    pub email: String,
    /// Display name.
    pub name: String,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds.
    pub exp: i64,
}

impl SessionClaims {
    pub fn into_principal(self) -> Principal {
        Principal {
            id: self.sub,
            email: self.email,
            display_name: self.name,
        }
    }
}

pub fn generate_session_secret() -> SessionSecret {
    let mut secret = [0u8; SESSION_SECRET_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut secret);
    secret
}

fn mac_key(secret: &SessionSecret) -> [u8; 32] {
    blake3::derive_key(KDF_CONTEXT_SESSION_MAC, secret)
}

fn sign(secret: &SessionSecret, payload: &str) -> blake3::Hash {
    blake3::keyed_hash(&mac_key(secret), payload.as_bytes())
}

/// Issue a token for `principal`, valid for `ttl` from `issued_at`.
///
/// Used by the identity issuer and by tests; request handlers only verify.
pub fn issue_session_token(
    principal: &Principal,
    secret: &SessionSecret,
    issued_at: DateTime<Utc>,
    ttl: Duration,
) -> String {
    let claims = SessionClaims {
        sub: principal.id.clone(),
        email: principal.email.clone(),
        name: principal.display_name.clone(),
        iat: issued_at.timestamp(),
        exp: (issued_at + ttl).timestamp(),
    };

    // Serializing a struct of strings and integers cannot fail.
    let json = serde_json::to_vec(&claims).unwrap_or_default();
    let payload = URL_SAFE_NO_PAD.encode(json);
    let mac = sign(secret, &payload);

    format!("{payload}.{}", mac.to_hex())
}

/// Verify `token` against `secret` at time `now` and extract the caller.
pub fn verify_session_token(
    token: &str,
    secret: &SessionSecret,
    now: DateTime<Utc>,
) -> Result<Principal, SessionError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(SessionError::Missing);
    }

    let (payload, mac_hex) = token.split_once('.').ok_or(SessionError::Malformed)?;

    let presented = hex::decode(mac_hex).map_err(|_| SessionError::Malformed)?;
    if presented.len() != blake3::OUT_LEN {
        return Err(SessionError::Malformed);
    }

    let expected = sign(secret, payload);
    if expected.as_bytes()[..].ct_eq(&presented[..]).unwrap_u8() != 1 {
        return Err(SessionError::BadSignature);
    }

    let json = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| SessionError::Malformed)?;
    let mut claims: SessionClaims =
        serde_json::from_slice(&json).map_err(|_| SessionError::Malformed)?;

    if now.timestamp() >= claims.exp {
        return Err(SessionError::Expired);
    }

    // Participant lists hold trimmed emails; the caller must match them.
    let email = claims.email.trim();
    if email.is_empty() {
        return Err(SessionError::Malformed);
    }
    if email.len() != claims.email.len() {
        claims.email = email.to_string();
    }

    Ok(claims.into_principal())
}
