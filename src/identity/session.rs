//! Server-issued session tokens.
//!
//! Sessions are HS256 JWTs whose claims may carry the wallet address that
//! signed in. An invalid or expired token is treated as the absence of a
//! session, not as an error: the resolver then falls back to the
//! client-connected wallet path.

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Session identifier.
    pub sub: String,
    /// Wallet address recorded at sign-in, if any.
    pub wallet: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn new(session_id: &str, wallet: Option<&str>, ttl_secs: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: session_id.to_string(),
            wallet: wallet.map(|w| w.to_string()),
            iat: now,
            exp: now + ttl_secs,
        }
    }
}

/// Decode and verify a session token. Returns `None` for anything that is
/// not a currently valid session.
pub fn decode_session_token(token: &str, secret: &[u8]) -> Option<SessionClaims> {
    let validation = Validation::default();
    decode::<SessionClaims>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .ok()
}

/// Sign a session token. Session issuance itself belongs to the identity
/// provider; this exists for the dev binary and tests.
pub fn issue_session_token(
    claims: &SessionClaims,
    secret: &[u8],
) -> Result<String, jsonwebtoken::errors::Error> {
    encode(&Header::default(), claims, &EncodingKey::from_secret(secret))
}
