//! Environment-driven server configuration.

use secrecy::Secret;
use std::env;

/// Documents up to 100 MB must be accepted.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Page size for the bounded fallback scan during unpin lookup.
pub const DEFAULT_DELETE_SCAN_PAGE: usize = 100;

/// Seconds a failed teardown stays visible before the flag clears.
pub const DEFAULT_TEARDOWN_GRACE_SECS: u64 = 3;

#[derive(Debug)]
pub struct ServerSettings {
    pub port: u16,
    /// Base URL of the pinning provider's management API.
    pub pin_api_url: String,
    /// Base URL of the provider's content gateway (retrieval by address).
    pub pin_gateway_url: String,
    /// Bearer credential for the pinning API. Held server-side only; when
    /// absent, uploads are rejected rather than attempted unauthenticated.
    pub pin_credential: Option<Secret<String>>,
    pub max_upload_bytes: usize,
    pub delete_scan_page: usize,
    /// Hex-encoded 32-byte document key. When absent the binary generates an
    /// ephemeral key at startup.
    pub document_key_hex: Option<Secret<String>>,
    /// HMAC secret for server-issued session tokens.
    pub session_secret: Secret<String>,
    pub redis_url: String,
    pub nats_url: String,
    pub nats_subject: String,
    pub teardown_grace_secs: u64,
}

pub fn load_config() -> Result<ServerSettings, Box<dyn std::error::Error>> {
    Ok(ServerSettings {
        port: env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()?,
        pin_api_url: env::var("PIN_API_URL")
            .unwrap_or_else(|_| "https://api.pinning.localhost".to_string()),
        pin_gateway_url: env::var("PIN_GATEWAY_URL")
            .unwrap_or_else(|_| "https://gateway.pinning.localhost".to_string()),
        pin_credential: env::var("PIN_API_JWT").ok().map(Secret::new),
        max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        delete_scan_page: env::var("DELETE_SCAN_PAGE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_DELETE_SCAN_PAGE),
        document_key_hex: env::var("DOCUMENT_KEY_HEX").ok().map(Secret::new),
        session_secret: Secret::new(
            env::var("SESSION_JWT_SECRET").unwrap_or_else(|_| "insecure-dev-secret".to_string()),
        ),
        redis_url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string()),
        nats_url: env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string()),
        nats_subject: env::var("NATS_SUBJECT").unwrap_or_else(|_| "medvault.audit".to_string()),
        teardown_grace_secs: env::var("TEARDOWN_GRACE_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TEARDOWN_GRACE_SECS),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_defaults_without_env() {
        // Use a child-free view: only assert fields that have no env override
        // in the test environment.
        if env::var("PORT").is_ok() {
            return;
        }
        let settings = load_config().unwrap();
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert_eq!(settings.delete_scan_page, DEFAULT_DELETE_SCAN_PAGE);
        assert_eq!(settings.nats_subject, "medvault.audit");
    }

    #[test]
    fn test_pin_credential_override() {
        env::set_var("MEDVAULT_TEST_JWT", "token-value");
        let credential = env::var("MEDVAULT_TEST_JWT").ok().map(Secret::new);
        assert_eq!(
            credential.as_ref().map(|c| c.expose_secret().as_str()),
            Some("token-value")
        );
        env::remove_var("MEDVAULT_TEST_JWT");
    }
}
