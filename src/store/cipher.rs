//! Document encryption capability.
//!
//! Key management is outside this engine; the store consumes a sealed/open
//! capability and nothing else. The default implementation is AES-256-GCM
//! with the nonce derived from the payload digest, so identical plaintext
//! seals to identical ciphertext and the backing store's content addressing
//! can detect duplicate uploads.

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, Key, KeyInit};
use aes_gcm::Aes256Gcm;
use sha2::{Digest, Sha256};
use thiserror::Error;

const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("sealing failed")]
    Seal,

    #[error("ciphertext invalid or wrong key")]
    Open,

    #[error("invalid key material: {0}")]
    InvalidKey(String),
}

pub trait DocumentCipher: Send + Sync {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError>;
    fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, CipherError>;
}

/// AES-256-GCM with digest-derived nonces, prefixed to the ciphertext.
pub struct Aes256GcmCipher {
    cipher: Aes256Gcm,
}

impl Aes256GcmCipher {
    pub fn new(key_bytes: [u8; 32]) -> Self {
        let key = Key::<Aes256Gcm>::from(key_bytes);
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }

    pub fn from_hex(key_hex: &str) -> Result<Self, CipherError> {
        let bytes = hex::decode(key_hex).map_err(|e| CipherError::InvalidKey(e.to_string()))?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CipherError::InvalidKey("key must be 32 bytes".to_string()))?;
        Ok(Self::new(key))
    }
}

impl DocumentCipher for Aes256GcmCipher {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let digest = Sha256::digest(plaintext);
        let nonce = GenericArray::from_slice(&digest[..NONCE_LEN]);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| CipherError::Seal)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, CipherError> {
        if sealed.len() <= NONCE_LEN {
            return Err(CipherError::Open);
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        self.cipher
            .decrypt(GenericArray::from_slice(nonce), ciphertext)
            .map_err(|_| CipherError::Open)
    }
}

impl std::fmt::Debug for Aes256GcmCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Aes256GcmCipher([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> Aes256GcmCipher {
        Aes256GcmCipher::new([0x42u8; 32])
    }

    #[test]
    fn test_seal_open_round_trip() {
        let plaintext = b"patient chart contents";
        let sealed = cipher().seal(plaintext).unwrap();
        assert_ne!(&sealed[NONCE_LEN..], plaintext.as_slice());

        let opened = cipher().open(&sealed).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn test_identical_plaintext_seals_identically() {
        let plaintext = b"duplicate detection depends on this";
        assert_eq!(
            cipher().seal(plaintext).unwrap(),
            cipher().seal(plaintext).unwrap()
        );
    }

    #[test]
    fn test_open_rejects_tampered_ciphertext() {
        let mut sealed = cipher().seal(b"original").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(matches!(cipher().open(&sealed), Err(CipherError::Open)));
    }

    #[test]
    fn test_open_rejects_truncated_input() {
        assert!(matches!(cipher().open(&[0u8; 5]), Err(CipherError::Open)));
    }

    #[test]
    fn test_debug_is_redacted() {
        assert_eq!(format!("{:?}", cipher()), "Aes256GcmCipher([REDACTED])");
    }
}
