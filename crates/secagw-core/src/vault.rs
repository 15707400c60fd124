//! Credential vault
//!
//! Workspace provider tokens are sealed with AES-256-GCM before they reach
//! the store. Stored form:
//!
//! ```text
//! enc:v1:<base64(nonce[12] || ciphertext+tag)>
//! ```
//!
//! Values without the `enc:v1:` prefix are legacy plaintext rows and are
//! returned unchanged by [`CredentialVault::decrypt`].

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use thiserror::Error;

/// Versioned ciphertext prefix
pub const CIPHERTEXT_PREFIX: &str = "enc:v1:";

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("Refusing to encrypt an empty secret")]
    EmptySecret,

    #[error("Master key must be base64 encoding exactly 32 bytes")]
    InvalidKey,

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed")]
    DecryptionFailed,
}

pub type Result<T> = std::result::Result<T, VaultError>;

/// Encrypts and decrypts per-workspace provider secrets
#[derive(Clone)]
pub struct CredentialVault {
    cipher: Aes256Gcm,
}

impl CredentialVault {
    /// Build from a base64-encoded 32-byte master key
    pub fn from_base64(master_key: &str) -> Result<Self> {
        let key = BASE64
            .decode(master_key.trim())
            .map_err(|_| VaultError::InvalidKey)?;
        Self::from_bytes(&key)
    }

    pub fn from_bytes(key: &[u8]) -> Result<Self> {
        if key.len() != KEY_LEN {
            return Err(VaultError::InvalidKey);
        }
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| VaultError::InvalidKey)?;
        Ok(Self { cipher })
    }

    /// Fresh random master key, base64 encoded
    pub fn generate_key() -> String {
        let key = Aes256Gcm::generate_key(OsRng);
        BASE64.encode(key.as_slice())
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        if plaintext.is_empty() {
            return Err(VaultError::EmptySecret);
        }

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| VaultError::EncryptionFailed)?;

        let mut payload = Vec::with_capacity(NONCE_LEN + sealed.len());
        payload.extend_from_slice(nonce.as_slice());
        payload.extend_from_slice(&sealed);

        Ok(format!("{}{}", CIPHERTEXT_PREFIX, BASE64.encode(payload)))
    }

    pub fn decrypt(&self, stored: &str) -> Result<String> {
        let Some(encoded) = stored.strip_prefix(CIPHERTEXT_PREFIX) else {
            return Ok(stored.to_string());
        };

        let payload = BASE64
            .decode(encoded)
            .map_err(|_| VaultError::DecryptionFailed)?;
        if payload.len() < NONCE_LEN {
            return Err(VaultError::DecryptionFailed);
        }

        let (nonce, sealed) = payload.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| VaultError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| VaultError::DecryptionFailed)
    }
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault")
            .field("key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault() -> CredentialVault {
        CredentialVault::from_base64(&CredentialVault::generate_key()).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let vault = vault();
        let long = "x".repeat(4096);
        for token in ["t", "hcloud-token-0123456789", "ünïcødé 🔑", long.as_str()] {
            let sealed = vault.encrypt(token).unwrap();
            assert!(sealed.starts_with(CIPHERTEXT_PREFIX));
            assert_ne!(sealed, token);
            assert_eq!(vault.decrypt(&sealed).unwrap(), token);
        }
    }

    #[test]
    fn test_nonce_is_random() {
        let vault = vault();
        assert_ne!(vault.encrypt("same").unwrap(), vault.encrypt("same").unwrap());
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert_eq!(vault().encrypt(""), Err(VaultError::EmptySecret));
    }

    #[test]
    fn test_legacy_plaintext_passthrough() {
        let vault = vault();
        for legacy in ["", "plain-token", "enc:v2:abc", "ENC:V1:abc"] {
            assert_eq!(vault.decrypt(legacy).unwrap(), legacy);
        }
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let vault = vault();
        let sealed = vault.encrypt("secret-token").unwrap();
        let mut raw = BASE64.decode(&sealed[CIPHERTEXT_PREFIX.len()..]).unwrap();

        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let flipped = format!("{}{}", CIPHERTEXT_PREFIX, BASE64.encode(&raw));
        assert_eq!(vault.decrypt(&flipped), Err(VaultError::DecryptionFailed));

        let truncated = format!("{}{}", CIPHERTEXT_PREFIX, BASE64.encode(&raw[..NONCE_LEN + 4]));
        assert_eq!(vault.decrypt(&truncated), Err(VaultError::DecryptionFailed));

        let short = format!("{}{}", CIPHERTEXT_PREFIX, BASE64.encode([0u8; 5]));
        assert_eq!(vault.decrypt(&short), Err(VaultError::DecryptionFailed));

        let garbage = format!("{}not base64!", CIPHERTEXT_PREFIX);
        assert_eq!(vault.decrypt(&garbage), Err(VaultError::DecryptionFailed));
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = vault().encrypt("secret-token").unwrap();
        assert_eq!(vault().decrypt(&sealed), Err(VaultError::DecryptionFailed));
    }

    #[test]
    fn test_invalid_master_key() {
        assert_eq!(
            CredentialVault::from_base64("not base64").unwrap_err(),
            VaultError::InvalidKey
        );
        assert_eq!(
            CredentialVault::from_base64(&BASE64.encode([0u8; 16])).unwrap_err(),
            VaultError::InvalidKey
        );
        assert!(CredentialVault::from_base64(&BASE64.encode([7u8; 32])).is_ok());
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = BASE64.encode([7u8; 32]);
        let vault = CredentialVault::from_base64(&key).unwrap();
        assert!(!format!("{:?}", vault).contains(&key));
    }
}
