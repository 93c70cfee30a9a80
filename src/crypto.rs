// src/crypto.rs
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use argon2::Argon2;
use base64::Engine;
use rand::RngCore;
use thiserror::Error;

use crate::core::config::KdfParams;
use crate::db::{Database, DbError};

const SALT_KEY: &str = "details_salt";
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Argon2 error: {0}")]
    Argon2Error(String),

    #[error("Encryption error: {0}")]
    EncryptionError(String),

    #[error("Decryption error: {0}")]
    DecryptionError(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Key size error: expected 32 bytes, got {0}")]
    KeySizeError(usize),

    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

pub type Result<T> = std::result::Result<T, CryptoError>;

// Load the stored salt, creating it first if this database has none.
// The stored value is re-read after the insert so concurrent callers converge on one salt.
async fn load_or_create_salt(db: &Database) -> Result<Vec<u8>> {
    let engine = base64::engine::general_purpose::STANDARD;

    if db.get_config_value(SALT_KEY).await?.is_none() {
        let mut salt = vec![0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        if db.insert_config_value_if_absent(SALT_KEY, &engine.encode(&salt)).await? {
            log::info!("Generated new salt for password details encryption");
        }
    }

    let salt_b64 = db
        .get_config_value(SALT_KEY)
        .await?
        .ok_or_else(|| CryptoError::InvalidFormat("Salt missing after insert".into()))?;

    engine
        .decode(salt_b64)
        .map_err(|_| CryptoError::InvalidFormat("Invalid salt format".into()))
}

/// Whether a details salt exists, i.e. details in `db` were written encrypted.
pub async fn has_details_salt(db: &Database) -> Result<bool> {
    Ok(db.get_config_value(SALT_KEY).await?.is_some())
}

/// Derive a 256-bit key from a passphrase with Argon2id.
pub fn derive_key(passphrase: &str, salt: &[u8], params: &KdfParams) -> Result<[u8; KEY_LEN]> {
    let argon2_params = argon2::Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| CryptoError::Argon2Error(e.to_string()))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, argon2_params);

    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| CryptoError::Argon2Error(e.to_string()))?;
    Ok(key)
}

/// Encrypts the `password_Details` field at rest.
///
/// Stored form is base64(nonce || ciphertext) with a fresh 96-bit nonce per value.
#[derive(Clone)]
pub struct DetailsCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for DetailsCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetailsCipher").finish_non_exhaustive()
    }
}

impl DetailsCipher {
    pub fn from_key(key: &[u8]) -> Result<Self> {
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|_| CryptoError::KeySizeError(key.len()))?;
        Ok(Self { cipher })
    }

    /// Build a cipher from a passphrase, using the salt persisted in `db`.
    pub async fn from_passphrase(passphrase: &str, db: &Database, params: &KdfParams) -> Result<Self> {
        let salt = load_or_create_salt(db).await?;
        let key = derive_key(passphrase, &salt, params)?;
        Self::from_key(&key)
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| CryptoError::EncryptionError(e.to_string()))?;

        let mut encrypted = nonce.to_vec();
        encrypted.extend_from_slice(&ciphertext);

        Ok(base64::engine::general_purpose::STANDARD.encode(encrypted))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        let encrypted = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| CryptoError::InvalidFormat(e.to_string()))?;

        if encrypted.len() <= NONCE_LEN {
            return Err(CryptoError::InvalidFormat("Encrypted data too short".into()));
        }

        let (nonce_bytes, ciphertext) = encrypted.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| CryptoError::DecryptionError(e.to_string()))?;

        String::from_utf8(plaintext).map_err(|e| CryptoError::InvalidFormat(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_params() -> KdfParams {
        KdfParams {
            memory_cost: 64,
            time_cost: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn encrypt_then_decrypt_returns_plaintext() {
        let cipher = DetailsCipher::from_key(&[7u8; KEY_LEN]).unwrap();
        let stored = cipher.encrypt("db-admin / s3cret").unwrap();

        assert!(!stored.contains("s3cret"));
        assert_eq!(cipher.decrypt(&stored).unwrap(), "db-admin / s3cret");
    }

    #[test]
    fn same_plaintext_encrypts_differently() {
        let cipher = DetailsCipher::from_key(&[1u8; KEY_LEN]).unwrap();
        assert_ne!(cipher.encrypt("x").unwrap(), cipher.encrypt("x").unwrap());
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let stored = DetailsCipher::from_key(&[1u8; KEY_LEN]).unwrap().encrypt("x").unwrap();
        let other = DetailsCipher::from_key(&[2u8; KEY_LEN]).unwrap();
        assert!(matches!(other.decrypt(&stored), Err(CryptoError::DecryptionError(_))));
    }

    #[test]
    fn plaintext_input_is_rejected_as_invalid_format() {
        let cipher = DetailsCipher::from_key(&[1u8; KEY_LEN]).unwrap();
        assert!(matches!(cipher.decrypt("not base64!"), Err(CryptoError::InvalidFormat(_))));
    }

    #[test]
    fn short_keys_are_rejected() {
        assert!(matches!(DetailsCipher::from_key(&[0u8; 16]), Err(CryptoError::KeySizeError(16))));
    }

    #[tokio::test]
    async fn stored_salt_is_never_replaced() {
        let db = crate::db::init_db("sqlite::memory:", 1).await.unwrap();
        assert!(!has_details_salt(&db).await.unwrap());

        let existing = base64::engine::general_purpose::STANDARD.encode([9u8; SALT_LEN]);
        assert!(db.insert_config_value_if_absent(SALT_KEY, &existing).await.unwrap());
        assert!(!db.insert_config_value_if_absent(SALT_KEY, "other").await.unwrap());

        assert_eq!(load_or_create_salt(&db).await.unwrap(), vec![9u8; SALT_LEN]);
        assert!(has_details_salt(&db).await.unwrap());
    }

    #[tokio::test]
    async fn first_salt_load_persists_what_it_returns() {
        let db = crate::db::init_db("sqlite::memory:", 1).await.unwrap();

        let created = load_or_create_salt(&db).await.unwrap();
        assert_eq!(created.len(), SALT_LEN);
        assert_eq!(load_or_create_salt(&db).await.unwrap(), created);
    }

    #[test]
    fn derived_key_depends_on_salt() {
        let a = derive_key("passphrase", b"salt-one-1234567", &fast_params()).unwrap();
        let b = derive_key("passphrase", b"salt-two-1234567", &fast_params()).unwrap();
        let again = derive_key("passphrase", b"salt-one-1234567", &fast_params()).unwrap();

        assert_ne!(a, b);
        assert_eq!(a, again);
    }
}
