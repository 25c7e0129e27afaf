//! AES-256-GCM envelope encryption over the key store's key.
//!
//! One encrypt call produces `base64(IV || ciphertext || tag)` with a fresh
//! random 12-byte IV; AES-GCM appends the 16-byte tag to the ciphertext, so
//! the envelope is exactly the IV followed by the AEAD output. Decryption is
//! the inverse and fails closed on any malformed or tampered envelope.

use std::sync::Arc;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use super::{KeyStore, SecretsError};

/// IV length in bytes (GCM standard nonce).
const NONCE_LEN: usize = 12;
/// Authentication tag length in bytes.
const TAG_LEN: usize = 16;

/// Stateless encrypt/decrypt operations over a shared [`KeyStore`].
#[derive(Clone)]
pub struct CipherService {
    keystore: Arc<KeyStore>,
}

impl CipherService {
    pub fn new(keystore: Arc<KeyStore>) -> Self {
        Self { keystore }
    }

    /// Seal a plaintext into a base64 envelope.
    ///
    /// Non-deterministic: every call draws a fresh IV, so encrypting the
    /// same plaintext twice yields different envelopes.
    pub async fn encrypt(&self, plaintext: &str) -> Result<String, SecretsError> {
        let key = self.keystore.get_or_create().await;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| SecretsError::EncryptionFailed(e.to_string()))?;

        let mut envelope = Vec::with_capacity(NONCE_LEN + sealed.len());
        envelope.extend_from_slice(nonce.as_slice());
        envelope.extend_from_slice(&sealed);
        Ok(STANDARD.encode(envelope))
    }

    /// Open a base64 envelope produced by [`encrypt`](Self::encrypt).
    ///
    /// Any format or verification failure rotates the key before returning:
    /// an envelope the current key cannot open means the key was rotated or
    /// corrupted, and starting over from a fresh key is the only way future
    /// encrypts stay trustworthy. The caller must discard every ciphertext
    /// it still holds.
    pub async fn decrypt(&self, ciphertext: &str) -> Result<String, SecretsError> {
        match self.try_decrypt(ciphertext).await {
            Ok(plaintext) => Ok(plaintext),
            Err(reason) => {
                self.keystore.delete_and_recreate().await;
                Err(SecretsError::DecryptionFailed(reason))
            }
        }
    }

    async fn try_decrypt(&self, ciphertext: &str) -> Result<String, &'static str> {
        let envelope = STANDARD
            .decode(ciphertext)
            .map_err(|_| "Invalid base64 envelope")?;
        if envelope.len() < NONCE_LEN + TAG_LEN {
            return Err("Ciphertext too short");
        }
        let (nonce, sealed) = envelope.split_at(NONCE_LEN);

        let key = self.keystore.get_or_create().await;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| "Authentication failed")?;
        String::from_utf8(plaintext).map_err(|_| "Invalid UTF-8 plaintext")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_in(dir: &tempfile::TempDir) -> CipherService {
        CipherService::new(Arc::new(KeyStore::new(dir.path().join("key.bin"))))
    }

    #[tokio::test]
    async fn roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(&dir);

        let sealed = service.encrypt("plain text string").await.unwrap();
        assert_ne!(sealed, "plain text string");
        assert_eq!(service.decrypt(&sealed).await.unwrap(), "plain text string");
    }

    #[tokio::test]
    async fn roundtrip_empty_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(&dir);

        let sealed = service.encrypt("").await.unwrap();
        // Envelope is still IV + tag even with nothing inside.
        assert_eq!(STANDARD.decode(&sealed).unwrap().len(), 28);
        assert_eq!(service.decrypt(&sealed).await.unwrap(), "");
    }

    #[tokio::test]
    async fn roundtrip_large_and_multibyte_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(&dir);

        let plaintext = "pässword—🔑 ".repeat(4096);
        let sealed = service.encrypt(&plaintext).await.unwrap();
        assert_eq!(service.decrypt(&sealed).await.unwrap(), plaintext);
    }

    #[tokio::test]
    async fn fresh_iv_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(&dir);

        let first = service.encrypt("same input").await.unwrap();
        let second = service.encrypt("same input").await.unwrap();
        assert_ne!(first, second);
        assert_eq!(service.decrypt(&first).await.unwrap(), "same input");
        assert_eq!(service.decrypt(&second).await.unwrap(), "same input");
    }

    #[tokio::test]
    async fn short_envelope_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(&dir);

        let short = STANDARD.encode([0u8; 27]);
        let err = service.decrypt(&short).await.unwrap_err();
        assert!(matches!(
            err,
            SecretsError::DecryptionFailed("Ciphertext too short")
        ));
    }

    #[tokio::test]
    async fn invalid_base64_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(&dir);

        let err = service.decrypt("not@base64!!").await.unwrap_err();
        assert!(matches!(
            err,
            SecretsError::DecryptionFailed("Invalid base64 envelope")
        ));
    }

    #[tokio::test]
    async fn tampered_payload_fails_and_rotates_key() {
        let dir = tempfile::tempdir().unwrap();
        let keystore = Arc::new(KeyStore::new(dir.path().join("key.bin")));
        let service = CipherService::new(Arc::clone(&keystore));

        let sealed = service.encrypt("credential blob").await.unwrap();
        let key_before = keystore.get_or_create().await;

        let mut envelope = STANDARD.decode(&sealed).unwrap();
        envelope[NONCE_LEN] ^= 0x01; // first ciphertext byte
        let tampered = STANDARD.encode(&envelope);

        let err = service.decrypt(&tampered).await.unwrap_err();
        assert!(matches!(
            err,
            SecretsError::DecryptionFailed("Authentication failed")
        ));
        assert_ne!(keystore.get_or_create().await, key_before);
    }

    #[tokio::test]
    async fn tampered_tag_fails() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(&dir);

        let sealed = service.encrypt("credential blob").await.unwrap();
        let mut envelope = STANDARD.decode(&sealed).unwrap();
        let last = envelope.len() - 1;
        envelope[last] ^= 0x80; // inside the tag
        let tampered = STANDARD.encode(&envelope);

        assert!(service.decrypt(&tampered).await.is_err());
    }

    #[tokio::test]
    async fn old_ciphertexts_stay_dead_after_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(&dir);

        let sealed = service.encrypt("old secret").await.unwrap();
        // Force a rotation through a failed decrypt.
        service.decrypt("AAAA").await.unwrap_err();

        // The pre-rotation envelope is unrecoverable, deterministically.
        assert!(service.decrypt(&sealed).await.is_err());
        assert!(service.decrypt(&sealed).await.is_err());

        // But the service keeps working under the new key.
        let resealed = service.encrypt("new secret").await.unwrap();
        assert_eq!(service.decrypt(&resealed).await.unwrap(), "new secret");
    }
}
