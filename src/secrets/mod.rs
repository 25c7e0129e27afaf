//! At-rest encryption for the browser's persisted settings.
//!
//! The browser keeps database and LLM credentials in its own local storage
//! and round-trips every blob through `POST /encrypt` / `POST /decrypt`, so
//! nothing sensitive is ever stored in the clear. The key never leaves this
//! process; see [`KeyStore`] for its on-disk lifecycle and [`CipherService`]
//! for the envelope format.

mod cipher;
mod keystore;

pub use cipher::CipherService;
pub use keystore::{KeyStore, KEY_LEN};

/// Errors from the encrypt/decrypt operations.
#[derive(Debug)]
pub enum SecretsError {
    /// The envelope was malformed or AEAD verification failed. Carries the
    /// specific reason for logs; callers see a uniform "Decryption failed".
    DecryptionFailed(&'static str),
    /// AEAD sealing failed. Does not happen with a well-formed key; kept so
    /// the handler has an explicit 500 path instead of a panic.
    EncryptionFailed(String),
}

impl std::fmt::Display for SecretsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretsError::DecryptionFailed(reason) => f.write_str(reason),
            SecretsError::EncryptionFailed(e) => write!(f, "Encryption failed: {e}"),
        }
    }
}
