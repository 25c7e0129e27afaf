//! File-backed storage for the process-wide symmetric key.
//!
//! The key is 32 random bytes in a single file with owner-only permissions.
//! Reads and writes are best-effort: a missing, short, or unreadable file is
//! replaced with a fresh key rather than surfaced to the caller, because an
//! error here would otherwise block all encrypt/decrypt traffic.

use std::io;
use std::path::PathBuf;

use aes_gcm::aead::{KeyInit, OsRng};
use aes_gcm::Aes256Gcm;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Length of the symmetric key in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Owns the key file and a memoized copy of its contents.
///
/// Each store instance is independent, keyed by its path; tests construct
/// throwaway stores against temp directories.
pub struct KeyStore {
    path: PathBuf,
    cached: Mutex<Option<[u8; KEY_LEN]>>,
}

impl KeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: Mutex::new(None),
        }
    }

    /// Return the current key, provisioning it on first use.
    ///
    /// Never fails: any I/O problem degrades to a freshly generated key (and
    /// an error log), which keeps the encrypt path alive at the cost of
    /// making previously stored ciphertexts undecryptable.
    pub async fn get_or_create(&self) -> [u8; KEY_LEN] {
        let mut cached = self.cached.lock().await;
        if let Some(key) = *cached {
            return key;
        }
        let key = self.load_or_provision().await;
        *cached = Some(key);
        key
    }

    /// Rotate the key: remove the file (absence is fine) and provision a new
    /// one immediately.
    ///
    /// Every ciphertext sealed under the old key is permanently
    /// undecryptable after this — that is the point: callers holding such
    /// ciphertexts must discard them and re-enter their credentials.
    pub async fn delete_and_recreate(&self) -> [u8; KEY_LEN] {
        let mut cached = self.cached.lock().await;
        *cached = None;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => info!(
                "Deleted key file at {} — dependent sessions must restart",
                self.path.display()
            ),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => error!("Failed to delete key file at {}: {e}", self.path.display()),
        }
        let key = self.load_or_provision().await;
        *cached = Some(key);
        key
    }

    async fn load_or_provision(&self) -> [u8; KEY_LEN] {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.len() == KEY_LEN => {
                let mut key = [0u8; KEY_LEN];
                key.copy_from_slice(&bytes);
                key
            }
            Ok(bytes) => {
                warn!(
                    "Key file {} is {} bytes, expected {KEY_LEN} — regenerating",
                    self.path.display(),
                    bytes.len()
                );
                self.provision().await
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => self.provision().await,
            Err(e) => {
                error!("Failed to read key file {}: {e}", self.path.display());
                self.provision().await
            }
        }
    }

    async fn provision(&self) -> [u8; KEY_LEN] {
        let generated = Aes256Gcm::generate_key(OsRng);
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(generated.as_slice());
        match self.persist(&key).await {
            Ok(()) => info!("Generated new secret storage key at {}", self.path.display()),
            Err(e) => error!(
                "Failed to write key file {}: {e} — continuing with in-memory key",
                self.path.display()
            ),
        }
        key
    }

    async fn persist(&self, key: &[u8; KEY_LEN]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.path, key).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600)).await?;
        }
        Ok(())
    }
}
