//! Shared application state passed to every handler via Axum's `State` extractor.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::secrets::{CipherService, KeyStore};
use crate::tunnel::TunnelManager;

/// Shared application state for the helper service.
///
/// The tunnel manager and cipher service are constructed exactly once here
/// and only ever reached through this state, so the process-wide singletons
/// (one tunnel, one key file) have a single owner.
#[derive(Clone)]
pub struct AppState {
    /// Immutable configuration loaded at startup.
    pub config: Arc<Config>,
    /// Monotonic instant when the server started (for uptime calculation).
    pub start_time: Instant,
    /// Owns the at-most-one SSH port-forwarding tunnel.
    pub tunnel: TunnelManager,
    /// Encrypts/decrypts the browser's persisted credential blobs.
    pub secrets: CipherService,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let keystore = Arc::new(KeyStore::new(&config.secrets.key_path));
        Self {
            tunnel: TunnelManager::new(config.tunnel.clone()),
            secrets: CipherService::new(keystore),
            start_time: Instant::now(),
            config,
        }
    }
}
