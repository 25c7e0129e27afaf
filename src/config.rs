//! Configuration loading and defaults.
//!
//! Configuration is resolved in order of precedence (highest wins):
//!
//! 1. **Environment variables** — `TUNNELVAULT_LISTEN`,
//!    `TUNNELVAULT_FORWARD_PORT`, `TUNNELVAULT_KEY_PATH`
//! 2. **Config file** — path via `--config <path>`, or `tunnelvault.toml`
//!    in CWD
//! 3. **Compiled defaults** — see each field's default value below
//!
//! The TOML file mirrors the struct hierarchy:
//!
//! ```toml
//! [server]
//! listen = "127.0.0.1:3001"
//!
//! [tunnel]
//! bind_host = "127.0.0.1"
//! forward_port = 8000   # local proxy port, also the remote database port
//!
//! [secrets]
//! key_path = "secure_storage_key.bin"
//!
//! [logging]
//! level = "info"
//! ```

use serde::Deserialize;
use std::path::Path;

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub tunnel: TunnelConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind (default `127.0.0.1:3001`). The helper serves
    /// a single local browser; it is not meant to be reachable off-host.
    #[serde(default = "default_listen")]
    pub listen: String,
}

/// Port-forwarding settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TunnelConfig {
    /// Address the local proxy listener binds to (default `127.0.0.1`).
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
    /// Local listening port for forwarded database connections. The remote
    /// side is reached on the same port (default 8000, the backend's port).
    #[serde(default = "default_forward_port")]
    pub forward_port: u16,
}

/// Secret-storage settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SecretsConfig {
    /// Path of the 32-byte key file (default `secure_storage_key.bin`,
    /// relative to the working directory). Created on first use with
    /// owner-only permissions.
    #[serde(default = "default_key_path")]
    pub key_path: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level (default `info`). Overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_listen() -> String {
    "127.0.0.1:3001".to_string()
}
fn default_bind_host() -> String {
    "127.0.0.1".to_string()
}
fn default_forward_port() -> u16 {
    8000
}
fn default_key_path() -> String {
    "secure_storage_key.bin".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            forward_port: default_forward_port(),
        }
    }
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            key_path: default_key_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            tunnel: TunnelConfig::default(),
            secrets: SecretsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with the precedence chain: env vars > file > defaults.
    ///
    /// If `path` is `Some`, reads that file (panics on failure). Otherwise
    /// looks for `tunnelvault.toml` in the current directory, falling back to
    /// compiled defaults.
    pub fn load(path: Option<&str>) -> Self {
        let mut config = if let Some(p) = path {
            let content = std::fs::read_to_string(p)
                .unwrap_or_else(|e| panic!("Failed to read config file {p}: {e}"));
            toml::from_str(&content)
                .unwrap_or_else(|e| panic!("Failed to parse config file {p}: {e}"))
        } else if Path::new("tunnelvault.toml").exists() {
            let content =
                std::fs::read_to_string("tunnelvault.toml").expect("Failed to read tunnelvault.toml");
            toml::from_str(&content).expect("Failed to parse tunnelvault.toml")
        } else {
            Config::default()
        };

        // Env var overrides
        if let Ok(listen) = std::env::var("TUNNELVAULT_LISTEN") {
            config.server.listen = listen;
        }
        if let Ok(port) = std::env::var("TUNNELVAULT_FORWARD_PORT") {
            match port.parse() {
                Ok(port) => config.tunnel.forward_port = port,
                Err(_) => panic!("TUNNELVAULT_FORWARD_PORT is not a valid port: {port}"),
            }
        }
        if let Ok(key_path) = std::env::var("TUNNELVAULT_KEY_PATH") {
            config.secrets.key_path = key_path;
        }

        config
    }
}
