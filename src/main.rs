#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # tunnelvault
//!
//! Local helper service for the browser UI: it keeps at most one SSH
//! port-forwarding tunnel up to the remote database host, and it
//! encrypts/decrypts the credential blobs the browser persists in its own
//! local storage, so nothing sensitive is ever written there in the clear.
//!
//! The helper must keep running for as long as the UI does — the browser's
//! settings store is unreadable without the `/decrypt` endpoint — which is
//! why tunnel transport errors are logged instead of letting them take the
//! process down.
//!
//! ## API surface
//!
//! | Method | Path            | Description                               |
//! |--------|-----------------|-------------------------------------------|
//! | POST   | `/start-tunnel` | Establish the SSH tunnel (idempotent)     |
//! | POST   | `/stop-tunnel`  | Tear the tunnel down (idempotent)         |
//! | POST   | `/encrypt`      | Seal a credential blob                    |
//! | POST   | `/decrypt`      | Open a sealed blob                        |
//! | GET    | `/health`       | Liveness probe                            |
//!
//! ## Architecture
//!
//! ```text
//! main.rs          — entry point, clap CLI, router setup, graceful shutdown
//! config.rs        — TOML + env-var configuration
//! state.rs         — AppState (config, tunnel manager, cipher service)
//! secrets/
//!   keystore.rs    — file-backed 32-byte key, lazy creation, rotation
//!   cipher.rs      — AES-256-GCM envelope (IV || ciphertext || tag, base64)
//! tunnel/
//!   mod.rs         — TunnelManager (Idle/Active state machine, start/stop)
//!   forward.rs     — SSH session, local accept loop, per-connection relay
//! routes/
//!   tunnel.rs      — POST /start-tunnel, POST /stop-tunnel
//!   secrets.rs     — POST /encrypt, POST /decrypt
//!   health.rs      — GET /health
//! ```

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use tunnelvault::config::Config;
use tunnelvault::state::AppState;
use tunnelvault::tunnel::StopOutcome;

/// Local tunnel and secret-storage helper.
#[derive(Parser)]
#[command(name = "tunnelvault", version)]
struct Cli {
    /// Path to TOML config file.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref());

    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    info!("tunnelvault v{} starting", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}", config.server.listen);
    info!(
        "Database proxy port: {} (key file: {})",
        config.tunnel.forward_port, config.secrets.key_path
    );

    let state = AppState::new(config);
    let app = tunnelvault::router(state.clone());

    let listener = TcpListener::bind(&state.config.server.listen)
        .await
        .expect("Failed to bind");

    info!("Server ready");

    // Graceful shutdown
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("Failed to register SIGTERM");
            tokio::select! {
                _ = ctrl_c => info!("Received SIGINT"),
                _ = sigterm.recv() => info!("Received SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
            info!("Received SIGINT");
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .expect("Server error");

    // Cleanup: don't leave an orphaned SSH session behind.
    info!("Shutting down...");
    if state.tunnel.stop().await == StopOutcome::Stopped {
        info!("Tunnel stopped");
    }
    info!("Goodbye");
}
