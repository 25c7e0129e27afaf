#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

//! tunnelvault library — exposes the helper's building blocks so the binary
//! and the route tests share one router definition.
//!
//! - `config` — TOML + env-var configuration
//! - `secrets` — file-backed key store and the AES-256-GCM envelope cipher
//! - `tunnel` — SSH port-forwarding tunnel lifecycle
//! - `routes` — REST API route handlers
//! - `state` — shared application state

pub mod config;
pub mod routes;
pub mod secrets;
pub mod state;
pub mod tunnel;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use secrets::{CipherService, KeyStore};
pub use state::AppState;
pub use tunnel::TunnelManager;

/// Build the HTTP surface.
///
/// CORS is wide open: the browser UI calls the helper from its own dev
/// origin and every route is already loopback-only by default.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route("/start-tunnel", post(routes::tunnel::start_tunnel))
        .route("/stop-tunnel", post(routes::tunnel::stop_tunnel))
        .route("/encrypt", post(routes::secrets::encrypt))
        .route("/decrypt", post(routes::secrets::decrypt))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
