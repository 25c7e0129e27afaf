//! Liveness endpoint.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// `GET /health` — liveness probe.
///
/// Lets the UI tell "helper not running" apart from "tunnel not started"
/// before it surfaces a connection error to the user.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
        "tunnel_active": state.tunnel.is_active().await,
    }))
}
