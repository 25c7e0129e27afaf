//! Tunnel lifecycle endpoints.
//!
//! - `POST /start-tunnel` — establish the SSH port-forwarding tunnel
//! - `POST /stop-tunnel` — tear it down
//!
//! Both are idempotent: repeating a start or a stop reports the current
//! state as a 200 status payload instead of erroring.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use crate::state::AppState;
use crate::tunnel::{StartOutcome, StopOutcome, TunnelParams};

/// Request body for `POST /start-tunnel`.
///
/// Field names are the camelCase the browser settings screen sends.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTunnelRequest {
    /// Database host as reachable from the SSH server.
    pub database_host: String,
    pub ssh_host: String,
    pub ssh_port: u16,
    pub ssh_user: String,
    /// Password or private-key material; passed through opaquely.
    pub ssh_key: String,
}

/// `POST /start-tunnel` — establish the tunnel, or confirm the live one.
///
/// # Errors
///
/// - `400 Bad Request` with `{"error": "Failed to start tunnel"}` — SSH
///   connect/auth or local bind failure; the manager stays idle so the
///   caller may simply retry.
pub async fn start_tunnel(
    State(state): State<AppState>,
    Json(payload): Json<StartTunnelRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let params = TunnelParams {
        database_host: payload.database_host,
        ssh_host: payload.ssh_host,
        ssh_port: payload.ssh_port,
        ssh_user: payload.ssh_user,
        ssh_key: payload.ssh_key,
    };
    match state.tunnel.start(params).await {
        Ok(StartOutcome::Started) => Ok(Json(json!({"status": "Tunnel started"}))),
        Ok(StartOutcome::AlreadyActive) => Ok(Json(json!({"status": "Tunnel already active"}))),
        Err(e) => {
            error!("Tunnel: failed to start: {e}");
            Err((
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Failed to start tunnel"})),
            ))
        }
    }
}

/// `POST /stop-tunnel` — tear the tunnel down if one is up.
pub async fn stop_tunnel(State(state): State<AppState>) -> Json<Value> {
    match state.tunnel.stop().await {
        StopOutcome::Stopped => Json(json!({"status": "Tunnel stopped"})),
        StopOutcome::NoActiveTunnel => Json(json!({"status": "No active tunnel to stop"})),
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::state::AppState;

    fn test_state(dir: &tempfile::TempDir) -> AppState {
        let mut config = Config::default();
        config.secrets.key_path = dir.path().join("key.bin").to_string_lossy().into_owned();
        AppState::new(config)
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// A loopback port with nothing listening behind it.
    async fn refused_port() -> u16 {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0))
            .await
            .unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn stop_tunnel_when_idle() {
        let dir = tempfile::tempdir().unwrap();
        let app = crate::router(test_state(&dir));

        let response = app
            .oneshot(Request::post("/stop-tunnel").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"status": "No active tunnel to stop"})
        );
    }

    #[tokio::test]
    async fn start_tunnel_ssh_failure_is_400_and_retryable() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let request_body = json!({
            "databaseHost": "dbhost",
            "sshHost": "127.0.0.1",
            "sshPort": refused_port().await,
            "sshUser": "tunnel",
            "sshKey": "sshkey",
        });

        let response = crate::router(state.clone())
            .oneshot(post_json("/start-tunnel", &request_body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Failed to start tunnel"})
        );

        // The failure must leave the manager idle: a retry goes back to the
        // SSH layer instead of reporting "already active".
        let retry = crate::router(state)
            .oneshot(post_json("/start-tunnel", &request_body))
            .await
            .unwrap();
        assert_eq!(retry.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(retry).await,
            json!({"error": "Failed to start tunnel"})
        );
    }

    #[tokio::test]
    async fn start_tunnel_rejects_malformed_body() {
        let dir = tempfile::tempdir().unwrap();
        let app = crate::router(test_state(&dir));

        let response = app
            .oneshot(
                Request::post("/start-tunnel")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"sshHost": "host"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}
