//! Encrypt/decrypt endpoints backing the browser's persisted settings.
//!
//! - `POST /encrypt` — seal a plaintext credential blob
//! - `POST /decrypt` — open a previously sealed blob
//!
//! Both inspect the body as raw JSON: a missing or non-string field is the
//! caller's bug and must come back as a 400 with no side effects, not as a
//! typed-extractor rejection.

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::state::AppState;

/// `POST /encrypt` — seal `plaintext` into a base64 envelope.
///
/// # Errors
///
/// - `400 Bad Request` — `plaintext` missing or not a string
/// - `500 Internal Server Error` — AEAD sealing failed
pub async fn encrypt(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let Some(plaintext) = body.get("plaintext").and_then(Value::as_str) else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Missing or invalid `plaintext` in request body"})),
        ));
    };

    match state.secrets.encrypt(plaintext).await {
        Ok(ciphertext) => Ok(Json(json!({"ciphertext": ciphertext}))),
        Err(e) => {
            error!("Encryption error: {e}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            ))
        }
    }
}

/// `POST /decrypt` — open a sealed envelope.
///
/// A failed decrypt has already rotated the key, so the stored envelope can
/// never be opened again; `clearLocalStorage: true` tells the caller to
/// purge its cached credential blobs rather than retry.
///
/// # Errors
///
/// - `400 Bad Request` — `ciphertext` missing or not a string
/// - `400 Bad Request` with `clearLocalStorage: true` — malformed envelope
///   or authentication failure
pub async fn decrypt(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let Some(ciphertext) = body.get("ciphertext").and_then(Value::as_str) else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Missing ciphertext"})),
        ));
    };

    match state.secrets.decrypt(ciphertext).await {
        Ok(plaintext) => Ok(Json(json!({"plaintext": plaintext}))),
        Err(e) => {
            warn!("Decryption failed: {e}");
            Err((
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Decryption failed", "clearLocalStorage": true})),
            ))
        }
    }
}
