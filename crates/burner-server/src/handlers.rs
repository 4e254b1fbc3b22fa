use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::debug;

use crate::{
    secret::{CreateSecretRequest, ReadResponse, ReadSecretRequest},
    AppState,
};

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({"error": message}))).into_response()
}

// ── Health ────────────────────────────────────────────────────────────────────

pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok", "version": env!("CARGO_PKG_VERSION")}))
}

// ── Create ────────────────────────────────────────────────────────────────────

pub async fn create_secret(
    State(state): State<AppState>,
    payload: Result<Json<CreateSecretRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            debug!(error = %rejection, "rejected create body");
            return bad_request("invalid request body");
        }
    };

    match state.secrets.create(body).await {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(e) => e.into_response(),
    }
}

// ── Metadata ──────────────────────────────────────────────────────────────────

pub async fn get_secret(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.secrets.get(&id).await {
        Ok(meta) => Json(meta).into_response(),
        Err(e) => e.into_response(),
    }
}

// ── Read and burn ─────────────────────────────────────────────────────────────

/// Always 200 unless the store itself fails: a missing, expired or locked
/// secret is reported in the body so status codes reveal nothing.
pub async fn read_secret(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    // The passphrase is optional, so an empty body is a valid request.
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        ReadSecretRequest::default()
    } else {
        match serde_json::from_slice::<ReadSecretRequest>(&body) {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "rejected read body");
                return bad_request("invalid request body");
            }
        }
    };

    match state.secrets.read_and_burn(&id, request).await {
        Ok(outcome) => Json(ReadResponse::from(outcome)).into_response(),
        Err(e) => e.into_response(),
    }
}

// ── Admin ─────────────────────────────────────────────────────────────────────

pub async fn delete_secret(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.secrets.delete(&id).await {
        Ok(meta) => Json(meta).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn stats(State(state): State<AppState>) -> Response {
    match state.secrets.count().await {
        Ok(count) => Json(json!({"count": count})).into_response(),
        Err(e) => e.into_response(),
    }
}
