use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::secret::FieldError;
use crate::store::StoreError;

/// Failures surfaced by [`crate::secret::SecretService`].
///
/// Read attempts that miss, expire or use the wrong passphrase are not errors;
/// they come back as [`crate::secret::ReadOutcome::Unavailable`].
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Every field that failed, in request order. Never empty.
    #[error("invalid request: {}", describe(.0))]
    Validation(Vec<FieldError>),
    #[error("secret not found")]
    NotFound,
    #[error("storage error: {0}")]
    Storage(#[source] StoreError),
    /// The secret was decrypted for this request but the record could not be
    /// removed. The store needs manual reconciliation.
    #[error("secret {id} was decrypted but could not be burned: {source}")]
    BurnFailed {
        id: String,
        #[source]
        source: StoreError,
    },
    #[error("internal error: {0}")]
    Internal(String),
}

fn describe(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Storage(_) | Self::BurnFailed { .. } | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => Self::NotFound,
            other => Self::Storage(other),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            // `error` and `field` name the first failure; `fields` carries all of them.
            Self::Validation(errors) => {
                let fields: serde_json::Map<_, _> = errors
                    .iter()
                    .map(|e| (e.field.to_owned(), json!(e.message)))
                    .collect();
                let first = errors.first();
                json!({
                    "error": first.map(|e| e.message.as_str()),
                    "field": first.map(|e| e.field),
                    "fields": fields,
                })
            }
            Self::NotFound => json!({"error": "not found"}),
            _ => {
                tracing::error!(error = %self, "internal error");
                json!({"error": "internal server error"})
            }
        };
        (status, Json(body)).into_response()
    }
}
