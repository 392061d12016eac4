//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Caller-fixable failures answer `{"message": ...}`; server-side failures
//! answer `{"error": ...}`.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use compintel_core::Error as CoreError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  Validation(String),

  #[error("{0}")]
  Conflict(String),

  #[error("{0}")]
  NotFound(String),

  /// The digest transport rejected the message.
  #[error("{0}")]
  Delivery(String),

  #[error("{0}")]
  Internal(String),
}

impl From<CoreError> for ApiError {
  fn from(e: CoreError) -> Self {
    match e {
      CoreError::Validation(m) => Self::Validation(m),
      CoreError::Conflict(m) => Self::Conflict(m),
      CoreError::NotFound(m) => Self::NotFound(m),
      CoreError::Delivery(m) => Self::Delivery(m),
      other => Self::Internal(other.to_string()),
    }
  }
}

/// For `map_err` on store results.
pub(crate) fn store_error<E: Into<CoreError>>(e: E) -> ApiError { ApiError::from(e.into()) }

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, body) = match &self {
      ApiError::Validation(m) => (StatusCode::UNPROCESSABLE_ENTITY, json!({ "message": m })),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, json!({ "message": m })),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, json!({ "message": m })),
      ApiError::Delivery(m) => (StatusCode::BAD_GATEWAY, json!({ "error": m })),
      ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": m })),
    };
    if status.is_server_error() {
      tracing::error!(status = status.as_u16(), error = %self, "request failed");
    }
    (status, Json(body)).into_response()
  }
}
