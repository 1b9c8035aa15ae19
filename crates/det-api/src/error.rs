//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use det_core::{Envelope, ErrorCode};
use thiserror::Error;

/// An error returned by an API handler. The body is always an error
/// envelope.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("user not found")]
  UserNotFound,

  #[error("bad request: {0}")]
  BadRequest(String),

  /// A read-only listing failed.
  #[error("query failed: {0}")]
  Query(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn code(&self) -> ErrorCode {
    match self {
      ApiError::UserNotFound => ErrorCode::UserNotFound,
      ApiError::BadRequest(_) => ErrorCode::MalformedMetadata,
      ApiError::Query(_) => ErrorCode::QueryFailed,
      ApiError::Store(_) => ErrorCode::StoreFailure,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::UserNotFound => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Query(_) | ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
      tracing::error!(error = %self, "api request failed");
    }
    (status, Json(Envelope::failure(self.code(), self.to_string()))).into_response()
  }
}

impl From<det_core::Error> for ApiError {
  fn from(e: det_core::Error) -> Self {
    match e {
      det_core::Error::UserNotFound => ApiError::UserNotFound,
      det_core::Error::MalformedMetadata(m) => ApiError::BadRequest(m),
      other => ApiError::Store(Box::new(other)),
    }
  }
}
