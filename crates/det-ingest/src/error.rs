//! Error taxonomy for the ingestion service.
//!
//! Session-level errors end the connection; unit-level errors become an
//! error [`Envelope`] and the session carries on with the next unit.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use det_core::{DuplicateField, Envelope, ErrorCode, store::StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("Authentication failed. Incorrect username or password")]
  AuthenticationFailed,

  #[error("malformed metadata: {0}")]
  MalformedMetadata(String),

  #[error("unexpected text frame during payload transfer")]
  UnexpectedFrame,

  #[error("payload ended before any bytes were received")]
  EmptyPayload,

  /// The client went away mid-transfer. Never reported to the client.
  #[error("transfer aborted after {received} bytes")]
  TransferAborted { received: usize },

  #[error("a user with this {0} already exists")]
  DuplicateUser(DuplicateField),

  #[error("user not found")]
  NotFound,

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("file write failed: {0}")]
  Io(#[from] std::io::Error),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Classify a backend error, surfacing the domain failures it carries.
  pub fn from_store<E: StoreError>(e: E) -> Self {
    let domain = match e.domain() {
      Some(det_core::Error::DuplicateUser(field)) => Some(Error::DuplicateUser(*field)),
      Some(det_core::Error::UserNotFound) => Some(Error::NotFound),
      Some(det_core::Error::MalformedMetadata(m)) => Some(Error::MalformedMetadata(m.clone())),
      _ => None,
    };
    domain.unwrap_or_else(|| Error::Store(Box::new(e)))
  }

  pub fn code(&self) -> ErrorCode {
    match self {
      Error::AuthenticationFailed => ErrorCode::AuthenticationFailed,
      Error::MalformedMetadata(_) | Error::UnexpectedFrame => ErrorCode::MalformedMetadata,
      Error::EmptyPayload => ErrorCode::EmptyPayload,
      Error::DuplicateUser(DuplicateField::Name) => ErrorCode::DuplicateName,
      Error::DuplicateUser(DuplicateField::Email) => ErrorCode::DuplicateEmail,
      Error::NotFound => ErrorCode::UserNotFound,
      Error::Io(_) => ErrorCode::FileWriteFailed,
      Error::TransferAborted { .. } | Error::Store(_) | Error::Serialization(_) => {
        ErrorCode::StoreFailure
      }
    }
  }

  pub fn envelope(&self) -> Envelope { Envelope::failure(self.code(), self.to_string()) }
}

impl From<det_core::Error> for Error {
  fn from(e: det_core::Error) -> Self {
    match e {
      det_core::Error::MalformedMetadata(m) => Error::MalformedMetadata(m),
      det_core::Error::DuplicateUser(field) => Error::DuplicateUser(field),
      det_core::Error::UserNotFound => Error::NotFound,
      det_core::Error::Serialization(e) => Error::Serialization(e),
      other @ det_core::Error::PasswordHash(_) => Error::Store(Box::new(other)),
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = match &self {
      Error::AuthenticationFailed => StatusCode::UNAUTHORIZED,
      Error::MalformedMetadata(_) | Error::UnexpectedFrame | Error::EmptyPayload => {
        StatusCode::BAD_REQUEST
      }
      Error::DuplicateUser(_) => StatusCode::CONFLICT,
      Error::NotFound => StatusCode::NOT_FOUND,
      Error::TransferAborted { .. }
      | Error::Store(_)
      | Error::Io(_)
      | Error::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let mut res = (status, Json(self.envelope())).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"det\""),
      );
    }
    res
  }
}
