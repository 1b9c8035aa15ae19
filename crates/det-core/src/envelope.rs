//! The `{data, errorCode, ok[, error]}` response shape returned for every
//! unit outcome and by every HTTP endpoint.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::Result;

/// Numeric codes carried in [`Envelope::error_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
  Ok,
  AuthenticationFailed,
  QueryFailed,
  MalformedMetadata,
  EmptyPayload,
  StoreFailure,
  DuplicateName,
  DuplicateEmail,
  UserNotFound,
  FileWriteFailed,
}

impl ErrorCode {
  pub const fn as_i32(self) -> i32 {
    match self {
      ErrorCode::Ok => 0,
      ErrorCode::AuthenticationFailed => 1002,
      ErrorCode::QueryFailed => -1,
      ErrorCode::MalformedMetadata => -400,
      ErrorCode::EmptyPayload => -422,
      ErrorCode::StoreFailure => -500,
      ErrorCode::DuplicateName => -501,
      ErrorCode::DuplicateEmail => -502,
      ErrorCode::UserNotFound => -503,
      ErrorCode::FileWriteFailed => -510,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
  pub data:       Value,
  #[serde(rename = "errorCode")]
  pub error_code: i32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error:      Option<String>,
  pub ok:         bool,
}

impl Envelope {
  pub fn success<T: Serialize>(data: &T) -> Result<Self> {
    Ok(Self {
      data:       serde_json::to_value(data)?,
      error_code: ErrorCode::Ok.as_i32(),
      error:      None,
      ok:         true,
    })
  }

  pub fn failure(code: ErrorCode, message: impl Into<String>) -> Self {
    Self {
      data:       json!({}),
      error_code: code.as_i32(),
      error:      Some(message.into()),
      ok:         false,
    }
  }

  pub fn to_json(&self) -> Result<String> { Ok(serde_json::to_string(self)?) }
}
