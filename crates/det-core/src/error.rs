//! Error types for `det-core`.

use std::fmt;

use thiserror::Error;

/// Which unique user column an insert collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateField {
  Name,
  Email,
}

impl fmt::Display for DuplicateField {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      DuplicateField::Name => f.write_str("name"),
      DuplicateField::Email => f.write_str("e-mail"),
    }
  }
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("malformed metadata: {0}")]
  MalformedMetadata(String),

  #[error("a user with this {0} already exists")]
  DuplicateUser(DuplicateField),

  #[error("user not found")]
  UserNotFound,

  #[error("password hashing failed: {0}")]
  PasswordHash(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
