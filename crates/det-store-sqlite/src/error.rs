//! Error type for `det-store-sqlite`.

use det_core::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] det_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("password task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

impl StoreError for Error {
  fn domain(&self) -> Option<&det_core::Error> {
    match self {
      Error::Core(e) => Some(e),
      Error::Database(_) | Error::DateParse(_) | Error::Task(_) => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
