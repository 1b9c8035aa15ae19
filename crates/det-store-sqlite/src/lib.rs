//! SQLite backend for the detection result store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every call is queued onto that single
//! connection, and multi-row writes run inside one `BEGIN IMMEDIATE`
//! transaction, which is what keeps `max(id) + 1` allocation race-free.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
