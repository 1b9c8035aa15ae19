//! Core types and trait definitions for the detection result store.
//!
//! Free of HTTP and database dependencies; every other crate depends on it.

// Trait methods return `impl Future + Send` and backends implement them with
// native `async fn`.
#![allow(async_fn_in_trait)]

pub mod activity;
pub mod correlation;
pub mod envelope;
pub mod error;
pub mod metadata;
pub mod store;
pub mod user;

pub use correlation::CorrelationId;
pub use envelope::{Envelope, ErrorCode};
pub use error::{DuplicateField, Error, Result};
