//! Read-only JSON HTTP API over a result store.
//!
//! Exposes axum [`Router`]s backed by any [`det_core::store::ResultStore`].
//! Every response body is an [`det_core::Envelope`]. Auth, TLS, and transport
//! concerns are the caller's responsibility: [`results_router`] is meant to
//! be mounted behind an authentication layer, [`public_router`] is not.
//!
//! # Mounting
//!
//! ```rust,ignore
//! Router::new()
//!   .merge(det_api::public_router(store.clone()))
//!   .merge(det_api::results_router(store).route_layer(auth_layer))
//! ```

pub mod error;
pub mod health;
pub mod results;
pub mod users;

use std::sync::Arc;

use axum::{Router, routing::get};
use det_core::store::ResultStore;

pub use error::ApiError;

/// Endpoints that need no credentials.
///
/// | Method | Path | Notes |
/// |--------|------|-------|
/// | `GET`  | `/health` | Liveness check |
/// | `GET`  | `/get_agr_results` | Activity counts per day, user and completion |
/// | `GET`  | `/verify_user` | `?userdata=<name or e-mail>&userpassword=<pw>` |
pub fn public_router<S>(store: Arc<S>) -> Router<()>
where
  S: ResultStore + 'static,
{
  Router::new()
    .route("/health", get(health::handler))
    .route("/get_agr_results", get(results::aggregated::<S>))
    .route("/verify_user", get(users::verify::<S>))
    .with_state(store)
}

/// `GET /get_results`: the full activity listing.
pub fn results_router<S>(store: Arc<S>) -> Router<()>
where
  S: ResultStore + 'static,
{
  Router::new()
    .route("/get_results", get(results::list::<S>))
    .with_state(store)
}
