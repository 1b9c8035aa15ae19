//! Detection result ingestion service.
//!
//! Clients stream results over WebSocket sessions (see [`session`]); each
//! completed unit is written to a [`ResultStore`] and its image to a
//! [`FileSink`]. The read-only HTTP endpoints from `det-api` are served
//! alongside.

pub mod auth;
pub mod error;
pub mod ingest;
pub mod session;
pub mod sink;
pub mod ws;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{Router, middleware, routing::get};
use det_core::store::ResultStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::{CredentialChecker, require_basic_auth};
use ingest::Ingestor;
use sink::FileSink;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and the
/// environment.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:               String,
  #[serde(default = "default_port")]
  pub port:               u16,
  pub store_path:         PathBuf,
  /// Directory uploaded images are written to.
  pub images_root:        PathBuf,
  pub auth_username:      String,
  /// argon2 PHC string; generate with `det-server --hash-password`.
  pub auth_password_hash: String,
  /// Largest WebSocket message accepted, in bytes.
  #[serde(default = "default_max_message_size")]
  pub max_message_size:   usize,
  #[serde(default)]
  pub log_json:           bool,
}

fn default_host() -> String { "0.0.0.0".to_owned() }

fn default_port() -> u16 { 8000 }

fn default_max_message_size() -> usize { 100_000_000 }

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store:    Arc<S>,
  pub config:   Arc<ServerConfig>,
  pub checker:  Arc<CredentialChecker>,
  pub ingestor: Arc<Ingestor<S>>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:    self.store.clone(),
      config:   self.config.clone(),
      checker:  self.checker.clone(),
      ingestor: self.ingestor.clone(),
    }
  }
}

impl<S: ResultStore> AppState<S> {
  pub fn new(store: S, config: ServerConfig) -> Self {
    let store = Arc::new(store);
    let checker = CredentialChecker::new(&config.auth_username, config.auth_password_hash.clone());
    let ingestor = Ingestor::new(store.clone(), FileSink::new(config.images_root.clone()));
    Self {
      store,
      config: Arc::new(config),
      checker: Arc::new(checker),
      ingestor: Arc::new(ingestor),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the complete service router.
///
/// | Path | Auth |
/// |------|------|
/// | `/ws/save_result`, `/ws/create_user` | credentials in the first message |
/// | `/get_results` | HTTP Basic |
/// | `/health`, `/get_agr_results`, `/verify_user` | none |
pub fn router<S>(state: AppState<S>) -> Router
where
  S: ResultStore + 'static,
{
  let results = det_api::results_router(state.store.clone()).route_layer(
    middleware::from_fn_with_state(state.checker.clone(), require_basic_auth),
  );

  Router::new()
    .route("/ws/save_result", get(ws::save_result::<S>))
    .route("/ws/create_user", get(ws::create_user::<S>))
    .with_state(state.clone())
    .merge(det_api::public_router(state.store))
    .merge(results)
    .layer(TraceLayer::new_for_http())
}
