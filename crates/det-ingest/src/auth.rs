//! Service credential checking for WebSocket handshakes and HTTP Basic auth.

use std::sync::Arc;

use axum::{
  extract::{Request, State},
  http::HeaderMap,
  middleware::Next,
  response::Response,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::Error;

/// The first message of every WebSocket session.
#[derive(Default, Deserialize)]
pub struct Credentials {
  #[serde(default)]
  pub username: String,
  #[serde(default)]
  pub password: String,
}

/// Compares supplied credentials against the single configured service
/// account.
///
/// The username is compared as a SHA-256 digest in constant time; the
/// password is verified against an argon2 PHC string. Both checks always run
/// so the outcome of one never shortens the other.
pub struct CredentialChecker {
  username_digest: [u8; 32],
  password_hash:   String,
}

impl CredentialChecker {
  /// `password_hash` is an argon2 PHC string, e.g. `$argon2id$v=19$…`
  pub fn new(username: &str, password_hash: impl Into<String>) -> Self {
    Self {
      username_digest: Sha256::digest(username.as_bytes()).into(),
      password_hash:   password_hash.into(),
    }
  }

  /// The argon2 verification runs on the blocking pool.
  pub async fn check(&self, username: &str, password: &str) -> bool {
    let supplied: [u8; 32] = Sha256::digest(username.as_bytes()).into();
    let username_ok = constant_time_eq(&supplied, &self.username_digest);

    let password = password.to_owned();
    let hash = self.password_hash.clone();
    let password_ok = match tokio::task::spawn_blocking(move || {
      det_core::user::verify_password(&password, &hash)
    })
    .await
    {
      Ok(ok) => ok,
      Err(e) => {
        tracing::error!(error = %e, "password verification task failed");
        false
      }
    };

    username_ok & password_ok
  }

  /// Verify an HTTP `Authorization: Basic …` header.
  pub async fn verify_basic(&self, headers: &HeaderMap) -> Result<(), Error> {
    let header_val = headers
      .get(axum::http::header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .ok_or(Error::AuthenticationFailed)?;

    let encoded = header_val
      .strip_prefix("Basic ")
      .ok_or(Error::AuthenticationFailed)?;

    let decoded = B64.decode(encoded).map_err(|_| Error::AuthenticationFailed)?;
    let creds   = std::str::from_utf8(&decoded).map_err(|_| Error::AuthenticationFailed)?;

    let (username, password) = creds.split_once(':').ok_or(Error::AuthenticationFailed)?;

    tracing::info!(login = username, "http authorization attempt");
    if self.check(username, password).await {
      Ok(())
    } else {
      tracing::info!(login = username, "http authorization failed");
      Err(Error::AuthenticationFailed)
    }
  }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
  if a.len() != b.len() {
    return false;
  }
  a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

/// Middleware rejecting requests without valid Basic credentials.
pub async fn require_basic_auth(
  State(checker): State<Arc<CredentialChecker>>,
  req: Request,
  next: Next,
) -> Result<Response, Error> {
  let headers = req.headers().clone();
  checker.verify_basic(&headers).await?;
  Ok(next.run(req).await)
}
