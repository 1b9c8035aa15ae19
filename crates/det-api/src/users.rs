//! `GET /verify_user?userdata=<name or e-mail>&userpassword=<pw>`

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State, rejection::QueryRejection},
};
use det_core::{
  Envelope,
  store::{ResultStore, StoreError as _},
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Deserialize)]
pub struct VerifyParams {
  pub userdata:     String,
  pub userpassword: String,
}

/// Payload of a successful verification.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedUser {
  pub user_id:    i64,
  pub user_name:  String,
  pub user_email: String,
}

pub async fn verify<S>(
  State(store): State<Arc<S>>,
  params: Result<Query<VerifyParams>, QueryRejection>,
) -> Result<Json<Envelope>, ApiError>
where
  S: ResultStore,
{
  let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;

  let user = store
    .verify_user(&params.userdata, &params.userpassword)
    .await
    .map_err(|e| {
      if matches!(e.domain(), Some(det_core::Error::UserNotFound)) {
        ApiError::UserNotFound
      } else {
        ApiError::Store(Box::new(e))
      }
    })?;

  tracing::info!(user_id = user.id, "user verified");

  Ok(Json(Envelope::success(&VerifiedUser {
    user_id:    user.id,
    user_name:  user.name,
    user_email: user.email,
  })?))
}
