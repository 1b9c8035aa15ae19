//! `GET /health`

use axum::Json;
use det_core::Envelope;
use serde_json::json;

use crate::error::ApiError;

pub async fn handler() -> Result<Json<Envelope>, ApiError> {
  Ok(Json(Envelope::success(&json!({ "message": "Detector service" }))?))
}
