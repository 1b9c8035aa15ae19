//! Handlers for the activity listings.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/get_results` | Every stored activity, ordered by id |
//! | `GET`  | `/get_agr_results` | Grouped by `(date, username, isComplete)` |

use std::sync::Arc;

use axum::{Json, extract::State};
use det_core::{Envelope, store::ResultStore};

use crate::error::ApiError;

/// `GET /get_results`
pub async fn list<S>(State(store): State<Arc<S>>) -> Result<Json<Envelope>, ApiError>
where
  S: ResultStore,
{
  let activities = store
    .list_activities()
    .await
    .map_err(|e| ApiError::Query(Box::new(e)))?;
  Ok(Json(Envelope::success(&activities)?))
}

/// `GET /get_agr_results`
pub async fn aggregated<S>(State(store): State<Arc<S>>) -> Result<Json<Envelope>, ApiError>
where
  S: ResultStore,
{
  let rows = store
    .list_aggregated_activities()
    .await
    .map_err(|e| ApiError::Query(Box::new(e)))?;
  Ok(Json(Envelope::success(&rows)?))
}
