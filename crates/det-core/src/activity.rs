//! Activities (one stored detection run each) and the materials detected in them.
//!
//! An activity and all of its materials are written together and never
//! updated or deleted afterwards.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Classification assigned to every ingested activity until clients are able
/// to choose one.
pub const DEFAULT_ACTIVITY_CLASS: i64 = 0;

// ─── Activity ────────────────────────────────────────────────────────────────

/// A persisted detection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
  pub id:             i64,
  pub class_id:       i64,
  /// Server-side creation instant.
  pub timestamp:      DateTime<Utc>,
  /// Basename of the stored image, relative to the images root.
  pub image_path:     String,
  pub is_complete:    Option<bool>,
  pub confidence:     Option<f64>,
  /// The metadata message exactly as the client sent it.
  pub result_payload: String,
  pub duration_ms:    Option<i64>,
  pub username:       Option<String>,
}

/// Input for a new activity. The id and timestamp are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
  pub class_id:       i64,
  pub image_path:     String,
  pub is_complete:    Option<bool>,
  pub confidence:     Option<f64>,
  pub result_payload: String,
  pub duration_ms:    Option<i64>,
  pub username:       Option<String>,
}

impl NewActivity {
  /// An activity of the default class with only the required fields set.
  pub fn new(image_path: impl Into<String>, result_payload: impl Into<String>) -> Self {
    Self {
      class_id:       DEFAULT_ACTIVITY_CLASS,
      image_path:     image_path.into(),
      is_complete:    None,
      confidence:     None,
      result_payload: result_payload.into(),
      duration_ms:    None,
      username:       None,
    }
  }
}

// ─── Materials ───────────────────────────────────────────────────────────────

/// One material detected within an activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityMaterial {
  pub id:                i64,
  pub activity_id:       i64,
  pub material_class_id: i64,
  /// Serialised geometry, stored as compact JSON text.
  pub coordinates:       String,
  pub confidence:        Option<f64>,
}

/// A material detection that has not been attached to an activity yet.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialDetection {
  pub material_class_id: i64,
  pub coordinates:       String,
  pub confidence:        Option<f64>,
}

/// The rows produced by one atomic result write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedResult {
  pub activity:  Activity,
  pub materials: Vec<ActivityMaterial>,
}

// ─── Aggregates ──────────────────────────────────────────────────────────────

/// Activity counts grouped by day, submitting user and completion flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityAggregate {
  pub date:            NaiveDate,
  pub username:        Option<String>,
  pub is_complete:     Option<bool>,
  pub count:           i64,
  pub avg_duration_ms: Option<f64>,
}
