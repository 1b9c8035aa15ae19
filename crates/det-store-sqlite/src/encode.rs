//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with millisecond precision and a
//! `Z` suffix, a form SQLite's own `date()` understands.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use det_core::activity::{Activity, ActivityAggregate, ActivityMaterial};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Activity rows ───────────────────────────────────────────────────────────

pub const ACTIVITY_COLUMNS: &str = "id, class_id, recorded_at, image_path, is_complete, \
   confidence, result_payload, duration_ms, username";

/// Column-for-column mirror of an `activity` row.
pub struct RawActivity {
  pub id:             i64,
  pub class_id:       i64,
  pub recorded_at:    String,
  pub image_path:     String,
  pub is_complete:    Option<bool>,
  pub confidence:     Option<f64>,
  pub result_payload: String,
  pub duration_ms:    Option<i64>,
  pub username:       Option<String>,
}

impl RawActivity {
  /// Read a row selected with [`ACTIVITY_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:             row.get(0)?,
      class_id:       row.get(1)?,
      recorded_at:    row.get(2)?,
      image_path:     row.get(3)?,
      is_complete:    row.get(4)?,
      confidence:     row.get(5)?,
      result_payload: row.get(6)?,
      duration_ms:    row.get(7)?,
      username:       row.get(8)?,
    })
  }

  pub fn into_activity(self) -> Result<Activity> {
    Ok(Activity {
      id:             self.id,
      class_id:       self.class_id,
      timestamp:      decode_dt(&self.recorded_at)?,
      image_path:     self.image_path,
      is_complete:    self.is_complete,
      confidence:     self.confidence,
      result_payload: self.result_payload,
      duration_ms:    self.duration_ms,
      username:       self.username,
    })
  }
}

// ─── Material rows ───────────────────────────────────────────────────────────

pub const MATERIAL_COLUMNS: &str =
  "id, activity_id, material_class_id, coordinates, confidence";

pub fn material_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ActivityMaterial> {
  Ok(ActivityMaterial {
    id:                row.get(0)?,
    activity_id:       row.get(1)?,
    material_class_id: row.get(2)?,
    coordinates:       row.get(3)?,
    confidence:        row.get(4)?,
  })
}

// ─── Aggregate rows ──────────────────────────────────────────────────────────

pub struct RawAggregate {
  pub date:            String,
  pub username:        Option<String>,
  pub is_complete:     Option<bool>,
  pub count:           i64,
  pub avg_duration_ms: Option<f64>,
}

impl RawAggregate {
  pub fn into_aggregate(self) -> Result<ActivityAggregate> {
    Ok(ActivityAggregate {
      date:            decode_date(&self.date)?,
      username:        self.username,
      is_complete:     self.is_complete,
      count:           self.count,
      avg_duration_ms: self.avg_duration_ms,
    })
  }
}
