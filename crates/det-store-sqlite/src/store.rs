//! [`SqliteStore`], the SQLite implementation of [`ResultStore`].

use std::path::Path;

use chrono::{DateTime, SubsecRound as _, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use tracing::debug;

use det_core::{
  DuplicateField,
  activity::{
    Activity, ActivityAggregate, ActivityMaterial, MaterialDetection, NewActivity,
    RecordedResult,
  },
  store::{ResultStore, Table},
  user::{self, NewUser, User},
};

use crate::{
  Error, Result,
  encode::{
    ACTIVITY_COLUMNS, MATERIAL_COLUMNS, RawActivity, RawAggregate, encode_dt,
    material_from_row,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A result store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted, and all
/// clones queue their work onto the same connection thread.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Number of rows currently in `table`.
  pub async fn count_rows(&self, table: Table) -> Result<i64> {
    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &format!("SELECT COUNT(*) FROM {}", table.as_str()),
          [],
          |row| row.get(0),
        )?)
      })
      .await?;
    Ok(count)
  }
}

// ─── Row-level helpers (run on the connection thread) ────────────────────────

/// Current time at the precision the `recorded_at` column keeps.
fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(3) }

fn next_id(conn: &rusqlite::Connection, table: Table) -> rusqlite::Result<i64> {
  conn.query_row(
    &format!("SELECT IFNULL(MAX(id), 0) + 1 FROM {}", table.as_str()),
    [],
    |row| row.get(0),
  )
}

fn insert_activity_row(
  conn:        &rusqlite::Connection,
  id:          i64,
  recorded_at: DateTime<Utc>,
  activity:    NewActivity,
) -> rusqlite::Result<Activity> {
  conn.execute(
    "INSERT INTO activity (
       id, class_id, recorded_at, image_path, is_complete,
       confidence, result_payload, duration_ms, username
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    rusqlite::params![
      id,
      activity.class_id,
      encode_dt(recorded_at),
      activity.image_path,
      activity.is_complete,
      activity.confidence,
      activity.result_payload,
      activity.duration_ms,
      activity.username,
    ],
  )?;

  Ok(Activity {
    id,
    class_id:       activity.class_id,
    timestamp:      recorded_at,
    image_path:     activity.image_path,
    is_complete:    activity.is_complete,
    confidence:     activity.confidence,
    result_payload: activity.result_payload,
    duration_ms:    activity.duration_ms,
    username:       activity.username,
  })
}

fn insert_material_row(
  conn:        &rusqlite::Connection,
  id:          i64,
  activity_id: i64,
  material:    MaterialDetection,
) -> rusqlite::Result<ActivityMaterial> {
  conn.execute(
    "INSERT INTO activity_material (
       id, activity_id, material_class_id, coordinates, confidence
     ) VALUES (?1, ?2, ?3, ?4, ?5)",
    rusqlite::params![
      id,
      activity_id,
      material.material_class_id,
      material.coordinates,
      material.confidence,
    ],
  )?;

  Ok(ActivityMaterial {
    id,
    activity_id,
    material_class_id: material.material_class_id,
    coordinates:       material.coordinates,
    confidence:        material.confidence,
  })
}

fn row_exists(
  conn:  &rusqlite::Connection,
  sql:   &str,
  value: &str,
) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(sql, rusqlite::params![value], |_| Ok(()))
      .optional()?
      .is_some(),
  )
}

// ─── ResultStore impl ────────────────────────────────────────────────────────

impl ResultStore for SqliteStore {
  type Error = Error;

  // ── Id allocation and single-row primitives ───────────────────────────────

  async fn allocate_next_id(&self, table: Table) -> Result<i64> {
    let id = self.conn.call(move |conn| Ok(next_id(conn, table)?)).await?;
    Ok(id)
  }

  async fn insert_activity(&self, id: i64, activity: NewActivity) -> Result<Activity> {
    let recorded_at = now();
    let activity = self
      .conn
      .call(move |conn| Ok(insert_activity_row(conn, id, recorded_at, activity)?))
      .await?;
    Ok(activity)
  }

  async fn insert_activity_material(
    &self,
    id:          i64,
    activity_id: i64,
    material:    MaterialDetection,
  ) -> Result<ActivityMaterial> {
    let material = self
      .conn
      .call(move |conn| Ok(insert_material_row(conn, id, activity_id, material)?))
      .await?;
    Ok(material)
  }

  // ── Transactional writes ──────────────────────────────────────────────────

  async fn record_result(
    &self,
    activity:  NewActivity,
    materials: Vec<MaterialDetection>,
  ) -> Result<RecordedResult> {
    let recorded_at = now();

    let recorded = self
      .conn
      .call(move |conn| {
        // Dropping `tx` on any early return rolls the whole unit back.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let activity_id = next_id(&tx, Table::Activity)?;
        let activity    = insert_activity_row(&tx, activity_id, recorded_at, activity)?;

        let mut rows = Vec::with_capacity(materials.len());
        for material in materials {
          let id = next_id(&tx, Table::ActivityMaterial)?;
          rows.push(insert_material_row(&tx, id, activity_id, material)?);
        }

        tx.commit()?;
        Ok(RecordedResult { activity, materials: rows })
      })
      .await?;

    debug!(
      activity_id = recorded.activity.id,
      materials = recorded.materials.len(),
      "result committed"
    );
    Ok(recorded)
  }

  async fn insert_user(&self, user: NewUser) -> Result<User> {
    let NewUser { name, email, password } = user;
    // argon2 is CPU-bound; keep it off the async workers.
    let password_hash =
      tokio::task::spawn_blocking(move || user::hash_password(&password)).await??;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if row_exists(&tx, "SELECT 1 FROM app_user WHERE name = ?1", &name)? {
          return Ok(Err(DuplicateField::Name));
        }
        if row_exists(&tx, "SELECT 1 FROM app_user WHERE email = ?1", &email)? {
          return Ok(Err(DuplicateField::Email));
        }

        let id = next_id(&tx, Table::User)?;
        tx.execute(
          "INSERT INTO app_user (id, name, email, password_hash) VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id, name, email, password_hash],
        )?;
        tx.commit()?;

        Ok(Ok(User { id, name, email }))
      })
      .await?;

    outcome.map_err(|field| Error::Core(det_core::Error::DuplicateUser(field)))
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn verify_user<'a>(&'a self, identifier: &'a str, password: &'a str) -> Result<User> {
    let identifier = identifier.to_owned();

    let candidates: Vec<(User, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, name, email, password_hash
           FROM app_user
           WHERE name = ?1 OR email = ?1
           ORDER BY id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![identifier], |row| {
            Ok((
              User { id: row.get(0)?, name: row.get(1)?, email: row.get(2)? },
              row.get(3)?,
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let password = password.to_owned();
    let verified = tokio::task::spawn_blocking(move || {
      candidates
        .into_iter()
        .find(|(_, hash)| user::verify_password(&password, hash))
        .map(|(user, _)| user)
    })
    .await?;

    verified.ok_or(Error::Core(det_core::Error::UserNotFound))
  }

  async fn list_activities(&self) -> Result<Vec<Activity>> {
    let raws: Vec<RawActivity> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {ACTIVITY_COLUMNS} FROM activity ORDER BY id"))?;
        let rows = stmt
          .query_map([], RawActivity::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawActivity::into_activity).collect()
  }

  async fn list_materials(&self, activity_id: i64) -> Result<Vec<ActivityMaterial>> {
    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {MATERIAL_COLUMNS} FROM activity_material WHERE activity_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![activity_id], material_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  async fn list_aggregated_activities(&self) -> Result<Vec<ActivityAggregate>> {
    let raws: Vec<RawAggregate> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT date(recorded_at) AS day,
                  username,
                  is_complete,
                  COUNT(*),
                  AVG(duration_ms)
           FROM activity
           GROUP BY day, username, is_complete
           ORDER BY day, username, is_complete",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawAggregate {
              date:            row.get(0)?,
              username:        row.get(1)?,
              is_complete:     row.get(2)?,
              count:           row.get(3)?,
              avg_duration_ms: row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAggregate::into_aggregate).collect()
  }
}
