//! The `ResultStore` trait and the id spaces it allocates from.
//!
//! The trait is implemented by storage backends (e.g. `det-store-sqlite`).
//! The ingestion service and the query API depend on this abstraction, not
//! on any concrete backend.

use std::future::Future;

use crate::{
  activity::{
    Activity, ActivityAggregate, ActivityMaterial, MaterialDetection, NewActivity,
    RecordedResult,
  },
  user::{NewUser, User},
};

/// A table whose primary keys are allocated as `max(id) + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
  Activity,
  ActivityMaterial,
  User,
}

impl Table {
  pub const fn as_str(self) -> &'static str {
    match self {
      Table::Activity => "activity",
      Table::ActivityMaterial => "activity_material",
      Table::User => "app_user",
    }
  }
}

/// Errors produced by a [`ResultStore`] backend.
///
/// Backends wrap domain failures (duplicate user, unknown user) alongside
/// their own database errors; callers use [`StoreError::domain`] to tell the
/// two apart without knowing the backend.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn domain(&self) -> Option<&crate::Error>;
}

/// Abstraction over a durable result store.
///
/// Nothing written through this trait is ever updated or deleted.
pub trait ResultStore: Send + Sync {
  type Error: StoreError;

  // ── Id allocation and single-row primitives ───────────────────────────

  /// Return `max(id) + 1` for `table`, or `1` when it is empty.
  ///
  /// This is a bare read: two callers racing on the same table can receive
  /// the same id. Use [`ResultStore::record_result`] or
  /// [`ResultStore::insert_user`], which allocate inside their transaction.
  fn allocate_next_id(
    &self,
    table: Table,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + '_;

  /// Insert one activity with a caller-allocated id. Fails if the id is
  /// taken or the class reference is invalid.
  fn insert_activity(
    &self,
    id: i64,
    activity: NewActivity,
  ) -> impl Future<Output = Result<Activity, Self::Error>> + Send + '_;

  /// Insert one material row with a caller-allocated id.
  fn insert_activity_material(
    &self,
    id: i64,
    activity_id: i64,
    material: MaterialDetection,
  ) -> impl Future<Output = Result<ActivityMaterial, Self::Error>> + Send + '_;

  // ── Transactional writes ──────────────────────────────────────────────

  /// Atomically allocate ids for and insert an activity and all of its
  /// materials. Either every row exists afterwards or none does.
  fn record_result(
    &self,
    activity: NewActivity,
    materials: Vec<MaterialDetection>,
  ) -> impl Future<Output = Result<RecordedResult, Self::Error>> + Send + '_;

  /// Create a user after checking that neither the name nor the e-mail is
  /// taken; the name is checked first.
  fn insert_user(
    &self,
    user: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Find the user whose name or e-mail equals `identifier` and whose
  /// password matches.
  fn verify_user<'a>(
    &'a self,
    identifier: &'a str,
    password: &'a str,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + 'a;

  fn list_activities(
    &self,
  ) -> impl Future<Output = Result<Vec<Activity>, Self::Error>> + Send + '_;

  fn list_materials(
    &self,
    activity_id: i64,
  ) -> impl Future<Output = Result<Vec<ActivityMaterial>, Self::Error>> + Send + '_;

  /// Counts and mean duration grouped by `(date, username, isComplete)`.
  fn list_aggregated_activities(
    &self,
  ) -> impl Future<Output = Result<Vec<ActivityAggregate>, Self::Error>> + Send + '_;
}
