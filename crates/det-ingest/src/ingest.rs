//! Persistence of completed units of work.
//!
//! An [`Ingestor`] turns one metadata message (plus payload, for results) into
//! rows in the [`ResultStore`] and a file in the [`FileSink`].

use std::sync::Arc;

use det_core::{
  CorrelationId,
  metadata::{CreateUserRequest, MetadataMessage, ResultMetadata},
  store::ResultStore,
  user::User,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::{error::Error, sink::FileSink};

/// The `data` of a successful save-result acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedResult {
  pub activity_id: i64,
  pub file_name:   String,
  pub materials:   usize,
  pub bytes:       usize,
}

pub struct Ingestor<S> {
  store: Arc<S>,
  sink:  FileSink,
}

impl<S: ResultStore> Ingestor<S> {
  pub fn new(store: Arc<S>, sink: FileSink) -> Self { Self { store, sink } }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn sink(&self) -> &FileSink { &self.sink }

  /// Persist one save-result unit.
  ///
  /// The image is staged before the transaction and published after it
  /// commits. A failed transaction leaves neither rows nor a file.
  pub async fn save_result(
    &self,
    unit: CorrelationId,
    metadata: &MetadataMessage,
    payload: &[u8],
  ) -> Result<SavedResult, Error> {
    let metadata = ResultMetadata::from_message(metadata)?;
    let file_name = metadata.image_name.clone();
    let (activity, materials) = metadata.into_parts();

    let staged = self.sink.stage(&file_name, payload).await?;

    let recorded = match self.store.record_result(activity, materials).await {
      Ok(recorded) => recorded,
      Err(e) => {
        staged.discard().await;
        return Err(Error::from_store(e));
      }
    };

    let activity_id = recorded.activity.id;
    if let Err(e) = staged.commit().await {
      error!(
        %unit,
        activity_id,
        file = %file_name,
        error = %e,
        "result committed but image could not be moved into place"
      );
      return Err(Error::Io(e));
    }

    info!(%unit, activity_id, file = %file_name, bytes = payload.len(), "result saved");
    Ok(SavedResult {
      activity_id,
      file_name,
      materials: recorded.materials.len(),
      bytes: payload.len(),
    })
  }

  /// Persist one create-user unit.
  pub async fn create_user(
    &self,
    unit: CorrelationId,
    metadata: &MetadataMessage,
  ) -> Result<User, Error> {
    let request = CreateUserRequest::from_message(metadata)?;
    match self.store.insert_user(request.user).await {
      Ok(user) => {
        info!(%unit, user_id = user.id, name = %user.name, "user created");
        Ok(user)
      }
      Err(e) => {
        let err = Error::from_store(e);
        warn!(%unit, error = %err, "user not created");
        Err(err)
      }
    }
  }
}
