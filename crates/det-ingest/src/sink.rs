//! File sink for uploaded images.
//!
//! Images are first staged under a hidden, fixed-length temporary name in the
//! same directory, then renamed into place once the database write has committed.
//! A unit whose database write fails therefore leaves no file behind.

use std::{
  io,
  path::{Path, PathBuf},
};

use uuid::Uuid;

/// Create or overwrite the file at `path`. The parent directory must exist.
pub async fn write(bytes: &[u8], path: &Path) -> io::Result<()> {
  tokio::fs::write(path, bytes).await
}

/// Writes image files under a fixed root directory, keyed by basename.
#[derive(Debug, Clone)]
pub struct FileSink {
  root: PathBuf,
}

impl FileSink {
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  pub fn root(&self) -> &Path { &self.root }

  /// Final location of the image called `name`.
  pub fn path_for(&self, name: &str) -> PathBuf { self.root.join(name) }

  /// Write `bytes` to a unique temporary file that will become `name`.
  pub async fn stage(&self, name: &str, bytes: &[u8]) -> io::Result<StagedFile> {
    let temp = self.root.join(format!(".{}.partial", Uuid::new_v4().simple()));
    write(bytes, &temp).await?;
    Ok(StagedFile { temp, dest: self.path_for(name) })
  }
}

/// An image written to its temporary name but not yet published.
#[derive(Debug)]
#[must_use = "a staged file must be committed or discarded"]
pub struct StagedFile {
  temp: PathBuf,
  dest: PathBuf,
}

impl StagedFile {
  pub fn destination(&self) -> &Path { &self.dest }

  /// Atomically move the file to its final name, replacing any previous
  /// file of the same name.
  pub async fn commit(self) -> io::Result<PathBuf> {
    tokio::fs::rename(&self.temp, &self.dest).await?;
    Ok(self.dest)
  }

  /// Remove the temporary file. Failures are logged, not returned.
  pub async fn discard(self) {
    if let Err(e) = tokio::fs::remove_file(&self.temp).await {
      tracing::warn!(path = %self.temp.display(), error = %e, "failed to remove staged file");
    }
  }
}
