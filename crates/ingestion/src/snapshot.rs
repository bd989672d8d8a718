//! Latest-reading snapshot artifact

use std::future::Future;
use std::path::{Path, PathBuf};
use storage::{PresentedReading, Reading};
use thiserror::Error;
use tracing::debug;

/// Snapshot write failures (never fatal to ingestion)
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Snapshot I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Sink for the most recent reading
pub trait SnapshotPublisher: Send + Sync {
    fn publish(&self, reading: &Reading) -> impl Future<Output = Result<(), PublishError>> + Send;
}

/// Writes the snapshot as pretty JSON, replacing the file atomically
#[derive(Debug, Clone)]
pub struct FileSnapshotPublisher {
    path: PathBuf,
}

impl FileSnapshotPublisher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back the current snapshot, `None` if none was published yet
    pub async fn load(&self) -> Result<Option<PresentedReading>, PublishError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PublishError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotPublisher for FileSnapshotPublisher {
    async fn publish(&self, reading: &Reading) -> Result<(), PublishError> {
        let body = serde_json::to_vec_pretty(&PresentedReading::from(reading))?;
        let tmp = self.temp_path();

        tokio::fs::write(&tmp, &body)
            .await
            .map_err(|source| PublishError::Io {
                path: tmp.clone(),
                source,
            })?;
        // rename(2) replaces the target in one step, readers never see a torn file
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| PublishError::Io {
                path: self.path.clone(),
                source,
            })?;

        debug!(path = %self.path.display(), id = %reading.id, "Published snapshot");
        Ok(())
    }
}
