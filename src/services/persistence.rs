use std::path::PathBuf;

use async_trait::async_trait;

use crate::models::job::JobSnapshot;

/// Durable slot for the current-job snapshot.
///
/// One logical slot, overwritten wholesale on every save. Implementations
/// must make `load` total: absent or corrupt data is "no job", never an error
/// on the startup path.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, snapshot: &JobSnapshot) -> Result<(), StoreError>;
    async fn load(&self) -> Option<JobSnapshot>;
    async fn clear(&self) -> Result<(), StoreError>;
}

/// File-backed snapshot store, one JSON document per slot.
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn save(&self, snapshot: &JobSnapshot) -> Result<(), StoreError> {
        let payload = serde_json::to_vec_pretty(snapshot)?;
        tokio::fs::write(&self.path, payload).await?;
        tracing::debug!(
            job_id = %snapshot.job_id,
            status = %snapshot.status,
            "Snapshot saved"
        );
        Ok(())
    }

    async fn load(&self) -> Option<JobSnapshot> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Snapshot unreadable");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Snapshot corrupt, ignoring");
                None
            }
        }
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}
