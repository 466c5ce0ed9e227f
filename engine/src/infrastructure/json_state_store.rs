//! JSON file state store
//! The durable replica of the daemon state; replaced atomically on every save

use crate::domain::entities::PersistedDaemonState;
use crate::domain::ports::StateStore;
use crate::domain::DomainError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

#[async_trait]
impl StateStore for JsonStateStore {
    async fn load(&self) -> Result<Option<PersistedDaemonState>, DomainError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(DomainError::StateCorrupted(format!(
                    "{}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| DomainError::StateCorrupted(format!("{}: {}", self.path.display(), e)))
    }

    async fn save(&self, state: &PersistedDaemonState) -> Result<(), DomainError> {
        let persistence = |e: std::io::Error| {
            DomainError::Persistence(format!("{}: {}", self.path.display(), e))
        };

        let bytes = serde_json::to_vec_pretty(state)
            .map_err(|e| DomainError::Persistence(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(persistence)?;
        }
        let tmp_path = self.tmp_path();
        tokio::fs::write(&tmp_path, &bytes).await.map_err(persistence)?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(persistence)?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "State saved");
        Ok(())
    }
}
