use super::model::AudioFormat;
use crate::error::{Error, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;
use uuid::Uuid;

/// Uploaded audio on disk, one file per recording: `<root>/<id>.<ext>`
#[derive(Debug, Clone)]
pub struct AudioStore {
    root: PathBuf,
}

impl AudioStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, id: Uuid, format: AudioFormat) -> PathBuf {
        self.root.join(format!("{}.{}", id, format.extension()))
    }

    pub async fn save(&self, id: Uuid, format: AudioFormat, bytes: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Error::storage("Failed to create recordings directory", e))?;

        let path = self.path_for(id, format);
        fs::write(&path, bytes)
            .await
            .map_err(|e| Error::storage(format!("Failed to write {}", path.display()), e))?;

        info!("Stored {} bytes of audio at {}", bytes.len(), path.display());
        Ok(path)
    }

    pub async fn load(&self, id: Uuid, format: AudioFormat) -> Result<Vec<u8>> {
        let path = self.path_for(id, format);
        fs::read(&path)
            .await
            .map_err(|e| Error::storage(format!("Failed to read {}", path.display()), e))
    }

    /// Returns false when there was nothing to remove
    pub async fn remove(&self, id: Uuid, format: AudioFormat) -> Result<bool> {
        let path = self.path_for(id, format);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::storage(
                format!("Failed to remove {}", path.display()),
                e,
            )),
        }
    }
}
