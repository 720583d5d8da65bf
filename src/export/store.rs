use super::format::ExportFormat;
use crate::error::{Error, Result};
use crate::recording::{Recording, RecordingStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default time-to-live for generated documents
pub const DEFAULT_EXPORT_TTL: Duration = Duration::from_secs(15 * 60);

/// A generated, time-limited document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportArtifact {
    pub id: Uuid,
    pub recording_id: Uuid,
    pub format: ExportFormat,
    pub path: PathBuf,
    pub size_bytes: usize,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub download_count: u32,
}

impl ExportArtifact {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn download_url(&self) -> String {
        format!("/exports/{}/download", self.id)
    }

    pub fn file_name(&self) -> String {
        format!("recording-{}.{}", self.recording_id, self.format.extension())
    }

    pub fn view(&self) -> ExportView {
        ExportView {
            export_id: self.id,
            download_url: self.download_url(),
            expires_at: self.expires_at,
            format: self.format,
        }
    }
}

/// Public shape of an export resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportView {
    pub export_id: Uuid,
    pub download_url: String,
    pub expires_at: DateTime<Utc>,
    pub format: ExportFormat,
}

/// Outcome of resolving an artifact id. Expiry is reported separately from
/// absence.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportLookup {
    Available {
        artifact: ExportArtifact,
        bytes: Vec<u8>,
    },
    Expired {
        artifact_id: Uuid,
        expired_at: DateTime<Utc>,
    },
    NotFound,
}

/// Stores export documents at `<root>/<recording_id>/<artifact_id>.<ext>`
///
/// Every file and directory change happens while holding the write lock on
/// `artifacts`, so a store never interleaves with a directory removal.
#[derive(Clone)]
pub struct ExportStore {
    root: PathBuf,
    ttl: chrono::Duration,
    artifacts: Arc<RwLock<HashMap<Uuid, ExportArtifact>>>,
}

impl ExportStore {
    pub fn new(root: impl Into<PathBuf>, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| {
            warn!("Export TTL {:?} out of range, using default", ttl);
            chrono::Duration::seconds(DEFAULT_EXPORT_TTL.as_secs() as i64)
        });

        Self {
            root: root.into(),
            ttl,
            artifacts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    pub async fn store(
        &self,
        recording: &Recording,
        format: ExportFormat,
        bytes: Vec<u8>,
    ) -> Result<ExportArtifact> {
        self.store_at(recording, format, bytes, Utc::now()).await
    }

    /// Persist document bytes under a fresh artifact id. The recording must be
    /// completed at this moment.
    pub async fn store_at(
        &self,
        recording: &Recording,
        format: ExportFormat,
        bytes: Vec<u8>,
        now: DateTime<Utc>,
    ) -> Result<ExportArtifact> {
        if recording.status != RecordingStatus::Completed {
            return Err(Error::Render(format!(
                "recording {} is {}, only completed recordings can be exported",
                recording.id, recording.status
            )));
        }

        let id = Uuid::new_v4();
        let dir = self.recording_dir(recording.id);
        let mut artifacts = self.artifacts.write().await;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::storage(format!("Failed to create {}", dir.display()), e))?;

        let path = dir.join(format!("{}.{}", id, format.extension()));
        fs::write(&path, &bytes)
            .await
            .map_err(|e| Error::storage(format!("Failed to write {}", path.display()), e))?;

        let artifact = ExportArtifact {
            id,
            recording_id: recording.id,
            format,
            path,
            size_bytes: bytes.len(),
            created_at: now,
            expires_at: now + self.ttl,
            download_count: 0,
        };

        info!(
            "Stored {} export {} for recording {} ({} bytes, expires {})",
            format, id, recording.id, artifact.size_bytes, artifact.expires_at
        );

        artifacts.insert(id, artifact.clone());
        Ok(artifact)
    }

    pub async fn get(&self, id: Uuid) -> Option<ExportArtifact> {
        self.artifacts.read().await.get(&id).cloned()
    }

    pub async fn list_for_recording(&self, recording_id: Uuid) -> Vec<ExportArtifact> {
        let artifacts = self.artifacts.read().await;
        let mut matching: Vec<ExportArtifact> = artifacts
            .values()
            .filter(|a| a.recording_id == recording_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        matching
    }

    pub async fn resolve(&self, id: Uuid) -> Result<ExportLookup> {
        self.resolve_at(id, Utc::now()).await
    }

    /// Look up an artifact's bytes as of `now`
    pub async fn resolve_at(&self, id: Uuid, now: DateTime<Utc>) -> Result<ExportLookup> {
        let Some(artifact) = self.get(id).await else {
            return Ok(ExportLookup::NotFound);
        };

        if artifact.is_expired_at(now) {
            debug!("Export {} requested after expiry at {}", id, artifact.expires_at);
            return Ok(ExportLookup::Expired {
                artifact_id: id,
                expired_at: artifact.expires_at,
            });
        }

        let bytes = fs::read(&artifact.path).await.map_err(|e| {
            Error::storage(format!("Failed to read {}", artifact.path.display()), e)
        })?;

        let artifact = {
            let mut artifacts = self.artifacts.write().await;
            match artifacts.get_mut(&id) {
                Some(stored) => {
                    stored.download_count += 1;
                    stored.clone()
                }
                // Deleted between the read and now
                None => return Ok(ExportLookup::NotFound),
            }
        };

        Ok(ExportLookup::Available { artifact, bytes })
    }

    /// Remove one artifact. Returns false when nothing was removed.
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut artifacts = self.artifacts.write().await;
        let Some(artifact) = artifacts.remove(&id) else {
            return Ok(false);
        };

        remove_file_if_present(&artifact.path).await?;
        remove_dir_if_empty(&self.recording_dir(artifact.recording_id)).await?;

        info!("Deleted export {}", id);
        Ok(true)
    }

    /// Remove every artifact of a recording; returns how many were tracked
    pub async fn delete_for_recording(&self, recording_id: Uuid) -> Result<usize> {
        let mut artifacts = self.artifacts.write().await;
        let ids: Vec<Uuid> = artifacts
            .values()
            .filter(|a| a.recording_id == recording_id)
            .map(|a| a.id)
            .collect();
        let removed: Vec<ExportArtifact> = ids.iter().filter_map(|id| artifacts.remove(id)).collect();

        let dir = self.recording_dir(recording_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(Error::storage(
                    format!("Failed to remove {}", dir.display()),
                    e,
                ))
            }
        }

        if !removed.is_empty() {
            info!(
                "Deleted {} export(s) of recording {}",
                removed.len(),
                recording_id
            );
        }
        Ok(removed.len())
    }

    pub async fn sweep(&self) -> Result<usize> {
        self.sweep_at(Utc::now()).await
    }

    /// Delete artifacts past their TTL and prune emptied recording directories.
    /// Files that are already gone are not an error.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut artifacts = self.artifacts.write().await;
        let ids: Vec<Uuid> = artifacts
            .values()
            .filter(|a| a.is_expired_at(now))
            .map(|a| a.id)
            .collect();
        let expired: Vec<ExportArtifact> = ids.iter().filter_map(|id| artifacts.remove(id)).collect();

        let mut dirs = HashSet::new();
        for artifact in &expired {
            if let Err(e) = remove_file_if_present(&artifact.path).await {
                warn!("Sweep could not remove export {}: {}", artifact.id, e);
            }
            dirs.insert(artifact.recording_id);
        }
        for recording_id in dirs {
            if let Err(e) = remove_dir_if_empty(&self.recording_dir(recording_id)).await {
                warn!("Sweep could not prune exports of {}: {}", recording_id, e);
            }
        }

        if !expired.is_empty() {
            info!("Swept {} expired export(s)", expired.len());
        }
        Ok(expired.len())
    }

    /// Sweep on a fixed interval until the task is aborted
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            info!("Export sweeper started (every {:?})", interval);
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(e) = store.sweep().await {
                    warn!("Export sweep failed: {}", e);
                }
            }
        })
    }

    fn recording_dir(&self, recording_id: Uuid) -> PathBuf {
        self.root.join(recording_id.to_string())
    }
}

async fn remove_file_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::storage(format!("Failed to remove {}", path.display()), e)),
    }
}

async fn remove_dir_if_empty(dir: &Path) -> Result<()> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::storage(format!("Failed to read {}", dir.display()), e)),
    };

    let has_entries = entries
        .next_entry()
        .await
        .map_err(|e| Error::storage(format!("Failed to read {}", dir.display()), e))?
        .is_some();

    if !has_entries {
        match fs::remove_dir(dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(Error::storage(
                    format!("Failed to remove {}", dir.display()),
                    e,
                ))
            }
        }
    }
    Ok(())
}
