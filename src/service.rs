//! Facade over the registry, pipeline and export components
//!
//! The HTTP layer and the CLI go through `RecordingService` so both see the
//! same upload, trigger, results and export semantics.

use crate::audio::AudioFile;
use crate::error::{Error, Result};
use crate::export::{self, ExportArtifact, ExportFormat, ExportLookup, ExportStore};
use crate::pipeline::Orchestrator;
use crate::recording::{
    AudioStore, NewRecording, Recording, RecordingFilter, RecordingRegistry, RecordingResults,
    RecordingStatus,
};
use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct RecordingService {
    registry: RecordingRegistry,
    audio: AudioStore,
    orchestrator: Orchestrator,
    exports: ExportStore,
}

impl RecordingService {
    pub fn new(
        registry: RecordingRegistry,
        audio: AudioStore,
        orchestrator: Orchestrator,
        exports: ExportStore,
    ) -> Self {
        Self {
            registry,
            audio,
            orchestrator,
            exports,
        }
    }

    pub fn registry(&self) -> &RecordingRegistry {
        &self.registry
    }

    pub fn exports(&self) -> &ExportStore {
        &self.exports
    }

    /// Store uploaded audio and create its record with status uploaded.
    /// The duration is probed from the audio when the caller gives none.
    pub async fn upload(&self, bytes: &[u8], mut metadata: NewRecording) -> Result<Recording> {
        if bytes.is_empty() {
            return Err(Error::Validation("Audio body is empty".to_string()));
        }
        metadata.validate()?;

        if metadata.duration_seconds <= 0.0 {
            let owned = bytes.to_vec();
            let format = metadata.format;
            match tokio::task::spawn_blocking(move || AudioFile::probe_duration(&owned, format))
                .await
            {
                Ok(Some(duration)) => metadata.duration_seconds = duration,
                Ok(None) => debug!("Could not probe duration of uploaded {} audio", format),
                Err(e) => warn!("Duration probe task failed: {}", e),
            }
        }

        let recording = self.registry.create(metadata).await?;
        if let Err(e) = self.audio.save(recording.id, recording.format, bytes).await {
            self.registry.delete(recording.id).await;
            return Err(e);
        }

        Ok(recording)
    }

    /// Start processing; returns once the recording is in processing
    pub async fn process(&self, id: Uuid) -> Result<(Recording, JoinHandle<()>)> {
        self.orchestrator.start(id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Recording> {
        self.registry.get(id).await
    }

    pub async fn list(&self, filter: &RecordingFilter) -> Vec<Recording> {
        self.registry.list(filter).await
    }

    pub async fn results(&self, id: Uuid) -> Result<RecordingResults> {
        let recording = self.registry.get(id).await?;
        Ok(RecordingResults::from_recording(
            &recording,
            self.orchestrator.config().low_confidence_threshold,
        ))
    }

    /// Remove the record, its audio and every export generated from it.
    /// An in-flight pipeline keeps running but can no longer write.
    pub async fn delete_recording(&self, id: Uuid) -> Result<()> {
        let recording = self.registry.get(id).await?;
        if !self.registry.delete(id).await {
            return Err(Error::recording_not_found(id));
        }

        if recording.status == RecordingStatus::Processing {
            info!("Recording {} deleted while processing", id);
        }

        let exports = self.exports.delete_for_recording(id).await?;
        if !self.audio.remove(id, recording.format).await? {
            warn!("Audio for recording {} was already gone", id);
        }

        info!("Deleted recording {} and {} export(s)", id, exports);
        Ok(())
    }

    pub async fn create_export(&self, id: Uuid, format: ExportFormat) -> Result<ExportArtifact> {
        let recording = self.registry.get(id).await?;
        let bytes = export::render(&recording, format, Utc::now())?;
        let artifact = self.exports.store(&recording, format, bytes).await?;

        // Deleted while rendering: the per-recording cleanup has already run
        if !self.registry.contains(id).await {
            self.exports.delete(artifact.id).await?;
            return Err(Error::recording_not_found(id));
        }

        Ok(artifact)
    }

    /// Bytes of a live artifact. Expired and unknown ids are distinct errors.
    pub async fn download(&self, export_id: Uuid) -> Result<(ExportArtifact, Vec<u8>)> {
        match self.exports.resolve(export_id).await? {
            ExportLookup::Available { artifact, bytes } => Ok((artifact, bytes)),
            ExportLookup::Expired { artifact_id, .. } => Err(Error::Expired(artifact_id)),
            ExportLookup::NotFound => Err(Error::export_not_found(export_id)),
        }
    }

    pub async fn delete_export(&self, export_id: Uuid) -> Result<()> {
        if self.exports.delete(export_id).await? {
            Ok(())
        } else {
            Err(Error::export_not_found(export_id))
        }
    }
}
