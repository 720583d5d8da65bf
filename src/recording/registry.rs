use super::model::{NewRecording, Recording, RecordingFilter, RecordingStatus, StageOutput};
use crate::error::{Error, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Arena of recordings keyed by id.
///
/// Writes are last-write-wins. Exactly one pipeline run owns a recording at a
/// time, so no per-record locking is needed beyond the map lock.
#[derive(Clone, Default)]
pub struct RecordingRegistry {
    recordings: Arc<RwLock<HashMap<Uuid, Recording>>>,
}

impl RecordingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an uploaded recording with status=uploaded
    pub async fn create(&self, metadata: NewRecording) -> Result<Recording> {
        metadata.validate()?;

        let now = Utc::now();
        let recording = Recording {
            id: Uuid::new_v4(),
            format: metadata.format,
            duration_seconds: metadata.duration_seconds,
            mode: metadata.mode,
            custom_prompt: metadata.custom_prompt,
            language_hint: metadata.language_hint,
            status: RecordingStatus::Uploaded,
            raw_transcript: None,
            clean_transcript: None,
            segments: Vec::new(),
            confidence_score: None,
            language: None,
            summary: None,
            attempts: Default::default(),
            preprocessing: None,
            failure: None,
            created_at: now,
            updated_at: now,
            processing_started_at: None,
            finished_at: None,
        };

        info!(
            "Registered recording {} ({}, {} mode, {:.1}s)",
            recording.id, recording.format, recording.mode, recording.duration_seconds
        );

        let mut recordings = self.recordings.write().await;
        recordings.insert(recording.id, recording.clone());

        Ok(recording)
    }

    pub async fn get(&self, id: Uuid) -> Result<Recording> {
        let recordings = self.recordings.read().await;
        recordings
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::recording_not_found(id))
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.recordings.read().await.contains_key(&id)
    }

    /// Move a recording along the state machine. Rejects any transition that
    /// is not uploaded -> processing -> {completed | failed}.
    pub async fn update_status(&self, id: Uuid, status: RecordingStatus) -> Result<Recording> {
        let mut recordings = self.recordings.write().await;
        let recording = recordings
            .get_mut(&id)
            .ok_or_else(|| Error::recording_not_found(id))?;

        if !recording.status.can_transition_to(status) {
            warn!(
                "Rejected transition {} -> {} for recording {}",
                recording.status, status, id
            );
            return Err(Error::InvalidTransition {
                from: recording.status,
                to: status,
            });
        }

        let now = Utc::now();
        match status {
            RecordingStatus::Processing => recording.processing_started_at = Some(now),
            RecordingStatus::Completed | RecordingStatus::Failed => {
                recording.finished_at = Some(now)
            }
            RecordingStatus::Uploaded => {}
        }
        recording.status = status;
        recording.updated_at = now;

        info!("Recording {} is now {}", id, status);

        Ok(recording.clone())
    }

    /// Merge a stage's output into the stored record
    pub async fn save_stage_output(&self, id: Uuid, output: StageOutput) -> Result<Recording> {
        let mut recordings = self.recordings.write().await;
        let recording = recordings
            .get_mut(&id)
            .ok_or_else(|| Error::recording_not_found(id))?;

        if let Some(raw) = output.raw_transcript {
            merge_transcript(&mut recording.raw_transcript, raw, "raw", id);
        }
        if let Some(clean) = output.clean_transcript {
            merge_transcript(&mut recording.clean_transcript, clean, "clean", id);
        }
        if let Some(segments) = output.segments {
            recording.segments = segments;
        }
        if let Some(language) = output.language {
            recording.language = Some(language);
        }
        if let Some(score) = output.confidence_score {
            recording.confidence_score = Some(clamp_unit(score));
        }
        if let Some(summary) = output.summary {
            recording.summary = Some(summary);
        }
        if let Some((stage, attempts)) = output.attempts {
            recording.attempts.set(stage, attempts);
        }
        if let Some(report) = output.preprocessing {
            recording.preprocessing = Some(report);
        }
        if let Some(failure) = output.failure {
            recording.failure = Some(failure);
        }
        recording.updated_at = Utc::now();

        Ok(recording.clone())
    }

    /// Recordings matching the filter, newest first
    pub async fn list(&self, filter: &RecordingFilter) -> Vec<Recording> {
        let recordings = self.recordings.read().await;
        let mut matching: Vec<Recording> = recordings
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching
    }

    pub async fn delete(&self, id: Uuid) -> bool {
        let removed = self.recordings.write().await.remove(&id).is_some();
        if removed {
            info!("Deleted recording {}", id);
        }
        removed
    }
}

/// A stage never replaces saved transcript text with empty content.
fn merge_transcript(slot: &mut Option<String>, incoming: String, label: &str, id: Uuid) {
    let has_existing = slot.as_deref().is_some_and(|t| !t.trim().is_empty());
    if incoming.trim().is_empty() && has_existing {
        debug!("Ignoring empty {} transcript write for {}", label, id);
        return;
    }
    *slot = Some(incoming);
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
