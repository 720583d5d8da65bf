use super::model::{Recording, RecordingMode, RecordingStatus, Stage, TranscriptSegment};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Results resource, shaped by status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RecordingResults {
    Uploaded,
    Processing,
    Completed(CompletedResults),
    Failed(FailedResults),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptResults {
    pub raw_text: String,
    pub clean_text: String,
    pub confidence_score: f64,
    pub language: String,
    pub processing_time: String,
    pub segments: Vec<TranscriptSegment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResults {
    pub text: String,
    pub mode: RecordingMode,
    pub tokens: u32,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedResults {
    pub id: Uuid,
    pub transcript: TranscriptResults,
    pub summary: Option<SummaryResults>,
    pub low_confidence: bool,
    pub used_fallback: bool,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialResults {
    pub raw_text: Option<String>,
    pub clean_text: Option<String>,
    pub language: Option<String>,
    pub segments: Vec<TranscriptSegment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedResults {
    pub id: Uuid,
    pub error: String,
    pub failed_stage: Option<Stage>,
    pub attempts: u32,
    pub partial_results: Option<PartialResults>,
}

impl RecordingResults {
    pub fn from_recording(recording: &Recording, low_confidence_threshold: f64) -> Self {
        match recording.status {
            RecordingStatus::Uploaded => RecordingResults::Uploaded,
            RecordingStatus::Processing => RecordingResults::Processing,
            RecordingStatus::Completed => {
                RecordingResults::Completed(completed(recording, low_confidence_threshold))
            }
            RecordingStatus::Failed => RecordingResults::Failed(failed(recording)),
        }
    }
}

fn completed(recording: &Recording, threshold: f64) -> CompletedResults {
    let confidence_score = recording.confidence_score.unwrap_or(0.0);
    let low_confidence = recording.is_low_confidence(threshold);
    let used_fallback = recording
        .preprocessing
        .as_ref()
        .is_some_and(|p| p.used_fallback);

    let mut warnings = Vec::new();
    if low_confidence {
        warnings.push(format!(
            "Low transcription confidence ({:.2} < {:.2}); review the transcript",
            confidence_score, threshold
        ));
    }
    if used_fallback {
        let reason = recording
            .preprocessing
            .as_ref()
            .and_then(|p| p.reason.as_deref())
            .unwrap_or("unknown reason");
        warnings.push(format!(
            "Audio preprocessing was skipped, original audio was transcribed ({})",
            reason
        ));
    }

    CompletedResults {
        id: recording.id,
        transcript: TranscriptResults {
            raw_text: recording.raw_transcript.clone().unwrap_or_default(),
            clean_text: recording.clean_transcript.clone().unwrap_or_default(),
            confidence_score,
            language: recording
                .language
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            processing_time: format!("{:.2}s", recording.processing_seconds().unwrap_or(0.0)),
            segments: recording.segments.clone(),
        },
        summary: recording.summary.as_ref().map(|s| SummaryResults {
            text: s.text.clone(),
            mode: s.mode,
            tokens: s.tokens,
            confidence: s.confidence,
        }),
        low_confidence,
        used_fallback,
        warnings,
    }
}

fn failed(recording: &Recording) -> FailedResults {
    let (error, failed_stage, attempts) = match &recording.failure {
        Some(f) => (
            format!("{} failed after {} attempt(s): {}", f.stage, f.attempts, f.message),
            Some(f.stage),
            f.attempts,
        ),
        None => ("Processing failed".to_string(), None, 0),
    };

    let has_text = |t: &Option<String>| t.as_deref().is_some_and(|t| !t.trim().is_empty());
    let partial_results = (has_text(&recording.raw_transcript)
        || has_text(&recording.clean_transcript))
    .then(|| PartialResults {
        raw_text: recording.raw_transcript.clone(),
        clean_text: recording.clean_transcript.clone(),
        language: recording.language.clone(),
        segments: recording.segments.clone(),
    });

    FailedResults {
        id: recording.id,
        error,
        failed_stage,
        attempts,
        partial_results,
    }
}
