use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle status of a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingStatus {
    Uploaded,
    Processing,
    Completed,
    Failed,
}

impl RecordingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RecordingStatus::Completed | RecordingStatus::Failed)
    }

    /// uploaded -> processing -> {completed | failed}, nothing else.
    pub fn can_transition_to(self, next: RecordingStatus) -> bool {
        matches!(
            (self, next),
            (RecordingStatus::Uploaded, RecordingStatus::Processing)
                | (RecordingStatus::Processing, RecordingStatus::Completed)
                | (RecordingStatus::Processing, RecordingStatus::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordingStatus::Uploaded => "uploaded",
            RecordingStatus::Processing => "processing",
            RecordingStatus::Completed => "completed",
            RecordingStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RecordingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordingStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uploaded" => Ok(RecordingStatus::Uploaded),
            "processing" => Ok(RecordingStatus::Processing),
            "completed" => Ok(RecordingStatus::Completed),
            "failed" => Ok(RecordingStatus::Failed),
            other => Err(Error::Validation(format!("Unknown status: {}", other))),
        }
    }
}

/// Caller-selected summarization target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingMode {
    Lecture,
    Meeting,
    Interview,
    Custom,
}

impl RecordingMode {
    /// Maximum summary size in token-equivalent units
    pub fn summary_budget(self) -> u32 {
        match self {
            RecordingMode::Lecture => 400,
            RecordingMode::Meeting => 300,
            RecordingMode::Interview => 350,
            RecordingMode::Custom => 500,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordingMode::Lecture => "lecture",
            RecordingMode::Meeting => "meeting",
            RecordingMode::Interview => "interview",
            RecordingMode::Custom => "custom",
        }
    }
}

impl fmt::Display for RecordingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lecture" => Ok(RecordingMode::Lecture),
            "meeting" => Ok(RecordingMode::Meeting),
            "interview" => Ok(RecordingMode::Interview),
            "custom" => Ok(RecordingMode::Custom),
            other => Err(Error::Validation(format!("Unknown mode: {}", other))),
        }
    }
}

/// Container format of the uploaded audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Webm,
    Mp3,
    Mp4,
    M4a,
    Ogg,
    Flac,
    Aac,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Webm => "webm",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Mp4 => "mp4",
            AudioFormat::M4a => "m4a",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Flac => "flac",
            AudioFormat::Aac => "aac",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for AudioFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().trim_start_matches('.').to_ascii_lowercase();
        // Accept MIME types such as "audio/x-m4a" as well as bare extensions
        let name = normalized
            .rsplit('/')
            .next()
            .unwrap_or(&normalized)
            .trim_start_matches("x-");
        match name {
            "wav" | "wave" => Ok(AudioFormat::Wav),
            "webm" => Ok(AudioFormat::Webm),
            "mp3" | "mpeg" => Ok(AudioFormat::Mp3),
            "mp4" => Ok(AudioFormat::Mp4),
            "m4a" => Ok(AudioFormat::M4a),
            "ogg" => Ok(AudioFormat::Ogg),
            "flac" => Ok(AudioFormat::Flac),
            "aac" => Ok(AudioFormat::Aac),
            _ => Err(Error::Validation(format!("Unsupported audio format: {}", s))),
        }
    }
}

/// One ordered unit of the processing pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Preprocessing,
    Transcription,
    Cleanup,
    Summarization,
    Confidence,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Preprocessing => "preprocessing",
            Stage::Transcription => "transcription",
            Stage::Cleanup => "cleanup",
            Stage::Summarization => "summarization",
            Stage::Confidence => "confidence",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attempts made so far by each retryable stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageAttempts {
    pub transcription: u32,
    pub cleanup: u32,
    pub summarization: u32,
}

impl StageAttempts {
    pub fn get(&self, stage: Stage) -> u32 {
        match stage {
            Stage::Transcription => self.transcription,
            Stage::Cleanup => self.cleanup,
            Stage::Summarization => self.summarization,
            Stage::Preprocessing | Stage::Confidence => 0,
        }
    }

    pub fn set(&mut self, stage: Stage, attempts: u32) {
        match stage {
            Stage::Transcription => self.transcription = attempts,
            Stage::Cleanup => self.cleanup = attempts,
            Stage::Summarization => self.summarization = attempts,
            Stage::Preprocessing | Stage::Confidence => {}
        }
    }
}

/// A timed piece of the raw transcript (seconds from the start of the clip)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub mode: RecordingMode,
    pub text: String,
    pub tokens: u32,
    pub confidence: f64,
}

/// Outcome of the preprocessing stage. `used_fallback` means the raw upload
/// went to transcription unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreprocessingReport {
    pub used_fallback: bool,
    pub reason: Option<String>,
    pub chunk_count: usize,
    pub processed_duration_seconds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub stage: Stage,
    pub attempts: u32,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    pub id: Uuid,
    pub format: AudioFormat,
    pub duration_seconds: f64,
    pub mode: RecordingMode,
    /// Caller-supplied instruction, required when mode is custom
    pub custom_prompt: Option<String>,
    pub language_hint: Option<String>,
    pub status: RecordingStatus,
    pub raw_transcript: Option<String>,
    pub clean_transcript: Option<String>,
    pub segments: Vec<TranscriptSegment>,
    pub confidence_score: Option<f64>,
    pub language: Option<String>,
    pub summary: Option<Summary>,
    pub attempts: StageAttempts,
    pub preprocessing: Option<PreprocessingReport>,
    pub failure: Option<FailureReport>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Recording {
    /// Best transcript available: the cleaned one, else the raw one
    pub fn transcript(&self) -> Option<&str> {
        self.clean_transcript
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.raw_transcript.as_deref().filter(|t| !t.trim().is_empty()))
    }

    /// Seconds between pipeline start and terminal status
    pub fn processing_seconds(&self) -> Option<f64> {
        let started = self.processing_started_at?;
        let finished = self.finished_at?;
        Some(finished.signed_duration_since(started).num_milliseconds() as f64 / 1000.0)
    }

    pub fn is_low_confidence(&self, threshold: f64) -> bool {
        self.confidence_score.is_some_and(|score| score < threshold)
    }
}

/// Upload metadata used to create a recording
#[derive(Debug, Clone)]
pub struct NewRecording {
    pub format: AudioFormat,
    pub duration_seconds: f64,
    pub mode: RecordingMode,
    pub custom_prompt: Option<String>,
    pub language_hint: Option<String>,
}

impl NewRecording {
    pub fn new(format: AudioFormat, mode: RecordingMode) -> Self {
        Self {
            format,
            duration_seconds: 0.0,
            mode,
            custom_prompt: None,
            language_hint: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.duration_seconds.is_finite() || self.duration_seconds < 0.0 {
            return Err(Error::Validation(format!(
                "Invalid duration: {}",
                self.duration_seconds
            )));
        }
        let has_prompt = self
            .custom_prompt
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty());
        if self.mode == RecordingMode::Custom && !has_prompt {
            return Err(Error::Validation(
                "Custom mode requires a custom prompt".to_string(),
            ));
        }
        Ok(())
    }
}

/// Partial update written by a pipeline stage. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct StageOutput {
    pub raw_transcript: Option<String>,
    pub clean_transcript: Option<String>,
    pub segments: Option<Vec<TranscriptSegment>>,
    pub language: Option<String>,
    pub confidence_score: Option<f64>,
    pub summary: Option<Summary>,
    pub attempts: Option<(Stage, u32)>,
    pub preprocessing: Option<PreprocessingReport>,
    pub failure: Option<FailureReport>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordingFilter {
    pub status: Option<RecordingStatus>,
    pub mode: Option<RecordingMode>,
}

impl RecordingFilter {
    pub fn matches(&self, recording: &Recording) -> bool {
        self.status.map_or(true, |s| recording.status == s)
            && self.mode.map_or(true, |m| recording.mode == m)
    }
}

/// Public shape of a recording resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingView {
    pub id: Uuid,
    pub format: AudioFormat,
    pub duration_seconds: f64,
    pub mode: RecordingMode,
    pub status: RecordingStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&Recording> for RecordingView {
    fn from(recording: &Recording) -> Self {
        Self {
            id: recording.id,
            format: recording.format,
            duration_seconds: recording.duration_seconds,
            mode: recording.mode,
            status: recording.status,
            created_at: recording.created_at,
        }
    }
}
