//! Contracts for the external speech-to-text and language-model services.

use crate::recording::{AudioFormat, RecordingMode, TranscriptSegment};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// What preprocessing did to the audio before it was sent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreprocessingFlags {
    pub noise_reduction: bool,
    pub silence_trimming: bool,
    pub used_fallback: bool,
}

#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    pub audio: Vec<u8>,
    pub format: AudioFormat,
    /// Whisper model size hint (tiny, base, small, medium, large)
    pub model_size: String,
    pub language: Option<String>,
    pub flags: PreprocessingFlags,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionResponse {
    pub raw_transcript: String,
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
    pub language: Option<String>,
    /// Average token probability (0.0 to 1.0)
    pub average_confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationTask {
    /// Readability pass over an already rule-cleaned transcript
    Cleanup,
    /// Mode-aware summary
    Summarize,
}

impl GenerationTask {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationTask::Cleanup => "cleanup",
            GenerationTask::Summarize => "summarize",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub task: GenerationTask,
    pub text: String,
    pub mode: RecordingMode,
    /// Upper bound on generated units; the service must stop generating there
    pub max_units: u32,
    pub instruction: String,
    pub custom_instruction: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    pub text: String,
    pub units: u32,
}

/// Speech-to-text engine
#[async_trait::async_trait]
pub trait TranscriptionService: Send + Sync {
    async fn transcribe(&self, request: TranscriptionRequest) -> Result<TranscriptionResponse>;

    /// Name for logging
    fn name(&self) -> &str;
}

/// Language model used for cleanup smoothing and summarization
#[async_trait::async_trait]
pub trait LanguageService: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse>;

    /// Name for logging
    fn name(&self) -> &str;
}
