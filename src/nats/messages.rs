use serde::{Deserialize, Serialize};

/// Transcription request sent on the transcribe subject
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscribeMessage {
    pub request_id: String,
    pub audio: String, // Base64-encoded audio bytes
    pub format: String,
    pub model_size: String,
    pub language: Option<String>,
    pub noise_reduction: bool,
    pub silence_trimming: bool,
    pub used_fallback: bool,
    pub timestamp: String, // RFC3339 timestamp
}

/// Reply from the STT service
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptMessage {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub segments: Vec<SegmentMessage>,
    pub language: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    /// Set instead of the fields above when the service failed
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SegmentMessage {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Generation request sent on the generate subject
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateMessage {
    pub request_id: String,
    pub task: String,
    pub mode: String,
    pub text: String,
    pub max_tokens: u32,
    pub instruction: String,
    pub custom_instruction: Option<String>,
}

/// Reply from the LLM service
#[derive(Debug, Serialize, Deserialize)]
pub struct GeneratedMessage {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub tokens: u32,
    #[serde(default)]
    pub error: Option<String>,
}
