use super::confidence::LOW_CONFIDENCE_THRESHOLD;
use crate::audio::PreprocessConfig;
use std::time::Duration;

/// Configuration for pipeline runs
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Speech-to-text model size hint passed to the transcription service
    pub model_size: String,

    /// Upper bound on a single external call
    pub stage_timeout: Duration,

    /// Ceiling for a whole pipeline run; calls never outlive it
    pub pipeline_timeout: Duration,

    /// Attempts per retryable stage (1 initial + retries)
    pub max_attempts: u32,

    /// Pause between attempts of the same stage
    pub retry_backoff: Duration,

    pub preprocess: PreprocessConfig,

    /// Completed results below this confidence are flagged
    pub low_confidence_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_size: "base".to_string(),
            stage_timeout: Duration::from_secs(120),
            pipeline_timeout: Duration::from_secs(300), // 5 minutes
            max_attempts: 3,
            retry_backoff: Duration::from_millis(500),
            preprocess: PreprocessConfig::default(),
            low_confidence_threshold: LOW_CONFIDENCE_THRESHOLD,
        }
    }
}
