//! Recording processing pipeline
//!
//! Stages run strictly in order for each recording:
//! 1. Preprocessing (fallback to raw audio, never retried)
//! 2. Transcription (retried)
//! 3. Cleanup: filler rules + language-model smoothing (retried)
//! 4. Summarization within the mode's unit budget (retried)
//! 5. Confidence scoring (informational)

pub mod cleanup;
pub mod confidence;
mod config;
mod orchestrator;
pub mod services;
pub mod summary;

pub use config::PipelineConfig;
pub use orchestrator::Orchestrator;
pub use services::{
    GenerationRequest, GenerationResponse, GenerationTask, LanguageService, PreprocessingFlags,
    TranscriptionRequest, TranscriptionResponse, TranscriptionService,
};
