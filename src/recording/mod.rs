//! Recording records and their lifecycle
//!
//! This module provides:
//! - The `Recording` entity, its status state machine, modes and formats
//! - `RecordingRegistry`, the single source of truth for status and stage outputs
//! - `AudioStore`, where uploaded audio bytes live until the recording is deleted

mod audio_store;
mod model;
mod registry;
mod results;

pub use audio_store::AudioStore;
pub use model::{
    AudioFormat, FailureReport, NewRecording, PreprocessingReport, Recording, RecordingFilter,
    RecordingMode, RecordingStatus, RecordingView, Stage, StageAttempts, StageOutput, Summary,
    TranscriptSegment,
};
pub use registry::RecordingRegistry;
pub use results::{
    CompletedResults, FailedResults, PartialResults, RecordingResults, SummaryResults,
    TranscriptResults,
};
