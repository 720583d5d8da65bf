pub mod audio;
pub mod config;
pub mod error;
pub mod export;
pub mod http;
pub mod nats;
pub mod pipeline;
pub mod recording;
pub mod service;

pub use audio::{AudioError, AudioFile, PreprocessConfig, PreprocessedAudio};
pub use config::Config;
pub use error::{Error, Result};
pub use export::{ExportArtifact, ExportFormat, ExportLookup, ExportStore};
pub use http::{create_router, AppState};
pub use nats::NatsServices;
pub use pipeline::{LanguageService, Orchestrator, PipelineConfig, TranscriptionService};
pub use recording::{
    AudioFormat, AudioStore, NewRecording, Recording, RecordingMode, RecordingRegistry,
    RecordingResults, RecordingStatus,
};
pub use service::RecordingService;
