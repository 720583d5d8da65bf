mod error;
pub mod file;
pub mod preprocess;

pub use error::AudioError;
pub use file::AudioFile;
pub use preprocess::{
    preprocess, preprocess_or_fallback, AudioChunk, PreprocessConfig, PreprocessedAudio,
    TARGET_SAMPLE_RATE,
};
