use thiserror::Error;

/// Reasons preprocessing could not produce canonical audio.
///
/// None of these fail a recording; the pipeline falls back to the raw upload.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Audio payload is empty")]
    Empty,

    #[error("No decodable audio track")]
    NoAudioTrack,

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Resampling failed: {0}")]
    Resample(String),

    #[error("Clip contains no sound above the silence threshold")]
    Silent,

    #[error("WAV encoding failed: {0}")]
    Encode(#[from] hound::Error),
}
