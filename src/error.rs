//! Error types for the recording pipeline.

use crate::recording::{RecordingStatus, Stage};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed mode/format or missing input. Never retried.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Reading or writing audio/document bytes failed. Not retried at this layer.
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// A retryable stage exhausted its attempts.
    #[error("{stage} failed after {attempts} attempt(s): {message}")]
    Stage {
        stage: Stage,
        attempts: u32,
        message: String,
    },

    #[error("Cannot render export: {0}")]
    Render(String),

    #[error("Export {0} has expired")]
    Expired(Uuid),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: Uuid },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: RecordingStatus,
        to: RecordingStatus,
    },
}

impl Error {
    pub fn storage(message: impl Into<String>, source: std::io::Error) -> Self {
        Error::Storage {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn recording_not_found(id: Uuid) -> Self {
        Error::NotFound {
            kind: "Recording",
            id,
        }
    }

    pub fn export_not_found(id: Uuid) -> Self {
        Error::NotFound { kind: "Export", id }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
