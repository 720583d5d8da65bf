//! NATS request/reply adapters for the speech-to-text and language-model services

pub mod client;
pub mod messages;

pub use client::NatsServices;
pub use messages::{
    GenerateMessage, GeneratedMessage, SegmentMessage, TranscribeMessage, TranscriptMessage,
};
