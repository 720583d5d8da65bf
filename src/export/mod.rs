//! Document export and the lifecycle of generated artifacts
//!
//! - `generator` renders a completed recording into markdown, RTF or PDF
//! - `store` keeps the bytes for a limited time and sweeps expired ones

mod format;
pub mod generator;
mod store;

pub use format::ExportFormat;
pub use generator::{parse_front_matter, render, ExportMetadata};
pub use store::{ExportArtifact, ExportLookup, ExportStore, ExportView, DEFAULT_EXPORT_TTL};
