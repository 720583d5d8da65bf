//! HTTP API for uploading recordings and fetching their results
//!
//! - POST /recordings - Upload raw audio (format/mode in the query string)
//! - GET /recordings - List recordings, filtered by status and mode
//! - GET /recordings/:id - Recording resource
//! - DELETE /recordings/:id - Remove a recording with its audio and exports
//! - POST /recordings/:id/process - Start the pipeline
//! - GET /recordings/:id/results - Status-shaped results
//! - POST /recordings/:id/exports - Generate a time-limited document
//! - GET /exports/:id/download - Fetch a document (410 once expired)
//! - DELETE /exports/:id - Remove a document
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::ErrorResponse;
pub use routes::create_router;
pub use state::{AppState, DEFAULT_MAX_UPLOAD_BYTES};
