use crate::service::RecordingService;
use std::sync::Arc;

/// Default request body limit for uploads (100 MB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RecordingService>,

    /// Largest accepted audio upload
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(service: RecordingService) -> Self {
        Self {
            service: Arc::new(service),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}
