use super::state::AppState;
use crate::error::Error;
use crate::export::ExportFormat;
use crate::recording::{
    AudioFormat, NewRecording, RecordingFilter, RecordingMode, RecordingStatus, RecordingView,
};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadParams {
    /// Audio format; falls back to the Content-Type header
    pub format: Option<String>,
    pub mode: Option<String>,
    pub custom_prompt: Option<String>,
    pub language: Option<String>,
    /// Probed from the audio when absent
    pub duration_seconds: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub mode: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub id: Uuid,
    pub status: RecordingStatus,
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub format: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Error mapping
// ============================================================================

fn error_response(err: Error) -> Response {
    let status = match &err {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::NotFound { .. } => StatusCode::NOT_FOUND,
        Error::Expired(_) => StatusCode::GONE,
        Error::Render(_) | Error::InvalidTransition { .. } => StatusCode::CONFLICT,
        Error::Storage { .. } | Error::Stage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!("Request failed: {}", err);
    }

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim())
        .filter(|v| !v.is_empty() && *v != "application/octet-stream")
}

fn parse_upload(params: UploadParams, headers: &HeaderMap) -> Result<NewRecording, Error> {
    let format: AudioFormat = params
        .format
        .as_deref()
        .or_else(|| content_type(headers))
        .ok_or_else(|| Error::Validation("Missing audio format".to_string()))?
        .parse()?;
    let mode: RecordingMode = params
        .mode
        .as_deref()
        .ok_or_else(|| Error::Validation("Missing mode".to_string()))?
        .parse()?;

    Ok(NewRecording {
        format,
        duration_seconds: params.duration_seconds.unwrap_or(0.0),
        mode,
        custom_prompt: params.custom_prompt.filter(|p| !p.trim().is_empty()),
        language_hint: params.language.filter(|l| !l.trim().is_empty()),
    })
}

fn parse_filter(params: ListParams) -> Result<RecordingFilter, Error> {
    Ok(RecordingFilter {
        status: params.status.as_deref().map(str::parse).transpose()?,
        mode: params.mode.as_deref().map(str::parse).transpose()?,
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /recordings
/// Upload raw audio and create a recording
pub async fn upload_recording(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let metadata = match parse_upload(params, &headers) {
        Ok(m) => m,
        Err(e) => return error_response(e),
    };

    match state.service.upload(&body, metadata).await {
        Ok(recording) => {
            info!("Uploaded recording {} ({} bytes)", recording.id, body.len());
            (StatusCode::CREATED, Json(RecordingView::from(&recording))).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// GET /recordings
pub async fn list_recordings(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    let filter = match parse_filter(params) {
        Ok(f) => f,
        Err(e) => return error_response(e),
    };

    let views: Vec<RecordingView> = state
        .service
        .list(&filter)
        .await
        .iter()
        .map(RecordingView::from)
        .collect();
    (StatusCode::OK, Json(views)).into_response()
}

/// GET /recordings/:id
pub async fn get_recording(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.service.get(id).await {
        Ok(recording) => (StatusCode::OK, Json(RecordingView::from(&recording))).into_response(),
        Err(e) => error_response(e),
    }
}

/// DELETE /recordings/:id
/// Removes the record, its audio and its exports
pub async fn delete_recording(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.service.delete_recording(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /recordings/:id/process
/// Start the pipeline; answers as soon as the recording is processing
pub async fn process_recording(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.service.process(id).await {
        // The pipeline task is detached; progress is observed by polling
        Ok((recording, _handle)) => (
            StatusCode::ACCEPTED,
            Json(ProcessResponse {
                id: recording.id,
                status: recording.status,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /recordings/:id/results
pub async fn get_results(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match state.service.results(id).await {
        Ok(results) => (StatusCode::OK, Json(results)).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /recordings/:id/exports
pub async fn create_export(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ExportRequest>,
) -> impl IntoResponse {
    let format: ExportFormat = match req.format.parse() {
        Ok(f) => f,
        Err(e) => return error_response(e),
    };

    match state.service.create_export(id, format).await {
        Ok(artifact) => (StatusCode::CREATED, Json(artifact.view())).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /exports/:id/download
pub async fn download_export(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.service.download(id).await {
        Ok((artifact, bytes)) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, artifact.format.content_type().to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", artifact.file_name()),
                ),
                (
                    HeaderName::from_static("x-expires-at"),
                    artifact.expires_at.to_rfc3339(),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// DELETE /exports/:id
pub async fn delete_export(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.service.delete_export(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
