use axum::{
    body::Bytes,
    extract::{Multipart, State},
    response::Json,
    routing::post,
    Router,
};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    errors::ApiError,
    extraction,
    file_service::FileService,
    gemini::AnalysisError,
    models::{AnalyzeRequest, UploadResponse},
    session::{DocumentContext, SessionId},
    AppState,
};

/// Image types handed to the vision model directly (no OCR step).
const ANALYZE_IMAGE_EXTENSIONS: &[&str] =
    &["png", "jpg", "jpeg", "bmp", "tiff", "tif", "webp"];

/// Document types that go through text extraction before analysis. A file
/// with no extension is treated as text.
const ANALYZE_TEXT_EXTENSIONS: &[&str] = &["pdf", "docx", "xlsx", "txt", "rtf", "csv"];

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/upload", post(upload_file))
        .route("/analyze", post(analyze_report))
}

#[utoipa::path(
    post,
    path = "/upload",
    tag = "documents",
    request_body(content = String, description = "Multipart form data with a `file` field", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File uploaded successfully", body = UploadResponse),
        (status = 400, description = "No file part or no selected file"),
        (status = 500, description = "Failed to save file")
    )
)]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    SessionId(session_id): SessionId,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut file: Option<(String, Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::BadRequest("No file part".to_string()))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("").to_string();
            let data = field.bytes().await.map_err(|e| {
                error!("Failed to read uploaded file: {}", e);
                ApiError::InternalServerError(format!("Failed to save file: {}", e))
            })?;
            file = Some((filename, data));
        }
    }

    let (filename, data) = file.ok_or_else(|| ApiError::BadRequest("No file part".to_string()))?;
    if filename.is_empty() {
        warn!("Upload attempt with no selected file");
        return Err(ApiError::BadRequest("No selected file".to_string()));
    }

    let sanitized = FileService::sanitize_filename(&filename);
    let service = FileService::new(state.config.upload_path.clone());
    let file_path = service.save_upload(&sanitized, &data).await.map_err(|e| {
        error!("Failed to save uploaded file {}: {}", sanitized, e);
        ApiError::InternalServerError(format!("Failed to save file: {}", e))
    })?;

    info!("File uploaded: {}", file_path);

    // A new upload invalidates whatever document the session was grounded on.
    state.sessions.clear(session_id).await;
    info!("Cleared previous document context from session due to new upload");

    Ok(Json(UploadResponse {
        message: "File uploaded successfully".to_string(),
        file_path,
        filename: sanitized,
    }))
}

#[utoipa::path(
    post,
    path = "/analyze",
    tag = "documents",
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "Structured (possibly translated) analysis result"),
        (status = 400, description = "Missing fields, no extractable text, or unsupported file type"),
        (status = 404, description = "File not found"),
        (status = 500, description = "Analysis failed")
    )
)]
pub async fn analyze_report(
    State(state): State<Arc<AppState>>,
    SessionId(session_id): SessionId,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<Value>, ApiError> {
    let file_path = request
        .file_path
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::BadRequest("File path and filename are required".to_string()))?;
    let filename = request
        .filename
        .as_deref()
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ApiError::BadRequest("File path and filename are required".to_string()))?;
    let language = request
        .language
        .as_deref()
        .filter(|l| !l.is_empty())
        .unwrap_or("en");

    let service = FileService::new(state.config.upload_path.clone());
    let resolved = service.resolve_path(file_path, filename).ok_or_else(|| {
        error!("File not found at path: {}", file_path);
        ApiError::NotFound(format!(
            "File not found: {}. It may not have been uploaded correctly or was deleted.",
            filename
        ))
    })?;

    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    info!(
        "Analyzing file: {} (type: {}), target language: {}",
        filename, ext, language
    );

    let analysis = if ANALYZE_IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        let image_data = service.read_file(&resolved).await.map_err(|e| {
            error!("Error reading image file {}: {}", filename, e);
            ApiError::InternalServerError(format!("Error reading image file: {}", e))
        })?;
        if image_data.is_empty() {
            return Err(ApiError::InternalServerError(format!(
                "Could not read image file content: {}",
                filename
            )));
        }

        // Image analysis never grounds chat: drop any stale text context so
        // it cannot leak into later answers.
        state.sessions.clear(session_id).await;

        state
            .gemini
            .analyze_image(&image_data, filename)
            .await
            .map_err(|e| analysis_failure(e, filename))?
    } else if ext.is_empty() || ANALYZE_TEXT_EXTENSIONS.contains(&ext.as_str()) {
        let text = extraction::extract_text(&resolved)
            .await
            .map_err(|e| ApiError::InternalServerError(e.to_string()))?;

        if text.is_empty() {
            state.sessions.clear(session_id).await;
            return Err(ApiError::BadRequest(format!(
                "No text could be extracted from the file: {}. It might be empty, corrupted, or an unsupported format.",
                filename
            )));
        }

        match state.gemini.analyze_text(&text).await {
            Ok(result) => {
                info!(
                    "Stored extracted text ({} chars) and analysis result for {} in session",
                    text.len(),
                    filename
                );
                state
                    .sessions
                    .set(
                        session_id,
                        DocumentContext {
                            text,
                            filename: filename.to_string(),
                            analysis: result.clone(),
                        },
                    )
                    .await;
                result
            }
            Err(e) => {
                state.sessions.clear(session_id).await;
                return Err(analysis_failure(e, filename));
            }
        }
    } else {
        warn!("Unsupported file type for analysis: {} ({})", ext, filename);
        return Err(ApiError::BadRequest(format!(
            "Unsupported file type: .{}. Cannot analyze this file.",
            ext
        )));
    };

    let value = serde_json::to_value(&analysis)
        .map_err(|e| ApiError::InternalServerError(e.to_string()))?;
    let translated = state.translator.translate_analysis(value, language).await;

    Ok(Json(translated))
}

fn analysis_failure(error: AnalysisError, filename: &str) -> ApiError {
    error!("Analysis failed for {}: {}", filename, error);
    ApiError::Upstream {
        message: error.to_string(),
        details: Some(error.details()),
        safety_ratings: None,
    }
}
