use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

/// Route-boundary error carrying the JSON body shape the HTTP surface
/// exposes: `{"error": ...}` plus optional diagnostics.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InternalServerError(String),

    /// An upstream dependency (inference, OCR, parsing) failed; `details`
    /// carries the structured error object for diagnosis.
    #[error("{message}")]
    Upstream {
        message: String,
        details: Option<serde_json::Value>,
        safety_ratings: Option<serde_json::Value>,
    },
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InternalServerError(_) | ApiError::Upstream { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut body = json!({"error": self.to_string()});
        if let ApiError::Upstream {
            details,
            safety_ratings,
            ..
        } = self
        {
            if let Some(details) = details {
                body["details"] = details;
            }
            if let Some(ratings) = safety_ratings {
                body["safety_ratings"] = ratings;
            }
        }
        (status, Json(body)).into_response()
    }
}
