use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gastocr_ocr::{ModelError, PipelineError};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// Request failures mapped onto HTTP statuses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Invalid image: {0}")]
    InvalidImage(String),
    #[error("Upload too large")]
    PayloadTooLarge,
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail),
            ApiError::InvalidImage(detail) => (StatusCode::BAD_REQUEST, "INVALID_IMAGE", detail),
            ApiError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                "Uploaded file exceeds the size limit".to_string(),
            ),
            ApiError::ModelUnavailable(detail) => {
                tracing::warn!(detail = %detail, "Inference engine unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "MODEL_UNAVAILABLE",
                    "The model is not available, try again later".to_string(),
                )
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: ErrorDetail { code, message } })).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::InvalidImage(e) => ApiError::InvalidImage(e.to_string()),
            PipelineError::Inference(ModelError::InvalidInput(detail)) => {
                ApiError::InvalidImage(detail)
            }
            PipelineError::ModelUnavailable(e) => ApiError::ModelUnavailable(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::BadRequest(err.body_text())
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use gastocr_ocr::PreprocessError;

    use super::*;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn bad_request_carries_detail() {
        let (status, body) = body_json(ApiError::BadRequest("File provided is not an image".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
        assert_eq!(body["error"]["message"], "File provided is not an image");
    }

    #[tokio::test]
    async fn internal_hides_detail() {
        let (status, body) = body_json(ApiError::Internal("task join: panicked".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "INTERNAL");
        assert!(!body["error"]["message"].as_str().unwrap().contains("panicked"));
    }

    #[test]
    fn pipeline_errors_map_to_statuses() {
        let invalid = ApiError::from(PipelineError::InvalidImage(PreprocessError::Empty));
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);

        let unavailable =
            ApiError::from(PipelineError::ModelUnavailable(ModelError::NotAvailable("x".into())));
        assert_eq!(unavailable.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);

        let rejected =
            ApiError::from(PipelineError::Inference(ModelError::InvalidInput("no words".into())));
        assert!(matches!(rejected, ApiError::InvalidImage(_)));

        let failed = ApiError::from(PipelineError::Inference(ModelError::Inference("nan".into())));
        assert_eq!(failed.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
