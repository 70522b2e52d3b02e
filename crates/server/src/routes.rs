use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use gastocr_core::LabelId;
use gastocr_ocr::{EngineKind, ReceiptAnalysis, ReceiptPipeline};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::error::ApiError;

const UPLOAD_FIELD: &str = "file";

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<ReceiptPipeline>,
    engine: EngineKind,
}

impl AppState {
    pub fn new(pipeline: ReceiptPipeline, engine: EngineKind) -> Self {
        Self { pipeline: Arc::new(pipeline), engine }
    }
}

#[derive(Debug, Serialize)]
struct TokenPrediction {
    token: String,
    label: LabelId,
}

#[derive(Debug, Serialize)]
struct TokensResponse {
    tokens: Vec<TokenPrediction>,
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/v1/ocr/predict", post(predict))
        .route("/api/v1/ocr/tokens", post(tokens))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "OCR service is running" }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "model_loaded": state.pipeline.slot().is_loaded(),
        "engine": state.engine.to_string(),
    }))
}

async fn predict(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ReceiptAnalysis>, ApiError> {
    let request_id = Uuid::new_v4();
    let data = read_upload(multipart).await?;
    let span = info_span!("predict", %request_id, bytes = data.len());

    let analysis = state.pipeline.process_bytes(&data).instrument(span).await?;
    Ok(Json(analysis))
}

async fn tokens(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<TokensResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let data = read_upload(multipart).await?;
    let span = info_span!("tokens", %request_id, bytes = data.len());

    let predictions = state.pipeline.predict_tokens(&data).instrument(span).await?;
    let convention = state.pipeline.convention();
    let tokens = predictions
        .iter()
        .filter(|(token, _)| !convention.is_special(token))
        .map(|(token, label)| TokenPrediction { token: token.to_string(), label })
        .collect();
    Ok(Json(TokensResponse { tokens }))
}

/// Pull the `file` field out of the form, insisting on an `image/*` type.
async fn read_upload(mut multipart: Multipart) -> Result<Vec<u8>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let is_image = field.content_type().is_some_and(|ct| ct.starts_with("image/"));
        if !is_image {
            return Err(ApiError::BadRequest("File provided is not an image".into()));
        }
        let data = field.bytes().await?;
        if data.is_empty() {
            return Err(ApiError::BadRequest("Uploaded file is empty".into()));
        }
        return Ok(data.to_vec());
    }
    Err(ApiError::BadRequest(format!("Missing multipart field '{UPLOAD_FIELD}'")))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use gastocr_ocr::{
        EngineSlot, InferenceEngine, MockEngine, ModelError, PipelineConfig,
    };
    use image::{ImageFormat, Rgb, RgbImage};
    use tower::ServiceExt;

    use super::*;

    const BOUNDARY: &str = "gastocr-test-boundary";

    fn ticket_engine() -> MockEngine {
        MockEngine::from_pairs([
            ("<s>", -1),
            ("ĠMERCADONA", 0),
            ("Ġ03", 1),
            ("/", 1),
            ("11", 1),
            ("/", 1),
            ("2023", 1),
            ("ĠTOTAL", 2),
            ("Ġ12", 3),
            (",", 3),
            ("50", 3),
            ("</s>", -1),
            ("<pad>", -1),
        ])
    }

    fn app_with(slot: EngineSlot) -> Router {
        let pipeline = ReceiptPipeline::new(Arc::new(slot), PipelineConfig::default());
        router(AppState::new(pipeline, EngineKind::Fixture), 1024 * 1024)
    }

    fn app() -> Router {
        app_with(EngineSlot::preloaded(Arc::new(ticket_engine())))
    }

    fn png_bytes() -> Vec<u8> {
        let img = RgbImage::from_pixel(8, 8, Rgb([255, 255, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn upload(uri: &str, field: &str, content_type: &str, data: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"ticket.png\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
            .header("content-length", body.len())
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, body)
    }

    #[tokio::test]
    async fn root_reports_running() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "OCR service is running");
    }

    #[tokio::test]
    async fn health_reports_engine_state() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["model_loaded"], true);
        assert_eq!(body["engine"], "fixture");
    }

    #[tokio::test]
    async fn predict_returns_words_and_fields() {
        let request = upload("/api/v1/ocr/predict", "file", "image/png", &png_bytes());
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::OK);

        let words = body["cleaned_words_output"].as_array().unwrap();
        let texts: Vec<&str> = words.iter().map(|w| w["word"].as_str().unwrap()).collect();
        assert_eq!(texts, ["MERCADONA", "03/11/2023", "TOTAL", "12,50"]);
        assert_eq!(words[1]["label"], 1);
        assert_eq!(words[1]["labels"].as_array().unwrap().len(), 5);

        let extracted = &body["extracted_information"];
        assert_eq!(extracted["fecha"], "03/11/2023");
        assert_eq!(extracted["total"], "12.50");
        assert_eq!(extracted["texto_completo_limpio"], "MERCADONA 03/11/2023 TOTAL 12,50");
        assert_eq!(body["image_sha256"].as_str().unwrap().len(), 64);
    }

    #[tokio::test]
    async fn tokens_drops_special_tokens() {
        let request = upload("/api/v1/ocr/tokens", "file", "image/jpeg", &png_bytes());
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::OK);

        let tokens = body["tokens"].as_array().unwrap();
        assert_eq!(tokens.len(), 10);
        assert_eq!(tokens[0]["token"], "ĠMERCADONA");
        assert_eq!(tokens[0]["label"], 0);
        assert!(tokens.iter().all(|t| !t["token"].as_str().unwrap().starts_with('<')));
    }

    #[tokio::test]
    async fn non_image_upload_is_rejected() {
        let request = upload("/api/v1/ocr/predict", "file", "application/pdf", b"%PDF-1.4");
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
        assert_eq!(body["error"]["message"], "File provided is not an image");
    }

    #[tokio::test]
    async fn missing_file_field_is_rejected() {
        let request = upload("/api/v1/ocr/predict", "image", "image/png", &png_bytes());
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn undecodable_image_is_invalid() {
        let request = upload("/api/v1/ocr/predict", "file", "image/png", b"not really a png");
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_IMAGE");
    }

    #[tokio::test]
    async fn unavailable_model_is_503_and_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let slot = EngineSlot::new(Arc::new(
            move || -> Result<Arc<dyn InferenceEngine>, ModelError> {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ModelError::NotAvailable("weights missing".into()))
            },
        ));
        let app = app_with(slot);

        for _ in 0..2 {
            let request = upload("/api/v1/ocr/predict", "file", "image/png", &png_bytes());
            let (status, body) = send(app.clone(), request).await;
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
            assert_eq!(body["error"]["code"], "MODEL_UNAVAILABLE");
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn oversized_upload_is_refused() {
        let pipeline = ReceiptPipeline::new(
            Arc::new(EngineSlot::preloaded(Arc::new(ticket_engine()))),
            PipelineConfig::default(),
        );
        let app = router(AppState::new(pipeline, EngineKind::Fixture), 256);
        let request = upload("/api/v1/ocr/predict", "file", "image/png", &[0u8; 4096]);
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
