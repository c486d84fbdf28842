//! HTTP API

use crate::encoding::jpeg_base64;
use crate::pipeline::Pipeline;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};
use vitrine_core::{BoundingBox, Match, MatchResult, PipelineError, ProcessRequest};

/// Shared state of all handlers.
#[derive(Clone)]
pub struct ApiState {
    pub pipeline: Arc<Pipeline>,
    pub jpeg_quality: u8,
}

impl ApiState {
    pub fn new(pipeline: Arc<Pipeline>, jpeg_quality: u8) -> Self {
        Self {
            pipeline,
            jpeg_quality,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: String,
    pub code: u16,
    pub kind: String,
    pub detail: String,
}

impl ErrorResponse {
    fn from_error(err: &PipelineError) -> Self {
        Self {
            status: "error".to_string(),
            code: err.status_code(),
            kind: err.kind().as_str().to_string(),
            detail: err.public_detail(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub status: String,
    pub results: Vec<ResultBody>,
}

#[derive(Debug, Serialize)]
pub struct ResultBody {
    pub object: String,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    /// Base64 JPEG of the crop
    pub cropped_image: Option<String>,
    pub matches: Vec<Match>,
}

impl ResultBody {
    fn from_result(result: MatchResult, jpeg_quality: u8) -> Self {
        let cropped_image = result.cropped_image.and_then(|crop| {
            jpeg_base64(&crop, jpeg_quality)
                .map_err(|e| warn!("Failed to encode crop of {}: {}", result.object_category, e))
                .ok()
        });

        Self {
            object: result.object_category,
            confidence: result.confidence,
            bounding_box: result.bounding_box,
            cropped_image,
            matches: result.matches,
        }
    }
}

/// Pipeline failures rendered as `{status, code, kind, detail}`
pub struct ApiError(pub PipelineError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse::from_error(&self.0))).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

/// CORS: permissive when no origins are configured, an allow-list otherwise.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Create HTTP router with all API routes
pub fn create_router(state: ApiState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .route("/api/process-instagram", post(process_handler))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn process_handler(
    State(state): State<ApiState>,
    payload: Result<Json<ProcessRequest>, JsonRejection>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        PipelineError::InvalidInput(format!("Invalid request body: {}", rejection.body_text()))
    })?;

    let results = state.pipeline.process(&request).await.map_err(|err| {
        if let PipelineError::Internal(cause) = &err {
            error!("Internal error for {}: {}", request.url, cause);
        }
        ApiError(err)
    })?;

    let results = results
        .into_iter()
        .map(|result| ResultBody::from_result(result, state.jpeg_quality))
        .collect();

    Ok(Json(ProcessResponse {
        status: "success".to_string(),
        results,
    }))
}
