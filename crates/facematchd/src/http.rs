//! HTTP endpoints using axum.
//!
//! Endpoints:
//! - GET  /          - welcome message
//! - GET  /status    - gallery and engine summary
//! - POST /recognize - multipart image upload, returns detected faces and names

use std::sync::Arc;

use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use facematch_core::{Gallery, RecognizedFace};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::engine::EngineHandle;
use crate::error::ApiError;

/// Multipart field carrying the image.
const UPLOAD_FIELD: &str = "file";

const WELCOME_MESSAGE: &str = "Bienvenue sur l'API de reconnaissance faciale !";

/// Shared application state. The gallery is read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
    pub gallery: Arc<Gallery>,
    pub strategy: &'static str,
}

/// Build the router with all endpoints, permissive CORS and request tracing.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/status", get(status))
        .route("/recognize", post(recognize))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Response types ──────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct WelcomeResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecognizeResponse {
    pub faces: Vec<RecognizedFace>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GallerySummary {
    pub records: usize,
    pub identities: usize,
    pub dimension: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub gallery: GallerySummary,
    pub strategy: String,
    pub workers: usize,
}

// ── Handlers ────────────────────────────────────────────────────────

async fn root() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: WELCOME_MESSAGE.to_string(),
    })
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        gallery: GallerySummary {
            records: state.gallery.len(),
            identities: state.gallery.identity_count(),
            dimension: state.gallery.dimension(),
        },
        strategy: state.strategy.to_string(),
        workers: state.engine.workers(),
    })
}

async fn recognize(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<RecognizeResponse>, ApiError> {
    let image = read_upload(multipart?).await?;
    tracing::debug!(bytes = image.len(), "recognize requested");

    let faces = state.engine.recognize(image).await?;
    tracing::info!(faces = faces.len(), "recognize done");
    Ok(Json(RecognizeResponse { faces }))
}

/// Take the bytes of the `file` part, or of the first part with a filename.
async fn read_upload(mut multipart: Multipart) -> Result<Vec<u8>, ApiError> {
    let mut fallback = None;
    while let Some(field) = multipart.next_field().await? {
        let named = field.name() == Some(UPLOAD_FIELD);
        let has_filename = field.file_name().is_some();
        if named {
            return Ok(field.bytes().await?.to_vec());
        }
        if has_filename && fallback.is_none() {
            fallback = Some(field.bytes().await?.to_vec());
        }
    }
    fallback.ok_or_else(|| ApiError::Upload(format!("missing '{UPLOAD_FIELD}' part in upload")))
}
