//! Error type and HTTP error responses for the recognition API.
//!
//! The error model is flat: every request-time fault becomes a 500 with a
//! `{"error": "<message>"}` body, never a partial result.

use crate::engine::EngineError;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// The multipart upload was missing or malformed.
    #[error("{0}")]
    Upload(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// JSON body returned on error.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        tracing::warn!(error = %message, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::Upload(e.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(e: MultipartRejection) -> Self {
        ApiError::Upload(e.body_text())
    }
}
