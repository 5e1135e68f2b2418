//! Error types for the model cache and API responses

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while resolving a model through the cache
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Model file not found: {path}")]
    StorageNotFound { path: String },

    #[error("Storage error for {path}: {source}")]
    Storage {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load model with both JSON and TOML. JSON: {primary}, TOML: {fallback}")]
    ModelLoad {
        path: String,
        primary: String,
        fallback: String,
    },

    #[error("Timed out after {timeout_secs}s loading {path}")]
    LoadTimeout { path: String, timeout_secs: u64 },

    #[error("Model identifier must not be empty")]
    InvalidIdentifier,
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Errors surfaced by HTTP handlers
#[derive(Error, Debug)]
pub enum ServeError {
    #[error("Model not found: {id}")]
    ModelNotFound { id: Uuid },

    #[error("Model {id} is not available for predictions (status: {status})")]
    ModelUnavailable { id: Uuid, status: String },

    #[error("Model version {requested} not available (current: {actual})")]
    VersionMismatch { requested: u32, actual: u32 },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("File size exceeds maximum allowed size of {max_mb}MB")]
    PayloadTooLarge { max_mb: u64 },

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

pub type ServeResult<T> = Result<T, ServeError>;

impl ServeError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ModelNotFound { .. } | Self::VersionMismatch { .. } => StatusCode::NOT_FOUND,
            Self::ModelUnavailable { .. } | Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::InvalidInput { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Cache(CacheError::StorageNotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Cache(CacheError::LoadTimeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            Self::Cache(CacheError::InvalidIdentifier) => StatusCode::BAD_REQUEST,
            Self::Cache(_) | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to API clients
    fn public_message(&self) -> String {
        match self {
            Self::Cache(CacheError::StorageNotFound { .. }) => "Model file missing".to_string(),
            Self::Cache(CacheError::ModelLoad { .. }) => "Model failed to load".to_string(),
            Self::Cache(CacheError::Storage { .. }) | Self::Internal { .. } => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(ErrorResponse {
            error: self.public_message(),
            timestamp: chrono::Utc::now(),
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for ServeError {
    fn from(err: anyhow::Error) -> Self {
        ServeError::Internal {
            message: format!("{err:#}"),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    timestamp: chrono::DateTime<chrono::Utc>,
}
