//! API request and response models

use crate::models::{
    CacheStats, FeatureMap, ModelEntry, ModelFamily, ModelStatus, PredictionOutput,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Health of a single component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,
    pub message: String,
}

impl ComponentHealth {
    pub fn healthy(message: impl Into<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            message: message.into(),
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: "unhealthy".to_string(),
            message: message.into(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthComponents {
    pub api: ComponentHealth,
    pub file_system: ComponentHealth,
    pub model_cache: CacheHealth,
    pub registry: RegistryHealth,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheHealth {
    pub status: String,
    pub cached_models: usize,
    pub capacity: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegistryHealth {
    pub status: String,
    pub registered_models: usize,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub components: HealthComponents,
}

/// Readiness and liveness response
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Envelope used by model and prediction endpoints
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Query parameters for `POST /models`; the body is the artifact itself
#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub name: String,
    pub model_type: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub model: ModelEntry,
    pub prediction_endpoint: String,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub status: Option<ModelStatus>,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_per_page")]
    pub per_page: usize,
}

fn default_page() -> usize {
    1
}

fn default_per_page() -> usize {
    20
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

#[derive(Debug, Serialize)]
pub struct ModelListResponse {
    pub success: bool,
    pub data: Vec<ModelEntry>,
    pub pagination: Pagination,
}

/// Request to update a model's metadata
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateModelRequest {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<ModelStatus>,
}

/// Single prediction request
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub input: FeatureMap,
    /// Expected model version; defaults to whatever the id points at
    #[serde(default)]
    pub version: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct PredictionMetadata {
    pub model_id: Uuid,
    pub model_version: u32,
    pub inference_time_ms: u64,
    /// Whether the model was already resident before this request
    pub cached: bool,
}

#[derive(Debug, Serialize)]
pub struct PredictionData {
    pub prediction: PredictionOutput,
    pub metadata: PredictionMetadata,
}

/// A model resident in the cache
#[derive(Debug, Serialize)]
pub struct CachedModel {
    pub id: String,
    pub path: String,
    pub decoder: &'static str,
    pub family: ModelFamily,
    pub features: Vec<String>,
    pub size_bytes: u64,
    pub loaded_at: chrono::DateTime<chrono::Utc>,
}

/// Cache status response
#[derive(Debug, Serialize)]
pub struct CacheStatusResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Most recently used first
    pub cached_ids: Vec<String>,
    /// Same order as `cached_ids`
    pub models: Vec<CachedModel>,
}
