//! API request handlers

use super::models::{
    ApiResponse, CacheHealth, CacheStatusResponse, CachedModel, ComponentHealth, HealthComponents,
    HealthResponse, ListParams, ModelListResponse, Pagination, PredictionData, PredictionMetadata,
    PredictionRequest, RegistryHealth, StatusResponse, UpdateModelRequest, UploadParams,
    UploadResponse,
};
use super::routes::AppState;
use crate::error::{ServeError, ServeResult};
use crate::models::{ModelEntry, ModelStatus, NewModel};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
};
use std::time::Instant;
use uuid::Uuid;

/// GET /health - Component health; 503 when any component is unhealthy
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let file_system = match state.storage.check_writable().await {
        Ok(()) => ComponentHealth::healthy(format!(
            "Upload directory {} is writable",
            state.config.upload_dir.display()
        )),
        Err(e) => {
            tracing::warn!(error = %e, "Upload directory health check failed");
            ComponentHealth::unhealthy(format!("File system error: {}", e))
        }
    };

    let healthy = file_system.is_healthy();
    let response = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        timestamp: chrono::Utc::now(),
        components: HealthComponents {
            api: ComponentHealth::healthy("API is running"),
            file_system,
            model_cache: CacheHealth {
                status: "healthy".to_string(),
                cached_models: state.cache.len().await,
                capacity: state.cache.capacity(),
            },
            registry: RegistryHealth {
                status: "healthy".to_string(),
                registered_models: state.registry.count().await,
            },
        },
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

/// GET /health/ready - Ready to accept uploads and predictions
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<StatusResponse>) {
    match state.storage.check_writable().await {
        Ok(()) => (
            StatusCode::OK,
            Json(StatusResponse {
                status: "ready".to_string(),
                error: None,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(StatusResponse {
                status: "not ready".to_string(),
                error: Some(e.to_string()),
            }),
        ),
    }
}

/// GET /health/live - Process is up
pub async fn liveness() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "alive".to_string(),
        error: None,
    })
}

/// GET /metrics - Prometheus metrics
pub async fn metrics(State(state): State<AppState>) -> String {
    state.prometheus_handle.render()
}

fn validate_model_name(name: &str) -> ServeResult<()> {
    if name.trim().is_empty() {
        return Err(ServeError::Validation {
            message: "Model name cannot be empty".to_string(),
        });
    }
    if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(ServeError::Validation {
            message: format!("Model name '{}' cannot contain path separators", name),
        });
    }
    if name.len() > 255 {
        return Err(ServeError::Validation {
            message: "Model name must be at most 255 characters".to_string(),
        });
    }
    Ok(())
}

/// POST /models - Upload a new model version
///
/// The request body is the artifact; name and type come from the query string.
pub async fn upload_model(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> ServeResult<(StatusCode, Json<ApiResponse<UploadResponse>>)> {
    validate_model_name(&params.name)?;

    if !state.config.is_allowed_model_type(&params.model_type) {
        return Err(ServeError::Validation {
            message: format!(
                "Model type must be one of: {}",
                state.config.allowed_model_types.join(", ")
            ),
        });
    }

    if body.len() as u64 > state.config.max_upload_bytes() {
        return Err(ServeError::PayloadTooLarge {
            max_mb: state.config.max_upload_size_mb,
        });
    }
    if body.is_empty() {
        return Err(ServeError::Validation {
            message: "Model file is empty".to_string(),
        });
    }

    // Reject artifacts the cache could never load
    let (decoder, artifact) = state
        .cache
        .loader()
        .decode(&params.name, &body)
        .map_err(|e| ServeError::Validation {
            message: e.to_string(),
        })?;

    if artifact.family().as_str() != params.model_type {
        return Err(ServeError::Validation {
            message: format!(
                "Artifact family '{}' does not match model_type '{}'",
                artifact.family(),
                params.model_type
            ),
        });
    }

    // Reserved before writing so concurrent uploads never share a path
    let version = state.registry.reserve_version(&params.name);
    let file_path = format!("{}/v{}/model.{}", params.name, version, decoder);
    state.storage.write(&file_path, &body).await?;

    let registered = state
        .registry
        .register(
            NewModel {
                name: params.name.clone(),
                description: params.description,
                model_type: params.model_type.clone(),
                file_path: file_path.clone(),
                file_size: body.len() as u64,
            },
            Some(version),
        )
        .await;

    let entry = match registered {
        Ok(entry) => entry,
        Err(message) => {
            if let Err(e) = state.storage.delete(&file_path).await {
                tracing::warn!(path = %file_path, error = %e, "Failed to remove orphaned artifact");
            }
            return Err(ServeError::Conflict { message });
        }
    };

    crate::metrics::record_model_uploaded(&params.name, &params.model_type);

    let prediction_endpoint = format!("/predict/{}", entry.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(UploadResponse {
            model: entry,
            prediction_endpoint,
        })),
    ))
}

/// GET /models - List models with pagination
pub async fn list_models(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Json<ModelListResponse> {
    let page = state
        .registry
        .list(params.status, params.page, params.per_page)
        .await;

    Json(ModelListResponse {
        success: true,
        data: page.items,
        pagination: Pagination {
            page: page.page,
            per_page: page.per_page,
            total_pages: page.total_pages,
            total_items: page.total_items,
        },
    })
}

async fn find_model(state: &AppState, id: Uuid) -> ServeResult<ModelEntry> {
    state
        .registry
        .get(&id)
        .await
        .ok_or(ServeError::ModelNotFound { id })
}

/// GET /models/{id} - Get model details
pub async fn get_model(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ServeResult<Json<ApiResponse<ModelEntry>>> {
    let entry = find_model(&state, id).await?;
    Ok(Json(ApiResponse::ok(entry)))
}

/// PATCH /models/{id} - Update description or status
pub async fn update_model(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateModelRequest>,
) -> ServeResult<Json<ApiResponse<ModelEntry>>> {
    let entry = state
        .registry
        .update(&id, req.description, req.status)
        .await
        .ok_or(ServeError::ModelNotFound { id })?;

    if entry.status == ModelStatus::Archived {
        state.cache.evict(&id.to_string()).await;
    }

    Ok(Json(ApiResponse::ok(entry)))
}

/// DELETE /models/{id} - Archive a model and drop it from the cache
pub async fn delete_model(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ServeResult<StatusCode> {
    state
        .registry
        .archive(&id)
        .await
        .ok_or(ServeError::ModelNotFound { id })?;

    state.cache.evict(&id.to_string()).await;
    tracing::info!(model_id = %id, "Model archived");

    Ok(StatusCode::NO_CONTENT)
}

/// POST /predict/{id} - Run a prediction
pub async fn predict(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<PredictionRequest>,
) -> ServeResult<Json<ApiResponse<PredictionData>>> {
    let entry = find_model(&state, id).await?;

    if let Some(requested) = req.version
        && requested != entry.version
    {
        return Err(ServeError::VersionMismatch {
            requested,
            actual: entry.version,
        });
    }

    if !entry.status.accepts_predictions() {
        return Err(ServeError::ModelUnavailable {
            id,
            status: entry.status.to_string(),
        });
    }

    let key = id.to_string();
    let cached = state.cache.is_cached(&key).await;
    let model = state.cache.get_or_load(&key, &entry.file_path).await?;

    // Archived while loading: drop what we just cached
    let current = find_model(&state, id).await?;
    if !current.status.accepts_predictions() {
        state.cache.evict(&key).await;
        return Err(ServeError::ModelUnavailable {
            id,
            status: current.status.to_string(),
        });
    }

    let start = Instant::now();
    let result = model.predict(&req.input);
    let elapsed = start.elapsed();

    let prediction = match result {
        Ok(output) => {
            crate::metrics::record_prediction(&key, "success", elapsed.as_secs_f64() * 1000.0);
            output
        }
        Err(e) => {
            crate::metrics::record_prediction(&key, "invalid_input", elapsed.as_secs_f64() * 1000.0);
            return Err(ServeError::InvalidInput {
                message: e.to_string(),
            });
        }
    };

    tracing::debug!(
        model_id = %id,
        version = entry.version,
        cached,
        inference_us = elapsed.as_micros() as u64,
        "Prediction served"
    );

    Ok(Json(ApiResponse::ok(PredictionData {
        prediction,
        metadata: PredictionMetadata {
            model_id: id,
            model_version: entry.version,
            inference_time_ms: elapsed.as_millis() as u64,
            cached,
        },
    })))
}

/// GET /cache - Cache statistics and resident models
pub async fn cache_status(State(state): State<AppState>) -> Json<CacheStatusResponse> {
    let resident = state.cache.snapshot().await;
    let cached_ids = resident.iter().map(|(id, _)| id.clone()).collect();
    let models = resident
        .into_iter()
        .map(|(id, model)| CachedModel {
            id,
            path: model.path().to_string(),
            decoder: model.decoder(),
            family: model.family(),
            features: model.features().to_vec(),
            size_bytes: model.size_bytes(),
            loaded_at: model.loaded_at(),
        })
        .collect();

    Json(CacheStatusResponse {
        stats: state.cache.stats().await,
        cached_ids,
        models,
    })
}

/// DELETE /cache - Drop every cached model
pub async fn clear_cache(State(state): State<AppState>) -> StatusCode {
    state.cache.clear().await;
    StatusCode::NO_CONTENT
}

/// DELETE /cache/{id} - Drop one cached model; absent ids are not an error
pub async fn evict_cached_model(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> StatusCode {
    state.cache.evict(&id).await;
    StatusCode::NO_CONTENT
}
