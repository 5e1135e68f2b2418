//! Prometheus metrics

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Setup Prometheus metrics exporter
/// Returns a handle that can be used to retrieve metrics
pub fn setup_metrics() -> Result<metrics_exporter_prometheus::PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    tracing::info!("Prometheus metrics exporter installed");

    Ok(handle)
}

pub fn record_cache_hit() {
    metrics::counter!("model_server_cache_hits_total").increment(1);
}

pub fn record_cache_miss() {
    metrics::counter!("model_server_cache_misses_total").increment(1);
}

pub fn record_model_loaded() {
    metrics::counter!("model_server_model_loads_total").increment(1);
}

pub fn record_model_load_failure() {
    metrics::counter!("model_server_model_load_failures_total").increment(1);
}

pub fn record_cache_eviction() {
    metrics::counter!("model_server_cache_evictions_total").increment(1);
}

/// Update resident cache entries gauge
pub fn update_cache_entries(count: usize) {
    metrics::gauge!("model_server_cache_entries").set(count as f64);
}

/// Record a prediction and its outcome
pub fn record_prediction(model_id: &str, outcome: &'static str, inference_ms: f64) {
    metrics::counter!("model_server_predictions_total",
        "model" => model_id.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("model_server_inference_ms",
        "model" => model_id.to_string()
    )
    .record(inference_ms);
}

/// Record model upload
pub fn record_model_uploaded(name: &str, model_type: &str) {
    metrics::counter!("model_server_uploads_total",
        "name" => name.to_string(),
        "model_type" => model_type.to_string()
    )
    .increment(1);
}
