//! Model loader
//!
//! Reads an artifact through a [`StorageBackend`] and decodes it, trying JSON
//! first and TOML second. The whole load runs under a timeout.

use super::artifact::{ModelArtifact, ModelFamily};
use super::predictor::{FeatureMap, PredictError, PredictionOutput, Predictor};
use super::storage::StorageBackend;
use crate::error::{CacheError, CacheResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Turns raw artifact bytes into a [`ModelArtifact`]
pub trait ModelDecoder: Send + Sync {
    fn name(&self) -> &'static str;

    fn decode(&self, bytes: &[u8]) -> Result<ModelArtifact, String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDecoder;

impl ModelDecoder for JsonDecoder {
    fn name(&self) -> &'static str {
        "json"
    }

    fn decode(&self, bytes: &[u8]) -> Result<ModelArtifact, String> {
        let artifact: ModelArtifact = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
        artifact.validate()?;
        Ok(artifact)
    }
}

/// Accepts TOML documents, including ones with comments and bare keys
#[derive(Debug, Default, Clone, Copy)]
pub struct TomlDecoder;

impl ModelDecoder for TomlDecoder {
    fn name(&self) -> &'static str {
        "toml"
    }

    fn decode(&self, bytes: &[u8]) -> Result<ModelArtifact, String> {
        let text = std::str::from_utf8(bytes).map_err(|e| e.to_string())?;
        let artifact: ModelArtifact = toml::from_str(text).map_err(|e| e.message().to_string())?;
        artifact.validate()?;
        Ok(artifact)
    }
}

/// Configuration for the model loader
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Timeout covering storage read and decode, in seconds
    pub load_timeout_secs: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            load_timeout_secs: 30,
        }
    }
}

/// A model decoded and ready for inference
#[derive(Debug)]
pub struct LoadedModel {
    path: String,
    decoder: &'static str,
    size_bytes: u64,
    loaded_at: DateTime<Utc>,
    predictor: Box<dyn Predictor>,
}

impl LoadedModel {
    pub fn new(path: String, decoder: &'static str, size_bytes: u64, artifact: ModelArtifact) -> Self {
        Self {
            path,
            decoder,
            size_bytes,
            loaded_at: Utc::now(),
            predictor: artifact.into_predictor(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Name of the decoder that produced this model
    pub fn decoder(&self) -> &'static str {
        self.decoder
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn family(&self) -> ModelFamily {
        self.predictor.family()
    }

    pub fn features(&self) -> &[String] {
        self.predictor.features()
    }

    pub fn predict(&self, input: &FeatureMap) -> Result<PredictionOutput, PredictError> {
        self.predictor.predict(input)
    }
}

/// Loads models from storage
pub struct ModelLoader {
    storage: Arc<dyn StorageBackend>,
    config: LoaderConfig,
    primary: Box<dyn ModelDecoder>,
    fallback: Box<dyn ModelDecoder>,
}

impl ModelLoader {
    /// Create a loader with default configuration
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self::with_config(storage, LoaderConfig::default())
    }

    pub fn with_config(storage: Arc<dyn StorageBackend>, config: LoaderConfig) -> Self {
        Self {
            storage,
            config,
            primary: Box::new(JsonDecoder),
            fallback: Box::new(TomlDecoder),
        }
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.config.load_timeout_secs)
    }

    /// Read and decode the artifact at `path`
    pub async fn load(&self, path: &str) -> CacheResult<LoadedModel> {
        match timeout(self.load_timeout(), self.read_and_decode(path)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    path = %path,
                    timeout_secs = self.config.load_timeout_secs,
                    "Model load timed out"
                );
                Err(CacheError::LoadTimeout {
                    path: path.to_string(),
                    timeout_secs: self.config.load_timeout_secs,
                })
            }
        }
    }

    async fn read_and_decode(&self, path: &str) -> CacheResult<LoadedModel> {
        let bytes = self.storage.read(path).await?;
        let size_bytes = bytes.len() as u64;

        let (decoder, artifact) = self.decode(path, &bytes)?;
        tracing::info!(
            path = %path,
            decoder = decoder,
            family = %artifact.family(),
            size_bytes,
            "Model artifact decoded"
        );

        Ok(LoadedModel::new(path.to_string(), decoder, size_bytes, artifact))
    }

    /// Decode bytes with the primary decoder, then the fallback
    ///
    /// Returns the name of the decoder that succeeded.
    pub fn decode(&self, path: &str, bytes: &[u8]) -> CacheResult<(&'static str, ModelArtifact)> {
        let primary_error = match self.primary.decode(bytes) {
            Ok(artifact) => return Ok((self.primary.name(), artifact)),
            Err(e) => e,
        };

        tracing::warn!(
            path = %path,
            error = %primary_error,
            "{} decode failed, trying {}",
            self.primary.name(),
            self.fallback.name()
        );

        match self.fallback.decode(bytes) {
            Ok(artifact) => Ok((self.fallback.name(), artifact)),
            Err(fallback_error) => Err(CacheError::ModelLoad {
                path: path.to_string(),
                primary: primary_error,
                fallback: fallback_error,
            }),
        }
    }
}
