//! Model management module
//!
//! Provides functionality for:
//! - Reading model artifacts from storage
//! - Decoding artifacts (JSON, with TOML as fallback)
//! - Selecting an inference implementation per model family
//! - Caching loaded models with LRU eviction
//! - Tracking uploaded model versions and their status

pub mod artifact;
pub mod cache;
pub mod loader;
pub mod predictor;
pub mod registry;
pub mod storage;

pub use artifact::{ModelArtifact, ModelFamily};
pub use cache::{CacheEvent, CacheStats, ModelCache, ModelHandle};
pub use loader::{LoadedModel, LoaderConfig, ModelLoader};
pub use predictor::{FeatureMap, PredictError, PredictionOutput, Predictor};
pub use registry::{ModelEntry, ModelRegistry, ModelStatus, NewModel};
pub use storage::{FsStorage, StorageBackend};
