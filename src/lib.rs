//! Model Server - upload, version and serve predictions from small ML models
//!
//! Loaded models are kept in a bounded in-process LRU cache so repeated
//! predictions avoid re-reading and re-decoding artifacts.

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;

pub use config::ServerConfig;
pub use error::{CacheError, CacheResult, ServeError, ServeResult};
pub use models::{
    FsStorage, LoadedModel, LoaderConfig, ModelCache, ModelEntry, ModelHandle, ModelLoader,
    ModelRegistry, ModelStatus, StorageBackend,
};
