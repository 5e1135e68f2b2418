//! Configuration structures and loading logic

use crate::models::ModelFamily;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub api_port: u16,
    /// Root directory for uploaded artifacts
    pub upload_dir: PathBuf,
    /// Number of models kept in memory
    pub model_cache_size: usize,
    pub load_timeout_secs: u64,
    pub max_upload_size_mb: u64,
    pub allowed_model_types: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            upload_dir: default_upload_dir(),
            model_cache_size: default_model_cache_size(),
            load_timeout_secs: default_load_timeout(),
            max_upload_size_mb: default_max_upload_size_mb(),
            allowed_model_types: default_allowed_model_types(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content).context("Failed to parse TOML config")?
        } else {
            Self::default()
        };

        // Environment variable overrides
        if let Ok(port) = std::env::var("MODEL_SERVER_API_PORT") {
            config.api_port = port.parse().context("Invalid MODEL_SERVER_API_PORT value")?;
        }
        if let Ok(upload_dir) = std::env::var("MODEL_SERVER_UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(upload_dir);
        }
        if let Ok(size) = std::env::var("MODEL_SERVER_CACHE_SIZE") {
            config.model_cache_size = size
                .parse()
                .context("Invalid MODEL_SERVER_CACHE_SIZE value")?;
        }
        if let Ok(timeout) = std::env::var("MODEL_SERVER_LOAD_TIMEOUT") {
            config.load_timeout_secs = timeout
                .parse()
                .context("Invalid MODEL_SERVER_LOAD_TIMEOUT value")?;
        }
        if let Ok(max_mb) = std::env::var("MODEL_SERVER_MAX_UPLOAD_MB") {
            config.max_upload_size_mb = max_mb
                .parse()
                .context("Invalid MODEL_SERVER_MAX_UPLOAD_MB value")?;
        }

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_port < 1024 {
            anyhow::bail!("API port must be >= 1024 (got {})", self.api_port);
        }
        if self.model_cache_size == 0 {
            anyhow::bail!("model_cache_size must be at least 1");
        }
        if self.load_timeout_secs == 0 {
            anyhow::bail!("load_timeout_secs must be at least 1");
        }
        if self.max_upload_size_mb == 0 {
            anyhow::bail!("max_upload_size_mb must be at least 1");
        }
        if self.allowed_model_types.is_empty() {
            anyhow::bail!("allowed_model_types cannot be empty");
        }
        for model_type in &self.allowed_model_types {
            model_type
                .parse::<ModelFamily>()
                .map_err(|e| anyhow::anyhow!("Invalid allowed_model_types entry: {}", e))?;
        }

        if !self.upload_dir.exists() {
            std::fs::create_dir_all(&self.upload_dir).with_context(|| {
                format!("Cannot create upload directory: {:?}", self.upload_dir)
            })?;
        }

        Ok(())
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_size_mb * 1024 * 1024
    }

    pub fn is_allowed_model_type(&self, model_type: &str) -> bool {
        self.allowed_model_types.iter().any(|t| t == model_type)
    }
}

// Default functions
fn default_api_port() -> u16 {
    8000
}
fn default_upload_dir() -> PathBuf {
    PathBuf::from("models")
}
fn default_model_cache_size() -> usize {
    crate::models::cache::DEFAULT_CAPACITY
}
fn default_load_timeout() -> u64 {
    30
}
fn default_max_upload_size_mb() -> u64 {
    100
}
fn default_allowed_model_types() -> Vec<String> {
    ModelFamily::ALL
        .iter()
        .map(|family| family.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.api_port, 8000);
        assert_eq!(config.model_cache_size, 5);
        assert_eq!(config.max_upload_bytes(), 100 * 1024 * 1024);
        assert!(config.is_allowed_model_type("logistic_regression"));
        assert!(!config.is_allowed_model_type("sklearn"));
    }

    #[test]
    fn test_port_validation() {
        let config = ServerConfig {
            api_port: 500,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_cache_size_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            model_cache_size: 0,
            upload_dir: temp_dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_model_type_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            allowed_model_types: vec!["sklearn".to_string()],
            upload_dir: temp_dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_creates_upload_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let upload_dir = temp_dir.path().join("nested/uploads");
        let config = ServerConfig {
            upload_dir: upload_dir.clone(),
            ..Default::default()
        };
        config.validate().unwrap();
        assert!(upload_dir.is_dir());
    }

    #[test]
    #[serial]
    fn test_load_from_file_with_env_override() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "api_port = 9100\nmodel_cache_size = 2\n").unwrap();

        unsafe {
            std::env::set_var("MODEL_SERVER_CACHE_SIZE", "7");
        }
        let config = ServerConfig::load(Some(path));
        unsafe {
            std::env::remove_var("MODEL_SERVER_CACHE_SIZE");
        }

        let config = config.unwrap();
        assert_eq!(config.api_port, 9100);
        assert_eq!(config.model_cache_size, 7);
        assert_eq!(config.load_timeout_secs, 30);
    }

    #[test]
    #[serial]
    fn test_invalid_env_value() {
        unsafe {
            std::env::set_var("MODEL_SERVER_LOAD_TIMEOUT", "soon");
        }
        let result = ServerConfig::load(None);
        unsafe {
            std::env::remove_var("MODEL_SERVER_LOAD_TIMEOUT");
        }
        assert!(result.is_err());
    }
}
