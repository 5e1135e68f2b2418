//! Model registry for tracking uploaded models and their versions

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Lifecycle status of a registered model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    /// Serving predictions
    #[default]
    Active,
    /// Still serving, but superseded
    Deprecated,
    /// Soft deleted; no predictions
    Archived,
}

impl ModelStatus {
    pub fn accepts_predictions(&self) -> bool {
        matches!(self, Self::Active | Self::Deprecated)
    }
}

impl std::fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Deprecated => write!(f, "deprecated"),
            Self::Archived => write!(f, "archived"),
        }
    }
}

/// Entry for a model version in the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Unique per model version; also the cache key
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub model_type: String,
    pub version: u32,
    /// Artifact location understood by the storage backend
    pub file_path: String,
    pub file_size: u64,
    pub status: ModelStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fields needed to register a new model version
#[derive(Debug, Clone)]
pub struct NewModel {
    pub name: String,
    pub description: Option<String>,
    pub model_type: String,
    pub file_path: String,
    pub file_size: u64,
}

/// One page of registry entries
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub items: Vec<ModelEntry>,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

/// Registry for tracking models
pub struct ModelRegistry {
    models: Arc<RwLock<HashMap<Uuid, ModelEntry>>>,
    /// Highest version handed out per name, registered or not
    versions: DashMap<String, u32>,
}

impl ModelRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            models: Arc::new(RwLock::new(HashMap::new())),
            versions: DashMap::new(),
        }
    }

    /// Claim the next version of `name`
    ///
    /// Each call returns a distinct version, so concurrent uploads of the same
    /// name never share a storage location. A reserved version that is never
    /// registered leaves a gap.
    pub fn reserve_version(&self, name: &str) -> u32 {
        let mut latest = self.versions.entry(name.to_string()).or_insert(0);
        *latest += 1;
        *latest
    }

    /// Add a model version
    ///
    /// With `None` the next version is reserved here. With `Some(v)`, `v` must
    /// come from [`reserve_version`](Self::reserve_version) and not be
    /// registered yet.
    pub async fn register(&self, model: NewModel, version: Option<u32>) -> Result<ModelEntry, String> {
        let mut models = self.models.write().await;

        let version = match version {
            Some(requested) => {
                let reserved = self.versions.get(&model.name).map_or(0, |v| *v);
                if requested == 0 || requested > reserved {
                    return Err(format!(
                        "Version {} of '{}' was never reserved",
                        requested, model.name
                    ));
                }
                if models
                    .values()
                    .any(|e| e.name == model.name && e.version == requested)
                {
                    return Err(format!(
                        "Version {} of '{}' is already registered",
                        requested, model.name
                    ));
                }
                requested
            }
            None => self.reserve_version(&model.name),
        };

        let entry = ModelEntry {
            id: Uuid::new_v4(),
            name: model.name,
            description: model.description,
            model_type: model.model_type,
            version,
            file_path: model.file_path,
            file_size: model.file_size,
            status: ModelStatus::Active,
            created_at: Utc::now(),
            updated_at: None,
        };

        tracing::info!(
            model_id = %entry.id,
            name = %entry.name,
            version = entry.version,
            "Model registered"
        );

        models.insert(entry.id, entry.clone());
        Ok(entry)
    }

    /// Get a model entry by ID
    pub async fn get(&self, id: &Uuid) -> Option<ModelEntry> {
        let models = self.models.read().await;
        models.get(id).cloned()
    }

    /// List models, newest first, optionally filtered by status
    ///
    /// `page` is 1-based; `per_page` is clamped to 1..=100.
    pub async fn list(&self, status: Option<ModelStatus>, page: usize, per_page: usize) -> Page {
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);

        let models = self.models.read().await;
        let mut entries: Vec<_> = models
            .values()
            .filter(|e| status.is_none_or(|s| e.status == s))
            .cloned()
            .collect();
        drop(models);

        entries.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| b.version.cmp(&a.version))
        });

        let total_items = entries.len();
        let total_pages = total_items.div_ceil(per_page);
        let items = entries
            .into_iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .collect();

        Page {
            items,
            page,
            per_page,
            total_pages,
            total_items,
        }
    }

    /// Update description and/or status
    pub async fn update(
        &self,
        id: &Uuid,
        description: Option<String>,
        status: Option<ModelStatus>,
    ) -> Option<ModelEntry> {
        let mut models = self.models.write().await;
        let entry = models.get_mut(id)?;

        if let Some(description) = description {
            entry.description = Some(description);
        }
        if let Some(status) = status {
            entry.status = status;
        }
        entry.updated_at = Some(Utc::now());

        Some(entry.clone())
    }

    /// Soft delete: mark the model archived
    pub async fn archive(&self, id: &Uuid) -> Option<ModelEntry> {
        self.update(id, None, Some(ModelStatus::Archived)).await
    }

    /// Get count of models in registry
    pub async fn count(&self) -> usize {
        let models = self.models.read().await;
        models.len()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_model(name: &str) -> NewModel {
        NewModel {
            name: name.to_string(),
            description: None,
            model_type: "linear_regression".to_string(),
            file_path: format!("{}/model.json", name),
            file_size: 42,
        }
    }

    #[tokio::test]
    async fn test_new_registry() {
        let registry = ModelRegistry::new();
        assert_eq!(registry.count().await, 0);
        assert!(registry.list(None, 1, 20).await.items.is_empty());
    }

    #[tokio::test]
    async fn test_register_assigns_versions_per_name() {
        let registry = ModelRegistry::new();
        let v1 = registry.register(new_model("iris"), None).await.unwrap();
        let v2 = registry.register(new_model("iris"), None).await.unwrap();
        let other = registry.register(new_model("housing"), None).await.unwrap();

        assert_eq!(v1.version, 1);
        assert_eq!(v2.version, 2);
        assert_eq!(other.version, 1);
        assert_ne!(v1.id, v2.id);
        assert_eq!(v1.status, ModelStatus::Active);
        assert_eq!(registry.count().await, 3);
    }

    #[tokio::test]
    async fn test_register_requires_reserved_version() {
        let registry = ModelRegistry::new();
        assert!(registry.register(new_model("iris"), Some(1)).await.is_err());

        let v = registry.reserve_version("iris");
        registry.register(new_model("iris"), Some(v)).await.unwrap();
        assert!(registry.register(new_model("iris"), Some(v)).await.is_err());
    }

    #[tokio::test]
    async fn test_reserved_versions_are_distinct() {
        let registry = Arc::new(ModelRegistry::new());
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.reserve_version("iris") })
            })
            .collect();

        let mut versions = Vec::new();
        for task in tasks {
            versions.push(task.await.unwrap());
        }
        versions.sort_unstable();
        assert_eq!(versions, (1..=16).collect::<Vec<_>>());

        // Registration after reservations continues past them
        let next = registry.register(new_model("iris"), None).await.unwrap();
        assert_eq!(next.version, 17);
    }

    #[tokio::test]
    async fn test_out_of_order_registration() {
        let registry = ModelRegistry::new();
        let first = registry.reserve_version("iris");
        let second = registry.reserve_version("iris");

        let b = registry.register(new_model("iris"), Some(second)).await.unwrap();
        let a = registry.register(new_model("iris"), Some(first)).await.unwrap();
        assert_eq!((a.version, b.version), (1, 2));
    }

    #[tokio::test]
    async fn test_list_pagination_and_filter() {
        let registry = ModelRegistry::new();
        for i in 0..5 {
            registry
                .register(new_model(&format!("m{}", i)), None)
                .await
                .unwrap();
        }
        let first = registry.list(None, 1, 2).await;
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.total_items, 5);
        assert_eq!(first.total_pages, 3);

        let last = registry.list(None, 3, 2).await;
        assert_eq!(last.items.len(), 1);

        let beyond = registry.list(None, 10, 2).await;
        assert!(beyond.items.is_empty());

        let archived = registry.list(Some(ModelStatus::Archived), 1, 20).await;
        assert_eq!(archived.total_items, 0);
    }

    #[tokio::test]
    async fn test_update_and_archive() {
        let registry = ModelRegistry::new();
        let entry = registry.register(new_model("iris"), None).await.unwrap();

        let updated = registry
            .update(&entry.id, Some("petal classifier".to_string()), Some(ModelStatus::Deprecated))
            .await
            .unwrap();
        assert_eq!(updated.description.as_deref(), Some("petal classifier"));
        assert_eq!(updated.status, ModelStatus::Deprecated);
        assert!(updated.updated_at.is_some());
        assert!(updated.status.accepts_predictions());

        let archived = registry.archive(&entry.id).await.unwrap();
        assert!(!archived.status.accepts_predictions());
    }

    #[tokio::test]
    async fn test_update_nonexistent_model() {
        let registry = ModelRegistry::new();
        assert!(registry.archive(&Uuid::new_v4()).await.is_none());
    }

    #[test]
    fn test_model_status_display() {
        assert_eq!(ModelStatus::Active.to_string(), "active");
        assert_eq!(ModelStatus::Deprecated.to_string(), "deprecated");
        assert_eq!(ModelStatus::Archived.to_string(), "archived");
    }

    #[test]
    fn test_model_entry_serialize() {
        let entry = ModelEntry {
            id: Uuid::new_v4(),
            name: "iris".to_string(),
            description: None,
            model_type: "constant".to_string(),
            version: 1,
            file_path: "iris/v1/model.json".to_string(),
            file_size: 10,
            status: ModelStatus::Active,
            created_at: Utc::now(),
            updated_at: None,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"status\":\"active\""));
        assert!(!json.contains("description"));
        assert!(!json.contains("updated_at"));
    }
}
