//! In-process model cache
//!
//! Maps a model identifier to a loaded model, loading lazily through the
//! [`ModelLoader`] and keeping at most `capacity` models resident. When a
//! miss happens while full, the least-recently-used entry is evicted.
//!
//! Concurrency:
//! - hits take the shared read lock and bump an atomic recency tick
//! - inserts, evictions and clears take the write lock
//! - concurrent misses for the same identifier are coalesced through a
//!   per-identifier load slot, so at most one load per identifier is in
//!   flight; waiters re-check the map once the slot is free
//!
//! Handles are reference counted. Evicting an entry never invalidates a
//! handle a caller already holds.

use super::loader::{LoadedModel, ModelLoader};
use crate::error::{CacheError, CacheResult};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock, broadcast};

/// Shared, read-only handle to a loaded model
pub type ModelHandle = Arc<LoadedModel>;

pub const DEFAULT_CAPACITY: usize = 5;

/// Cache lifecycle events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// Model was loaded from storage and inserted
    Loaded(String),
    /// Model was evicted to make room
    Evicted(String),
    /// Model was removed explicitly
    Removed(String),
    /// All models were removed
    Cleared,
}

/// Point-in-time cache counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub capacity: usize,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub loads: u64,
    pub load_failures: u64,
    pub evictions: u64,
}

struct CacheEntry {
    handle: ModelHandle,
    last_used: AtomicU64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    load_failures: AtomicU64,
    evictions: AtomicU64,
}

/// A caller's interest in the load slot for one identifier
///
/// Dropping it, including when the owning future is cancelled, removes the
/// slot from the map once no other caller holds it.
struct LoadSlot<'a> {
    loading: &'a DashMap<String, Arc<Mutex<()>>>,
    id: &'a str,
    slot: Option<Arc<Mutex<()>>>,
}

impl<'a> LoadSlot<'a> {
    fn acquire(loading: &'a DashMap<String, Arc<Mutex<()>>>, id: &'a str) -> Self {
        let slot = loading
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        Self {
            loading,
            id,
            slot: Some(slot),
        }
    }

    fn mutex(&self) -> &Mutex<()> {
        self.slot
            .as_deref()
            .expect("load slot is only released on drop")
    }
}

impl Drop for LoadSlot<'_> {
    fn drop(&mut self) {
        let Some(slot) = self.slot.take() else {
            return;
        };

        // Clones are only taken under the shard lock, so once our reference
        // is gone a count of one means no caller is waiting on this slot.
        let slot_ptr = Arc::as_ptr(&slot);
        drop(slot);
        self.loading
            .remove_if(self.id, |_, s| Arc::as_ptr(s) == slot_ptr && Arc::strong_count(s) == 1);
    }
}

/// Bounded LRU cache of loaded models
pub struct ModelCache {
    loader: ModelLoader,
    capacity: usize,
    entries: RwLock<HashMap<String, CacheEntry>>,
    /// Monotonic clock for recency; larger is more recent
    tick: AtomicU64,
    /// Per-identifier load slots for in-flight misses
    loading: DashMap<String, Arc<Mutex<()>>>,
    counters: Counters,
    event_tx: broadcast::Sender<CacheEvent>,
}

impl ModelCache {
    /// Create a cache holding at most `capacity` models
    ///
    /// A capacity of zero is raised to one.
    pub fn new(loader: ModelLoader, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (event_tx, _) = broadcast::channel(100);

        Self {
            loader,
            capacity,
            entries: RwLock::new(HashMap::with_capacity(capacity)),
            tick: AtomicU64::new(0),
            loading: DashMap::new(),
            counters: Counters::default(),
            event_tx,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn loader(&self) -> &ModelLoader {
        &self.loader
    }

    /// Subscribe to load/evict events
    pub fn subscribe_events(&self) -> broadcast::Receiver<CacheEvent> {
        self.event_tx.subscribe()
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Return the cached model for `id`, loading it from `path` on a miss
    pub async fn get_or_load(&self, id: &str, path: &str) -> CacheResult<ModelHandle> {
        if id.is_empty() {
            return Err(CacheError::InvalidIdentifier);
        }

        if let Some(handle) = self.lookup(id).await {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            crate::metrics::record_cache_hit();
            tracing::debug!(model_id = %id, "Model served from cache");
            return Ok(handle);
        }

        let slot = LoadSlot::acquire(&self.loading, id);
        let _guard = slot.mutex().lock().await;

        // Another caller may have finished loading while we waited
        if let Some(handle) = self.lookup(id).await {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            crate::metrics::record_cache_hit();
            tracing::debug!(model_id = %id, "Model served from cache after concurrent load");
            return Ok(handle);
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_cache_miss();
        self.load_and_insert(id, path).await
    }

    async fn lookup(&self, id: &str) -> Option<ModelHandle> {
        let entries = self.entries.read().await;
        entries.get(id).map(|entry| {
            entry.last_used.store(self.next_tick(), Ordering::Relaxed);
            entry.handle.clone()
        })
    }

    async fn load_and_insert(&self, id: &str, path: &str) -> CacheResult<ModelHandle> {
        tracing::info!(model_id = %id, path = %path, "Loading model into cache");

        let model = match self.loader.load(path).await {
            Ok(model) => model,
            Err(e) => {
                self.counters.load_failures.fetch_add(1, Ordering::Relaxed);
                crate::metrics::record_model_load_failure();
                tracing::error!(model_id = %id, error = %e, "Failed to load model");
                return Err(e);
            }
        };

        let handle = Arc::new(model);
        let mut entries = self.entries.write().await;

        if !entries.contains_key(id) && entries.len() >= self.capacity {
            let victim = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used.load(Ordering::Relaxed))
                .map(|(key, _)| key.clone());

            if let Some(victim) = victim {
                entries.remove(&victim);
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                crate::metrics::record_cache_eviction();
                tracing::info!(model_id = %victim, "Evicted model from cache");
                let _ = self.event_tx.send(CacheEvent::Evicted(victim));
            }
        }

        entries.insert(
            id.to_string(),
            CacheEntry {
                handle: handle.clone(),
                last_used: AtomicU64::new(self.next_tick()),
            },
        );
        debug_assert!(entries.len() <= self.capacity, "cache over capacity");

        let resident = entries.len();
        drop(entries);

        self.counters.loads.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_model_loaded();
        crate::metrics::update_cache_entries(resident);
        tracing::info!(
            model_id = %id,
            decoder = handle.decoder(),
            family = %handle.family(),
            resident,
            "Model loaded and cached"
        );
        let _ = self.event_tx.send(CacheEvent::Loaded(id.to_string()));

        Ok(handle)
    }

    /// Whether `id` is resident
    pub async fn is_cached(&self, id: &str) -> bool {
        self.entries.read().await.contains_key(id)
    }

    /// Remove `id` if present
    ///
    /// Returns whether an entry was removed; absent ids are not an error.
    pub async fn evict(&self, id: &str) -> bool {
        let mut entries = self.entries.write().await;
        let removed = entries.remove(id).is_some();
        let resident = entries.len();
        drop(entries);

        if removed {
            crate::metrics::update_cache_entries(resident);
            tracing::info!(model_id = %id, "Model removed from cache");
            let _ = self.event_tx.send(CacheEvent::Removed(id.to_string()));
        }
        removed
    }

    /// Remove every entry
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        drop(entries);

        crate::metrics::update_cache_entries(0);
        tracing::info!(removed = count, "Model cache cleared");
        let _ = self.event_tx.send(CacheEvent::Cleared);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Resident models, most recently used first
    pub async fn snapshot(&self) -> Vec<(String, ModelHandle)> {
        let entries = self.entries.read().await;
        let mut resident: Vec<_> = entries
            .iter()
            .map(|(key, entry)| {
                (
                    entry.last_used.load(Ordering::Relaxed),
                    key.clone(),
                    entry.handle.clone(),
                )
            })
            .collect();
        drop(entries);

        resident.sort_by(|a, b| b.0.cmp(&a.0));
        resident
            .into_iter()
            .map(|(_, key, handle)| (key, handle))
            .collect()
    }

    /// Resident identifiers, most recently used first
    pub async fn cached_ids(&self) -> Vec<String> {
        self.snapshot()
            .await
            .into_iter()
            .map(|(key, _)| key)
            .collect()
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            capacity: self.capacity,
            entries: self.len().await,
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            loads: self.counters.loads.load(Ordering::Relaxed),
            load_failures: self.counters.load_failures.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
        }
    }
}
