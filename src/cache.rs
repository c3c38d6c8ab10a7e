//! In-memory listing cache with tag-based invalidation.
//!
//! The checkout pipeline signals invalidation through named tags; cached
//! listings register under a tag and are evicted wholesale when that tag is
//! invalidated.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
}

/// Invalidation tags emitted after a successful checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheTag {
    Items,
    MiniAppItems,
    Orders,
}

impl CacheTag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Items => "items",
            Self::MiniAppItems => "mini-app-items",
            Self::Orders => "orders",
        }
    }

    /// Every tag touched by a committed checkout.
    pub const CHECKOUT: [CacheTag; 3] = [Self::Items, Self::MiniAppItems, Self::Orders];
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Instant::now() > expires_at,
            None => false,
        }
    }
}

/// In-memory tag-indexed cache.
#[derive(Debug, Clone)]
pub struct ListingCache {
    store: Arc<RwLock<HashMap<String, CacheEntry>>>,
    tags: Arc<RwLock<HashMap<CacheTag, HashSet<String>>>>,
    default_ttl: Option<Duration>,
}

impl ListingCache {
    pub fn new(default_ttl: Option<Duration>) -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
            tags: Arc::new(RwLock::new(HashMap::new())),
            default_ttl,
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        {
            let store = self.store.read().ok()?;
            match store.get(key) {
                Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // Expired entry: drop it lazily.
        if let Ok(mut store) = self.store.write() {
            store.remove(key);
        }
        None
    }

    pub async fn set(&self, key: &str, value: &str, tag: CacheTag) -> Result<(), CacheError> {
        let mut store = self
            .store
            .write()
            .map_err(|e| CacheError::OperationFailed(e.to_string()))?;
        store.insert(
            key.to_string(),
            CacheEntry::new(value.to_string(), self.default_ttl),
        );
        drop(store);

        let mut tags = self
            .tags
            .write()
            .map_err(|e| CacheError::OperationFailed(e.to_string()))?;
        tags.entry(tag).or_default().insert(key.to_string());
        Ok(())
    }

    /// Evicts every key registered under the given tags.
    pub async fn invalidate(&self, tags_to_clear: &[CacheTag]) {
        let keys: Vec<String> = {
            let Ok(mut tags) = self.tags.write() else {
                return;
            };
            tags_to_clear
                .iter()
                .filter_map(|tag| tags.remove(tag))
                .flatten()
                .collect()
        };

        if keys.is_empty() {
            return;
        }

        if let Ok(mut store) = self.store.write() {
            for key in &keys {
                store.remove(key);
            }
        }
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.store
            .read()
            .map(|store| store.get(key).map(|e| !e.is_expired()).unwrap_or(false))
            .unwrap_or(false)
    }
}

impl Default for ListingCache {
    fn default() -> Self {
        Self::new(Some(Duration::from_secs(300)))
    }
}
