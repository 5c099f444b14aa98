use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use study_core::model::{RequestKey, ResponseSnapshot};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("quota exceeded: {needed} bytes needed, limit is {limit}")]
    QuotaExceeded { needed: usize, limit: usize },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// String-keyed durable storage for persisted records.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the raw value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::QuotaExceeded` when the backend is full, or other storage errors.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`; removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Named caches of request/response pairs, one cache per offline version.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the named cache if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the cache cannot be created.
    async fn open_cache(&self, name: &str) -> Result<(), StorageError>;

    /// Names of all existing caches, sorted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn cache_names(&self) -> Result<Vec<String>, StorageError>;

    /// Delete a cache and all of its entries. Returns false if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the deletion fails.
    async fn delete_cache(&self, name: &str) -> Result<bool, StorageError>;

    /// Store a response under `key`, overwriting any previous entry.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entry cannot be written.
    async fn put(
        &self,
        cache: &str,
        key: &RequestKey,
        response: &ResponseSnapshot,
    ) -> Result<(), StorageError>;

    /// Look up `key` in one cache.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn lookup(
        &self,
        cache: &str,
        key: &RequestKey,
    ) -> Result<Option<ResponseSnapshot>, StorageError>;

    /// Look up `key` across every cache, in name order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn lookup_any(&self, key: &RequestKey) -> Result<Option<ResponseSnapshot>, StorageError>;

    /// Keys stored in one cache, sorted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn keys(&self, cache: &str) -> Result<Vec<RequestKey>, StorageError>;
}

type CacheMap = BTreeMap<String, HashMap<RequestKey, ResponseSnapshot>>;

/// Simple in-memory repository implementation for testing and prototyping.
///
/// An optional byte quota mimics a full browser store, and the repository can
/// be switched to "unavailable" to exercise error paths.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    records: Arc<Mutex<HashMap<String, String>>>,
    caches: Arc<Mutex<CacheMap>>,
    quota_bytes: Option<usize>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the total size of stored keys and values.
    #[must_use]
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota_bytes = Some(bytes);
        self
    }

    /// Make every subsequent operation fail with a connection error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("storage unavailable".into()));
        }
        Ok(())
    }
}

fn lock_err<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl KeyValueStore for InMemoryRepository {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check_available()?;
        let guard = self.records.lock().map_err(lock_err)?;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_available()?;
        let mut guard = self.records.lock().map_err(lock_err)?;
        if let Some(limit) = self.quota_bytes {
            let others: usize = guard
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > limit {
                return Err(StorageError::QuotaExceeded { needed, limit });
            }
        }
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_available()?;
        let mut guard = self.records.lock().map_err(lock_err)?;
        guard.remove(key);
        Ok(())
    }
}

#[async_trait]
impl CacheStorage for InMemoryRepository {
    async fn open_cache(&self, name: &str) -> Result<(), StorageError> {
        self.check_available()?;
        let mut guard = self.caches.lock().map_err(lock_err)?;
        guard.entry(name.to_owned()).or_default();
        Ok(())
    }

    async fn cache_names(&self) -> Result<Vec<String>, StorageError> {
        self.check_available()?;
        let guard = self.caches.lock().map_err(lock_err)?;
        Ok(guard.keys().cloned().collect())
    }

    async fn delete_cache(&self, name: &str) -> Result<bool, StorageError> {
        self.check_available()?;
        let mut guard = self.caches.lock().map_err(lock_err)?;
        Ok(guard.remove(name).is_some())
    }

    async fn put(
        &self,
        cache: &str,
        key: &RequestKey,
        response: &ResponseSnapshot,
    ) -> Result<(), StorageError> {
        self.check_available()?;
        let mut guard = self.caches.lock().map_err(lock_err)?;
        guard
            .entry(cache.to_owned())
            .or_default()
            .insert(key.clone(), response.clone());
        Ok(())
    }

    async fn lookup(
        &self,
        cache: &str,
        key: &RequestKey,
    ) -> Result<Option<ResponseSnapshot>, StorageError> {
        self.check_available()?;
        let guard = self.caches.lock().map_err(lock_err)?;
        Ok(guard.get(cache).and_then(|entries| entries.get(key)).cloned())
    }

    async fn lookup_any(&self, key: &RequestKey) -> Result<Option<ResponseSnapshot>, StorageError> {
        self.check_available()?;
        let guard = self.caches.lock().map_err(lock_err)?;
        Ok(guard.values().find_map(|entries| entries.get(key)).cloned())
    }

    async fn keys(&self, cache: &str) -> Result<Vec<RequestKey>, StorageError> {
        self.check_available()?;
        let guard = self.caches.lock().map_err(lock_err)?;
        let mut keys: Vec<RequestKey> = guard
            .get(cache)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }
}

/// Aggregates record and cache repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub records: Arc<dyn KeyValueStore>,
    pub caches: Arc<dyn CacheStorage>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    #[must_use]
    pub fn from_repository(repo: InMemoryRepository) -> Self {
        let records: Arc<dyn KeyValueStore> = Arc::new(repo.clone());
        let caches: Arc<dyn CacheStorage> = Arc::new(repo);
        Self { records, caches }
    }

    /// Typed view over the record store.
    #[must_use]
    pub fn persistence(&self) -> crate::persistence::PersistenceStore {
        crate::persistence::PersistenceStore::new(Arc::clone(&self.records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(path: &str) -> RequestKey {
        RequestKey::from_persisted(format!("GET http://localhost/{path}"))
    }

    #[tokio::test]
    async fn put_overwrites_instead_of_duplicating() {
        let repo = InMemoryRepository::new();
        repo.put("v1", &key("a"), &ResponseSnapshot::ok("text/plain", "one"))
            .await
            .unwrap();
        repo.put("v1", &key("a"), &ResponseSnapshot::ok("text/plain", "two"))
            .await
            .unwrap();

        assert_eq!(repo.keys("v1").await.unwrap().len(), 1);
        let hit = repo.lookup("v1", &key("a")).await.unwrap().unwrap();
        assert_eq!(hit.text(), "two");
    }

    #[tokio::test]
    async fn delete_removes_whole_cache() {
        let repo = InMemoryRepository::new();
        repo.open_cache("v1").await.unwrap();
        repo.put("v2", &key("a"), &ResponseSnapshot::ok("text/plain", "x"))
            .await
            .unwrap();

        assert_eq!(repo.cache_names().await.unwrap(), vec!["v1", "v2"]);
        assert!(repo.delete_cache("v2").await.unwrap());
        assert!(!repo.delete_cache("v2").await.unwrap());
        assert!(repo.lookup_any(&key("a")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn quota_rejects_oversized_writes() {
        let repo = InMemoryRepository::new().with_quota(16);
        repo.set("theme", "dark").await.unwrap();
        let err = repo.set("content_a_b_1", "<p>long page</p>").await.unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { limit: 16, .. }));
        // overwriting an existing key only counts the new value
        repo.set("theme", "light").await.unwrap();
    }

    #[tokio::test]
    async fn unavailable_backend_errors() {
        let repo = InMemoryRepository::new();
        repo.set_unavailable(true);
        assert!(matches!(
            repo.get("theme").await,
            Err(StorageError::Connection(_))
        ));
        repo.set_unavailable(false);
        assert!(repo.get("theme").await.unwrap().is_none());
    }
}
