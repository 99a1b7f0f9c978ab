use std::{collections::BTreeMap, fmt::Debug, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

/// Key-value storage with a per-entry time to live.
///
/// Expiry is lazy: an expired entry is treated as absent and removed when it is next
/// touched. Nothing sweeps the store in the background.
#[async_trait]
pub trait TtlStore<V>: Debug + Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    /// Store `value` under `key`, replacing any previous entry.
    async fn put(&self, key: &str, value: V, ttl: Duration) -> Result<()>;

    /// Store `value` only if `key` holds no live entry. Returns whether the value was stored.
    async fn insert_if_absent(&self, key: &str, value: V, ttl: Duration) -> Result<bool>;

    /// Get a live entry.
    async fn get(&self, key: &str) -> Result<Option<V>>;

    /// Remove an entry, returning it if it was still live.
    async fn delete(&self, key: &str) -> Result<Option<V>>;

    /// All live entries, in key order.
    async fn entries(&self) -> Result<Vec<(String, V)>>;
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

impl<V> Entry<V> {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// A local in-memory store. Not for production use!
///
/// # Warning
/// This in-memory store should only be used for test purposes or a single instance, it will
/// not work for a distributed deployment.
#[derive(Debug, Clone)]
pub struct MemoryTtlStore<V> {
    store: Arc<Mutex<BTreeMap<String, Entry<V>>>>,
}

impl<V> Default for MemoryTtlStore<V> {
    fn default() -> Self {
        Self {
            store: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }
}

impl<V> MemoryTtlStore<V> {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl<V> TtlStore<V> for MemoryTtlStore<V>
where
    V: Clone + Debug + Send + Sync + 'static,
{
    async fn put(&self, key: &str, value: V, ttl: Duration) -> Result<()> {
        let expires_at = Utc::now() + ttl;
        self.store
            .lock()
            .await
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn insert_if_absent(&self, key: &str, value: V, ttl: Duration) -> Result<bool> {
        let now = Utc::now();
        let mut store = self.store.lock().await;
        if store.get(key).is_some_and(|entry| entry.is_live(now)) {
            return Ok(false);
        }
        store.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<V>> {
        let now = Utc::now();
        let mut store = self.store.lock().await;
        match store.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                tracing::debug!("evicting expired entry {key}");
                store.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<Option<V>> {
        let now = Utc::now();
        Ok(self
            .store
            .lock()
            .await
            .remove(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value))
    }

    async fn entries(&self) -> Result<Vec<(String, V)>> {
        let now = Utc::now();
        let mut store = self.store.lock().await;
        store.retain(|_, entry| entry.is_live(now));
        Ok(store
            .iter()
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect())
    }
}
