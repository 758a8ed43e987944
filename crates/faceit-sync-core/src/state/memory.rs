// # Memory Link Store
//
// In-memory implementation of LinkStore.
//
// All links are lost on restart. Useful for tests and for embedding the
// core in a host that persists links itself.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use async_trait::async_trait;

use crate::traits::LinkStore;
use crate::Error;

/// In-memory link store
///
/// # Example
///
/// ```rust,no_run
/// use faceit_sync_core::state::MemoryLinkStore;
/// use faceit_sync_core::traits::LinkStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryLinkStore::new();
///
///     store.set("profile:abc", "user-1").await?;
///     assert_eq!(store.get("profile:abc").await?, Some("user-1".to_string()));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryLinkStore {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryLinkStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with entries
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            inner: Arc::new(RwLock::new(map)),
        }
    }

    /// Number of entries in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl LinkStore for MemoryLinkStore {
    async fn get_all(&self) -> Result<HashMap<String, String>, Error> {
        Ok(self.inner.read().await.clone())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.inner.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.inner
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn unset(&self, key: &str) -> Result<(), Error> {
        self.inner.write().await.remove(key);
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}
