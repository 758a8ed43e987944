// # File Link Store
//
// File-based implementation of LinkStore.
//
// The file is the only source of truth: every read loads it fresh and every
// mutation is a load-modify-write (atomic write-then-rename, with a
// `.backup` of the previous file). Separate processes sharing one file, such
// as a running daemon and a one-shot `link` command, always see each other's
// changes, and nothing is cached that could be written back stale.
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "data": {
//     "profile:0b3c...": "local-user-id"
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::Mutex;

use super::json_file::JsonFile;
use crate::Error;
use crate::traits::LinkStore;

/// File-based link store with crash recovery
///
/// # Example
///
/// ```rust,no_run
/// use faceit_sync_core::state::FileLinkStore;
/// use faceit_sync_core::traits::LinkStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileLinkStore::new("/var/lib/faceit-sync/links.json").await?;
///     store.set("profile:abc", "user-1").await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileLinkStore {
    file: JsonFile,

    /// Serializes load-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileLinkStore {
    /// Open a file link store, recovering the file from its backup if needed
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let store = Self {
            file: JsonFile::open(path).await?,
            write_lock: Mutex::new(()),
        };

        let entries = store.load().await?;
        tracing::debug!(
            "Opened link store {} with {} entries",
            store.file.path().display(),
            entries.len()
        );

        Ok(store)
    }

    async fn load(&self) -> Result<HashMap<String, String>, Error> {
        self.file
            .load_or_recover()
            .await
            .map_err(|e| Error::link_store(format!("Failed to load links: {e}")))
    }

    async fn persist(&self, entries: &HashMap<String, String>) -> Result<(), Error> {
        self.file
            .write(entries)
            .await
            .map_err(|e| Error::link_store(format!("Failed to write links: {e}")))
    }
}

#[async_trait]
impl LinkStore for FileLinkStore {
    async fn get_all(&self) -> Result<HashMap<String, String>, Error> {
        self.load().await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await?;

        if entries.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }

        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries).await
    }

    async fn unset(&self, key: &str) -> Result<(), Error> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await?;

        if entries.remove(key).is_none() {
            return Ok(());
        }

        self.persist(&entries).await
    }

    async fn flush(&self) -> Result<(), Error> {
        // Mutations are durable when they return
        tracing::trace!("Link store {} has nothing to flush", self.file.path().display());
        Ok(())
    }
}
