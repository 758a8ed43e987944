// # Link Store Trait
//
// Defines the key-value interface for persisting profile links.
//
// Keys are `profile:<profile-id>`, values are local user ids. The store is
// deliberately dumb: the 1:1 invariant is enforced by `LinkCommands`, and
// `link::links_from_entries` turns a snapshot into typed links.
//
// ## Implementations
//
// - In-memory: `state::MemoryLinkStore`
// - JSON file with crash recovery: `state::FileLinkStore`

use async_trait::async_trait;
use std::collections::HashMap;

/// Trait for link store implementations
///
/// All methods must be safe to call concurrently. `get_all` must return a
/// consistent snapshot (never a half-applied write).
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Snapshot of every key/value pair in the store
    async fn get_all(&self) -> Result<HashMap<String, String>, crate::Error>;

    /// Get a single value
    async fn get(&self, key: &str) -> Result<Option<String>, crate::Error>;

    /// Create or replace a value
    async fn set(&self, key: &str, value: &str) -> Result<(), crate::Error>;

    /// Delete a value (no-op if missing)
    async fn unset(&self, key: &str) -> Result<(), crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}
