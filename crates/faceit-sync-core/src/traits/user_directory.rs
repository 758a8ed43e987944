// # User Directory Trait
//
// Defines the capability interface to the host chat server: resolving a
// local user id to a live user and mutating that user's server groups.
//
// ## Implementations
//
// - In-memory: `directory::MemoryUserDirectory` (tests, embedding)
// - JSON snapshot: `directory::FileUserDirectory` (daemon)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identifier of a server permission group
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    /// Create a group id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for GroupId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A live user on the host chat server
#[async_trait]
pub trait UserHandle: Send + Sync {
    /// Local user id
    fn local_id(&self) -> &str;

    /// Display name
    fn nickname(&self) -> &str;

    /// Groups the user currently holds
    async fn current_groups(&self) -> Result<BTreeSet<GroupId>, crate::Error>;

    /// Add the user to a group
    async fn add_to_group(&self, group: &GroupId) -> Result<(), crate::Error>;

    /// Remove the user from a group
    async fn remove_from_group(&self, group: &GroupId) -> Result<(), crate::Error>;
}

/// Trait for host user directories
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolve a local user id to a live handle
    ///
    /// # Returns
    ///
    /// - `Ok(Some(handle))`: the user is known to the host
    /// - `Ok(None)`: the user is absent (left, deleted, offline)
    /// - `Err(Error)`: the directory itself failed
    async fn find_by_local_id(
        &self,
        local_id: &str,
    ) -> Result<Option<Box<dyn UserHandle>>, crate::Error>;
}
