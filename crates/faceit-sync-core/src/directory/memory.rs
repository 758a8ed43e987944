// # Memory User Directory
//
// In-memory implementation of UserDirectory. Every group mutation is
// appended to a journal so callers can check the order changes were made.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::UserRecord;
use crate::Error;
use crate::traits::{GroupId, UserDirectory, UserHandle};

/// A group mutation recorded by [`MemoryUserDirectory`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupChange {
    /// User was added to a group
    Added {
        local_id: String,
        group: GroupId,
    },
    /// User was removed from a group
    Removed {
        local_id: String,
        group: GroupId,
    },
}

#[derive(Debug, Default)]
struct Users {
    records: HashMap<String, UserRecord>,
    journal: Vec<GroupChange>,
}

/// In-memory user directory
#[derive(Debug, Clone, Default)]
pub struct MemoryUserDirectory {
    inner: Arc<RwLock<Users>>,
}

impl MemoryUserDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user
    pub async fn insert_user(&self, local_id: impl Into<String>, record: UserRecord) {
        self.inner
            .write()
            .await
            .records
            .insert(local_id.into(), record);
    }

    /// Remove a user (simulates leaving the server)
    pub async fn remove_user(&self, local_id: &str) {
        self.inner.write().await.records.remove(local_id);
    }

    /// Groups currently held by a user
    pub async fn groups_of(&self, local_id: &str) -> Option<BTreeSet<GroupId>> {
        self.inner
            .read()
            .await
            .records
            .get(local_id)
            .map(|record| record.groups.clone())
    }

    /// Every group mutation so far, oldest first
    pub async fn journal(&self) -> Vec<GroupChange> {
        self.inner.read().await.journal.clone()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_local_id(&self, local_id: &str) -> Result<Option<Box<dyn UserHandle>>, Error> {
        let users = self.inner.read().await;
        Ok(users.records.get(local_id).map(|record| {
            Box::new(MemoryUserHandle {
                local_id: local_id.to_string(),
                nickname: record.nickname.clone(),
                users: Arc::clone(&self.inner),
            }) as Box<dyn UserHandle>
        }))
    }
}

struct MemoryUserHandle {
    local_id: String,
    nickname: String,
    users: Arc<RwLock<Users>>,
}

#[async_trait]
impl UserHandle for MemoryUserHandle {
    fn local_id(&self) -> &str {
        &self.local_id
    }

    fn nickname(&self) -> &str {
        &self.nickname
    }

    async fn current_groups(&self) -> Result<BTreeSet<GroupId>, Error> {
        let users = self.users.read().await;
        users
            .records
            .get(&self.local_id)
            .map(|record| record.groups.clone())
            .ok_or_else(|| Error::UserAbsent(self.local_id.clone()))
    }

    async fn add_to_group(&self, group: &GroupId) -> Result<(), Error> {
        let mut users = self.users.write().await;
        let record = users
            .records
            .get_mut(&self.local_id)
            .ok_or_else(|| Error::UserAbsent(self.local_id.clone()))?;
        record.groups.insert(group.clone());
        users.journal.push(GroupChange::Added {
            local_id: self.local_id.clone(),
            group: group.clone(),
        });
        Ok(())
    }

    async fn remove_from_group(&self, group: &GroupId) -> Result<(), Error> {
        let mut users = self.users.write().await;
        let record = users
            .records
            .get_mut(&self.local_id)
            .ok_or_else(|| Error::UserAbsent(self.local_id.clone()))?;
        record.groups.remove(group);
        users.journal.push(GroupChange::Removed {
            local_id: self.local_id.clone(),
            group: group.clone(),
        });
        Ok(())
    }
}
