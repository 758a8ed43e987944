// # File User Directory
//
// UserDirectory backed by a JSON snapshot of the host's users. The daemon
// uses it when no live host adapter is wired in; group changes are written
// back atomically so the snapshot always reflects applied deltas.
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "data": {
//     "local-user-id": { "nickname": "alice", "groups": ["7", "12"] }
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::UserRecord;
use crate::Error;
use crate::state::JsonFile;
use crate::traits::{GroupId, UserDirectory, UserHandle};

#[derive(Debug)]
struct Shared {
    file: JsonFile,
    users: RwLock<BTreeMap<String, UserRecord>>,
}

/// JSON-file user directory
#[derive(Debug, Clone)]
pub struct FileUserDirectory {
    shared: Arc<Shared>,
}

impl FileUserDirectory {
    /// Load the directory snapshot from `path`
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = JsonFile::open(path).await?;
        let users: BTreeMap<String, UserRecord> = file
            .load_or_recover()
            .await
            .map_err(|e| Error::directory(format!("Failed to load users: {e}")))?;

        tracing::debug!("Loaded {} users from {}", users.len(), file.path().display());

        Ok(Self {
            shared: Arc::new(Shared {
                file,
                users: RwLock::new(users),
            }),
        })
    }

    /// Insert or replace a user and persist the snapshot
    pub async fn upsert_user(&self, local_id: &str, record: UserRecord) -> Result<(), Error> {
        let mut users = self.shared.users.write().await;
        users.insert(local_id.to_string(), record);
        self.shared.persist(&users).await
    }
}

impl Shared {
    async fn persist(&self, users: &BTreeMap<String, UserRecord>) -> Result<(), Error> {
        self.file
            .write(users)
            .await
            .map_err(|e| Error::directory(format!("Failed to write users: {e}")))
    }

    async fn mutate<F>(&self, local_id: &str, change: F) -> Result<(), Error>
    where
        F: FnOnce(&mut BTreeSet<GroupId>) -> bool,
    {
        let mut users = self.users.write().await;
        let record = users
            .get_mut(local_id)
            .ok_or_else(|| Error::UserAbsent(local_id.to_string()))?;

        if change(&mut record.groups) {
            self.persist(&users).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for FileUserDirectory {
    async fn find_by_local_id(&self, local_id: &str) -> Result<Option<Box<dyn UserHandle>>, Error> {
        let users = self.shared.users.read().await;
        Ok(users.get(local_id).map(|record| {
            Box::new(FileUserHandle {
                local_id: local_id.to_string(),
                nickname: record.nickname.clone(),
                shared: Arc::clone(&self.shared),
            }) as Box<dyn UserHandle>
        }))
    }
}

struct FileUserHandle {
    local_id: String,
    nickname: String,
    shared: Arc<Shared>,
}

#[async_trait]
impl UserHandle for FileUserHandle {
    fn local_id(&self) -> &str {
        &self.local_id
    }

    fn nickname(&self) -> &str {
        &self.nickname
    }

    async fn current_groups(&self) -> Result<BTreeSet<GroupId>, Error> {
        let users = self.shared.users.read().await;
        users
            .get(&self.local_id)
            .map(|record| record.groups.clone())
            .ok_or_else(|| Error::UserAbsent(self.local_id.clone()))
    }

    async fn add_to_group(&self, group: &GroupId) -> Result<(), Error> {
        self.shared
            .mutate(&self.local_id, |groups| groups.insert(group.clone()))
            .await
    }

    async fn remove_from_group(&self, group: &GroupId) -> Result<(), Error> {
        self.shared
            .mutate(&self.local_id, |groups| groups.remove(group))
            .await
    }
}
