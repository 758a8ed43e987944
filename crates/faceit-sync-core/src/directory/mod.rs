// # User Directory Implementations
//
// Stand-ins for the host chat server's user API.
//
// - `MemoryUserDirectory`: in-memory users with a change journal
// - `FileUserDirectory`: JSON snapshot of users and their groups

pub mod file;
pub mod memory;

pub use file::FileUserDirectory;
pub use memory::{GroupChange, MemoryUserDirectory};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::traits::GroupId;

/// A user record as held by the directory implementations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Display name
    pub nickname: String,
    /// Server groups held
    #[serde(default)]
    pub groups: BTreeSet<GroupId>,
}

impl UserRecord {
    /// Create a user record
    pub fn new<I, G>(nickname: impl Into<String>, groups: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: Into<GroupId>,
    {
        Self {
            nickname: nickname.into(),
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }
}
