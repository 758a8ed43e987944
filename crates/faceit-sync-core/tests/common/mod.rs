//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal test doubles: a scripted profile client,
//! a link store that counts flushes, a directory that always fails and
//! one whose group removals fail once.

#![allow(dead_code)]

use async_trait::async_trait;
use faceit_sync_core::directory::UserRecord;
use faceit_sync_core::error::{Error, Result};
use faceit_sync_core::traits::{LinkStore, Profile, ProfileClient, UserDirectory, UserHandle};
use faceit_sync_core::{GroupId, MemoryLinkStore, MemoryUserDirectory, SyncConfig, TierEntry};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Tracked game used throughout the tests
pub const GAME: &str = "cs2";

/// Scripted response for one profile
#[derive(Debug, Clone)]
pub enum ProfileResponse {
    /// Return this profile
    Found(Profile),
    /// Profile does not exist upstream
    NotFound,
    /// Upstream failure (e.g. HTTP 503)
    Upstream,
    /// Never resolve
    Hang,
    /// Panic inside the request
    Panic,
}

/// A ProfileClient answering from a fixed table
#[derive(Clone, Default)]
pub struct StaticProfileClient {
    by_id: Arc<std::sync::Mutex<HashMap<String, ProfileResponse>>>,
    by_username: Arc<std::sync::Mutex<HashMap<String, ProfileResponse>>>,
    fetch_by_id_count: Arc<AtomicUsize>,
    fetch_by_username_count: Arc<AtomicUsize>,
}

impl StaticProfileClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the response for a profile id
    pub fn respond(&self, profile_id: &str, response: ProfileResponse) {
        self.by_id
            .lock()
            .unwrap()
            .insert(profile_id.to_string(), response);
    }

    /// Script the response for a username lookup
    ///
    /// Without a script, username lookups find registered profiles by nickname.
    pub fn respond_to_username(&self, username: &str, response: ProfileResponse) {
        self.by_username
            .lock()
            .unwrap()
            .insert(username.to_string(), response);
    }

    /// Register a profile with a tier for the tracked game
    pub fn with_player(self, profile_id: &str, nickname: &str, tier: i64) -> Self {
        self.respond(profile_id, ProfileResponse::Found(player(profile_id, nickname, tier)));
        self
    }

    /// Get the number of times fetch_by_id() was called
    pub fn fetch_by_id_count(&self) -> usize {
        self.fetch_by_id_count.load(Ordering::SeqCst)
    }

    /// Get the number of times fetch_by_username() was called
    pub fn fetch_by_username_count(&self) -> usize {
        self.fetch_by_username_count.load(Ordering::SeqCst)
    }

    fn response_for(&self, profile_id: &str) -> Option<ProfileResponse> {
        self.by_id.lock().unwrap().get(profile_id).cloned()
    }

    async fn play(response: Option<ProfileResponse>, what: &str) -> Result<Profile> {
        match response {
            Some(ProfileResponse::Found(profile)) => Ok(profile),
            Some(ProfileResponse::NotFound) | None => Err(Error::not_found(what.to_string())),
            Some(ProfileResponse::Upstream) => Err(Error::upstream("HTTP 503 Service Unavailable")),
            Some(ProfileResponse::Hang) => {
                std::future::pending::<()>().await;
                unreachable!("pending future resolved")
            }
            Some(ProfileResponse::Panic) => panic!("profile client panicked for {what}"),
        }
    }
}

#[async_trait]
impl ProfileClient for StaticProfileClient {
    async fn fetch_by_username(&self, username: &str) -> Result<Profile> {
        self.fetch_by_username_count.fetch_add(1, Ordering::SeqCst);

        let scripted = self.by_username.lock().unwrap().get(username).cloned();
        let response = scripted.or_else(|| {
            self.by_id
                .lock()
                .unwrap()
                .values()
                .find(|response| {
                    matches!(response, ProfileResponse::Found(profile) if profile.nickname == username)
                })
                .cloned()
        });

        Self::play(response, username).await
    }

    async fn fetch_by_id(&self, profile_id: &str) -> Result<Profile> {
        self.fetch_by_id_count.fetch_add(1, Ordering::SeqCst);
        let response = self.response_for(profile_id);
        Self::play(response, profile_id).await
    }

    fn client_name(&self) -> &'static str {
        "static"
    }
}

/// A LinkStore that counts flush() calls
#[derive(Clone, Default)]
pub struct CountingLinkStore {
    inner: MemoryLinkStore,
    flush_call_count: Arc<AtomicUsize>,
}

impl CountingLinkStore {
    pub fn new(inner: MemoryLinkStore) -> Self {
        Self {
            inner,
            flush_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get the number of times flush() was called
    pub fn flush_call_count(&self) -> usize {
        self.flush_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LinkStore for CountingLinkStore {
    async fn get_all(&self) -> Result<HashMap<String, String>> {
        self.inner.get_all().await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set(key, value).await
    }

    async fn unset(&self, key: &str) -> Result<()> {
        self.inner.unset(key).await
    }

    async fn flush(&self) -> Result<()> {
        self.flush_call_count.fetch_add(1, Ordering::SeqCst);
        self.inner.flush().await
    }
}

/// A UserDirectory whose lookups always fail
pub struct FailingDirectory;

#[async_trait]
impl UserDirectory for FailingDirectory {
    async fn find_by_local_id(&self, _local_id: &str) -> Result<Option<Box<dyn UserHandle>>> {
        Err(Error::directory("host query interface unavailable"))
    }
}

/// A UserDirectory whose `fail_at`-th group removal fails, once
///
/// Every other call is passed through to the wrapped directory.
#[derive(Clone)]
pub struct FlakyRemovalDirectory {
    inner: MemoryUserDirectory,
    fail_at: usize,
    removals: Arc<AtomicUsize>,
}

impl FlakyRemovalDirectory {
    pub fn new(inner: MemoryUserDirectory, fail_at: usize) -> Self {
        Self {
            inner,
            fail_at,
            removals: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get the number of removals attempted, including the failed one
    pub fn removal_count(&self) -> usize {
        self.removals.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserDirectory for FlakyRemovalDirectory {
    async fn find_by_local_id(&self, local_id: &str) -> Result<Option<Box<dyn UserHandle>>> {
        Ok(self.inner.find_by_local_id(local_id).await?.map(|inner| {
            Box::new(FlakyRemovalHandle {
                inner,
                fail_at: self.fail_at,
                removals: Arc::clone(&self.removals),
            }) as Box<dyn UserHandle>
        }))
    }
}

struct FlakyRemovalHandle {
    inner: Box<dyn UserHandle>,
    fail_at: usize,
    removals: Arc<AtomicUsize>,
}

#[async_trait]
impl UserHandle for FlakyRemovalHandle {
    fn local_id(&self) -> &str {
        self.inner.local_id()
    }

    fn nickname(&self) -> &str {
        self.inner.nickname()
    }

    async fn current_groups(&self) -> Result<BTreeSet<GroupId>> {
        self.inner.current_groups().await
    }

    async fn add_to_group(&self, group: &GroupId) -> Result<()> {
        self.inner.add_to_group(group).await
    }

    async fn remove_from_group(&self, group: &GroupId) -> Result<()> {
        let attempt = self.removals.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt == self.fail_at {
            return Err(Error::directory(format!("server refused to remove group {group}")));
        }
        self.inner.remove_from_group(group).await
    }
}

/// A profile playing the tracked game at `tier`
pub fn player(profile_id: &str, nickname: &str, tier: i64) -> Profile {
    Profile::new(profile_id, nickname).with_game(GAME, tier)
}

/// Tier table mapping tier `t` to group `G<t>`
pub fn tier_table() -> Vec<TierEntry> {
    (1..=10).map(|t| TierEntry::new(t, format!("G{t}"))).collect()
}

/// Valid configuration with `admin` as the unlink group
pub fn test_config() -> SyncConfig {
    SyncConfig::new("test-key", BTreeSet::from([GroupId::new("admin")]), tier_table())
}

/// Link store entry for a profile
pub fn link_entry(profile_id: &str, local_user_id: &str) -> (String, String) {
    (format!("profile:{profile_id}"), local_user_id.to_string())
}

/// Add a user holding `groups` to the directory
pub async fn add_user(directory: &MemoryUserDirectory, local_id: &str, groups: &[&str]) {
    directory
        .insert_user(local_id, UserRecord::new(local_id, groups.iter().copied()))
        .await;
}

/// Build a group set
pub fn groups(ids: &[&str]) -> BTreeSet<GroupId> {
    ids.iter().map(|id| GroupId::new(*id)).collect()
}
