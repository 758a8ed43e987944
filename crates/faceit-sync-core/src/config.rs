//! Configuration types for the Faceit sync system
//!
//! This module defines the configuration structures shared by the scheduler
//! and the link commands. Validation failures are `Error::Config` and are
//! fatal at startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::traits::GroupId;

/// Number of skill tiers the rating service reports (1..=10)
pub const TIER_COUNT: usize = 10;

/// Main sync configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Bearer token for the rating service
    pub api_key: String,

    /// Groups whose members may run `unlink`
    pub unlink_permission_groups: BTreeSet<GroupId>,

    /// Ordered tier → group table
    pub tier_table: Vec<TierEntry>,

    /// Game key whose skill tier is tracked
    #[serde(default = "default_game")]
    pub game: String,

    /// Scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl SyncConfig {
    /// Create a configuration with default game and scheduler settings
    pub fn new(
        api_key: impl Into<String>,
        unlink_permission_groups: BTreeSet<GroupId>,
        tier_table: Vec<TierEntry>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            unlink_permission_groups,
            tier_table,
            game: default_game(),
            scheduler: SchedulerConfig::default(),
        }
    }

    /// Set the tracked game
    pub fn with_game(mut self, game: impl Into<String>) -> Self {
        self.game = game.into();
        self
    }

    /// Set the scheduler settings
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.api_key.trim().is_empty() {
            return Err(crate::Error::config("API key cannot be empty"));
        }

        if self.unlink_permission_groups.is_empty() {
            return Err(crate::Error::config(
                "At least one unlink permission group is required",
            ));
        }

        if self
            .unlink_permission_groups
            .iter()
            .any(|group| group.as_str().is_empty())
        {
            return Err(crate::Error::config("Unlink permission group ids cannot be empty"));
        }

        if self.game.trim().is_empty() {
            return Err(crate::Error::config("Tracked game cannot be empty"));
        }

        // Full tier table checks live with the resolver
        crate::rank::TierTable::new(self.tier_table.clone())?;

        self.scheduler.validate()
    }
}

// API key stays out of logs
impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("api_key", &"<REDACTED>")
            .field("unlink_permission_groups", &self.unlink_permission_groups)
            .field("tier_table", &self.tier_table)
            .field("game", &self.game)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

/// One row of the tier table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierEntry {
    /// Skill tier value
    pub tier: i64,
    /// Group assigned for this tier
    pub group: GroupId,
}

impl TierEntry {
    /// Create a tier entry
    pub fn new(tier: i64, group: impl Into<GroupId>) -> Self {
        Self {
            tier,
            group: group.into(),
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Upper bound on one user's reconciliation (fetch + lookup + apply)
    #[serde(default = "default_user_timeout_secs")]
    pub user_timeout_secs: u64,

    /// Capacity of the scheduler event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl SchedulerConfig {
    /// Validate the scheduler settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.user_timeout_secs == 0 {
            return Err(crate::Error::config("Per-user timeout must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            user_timeout_secs: default_user_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_game() -> String {
    "cs2".to_string()
}

fn default_user_timeout_secs() -> u64 {
    30
}

fn default_event_channel_capacity() -> usize {
    1000
}
