//! Tier → group resolution
//!
//! [`TierTable`] is validated once at construction and is read-only
//! afterwards, so it can be shared across per-user tasks without locking.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{TIER_COUNT, TierEntry};
use crate::error::{Error, Result};
use crate::traits::GroupId;

/// Validated tier table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierTable {
    groups_by_tier: BTreeMap<i64, GroupId>,
    managed: BTreeSet<GroupId>,
}

impl TierTable {
    /// Build a tier table
    ///
    /// Requires exactly [`TIER_COUNT`] entries with unique tiers covering
    /// `1..=10` and non-empty group ids. Several tiers may share one group.
    pub fn new(entries: Vec<TierEntry>) -> Result<Self> {
        if entries.len() != TIER_COUNT {
            return Err(Error::config(format!(
                "Tier table must contain exactly {} entries, got {}",
                TIER_COUNT,
                entries.len()
            )));
        }

        let mut groups_by_tier = BTreeMap::new();
        for entry in entries {
            if entry.group.as_str().is_empty() {
                return Err(Error::config(format!(
                    "Tier {} has an empty group id",
                    entry.tier
                )));
            }
            if groups_by_tier.insert(entry.tier, entry.group).is_some() {
                return Err(Error::config(format!(
                    "Tier {} appears more than once in the tier table",
                    entry.tier
                )));
            }
        }

        if let Some(missing) = (1..=TIER_COUNT as i64).find(|t| !groups_by_tier.contains_key(t)) {
            return Err(Error::config(format!(
                "Tier table has no entry for tier {missing}"
            )));
        }

        let managed = groups_by_tier.values().cloned().collect();

        Ok(Self {
            groups_by_tier,
            managed,
        })
    }

    /// Resolve a tier to its target group
    pub fn resolve(&self, tier: i64) -> Result<&GroupId> {
        self.groups_by_tier
            .get(&tier)
            .ok_or(Error::UnknownTier(tier))
    }

    /// Every group that appears in the table
    pub fn managed_groups(&self) -> &BTreeSet<GroupId> {
        &self.managed
    }

    /// Whether the reconciler is allowed to touch this group
    pub fn is_managed(&self, group: &GroupId) -> bool {
        self.managed.contains(group)
    }

    /// Highest tier that maps to a group
    pub fn rank_of(&self, group: &GroupId) -> Option<i64> {
        self.groups_by_tier
            .iter()
            .rev()
            .find(|(_, g)| *g == group)
            .map(|(tier, _)| *tier)
    }
}
