//! Per-user results of a sync pass
//!
//! Outcomes are not persisted; they feed logs, scheduler events and the
//! `sync-once` command output.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::error::Error;
use crate::link::Link;
use crate::traits::GroupId;

/// Why a user was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Profile no longer exists upstream
    ProfileNotFound,
    /// Profile has no stats for the tracked game
    NotGameLinked,
    /// Tier is not in the tier table
    UnknownTier(i64),
    /// Host directory does not know the user (link is kept)
    UserAbsent,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProfileNotFound => f.write_str("profile not found"),
            Self::NotGameLinked => f.write_str("not game linked"),
            Self::UnknownTier(tier) => write!(f, "unknown tier {tier}"),
            Self::UserAbsent => f.write_str("user absent"),
        }
    }
}

/// Result of reconciling one link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationOutcome {
    /// Already in the right group
    NoChange {
        group: GroupId,
    },
    /// Moved up, or assigned a first managed group (`from` is `None`)
    Promoted {
        from: Option<GroupId>,
        to: GroupId,
    },
    /// Moved down
    Demoted {
        from: GroupId,
        to: GroupId,
    },
    /// Expected skip condition
    Skipped(SkipReason),
    /// Upstream, directory or timeout failure
    Failed(String),
}

impl ReconciliationOutcome {
    /// Map a per-user error to its outcome
    pub fn from_error(error: &Error) -> Self {
        match error {
            Error::NotFound(_) => Self::Skipped(SkipReason::ProfileNotFound),
            Error::NotGameLinked { .. } => Self::Skipped(SkipReason::NotGameLinked),
            Error::UnknownTier(tier) => Self::Skipped(SkipReason::UnknownTier(*tier)),
            Error::UserAbsent(_) => Self::Skipped(SkipReason::UserAbsent),
            other => Self::Failed(other.to_string()),
        }
    }

    /// Whether group memberships were changed
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Promoted { .. } | Self::Demoted { .. })
    }
}

impl fmt::Display for ReconciliationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoChange { group } => write!(f, "no change ({group})"),
            Self::Promoted { from: Some(from), to } => write!(f, "promoted {from} -> {to}"),
            Self::Promoted { from: None, to } => write!(f, "assigned {to}"),
            Self::Demoted { from, to } => write!(f, "demoted {from} -> {to}"),
            Self::Skipped(reason) => write!(f, "skipped: {reason}"),
            Self::Failed(error) => write!(f, "failed: {error}"),
        }
    }
}

/// Outcome for one link in a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserOutcome {
    pub link: Link,
    pub outcome: ReconciliationOutcome,
}

/// Counts per outcome kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub no_change: usize,
    pub promoted: usize,
    pub demoted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SyncSummary {
    /// Total number of links processed
    pub fn total(&self) -> usize {
        self.no_change + self.promoted + self.demoted + self.skipped + self.failed
    }
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} unchanged, {} promoted, {} demoted, {} skipped, {} failed",
            self.no_change, self.promoted, self.demoted, self.skipped, self.failed
        )
    }
}

/// Everything that happened in one sync pass
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Sorted by local user id
    pub outcomes: Vec<UserOutcome>,
}

impl SyncReport {
    /// Tally the outcomes
    pub fn summary(&self) -> SyncSummary {
        let mut summary = SyncSummary::default();
        for entry in &self.outcomes {
            match entry.outcome {
                ReconciliationOutcome::NoChange { .. } => summary.no_change += 1,
                ReconciliationOutcome::Promoted { .. } => summary.promoted += 1,
                ReconciliationOutcome::Demoted { .. } => summary.demoted += 1,
                ReconciliationOutcome::Skipped(_) => summary.skipped += 1,
                ReconciliationOutcome::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }

    /// Outcome for a local user, if it was part of the pass
    pub fn outcome_for(&self, local_user_id: &str) -> Option<&ReconciliationOutcome> {
        self.outcomes
            .iter()
            .find(|entry| entry.link.local_user_id == local_user_id)
            .map(|entry| &entry.outcome)
    }
}
