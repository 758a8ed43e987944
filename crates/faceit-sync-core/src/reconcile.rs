//! Group membership reconciliation
//!
//! Decision and effect are split: [`reconcile`] is a pure function that
//! computes the minimal [`GroupDelta`], and [`apply`] performs it against a
//! [`UserHandle`]. Only managed groups (those in the tier table) ever appear
//! in a delta; every other group the user holds is left alone.
//!
//! ## Policy
//!
//! This is the narrowed policy: only managed groups other than the target
//! are removed, and the target is added only when missing. The broader
//! alternative (remove every managed group, then re-add the target) reaches
//! the same end state but costs a remove/add pair on the target and briefly
//! leaves the user with no managed group.
//!
//! ## Guarantee
//!
//! After a delta is applied, the user's managed groups are exactly
//! `{target}`. Reconciling again from that state yields an empty delta. If
//! `apply` fails partway, the add is not attempted; the next reconcile
//! computes a fresh delta from whatever the user holds by then.

use std::collections::BTreeSet;
use tracing::debug;

use crate::error::Result;
use crate::traits::{GroupId, UserHandle};

/// Group changes needed to move a user into the target group
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupDelta {
    /// Managed groups to remove
    pub to_remove: BTreeSet<GroupId>,
    /// Group to add, if the user does not hold it yet
    pub to_add: Option<GroupId>,
}

impl GroupDelta {
    /// Whether the user is already correctly ranked
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_none()
    }
}

/// Compute the delta that leaves the user holding exactly `{target}` among
/// the managed groups
///
/// Every managed group other than the target is removed, including extra
/// ones left behind by an inconsistent earlier state.
pub fn reconcile(
    current: &BTreeSet<GroupId>,
    target: &GroupId,
    managed: &BTreeSet<GroupId>,
) -> GroupDelta {
    let current_managed: BTreeSet<GroupId> = current.intersection(managed).cloned().collect();

    let holds_target = current_managed.contains(target);
    if holds_target && current_managed.len() == 1 {
        return GroupDelta::default();
    }

    let to_remove = current_managed
        .into_iter()
        .filter(|group| group != target)
        .collect();

    GroupDelta {
        to_remove,
        to_add: (!holds_target).then(|| target.clone()),
    }
}

/// Apply a delta to a live user: removals first, then the addition
///
/// Removing first means a delayed removal can never leave the user holding
/// two managed groups. A failure stops the apply; the next pass recomputes
/// the delta from whatever state the user ended up in.
pub async fn apply(user: &dyn UserHandle, delta: &GroupDelta) -> Result<()> {
    for group in &delta.to_remove {
        debug!("Removing {} from group {}", user.local_id(), group);
        user.remove_from_group(group).await?;
    }

    if let Some(group) = &delta.to_add {
        debug!("Adding {} to group {}", user.local_id(), group);
        user.add_to_group(group).await?;
    }

    Ok(())
}
