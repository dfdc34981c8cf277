//! Access decision returned to the hosting integration.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::groups::GroupId;

/// Why access was granted or denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// The object is not associated with any group.
    Unrestricted,
    /// A group of the object opens the requested mode to everyone.
    OpenToAll,
    /// The requester's access level grants membership in every group.
    FullAccess,
    /// The requester belongs to at least one group of the object.
    Member,
    /// The requester belongs to none of the object's groups.
    NotMember,
}

/// Outcome of an access check.
///
/// `locking_groups` lists the object's groups that restrict the requested
/// mode to their members. It is filled whenever the object is locked for
/// that mode, also when the requester is let in, so an administrator view
/// can show what the object is locked by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub granted: bool,
    pub locking_groups: BTreeSet<GroupId>,
    pub reason: DecisionReason,
}

impl AccessDecision {
    pub const fn granted(reason: DecisionReason, locking_groups: BTreeSet<GroupId>) -> Self {
        Self {
            granted: true,
            locking_groups,
            reason,
        }
    }

    pub const fn denied(locking_groups: BTreeSet<GroupId>) -> Self {
        Self {
            granted: false,
            locking_groups,
            reason: DecisionReason::NotMember,
        }
    }

    /// Whether the object is locked for the checked mode at all.
    pub fn is_locked(&self) -> bool {
        !self.locking_groups.is_empty()
    }
}
