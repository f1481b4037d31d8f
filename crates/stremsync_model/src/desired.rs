//! Desired-state records and sync outcomes.

use crate::addon::{AddonDescriptor, AddonKey};
use crate::ids::{GroupId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::SystemTime;

/// The ordered addon membership of a group.
///
/// Order is significant: it determines display and precedence order on the
/// remote account. Owned by the group entity in the directory; this type has
/// no independent lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDesiredSet {
    /// The owning group.
    pub group_id: GroupId,
    /// Ordered addon keys.
    pub addon_keys: Vec<AddonKey>,
}

impl GroupDesiredSet {
    /// Creates an empty desired set for a group.
    pub fn new(group_id: GroupId) -> Self {
        Self {
            group_id,
            addon_keys: Vec::new(),
        }
    }

    /// Appends an addon to the end of the order, ignoring duplicates.
    pub fn push(&mut self, key: AddonKey) {
        if !self.addon_keys.contains(&key) {
            self.addon_keys.push(key);
        }
    }

    /// Removes an addon from the set.
    pub fn remove(&mut self, key: &AddonKey) {
        self.addon_keys.retain(|k| k != key);
    }

    /// Returns true if the addon is a member.
    pub fn contains(&self, key: &AddonKey) -> bool {
        self.addon_keys.contains(key)
    }
}

/// Per-user protection and exclusion overrides.
///
/// Protected addons are never removed by reconciliation even when absent from
/// the group's desired set; excluded addons are never added even when
/// present. When the same key appears in both sets, exclusion wins: the addon
/// is neither added nor shielded from removal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserOverrides {
    /// The user these overrides belong to.
    pub user_id: UserId,
    /// Addons that reconciliation must never remove.
    pub protected: BTreeSet<AddonKey>,
    /// Addons that reconciliation must never add.
    pub excluded: BTreeSet<AddonKey>,
    /// Last observed position of protected addons in the user's collection,
    /// used to re-insert them near their old slot when resolving.
    pub last_known_positions: BTreeMap<AddonKey, usize>,
}

impl UserOverrides {
    /// Creates empty overrides for a user.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }

    /// Marks an addon as protected.
    pub fn protect(&mut self, key: AddonKey) {
        self.protected.insert(key);
    }

    /// Marks an addon as excluded.
    pub fn exclude(&mut self, key: AddonKey) {
        self.excluded.insert(key);
    }

    /// Records where a protected addon last sat in the user's collection.
    pub fn record_position(&mut self, key: AddonKey, position: usize) {
        self.last_known_positions.insert(key, position);
    }

    /// Returns true if the addon must not be added.
    pub fn is_excluded(&self, key: &AddonKey) -> bool {
        self.excluded.contains(key)
    }

    /// Protected keys with exclusions subtracted.
    ///
    /// A key present in both sets is treated as excluded only.
    pub fn effective_protected(&self) -> BTreeSet<AddonKey> {
        self.protected.difference(&self.excluded).cloned().collect()
    }

    /// Last known position for a protected addon, if one was recorded.
    pub fn last_known_position(&self, key: &AddonKey) -> Option<usize> {
        self.last_known_positions.get(key).copied()
    }
}

/// A point-in-time read of a user's remote addon collection.
///
/// Ephemeral: fetched fresh before every reconciliation and never cached
/// across sync runs, because the remote state can change out-of-band.
#[derive(Debug, Clone)]
pub struct RemoteSnapshot {
    /// The account the snapshot belongs to.
    pub user_id: UserId,
    /// Ordered addon collection as the remote reported it.
    pub addons: Vec<AddonDescriptor>,
    /// When the snapshot was taken.
    pub fetched_at: SystemTime,
}

impl RemoteSnapshot {
    /// Records a snapshot taken now.
    pub fn taken(user_id: UserId, addons: Vec<AddonDescriptor>) -> Self {
        Self {
            user_id,
            addons,
            fetched_at: SystemTime::now(),
        }
    }
}

/// Terminal status of one sync invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    /// All operations applied.
    Succeeded,
    /// The remote accepted the request shape but rejected one addon;
    /// the offending addon is named in the error detail.
    Partial,
    /// Nothing was applied.
    Failed,
}

/// The change summary produced by one sync invocation.
///
/// Created once per invocation and not persisted beyond the triggering
/// request. The `removed` list is the explicit hand-off the caller uses to
/// persist intentional exclusions ("this was dropped on purpose, do not
/// re-add on the next resolve").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOutcome {
    /// The synced user.
    pub user_id: UserId,
    /// Addons added to the remote collection.
    pub added: Vec<AddonDescriptor>,
    /// Addons removed from the remote collection.
    pub removed: Vec<AddonDescriptor>,
    /// Whether the surviving addons were reordered.
    pub reordered: bool,
    /// Terminal status.
    pub status: SyncStatus,
    /// Error detail for `Partial` and `Failed` outcomes.
    pub error: Option<String>,
}

impl SyncOutcome {
    /// A successful outcome with no changes.
    pub fn noop(user_id: UserId) -> Self {
        Self {
            user_id,
            added: Vec::new(),
            removed: Vec::new(),
            reordered: false,
            status: SyncStatus::Succeeded,
            error: None,
        }
    }

    /// Returns true if the sync changed nothing.
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && !self.reordered
    }
}
