//! Desired-state resolution.
//!
//! Turns a group's stored addon order plus a user's overrides into the
//! ordered descriptor list reconciliation should converge on. Pure over a
//! [`DirectorySource`], so tests assert outputs on fixture records without
//! any network.

use crate::error::{EngineError, EngineResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use stremsync_model::{AddonDescriptor, AddonKey, GroupId, UserId, UserOverrides};
use tracing::debug;

/// Read access to the directory the CRUD layer maintains.
///
/// Group membership comes back in stored order; overrides default to empty
/// for unknown users.
pub trait DirectorySource: Send + Sync {
    /// The group's ordered addon keys, or `None` for an unknown group.
    fn group_members(&self, group_id: &GroupId) -> Option<Vec<AddonKey>>;

    /// The user's protection/exclusion overrides.
    fn overrides(&self, user_id: &UserId) -> UserOverrides;

    /// Looks up the stored descriptor for an addon key.
    fn addon(&self, key: &AddonKey) -> Option<AddonDescriptor>;
}

/// Resolves desired addon lists from directory records.
pub struct DesiredStateResolver<D: DirectorySource> {
    directory: Arc<D>,
}

impl<D: DirectorySource> DesiredStateResolver<D> {
    /// Creates a resolver over a directory.
    pub fn new(directory: Arc<D>) -> Self {
        Self { directory }
    }

    /// Resolves the group's base desired list, in stored order.
    ///
    /// Fails with [`EngineError::NotFound`] for an unknown group; that is a
    /// caller bug and is never retried. Membership entries whose descriptor
    /// is missing from the directory are skipped.
    pub fn resolve(&self, group_id: &GroupId) -> EngineResult<Vec<AddonDescriptor>> {
        let keys = self
            .directory
            .group_members(group_id)
            .ok_or_else(|| EngineError::NotFound(format!("group {group_id}")))?;

        let mut addons = Vec::with_capacity(keys.len());
        for key in &keys {
            match self.directory.addon(key) {
                Some(descriptor) => addons.push(descriptor),
                None => debug!(%key, "group references unknown addon, skipping"),
            }
        }
        Ok(addons)
    }

    /// Resolves the desired list for one user of the group.
    ///
    /// Starts from [`resolve`](Self::resolve), drops the user's exclusions,
    /// then inserts missing protected addons at their last known position
    /// when one was recorded, else appends them at the end. Exclusion wins
    /// for a key present in both override sets.
    pub fn resolve_for_user(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> EngineResult<Vec<AddonDescriptor>> {
        let overrides = self.directory.overrides(user_id);

        let mut list: Vec<AddonDescriptor> = self
            .resolve(group_id)?
            .into_iter()
            .filter(|d| !overrides.is_excluded(&d.key()))
            .collect();

        for key in overrides.effective_protected() {
            if list.iter().any(|d| d.key() == key) {
                continue;
            }
            let Some(descriptor) = self.directory.addon(&key) else {
                debug!(%key, "protected addon missing from directory, skipping");
                continue;
            };
            match overrides.last_known_position(&key) {
                Some(position) if position < list.len() => list.insert(position, descriptor),
                _ => list.push(descriptor),
            }
        }

        Ok(list)
    }
}

/// An in-memory directory for tests and embedding.
#[derive(Default)]
pub struct MemoryDirectory {
    groups: RwLock<HashMap<GroupId, Vec<AddonKey>>>,
    overrides: RwLock<HashMap<UserId, UserOverrides>>,
    addons: RwLock<HashMap<AddonKey, AddonDescriptor>>,
}

impl MemoryDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an addon descriptor.
    pub fn add_addon(&self, descriptor: AddonDescriptor) {
        self.addons.write().insert(descriptor.key(), descriptor);
    }

    /// Sets a group's ordered membership.
    pub fn set_group(&self, group_id: GroupId, keys: Vec<AddonKey>) {
        self.groups.write().insert(group_id, keys);
    }

    /// Sets a user's overrides.
    pub fn set_overrides(&self, overrides: UserOverrides) {
        self.overrides.write().insert(overrides.user_id, overrides);
    }
}

impl DirectorySource for MemoryDirectory {
    fn group_members(&self, group_id: &GroupId) -> Option<Vec<AddonKey>> {
        self.groups.read().get(group_id).cloned()
    }

    fn overrides(&self, user_id: &UserId) -> UserOverrides {
        self.overrides
            .read()
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserOverrides::new(*user_id))
    }

    fn addon(&self, key: &AddonKey) -> Option<AddonDescriptor> {
        self.addons.read().get(key).cloned()
    }
}
