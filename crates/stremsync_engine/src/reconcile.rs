//! Desired-vs-actual reconciliation.
//!
//! [`Reconciler::diff`] is pure and deterministic: the same desired/actual
//! pair always produces the same [`Plan`], which makes golden-output tests
//! possible. The plan's `target` is the full ordered collection the executor
//! will set, because the remote API only exposes "replace the whole ordered
//! collection".

use std::collections::{BTreeSet, HashMap, HashSet};
use stremsync_model::{AddonDescriptor, AddonKey};

/// One reconciliation operation, in execution order.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// The addon is present with identical config; nothing to do.
    Keep(AddonKey),
    /// The addon is missing from the account and will be installed.
    Add(AddonDescriptor),
    /// The addon is present under the same key with different
    /// resource/catalog config; the desired config wins.
    Patch(AddonDescriptor),
    /// The addon is on the account but not desired and not protected.
    Remove(AddonDescriptor),
    /// The surviving addons end up in a different order; carries the full
    /// target key order. Always applied as a whole-collection replace.
    Reorder(Vec<AddonKey>),
    /// Destructive-path marker: the desired list is empty and nothing is
    /// protected, so the whole collection gets wiped. Requires explicit
    /// confirmation before execution.
    RemoveAll,
}

/// How consequential a plan is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Nothing would change.
    NoOp,
    /// Adds, patches, removes or reorders, but not a full wipe.
    Safe,
    /// Wipes the whole collection ([`Operation::RemoveAll`]).
    Destructive,
}

/// The ordered operation list for one user plus the collection to set.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    /// Operations in execution order.
    pub operations: Vec<Operation>,
    /// Outcome classification.
    pub classification: Classification,
    /// The full ordered collection the executor will set. Protected addons
    /// kept from the account sit at the end, after the desired-order block.
    pub target: Vec<AddonDescriptor>,
}

impl Plan {
    /// Returns true if applying the plan would change nothing.
    pub fn is_noop(&self) -> bool {
        self.classification == Classification::NoOp
    }

    /// Returns true if the plan wipes the whole collection.
    pub fn is_destructive(&self) -> bool {
        self.classification == Classification::Destructive
    }

    /// Addons the plan installs.
    pub fn added(&self) -> Vec<AddonDescriptor> {
        self.operations
            .iter()
            .filter_map(|op| match op {
                Operation::Add(d) => Some(d.clone()),
                _ => None,
            })
            .collect()
    }

    /// Addons the plan removes.
    pub fn removed(&self) -> Vec<AddonDescriptor> {
        self.operations
            .iter()
            .filter_map(|op| match op {
                Operation::Remove(d) => Some(d.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns true if the plan reorders surviving addons.
    pub fn reordered(&self) -> bool {
        self.operations
            .iter()
            .any(|op| matches!(op, Operation::Reorder(_)))
    }
}

/// The diff/merge algorithm.
pub struct Reconciler;

impl Reconciler {
    /// Diffs a desired list against the account's actual collection.
    ///
    /// Matching key is the normalized manifest URL. The walk emits
    /// `Keep`/`Patch`/`Add` in desired order; actual entries absent from
    /// `desired` become `Remove` unless their key is in `protected`, in
    /// which case they are silently kept and repositioned after the desired
    /// block. A single trailing `Reorder` is emitted when the surviving
    /// addons change relative order. An empty desired list with nothing
    /// protected collapses to `[RemoveAll]`.
    pub fn diff(
        desired: &[AddonDescriptor],
        actual: &[AddonDescriptor],
        protected: &BTreeSet<AddonKey>,
    ) -> Plan {
        let actual_by_key: HashMap<AddonKey, &AddonDescriptor> =
            actual.iter().map(|d| (d.key(), d)).collect();

        let mut operations = Vec::new();
        let mut target = Vec::new();
        let mut desired_keys = HashSet::new();

        for d in desired {
            let key = d.key();
            if !desired_keys.insert(key.clone()) {
                continue;
            }
            match actual_by_key.get(&key) {
                Some(current) if current.same_config(d) => {
                    operations.push(Operation::Keep(key));
                    target.push((*current).clone());
                }
                Some(_) => {
                    operations.push(Operation::Patch(d.clone()));
                    target.push(d.clone());
                }
                None => {
                    operations.push(Operation::Add(d.clone()));
                    target.push(d.clone());
                }
            }
        }

        let mut kept_protected = Vec::new();
        let mut seen_actual = HashSet::new();
        for current in actual {
            let key = current.key();
            if desired_keys.contains(&key) || !seen_actual.insert(key.clone()) {
                continue;
            }
            if protected.contains(&key) {
                kept_protected.push(current.clone());
            } else {
                operations.push(Operation::Remove(current.clone()));
            }
        }

        if desired.is_empty() && kept_protected.is_empty() && !actual.is_empty() {
            return Plan {
                operations: vec![Operation::RemoveAll],
                classification: Classification::Destructive,
                target: Vec::new(),
            };
        }

        // Reorder detection compares only the desired-order block: keys that
        // survive in both lists, in each list's order. Trailing protected
        // keeps are excluded per contract.
        let head_keys: Vec<AddonKey> = target.iter().map(AddonDescriptor::key).collect();
        let head_set: HashSet<&AddonKey> = head_keys.iter().collect();
        let actual_keys: Vec<AddonKey> = actual.iter().map(AddonDescriptor::key).collect();
        let surviving_actual: Vec<&AddonKey> =
            actual_keys.iter().filter(|k| head_set.contains(k)).collect();
        let target_filtered: Vec<&AddonKey> = head_keys
            .iter()
            .filter(|k| actual_by_key.contains_key(k))
            .collect();
        let reordered = surviving_actual != target_filtered;

        target.extend(kept_protected);

        if reordered {
            operations.push(Operation::Reorder(
                target.iter().map(AddonDescriptor::key).collect(),
            ));
        }

        let classification = if operations
            .iter()
            .all(|op| matches!(op, Operation::Keep(_)))
        {
            Classification::NoOp
        } else {
            Classification::Safe
        };

        Plan {
            operations,
            classification,
            target,
        }
    }
}
