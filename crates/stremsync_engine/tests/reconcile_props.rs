//! Property tests for the reconciliation planner.

use proptest::prelude::*;
use std::collections::BTreeSet;
use stremsync_engine::{Operation, Reconciler};
use stremsync_model::{AddonDescriptor, AddonKey};
use stremsync_testkit::generators::{
    addon_list_strategy, protected_subset_strategy, PropTestConfig,
};

type Inputs = (Vec<AddonDescriptor>, Vec<AddonDescriptor>, BTreeSet<AddonKey>);

fn inputs() -> impl Strategy<Value = Inputs> {
    (addon_list_strategy(6), addon_list_strategy(6)).prop_flat_map(|(desired, actual)| {
        let protected = protected_subset_strategy(actual.clone());
        (Just(desired), Just(actual), protected)
    })
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn applying_a_plan_converges((desired, actual, protected) in inputs()) {
        let plan = Reconciler::diff(&desired, &actual, &protected);
        // The plan's target becomes the new actual; replanning finds nothing.
        let replan = Reconciler::diff(&desired, &plan.target, &protected);
        prop_assert!(replan.is_noop(), "second pass was not a no-op: {:?}", replan.operations);
    }

    #[test]
    fn plans_are_deterministic((desired, actual, protected) in inputs()) {
        let first = Reconciler::diff(&desired, &actual, &protected);
        let second = Reconciler::diff(&desired, &actual, &protected);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn protected_addons_always_survive((desired, actual, protected) in inputs()) {
        let plan = Reconciler::diff(&desired, &actual, &protected);

        for op in &plan.operations {
            if let Operation::Remove(d) = op {
                prop_assert!(!protected.contains(&d.key()));
            }
        }

        let target_keys: BTreeSet<AddonKey> =
            plan.target.iter().map(AddonDescriptor::key).collect();
        for d in &actual {
            if protected.contains(&d.key()) {
                prop_assert!(target_keys.contains(&d.key()));
            }
        }
    }

    #[test]
    fn target_leads_with_desired_order((desired, actual, protected) in inputs()) {
        let plan = Reconciler::diff(&desired, &actual, &protected);
        if plan.is_destructive() {
            prop_assert!(plan.target.is_empty());
            return Ok(());
        }

        let desired_keys: Vec<AddonKey> =
            desired.iter().map(AddonDescriptor::key).collect();
        let head: Vec<AddonKey> = plan
            .target
            .iter()
            .take(desired_keys.len())
            .map(AddonDescriptor::key)
            .collect();
        prop_assert_eq!(head, desired_keys);
    }

    #[test]
    fn changes_come_from_the_inputs((desired, actual, protected) in inputs()) {
        let plan = Reconciler::diff(&desired, &actual, &protected);
        let desired_keys: BTreeSet<AddonKey> =
            desired.iter().map(AddonDescriptor::key).collect();
        let actual_keys: BTreeSet<AddonKey> =
            actual.iter().map(AddonDescriptor::key).collect();

        for added in plan.added() {
            prop_assert!(desired_keys.contains(&added.key()));
            prop_assert!(!actual_keys.contains(&added.key()));
        }
        for removed in plan.removed() {
            prop_assert!(actual_keys.contains(&removed.key()));
            prop_assert!(!desired_keys.contains(&removed.key()));
        }
    }

    #[test]
    fn wipes_happen_only_when_nothing_survives((desired, actual, protected) in inputs()) {
        let plan = Reconciler::diff(&desired, &actual, &protected);
        let has_protected_survivor = actual.iter().any(|d| protected.contains(&d.key()));
        let expect_wipe = desired.is_empty() && !actual.is_empty() && !has_protected_survivor;
        prop_assert_eq!(plan.is_destructive(), expect_wipe);
    }
}
