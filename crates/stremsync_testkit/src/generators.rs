//! Property-based test generators using proptest.
//!
//! Strategies generate descriptor lists that hold the invariants the
//! reconciler assumes: keys are unique within a list and URLs are already
//! normalized.

use proptest::prelude::*;
use std::collections::BTreeSet;
use stremsync_model::{AddonDescriptor, AddonKey, CatalogRef};

/// Strategy for generating manifest URLs.
pub fn manifest_url_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{3,12}")
        .expect("Invalid regex")
        .prop_map(|host| format!("https://{host}.example/manifest.json"))
}

/// Strategy for generating resource lists.
pub fn resources_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::sample::subsequence(
        vec![
            "catalog".to_string(),
            "stream".to_string(),
            "meta".to_string(),
            "subtitles".to_string(),
        ],
        1..=4,
    )
}

/// Strategy for generating a single addon descriptor.
pub fn addon_strategy() -> impl Strategy<Value = AddonDescriptor> {
    (manifest_url_strategy(), resources_strategy(), any::<bool>()).prop_map(
        |(url, resources, search_enabled)| {
            AddonDescriptor::new(&url, "Generated", "1.0.0")
                .with_resources(resources)
                .with_catalogs(vec![CatalogRef::new("movie", "top", search_enabled)])
        },
    )
}

/// Strategy for generating a descriptor list with unique keys.
pub fn addon_list_strategy(max_len: usize) -> impl Strategy<Value = Vec<AddonDescriptor>> {
    prop::collection::vec(addon_strategy(), 0..=max_len).prop_map(|addons| {
        let mut seen = BTreeSet::new();
        addons
            .into_iter()
            .filter(|d| seen.insert(d.key()))
            .collect()
    })
}

/// Strategy for picking a protected-key subset out of a descriptor list.
pub fn protected_subset_strategy(
    addons: Vec<AddonDescriptor>,
) -> impl Strategy<Value = BTreeSet<AddonKey>> {
    let keys: Vec<AddonKey> = addons.iter().map(AddonDescriptor::key).collect();
    prop::sample::subsequence(keys.clone(), 0..=keys.len())
        .prop_map(|subset| subset.into_iter().collect())
}

/// Property test configuration presets.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 512,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
