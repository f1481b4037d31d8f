//! Addon descriptor and manifest fixtures.
//!
//! Descriptors built here are minimal but valid: a catalog/stream addon with
//! one movie catalog, named after its host so failures read well.

use stremsync_model::{AddonDescriptor, AddonKey, CatalogRef};

/// Derives a readable addon name from a manifest URL host.
fn name_for(url: &str) -> String {
    let host = url
        .split("://")
        .nth(1)
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or(url);
    let stem = host.split('.').next().unwrap_or(host);
    let mut chars = stem.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => "Addon".to_string(),
    }
}

/// A standard catalog/stream addon at the given manifest URL.
pub fn addon(url: &str) -> AddonDescriptor {
    AddonDescriptor::new(url, name_for(url), "1.0.0")
        .with_resources(vec!["catalog".into(), "stream".into()])
        .with_catalogs(vec![CatalogRef::new("movie", "top", false)])
}

/// An addon with a specific resource list.
pub fn addon_with_resources(url: &str, resources: &[&str]) -> AddonDescriptor {
    AddonDescriptor::new(url, name_for(url), "1.0.0")
        .with_resources(resources.iter().map(|r| r.to_string()).collect())
        .with_catalogs(vec![CatalogRef::new("movie", "top", false)])
}

/// An addon with a searchable catalog.
pub fn searchable_addon(url: &str) -> AddonDescriptor {
    AddonDescriptor::new(url, name_for(url), "1.0.0")
        .with_resources(vec!["catalog".into()])
        .with_catalogs(vec![CatalogRef::new("movie", "search", true)])
}

/// The keys of a descriptor list, in order.
pub fn keys_of(addons: &[AddonDescriptor]) -> Vec<AddonKey> {
    addons.iter().map(AddonDescriptor::key).collect()
}

/// A raw manifest JSON body for parse tests.
pub fn manifest_json(id: &str, name: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "version": "1.0.0",
        "resources": ["catalog", "stream"],
        "types": ["movie"],
        "catalogs": [{ "type": "movie", "id": "top" }]
    })
}
