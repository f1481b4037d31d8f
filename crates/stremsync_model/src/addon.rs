//! Addon descriptors and manifest normalization.
//!
//! An [`AddonDescriptor`] is the normalized projection of a Stremio addon
//! manifest that the reconciliation engine operates on. Identity is the
//! manifest URL: a leading `@` is stripped and the `stremio://` scheme is
//! rewritten to `https://` when the descriptor is built, and comparison
//! additionally lowercases the URL (see [`AddonKey`]). The stored URL keeps
//! its original case.

use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalizes a raw manifest URL.
///
/// Strips a single leading `@` and rewrites the `stremio://` scheme to
/// `https://`. Case is preserved; lowercasing happens only in [`AddonKey`].
pub fn normalize_manifest_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('@').unwrap_or(trimmed);
    if let Some(rest) = trimmed.strip_prefix("stremio://") {
        format!("https://{rest}")
    } else {
        trimmed.to_string()
    }
}

/// The comparison key of an addon: its normalized, lowercased manifest URL.
///
/// Two descriptors with the same key describe the same addon, even when the
/// stored URLs differ in case or original scheme.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddonKey(String);

impl AddonKey {
    /// Builds a key from a raw manifest URL.
    pub fn from_url(raw: &str) -> Self {
        Self(normalize_manifest_url(raw).to_ascii_lowercase())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AddonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A reference to one catalog exposed by an addon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRef {
    /// Content type of the catalog (e.g. `movie`, `series`).
    pub kind: String,
    /// Catalog identifier within the addon.
    pub id: String,
    /// Whether the catalog participates in search.
    pub search_enabled: bool,
}

impl CatalogRef {
    /// Creates a catalog reference.
    pub fn new(kind: impl Into<String>, id: impl Into<String>, search_enabled: bool) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            search_enabled,
        }
    }
}

/// The normalized projection of an addon manifest.
///
/// This is the unit the resolver, reconciler and executor all operate on.
/// `resources` and `catalogs` are ordered; their order is part of the
/// configuration and a difference in either is a config change
/// ([`AddonDescriptor::same_config`]), not a different addon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonDescriptor {
    /// Normalized manifest URL (identity, see module docs).
    pub manifest_url: String,
    /// Human-readable addon name.
    pub name: String,
    /// Addon version string.
    pub version: String,
    /// Capability tags (e.g. `catalog`, `stream`, `subtitles`), ordered.
    pub resources: Vec<String>,
    /// Catalogs exposed by the addon, ordered.
    pub catalogs: Vec<CatalogRef>,
    /// Optional icon URL.
    pub icon_url: Option<String>,
}

impl AddonDescriptor {
    /// Creates a descriptor, normalizing the manifest URL.
    pub fn new(manifest_url: &str, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            manifest_url: normalize_manifest_url(manifest_url),
            name: name.into(),
            version: version.into(),
            resources: Vec::new(),
            catalogs: Vec::new(),
            icon_url: None,
        }
    }

    /// Sets the resource tags.
    pub fn with_resources(mut self, resources: Vec<String>) -> Self {
        self.resources = resources;
        self
    }

    /// Sets the catalogs.
    pub fn with_catalogs(mut self, catalogs: Vec<CatalogRef>) -> Self {
        self.catalogs = catalogs;
        self
    }

    /// Sets the icon URL.
    pub fn with_icon(mut self, icon_url: impl Into<String>) -> Self {
        self.icon_url = Some(icon_url.into());
        self
    }

    /// Returns the comparison key for this descriptor.
    pub fn key(&self) -> AddonKey {
        AddonKey::from_url(&self.manifest_url)
    }

    /// Returns true if both descriptors carry the same resource/catalog
    /// configuration.
    ///
    /// Name, version and icon changes do not affect reconciliation; a config
    /// difference under the same key is a patch, not an add+remove.
    pub fn same_config(&self, other: &Self) -> bool {
        self.resources == other.resources && self.catalogs == other.catalogs
    }

    /// Builds a descriptor from a parsed manifest and the URL it was
    /// fetched from.
    pub fn from_manifest(manifest_url: &str, manifest: &Manifest) -> ModelResult<Self> {
        if manifest_url.trim().is_empty() {
            return Err(ModelError::ManifestUrl(manifest_url.to_string()));
        }
        if manifest.id.is_empty() {
            return Err(ModelError::Manifest("missing id".into()));
        }

        let resources = manifest
            .resources
            .iter()
            .map(|r| r.name().to_string())
            .collect();

        let catalogs = manifest
            .catalogs
            .iter()
            .map(|c| CatalogRef::new(c.kind.clone(), c.id.clone(), c.supports_search()))
            .collect();

        Ok(Self {
            manifest_url: normalize_manifest_url(manifest_url),
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            resources,
            catalogs,
            icon_url: manifest.logo.clone(),
        })
    }
}

/// A Stremio addon manifest, as served at the manifest URL.
///
/// Only the fields the sync engine cares about are modeled; unknown fields
/// are ignored on deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Addon identifier chosen by the addon author.
    pub id: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Version string.
    #[serde(default)]
    pub version: String,
    /// Resources the addon serves. Either plain strings or objects with a
    /// `name` field; both forms appear in the wild.
    #[serde(default)]
    pub resources: Vec<ManifestResource>,
    /// Catalogs the addon exposes.
    #[serde(default)]
    pub catalogs: Vec<ManifestCatalog>,
    /// Optional logo URL.
    #[serde(default)]
    pub logo: Option<String>,
}

impl Manifest {
    /// Parses a manifest from raw JSON bytes.
    pub fn from_json(bytes: &[u8]) -> ModelResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// A resource entry in a manifest: a bare name or a full object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ManifestResource {
    /// Plain resource name, e.g. `"stream"`.
    Name(String),
    /// Object form, e.g. `{"name": "stream", "types": ["movie"]}`.
    Full {
        /// Resource name.
        name: String,
        /// Content types the resource covers.
        #[serde(default)]
        types: Vec<String>,
    },
}

impl ManifestResource {
    /// Returns the resource name regardless of form.
    pub fn name(&self) -> &str {
        match self {
            ManifestResource::Name(name) => name,
            ManifestResource::Full { name, .. } => name,
        }
    }
}

/// A catalog entry in a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestCatalog {
    /// Content type of the catalog.
    #[serde(rename = "type")]
    pub kind: String,
    /// Catalog identifier.
    pub id: String,
    /// Optional display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Extra properties the catalog supports (search, genre filters, ...).
    #[serde(default)]
    pub extra: Vec<ExtraProp>,
    /// Legacy flat form of `extra`, a bare list of property names.
    #[serde(default, rename = "extraSupported")]
    pub extra_supported: Vec<String>,
}

impl ManifestCatalog {
    /// Returns true if the catalog declares search support through either
    /// the `extra` array or the legacy `extraSupported` list.
    ///
    /// This is the pure normalization step that replaces the synthetic
    /// "search" resource toggling the source did in UI handlers.
    pub fn supports_search(&self) -> bool {
        self.extra.iter().any(|e| e.name == "search")
            || self.extra_supported.iter().any(|name| name == "search")
    }
}

/// An entry in a catalog's `extra` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraProp {
    /// Property name, e.g. `search` or `genre`.
    pub name: String,
    /// Whether the property must be supplied on every request.
    #[serde(default, rename = "isRequired")]
    pub is_required: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_normalization() {
        assert_eq!(
            normalize_manifest_url("@https://example.com/manifest.json"),
            "https://example.com/manifest.json"
        );
        assert_eq!(
            normalize_manifest_url("stremio://example.com/manifest.json"),
            "https://example.com/manifest.json"
        );
        assert_eq!(
            normalize_manifest_url("  https://example.com/manifest.json "),
            "https://example.com/manifest.json"
        );
        // Case is preserved on the stored URL.
        assert_eq!(
            normalize_manifest_url("https://Example.com/Manifest.json"),
            "https://Example.com/Manifest.json"
        );
    }

    #[test]
    fn keys_compare_case_insensitively() {
        let a = AddonKey::from_url("https://Example.com/manifest.json");
        let b = AddonKey::from_url("stremio://example.com/manifest.json");
        let c = AddonKey::from_url("@https://EXAMPLE.com/manifest.json");
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.as_str(), "https://example.com/manifest.json");
    }

    #[test]
    fn descriptor_identity_and_config() {
        let a = AddonDescriptor::new("https://a.example/manifest.json", "Cinemeta", "3.0.0")
            .with_resources(vec!["catalog".into(), "meta".into()]);
        let b = AddonDescriptor::new("stremio://a.example/manifest.json", "Cinemeta", "3.0.1")
            .with_resources(vec!["catalog".into(), "meta".into()]);

        assert_eq!(a.key(), b.key());
        // Version differs but config matches: not a patch.
        assert!(a.same_config(&b));

        let c = b.clone().with_resources(vec!["catalog".into()]);
        assert!(!a.same_config(&c));
    }

    #[test]
    fn manifest_parse_mixed_resources() {
        let json = br#"{
            "id": "org.example.addon",
            "name": "Example",
            "version": "1.2.3",
            "resources": [
                "catalog",
                {"name": "stream", "types": ["movie", "series"]}
            ],
            "catalogs": [
                {"type": "movie", "id": "top", "extra": [{"name": "search"}]},
                {"type": "series", "id": "top"}
            ],
            "logo": "https://example.com/logo.png",
            "behaviorHints": {"configurable": true}
        }"#;

        let manifest = Manifest::from_json(json).unwrap();
        let descriptor =
            AddonDescriptor::from_manifest("@stremio://example.com/manifest.json", &manifest)
                .unwrap();

        assert_eq!(descriptor.manifest_url, "https://example.com/manifest.json");
        assert_eq!(descriptor.resources, vec!["catalog", "stream"]);
        assert_eq!(descriptor.catalogs.len(), 2);
        assert!(descriptor.catalogs[0].search_enabled);
        assert!(!descriptor.catalogs[1].search_enabled);
        assert_eq!(
            descriptor.icon_url.as_deref(),
            Some("https://example.com/logo.png")
        );
    }

    #[test]
    fn manifest_search_via_extra_supported() {
        let json = br#"{
            "id": "org.example.legacy",
            "name": "Legacy",
            "version": "0.1.0",
            "catalogs": [
                {"type": "movie", "id": "all", "extraSupported": ["search", "genre"]}
            ]
        }"#;

        let manifest = Manifest::from_json(json).unwrap();
        assert!(manifest.catalogs[0].supports_search());
    }

    #[test]
    fn manifest_missing_id_rejected() {
        let json = br#"{"id": "", "name": "Broken", "version": "1.0.0"}"#;
        let manifest = Manifest::from_json(json).unwrap();
        let err = AddonDescriptor::from_manifest("https://x.example/manifest.json", &manifest);
        assert!(matches!(err, Err(ModelError::Manifest(_))));
    }

    #[test]
    fn malformed_manifest_json() {
        let err = Manifest::from_json(b"not json");
        assert!(matches!(err, Err(ModelError::Manifest(_))));
    }
}
