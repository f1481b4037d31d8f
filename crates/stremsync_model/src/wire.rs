//! JSON payloads of the two external APIs.
//!
//! The addon-collection API and the device-link API both answer with an
//! envelope carrying either a `result` or an `error` object. The device-link
//! read endpoint reports "still pending" as error code [`CODE_PENDING`],
//! which is not a failure and must never be surfaced as one.

use crate::addon::{AddonDescriptor, ExtraProp, Manifest, ManifestCatalog, ManifestResource};
use crate::error::ModelResult;
use serde::{Deserialize, Serialize};

/// Remote error code meaning "link not yet authorized, keep polling".
pub const CODE_PENDING: i64 = 101;

/// Remote error code meaning the device code is unknown or spent.
pub const CODE_LINK_NOT_FOUND: i64 = 102;

/// Remote error code meaning the presented credential is no longer valid.
pub const CODE_SESSION_EXPIRED: i64 = 1;

/// Error object of a remote envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Numeric error code.
    pub code: i64,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Manifest URL of the offending addon, when the remote rejected one
    /// addon out of a submitted collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addon: Option<String>,
}

/// Envelope wrapping every remote response.
///
/// `Option` fields deserialize as `None` when absent without a `default`
/// attribute; adding one would demand `T: Default` of every payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    /// Present on failure (and for the pending pseudo-error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl<T> ApiEnvelope<T> {
    /// Unwraps the envelope into a result.
    pub fn into_result(self) -> Result<T, ApiError> {
        match (self.result, self.error) {
            (Some(result), _) => Ok(result),
            (None, Some(error)) => Err(error),
            (None, None) => Err(ApiError {
                code: 0,
                message: "empty envelope".into(),
                addon: None,
            }),
        }
    }
}

/// Request body for reading the account's addon collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionGetRequest {
    /// Bearer credential.
    pub auth_key: String,
    /// Ask the remote to refresh cached manifests before answering.
    pub update: bool,
}

/// Result body of a collection read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionGetResult {
    /// Ordered collection entries.
    pub addons: Vec<CollectionEntry>,
}

/// Request body for replacing the whole addon collection.
///
/// The remote has no incremental add/remove primitive; the ordered list sent
/// here becomes the account's collection verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSetRequest {
    /// Bearer credential.
    pub auth_key: String,
    /// The full ordered collection.
    pub addons: Vec<CollectionEntry>,
}

/// Result body of a collection replace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSetResult {
    /// Whether the remote accepted the collection.
    pub success: bool,
}

/// One addon entry as the collection API represents it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionEntry {
    /// Manifest URL the remote fetched the addon from.
    pub transport_url: String,
    /// The manifest as the remote last saw it.
    pub manifest: Manifest,
}

impl CollectionEntry {
    /// Projects the entry into the descriptor the engine operates on.
    pub fn to_descriptor(&self) -> ModelResult<AddonDescriptor> {
        AddonDescriptor::from_manifest(&self.transport_url, &self.manifest)
    }

    /// Builds an entry from a descriptor for a collection replace.
    pub fn from_descriptor(descriptor: &AddonDescriptor) -> Self {
        let resources = descriptor
            .resources
            .iter()
            .map(|name| ManifestResource::Name(name.clone()))
            .collect();

        let catalogs = descriptor
            .catalogs
            .iter()
            .map(|c| ManifestCatalog {
                kind: c.kind.clone(),
                id: c.id.clone(),
                name: None,
                extra: if c.search_enabled {
                    vec![ExtraProp {
                        name: "search".into(),
                        is_required: false,
                    }]
                } else {
                    Vec::new()
                },
                extra_supported: Vec::new(),
            })
            .collect();

        Self {
            transport_url: descriptor.manifest_url.clone(),
            manifest: Manifest {
                id: descriptor.key().as_str().to_string(),
                name: descriptor.name.clone(),
                version: descriptor.version.clone(),
                resources,
                catalogs,
                logo: descriptor.icon_url.clone(),
            },
        }
    }
}

/// Result body of a device-link creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkCreated {
    /// Short-lived device code.
    pub code: String,
    /// URL the user opens to authorize the code.
    pub link: String,
}

/// Result body of a device-link read.
///
/// `auth_key` is absent while the user has not finished authorizing; the
/// remote usually signals that through the [`CODE_PENDING`] error instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRead {
    /// The credential, once the user authorized the code.
    #[serde(default)]
    pub auth_key: Option<String>,
}
