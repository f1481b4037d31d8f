//! Remote account client.
//!
//! [`AccountApi`] is the narrow surface the engine sees of the external
//! service: read/replace the addon collection, create/read a device code.
//! [`HttpAccountClient`] implements it over a pluggable [`HttpClient`] so the
//! actual HTTP library stays out of this crate; [`MockAccountApi`] scripts
//! responses for tests. No business logic lives here.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use stremsync_model::wire::{
    ApiEnvelope, ApiError, CollectionEntry, CollectionGetRequest, CollectionGetResult,
    CollectionSetRequest, CollectionSetResult, LinkCreated, LinkRead, CODE_LINK_NOT_FOUND,
    CODE_PENDING, CODE_SESSION_EXPIRED,
};
use stremsync_model::{AddonDescriptor, AuthKey};

/// A raw HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

/// HTTP client abstraction.
///
/// Implement this to plug in an actual HTTP library (reqwest, hyper, ...).
/// `Err` means the request never produced a response (connect failure,
/// aborted, ...) and is always treated as transient.
pub trait HttpClient: Send + Sync {
    /// Sends a POST with a JSON body and returns the raw response.
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<HttpResponse, String>;
}

/// A freshly created device code/link pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCode {
    /// The short-lived code.
    pub code: String,
    /// URL the user opens to authorize it.
    pub link: String,
}

/// Outcome of one device-code read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCodeStatus {
    /// The user has not authorized the code yet.
    Pending,
    /// The user authorized; here is the credential.
    Ready(AuthKey),
}

/// The remote account surface the engine depends on.
pub trait AccountApi: Send + Sync {
    /// Reads the account's current ordered addon collection.
    async fn fetch_collection(&self, auth: &AuthKey) -> EngineResult<Vec<AddonDescriptor>>;

    /// Replaces the account's whole addon collection with the given order.
    async fn replace_collection(
        &self,
        auth: &AuthKey,
        addons: &[AddonDescriptor],
    ) -> EngineResult<()>;

    /// Creates a device code/link pair.
    async fn create_device_code(&self) -> EngineResult<DeviceCode>;

    /// Reads the state of a device code.
    async fn read_device_code(&self, code: &str) -> EngineResult<DeviceCodeStatus>;
}

/// HTTP implementation of [`AccountApi`].
pub struct HttpAccountClient<C: HttpClient> {
    api_base: String,
    link_base: String,
    client: C,
    config: EngineConfig,
}

impl<C: HttpClient> HttpAccountClient<C> {
    /// Creates a client against the given API and device-link base URLs.
    pub fn new(
        api_base: impl Into<String>,
        link_base: impl Into<String>,
        client: C,
        config: EngineConfig,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            link_base: link_base.into(),
            client,
            config,
        }
    }

    /// Returns the collection API base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> EngineResult<Result<T, ApiError>> {
        let response =
            match tokio::time::timeout(self.config.request_timeout, self.client.post_json(url, body))
                .await
            {
                Ok(result) => result.map_err(EngineError::transient)?,
                Err(_) => {
                    return Err(EngineError::transient(format!("request to {url} timed out")))
                }
            };

        if response.status >= 500 {
            return Err(EngineError::transient(format!(
                "remote answered {} for {url}",
                response.status
            )));
        }
        if response.status == 401 || response.status == 403 {
            return Err(EngineError::AuthExpired(format!(
                "remote answered {} for {url}",
                response.status
            )));
        }

        let envelope: ApiEnvelope<T> = serde_json::from_slice(&response.body)
            .map_err(|e| EngineError::Protocol(format!("undecodable response from {url}: {e}")))?;
        Ok(envelope.into_result())
    }

    fn map_api_error(error: ApiError) -> EngineError {
        if let Some(addon) = error.addon {
            return EngineError::Validation {
                addon,
                message: error.message,
            };
        }
        match error.code {
            CODE_SESSION_EXPIRED => EngineError::AuthExpired(error.message),
            CODE_LINK_NOT_FOUND => EngineError::AuthExpired(error.message),
            _ => EngineError::Protocol(format!("remote error {}: {}", error.code, error.message)),
        }
    }
}

impl<C: HttpClient> AccountApi for HttpAccountClient<C> {
    async fn fetch_collection(&self, auth: &AuthKey) -> EngineResult<Vec<AddonDescriptor>> {
        let url = format!("{}/api/addonCollectionGet", self.api_base);
        let request = CollectionGetRequest {
            auth_key: auth.as_str().to_string(),
            update: true,
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| EngineError::Protocol(e.to_string()))?;

        let result: CollectionGetResult = self
            .post(&url, &body)
            .await?
            .map_err(Self::map_api_error)?;

        result
            .addons
            .iter()
            .map(|entry| {
                entry.to_descriptor().map_err(|e| {
                    EngineError::Protocol(format!(
                        "unusable collection entry {}: {e}",
                        entry.transport_url
                    ))
                })
            })
            .collect()
    }

    async fn replace_collection(
        &self,
        auth: &AuthKey,
        addons: &[AddonDescriptor],
    ) -> EngineResult<()> {
        let url = format!("{}/api/addonCollectionSet", self.api_base);
        let request = CollectionSetRequest {
            auth_key: auth.as_str().to_string(),
            addons: addons.iter().map(CollectionEntry::from_descriptor).collect(),
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| EngineError::Protocol(e.to_string()))?;

        let result: CollectionSetResult = self
            .post(&url, &body)
            .await?
            .map_err(Self::map_api_error)?;

        if result.success {
            Ok(())
        } else {
            Err(EngineError::Protocol("remote refused the collection".into()))
        }
    }

    async fn create_device_code(&self) -> EngineResult<DeviceCode> {
        let url = format!("{}/api/create", self.link_base);
        let body = serde_json::json!({ "type": "Create" });

        let created: LinkCreated = self
            .post(&url, &body)
            .await?
            .map_err(Self::map_api_error)?;

        Ok(DeviceCode {
            code: created.code,
            link: created.link,
        })
    }

    async fn read_device_code(&self, code: &str) -> EngineResult<DeviceCodeStatus> {
        let url = format!("{}/api/read", self.link_base);
        let body = serde_json::json!({ "type": "Read", "code": code });

        match self.post::<LinkRead>(&url, &body).await? {
            Ok(read) => match read.auth_key {
                Some(key) => Ok(DeviceCodeStatus::Ready(AuthKey::new(key))),
                None => Ok(DeviceCodeStatus::Pending),
            },
            // Code 101 is "not yet authorized", not a failure.
            Err(error) if error.code == CODE_PENDING => Ok(DeviceCodeStatus::Pending),
            Err(error) => Err(Self::map_api_error(error)),
        }
    }
}

/// A scripted in-memory [`AccountApi`] for tests.
///
/// Holds the "remote" collection in memory, lets tests inject errors ahead of
/// the next call, and scripts device-code reads.
#[derive(Default)]
pub struct MockAccountApi {
    collection: Mutex<Vec<AddonDescriptor>>,
    fetch_errors: Mutex<VecDeque<EngineError>>,
    replace_errors: Mutex<VecDeque<EngineError>>,
    device_code: Mutex<Option<DeviceCode>>,
    create_error: Mutex<Option<EngineError>>,
    read_script: Mutex<VecDeque<EngineResult<DeviceCodeStatus>>>,
    fetch_calls: AtomicUsize,
    replace_calls: AtomicUsize,
    read_calls: AtomicUsize,
}

impl MockAccountApi {
    /// Creates an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the remote collection.
    pub fn set_collection(&self, addons: Vec<AddonDescriptor>) {
        *self.collection.lock() = addons;
    }

    /// Returns the current remote collection.
    pub fn collection(&self) -> Vec<AddonDescriptor> {
        self.collection.lock().clone()
    }

    /// Queues an error for an upcoming `fetch_collection` call.
    pub fn fail_next_fetch(&self, error: EngineError) {
        self.fetch_errors.lock().push_back(error);
    }

    /// Queues an error for an upcoming `replace_collection` call.
    pub fn fail_next_replace(&self, error: EngineError) {
        self.replace_errors.lock().push_back(error);
    }

    /// Sets the device code returned by `create_device_code`.
    pub fn set_device_code(&self, code: DeviceCode) {
        *self.device_code.lock() = Some(code);
    }

    /// Makes the next `create_device_code` call fail.
    pub fn fail_next_create(&self, error: EngineError) {
        *self.create_error.lock() = Some(error);
    }

    /// Appends a scripted result for `read_device_code`. When the script is
    /// exhausted, reads answer `Pending`.
    pub fn push_read(&self, result: EngineResult<DeviceCodeStatus>) {
        self.read_script.lock().push_back(result);
    }

    /// Number of `replace_collection` calls so far.
    pub fn replace_calls(&self) -> usize {
        self.replace_calls.load(Ordering::SeqCst)
    }

    /// Number of `read_device_code` calls so far.
    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }
}

impl AccountApi for MockAccountApi {
    async fn fetch_collection(&self, _auth: &AuthKey) -> EngineResult<Vec<AddonDescriptor>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.fetch_errors.lock().pop_front() {
            return Err(error);
        }
        Ok(self.collection.lock().clone())
    }

    async fn replace_collection(
        &self,
        _auth: &AuthKey,
        addons: &[AddonDescriptor],
    ) -> EngineResult<()> {
        self.replace_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.replace_errors.lock().pop_front() {
            return Err(error);
        }
        *self.collection.lock() = addons.to_vec();
        Ok(())
    }

    async fn create_device_code(&self) -> EngineResult<DeviceCode> {
        if let Some(error) = self.create_error.lock().take() {
            return Err(error);
        }
        Ok(self.device_code.lock().clone().unwrap_or(DeviceCode {
            code: "0000-TEST".into(),
            link: "https://link.example/0000-TEST".into(),
        }))
    }

    async fn read_device_code(&self, _code: &str) -> EngineResult<DeviceCodeStatus> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        self.read_script
            .lock()
            .pop_front()
            .unwrap_or(Ok(DeviceCodeStatus::Pending))
    }
}
