//! HTTP client for communicating with the management appliance.
//!
//! This module provides the `HardwareClient` trait used by the power task
//! orchestrator, an HTTP implementation, and (behind `test-utils`) an
//! in-memory mock.

use async_trait::async_trait;
use blade_power_core::ServerHardware;
use serde::Deserialize;

use crate::config::ClientConfig;
use crate::error::{PowerError, Result};
use crate::types::RestMethod;

/// Trait for appliance communication.
///
/// This trait abstracts the remote-call capability, allowing for mock
/// implementations in tests.
#[async_trait]
pub trait HardwareClient: Send + Sync {
    /// Perform a raw REST call and return the response body.
    ///
    /// # Errors
    ///
    /// Returns `PowerError::Transport` if the request fails or the appliance
    /// answers with a non-success status.
    async fn rest_call(
        &self,
        method: RestMethod,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> Result<String>;

    /// Look up server hardware by URI.
    ///
    /// # Errors
    ///
    /// Returns `PowerError::Transport` if the call fails and
    /// `PowerError::Decode` if the body is not a hardware resource.
    async fn get_hardware(&self, uri: &str) -> Result<ServerHardware> {
        let data = self.rest_call(RestMethod::Get, uri, None).await?;
        serde_json::from_str(&data).map_err(|e| PowerError::decode(uri, e))
    }
}

/// Error body returned by the appliance.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// HTTP client for the management appliance REST API.
#[derive(Debug, Clone)]
pub struct HttpHardwareClient {
    client: reqwest::Client,
    base_url: String,
    api_version: u32,
    session_token: Option<String>,
}

impl HttpHardwareClient {
    /// Create a new appliance client.
    ///
    /// # Errors
    ///
    /// Returns `PowerError::Internal` if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| PowerError::Internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self::with_client(client, config))
    }

    /// Create a new appliance client with a custom reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version,
            session_token: config.session_token.clone(),
        }
    }

    /// Get the base URL of the appliance.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve a resource URI against the base URL.
    ///
    /// Appliance resources are addressed by paths such as
    /// `/rest/server-hardware/...`; absolute URLs are used as given.
    #[must_use]
    pub fn url_for(&self, uri: &str) -> String {
        if uri.starts_with("http://") || uri.starts_with("https://") {
            uri.to_string()
        } else if uri.starts_with('/') {
            format!("{}{uri}", self.base_url)
        } else {
            format!("{}/{uri}", self.base_url)
        }
    }
}

#[async_trait]
impl HardwareClient for HttpHardwareClient {
    async fn rest_call(
        &self,
        method: RestMethod,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> Result<String> {
        let url = self.url_for(uri);

        let mut request = self
            .client
            .request(method.into(), &url)
            .header("X-API-Version", self.api_version.to_string());
        if let Some(token) = &self.session_token {
            request = request.header("Auth", token);
        }
        if let Some(body) = &body {
            request = request.json(body);
        }

        tracing::debug!(method = %method, url = %url, body = ?body, "Sending appliance request");

        let response = request
            .send()
            .await
            .map_err(|e| PowerError::transport(method, uri, format!("request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PowerError::transport(method, uri, format!("failed to read body: {e}")))?;

        if status.is_success() {
            tracing::debug!(method = %method, url = %url, status = %status, "Appliance request succeeded");
            return Ok(text);
        }

        let message = serde_json::from_str::<ErrorResponse>(&text)
            .ok()
            .and_then(|e| match (e.error_code, e.message) {
                (Some(code), Some(message)) => Some(format!("{code}: {message}")),
                (code, message) => message.or(code),
            })
            .unwrap_or_else(|| format!("appliance returned status {status}"));

        tracing::error!(
            method = %method,
            url = %url,
            status = %status,
            error = %message,
            "Appliance request failed"
        );

        Err(PowerError::Transport {
            method,
            uri: uri.to_string(),
            status: Some(status.as_u16()),
            message,
        })
    }
}

/// A mock appliance for testing without network access.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use std::collections::{HashMap, VecDeque};
    use std::time::Duration;

    use async_trait::async_trait;
    use blade_power_core::ServerHardware;
    use parking_lot::Mutex;

    use super::HardwareClient;
    use crate::error::{PowerError, Result};
    use crate::types::RestMethod;

    /// A call received by the mock.
    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedCall {
        /// HTTP method.
        pub method: RestMethod,
        /// Requested URI.
        pub uri: String,
        /// JSON body, if any.
        pub body: Option<serde_json::Value>,
    }

    #[derive(Debug, Clone)]
    enum Scripted {
        Body(String),
        Failure(String),
    }

    /// A mock appliance that serves hardware from memory and replays
    /// scripted responses.
    ///
    /// A scripted `GET` on a hardware URI takes precedence over the in-memory
    /// hardware map.
    ///
    /// Scripted responses for a `(method, uri)` pair are returned in order;
    /// the last one is repeated once the queue is down to a single entry.
    #[derive(Default)]
    pub struct MockHardwareClient {
        hardware: Mutex<HashMap<String, ServerHardware>>,
        scripts: Mutex<HashMap<(RestMethod, String), VecDeque<Scripted>>>,
        calls: Mutex<Vec<RecordedCall>>,
        latency: Mutex<Option<Duration>>,
    }

    impl MockHardwareClient {
        /// Create a new empty mock.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a mock serving the given hardware.
        #[must_use]
        pub fn with_hardware(hardware: ServerHardware) -> Self {
            let mock = Self::new();
            mock.insert_hardware(hardware);
            mock
        }

        /// Add or replace hardware.
        pub fn insert_hardware(&self, hardware: ServerHardware) {
            self.hardware.lock().insert(hardware.uri.clone(), hardware);
        }

        /// Change the power state string reported for `uri`.
        pub fn set_power_state(&self, uri: &str, power_state: &str) {
            if let Some(hw) = self.hardware.lock().get_mut(uri) {
                hw.power_state = power_state.to_string();
            }
        }

        /// Queue a successful response body.
        pub fn respond(&self, method: RestMethod, uri: &str, body: impl Into<String>) {
            self.push(method, uri, Scripted::Body(body.into()));
        }

        /// Queue a transport failure.
        pub fn fail(&self, method: RestMethod, uri: &str, message: impl Into<String>) {
            self.push(method, uri, Scripted::Failure(message.into()));
        }

        /// Delay every call by `latency`.
        pub fn set_latency(&self, latency: Duration) {
            *self.latency.lock() = Some(latency);
        }

        /// All calls received so far, in order.
        #[must_use]
        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().clone()
        }

        /// Number of calls received for `(method, uri)`.
        #[must_use]
        pub fn call_count(&self, method: RestMethod, uri: &str) -> usize {
            self.calls
                .lock()
                .iter()
                .filter(|c| c.method == method && c.uri == uri)
                .count()
        }

        /// Number of calls received with `method`.
        #[must_use]
        pub fn method_count(&self, method: RestMethod) -> usize {
            self.calls.lock().iter().filter(|c| c.method == method).count()
        }

        fn push(&self, method: RestMethod, uri: &str, response: Scripted) {
            self.scripts
                .lock()
                .entry((method, uri.to_string()))
                .or_default()
                .push_back(response);
        }

        fn next_scripted(&self, method: RestMethod, uri: &str) -> Option<Scripted> {
            let mut scripts = self.scripts.lock();
            let queue = scripts.get_mut(&(method, uri.to_string()))?;
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        }

        async fn record(&self, method: RestMethod, uri: &str, body: Option<serde_json::Value>) {
            self.calls.lock().push(RecordedCall {
                method,
                uri: uri.to_string(),
                body,
            });
            let latency = *self.latency.lock();
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
        }
    }

    #[async_trait]
    impl HardwareClient for MockHardwareClient {
        async fn rest_call(
            &self,
            method: RestMethod,
            uri: &str,
            body: Option<serde_json::Value>,
        ) -> Result<String> {
            self.record(method, uri, body).await;

            match self.next_scripted(method, uri) {
                Some(Scripted::Body(body)) => Ok(body),
                Some(Scripted::Failure(message)) => Err(PowerError::transport(method, uri, message)),
                None => Err(PowerError::Transport {
                    method,
                    uri: uri.to_string(),
                    status: Some(404),
                    message: "no response scripted".to_string(),
                }),
            }
        }

        async fn get_hardware(&self, uri: &str) -> Result<ServerHardware> {
            self.record(RestMethod::Get, uri, None).await;

            match self.next_scripted(RestMethod::Get, uri) {
                Some(Scripted::Failure(message)) => {
                    return Err(PowerError::transport(RestMethod::Get, uri, message));
                }
                Some(Scripted::Body(body)) => {
                    return serde_json::from_str(&body).map_err(|e| PowerError::decode(uri, e));
                }
                None => {}
            }

            self.hardware
                .lock()
                .get(uri)
                .cloned()
                .ok_or_else(|| PowerError::Transport {
                    method: RestMethod::Get,
                    uri: uri.to_string(),
                    status: Some(404),
                    message: "resource not found".to_string(),
                })
        }
    }
}
