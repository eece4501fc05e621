//! reqwest-backed [`Transport`] for the chat completions endpoint.

use std::future::Future;

use futures::{StreamExt, TryStreamExt};
use mistral_types::{ChatConfig, CompletionRequest, CompletionResponse, Outcome};

use crate::error::{map_body_error, map_http_status, map_reqwest_error};
use crate::transport::{ByteStream, Transport};

/// Default Mistral API base URL.
const DEFAULT_BASE_URL: &str = mistral_types::config::DEFAULT_BASE_URL;

/// HTTP transport for the Mistral Chat Completions API.
///
/// # Example
///
/// ```no_run
/// use mistral_provider::HttpTransport;
///
/// let transport = HttpTransport::new()
///     .base_url("https://api.mistral.ai")
///     .with_client(reqwest::Client::new());
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// API base URL (override for testing or proxies).
    pub(crate) base_url: String,
    /// Shared HTTP client.
    pub(crate) client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport pointed at the public API with a default client.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Create a transport using the base URL from a [`ChatConfig`].
    pub fn from_config(config: &ChatConfig) -> Self {
        Self::new().base_url(config.base_url.clone())
    }

    /// Override the API base URL. A trailing slash is ignored.
    ///
    /// Useful for testing with a local mock server or an API proxy.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        let url: String = url.into();
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Use a preconfigured HTTP client (timeouts, proxies, pooling).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Build the chat completions endpoint URL.
    pub(crate) fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn post(&self, request: &CompletionRequest, api_key: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.completions_url())
            .bearer_auth(api_key)
            .header("content-type", "application/json")
            .json(request)
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn send(
        &self,
        request: &CompletionRequest,
        api_key: &str,
    ) -> impl Future<Output = Outcome<CompletionResponse>> + Send {
        let url = self.completions_url();
        let builder = self.post(request, api_key);
        let model = request.model.clone();

        async move {
            tracing::debug!(url = %url, model = %model, "sending completion request");

            let response = builder.send().await.map_err(map_reqwest_error)?;
            let status = response.status();
            let body = response.text().await.map_err(map_reqwest_error)?;

            if !status.is_success() {
                tracing::warn!(status = status.as_u16(), "completion request rejected");
                return Err(map_http_status(status, &body));
            }

            Ok(serde_json::from_str::<CompletionResponse>(&body)?)
        }
    }

    fn open_stream(
        &self,
        request: &CompletionRequest,
        api_key: &str,
    ) -> impl Future<Output = Outcome<ByteStream>> + Send {
        let url = self.completions_url();
        let builder = self
            .post(request, api_key)
            .header("accept", "text/event-stream");
        let model = request.model.clone();

        async move {
            tracing::debug!(url = %url, model = %model, "opening completion stream");

            let response = builder.send().await.map_err(map_reqwest_error)?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.map_err(map_reqwest_error)?;
                tracing::warn!(status = status.as_u16(), "completion stream rejected");
                return Err(map_http_status(status, &body));
            }

            let body: ByteStream = response.bytes_stream().map_err(map_body_error).boxed();
            Ok(body)
        }
    }
}
