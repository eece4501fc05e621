//! Single request/response exchange.

use std::sync::Arc;

use mistral_types::{ChatError, CompletionRequest, CompletionResponse, Outcome};

use crate::transport::Transport;

/// Buffered completion client.
///
/// Every failure comes back as an `Err`; the client never panics and never
/// returns an empty success.
pub struct CompletionClient<T: Transport> {
    transport: Arc<T>,
    api_key: String,
}

impl<T: Transport> CompletionClient<T> {
    /// Create a client over `transport` authenticating with `api_key`.
    pub fn new(transport: T, api_key: impl Into<String>) -> Self {
        Self::with_shared(Arc::new(transport), api_key)
    }

    /// Create a client over a transport shared with other clients.
    pub fn with_shared(transport: Arc<T>, api_key: impl Into<String>) -> Self {
        Self {
            transport,
            api_key: api_key.into(),
        }
    }

    /// Send `request` and wait for the whole response.
    ///
    /// The outgoing request always has `stream` cleared. A blank API key or
    /// an invalid request fails before any I/O.
    pub async fn complete(&self, request: &CompletionRequest) -> Outcome<CompletionResponse> {
        let api_key = self.api_key.trim();
        if api_key.is_empty() {
            return Err(ChatError::MissingCredential);
        }
        request.validate()?;

        let request = request.clone().with_stream(false);
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            "requesting buffered completion"
        );

        match self.transport.send(&request, api_key).await {
            Ok(response) => {
                tracing::debug!(
                    id = %response.id,
                    choices = response.choices.len(),
                    "buffered completion received"
                );
                Ok(response)
            }
            Err(err) => {
                tracing::warn!(error = %err, "buffered completion failed");
                Err(err)
            }
        }
    }
}

impl<T: Transport> std::fmt::Debug for CompletionClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}
