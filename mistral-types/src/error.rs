//! Error type shared by the decoder, clients and controller.

/// Result alias used for every fallible operation in the workspace.
///
/// A failure always carries a human-readable message (`Display`), an optional
/// underlying cause ([`std::error::Error::source`]) and, for HTTP failures, the
/// status code ([`ChatError::status_code`]).
pub type Outcome<T> = Result<T, ChatError>;

/// Errors from chat completion operations.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    // Input validation, rejected before any I/O
    /// The user message was empty or whitespace only.
    #[error("message is empty")]
    EmptyMessage,
    /// No API key is configured.
    #[error("API key is not configured")]
    MissingCredential,
    /// The request is malformed (no model, no messages, unknown role, ...).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // Transport failures
    /// Connection-level failure (DNS, TLS, reset, timeout).
    #[error("transport error: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
        /// The underlying transport error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
    /// The endpoint answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body text.
        body: String,
    },
    /// Reading the streaming body failed after the response started.
    #[error("stream error: {0}")]
    Stream(String),

    // Decode failures
    /// The response body could not be decoded as the expected shape.
    #[error("failed to decode response: {source}")]
    Decode {
        /// The JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// The response decoded but contained no choices.
    #[error("no response received from the completion endpoint")]
    EmptyResponse,

    /// No async runtime is available to host a streaming task.
    #[error("no async runtime available: {0}")]
    Runtime(String),
}

impl ChatError {
    /// Build a [`ChatError::Transport`] from a message and an optional cause.
    pub fn transport(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Transport {
            message: message.into(),
            source,
        }
    }

    /// HTTP status code attached to this failure, if it came from a response.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the failure was caught by input validation before any I/O.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyMessage | Self::MissingCredential | Self::InvalidRequest(_)
        )
    }

    /// Whether the failure is likely transient and the request can be retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Stream(_) => true,
            Self::Http { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(source: serde_json::Error) -> Self {
        Self::Decode { source }
    }
}
