//! Internal error helpers for mapping HTTP/reqwest errors to [`ChatError`].

use mistral_types::ChatError;

/// Map a non-success HTTP status and its body text to a [`ChatError`].
pub(crate) fn map_http_status(status: reqwest::StatusCode, body: &str) -> ChatError {
    ChatError::Http {
        status: status.as_u16(),
        body: body.to_string(),
    }
}

/// Map a [`reqwest::Error`] raised while connecting or sending.
pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ChatError {
    let message = if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "connection failed".to_string()
    } else {
        err.to_string()
    };
    ChatError::transport(message, Some(Box::new(err)))
}

/// Map a [`reqwest::Error`] raised while reading an already-started body.
pub(crate) fn map_body_error(err: reqwest::Error) -> ChatError {
    ChatError::Stream(format!("stream read error: {err}"))
}
