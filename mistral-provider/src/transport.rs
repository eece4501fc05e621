//! The network seam used by the streaming session and the buffered client.
//!
//! The [`Transport`] trait uses RPITIT and is not object-safe. Sessions,
//! clients and controllers are generic over it instead.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;
use mistral_types::{CompletionRequest, CompletionResponse, Outcome};

/// Raw response body of a streaming exchange, delivered in arbitrary chunks.
///
/// A chunk boundary may fall anywhere, including inside a line or a
/// multi-byte character. A read failure mid-body is an `Err` item.
pub type ByteStream = Pin<Box<dyn Stream<Item = Outcome<Bytes>> + Send>>;

/// Something that can carry a completion request to the endpoint.
///
/// Implementations are handed requests that have already been validated,
/// with the `stream` flag set to match the method called.
pub trait Transport: Send + Sync + 'static {
    /// Perform one buffered exchange and decode the response body.
    ///
    /// Connection faults map to [`ChatError::Transport`], non-success
    /// statuses to [`ChatError::Http`] and undecodable bodies to
    /// [`ChatError::Decode`].
    ///
    /// [`ChatError::Transport`]: mistral_types::ChatError::Transport
    /// [`ChatError::Http`]: mistral_types::ChatError::Http
    /// [`ChatError::Decode`]: mistral_types::ChatError::Decode
    fn send(
        &self,
        request: &CompletionRequest,
        api_key: &str,
    ) -> impl Future<Output = Outcome<CompletionResponse>> + Send;

    /// Open a streaming exchange and return its body as a byte stream.
    ///
    /// Fails before yielding a stream when the connection cannot be made or
    /// the endpoint answers with a non-success status.
    fn open_stream(
        &self,
        request: &CompletionRequest,
        api_key: &str,
    ) -> impl Future<Output = Outcome<ByteStream>> + Send;
}
