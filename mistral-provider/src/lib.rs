//! Completion transport and clients for the Mistral chat completions API.
//!
//! The engine talks to the network only through the [`Transport`] trait.
//! [`HttpTransport`] is the reqwest-backed implementation; tests substitute
//! their own.
//!
//! # Usage
//!
//! ```no_run
//! use mistral_provider::{CompletionClient, HttpTransport};
//! use mistral_types::{CompletionRequest, Model, Turn};
//!
//! # async fn run() -> mistral_types::Outcome<()> {
//! let client = CompletionClient::new(HttpTransport::new(), "sk-...");
//! let request = CompletionRequest::builder()
//!     .model(Model::MistralSmall)
//!     .messages(vec![Turn::user("Hello")])
//!     .build();
//! let response = client.complete(&request).await?;
//! println!("{:?}", response.first_message());
//! # Ok(())
//! # }
//! ```
//!
//! # Components
//!
//! - [`SseDecoder`]: incremental `data:` line decoder, robust to arbitrary
//!   chunk boundaries
//! - [`StreamingSession`]: one cancellable streaming exchange at a time,
//!   reported through callbacks
//! - [`CompletionClient`]: single request/response exchange
//! - Error mapping from HTTP status codes and reqwest failures to [`ChatError`]

pub mod client;
pub mod completion;
pub(crate) mod error;
pub mod session;
pub mod sse;
pub mod transport;

pub use client::HttpTransport;
pub use completion::CompletionClient;
pub use session::{StreamCallbacks, StreamingSession};
pub use sse::{SseDecoder, SseFrame};
pub use transport::{ByteStream, Transport};

// Re-export mistral-types for convenience
pub use mistral_types::{ChatError, CompletionRequest, CompletionResponse, Outcome};
