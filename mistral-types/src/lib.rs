#![deny(missing_docs)]
//! Shared types for the mistral-chat client engine.
//!
//! This crate holds the plain data model used by every other crate in the
//! workspace:
//!
//! - [`Turn`] and [`Role`]: one message in a conversation
//! - [`CompletionRequest`] and its builder: the outbound request body
//! - [`CompletionResponse`], [`Choice`], [`Usage`]: the buffered response body
//! - [`StreamChunk`]: the payload of one `data:` frame in a streaming response
//! - [`Model`]: catalogue of known model identifiers
//! - [`ChatConfig`]: explicit configuration passed into clients and controllers
//! - [`ChatError`] and [`Outcome`]: the failure taxonomy

pub mod config;
pub mod error;
pub mod model;
pub mod types;

pub use config::*;
pub use error::*;
pub use model::*;
pub use types::*;
