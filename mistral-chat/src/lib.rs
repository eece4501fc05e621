//! Multi-turn chat sessions over the Mistral chat completions API.
//!
//! [`ChatController`] keeps the conversation history, sends it with each new
//! user message, and reports progress to registered [`ChatObserver`]s.
//! Replies are either buffered or streamed fragment by fragment. History is
//! kept bounded by a [`RetentionPolicy`].

pub mod controller;
pub mod observer;
pub mod retention;

pub use controller::{ChatController, ChatPhase};
pub use observer::{ChatEvent, ChatObserver, RecordingObserver};
pub use retention::RetentionPolicy;
