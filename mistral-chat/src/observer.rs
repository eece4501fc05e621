//! Notifications emitted by the chat controller.

use std::sync::Arc;

use mistral_types::Turn;

/// Receives chat controller notifications.
///
/// All methods default to no-ops, so an observer only implements what it
/// needs. Methods are called while the controller holds its state lock and
/// must not call back into the controller.
pub trait ChatObserver: Send + Sync {
    /// A turn was appended to the visible conversation.
    ///
    /// `is_user` is true for the user's own message. An empty assistant turn
    /// announces that a streamed reply has started.
    fn on_turn_added(&self, turn: &Turn, is_user: bool) {
        let _ = (turn, is_user);
    }

    /// The in-progress streamed reply changed. `content` is cumulative.
    fn on_streaming_update(&self, content: &str) {
        let _ = content;
    }

    /// An exchange failed.
    fn on_error(&self, message: &str) {
        let _ = message;
    }
}

/// One controller notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// See [`ChatObserver::on_turn_added`].
    TurnAdded {
        /// The appended turn.
        turn: Turn,
        /// Whether the user wrote it.
        is_user: bool,
    },
    /// See [`ChatObserver::on_streaming_update`].
    StreamingUpdate(String),
    /// See [`ChatObserver::on_error`].
    Error(String),
}

impl ChatEvent {
    /// Deliver this event to `observer`.
    pub fn dispatch(&self, observer: &dyn ChatObserver) {
        match self {
            Self::TurnAdded { turn, is_user } => observer.on_turn_added(turn, *is_user),
            Self::StreamingUpdate(content) => observer.on_streaming_update(content),
            Self::Error(message) => observer.on_error(message),
        }
    }
}

/// Registered observers, notified in registration order.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn ChatObserver>>,
}

impl Observers {
    pub(crate) fn add(&mut self, observer: Arc<dyn ChatObserver>) {
        self.observers.push(observer);
    }

    /// Remove `observer`, matched by pointer identity.
    pub(crate) fn remove(&mut self, observer: &Arc<dyn ChatObserver>) -> bool {
        let before = self.observers.len();
        self.observers.retain(|o| !Arc::ptr_eq(o, observer));
        self.observers.len() != before
    }

    pub(crate) fn clear(&mut self) {
        self.observers.clear();
    }

    pub(crate) fn emit(&self, event: &ChatEvent) {
        for observer in &self.observers {
            event.dispatch(observer.as_ref());
        }
    }
}

/// An observer that records every event, for tests and debugging.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: std::sync::Mutex<Vec<ChatEvent>>,
}

impl RecordingObserver {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of everything recorded so far.
    pub fn events(&self) -> Vec<ChatEvent> {
        self.lock().clone()
    }

    /// Forget everything recorded so far.
    pub fn reset(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ChatEvent>> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn record(&self, event: ChatEvent) {
        self.lock().push(event);
    }
}

impl ChatObserver for RecordingObserver {
    fn on_turn_added(&self, turn: &Turn, is_user: bool) {
        self.record(ChatEvent::TurnAdded {
            turn: turn.clone(),
            is_user,
        });
    }

    fn on_streaming_update(&self, content: &str) {
        self.record(ChatEvent::StreamingUpdate(content.to_string()));
    }

    fn on_error(&self, message: &str) {
        self.record(ChatEvent::Error(message.to_string()));
    }
}
