//! The chat session state machine.
//!
//! A [`ChatController`] owns the conversation history and drives one
//! exchange at a time, either buffered or streamed. Each `send` supersedes
//! whatever exchange was in flight: results that arrive for an older send
//! are dropped without touching history or notifying observers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mistral_provider::{
    CompletionClient, HttpTransport, StreamCallbacks, StreamingSession, Transport,
};
use mistral_types::{
    ChatConfig, ChatError, CompletionRequest, CompletionResponse, Outcome, Turn,
};
use tokio::sync::watch;

use crate::observer::{ChatEvent, ChatObserver, Observers};
use crate::retention::RetentionPolicy;

/// Where the controller is in an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatPhase {
    /// No exchange in flight.
    #[default]
    Idle,
    /// A request has been sent and its reply has not finished.
    AwaitingResponse,
}

struct State {
    history: Vec<Turn>,
    observers: Observers,
    /// Bumped by every send, cancel and dispose. Callbacks carry the value
    /// current when their exchange started.
    generation: u64,
    /// Cumulative text of the streamed reply in progress.
    pending: String,
    disposed: bool,
}

/// State reachable from streaming callbacks running on the runtime.
struct Shared {
    state: Mutex<State>,
    phase: watch::Sender<ChatPhase>,
    retention: RetentionPolicy,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the state only if `generation` is still the current exchange.
    fn lock_current(&self, generation: u64) -> Option<MutexGuard<'_, State>> {
        let state = self.lock();
        if state.disposed || state.generation != generation {
            tracing::debug!(generation, current = state.generation, "discarding stale result");
            return None;
        }
        Some(state)
    }

    fn set_phase(&self, phase: ChatPhase) {
        self.phase.send_replace(phase);
    }

    fn commit(&self, state: &mut State, turn: Turn) {
        state.history.push(turn);
        let removed = self.retention.apply(&mut state.history);
        if removed > 0 {
            tracing::debug!(removed, kept = state.history.len(), "trimmed history");
        }
    }

    fn on_fragment(&self, generation: u64, fragment: &str) {
        let Some(mut state) = self.lock_current(generation) else {
            return;
        };
        state.pending.push_str(fragment);
        let update = ChatEvent::StreamingUpdate(state.pending.clone());
        state.observers.emit(&update);
    }

    fn on_stream_complete(&self, generation: u64) {
        let Some(mut state) = self.lock_current(generation) else {
            return;
        };
        let content = std::mem::take(&mut state.pending);
        tracing::debug!(chars = content.len(), "streamed reply committed");
        self.commit(&mut state, Turn::assistant(content));
        self.set_phase(ChatPhase::Idle);
    }

    fn on_stream_error(&self, generation: u64, err: &ChatError) {
        let Some(mut state) = self.lock_current(generation) else {
            return;
        };
        let message = err.to_string();
        let mut content = std::mem::take(&mut state.pending);
        content.push_str("Error: ");
        content.push_str(&message);
        state.observers.emit(&ChatEvent::StreamingUpdate(content));
        state.observers.emit(&ChatEvent::Error(message));
        self.set_phase(ChatPhase::Idle);
    }

    fn on_buffered_reply(&self, generation: u64, outcome: Outcome<CompletionResponse>) {
        let Some(mut state) = self.lock_current(generation) else {
            return;
        };
        let reply = outcome.and_then(|response| {
            response
                .first_message()
                .map(|message| Turn::assistant(message.content.clone()))
                .ok_or(ChatError::EmptyResponse)
        });
        match reply {
            Ok(turn) => {
                self.commit(&mut state, turn.clone());
                state.observers.emit(&ChatEvent::TurnAdded {
                    turn,
                    is_user: false,
                });
            }
            Err(err) => {
                tracing::warn!(error = %err, "buffered exchange failed");
                state.observers.emit(&ChatEvent::Error(err.to_string()));
            }
        }
        self.set_phase(ChatPhase::Idle);
    }
}

/// Drives a multi-turn conversation against the completion endpoint.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use mistral_chat::{ChatController, RecordingObserver};
/// use mistral_types::{ChatConfig, Model};
///
/// # async fn run() {
/// let controller = ChatController::http(ChatConfig::from_env());
/// let recorder = Arc::new(RecordingObserver::new());
/// controller.subscribe(recorder.clone());
/// controller.send("Hello", Model::MistralSmall, false).await;
/// println!("{:?}", controller.history());
/// # }
/// ```
pub struct ChatController<T: Transport> {
    config: ChatConfig,
    shared: Arc<Shared>,
    client: CompletionClient<T>,
    session: Mutex<StreamingSession<T>>,
}

impl ChatController<HttpTransport> {
    /// A controller talking HTTP to `config.base_url`.
    pub fn http(config: ChatConfig) -> Self {
        let transport = HttpTransport::from_config(&config);
        Self::new(config, transport)
    }
}

impl<T: Transport> ChatController<T> {
    /// Create an idle controller with empty history.
    pub fn new(config: ChatConfig, transport: T) -> Self {
        let retention = RetentionPolicy::from_config(&config);
        if !retention.is_valid() {
            tracing::warn!(
                max_messages = retention.max_messages,
                trim_to = retention.trim_to,
                "history trim count exceeds the cap; trimming to the cap instead"
            );
        }
        let transport = Arc::new(transport);
        let api_key = config.api_key().unwrap_or_default().to_string();
        let (phase, _) = watch::channel(ChatPhase::Idle);

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    history: Vec::new(),
                    observers: Observers::default(),
                    generation: 0,
                    pending: String::new(),
                    disposed: false,
                }),
                phase,
                retention,
            }),
            client: CompletionClient::with_shared(Arc::clone(&transport), api_key),
            session: Mutex::new(StreamingSession::with_shared(transport)),
            config,
        }
    }

    /// Register an observer. Observers are notified in registration order.
    pub fn subscribe(&self, observer: Arc<dyn ChatObserver>) {
        let mut state = self.shared.lock();
        if !state.disposed {
            state.observers.add(observer);
        }
    }

    /// Detach a previously registered observer. Returns whether it was found.
    pub fn unsubscribe(&self, observer: &Arc<dyn ChatObserver>) -> bool {
        self.shared.lock().observers.remove(observer)
    }

    /// Send a user message and obtain the assistant's reply.
    ///
    /// Blank input is ignored. The user turn is appended and announced
    /// before anything is sent. In buffered mode this resolves once the
    /// reply has been committed or the failure reported. In streaming mode
    /// it resolves as soon as the stream has started; the reply is
    /// delivered through [`ChatObserver::on_streaming_update`] and
    /// committed when the stream completes.
    pub async fn send(&self, text: &str, model: impl Into<String>, streaming: bool) {
        if text.trim().is_empty() {
            tracing::debug!("ignoring blank message");
            return;
        }

        // The session lock is held from the generation bump until the new
        // exchange owns the session, so concurrent sends cannot reorder.
        let (generation, request) = {
            let mut session = self.lock_session();
            let Some((generation, request)) = self.begin_exchange(text, model, streaming) else {
                return;
            };
            tracing::debug!(
                generation,
                model = %request.model,
                messages = request.messages.len(),
                streaming,
                "sending message"
            );
            if streaming {
                self.start_stream(&mut session, generation, &request);
                return;
            }
            session.cancel();
            (generation, request)
        };

        let outcome = self.client.complete(&request).await;
        self.shared.on_buffered_reply(generation, outcome);
    }

    /// Bump the generation, commit the user turn and build the request.
    fn begin_exchange(
        &self,
        text: &str,
        model: impl Into<String>,
        streaming: bool,
    ) -> Option<(u64, CompletionRequest)> {
        let mut state = self.shared.lock();
        if state.disposed {
            return None;
        }
        state.generation += 1;
        state.pending.clear();

        let turn = Turn::user(text);
        self.shared.commit(&mut state, turn.clone());
        state.observers.emit(&ChatEvent::TurnAdded {
            turn,
            is_user: true,
        });

        let request = CompletionRequest::builder()
            .model(model)
            .messages(state.history.clone())
            .temperature(self.config.temperature)
            .max_tokens(self.config.max_tokens)
            .top_p(self.config.top_p)
            .safe_prompt(self.config.safe_prompt)
            .stream(streaming)
            .build();

        if streaming {
            state.observers.emit(&ChatEvent::TurnAdded {
                turn: Turn::placeholder(),
                is_user: false,
            });
        }
        self.shared.set_phase(ChatPhase::AwaitingResponse);
        Some((state.generation, request))
    }

    /// Start the stream for `generation`. The state lock must not be held:
    /// a request rejected up front reports through `on_error` synchronously.
    fn start_stream(
        &self,
        session: &mut StreamingSession<T>,
        generation: u64,
        request: &CompletionRequest,
    ) {
        let on_fragment = {
            let shared = Arc::clone(&self.shared);
            move |fragment: String| shared.on_fragment(generation, &fragment)
        };
        let on_error = {
            let shared = Arc::clone(&self.shared);
            move |err: ChatError| shared.on_stream_error(generation, &err)
        };
        let on_complete = {
            let shared = Arc::clone(&self.shared);
            move || shared.on_stream_complete(generation)
        };
        let callbacks = StreamCallbacks::new(on_fragment)
            .on_error(on_error)
            .on_complete(on_complete);

        let api_key = self.config.api_key().unwrap_or_default();
        session.start(request, api_key, callbacks);
    }

    /// Abandon the exchange in flight, if any, and return to idle.
    ///
    /// Nothing is committed and no notification is emitted for it.
    pub fn cancel(&self) {
        let mut session = self.lock_session();
        {
            let mut state = self.shared.lock();
            if state.disposed {
                return;
            }
            state.generation += 1;
            state.pending.clear();
        }
        session.cancel();
        self.shared.set_phase(ChatPhase::Idle);
    }

    /// Empty the conversation history. An exchange in flight is unaffected.
    pub fn clear(&self) {
        let mut state = self.shared.lock();
        if !state.disposed {
            state.history.clear();
        }
    }

    /// Cancel any exchange, clear history and detach all observers.
    ///
    /// Idempotent. Every later call on the controller is a no-op.
    pub fn dispose(&self) {
        let mut session = self.lock_session();
        {
            let mut state = self.shared.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.generation += 1;
            state.history.clear();
            state.pending.clear();
            state.observers.clear();
        }
        session.cancel();
        self.shared.set_phase(ChatPhase::Idle);
        tracing::debug!("chat controller disposed");
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.shared.lock().disposed
    }

    /// A snapshot of the conversation history, oldest first.
    pub fn history(&self) -> Vec<Turn> {
        self.shared.lock().history.clone()
    }

    /// Number of turns in the history.
    pub fn history_len(&self) -> usize {
        self.shared.lock().history.len()
    }

    /// The current phase.
    pub fn phase(&self) -> ChatPhase {
        *self.shared.phase.borrow()
    }

    /// A receiver that observes every phase change.
    pub fn watch_phase(&self) -> watch::Receiver<ChatPhase> {
        self.shared.phase.subscribe()
    }

    /// The configuration this controller was built with.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    fn lock_session(&self) -> MutexGuard<'_, StreamingSession<T>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;

    use mistral_provider::ByteStream;

    use super::*;
    use crate::observer::RecordingObserver;

    /// Answers every buffered request with "Hi there".
    struct Echo;

    impl Transport for Echo {
        fn send(
            &self,
            request: &CompletionRequest,
            _api_key: &str,
        ) -> impl Future<Output = Outcome<CompletionResponse>> + Send {
            let model = request.model.clone();
            async move {
                Ok(CompletionResponse {
                    id: "cmpl-1".into(),
                    object: "chat.completion".into(),
                    created: 0,
                    model,
                    choices: vec![mistral_types::Choice {
                        index: 0,
                        message: Turn::assistant("Hi there"),
                        finish_reason: Some("stop".into()),
                    }],
                    usage: None,
                })
            }
        }

        fn open_stream(
            &self,
            _request: &CompletionRequest,
            _api_key: &str,
        ) -> impl Future<Output = Outcome<ByteStream>> + Send {
            async { Err(ChatError::Stream("not scripted".into())) }
        }
    }

    fn controller() -> ChatController<Echo> {
        ChatController::new(ChatConfig::default().with_api_key("sk-test"), Echo)
    }

    #[tokio::test]
    async fn blank_message_is_ignored() {
        let chat = controller();
        let recorder = Arc::new(RecordingObserver::new());
        chat.subscribe(recorder.clone());

        chat.send("   \n", "mistral-small-latest", false).await;
        assert_eq!(chat.history_len(), 0);
        assert!(recorder.events().is_empty());
    }

    #[tokio::test]
    async fn buffered_send_commits_both_turns() {
        let chat = controller();
        chat.send("Hello", "mistral-small-latest", false).await;
        assert_eq!(
            chat.history(),
            vec![Turn::user("Hello"), Turn::assistant("Hi there")]
        );
        assert_eq!(chat.phase(), ChatPhase::Idle);
    }

    #[tokio::test]
    async fn clear_empties_history() {
        let chat = controller();
        chat.send("Hello", "m", false).await;
        chat.clear();
        assert_eq!(chat.history_len(), 0);
    }

    #[tokio::test]
    async fn dispose_is_idempotent_and_final() {
        let chat = controller();
        let recorder = Arc::new(RecordingObserver::new());
        chat.subscribe(recorder.clone());
        chat.send("Hello", "m", false).await;
        recorder.reset();

        chat.dispose();
        chat.dispose();
        assert!(chat.is_disposed());
        assert_eq!(chat.history_len(), 0);

        chat.send("again", "m", false).await;
        chat.subscribe(recorder.clone());
        assert_eq!(chat.history_len(), 0);
        assert!(recorder.events().is_empty());
    }

    #[tokio::test]
    async fn config_is_kept_as_given() {
        let config = ChatConfig {
            temperature: 0.2,
            max_tokens: 64,
            ..ChatConfig::default()
        };
        let chat = ChatController::new(config, Echo);
        assert_eq!(chat.config().temperature, 0.2);
        assert_eq!(chat.config().max_tokens, 64);
    }
}
