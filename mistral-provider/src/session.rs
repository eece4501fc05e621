//! One cancellable streaming exchange at a time.
//!
//! [`StreamingSession::start`] spawns a task that opens the byte stream,
//! feeds it through an [`SseDecoder`] and reports through
//! [`StreamCallbacks`]: any number of fragments, then exactly one of
//! `on_complete` / `on_error`. A cancelled stream reports nothing further.

use std::sync::Arc;

use futures::StreamExt;
use mistral_types::{ChatError, CompletionRequest, Outcome};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::sse::{SseDecoder, SseFrame};
use crate::transport::Transport;

/// Receives each decoded text fragment, in arrival order.
pub type FragmentFn = Box<dyn FnMut(String) + Send>;

/// Receives the failure that ended the stream.
pub type ErrorFn = Box<dyn FnOnce(ChatError) + Send>;

/// Called once when the stream ends normally.
pub type CompleteFn = Box<dyn FnOnce() + Send>;

/// Callbacks for one streaming exchange.
///
/// The terminal callbacks are `FnOnce`, so each can fire at most once.
pub struct StreamCallbacks {
    on_fragment: FragmentFn,
    on_error: Option<ErrorFn>,
    on_complete: Option<CompleteFn>,
}

impl StreamCallbacks {
    /// Callbacks delivering fragments to `on_fragment`.
    pub fn new(on_fragment: impl FnMut(String) + Send + 'static) -> Self {
        Self {
            on_fragment: Box::new(on_fragment),
            on_error: None,
            on_complete: None,
        }
    }

    /// Set the error callback.
    #[must_use]
    pub fn on_error(mut self, f: impl FnOnce(ChatError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Set the completion callback.
    #[must_use]
    pub fn on_complete(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    fn fail(self, err: ChatError) {
        match self.on_error {
            Some(on_error) => on_error(err),
            None => tracing::warn!(error = %err, "stream failed with no error callback"),
        }
    }
}

impl std::fmt::Debug for StreamCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCallbacks")
            .field("on_error", &self.on_error.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish_non_exhaustive()
    }
}

struct ActiveStream {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owner of at most one in-flight streaming exchange.
///
/// Starting a new stream cancels the previous one first. Dropping the
/// session cancels whatever is running.
pub struct StreamingSession<T: Transport> {
    transport: Arc<T>,
    active: Option<ActiveStream>,
}

impl<T: Transport> StreamingSession<T> {
    /// Create an idle session over `transport`.
    pub fn new(transport: T) -> Self {
        Self::with_shared(Arc::new(transport))
    }

    /// Create an idle session over a transport shared with other clients.
    pub fn with_shared(transport: Arc<T>) -> Self {
        Self {
            transport,
            active: None,
        }
    }

    /// Begin streaming a completion for `request`.
    ///
    /// A blank `api_key` or an invalid request is reported through
    /// `on_error` before this returns and no I/O is attempted. The same
    /// happens when no tokio runtime is available to host the stream.
    /// The outgoing request always has `stream` set.
    pub fn start(&mut self, request: &CompletionRequest, api_key: &str, callbacks: StreamCallbacks) {
        self.cancel();

        let api_key = api_key.trim();
        if api_key.is_empty() {
            callbacks.fail(ChatError::MissingCredential);
            return;
        }
        if let Err(e) = request.validate() {
            callbacks.fail(e);
            return;
        }
        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                callbacks.fail(ChatError::Runtime(e.to_string()));
                return;
            }
        };

        let request = request.clone().with_stream(true);
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            "starting completion stream"
        );

        let token = CancellationToken::new();
        let handle = runtime.spawn(run_stream(
            Arc::clone(&self.transport),
            request,
            api_key.to_string(),
            callbacks,
            token.clone(),
        ));
        self.active = Some(ActiveStream { token, handle });
    }

    /// Stop the active stream, if any. No callback fires afterwards.
    ///
    /// Idempotent; a no-op when idle.
    pub fn cancel(&mut self) {
        if let Some(active) = self.active.take() {
            active.token.cancel();
            active.handle.abort();
            tracing::debug!("completion stream cancelled");
        }
    }

    /// Whether a stream task is still running.
    pub fn is_active(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.handle.is_finished())
    }
}

impl<T: Transport> Drop for StreamingSession<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run_stream<T: Transport>(
    transport: Arc<T>,
    request: CompletionRequest,
    api_key: String,
    callbacks: StreamCallbacks,
    token: CancellationToken,
) {
    let StreamCallbacks {
        mut on_fragment,
        on_error,
        on_complete,
    } = callbacks;

    let outcome = tokio::select! {
        biased;
        () = token.cancelled() => return,
        outcome = pump(&*transport, &request, &api_key, &mut on_fragment, &token) => outcome,
    };
    if token.is_cancelled() {
        return;
    }

    match outcome {
        Ok(()) => {
            tracing::debug!("completion stream finished");
            if let Some(on_complete) = on_complete {
                on_complete();
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "completion stream failed");
            if let Some(on_error) = on_error {
                on_error(err);
            }
        }
    }
}

/// Read the body to the end-of-stream sentinel or end of body.
async fn pump<T: Transport>(
    transport: &T,
    request: &CompletionRequest,
    api_key: &str,
    on_fragment: &mut FragmentFn,
    token: &CancellationToken,
) -> Outcome<()> {
    let mut body = transport.open_stream(request, api_key).await?;
    let mut decoder = SseDecoder::new();

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        if deliver(decoder.process_bytes(&chunk), on_fragment, token) {
            return Ok(());
        }
    }
    deliver(decoder.finish(), on_fragment, token);
    Ok(())
}

/// Forward decoded frames. Returns `true` once the stream should stop.
fn deliver(frames: Vec<SseFrame>, on_fragment: &mut FragmentFn, token: &CancellationToken) -> bool {
    for frame in frames {
        if token.is_cancelled() {
            return true;
        }
        match frame {
            SseFrame::Content(text) => on_fragment(text),
            SseFrame::Done => return true,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::sync::Mutex;
    use std::time::Duration;

    use bytes::Bytes;
    use mistral_types::{CompletionResponse, Turn};
    use tokio::sync::mpsc;

    use super::*;
    use crate::transport::ByteStream;

    #[derive(Debug, PartialEq)]
    enum Event {
        Fragment(String),
        Error(String),
        Complete,
    }

    fn recording() -> (StreamCallbacks, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let tx_err = tx.clone();
        let tx_done = tx.clone();
        let callbacks = StreamCallbacks::new(move |text| {
            let _ = tx.send(Event::Fragment(text));
        })
        .on_error(move |e| {
            let _ = tx_err.send(Event::Error(e.to_string()));
        })
        .on_complete(move || {
            let _ = tx_done.send(Event::Complete);
        });
        (callbacks, rx)
    }

    /// Collect events until every callback has been dropped.
    async fn drain(mut rx: mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            events.push(event);
        }
        events
    }

    fn request() -> CompletionRequest {
        CompletionRequest::builder()
            .model("mistral-small-latest")
            .messages(vec![Turn::user("Hello")])
            .build()
    }

    fn data(text: &str) -> String {
        format!("data: {{\"choices\":[{{\"delta\":{{\"content\":\"{text}\"}}}}]}}\n\n")
    }

    /// Replays a fixed body. `None` entries are read failures.
    struct Scripted {
        body: Vec<Option<String>>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl Scripted {
        fn new(body: Vec<Option<String>>) -> Self {
            Self {
                body,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl Transport for Scripted {
        fn send(
            &self,
            _request: &CompletionRequest,
            _api_key: &str,
        ) -> impl Future<Output = Outcome<CompletionResponse>> + Send {
            async { Err(ChatError::EmptyResponse) }
        }

        fn open_stream(
            &self,
            request: &CompletionRequest,
            _api_key: &str,
        ) -> impl Future<Output = Outcome<ByteStream>> + Send {
            self.seen.lock().unwrap().push(request.clone());
            let items: Vec<Outcome<Bytes>> = self
                .body
                .iter()
                .map(|chunk| match chunk {
                    Some(text) => Ok(Bytes::from(text.clone())),
                    None => Err(ChatError::Stream("connection reset".into())),
                })
                .collect();
            async move {
                let body: ByteStream = futures::stream::iter(items).boxed();
                Ok(body)
            }
        }
    }

    /// Body chunks are pushed by the test through a channel.
    struct Channel(Mutex<Option<mpsc::UnboundedReceiver<Outcome<Bytes>>>>);

    impl Transport for Channel {
        fn send(
            &self,
            _request: &CompletionRequest,
            _api_key: &str,
        ) -> impl Future<Output = Outcome<CompletionResponse>> + Send {
            async { Err(ChatError::EmptyResponse) }
        }

        fn open_stream(
            &self,
            _request: &CompletionRequest,
            _api_key: &str,
        ) -> impl Future<Output = Outcome<ByteStream>> + Send {
            let rx = self.0.lock().unwrap().take();
            async move {
                let rx = rx.ok_or_else(|| ChatError::Stream("already opened".into()))?;
                let body: ByteStream = futures::stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                })
                .boxed();
                Ok(body)
            }
        }
    }

    #[tokio::test]
    async fn fragments_then_complete() {
        let body = format!("{}{}data: [DONE]\n\n", data("Hi"), data(" there"));
        let mut session = StreamingSession::new(Scripted::new(vec![Some(body)]));
        let (callbacks, rx) = recording();
        session.start(&request(), "sk-test", callbacks);

        assert_eq!(
            drain(rx).await,
            vec![
                Event::Fragment("Hi".into()),
                Event::Fragment(" there".into()),
                Event::Complete,
            ]
        );
    }

    #[tokio::test]
    async fn outgoing_request_is_forced_to_stream() {
        let transport = Arc::new(Scripted::new(vec![Some("data: [DONE]\n".into())]));
        let mut session = StreamingSession::with_shared(Arc::clone(&transport));
        let (callbacks, rx) = recording();
        session.start(&request(), "sk-test", callbacks);
        drain(rx).await;

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].stream);
    }

    #[tokio::test]
    async fn end_of_body_without_sentinel_completes() {
        let mut session = StreamingSession::new(Scripted::new(vec![Some(data("only"))]));
        let (callbacks, rx) = recording();
        session.start(&request(), "sk-test", callbacks);

        assert_eq!(
            drain(rx).await,
            vec![Event::Fragment("only".into()), Event::Complete]
        );
    }

    #[tokio::test]
    async fn read_failure_reports_error_once() {
        let mut session =
            StreamingSession::new(Scripted::new(vec![Some(data("partial")), None, Some(data("never"))]));
        let (callbacks, rx) = recording();
        session.start(&request(), "sk-test", callbacks);

        let events = drain(rx).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], Event::Fragment("partial".into()));
        assert!(matches!(&events[1], Event::Error(msg) if msg.contains("connection reset")));
    }

    #[tokio::test]
    async fn blank_credential_fails_before_io() {
        let transport = Arc::new(Scripted::new(vec![]));
        let mut session = StreamingSession::with_shared(Arc::clone(&transport));
        let (callbacks, mut rx) = recording();
        session.start(&request(), "  ", callbacks);

        assert_eq!(
            rx.try_recv().unwrap(),
            Event::Error(ChatError::MissingCredential.to_string())
        );
        assert!(transport.seen.lock().unwrap().is_empty());
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn invalid_request_fails_before_io() {
        let mut session = StreamingSession::new(Scripted::new(vec![]));
        let (callbacks, mut rx) = recording();
        let empty = CompletionRequest::builder().model("m").build();
        session.start(&empty, "sk-test", callbacks);

        assert!(matches!(rx.try_recv().unwrap(), Event::Error(msg) if msg.contains("invalid request")));
    }

    #[test]
    fn no_runtime_reports_error() {
        let mut session = StreamingSession::new(Scripted::new(vec![]));
        let (callbacks, mut rx) = recording();
        session.start(&request(), "sk-test", callbacks);

        assert!(matches!(rx.try_recv().unwrap(), Event::Error(msg) if msg.contains("runtime")));
    }

    #[tokio::test]
    async fn cancel_stops_delivery_without_terminal_callback() {
        let (tx, body) = mpsc::unbounded_channel();
        let mut session = StreamingSession::new(Channel(Mutex::new(Some(body))));
        let (callbacks, mut rx) = recording();
        session.start(&request(), "sk-test", callbacks);

        tx.send(Ok(Bytes::from(data("first")))).unwrap();
        assert_eq!(rx.recv().await, Some(Event::Fragment("first".into())));
        assert!(session.is_active());

        session.cancel();
        session.cancel();
        let _ = tx.send(Ok(Bytes::from(data("second"))));
        let _ = tx.send(Ok(Bytes::from("data: [DONE]\n")));

        assert!(drain(rx).await.is_empty());
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn restart_supersedes_previous_stream() {
        let (tx, body) = mpsc::unbounded_channel();
        let transport = Arc::new(Channel(Mutex::new(Some(body))));
        let mut session = StreamingSession::with_shared(Arc::clone(&transport));
        let (first, first_rx) = recording();
        session.start(&request(), "sk-test", first);

        let (tx2, body2) = mpsc::unbounded_channel();
        *transport.0.lock().unwrap() = Some(body2);
        let (second, second_rx) = recording();
        session.start(&request(), "sk-test", second);

        let _ = tx.send(Ok(Bytes::from(data("stale"))));
        tx2.send(Ok(Bytes::from(data("fresh")))).unwrap();
        tx2.send(Ok(Bytes::from("data: [DONE]\n"))).unwrap();

        assert!(drain(first_rx).await.is_empty());
        assert_eq!(
            drain(second_rx).await,
            vec![Event::Fragment("fresh".into()), Event::Complete]
        );
    }

    #[tokio::test]
    async fn cancel_when_idle_is_a_no_op() {
        let mut session = StreamingSession::new(Scripted::new(vec![]));
        session.cancel();
        assert!(!session.is_active());
    }
}
