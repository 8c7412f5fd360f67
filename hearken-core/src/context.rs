//! # Processing Contexts
//!
//! [`EventProcessingContext`] is created once per pushed event and shared by
//! every interceptor and listener that handles it. It owns the append-only
//! result list and the instant attribute scope.
//!
//! [`EventListenerContext`] is created once per listener invocation. It names
//! the listener about to run and carries the rewritable text content used by
//! text filters.

use crate::{
    attribute::{AttributeKey, Attributes, Scope},
    error::{BoxError, SessionError},
    event::Event,
    listener::DynListener,
    result::EventResult,
    session::{ContinuousSessions, WaitOptions},
};
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Per-event state shared by the whole dispatch.
pub struct EventProcessingContext {
    event: Arc<dyn Event>,
    results: Mutex<Vec<EventResult>>,
    global: Attributes,
    instant: Attributes,
    sessions: ContinuousSessions,
    cancel: CancellationToken,
    sink: Mutex<Option<mpsc::UnboundedSender<EventResult>>>,
}

impl EventProcessingContext {
    /// Create a context with its own global scope, session registry and
    /// cancellation token.
    pub fn new(event: Arc<dyn Event>) -> Self {
        Self {
            event,
            results: Mutex::new(Vec::new()),
            global: Attributes::new(),
            instant: Attributes::new(),
            sessions: ContinuousSessions::default(),
            cancel: CancellationToken::new(),
            sink: Mutex::new(None),
        }
    }

    /// Share the manager-wide global attribute scope.
    pub fn with_global(mut self, global: Attributes) -> Self {
        self.global = global;
        self
    }

    /// Share the manager-wide continuous session registry.
    pub fn with_sessions(mut self, sessions: ContinuousSessions) -> Self {
        self.sessions = sessions;
        self
    }

    /// Use the given cancellation token for this dispatch.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Forward every recorded result to `sink` as well.
    pub fn with_sink(self, sink: mpsc::UnboundedSender<EventResult>) -> Self {
        *self.sink.lock() = Some(sink);
        self
    }

    /// Stop forwarding results to the sink, closing the caller's stream.
    ///
    /// Results recorded afterwards are still kept in [`results`](Self::results).
    pub fn close_sink(&self) {
        let _results = self.results.lock();
        self.sink.lock().take();
    }

    /// The event being processed.
    pub fn event(&self) -> &Arc<dyn Event> {
        &self.event
    }

    /// A snapshot of the results recorded so far, in recording order.
    pub fn results(&self) -> Vec<EventResult> {
        self.results.lock().clone()
    }

    /// Number of results recorded so far.
    pub fn result_count(&self) -> usize {
        self.results.lock().len()
    }

    /// The attribute bag of the given scope.
    pub fn attributes(&self, scope: Scope) -> &Attributes {
        match scope {
            Scope::Global => &self.global,
            Scope::Instant => &self.instant,
        }
    }

    /// Look an attribute up in the instant scope, then the global scope.
    pub fn attribute<T: Send + Sync + 'static>(&self, key: AttributeKey<T>) -> Option<Arc<T>> {
        self.instant.get(key).or_else(|| self.global.get(key))
    }

    /// The continuous session registry.
    pub fn sessions(&self) -> &ContinuousSessions {
        &self.sessions
    }

    /// The cancellation token of this dispatch.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns `true` once the dispatch was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Record one result entry.
    ///
    /// Results are append-only; concurrent recorders never lose entries.
    /// Nothing is recorded once the dispatch is cancelled.
    pub fn record(&self, result: EventResult) {
        if self.cancel.is_cancelled() {
            return;
        }
        let mut results = self.results.lock();
        if let Some(sink) = &*self.sink.lock() {
            // The receiver may be gone when the caller ignores the stream.
            let _ = sink.send(result.clone());
        }
        results.push(result);
    }

    /// Record a listener's result, flattening reactive results element by
    /// element. Returns `true` if the result was truncating.
    ///
    /// Stops early, recording nothing further, if the dispatch is cancelled.
    pub async fn collect(&self, listener_id: &str, result: EventResult) -> bool {
        let truncated = result.is_truncated();
        let mut entries = result.into_entries(listener_id);
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                entry = entries.next() => entry,
            };
            match next {
                Some(entry) => self.record(entry),
                None => break,
            }
        }
        truncated
    }
}

impl std::fmt::Debug for EventProcessingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventProcessingContext")
            .field("event", &self.event)
            .field("results", &self.result_count())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Per-invocation state handed to filters, listener interceptors and the
/// listener body.
pub struct EventListenerContext {
    processing: Arc<EventProcessingContext>,
    listener: Arc<dyn DynListener>,
    text: Mutex<Option<String>>,
}

impl EventListenerContext {
    /// Create the context for one invocation of `listener`.
    pub fn new(processing: Arc<EventProcessingContext>, listener: Arc<dyn DynListener>) -> Self {
        let text = processing.event().plain_text().map(str::to_string);
        Self {
            processing,
            listener,
            text: Mutex::new(text),
        }
    }

    /// The shared processing context.
    pub fn processing(&self) -> &Arc<EventProcessingContext> {
        &self.processing
    }

    /// The event being processed.
    pub fn event(&self) -> &Arc<dyn Event> {
        self.processing.event()
    }

    /// The listener about to run.
    pub fn listener(&self) -> &dyn DynListener {
        &*self.listener
    }

    /// Id of the listener about to run.
    pub fn listener_id(&self) -> &str {
        self.listener.id()
    }

    /// The current matchable text, starting as the event's plain text.
    pub fn text_content(&self) -> Option<String> {
        self.text.lock().clone()
    }

    /// Replace the matchable text seen by later filters and the body.
    pub fn set_text_content(&self, text: Option<String>) {
        *self.text.lock() = text;
    }

    /// Look an attribute up in the instant scope, then the global scope.
    pub fn attribute<T: Send + Sync + 'static>(&self, key: AttributeKey<T>) -> Option<Arc<T>> {
        self.processing.attribute(key)
    }

    /// Returns `true` once the dispatch was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.processing.is_cancelled()
    }

    /// Suspend until a value of type `T` is pushed under `key`.
    ///
    /// Fails when the session is closed, times out, or the dispatch is
    /// cancelled; `options.on_close` runs in each of those cases.
    pub async fn waiting<T: Send + 'static>(
        &self,
        key: impl Into<String>,
        options: WaitOptions,
    ) -> Result<T, SessionError> {
        self.processing
            .sessions()
            .wait_value(key.into(), options, self.processing.cancellation())
            .await
    }

    /// Suspend until a later event accepted by `matcher` is pushed.
    pub async fn next_event<F>(
        &self,
        key: impl Into<String>,
        matcher: F,
        options: WaitOptions,
    ) -> Result<Arc<dyn Event>, SessionError>
    where
        F: Fn(&dyn Event) -> bool + Send + Sync + 'static,
    {
        self.processing
            .sessions()
            .wait_event(key.into(), matcher, options, self.processing.cancellation())
            .await
    }

    /// Push a value to the session waiting on `key`.
    pub fn push_session<T: Send + 'static>(&self, key: &str, value: T) -> Result<(), SessionError> {
        self.processing.sessions().push(key, value)
    }
}

impl std::fmt::Debug for EventListenerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventListenerContext")
            .field("listener", &self.listener_id())
            .field("event", self.event())
            .finish()
    }
}

/// Downcast a listener-context event, failing with a descriptive error.
pub fn expect_event<T: Event>(ctx: &EventListenerContext) -> Result<&T, BoxError> {
    ctx.event().downcast_ref::<T>().ok_or_else(|| {
        format!(
            "listener `{}` expected event type `{}`",
            ctx.listener_id(),
            std::any::type_name::<T>()
        )
        .into()
    })
}
