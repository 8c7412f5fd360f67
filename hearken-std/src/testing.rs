//! Testing utilities for Hearken.
//!
//! This module provides utilities to make testing listeners, filters and
//! interceptors easier.
//!
//! # Features
//!
//! - [`TestEvent`]: An event type over the ready-made [`test_keys`] graph
//! - [`RecordingListener`]: A listener that records every invocation
//! - [`FailingListener`]: A listener that fails or panics on demand
//! - [`CountingInterceptor`]: An interceptor for both chains that counts calls

use futures::future::BoxFuture;
use hearken_core::{
    BoxError, Event, EventListenerContext, EventProcessingContext, EventResult, Key, KeyGraph,
    KeyGraphBuilder, Listener, ListenerInterceptor, ListenerNext, Priority, ProcessingInterceptor,
    ProcessingNext, async_trait,
};
use lazy_static::lazy_static;
use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

// ============================================================================
// Test Keys
// ============================================================================

lazy_static! {
    static ref TEST_KEYS: KeyGraph = KeyGraphBuilder::new()
        .key("message", ["event"])
        .key("friend_message", ["message"])
        .key("group_message", ["message"])
        .key("notice", ["event"])
        .build()
        .expect("built-in test key graph is valid");
}

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

/// The key graph used by [`TestEvent`]:
///
/// ```text
/// event
/// ├── message
/// │   ├── friend_message
/// │   └── group_message
/// └── notice
/// ```
pub fn test_keys() -> &'static KeyGraph {
    &TEST_KEYS
}

fn test_key(id: &str) -> Key {
    TEST_KEYS
        .get(id)
        .unwrap_or_else(|| panic!("`{id}` is not a test key"))
}

// ============================================================================
// Test Event
// ============================================================================

/// An event over [`test_keys`] with optional text.
///
/// # Example
///
/// ```rust,ignore
/// let event = TestEvent::friend_message("/echo hi");
/// let stream = manager.push(event.shared());
/// ```
#[derive(Debug, Clone)]
pub struct TestEvent {
    id: String,
    key: Key,
    text: Option<String>,
}

impl TestEvent {
    /// Create an event with a fresh id. Panics if `key` is not a test key.
    pub fn new(key: &str, text: Option<&str>) -> Self {
        Self {
            id: format!("test-{}", NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed)),
            key: test_key(key),
            text: text.map(str::to_string),
        }
    }

    /// A `friend_message` event.
    pub fn friend_message(text: &str) -> Self {
        Self::new("friend_message", Some(text))
    }

    /// A `group_message` event.
    pub fn group_message(text: &str) -> Self {
        Self::new("group_message", Some(text))
    }

    /// A `notice` event without text.
    pub fn notice() -> Self {
        Self::new("notice", None)
    }

    /// A shared handle to a copy of this event.
    pub fn shared(&self) -> Arc<dyn Event> {
        Arc::new(self.clone())
    }

    /// A fresh processing context for this event.
    pub fn processing_context(&self) -> Arc<EventProcessingContext> {
        Arc::new(EventProcessingContext::new(self.shared()))
    }

    /// A fresh listener context for invoking `listener` with this event.
    pub fn listener_context<L: Listener>(&self, listener: L) -> EventListenerContext {
        EventListenerContext::new(self.processing_context(), listener.into_dyn())
    }
}

impl Event for TestEvent {
    fn id(&self) -> &str {
        &self.id
    }

    fn key(&self) -> &Key {
        &self.key
    }

    fn plain_text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

// ============================================================================
// Recording Listener
// ============================================================================

/// A shared log of listener ids in invocation order.
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// A listener that records every invocation and returns a fixed result.
///
/// # Example
///
/// ```rust,ignore
/// let recorder = RecordingListener::new("recorder").with_result(EventResult::simple(1));
/// manager.register_listener(recorder.clone())?;
///
/// manager.push(TestEvent::notice().shared()).collect::<Vec<_>>().await;
/// assert_eq!(recorder.count(), 1);
/// ```
#[derive(Clone)]
pub struct RecordingListener {
    id: String,
    priority: i32,
    spawned: bool,
    targets: Vec<Key>,
    result: EventResult,
    events: Arc<Mutex<Vec<String>>>,
    texts: Arc<Mutex<Vec<Option<String>>>>,
    log: Option<CallLog>,
}

impl RecordingListener {
    /// Create a listener targeting every key and returning `Invalid`.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            priority: Priority::LOWEST,
            spawned: false,
            targets: Vec::new(),
            result: EventResult::Invalid,
            events: Arc::default(),
            texts: Arc::default(),
            log: None,
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Only match `key` and its subtypes. Panics if `key` is not a test key.
    pub fn with_target(mut self, key: &str) -> Self {
        self.targets.push(test_key(key));
        self
    }

    /// Return `result` from every invocation.
    pub fn with_result(mut self, result: EventResult) -> Self {
        self.result = result;
        self
    }

    /// Append the listener id to `log` on every invocation.
    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Run as a spawned task.
    pub fn spawned(mut self) -> Self {
        self.spawned = true;
        self
    }

    /// Number of invocations.
    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    /// Ids of the events seen, in invocation order.
    pub fn event_ids(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    /// Text content seen by the body, in invocation order.
    pub fn texts(&self) -> Vec<Option<String>> {
        self.texts.lock().clone()
    }
}

impl Listener for RecordingListener {
    fn id(&self) -> &str {
        &self.id
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn is_async(&self) -> bool {
        self.spawned
    }

    fn is_target(&self, key: &Key) -> bool {
        self.targets.is_empty() || self.targets.iter().any(|target| key.is_subtype_of(target))
    }

    async fn invoke(&self, ctx: &EventListenerContext) -> Result<EventResult, BoxError> {
        self.events.lock().push(ctx.event().id().to_string());
        self.texts.lock().push(ctx.text_content());
        if let Some(log) = &self.log {
            log.lock().push(self.id.clone());
        }
        Ok(self.result.clone())
    }
}

// ============================================================================
// Failing Listener
// ============================================================================

/// A listener that returns an error, or panics.
pub struct FailingListener {
    id: String,
    priority: i32,
    message: String,
    panic: bool,
}

impl FailingListener {
    /// A listener whose body returns an error with `message`.
    pub fn new(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            priority: Priority::LOWEST,
            message: message.into(),
            panic: false,
        }
    }

    /// A listener whose body panics.
    pub fn panicking(id: impl Into<String>) -> Self {
        Self {
            panic: true,
            ..Self::new(id, "listener panicked")
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl Listener for FailingListener {
    fn id(&self) -> &str {
        &self.id
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn is_target(&self, _key: &Key) -> bool {
        true
    }

    async fn invoke(&self, _ctx: &EventListenerContext) -> Result<EventResult, BoxError> {
        if self.panic {
            panic!("{}", self.message);
        }
        Err(self.message.clone().into())
    }
}

// ============================================================================
// Counting Interceptor
// ============================================================================

/// An interceptor for either chain that counts how often it runs.
///
/// Clones share the counter. A blocking interceptor never calls `proceed`.
#[derive(Clone, Default)]
pub struct CountingInterceptor {
    count: Arc<AtomicUsize>,
    priority: i32,
    blocking: bool,
}

impl CountingInterceptor {
    /// Create an interceptor that always proceeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Never call `proceed`.
    pub fn blocking(mut self) -> Self {
        self.blocking = true;
        self
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Number of times the interceptor ran.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessingInterceptor for CountingInterceptor {
    fn priority(&self) -> i32 {
        self.priority
    }

    async fn intercept(
        &self,
        ctx: &EventProcessingContext,
        next: ProcessingNext<'_>,
    ) -> Result<(), BoxError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        if self.blocking {
            return Ok(());
        }
        next.proceed(ctx).await
    }
}

#[async_trait]
impl ListenerInterceptor for CountingInterceptor {
    fn priority(&self) -> i32 {
        self.priority
    }

    async fn intercept(
        &self,
        ctx: &EventListenerContext,
        next: ListenerNext<'_>,
    ) -> Result<EventResult, BoxError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        if self.blocking {
            return Ok(EventResult::Invalid);
        }
        Ok(next.proceed(ctx).await)
    }
}

/// A processing terminal that does nothing; handy for driving a
/// [`ProcessingNext`] by hand.
pub struct NoopTerminal;

impl hearken_core::ProcessingTerminal for NoopTerminal {
    fn run<'a>(&'a self, _ctx: &'a EventProcessingContext) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }
}
