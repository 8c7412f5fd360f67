//! # Result Model
//!
//! Every listener invocation produces one [`EventResult`]. The variants cover
//! values that are already available, values that will be available later,
//! and sources that yield several values over time:
//!
//! - [`EventResult::Invalid`] - nothing happened (the default result)
//! - [`EventResult::Simple`] - an available value
//! - [`EventResult::Async`] - a deferred value; never awaited by the dispatcher
//! - [`EventResult::Reactive`] - a stream; the dispatcher flattens each element
//!   into its own `Simple` entry
//! - [`EventResult::Error`] - a listener, filter or interceptor failed
//!
//! Any result can additionally be [truncated](EventResult::truncate), which
//! tells the dispatcher not to initiate the remaining listeners.

use crate::error::{BoxError, FailureKind};
use futures::{
    FutureExt, Stream, StreamExt,
    future::{self, BoxFuture, Shared},
    stream::{self, BoxStream},
};
use parking_lot::Mutex;
use std::{any::Any, fmt, future::Future, sync::Arc};

/// A type-erased, cheaply clonable result value.
#[derive(Clone)]
pub struct Content {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Content {
    /// Wrap a value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Returns `true` if the value is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Borrow the value as a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Name of the wrapped type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Content<{}>", self.type_name)
    }
}

/// The failure carried by [`EventResult::Error`].
#[derive(Clone)]
pub struct ListenerFailure {
    listener_id: Option<String>,
    kind: FailureKind,
    cause: Arc<dyn std::error::Error + Send + Sync>,
}

impl ListenerFailure {
    /// Create a failure.
    pub fn new(listener_id: Option<String>, kind: FailureKind, cause: impl Into<BoxError>) -> Self {
        Self {
            listener_id,
            kind,
            cause: Arc::from(cause.into()),
        }
    }

    /// Id of the failing listener, or `None` for a processing interceptor.
    pub fn listener_id(&self) -> Option<&str> {
        self.listener_id.as_deref()
    }

    /// What failed.
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// The underlying error.
    pub fn cause(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        &*self.cause
    }
}

impl fmt::Display for ListenerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.listener_id {
            Some(id) => write!(f, "listener `{id}` failed ({}): {}", self.kind, self.cause),
            None => write!(f, "event processing failed ({}): {}", self.kind, self.cause),
        }
    }
}

impl fmt::Debug for ListenerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerFailure")
            .field("listener_id", &self.listener_id)
            .field("kind", &self.kind)
            .field("cause", &self.cause.to_string())
            .finish()
    }
}

impl std::error::Error for ListenerFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.cause)
    }
}

/// What a deferred result settles to.
pub type AsyncOutput = Result<Option<Content>, ListenerFailure>;

/// A deferred result handle.
///
/// Clones share the same computation; awaiting any clone drives it.
#[derive(Clone)]
pub struct AsyncResult {
    inner: Shared<BoxFuture<'static, AsyncOutput>>,
}

impl AsyncResult {
    /// Wrap a future.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = AsyncOutput> + Send + 'static,
    {
        Self {
            inner: future.boxed().shared(),
        }
    }

    /// Wait for the value.
    pub async fn await_content(&self) -> AsyncOutput {
        self.inner.clone().await
    }

    /// The value, if the computation already finished.
    pub fn peek(&self) -> Option<&AsyncOutput> {
        self.inner.peek()
    }
}

impl fmt::Debug for AsyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncResult")
            .field("done", &self.peek().is_some())
            .finish()
    }
}

/// A multi-value result source. The stream can be consumed once.
#[derive(Clone)]
pub struct ReactiveResult {
    stream: Arc<Mutex<Option<BoxStream<'static, Result<Content, BoxError>>>>>,
}

impl ReactiveResult {
    /// Wrap a stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Content, BoxError>> + Send + 'static,
    {
        Self {
            stream: Arc::new(Mutex::new(Some(stream.boxed()))),
        }
    }

    /// A stream yielding every item of `items` in order.
    pub fn from_values<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
        T: Any + Send + Sync,
    {
        Self::new(stream::iter(items.into_iter().map(|item| Ok(Content::new(item)))))
    }

    /// Take the stream out; `None` if it was already consumed.
    pub fn take(&self) -> Option<BoxStream<'static, Result<Content, BoxError>>> {
        self.stream.lock().take()
    }
}

impl fmt::Debug for ReactiveResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveResult")
            .field("consumed", &self.stream.lock().is_none())
            .finish()
    }
}

/// The outcome of one listener invocation.
#[derive(Clone, Debug, Default)]
pub enum EventResult {
    /// Nothing happened.
    #[default]
    Invalid,
    /// An available value.
    Simple(Content),
    /// A deferred value.
    Async(AsyncResult),
    /// A multi-value stream.
    Reactive(ReactiveResult),
    /// A failure isolated to one listener (or to the processing chain).
    Error(ListenerFailure),
    /// A result that stops the dispatcher from initiating later listeners.
    ///
    /// The dispatcher unwraps this variant before recording the inner result.
    Truncated(Box<EventResult>),
}

impl EventResult {
    /// Shorthand for [`EventResult::Simple`].
    pub fn simple<T: Any + Send + Sync>(value: T) -> Self {
        EventResult::Simple(Content::new(value))
    }

    /// Shorthand for an [`EventResult::Async`] around a future producing a value.
    pub fn deferred<F, T>(future: F) -> Self
    where
        F: Future<Output = Result<T, BoxError>> + Send + 'static,
        T: Any + Send + Sync,
    {
        EventResult::Async(AsyncResult::new(async move {
            future
                .await
                .map(|value| Some(Content::new(value)))
                .map_err(|e| ListenerFailure::new(None, FailureKind::Listener, e))
        }))
    }

    /// Shorthand for an [`EventResult::Reactive`] around a stream.
    pub fn reactive<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Content, BoxError>> + Send + 'static,
    {
        EventResult::Reactive(ReactiveResult::new(stream))
    }

    /// Mark this result as truncating.
    pub fn truncate(self) -> Self {
        match self {
            truncated @ EventResult::Truncated(_) => truncated,
            other => EventResult::Truncated(Box::new(other)),
        }
    }

    /// Returns `true` if this result stops later listeners.
    pub fn is_truncated(&self) -> bool {
        matches!(self, EventResult::Truncated(_))
    }

    /// Split into the inner result and the truncation flag.
    pub fn into_parts(self) -> (EventResult, bool) {
        match self {
            EventResult::Truncated(inner) => (inner.into_parts().0, true),
            other => (other, false),
        }
    }

    /// Returns `true` for [`EventResult::Invalid`].
    pub fn is_invalid(&self) -> bool {
        matches!(self, EventResult::Invalid)
    }

    /// Returns `true` for [`EventResult::Error`].
    pub fn is_error(&self) -> bool {
        matches!(self, EventResult::Error(_))
    }

    /// The value of a `Simple` result.
    pub fn content(&self) -> Option<&Content> {
        match self {
            EventResult::Simple(content) => Some(content),
            EventResult::Truncated(inner) => inner.content(),
            _ => None,
        }
    }

    /// The value of a `Simple` result as a `T`.
    pub fn value<T: Any>(&self) -> Option<&T> {
        self.content().and_then(Content::downcast_ref)
    }

    /// The failure of an `Error` result.
    pub fn failure(&self) -> Option<&ListenerFailure> {
        match self {
            EventResult::Error(failure) => Some(failure),
            EventResult::Truncated(inner) => inner.failure(),
            _ => None,
        }
    }

    /// Flatten into the entries recorded by the dispatcher.
    ///
    /// A `Reactive` result becomes one `Simple` entry per element, in emission
    /// order; a failing element becomes an `Error` entry and ends the stream.
    /// Every other variant yields itself once.
    pub fn into_entries(self, listener_id: &str) -> BoxStream<'static, EventResult> {
        let (result, _) = self.into_parts();
        let reactive = match result {
            EventResult::Reactive(reactive) => reactive,
            other => return stream::once(future::ready(other)).boxed(),
        };
        let Some(source) = reactive.take() else {
            return stream::empty().boxed();
        };

        let listener_id = listener_id.to_string();
        source
            .scan(false, move |failed, item| {
                let entry = if *failed {
                    None
                } else {
                    match item {
                        Ok(content) => Some(EventResult::Simple(content)),
                        Err(e) => {
                            *failed = true;
                            Some(EventResult::Error(ListenerFailure::new(
                                Some(listener_id.clone()),
                                FailureKind::Listener,
                                e,
                            )))
                        }
                    }
                };
                future::ready(entry)
            })
            .boxed()
    }

    /// Resolve to a single value, awaiting deferred results and collecting
    /// streams into a `Vec<Content>`.
    pub fn settle(self) -> BoxFuture<'static, AsyncOutput> {
        async move {
            match self {
                EventResult::Invalid => Ok(None),
                EventResult::Simple(content) => Ok(Some(content)),
                EventResult::Async(deferred) => deferred.await_content().await,
                EventResult::Error(failure) => Err(failure),
                EventResult::Truncated(inner) => inner.settle().await,
                EventResult::Reactive(reactive) => {
                    let Some(mut source) = reactive.take() else {
                        return Ok(None);
                    };
                    let mut items = Vec::new();
                    while let Some(item) = source.next().await {
                        let content = item
                            .map_err(|e| ListenerFailure::new(None, FailureKind::Listener, e))?;
                        items.push(content);
                    }
                    Ok(Some(Content::new(items)))
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_value() {
        let result = EventResult::simple(42u32);
        assert_eq!(result.value::<u32>(), Some(&42));
        assert!(result.value::<String>().is_none());
        assert!(EventResult::default().is_invalid());
    }

    #[test]
    fn test_truncate_is_idempotent() {
        let result = EventResult::simple("done").truncate().truncate();
        assert!(result.is_truncated());
        let (inner, truncated) = result.into_parts();
        assert!(truncated);
        assert_eq!(inner.value::<&str>(), Some(&"done"));
    }

    #[tokio::test]
    async fn test_reactive_entries_preserve_order() {
        let result = EventResult::Reactive(ReactiveResult::from_values(vec![1, 2, 3]));
        let entries: Vec<EventResult> = result.into_entries("numbers").collect().await;
        let values: Vec<i32> = entries.iter().filter_map(|e| e.value::<i32>().copied()).collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_reactive_error_ends_stream() {
        let items: Vec<Result<Content, BoxError>> = vec![
            Ok(Content::new(1)),
            Err("boom".into()),
            Ok(Content::new(3)),
        ];
        let result = EventResult::reactive(stream::iter(items));
        let entries: Vec<EventResult> = result.into_entries("flaky").collect().await;
        assert_eq!(entries.len(), 2);
        let failure = entries[1].failure().unwrap();
        assert_eq!(failure.listener_id(), Some("flaky"));
        assert_eq!(failure.cause().to_string(), "boom");
    }

    #[tokio::test]
    async fn test_reactive_consumed_once() {
        let reactive = ReactiveResult::from_values(vec!["a"]);
        let first: Vec<_> = EventResult::Reactive(reactive.clone())
            .into_entries("x")
            .collect()
            .await;
        let second: Vec<_> = EventResult::Reactive(reactive).into_entries("x").collect().await;
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_deferred_settles() {
        let result = EventResult::deferred(async { Ok::<_, BoxError>("later".to_string()) });
        let EventResult::Async(handle) = &result else {
            panic!("expected async result");
        };
        let content = handle.await_content().await.unwrap().unwrap();
        assert_eq!(content.downcast_ref::<String>().unwrap(), "later");
        assert!(handle.peek().is_some());

        let settled = result.settle().await.unwrap().unwrap();
        assert_eq!(settled.downcast_ref::<String>().unwrap(), "later");
    }

    #[tokio::test]
    async fn test_settle_collects_reactive() {
        let result = EventResult::Reactive(ReactiveResult::from_values(vec![1u8, 2]));
        let content = result.settle().await.unwrap().unwrap();
        let items = content.downcast_ref::<Vec<Content>>().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].downcast_ref::<u8>(), Some(&2));
    }
}
