//! # Listeners
//!
//! A [`Listener`] is the unit of work matched against pushed events. It has
//! an id that is unique within one manager, a priority, a cheap
//! [`is_target`](Listener::is_target) check on the event key, and an async
//! body producing an [`EventResult`].
//!
//! Filters are attached with [`Listener::with_filter`], which wraps the
//! listener in a [`Filtered`] gate. The gate evaluates its filters in priority
//! order before the body runs.

use crate::{
    context::EventListenerContext,
    error::{BoxError, FilterError},
    filter::{Filter, evaluate_filters},
    key::Key,
    priority::Priority,
    result::EventResult,
};
use futures::future::BoxFuture;
use std::{future::Future, sync::Arc};

/// A unit of work invoked for matching events.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a `Listener`",
    label = "missing `Listener` implementation",
    note = "Listeners must implement `id`, `is_target` and `invoke`."
)]
pub trait Listener: Send + Sync + 'static {
    /// The id, unique within one manager.
    fn id(&self) -> &str;

    /// Lower values run first. Defaults to [`Priority::LOWEST`].
    fn priority(&self) -> i32 {
        Priority::LOWEST
    }

    /// Run the body as a spawned task and surface its outcome as an
    /// [`EventResult::Async`] handle instead of awaiting it in line.
    fn is_async(&self) -> bool {
        false
    }

    /// Cheap pre-filter on the event key, checked before any filter or
    /// interceptor runs.
    fn is_target(&self, key: &Key) -> bool;

    /// Run the listener body.
    fn invoke(
        &self,
        ctx: &EventListenerContext,
    ) -> impl Future<Output = Result<EventResult, BoxError>> + Send;

    /// Gate this listener behind a filter.
    fn with_filter<F>(self, filter: F) -> Filtered<Self>
    where
        Self: Sized,
        F: Filter,
    {
        Filtered::new(self).with_filter(filter)
    }

    /// Erase the listener type.
    fn into_dyn(self) -> Arc<dyn DynListener>
    where
        Self: Sized,
    {
        Arc::new(self)
    }
}

/// Object-safe version of [`Listener`].
pub trait DynListener: Send + Sync + 'static {
    /// See [`Listener::id`].
    fn id(&self) -> &str;
    /// See [`Listener::priority`].
    fn priority(&self) -> i32;
    /// See [`Listener::is_async`].
    fn is_async(&self) -> bool;
    /// See [`Listener::is_target`].
    fn is_target(&self, key: &Key) -> bool;
    /// See [`Listener::invoke`].
    fn invoke_dyn<'a>(
        &'a self,
        ctx: &'a EventListenerContext,
    ) -> BoxFuture<'a, Result<EventResult, BoxError>>;
}

impl<L: Listener> DynListener for L {
    fn id(&self) -> &str {
        Listener::id(self)
    }

    fn priority(&self) -> i32 {
        Listener::priority(self)
    }

    fn is_async(&self) -> bool {
        Listener::is_async(self)
    }

    fn is_target(&self, key: &Key) -> bool {
        Listener::is_target(self, key)
    }

    fn invoke_dyn<'a>(
        &'a self,
        ctx: &'a EventListenerContext,
    ) -> BoxFuture<'a, Result<EventResult, BoxError>> {
        Box::pin(self.invoke(ctx))
    }
}

impl std::fmt::Debug for dyn DynListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id())
            .field("priority", &self.priority())
            .field("async", &self.is_async())
            .finish()
    }
}

/// A listener gated by filters.
///
/// Filters run in priority order (ties keep insertion order). The first
/// filter that rejects the invocation supplies the result and the body is
/// skipped. A failing filter fails the invocation with a [`FilterError`].
pub struct Filtered<L> {
    listener: L,
    filters: Vec<Arc<dyn Filter>>,
}

impl<L> Filtered<L> {
    /// Wrap a listener with no filters.
    pub fn new(listener: L) -> Self {
        Self {
            listener,
            filters: Vec::new(),
        }
    }

    /// Add another filter.
    pub fn with_filter<F: Filter>(mut self, filter: F) -> Self {
        self.filters.push(Arc::new(filter));
        self.filters.sort_by_key(|filter| filter.priority());
        self
    }

    /// The filters, in evaluation order.
    pub fn filters(&self) -> &[Arc<dyn Filter>] {
        &self.filters
    }

    /// The wrapped listener.
    pub fn inner(&self) -> &L {
        &self.listener
    }
}

impl<L: Listener> Listener for Filtered<L> {
    fn id(&self) -> &str {
        self.listener.id()
    }

    fn priority(&self) -> i32 {
        self.listener.priority()
    }

    fn is_async(&self) -> bool {
        self.listener.is_async()
    }

    fn is_target(&self, key: &Key) -> bool {
        self.listener.is_target(key)
    }

    async fn invoke(&self, ctx: &EventListenerContext) -> Result<EventResult, BoxError> {
        if let Some(rejected) = evaluate_filters(&self.filters, ctx).map_err(FilterError)? {
            return Ok(rejected);
        }
        self.listener.invoke(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{context::EventProcessingContext, event::Event, key::KeyGraphBuilder};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Ping {
        key: Key,
    }

    impl Event for Ping {
        fn id(&self) -> &str {
            "ping-1"
        }

        fn key(&self) -> &Key {
            &self.key
        }

        fn plain_text(&self) -> Option<&str> {
            Some("ping")
        }
    }

    struct Pong {
        calls: Arc<AtomicUsize>,
    }

    impl Listener for Pong {
        fn id(&self) -> &str {
            "pong"
        }

        fn is_target(&self, _key: &Key) -> bool {
            true
        }

        async fn invoke(&self, _ctx: &EventListenerContext) -> Result<EventResult, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(EventResult::simple("pong"))
        }
    }

    struct TextIs(&'static str);

    impl Filter for TextIs {
        fn test(&self, ctx: &EventListenerContext) -> Result<bool, BoxError> {
            Ok(ctx.text_content().as_deref() == Some(self.0))
        }

        fn default_result(&self) -> EventResult {
            EventResult::simple("rejected")
        }
    }

    struct Broken;

    impl Filter for Broken {
        fn test(&self, _ctx: &EventListenerContext) -> Result<bool, BoxError> {
            Err("no text".into())
        }
    }

    fn context(listener: Arc<dyn DynListener>) -> EventListenerContext {
        let graph = KeyGraphBuilder::new().build().unwrap();
        let event: Arc<dyn Event> = Arc::new(Ping { key: graph.root() });
        EventListenerContext::new(Arc::new(EventProcessingContext::new(event)), listener)
    }

    #[tokio::test]
    async fn test_passing_filter_runs_body() {
        let calls = Arc::new(AtomicUsize::new(0));
        let listener = Pong {
            calls: calls.clone(),
        }
        .with_filter(TextIs("ping"))
        .into_dyn();
        let ctx = context(listener.clone());

        let result = listener.invoke_dyn(&ctx).await.unwrap();
        assert_eq!(result.value::<&str>(), Some(&"pong"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejecting_filter_skips_body() {
        let calls = Arc::new(AtomicUsize::new(0));
        let listener = Pong {
            calls: calls.clone(),
        }
        .with_filter(TextIs("hello"))
        .into_dyn();
        let ctx = context(listener.clone());

        let result = listener.invoke_dyn(&ctx).await.unwrap();
        assert_eq!(result.value::<&str>(), Some(&"rejected"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failing_filter_is_tagged() {
        let calls = Arc::new(AtomicUsize::new(0));
        let listener = Pong {
            calls: calls.clone(),
        }
        .with_filter(Broken)
        .into_dyn();
        let ctx = context(listener.clone());

        let err = listener.invoke_dyn(&ctx).await.unwrap_err();
        assert!(err.downcast_ref::<FilterError>().is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_filtered_keeps_metadata() {
        let listener = Pong {
            calls: Arc::default(),
        }
        .with_filter(TextIs("a"))
        .with_filter(Broken);
        assert_eq!(Listener::id(&listener), "pong");
        assert_eq!(Listener::priority(&listener), Priority::LOWEST);
        assert_eq!(listener.filters().len(), 2);
    }
}
