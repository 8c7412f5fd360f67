//! Closure-backed listeners.

use futures::future::BoxFuture;
use hearken_core::{BoxError, EventListenerContext, EventResult, Key, Listener, Priority};

type AsyncBody = Box<
    dyn for<'a> Fn(&'a EventListenerContext) -> BoxFuture<'a, Result<EventResult, BoxError>>
        + Send
        + Sync,
>;
type SyncBody = Box<dyn Fn(&EventListenerContext) -> Result<EventResult, BoxError> + Send + Sync>;

enum Body {
    Async(AsyncBody),
    Sync(SyncBody),
}

/// A listener whose body is a closure.
///
/// # Example
///
/// ```rust,ignore
/// let echo = FnListener::builder("echo")
///     .target(keys.get("message").unwrap())
///     .respond(|ctx| Ok(EventResult::simple(ctx.text_content())));
///
/// let ask = FnListener::builder("ask")
///     .handle(|ctx| Box::pin(async move {
///         let answer: String = ctx.waiting("answer", WaitOptions::new()).await?;
///         Ok(EventResult::simple(answer))
///     }));
/// ```
pub struct FnListener {
    id: String,
    priority: i32,
    spawned: bool,
    targets: Vec<Key>,
    body: Body,
}

impl FnListener {
    /// Start building a listener with the given id.
    pub fn builder(id: impl Into<String>) -> FnListenerBuilder {
        FnListenerBuilder {
            id: id.into(),
            priority: Priority::LOWEST,
            spawned: false,
            targets: Vec::new(),
        }
    }

    /// The keys this listener targets; empty means every key.
    pub fn targets(&self) -> &[Key] {
        &self.targets
    }
}

impl Listener for FnListener {
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
        match &self.body {
            Body::Async(body) => body(ctx).await,
            Body::Sync(body) => body(ctx),
        }
    }
}

impl std::fmt::Debug for FnListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnListener")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("spawned", &self.spawned)
            .field("targets", &self.targets)
            .finish()
    }
}

/// Builder for [`FnListener`].
#[derive(Debug, Clone)]
pub struct FnListenerBuilder {
    id: String,
    priority: i32,
    spawned: bool,
    targets: Vec<Key>,
}

impl FnListenerBuilder {
    /// Set the priority; lower runs first.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Match events whose key is `key` or a subtype of it.
    pub fn target(mut self, key: Key) -> Self {
        self.targets.push(key);
        self
    }

    /// Match several keys.
    pub fn targets(mut self, keys: impl IntoIterator<Item = Key>) -> Self {
        self.targets.extend(keys);
        self
    }

    /// Run the body as a spawned task and record an `Async` handle for it.
    pub fn spawned(mut self) -> Self {
        self.spawned = true;
        self
    }

    /// Finish with an async body.
    pub fn handle<F>(self, body: F) -> FnListener
    where
        F: for<'a> Fn(&'a EventListenerContext) -> BoxFuture<'a, Result<EventResult, BoxError>>
            + Send
            + Sync
            + 'static,
    {
        self.finish(Body::Async(Box::new(body)))
    }

    /// Finish with a synchronous body.
    pub fn respond<F>(self, body: F) -> FnListener
    where
        F: Fn(&EventListenerContext) -> Result<EventResult, BoxError> + Send + Sync + 'static,
    {
        self.finish(Body::Sync(Box::new(body)))
    }

    fn finish(self, body: Body) -> FnListener {
        FnListener {
            id: self.id,
            priority: self.priority,
            spawned: self.spawned,
            targets: self.targets,
            body,
        }
    }
}
