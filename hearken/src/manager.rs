//! # Event Listener Manager
//!
//! The [`EventListenerManager`] owns the listener registry, both interceptor
//! chains, the global attribute scope and the continuous session registry.
//! [`push`](EventListenerManager::push) starts one dispatch task per event
//! and returns the results as a stream.

use crate::{
    config::ManagerConfig,
    dispatch::Dispatcher,
    registry::{InterceptorHandle, ListenerHandle},
};
use futures::Stream;
use hearken_core::{
    AttributeKey, Attributes, ContinuousSessions, DynListener, Event, EventProcessingContext,
    EventResult, Listener, ListenerInterceptor, ProcessingInterceptor, RegistrationError,
};
use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// The central dispatcher.
///
/// # Example
///
/// ```rust,ignore
/// let manager = EventListenerManager::builder()
///     .config(ManagerConfig::new().with_name("bot"))
///     .listener(echo)
///     .build()?;
///
/// let mut results = manager.push(event);
/// while let Some(result) = results.next().await {
///     println!("{result:?}");
/// }
/// ```
pub struct EventListenerManager {
    dispatcher: Arc<Dispatcher>,
    global: Attributes,
    sessions: ContinuousSessions,
    shutdown: CancellationToken,
}

impl Default for EventListenerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl EventListenerManager {
    /// Create a manager with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ManagerConfig::default())
    }

    /// Create a manager with `config`.
    pub fn with_config(config: ManagerConfig) -> Self {
        let sessions = ContinuousSessions::new(config.default_session_timeout);
        Self {
            dispatcher: Arc::new(Dispatcher::new(config)),
            global: Attributes::new(),
            sessions,
            shutdown: CancellationToken::new(),
        }
    }

    /// Start assembling a manager.
    pub fn builder() -> ManagerBuilder {
        ManagerBuilder::default()
    }

    /// The configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.dispatcher.config
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    /// Register a listener.
    ///
    /// Fails if a listener with the same id is registered.
    pub fn register_listener<L: Listener>(
        &self,
        listener: L,
    ) -> Result<ListenerHandle, RegistrationError> {
        self.register_dyn_listener(listener.into_dyn())
    }

    /// Register a type-erased listener.
    pub fn register_dyn_listener(
        &self,
        listener: Arc<dyn DynListener>,
    ) -> Result<ListenerHandle, RegistrationError> {
        self.ensure_running()?;
        let id = listener.id().to_string();
        let registry = &self.dispatcher.listeners;
        let enabled = registry
            .insert(id.clone(), listener.priority(), listener)
            .ok_or_else(|| RegistrationError::DuplicateListenerId(id.clone()))?;
        tracing::debug!(listener = %id, "listener registered");
        Ok(ListenerHandle::new(id, enabled, registry))
    }

    /// Unregister a listener by id. Returns `false` if none was registered.
    pub fn unregister_listener(&self, id: &str) -> bool {
        self.dispatcher.listeners.remove(id)
    }

    /// Ids of the registered listeners, in dispatch order.
    pub fn listener_ids(&self) -> Vec<String> {
        self.dispatcher.listeners.ids()
    }

    /// Add a layer to the processing chain.
    pub fn register_processing_interceptor<I: ProcessingInterceptor>(
        &self,
        id: impl Into<String>,
        interceptor: I,
    ) -> Result<InterceptorHandle, RegistrationError> {
        self.register_dyn_processing_interceptor(id, Arc::new(interceptor))
    }

    /// Add a type-erased layer to the processing chain.
    pub fn register_dyn_processing_interceptor(
        &self,
        id: impl Into<String>,
        interceptor: Arc<dyn ProcessingInterceptor>,
    ) -> Result<InterceptorHandle, RegistrationError> {
        self.ensure_running()?;
        let id = id.into();
        let chain = &self.dispatcher.processing;
        chain
            .insert(id.clone(), interceptor.priority(), interceptor)
            .ok_or_else(|| RegistrationError::DuplicateInterceptorId(id.clone()))?;
        tracing::debug!(interceptor = %id, "processing interceptor registered");
        Ok(InterceptorHandle::new(id, chain))
    }

    /// Add a layer to the listener chain.
    pub fn register_listener_interceptor<I: ListenerInterceptor>(
        &self,
        id: impl Into<String>,
        interceptor: I,
    ) -> Result<InterceptorHandle, RegistrationError> {
        self.register_dyn_listener_interceptor(id, Arc::new(interceptor))
    }

    /// Add a type-erased layer to the listener chain.
    pub fn register_dyn_listener_interceptor(
        &self,
        id: impl Into<String>,
        interceptor: Arc<dyn ListenerInterceptor>,
    ) -> Result<InterceptorHandle, RegistrationError> {
        self.ensure_running()?;
        let id = id.into();
        let chain = &self.dispatcher.listener_interceptors;
        chain
            .insert(id.clone(), interceptor.priority(), interceptor)
            .ok_or_else(|| RegistrationError::DuplicateInterceptorId(id.clone()))?;
        tracing::debug!(interceptor = %id, "listener interceptor registered");
        Ok(InterceptorHandle::new(id, chain))
    }

    fn ensure_running(&self) -> Result<(), RegistrationError> {
        if self.shutdown.is_cancelled() {
            return Err(RegistrationError::Shutdown);
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    /// Dispatch `event` and stream its results as they are recorded.
    ///
    /// The dispatch runs as its own task, so this must be called from within
    /// a Tokio runtime. Dropping the stream does not stop the dispatch; use
    /// [`EventResultStream::cancel`] for that. After
    /// [`shutdown`](Self::shutdown) the returned stream is empty.
    pub fn push(&self, event: Arc<dyn Event>) -> EventResultStream {
        let cancel = self.shutdown.child_token();
        let (sender, receiver) = mpsc::unbounded_channel();
        let stream = EventResultStream {
            receiver,
            cancel: cancel.clone(),
        };
        if self.shutdown.is_cancelled() {
            tracing::debug!(event_id = %event.id(), "manager shut down; event dropped");
            return stream;
        }

        let span = tracing::info_span!(
            "dispatch",
            event_id = %event.id(),
            event_key = %event.key(),
        );
        let ctx = EventProcessingContext::new(event)
            .with_global(self.global.clone())
            .with_sessions(self.sessions.clone())
            .with_cancellation(cancel)
            .with_sink(sender);
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move { dispatcher.dispatch(Arc::new(ctx)).await }.instrument(span));
        stream
    }

    // ------------------------------------------------------------------------
    // Shared state
    // ------------------------------------------------------------------------

    /// The continuous session registry, for `push` and `close`.
    pub fn sessions(&self) -> &ContinuousSessions {
        &self.sessions
    }

    /// The global attribute scope shared by every dispatch.
    pub fn global_attributes(&self) -> &Attributes {
        &self.global
    }

    /// Cancel every in-flight dispatch, close every session and refuse
    /// further registrations and pushes.
    pub fn shutdown(&self) {
        tracing::info!(manager = %self.dispatcher.config.name, "shutting down");
        self.shutdown.cancel();
        self.sessions.close_all("manager shut down");
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) was called.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl std::fmt::Debug for EventListenerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventListenerManager")
            .field("name", &self.dispatcher.config.name)
            .field("listeners", &self.dispatcher.listeners.len())
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

// ============================================================================
// EventResultStream
// ============================================================================

/// The results of one dispatch, in recording order.
///
/// The stream ends once the dispatch has finished.
pub struct EventResultStream {
    receiver: mpsc::UnboundedReceiver<EventResult>,
    cancel: CancellationToken,
}

impl EventResultStream {
    /// Cancel the dispatch. Running listeners and the session waits they
    /// registered are cancelled; nothing further is recorded.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns `true` once the dispatch was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A token that cancels this dispatch.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Stream for EventResultStream {
    type Item = EventResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl std::fmt::Debug for EventResultStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventResultStream")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

// ============================================================================
// ManagerBuilder
// ============================================================================

type GlobalInit = Box<dyn FnOnce(&Attributes) + Send>;

/// Builder for [`EventListenerManager`].
///
/// Registrations are applied in order by [`build`](Self::build); the first
/// duplicate id fails the build.
#[derive(Default)]
pub struct ManagerBuilder {
    config: ManagerConfig,
    listeners: Vec<Arc<dyn DynListener>>,
    processing: Vec<(String, Arc<dyn ProcessingInterceptor>)>,
    listener_interceptors: Vec<(String, Arc<dyn ListenerInterceptor>)>,
    globals: Vec<GlobalInit>,
}

impl ManagerBuilder {
    /// Use `config`.
    pub fn config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a listener.
    pub fn listener<L: Listener>(mut self, listener: L) -> Self {
        self.listeners.push(listener.into_dyn());
        self
    }

    /// Add a processing interceptor.
    pub fn processing_interceptor<I: ProcessingInterceptor>(
        mut self,
        id: impl Into<String>,
        interceptor: I,
    ) -> Self {
        self.processing.push((id.into(), Arc::new(interceptor)));
        self
    }

    /// Add a listener interceptor.
    pub fn listener_interceptor<I: ListenerInterceptor>(
        mut self,
        id: impl Into<String>,
        interceptor: I,
    ) -> Self {
        self.listener_interceptors
            .push((id.into(), Arc::new(interceptor)));
        self
    }

    /// Seed a global attribute.
    pub fn global_attribute<T: Send + Sync + 'static>(mut self, key: AttributeKey<T>, value: T) -> Self {
        self.globals.push(Box::new(move |attributes: &Attributes| {
            attributes.insert(key, value);
        }));
        self
    }

    /// Build the manager.
    pub fn build(self) -> Result<EventListenerManager, RegistrationError> {
        let manager = EventListenerManager::with_config(self.config);
        for init in self.globals {
            init(&manager.global);
        }
        for listener in self.listeners {
            manager.register_dyn_listener(listener)?;
        }
        for (id, interceptor) in self.processing {
            manager.register_dyn_processing_interceptor(id, interceptor)?;
        }
        for (id, interceptor) in self.listener_interceptors {
            manager.register_dyn_listener_interceptor(id, interceptor)?;
        }
        Ok(manager)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearken_std::testing::RecordingListener;

    #[test]
    fn test_duplicate_listener_rejected() {
        let manager = EventListenerManager::new();
        manager
            .register_listener(RecordingListener::new("echo"))
            .unwrap();
        let err = manager
            .register_listener(RecordingListener::new("echo"))
            .unwrap_err();
        assert_eq!(err, RegistrationError::DuplicateListenerId("echo".into()));
        assert_eq!(manager.listener_ids(), ["echo"]);
    }

    #[test]
    fn test_builder_fails_on_duplicate() {
        let result = EventListenerManager::builder()
            .listener(RecordingListener::new("a"))
            .listener(RecordingListener::new("a"))
            .build();
        assert!(matches!(
            result,
            Err(RegistrationError::DuplicateListenerId(_))
        ));
    }

    #[test]
    fn test_builder_seeds_globals() {
        const BOT: AttributeKey<&str> = AttributeKey::new("bot");
        let manager = EventListenerManager::builder()
            .global_attribute(BOT, "hearken")
            .build()
            .unwrap();
        assert_eq!(manager.global_attributes().get(BOT).as_deref(), Some(&"hearken"));
    }

    #[test]
    fn test_shutdown_refuses_registration() {
        let manager = EventListenerManager::new();
        manager.shutdown();
        assert!(manager.is_shut_down());
        assert_eq!(
            manager
                .register_listener(RecordingListener::new("late"))
                .unwrap_err(),
            RegistrationError::Shutdown
        );
    }
}
