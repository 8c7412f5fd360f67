//! The per-event pipeline.
//!
//! A dispatch walks the processing interceptor chain around a terminal that
//! first offers the event to continuous sessions and then runs every matched
//! listener in priority order. Each listener runs inside the listener
//! interceptor chain around [`InvokeListener`].

use crate::{
    config::ManagerConfig,
    registry::{ListenerInterceptors, ListenerRegistry, ProcessingInterceptors},
};
use futures::{FutureExt, future::BoxFuture};
use hearken_core::{
    AsyncResult, DynListener, Event, EventListenerContext, EventProcessingContext, EventResult,
    FailureKind, FilterError, ListenerChain, ListenerFailure, ListenerNext, ListenerTerminal,
    ProcessingNext, ProcessingTerminal,
};
use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

/// Shared state of one manager, owned by every dispatch task.
pub(crate) struct Dispatcher {
    pub(crate) config: ManagerConfig,
    pub(crate) listeners: Arc<ListenerRegistry>,
    pub(crate) processing: Arc<ProcessingInterceptors>,
    pub(crate) listener_interceptors: Arc<ListenerInterceptors>,
}

impl Dispatcher {
    pub(crate) fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            listeners: Arc::default(),
            processing: Arc::default(),
            listener_interceptors: Arc::default(),
        }
    }

    /// Run the whole pipeline for one event, then close its result stream.
    pub(crate) async fn dispatch(&self, ctx: Arc<EventProcessingContext>) {
        tracing::debug!(manager = %self.config.name, "dispatch started");

        let chain = self.processing.snapshot();
        let terminal = RunListeners {
            dispatcher: self,
            ctx: Arc::clone(&ctx),
        };
        if let Err(e) = ProcessingNext::new(chain.values(), &terminal)
            .proceed(&ctx)
            .await
        {
            tracing::error!(error = %e, "processing interceptor failed");
            ctx.record(EventResult::Error(ListenerFailure::new(
                None,
                FailureKind::Interceptor,
                e,
            )));
        }

        ctx.close_sink();
        tracing::debug!(
            results = ctx.result_count(),
            cancelled = ctx.is_cancelled(),
            "dispatch finished"
        );
    }
}

/// Terminal of the processing chain: session stage, then matched listeners.
struct RunListeners<'a> {
    dispatcher: &'a Dispatcher,
    ctx: Arc<EventProcessingContext>,
}

impl ProcessingTerminal for RunListeners<'_> {
    fn run<'a>(&'a self, _ctx: &'a EventProcessingContext) -> BoxFuture<'a, ()> {
        Box::pin(self.run_listeners())
    }
}

impl RunListeners<'_> {
    async fn run_listeners(&self) {
        let ctx = &self.ctx;
        let event = ctx.event();

        let offer = ctx.sessions().offer(event);
        if offer.claimed {
            tracing::debug!(resumed = offer.resumed, "event claimed by a continuous session");
            return;
        }

        let listeners = self.dispatcher.listeners.snapshot();
        let chain: ListenerChain = Arc::clone(self.dispatcher.listener_interceptors.snapshot().values());
        let catch_panics = self.dispatcher.config.catch_panics;

        let key = event.key();
        for entry in listeners
            .entries()
            .iter()
            .filter(|entry| entry.value().is_target(key))
        {
            if ctx.is_cancelled() {
                break;
            }
            if !entry.is_enabled() {
                tracing::trace!(listener = %entry.id(), "listener disabled; skipped");
                continue;
            }

            let listener = Arc::clone(entry.value());
            if listener.is_async() {
                let handle = spawn_listener(Arc::clone(ctx), listener, Arc::clone(&chain), catch_panics);
                ctx.record(EventResult::Async(handle));
                continue;
            }

            let listener_ctx = EventListenerContext::new(Arc::clone(ctx), listener);
            let terminal = InvokeListener { catch_panics };
            let result = tokio::select! {
                biased;
                _ = ctx.cancellation().cancelled() => break,
                result = ListenerNext::new(&chain, &terminal).proceed(&listener_ctx) => result,
            };

            report_failure(&result);
            if ctx.collect(entry.id(), result).await {
                tracing::debug!(listener = %entry.id(), "result truncated remaining listeners");
                break;
            }
        }
    }
}

/// Run an `is_async` listener as its own task and hand back its handle.
fn spawn_listener(
    ctx: Arc<EventProcessingContext>,
    listener: Arc<dyn DynListener>,
    chain: ListenerChain,
    catch_panics: bool,
) -> AsyncResult {
    let id = listener.id().to_string();
    let cancel = ctx.cancellation().clone();
    let task = tokio::spawn(async move {
        let listener_ctx = EventListenerContext::new(ctx, listener);
        let terminal = InvokeListener { catch_panics };
        let run = async {
            let result = ListenerNext::new(&chain, &terminal)
                .proceed(&listener_ctx)
                .await;
            report_failure(&result);
            result.settle().await
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            output = run => Some(output),
        }
    });

    AsyncResult::new(async move {
        match task.await {
            Ok(Some(output)) => output,
            Ok(None) => Err(ListenerFailure::new(
                Some(id),
                FailureKind::Cancelled,
                "dispatch cancelled",
            )),
            Err(e) => {
                let kind = if e.is_cancelled() {
                    FailureKind::Cancelled
                } else {
                    FailureKind::Panic
                };
                Err(ListenerFailure::new(Some(id), kind, e.to_string()))
            }
        }
    })
}

fn report_failure(result: &EventResult) {
    if let Some(failure) = result.failure() {
        tracing::warn!(
            listener = failure.listener_id().unwrap_or_default(),
            kind = %failure.kind(),
            error = %failure.cause(),
            "listener failed"
        );
    }
}

/// Terminal of the listener chain: filters and body, with failures turned
/// into [`EventResult::Error`].
pub(crate) struct InvokeListener {
    pub(crate) catch_panics: bool,
}

impl ListenerTerminal for InvokeListener {
    fn invoke<'a>(&'a self, ctx: &'a EventListenerContext) -> BoxFuture<'a, EventResult> {
        Box::pin(async move {
            let id = ctx.listener_id().to_string();
            let body = ctx.listener().invoke_dyn(ctx);
            let outcome = if self.catch_panics {
                AssertUnwindSafe(body).catch_unwind().await
            } else {
                Ok(body.await)
            };

            match outcome {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    let kind = if e.is::<FilterError>() {
                        FailureKind::Filter
                    } else {
                        FailureKind::Listener
                    };
                    EventResult::Error(ListenerFailure::new(Some(id), kind, e))
                }
                Err(panic) => EventResult::Error(ListenerFailure::new(
                    Some(id),
                    FailureKind::Panic,
                    panic_message(panic.as_ref()),
                )),
            }
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "listener panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearken_std::testing::{FailingListener, RecordingListener, TestEvent};
    use hearken_core::Listener;

    #[tokio::test]
    async fn test_invoke_listener_reports_panics() {
        let ctx = TestEvent::notice().listener_context(FailingListener::panicking("boom"));
        let result = InvokeListener { catch_panics: true }.invoke(&ctx).await;
        let failure = result.failure().unwrap();
        assert_eq!(failure.kind(), FailureKind::Panic);
        assert_eq!(failure.cause().to_string(), "listener panicked");
    }

    #[tokio::test]
    async fn test_invoke_listener_reports_errors() {
        let ctx = TestEvent::notice().listener_context(FailingListener::new("bad", "nope"));
        let result = InvokeListener { catch_panics: true }.invoke(&ctx).await;
        let failure = result.failure().unwrap();
        assert_eq!(failure.kind(), FailureKind::Listener);
        assert_eq!(failure.listener_id(), Some("bad"));
    }

    #[tokio::test]
    async fn test_spawned_listener_settles() {
        let recorder = RecordingListener::new("bg").with_result(EventResult::simple(3u8));
        let ctx = TestEvent::notice().processing_context();
        let handle = spawn_listener(ctx, recorder.clone().into_dyn(), Arc::from(Vec::new()), true);

        let content = handle.await_content().await.unwrap().unwrap();
        assert_eq!(content.downcast_ref::<u8>(), Some(&3));
        assert_eq!(recorder.count(), 1);
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42), "listener panicked");
    }
}
