//! Logging interceptors for event observation.

use hearken_core::{
    BoxError, Event, EventListenerContext, EventProcessingContext, EventResult, ListenerInterceptor,
    ListenerNext, Priority, ProcessingInterceptor, ProcessingNext, async_trait,
};
use std::time::Instant;

/// A processing interceptor that logs each event around the whole pipeline.
///
/// Runs as the outermost layer by default.
#[derive(Debug, Clone, Copy)]
pub struct TracingInterceptor {
    priority: i32,
}

impl TracingInterceptor {
    /// Create an interceptor at [`Priority::HIGHEST`].
    pub fn new() -> Self {
        Self {
            priority: Priority::HIGHEST,
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl Default for TracingInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessingInterceptor for TracingInterceptor {
    fn priority(&self) -> i32 {
        self.priority
    }

    async fn intercept(
        &self,
        ctx: &EventProcessingContext,
        next: ProcessingNext<'_>,
    ) -> Result<(), BoxError> {
        let event = ctx.event();
        tracing::info!(event_id = %event.id(), event_key = %event.key(), "Processing event");
        let started = Instant::now();
        let outcome = next.proceed(ctx).await;
        match &outcome {
            Ok(()) => tracing::info!(
                event_id = %event.id(),
                results = ctx.result_count(),
                elapsed = ?started.elapsed(),
                "Processed event"
            ),
            Err(e) => tracing::error!(event_id = %event.id(), error = %e, "Event processing failed"),
        }
        outcome
    }
}

/// A listener interceptor that logs each invocation and its outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingInterceptor;

#[async_trait]
impl ListenerInterceptor for LoggingInterceptor {
    async fn intercept(
        &self,
        ctx: &EventListenerContext,
        next: ListenerNext<'_>,
    ) -> Result<EventResult, BoxError> {
        let listener = ctx.listener_id().to_string();
        tracing::debug!(listener = %listener, event_id = %ctx.event().id(), "Invoking listener");
        let result = next.proceed(ctx).await;
        match &result {
            EventResult::Error(failure) => {
                tracing::warn!(listener = %listener, kind = %failure.kind(), error = %failure.cause(), "Listener failed");
            }
            other => tracing::debug!(listener = %listener, result = ?other, "Listener finished"),
        }
        Ok(result)
    }
}
