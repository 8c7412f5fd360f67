//! Timeout interceptor for time-limited listener execution.

use hearken_core::{
    BoxError, DynListener, EventListenerContext, EventResult, ListenerInterceptor, ListenerNext,
    Priority, async_trait,
};
use std::{collections::HashSet, time::Duration};
use thiserror::Error;
use tokio::time::timeout;

/// Error returned when a listener runs past its deadline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("listener `{listener}` timed out after {after:?}")]
pub struct TimeoutError {
    /// The listener that was cut off.
    pub listener: String,
    /// The configured deadline.
    pub after: Duration,
}

/// A listener interceptor that cuts off slow listeners.
///
/// A listener that exceeds the deadline records an interceptor failure
/// carrying a [`TimeoutError`]. Applies to every listener unless restricted
/// with [`only`](Self::only).
#[derive(Debug, Clone)]
pub struct TimeoutInterceptor {
    duration: Duration,
    priority: i32,
    only: Option<HashSet<String>>,
}

impl TimeoutInterceptor {
    /// Create a timeout interceptor at [`Priority::HIGH`].
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            priority: Priority::HIGH,
            only: None,
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Restrict the deadline to the listeners with these ids.
    pub fn only<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = Some(ids.into_iter().map(Into::into).collect());
        self
    }
}

#[async_trait]
impl ListenerInterceptor for TimeoutInterceptor {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn applies_to(&self, listener: &dyn DynListener) -> bool {
        self.only
            .as_ref()
            .is_none_or(|ids| ids.contains(listener.id()))
    }

    async fn intercept(
        &self,
        ctx: &EventListenerContext,
        next: ListenerNext<'_>,
    ) -> Result<EventResult, BoxError> {
        match timeout(self.duration, next.proceed(ctx)).await {
            Ok(result) => Ok(result),
            Err(_) => Err(Box::new(TimeoutError {
                listener: ctx.listener_id().to_string(),
                after: self.duration,
            })),
        }
    }
}
