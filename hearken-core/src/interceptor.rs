//! # Interceptor Chains
//!
//! Interceptors wrap a terminal operation in onion layers. Each layer gets the
//! context and a `Next` value; it may run code before and after
//! `next.proceed(ctx)`, or skip `proceed` to short-circuit the layers below.
//! `proceed` consumes `Next`, so a layer can call it at most once.
//!
//! - [`ProcessingInterceptor`] wraps "run every matched listener" for one event.
//! - [`ListenerInterceptor`] wraps "run this listener's filters and body".
//!
//! A chain is a priority-sorted slice frozen when interceptors are registered;
//! each dispatch walks the same slice.

use crate::{
    context::{EventListenerContext, EventProcessingContext},
    error::{BoxError, FailureKind},
    listener::DynListener,
    priority::Priority,
    result::{EventResult, ListenerFailure},
};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Wraps the whole per-event pipeline.
#[async_trait]
pub trait ProcessingInterceptor: Send + Sync + 'static {
    /// Lower values are outer layers. Defaults to [`Priority::NORMAL`].
    fn priority(&self) -> i32 {
        Priority::NORMAL
    }

    /// Run this layer. Not calling `next.proceed` suppresses the event.
    async fn intercept(
        &self,
        ctx: &EventProcessingContext,
        next: ProcessingNext<'_>,
    ) -> Result<(), BoxError>;
}

/// Wraps one listener invocation.
#[async_trait]
pub trait ListenerInterceptor: Send + Sync + 'static {
    /// Lower values are outer layers. Defaults to [`Priority::NORMAL`].
    fn priority(&self) -> i32 {
        Priority::NORMAL
    }

    /// Whether this layer wraps `listener`. Defaults to every listener.
    fn applies_to(&self, _listener: &dyn DynListener) -> bool {
        true
    }

    /// Run this layer. The returned result replaces the listener's result.
    async fn intercept(
        &self,
        ctx: &EventListenerContext,
        next: ListenerNext<'_>,
    ) -> Result<EventResult, BoxError>;
}

/// The operation at the core of the processing chain.
pub trait ProcessingTerminal: Send + Sync {
    /// Run every matched listener.
    fn run<'a>(&'a self, ctx: &'a EventProcessingContext) -> BoxFuture<'a, ()>;
}

/// The operation at the core of the listener chain.
pub trait ListenerTerminal: Send + Sync {
    /// Run filters and body; failures are reported as results.
    fn invoke<'a>(&'a self, ctx: &'a EventListenerContext) -> BoxFuture<'a, EventResult>;
}

/// The frozen processing chain.
pub type ProcessingChain = Arc<[Arc<dyn ProcessingInterceptor>]>;

/// The frozen listener chain.
pub type ListenerChain = Arc<[Arc<dyn ListenerInterceptor>]>;

/// The rest of a processing chain.
pub struct ProcessingNext<'a> {
    chain: &'a [Arc<dyn ProcessingInterceptor>],
    terminal: &'a dyn ProcessingTerminal,
}

impl<'a> ProcessingNext<'a> {
    /// Start a walk of `chain` ending at `terminal`.
    pub fn new(
        chain: &'a [Arc<dyn ProcessingInterceptor>],
        terminal: &'a dyn ProcessingTerminal,
    ) -> Self {
        Self { chain, terminal }
    }

    /// Run the remaining layers and the terminal.
    pub async fn proceed(self, ctx: &EventProcessingContext) -> Result<(), BoxError> {
        match self.chain.split_first() {
            Some((layer, rest)) => {
                let next = ProcessingNext {
                    chain: rest,
                    terminal: self.terminal,
                };
                layer.intercept(ctx, next).await
            }
            None => {
                self.terminal.run(ctx).await;
                Ok(())
            }
        }
    }
}

/// The rest of a listener chain.
pub struct ListenerNext<'a> {
    chain: &'a [Arc<dyn ListenerInterceptor>],
    terminal: &'a dyn ListenerTerminal,
}

impl<'a> ListenerNext<'a> {
    /// Start a walk of `chain` ending at `terminal`.
    pub fn new(
        chain: &'a [Arc<dyn ListenerInterceptor>],
        terminal: &'a dyn ListenerTerminal,
    ) -> Self {
        Self { chain, terminal }
    }

    /// Run the remaining layers and the terminal.
    ///
    /// Layers that do not apply to the current listener are skipped. A layer
    /// that fails turns into an [`EventResult::Error`] seen by the layers
    /// above it.
    pub async fn proceed(self, ctx: &EventListenerContext) -> EventResult {
        let listener = ctx.listener();
        let Some(position) = self
            .chain
            .iter()
            .position(|layer| layer.applies_to(listener))
        else {
            return self.terminal.invoke(ctx).await;
        };

        let layer = &self.chain[position];
        let next = ListenerNext {
            chain: &self.chain[position + 1..],
            terminal: self.terminal,
        };
        match layer.intercept(ctx, next).await {
            Ok(result) => result,
            Err(e) => EventResult::Error(ListenerFailure::new(
                Some(ctx.listener_id().to_string()),
                FailureKind::Interceptor,
                e,
            )),
        }
    }
}
