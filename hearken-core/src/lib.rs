//! # hearken-core
//!
//! Core types for the Hearken event dispatch framework.
//!
//! This crate holds the vocabulary shared by adapters, plugins and the
//! dispatcher without pulling in the manager itself:
//!
//! - [`Key`] / [`KeyGraph`] - the multi-parent event type hierarchy used for
//!   subtype matching
//! - [`Event`] - an immutable value pushed by an adapter
//! - [`Listener`] / [`Filter`] - matched units of work and their gates
//! - [`ProcessingInterceptor`] / [`ListenerInterceptor`] - the two onion chains
//! - [`EventResult`] - the result model (simple, deferred, reactive, error)
//! - [`EventProcessingContext`] / [`EventListenerContext`] - per-event and
//!   per-invocation state
//! - [`ContinuousSessions`] - suspended listeners waiting for later values or
//!   events
//!
//! # Error Types
//!
//! - [`KeyGraphError`] - Key graph construction errors
//! - [`RegistrationError`] - Listener and interceptor registration errors
//! - [`SessionError`] - Continuous session errors

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod attribute;
mod context;
mod error;
mod event;
mod filter;
mod interceptor;
mod key;
mod listener;
mod priority;
mod result;
mod session;

// Re-exports
pub use attribute::{AttributeKey, Attributes, Scope};
pub use context::{EventListenerContext, EventProcessingContext, expect_event};
pub use error::{
    BoxError, CloseReason, FailureKind, FilterError, KeyGraphError,
    RegistrationError, SessionError,
};
pub use event::{AsAny, Event};
pub use filter::{Filter, evaluate_filters};
pub use interceptor::{
    ListenerChain, ListenerInterceptor, ListenerNext, ListenerTerminal, ProcessingChain,
    ProcessingInterceptor, ProcessingNext, ProcessingTerminal,
};
pub use key::{Key, KeyGraph, KeyGraphBuilder, ROOT_KEY};
pub use listener::{DynListener, Filtered, Listener};
pub use priority::Priority;
pub use result::{AsyncOutput, AsyncResult, Content, EventResult, ListenerFailure, ReactiveResult};
pub use session::{ContinuousSessions, Offer, WaitOptions};

/// Re-export of `async_trait` for implementing the interceptor traits.
pub use async_trait::async_trait;
