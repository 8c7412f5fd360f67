//! # hearken - Event Dispatch and Listener Management
//!
//! `hearken` is the event dispatch core for bot and IM applications. Adapters
//! push events; the [`EventListenerManager`] matches them against registered
//! listeners by event [`Key`], runs them in priority order inside two
//! interceptor chains, and streams back their results.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hearken::prelude::*;
//!
//! let keys = KeyGraphBuilder::new()
//!     .key("message", ["event"])
//!     .key("friend_message", ["message"])
//!     .build()?;
//!
//! let echo = FnListener::builder("echo")
//!     .target(keys.get("message").unwrap())
//!     .respond(|ctx| Ok(EventResult::simple(ctx.text_content())))
//!     .with_filter(TextFilter::starts_with("/echo"));
//!
//! let manager = EventListenerManager::builder().listener(echo).build()?;
//! let results: Vec<EventResult> = manager.push(event).collect().await;
//! ```
//!
//! ## Pipeline
//!
//! 1. A processing context is created for the event.
//! 2. Processing interceptors wrap everything below; one that does not call
//!    `proceed` suppresses the event.
//! 3. Continuous sessions waiting for a later event are resumed; an exclusive
//!    waiter claims the event.
//! 4. Each target listener runs inside the listener interceptors, behind its
//!    filters. Failures and panics become [`EventResult::Error`] entries and
//!    never abort the remaining listeners.
//! 5. Results are streamed in recording order; reactive results are
//!    flattened, spawned listeners contribute an [`EventResult::Async`]
//!    handle.

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod config;
mod dispatch;
mod manager;
mod registry;

pub use config::ManagerConfig;
pub use manager::{EventListenerManager, EventResultStream, ManagerBuilder};
pub use registry::{EnabledHandle, InterceptorHandle, ListenerHandle};

pub use hearken_core::{
    // Attributes
    AttributeKey,
    Attributes,
    // Results
    AsyncOutput,
    AsyncResult,
    // Errors
    BoxError,
    CloseReason,
    Content,
    // Sessions
    ContinuousSessions,
    DynListener,
    // Events
    Event,
    EventListenerContext,
    EventProcessingContext,
    EventResult,
    FailureKind,
    // Filters
    Filter,
    FilterError,
    Filtered,
    // Keys
    Key,
    KeyGraph,
    KeyGraphBuilder,
    KeyGraphError,
    // Listeners
    Listener,
    ListenerFailure,
    // Interceptors
    ListenerInterceptor,
    ListenerNext,
    Offer,
    Priority,
    ProcessingInterceptor,
    ProcessingNext,
    ReactiveResult,
    RegistrationError,
    Scope,
    SessionError,
    WaitOptions,
    async_trait,
    expect_event,
};

/// Standard filter implementations.
pub mod filters {
    #![allow(clippy::wildcard_imports)]
    pub use hearken_std::filters::*;
}

/// Standard interceptor implementations.
pub mod interceptors {
    #![allow(clippy::wildcard_imports)]
    pub use hearken_std::interceptors::*;
}

/// Standard listener implementations.
pub mod listeners {
    #![allow(clippy::wildcard_imports)]
    pub use hearken_std::listeners::*;
}

/// Testing utilities.
pub mod testing {
    #![allow(clippy::wildcard_imports)]
    pub use hearken_std::testing::*;
}

/// Prelude module - common imports for Hearken.
///
/// # Usage
///
/// ```rust,ignore
/// use hearken::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        BoxError, Event, EventListenerContext, EventListenerManager, EventResult, Filter, Key,
        KeyGraphBuilder, Listener, ListenerInterceptor, ListenerNext, ManagerConfig, Priority,
        ProcessingInterceptor, ProcessingNext, WaitOptions, async_trait,
        filters::{FnFilter, MatchType, TextFilter},
        listeners::FnListener,
    };
    pub use futures::StreamExt;
}
