//! Error types for Hearken.
//!
//! This module provides a structured error hierarchy using `thiserror`:
//!
//! - [`KeyGraphError`] - Errors while building the event key graph
//! - [`RegistrationError`] - Errors while registering listeners or interceptors
//! - [`SessionError`] - Errors reported to a suspended continuous-session waiter
//! - [`FailureKind`] - What failed when a listener produced an error result

use std::time::Duration;
use thiserror::Error;

/// A boxed error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by [`KeyGraphBuilder::build`](crate::KeyGraphBuilder::build).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyGraphError {
    /// Two keys were declared with the same id.
    #[error("event key `{0}` is declared more than once")]
    Duplicate(String),

    /// A key names a parent that was never declared.
    #[error("event key `{key}` names unknown parent `{parent}`")]
    UnknownParent {
        /// The key being declared.
        key: String,
        /// The missing parent id.
        parent: String,
    },

    /// The parent relation loops back on itself.
    #[error("event key graph contains a cycle through `{0}`")]
    Cycle(String),
}

/// Configuration errors reported synchronously at registration time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// A listener with the same id is already registered.
    #[error("listener id `{0}` is already registered")]
    DuplicateListenerId(String),

    /// An interceptor with the same id is already registered in that chain.
    #[error("interceptor id `{0}` is already registered")]
    DuplicateInterceptorId(String),

    /// The manager has been shut down.
    #[error("event listener manager has been shut down")]
    Shutdown,
}

/// Why a continuous session ended without delivering a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Closed explicitly through [`ContinuousSessions::close`](crate::ContinuousSessions::close).
    Closed(String),
    /// The wait deadline elapsed.
    Timeout(Duration),
    /// The dispatch that owned the waiter was cancelled, or the waiting
    /// listener was dropped before a value arrived.
    Cancelled,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::Closed(reason) => write!(f, "closed: {reason}"),
            CloseReason::Timeout(after) => write!(f, "timed out after {after:?}"),
            CloseReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Errors reported to a suspended continuous-session waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The session was closed before a value arrived.
    #[error("session `{key}` was closed: {reason}")]
    Closed {
        /// The session key.
        key: String,
        /// The reason given to `close`.
        reason: String,
    },

    /// No value arrived before the deadline.
    #[error("session `{key}` timed out after {after:?}")]
    Timeout {
        /// The session key.
        key: String,
        /// The configured deadline.
        after: Duration,
    },

    /// The dispatch owning the waiter was cancelled.
    #[error("session `{0}` was cancelled")]
    Cancelled(String),

    /// Another waiter already holds this key.
    #[error("session `{0}` is already waiting")]
    DuplicateKey(String),

    /// Nobody is waiting on this key.
    #[error("no session is waiting on `{0}`")]
    NotWaiting(String),

    /// The pushed value does not have the type the waiter expects.
    #[error("session `{key}` expected a value of type `{expected}`")]
    TypeMismatch {
        /// The session key.
        key: String,
        /// The type name the waiter asked for.
        expected: &'static str,
    },
}

impl SessionError {
    /// Returns `true` if this error comes from cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SessionError::Cancelled(_))
    }
}

/// What failed when a listener invocation produced an error result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The listener body returned an error.
    Listener,
    /// One of the listener's filters returned an error.
    Filter,
    /// An interceptor returned an error.
    Interceptor,
    /// The listener body panicked.
    Panic,
    /// The listener task was cancelled before it finished.
    Cancelled,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureKind::Listener => "listener",
            FailureKind::Filter => "filter",
            FailureKind::Interceptor => "interceptor",
            FailureKind::Panic => "panic",
            FailureKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Error returned by a filter; tags the cause so the dispatcher can report
/// [`FailureKind::Filter`].
#[derive(Error, Debug)]
#[error("filter failed: {0}")]
pub struct FilterError(#[source] pub BoxError);
