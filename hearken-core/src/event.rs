//! Event trait for values pushed through the dispatcher.

use crate::key::Key;
use std::any::Any;

/// Helper for recovering the concrete event type behind `dyn Event`.
///
/// Implemented for every `'static` type; never implement it by hand.
pub trait AsAny: Any {
    /// Upcast to `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An immutable event produced by an adapter.
///
/// Events are shared as `Arc<dyn Event>` for the duration of one dispatch.
///
/// # Example
///
/// ```rust,ignore
/// struct FriendMessage {
///     id: String,
///     key: Key,
///     text: String,
/// }
///
/// impl Event for FriendMessage {
///     fn id(&self) -> &str { &self.id }
///     fn key(&self) -> &Key { &self.key }
///     fn plain_text(&self) -> Option<&str> { Some(&self.text) }
/// }
/// ```
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a valid Event",
    label = "missing `Event` implementation",
    note = "Events must expose an id and a `Key` and be `Send + Sync + 'static`."
)]
pub trait Event: AsAny + Send + Sync + 'static {
    /// Process-unique id of this event.
    fn id(&self) -> &str;

    /// The key used to match listeners.
    fn key(&self) -> &Key;

    /// Plain text content used by text filters, if the event has any.
    fn plain_text(&self) -> Option<&str> {
        None
    }
}

impl dyn Event {
    /// Returns `true` if the concrete event type is `T`.
    pub fn is<T: Event>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Downcast to the concrete event type.
    pub fn downcast_ref<T: Event>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

impl std::fmt::Debug for dyn Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.id())
            .field("key", self.key())
            .finish()
    }
}
