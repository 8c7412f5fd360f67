//! Synchronous predicates that gate a listener body.

use crate::{context::EventListenerContext, error::BoxError, priority::Priority, result::EventResult};
use std::sync::Arc;

/// A synchronous predicate over the listener context.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a `Filter`",
    label = "missing `Filter` implementation",
    note = "Filters must implement `test`; wrap a closure with `FnFilter` from hearken-std."
)]
pub trait Filter: Send + Sync + 'static {
    /// Lower values are evaluated first. Defaults to [`Priority::NORMAL`].
    fn priority(&self) -> i32 {
        Priority::NORMAL
    }

    /// Returns `Ok(false)` to reject the invocation.
    fn test(&self, ctx: &EventListenerContext) -> Result<bool, BoxError>;

    /// The result recorded instead of running the body when [`test`](Filter::test)
    /// rejects. Defaults to [`EventResult::Invalid`].
    fn default_result(&self) -> EventResult {
        EventResult::Invalid
    }
}

impl<F: Filter + ?Sized> Filter for Arc<F> {
    fn priority(&self) -> i32 {
        (**self).priority()
    }

    fn test(&self, ctx: &EventListenerContext) -> Result<bool, BoxError> {
        (**self).test(ctx)
    }

    fn default_result(&self) -> EventResult {
        (**self).default_result()
    }
}

/// Evaluate `filters` in slice order.
///
/// Returns the `default_result` of the first rejecting filter, or `None` when
/// every filter accepts. Evaluation stops at the first rejection or error.
pub fn evaluate_filters(
    filters: &[Arc<dyn Filter>],
    ctx: &EventListenerContext,
) -> Result<Option<EventResult>, BoxError> {
    for filter in filters {
        if !filter.test(ctx)? {
            return Ok(Some(filter.default_result()));
        }
    }
    Ok(None)
}
