//! Standard filter implementations.

pub mod preprocess;
pub mod text;

pub use preprocess::{FnPreprocessor, Lowercase, Preprocess, StripPrefix, TextPreprocessor, Trim};
pub use text::{MatchType, TextFilter};

use hearken_core::{BoxError, EventListenerContext, EventResult, Filter, Priority};

/// A filter backed by a closure.
///
/// ```rust,ignore
/// let from_admin = FnFilter::new(|ctx| Ok(ctx.event().is::<AdminMessage>()))
///     .with_priority(Priority::HIGH);
/// ```
pub struct FnFilter<F> {
    predicate: F,
    priority: i32,
    default_result: EventResult,
}

impl<F> FnFilter<F>
where
    F: Fn(&EventListenerContext) -> Result<bool, BoxError> + Send + Sync + 'static,
{
    /// Create a filter with [`Priority::NORMAL`] and an `Invalid` default result.
    pub fn new(predicate: F) -> Self {
        Self {
            predicate,
            priority: Priority::NORMAL,
            default_result: EventResult::Invalid,
        }
    }

    /// Set the evaluation priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the result recorded when the predicate rejects.
    pub fn with_default_result(mut self, result: EventResult) -> Self {
        self.default_result = result;
        self
    }
}

impl<F> Filter for FnFilter<F>
where
    F: Fn(&EventListenerContext) -> Result<bool, BoxError> + Send + Sync + 'static,
{
    fn priority(&self) -> i32 {
        self.priority
    }

    fn test(&self, ctx: &EventListenerContext) -> Result<bool, BoxError> {
        (self.predicate)(ctx)
    }

    fn default_result(&self) -> EventResult {
        self.default_result.clone()
    }
}
