//! Text preprocessing between filter checks.
//!
//! A [`Preprocess`] filter never rejects. It rewrites the listener context's
//! text content so that filters with a later priority, and the listener body,
//! see the processed text.

use hearken_core::{BoxError, EventListenerContext, Filter, Priority};

/// Rewrites the text content of one listener invocation.
pub trait TextPreprocessor: Send + Sync + 'static {
    /// Returns the new text; `None` clears it.
    fn process(&self, text: Option<String>) -> Option<String>;
}

/// Trims surrounding whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct Trim;

impl TextPreprocessor for Trim {
    fn process(&self, text: Option<String>) -> Option<String> {
        text.map(|text| text.trim().to_string())
    }
}

/// Lowercases the text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lowercase;

impl TextPreprocessor for Lowercase {
    fn process(&self, text: Option<String>) -> Option<String> {
        text.map(|text| text.to_lowercase())
    }
}

/// Strips a command prefix, clearing the text when the prefix is absent.
#[derive(Debug, Clone)]
pub struct StripPrefix(pub String);

impl TextPreprocessor for StripPrefix {
    fn process(&self, text: Option<String>) -> Option<String> {
        text.and_then(|text| text.strip_prefix(self.0.as_str()).map(str::to_string))
    }
}

/// A preprocessor backed by a closure.
pub struct FnPreprocessor<F>(pub F);

impl<F> TextPreprocessor for FnPreprocessor<F>
where
    F: Fn(Option<String>) -> Option<String> + Send + Sync + 'static,
{
    fn process(&self, text: Option<String>) -> Option<String> {
        (self.0)(text)
    }
}

/// A filter that applies a [`TextPreprocessor`] and always accepts.
pub struct Preprocess<P> {
    preprocessor: P,
    priority: i32,
}

impl<P: TextPreprocessor> Preprocess<P> {
    /// Run `preprocessor` at [`Priority::HIGH`], ahead of normal filters.
    pub fn new(preprocessor: P) -> Self {
        Self {
            preprocessor,
            priority: Priority::HIGH,
        }
    }

    /// Set the evaluation priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl<P: TextPreprocessor> Filter for Preprocess<P> {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn test(&self, ctx: &EventListenerContext) -> Result<bool, BoxError> {
        let text = self.preprocessor.process(ctx.text_content());
        ctx.set_text_content(text);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_preprocessors() {
        assert_eq!(Trim.process(Some("  hi \n".into())).as_deref(), Some("hi"));
        assert_eq!(Lowercase.process(Some("HeLLo".into())).as_deref(), Some("hello"));
        assert_eq!(Trim.process(None), None);
    }

    #[test]
    fn test_strip_prefix_clears_without_prefix() {
        let strip = StripPrefix("/echo ".into());
        assert_eq!(strip.process(Some("/echo hi".into())).as_deref(), Some("hi"));
        assert_eq!(strip.process(Some("hi".into())), None);
    }

    #[test]
    fn test_fn_preprocessor() {
        let reverse = FnPreprocessor(|text: Option<String>| text.map(|t| t.chars().rev().collect()));
        assert_eq!(reverse.process(Some("abc".into())).as_deref(), Some("cba"));
    }
}
