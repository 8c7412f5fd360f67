//! Text matching against the listener context's current text content.

use hearken_core::{BoxError, EventListenerContext, EventResult, Filter, Priority};
use regex::Regex;

/// How a [`TextFilter`] compares the text content with its pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    /// The whole text equals the pattern.
    TextEquals,
    /// The whole text equals the pattern, ignoring case.
    TextEqualsIgnoreCase,
    /// The text starts with the pattern.
    TextStartsWith,
    /// The text ends with the pattern.
    TextEndsWith,
    /// The text contains the pattern.
    TextContains,
    /// The whole text matches the regex.
    RegexMatches,
    /// Some part of the text matches the regex.
    RegexContains,
}

impl MatchType {
    /// Returns `true` for the regex-based match types.
    pub fn is_regex(self) -> bool {
        matches!(self, MatchType::RegexMatches | MatchType::RegexContains)
    }
}

enum Matcher {
    Literal(String),
    Regex(Regex),
}

/// Accepts invocations whose text content matches a pattern.
///
/// Events without text content, or whose text was cleared by a
/// preprocessor, never match.
pub struct TextFilter {
    match_type: MatchType,
    matcher: Matcher,
    priority: i32,
    default_result: EventResult,
}

impl TextFilter {
    /// Create a filter. Regex patterns are compiled here.
    pub fn new(match_type: MatchType, pattern: impl Into<String>) -> Result<Self, regex::Error> {
        let pattern = pattern.into();
        let matcher = match match_type {
            MatchType::RegexMatches => Matcher::Regex(Regex::new(&format!("^(?:{pattern})$"))?),
            MatchType::RegexContains => Matcher::Regex(Regex::new(&pattern)?),
            MatchType::TextEqualsIgnoreCase => Matcher::Literal(pattern.to_lowercase()),
            _ => Matcher::Literal(pattern),
        };
        Ok(Self {
            match_type,
            matcher,
            priority: Priority::NORMAL,
            default_result: EventResult::Invalid,
        })
    }

    /// Shorthand for [`MatchType::TextEquals`].
    pub fn equals(text: impl Into<String>) -> Self {
        Self::literal(MatchType::TextEquals, text.into())
    }

    /// Shorthand for [`MatchType::TextStartsWith`].
    pub fn starts_with(prefix: impl Into<String>) -> Self {
        Self::literal(MatchType::TextStartsWith, prefix.into())
    }

    /// Shorthand for [`MatchType::TextContains`].
    pub fn contains(text: impl Into<String>) -> Self {
        Self::literal(MatchType::TextContains, text.into())
    }

    fn literal(match_type: MatchType, pattern: String) -> Self {
        Self {
            match_type,
            matcher: Matcher::Literal(pattern),
            priority: Priority::NORMAL,
            default_result: EventResult::Invalid,
        }
    }

    /// Set the evaluation priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the result recorded when the text does not match.
    pub fn with_default_result(mut self, result: EventResult) -> Self {
        self.default_result = result;
        self
    }

    /// The match type.
    pub fn match_type(&self) -> MatchType {
        self.match_type
    }

    /// Test `text` against the pattern.
    pub fn matches(&self, text: &str) -> bool {
        match &self.matcher {
            Matcher::Regex(regex) => regex.is_match(text),
            Matcher::Literal(pattern) => match self.match_type {
                MatchType::TextEquals => text == pattern,
                MatchType::TextEqualsIgnoreCase => text.to_lowercase() == *pattern,
                MatchType::TextStartsWith => text.starts_with(pattern.as_str()),
                MatchType::TextEndsWith => text.ends_with(pattern.as_str()),
                MatchType::TextContains => text.contains(pattern.as_str()),
                MatchType::RegexMatches | MatchType::RegexContains => false,
            },
        }
    }
}

impl Filter for TextFilter {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn test(&self, ctx: &EventListenerContext) -> Result<bool, BoxError> {
        Ok(ctx
            .text_content()
            .is_some_and(|text| self.matches(&text)))
    }

    fn default_result(&self) -> EventResult {
        self.default_result.clone()
    }
}

impl std::fmt::Debug for TextFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pattern = match &self.matcher {
            Matcher::Literal(pattern) => pattern.as_str(),
            Matcher::Regex(regex) => regex.as_str(),
        };
        f.debug_struct("TextFilter")
            .field("match_type", &self.match_type)
            .field("pattern", &pattern)
            .field("priority", &self.priority)
            .finish()
    }
}
