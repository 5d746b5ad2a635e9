//! Match specifiers for event subscriptions.
//!
//! A subscription carries an ordered list of [`Matcher`]s. The list matches an
//! [`Update`] when the first satisfied condition among the following is found,
//! checked matcher by matcher:
//!
//! 1. **Structural**: a text matcher equal to a field name present on the
//!    update (`"callback_query"` matches every callback query).
//! 2. **`"text"` alias**: matches any update carrying a `message` or a
//!    `channel_post`, whether or not that payload has text.
//! 3. **`"edit"` alias**: matches any update carrying an `edited_message` or
//!    an `edited_channel_post`.
//! 4. **Content**: against the message text (or channel post text). A text
//!    matcher is searched as a regular expression, or as literal text when it
//!    is not a valid one:
//!    - a text matcher starting with `/` must find its first match at
//!      position 0 (`"/start|/go"` accepts both commands),
//!    - any other text matcher must be found somewhere in the text,
//!    - a pattern matcher must match somewhere in the text.
//!
//! ```rust,ignore
//! use telewire_core::Matcher;
//!
//! let matchers = vec![
//!     Matcher::from("/start"),          // command prefix
//!     Matcher::from("callback_query"),  // structural
//!     Matcher::pattern(r"(?i)hello")?,  // content pattern
//! ];
//! ```

use std::fmt;

use regex::Regex;

use crate::error::MatcherError;
use crate::update::Update;

/// Alias matching any message or channel post.
pub const TEXT_ALIAS: &str = "text";

/// Alias matching any edited message or edited channel post.
pub const EDIT_ALIAS: &str = "edit";

/// A string matcher with its content search compiled once.
#[derive(Clone)]
pub struct TextMatcher {
    value: String,
    search: Option<Regex>,
}

impl TextMatcher {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        // Not every field name or phrase is valid regex syntax.
        let search = Regex::new(&value).ok();
        Self { value, search }
    }

    /// The string as given.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Whether the content search runs as a regular expression.
    pub fn is_pattern(&self) -> bool {
        self.search.is_some()
    }

    /// Byte offset of the first match in `text`.
    pub fn search(&self, text: &str) -> Option<usize> {
        match &self.search {
            Some(re) => re.find(text).map(|m| m.start()),
            None => text.find(self.value.as_str()),
        }
    }
}

/// One caller-supplied match specifier.
#[derive(Clone)]
pub enum Matcher {
    /// A string: field name, alias, command or search pattern.
    Text(TextMatcher),
    /// A regular expression run against the text payload.
    Pattern(Regex),
}

impl Matcher {
    /// Creates a text matcher.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(TextMatcher::new(value))
    }

    /// Compiles a pattern matcher, failing fast on invalid syntax.
    pub fn pattern(pattern: &str) -> Result<Self, MatcherError> {
        Regex::new(pattern)
            .map(Self::Pattern)
            .map_err(|e| MatcherError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
    }

    /// Returns `true` for `/`-prefixed text matchers.
    pub fn is_command(&self) -> bool {
        matches!(self, Self::Text(t) if t.as_str().starts_with('/'))
    }

    /// Checks only the content rule against a piece of text.
    pub fn matches_content(&self, text: &str) -> bool {
        match self {
            Self::Text(t) if t.as_str().starts_with('/') => t.search(text) == Some(0),
            Self::Text(t) => t.search(text).is_some(),
            Self::Pattern(re) => re.is_match(text),
        }
    }

    /// Checks this single matcher against an update, in rule order.
    pub fn matches(&self, update: &Update) -> bool {
        if let Self::Text(t) = self {
            let name = t.as_str();
            if update.has_field(name) {
                return true;
            }
            if name == TEXT_ALIAS
                && (update.populated("channel_post").is_some()
                    || update.populated("message").is_some())
            {
                return true;
            }
            if name == EDIT_ALIAS
                && (update.populated("edited_message").is_some()
                    || update.populated("edited_channel_post").is_some())
            {
                return true;
            }
        }

        update.text().is_some_and(|text| self.matches_content(text))
    }
}

/// Returns `true` if any matcher in the list accepts the update.
///
/// Stops at the first matcher that matches. An empty list never matches.
pub fn matches_any(matchers: &[Matcher], update: &Update) -> bool {
    matchers.iter().any(|m| m.matches(update))
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(t) => f.debug_tuple("Text").field(&t.as_str()).finish(),
            Self::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(t) => write!(f, "{:?}", t.as_str()),
            Self::Pattern(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

impl From<&str> for Matcher {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for Matcher {
    fn from(value: String) -> Self {
        Self::text(value)
    }
}

impl From<Regex> for Matcher {
    fn from(value: Regex) -> Self {
        Self::Pattern(value)
    }
}
