//! Glob key patterns used by invalidation and `delete_pattern`.
//!
//! Semantics are those of the `glob` crate with default match options, applied
//! to the whole key:
//!
//! - `*` matches any run of characters, `:` included (`user:*` matches `user:1:profile`)
//! - `?` matches exactly one character
//! - `[abc]`, `[a-z]`, `[!abc]` match one character from (or outside) a class
//!
//! Matching is case sensitive. A malformed pattern (for example an unclosed
//! `[`) is rejected when the pattern is built.

use crate::error::Result;
use glob::{MatchOptions, Pattern};
use std::fmt;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// A compiled key pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyPattern {
    compiled: Pattern,
}

impl KeyPattern {
    /// Compile a glob pattern.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPattern` if the pattern is malformed.
    pub fn new(pattern: &str) -> Result<Self> {
        let compiled = Pattern::new(pattern)?;
        Ok(KeyPattern { compiled })
    }

    pub fn matches(&self, key: &str) -> bool {
        self.compiled.matches_with(key, MATCH_OPTIONS)
    }

    pub fn as_str(&self) -> &str {
        self.compiled.as_str()
    }

    /// Literal prefix before the first wildcard, used to narrow server-side scans.
    pub fn literal_prefix(&self) -> &str {
        let raw = self.compiled.as_str();
        let end = raw.find(['*', '?', '[']).unwrap_or(raw.len());
        &raw[..end]
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_star_crosses_separators() {
        let pattern = KeyPattern::new("user:*").unwrap();
        assert!(pattern.matches("user:1"));
        assert!(pattern.matches("user:1:profile"));
        assert!(pattern.matches("user:"));
        assert!(!pattern.matches("order:1"));
        assert!(!pattern.matches("users:1"));
    }

    #[test]
    fn test_question_mark_and_classes() {
        let pattern = KeyPattern::new("session:?[0-9]").unwrap();
        assert!(pattern.matches("session:a1"));
        assert!(!pattern.matches("session:ab"));
        assert!(!pattern.matches("session:a12"));
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let pattern = KeyPattern::new("User:*").unwrap();
        assert!(!pattern.matches("user:1"));
    }

    #[test]
    fn test_malformed_pattern_rejected() {
        let result = KeyPattern::new("user:[");
        assert!(matches!(result, Err(Error::InvalidPattern(_))));
    }

    #[test]
    fn test_literal_prefix() {
        assert_eq!(KeyPattern::new("user:*").unwrap().literal_prefix(), "user:");
        assert_eq!(KeyPattern::new("a?c").unwrap().literal_prefix(), "a");
        assert_eq!(KeyPattern::new("exact").unwrap().literal_prefix(), "exact");
        assert_eq!(KeyPattern::new("*").unwrap().literal_prefix(), "");
    }
}
