//! Invalidation patterns over cache keys.
//!
//! Three forms are accepted by [`KeyPattern::parse`]:
//!
//! - `^cards:` or `:structure$`: a regular expression (starts with `^` or
//!   ends with `$`)
//! - `boards:*:structure`: a glob where `*` matches any run of characters,
//!   anchored at both ends
//! - anything else: a literal key, matched exactly

use regex::Regex;

/// A compiled matcher for cache keys.
#[derive(Debug, Clone)]
pub enum KeyPattern {
    /// Matches exactly one key.
    Exact(String),
    /// Matches every key the expression finds a match in.
    Regex(Regex),
}

impl KeyPattern {
    /// Parse a pattern string.
    ///
    /// # Errors
    ///
    /// Returns the regex error when a `^`/`$` pattern is not a valid
    /// regular expression. Globs and literals never fail.
    pub fn parse(pattern: &str) -> Result<Self, regex::Error> {
        if pattern.starts_with('^') || pattern.ends_with('$') {
            return Regex::new(pattern).map(Self::Regex);
        }
        if pattern.contains('*') {
            let body = pattern
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*");
            return Regex::new(&format!("^{body}$")).map(Self::Regex);
        }
        Ok(Self::Exact(pattern.to_string()))
    }

    /// A pattern matching exactly `key`, even if it contains `*` or `^`.
    pub fn literal(key: impl Into<String>) -> Self {
        Self::Exact(key.into())
    }

    /// A pattern matching every key that starts with `prefix`.
    pub fn prefix(prefix: &str) -> Self {
        match Regex::new(&format!("^{}", regex::escape(prefix))) {
            Ok(re) => Self::Regex(re),
            // An escaped literal always compiles; keep a total function anyway.
            Err(_) => Self::Exact(prefix.to_string()),
        }
    }

    /// A pattern matching every key of one collection.
    pub fn collection(collection: &str) -> Self {
        Self::prefix(&format!("{collection}:"))
    }

    pub fn matches(&self, key: &str) -> bool {
        match self {
            Self::Exact(expected) => expected == key,
            Self::Regex(re) => re.is_match(key),
        }
    }
}
