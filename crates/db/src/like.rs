//! SQL `LIKE` matching.
//!
//! `%` matches any run of characters, `_` exactly one, and `\` escapes the
//! next character. Patterns are translated once into an anchored regular
//! expression and reused for every row a query scans.

use regex::{Regex, RegexBuilder};

use crate::error::{PersistenceError, Result};

/// A compiled `LIKE` pattern.
#[derive(Debug, Clone)]
pub struct LikePattern {
    source: String,
    regex: Regex,
}

impl LikePattern {
    pub fn compile(pattern: &str, case_sensitive: bool) -> Result<Self> {
        let regex = RegexBuilder::new(&like_to_regex(pattern))
            .case_insensitive(!case_sensitive)
            .build()
            .map_err(|source| PersistenceError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Wraps a literal fragment as a "contains" pattern, escaping any wildcard
/// characters it carries.
pub fn contains(fragment: &str) -> String {
    let mut pattern = String::with_capacity(fragment.len() + 2);
    pattern.push('%');
    for c in fragment.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn like_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 8);
    regex.push_str("(?s)^");

    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            // A trailing backslash is kept as a literal.
            '\\' => match chars.next() {
                Some(escaped) => push_literal(&mut regex, escaped),
                None => push_literal(&mut regex, '\\'),
            },
            c => push_literal(&mut regex, c),
        }
    }

    regex.push('$');
    regex
}

fn push_literal(regex: &mut String, c: char) {
    let mut buf = [0u8; 4];
    regex.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}
