//! Pattern escaping for substring operators.
//!
//! User input never reaches a pattern language unescaped: SQLite `GLOB`,
//! SQL `LIKE ... ESCAPE '\'` and MongoDB `$regex` each get their own rules.

/// Escape a literal for a SQLite `GLOB` pattern.
///
/// GLOB has no escape character; metacharacters are wrapped in a
/// one-character class instead.
pub fn escape_glob(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '*' => result.push_str("[*]"),
            '?' => result.push_str("[?]"),
            '[' => result.push_str("[[]"),
            c => result.push(c),
        }
    }
    result
}

/// Escape a literal for a `LIKE` pattern used with `ESCAPE '\'`.
pub fn escape_like(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '\\' | '%' | '_' => {
                result.push('\\');
                result.push(c);
            }
            c => result.push(c),
        }
    }
    result
}

/// Escape a literal for a regular expression.
#[inline]
pub fn escape_regex(s: &str) -> String {
    regex::escape(s)
}
