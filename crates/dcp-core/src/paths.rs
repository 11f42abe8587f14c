//! Glob matching and path display utilities.
//!
//! Protected-file patterns in the configuration are globs where `**`
//! crosses directory separators and `*` / `?` do not. Patterns are
//! translated to anchored regexes on each call; pattern lists are small
//! (configuration-sized), so no compiled-pattern cache is kept.

use regex::Regex;

/// Match a path against a single glob pattern.
///
/// Rules:
/// - `**/` matches zero or more leading directories
/// - `**` matches anything, including separators
/// - `*` matches within a single path component
/// - `?` matches one non-separator character
///
/// A pattern that fails to compile never matches.
#[must_use]
pub fn matches_glob(path: &str, pattern: &str) -> bool {
    let Ok(re) = Regex::new(&glob_to_regex(pattern)) else {
        return false;
    };
    re.is_match(path)
}

/// Match a path against any of the given glob patterns.
#[must_use]
pub fn matches_any_glob(path: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| matches_glob(path, p))
}

/// Translate a glob pattern to an anchored regex.
fn glob_to_regex(pattern: &str) -> String {
    let mut re = String::with_capacity(pattern.len() * 2 + 2);
    re.push('^');

    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    let _ = chars.next();
                    // "**/" → zero or more directories; bare "**" → anything
                    if chars.peek() == Some(&'/') {
                        let _ = chars.next();
                        re.push_str("(?:.*/)?");
                    } else {
                        re.push_str(".*");
                    }
                } else {
                    re.push_str("[^/]*");
                }
            }
            '?' => re.push_str("[^/]"),
            c if c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '-') || !c.is_ascii() => {
                re.push(c);
            }
            c => {
                re.push('\\');
                re.push(c);
            }
        }
    }

    re.push('$');
    re
}

/// Shorten a path for display.
///
/// Replaces the home directory with `~` and, when the result still exceeds
/// `max_len`, keeps only the last two components behind an ellipsis.
#[must_use]
pub fn shorten_path(path: &str, max_len: usize) -> String {
    let home = std::env::var("HOME").unwrap_or_default();
    let mut shown = if !home.is_empty() && path.starts_with(&home) {
        format!("~{}", &path[home.len()..])
    } else {
        path.to_owned()
    };

    if shown.len() > max_len {
        let components: Vec<&str> = shown.split('/').filter(|c| !c.is_empty()).collect();
        if components.len() > 2 {
            shown = format!("…/{}", components[components.len() - 2..].join("/"));
        }
    }
    shown
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
