//! UTF-8–safe string helpers and report formatting.
//!
//! Rust `&str[..n]` panics when `n` falls inside a multi-byte character, so
//! truncation snaps back to the nearest char boundary. The bar and number
//! formatters feed the `/dcp context` and `/dcp stats` reports.

/// Truncate a string to at most `max_bytes` bytes at a char boundary.
#[inline]
#[must_use]
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Truncate `s` and append `suffix` when the original exceeds `max_bytes`.
///
/// The returned string is at most `max_bytes` bytes long including the
/// suffix.
#[must_use]
pub fn truncate_with_suffix(s: &str, max_bytes: usize, suffix: &str) -> String {
    if s.len() <= max_bytes {
        return s.to_owned();
    }
    let body_budget = max_bytes.saturating_sub(suffix.len());
    format!("{}{suffix}", truncate_str(s, body_budget))
}

/// Render a fixed-width text progress bar, e.g. `[████████░░░░] 67%`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn progress_bar(ratio: f64, width: usize) -> String {
    let clamped = ratio.clamp(0.0, 1.0);
    let filled = (clamped * width as f64).round() as usize;
    let mut bar = String::with_capacity(width * 3 + 8);
    bar.push('[');
    for i in 0..width {
        bar.push(if i < filled { '█' } else { '░' });
    }
    bar.push(']');
    bar.push_str(&format!(" {:.0}%", clamped * 100.0));
    bar
}

/// Format a token count for display: `532` / `4.2k` / `1.3M`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_tokens(tokens: u64) -> String {
    if tokens >= 1_000_000 {
        format!("{:.1}M", tokens as f64 / 1_000_000.0)
    } else if tokens >= 1_000 {
        format!("{:.1}k", tokens as f64 / 1_000.0)
    } else {
        tokens.to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
