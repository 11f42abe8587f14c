//! Conditional prompt templating.
//!
//! Prompt markdown uses three lightweight constructs:
//!
//! - `<prune>…</prune>` (and the other tool names) — the block is kept and
//!   unwrapped when the tool is enabled, removed otherwise
//! - `// comment //` — stripped entirely
//! - runs of blank lines left behind by removal — collapsed to one
//!
//! Tags for the three tool names are the only conditionals; anything else
//! in angle brackets (like the literal `<prunable-tools>` examples) passes
//! through untouched.

use regex::Regex;

/// Render a prompt template against the enabled-tool predicate.
#[must_use]
pub fn render(template: &str, is_enabled: impl Fn(&str) -> bool) -> String {
    // Tool-name conditional blocks.
    let Ok(block_re) = Regex::new(r"(?s)<(prune|distill|compress)>(.*?)</(prune|distill|compress)>")
    else {
        return template.to_owned();
    };
    let mut rendered = block_re
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let open = &caps[1];
            let close = &caps[3];
            if open == close && is_enabled(open) {
                caps[2].to_owned()
            } else {
                String::new()
            }
        })
        .into_owned();

    // Author comments.
    if let Ok(comment_re) = Regex::new(r"//[^/\n]*//") {
        rendered = comment_re.replace_all(&rendered, "").into_owned();
    }

    // Collapse blank runs left behind by removals.
    if let Ok(blank_re) = Regex::new(r"\n{3,}") {
        rendered = blank_re.replace_all(&rendered, "\n\n").into_owned();
    }

    rendered.trim().to_owned()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
