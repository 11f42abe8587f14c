//! Token estimation utilities.
//!
//! Pure functions estimating token counts for transcript content. Uses a
//! chars/4 approximation; the engine only needs estimates that are stable
//! and monotonic, not tokenizer-exact — savings counters and report bars
//! are derived from these.

use serde_json::{Map, Value};

use crate::messages::{Message, Part};

/// Approximate characters per token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Shorthand for chars → tokens conversion.
#[allow(clippy::cast_possible_truncation)]
fn chars_to_tokens(chars: usize) -> u64 {
    chars.div_ceil(CHARS_PER_TOKEN) as u64
}

/// Estimate tokens for a plain string.
#[must_use]
pub fn estimate_text_tokens(text: &str) -> u64 {
    chars_to_tokens(text.len())
}

/// Estimate tokens for a tool input map.
#[must_use]
pub fn estimate_input_tokens(input: &Map<String, Value>) -> u64 {
    let chars = Value::Object(input.clone()).to_string().len();
    chars_to_tokens(chars)
}

/// Estimate tokens for a single content part.
#[must_use]
pub fn estimate_part_tokens(part: &Part) -> u64 {
    match part {
        Part::Text { text, .. } => estimate_text_tokens(text),
        Part::Tool {
            call_id,
            tool,
            state,
            ..
        } => {
            let mut chars = call_id.len() + tool.len();
            chars += Value::Object(state.input.clone()).to_string().len();
            chars += state.output.as_deref().map_or(0, str::len);
            chars += state.error.as_deref().map_or(0, str::len);
            chars_to_tokens(chars)
        }
        Part::StepStart | Part::StepFinish | Part::Unknown => 0,
    }
}

/// Estimate tokens for a message.
///
/// Includes a small per-message overhead for the role and envelope.
#[must_use]
pub fn estimate_message_tokens(message: &Message) -> u64 {
    let overhead: u64 = 4;
    overhead + message.parts.iter().map(estimate_part_tokens).sum::<u64>()
}

/// Estimate tokens for a whole transcript.
#[must_use]
pub fn estimate_messages_tokens(messages: &[Message]) -> u64 {
    messages.iter().map(estimate_message_tokens).sum()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
