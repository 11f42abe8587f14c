//! Prompt templates for the tool descriptions and the system prompt.
//!
//! These are model-visible contracts. The `<prune>`/`<distill>`/`<compress>`
//! tags are conditionals resolved by [`crate::template::render`] against
//! the enabled-tool set; `// … //` spans are author comments stripped at
//! render time.

/// System prompt appended via the host's system transform.
pub const SYSTEM_PROMPT: &str = "\
## Context management

Your conversation is managed by a context pruning layer. Each turn you may \
receive a `<prunable-tools>` list enumerating earlier tool calls by numeric \
index.

<prune>
- Use the `prune` tool with indices from `<prunable-tools>` to discard tool \
outputs you no longer need. Prefer pruning outputs you have already acted \
on: file contents you have since edited, command output you have already \
summarized, or search results you have finished using.
</prune>
<distill>
- Use the `distill` tool when an output still contains a fact worth keeping. \
Provide a one-sentence distillation per index; the output is discarded but \
your distillation is preserved for the user.
</distill>
<compress>
- Use the `compress` tool to fold a completed phase of the conversation into \
a short summary. Quote the exact start and end text of the range; both must \
be unique in the transcript.
</compress>

Never prune an output you have not finished using. After a successful \
pruning call, wait for your next tool use before pruning again.";

/// Description for the `prune` tool.
pub const PRUNE_DESCRIPTION: &str = "\
Discard tool outputs that are no longer needed, freeing context for the \
task at hand.

// keep the wording aligned with the manifest header //
Pass `ids`: an array of numeric indices taken from the `<prunable-tools>` \
list. The referenced outputs are replaced with a placeholder; everything \
else about the conversation is untouched.

Good candidates:
- file reads you have since edited or re-read
- command output you have already acted on
- search results that served their purpose

Do not prune outputs you may still need verbatim. Protected tools and \
protected files are rejected.";

/// Description for the `distill` tool.
pub const DISTILL_DESCRIPTION: &str = "\
Discard tool outputs while preserving the knowledge they contained.

Pass `targets`: an array of `{id, distillation}` objects, where `id` is a \
numeric index from the `<prunable-tools>` list and `distillation` is a \
one-sentence record of what mattered in that output. The output is \
replaced with a placeholder; your distillation is shown to the user.

Use distill instead of prune whenever an output taught you something that \
is not yet written down elsewhere in the conversation.";

/// Description for the `compress` tool.
pub const COMPRESS_DESCRIPTION: &str = "\
Fold a contiguous range of the conversation into a model-authored summary.

Pass `topic` (a short label), and `content` with:
- `startString`: exact text that begins the range (must occur exactly once)
- `endString`: exact text that ends the range (must occur exactly once)
- `summary`: the replacement text preserving every fact still needed

Everything between the two boundaries — messages and tool calls alike — is \
replaced by the summary. Choose boundaries from completed phases only; the \
summary is all that survives.";

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
