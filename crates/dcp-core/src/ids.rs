//! Branded ID newtypes for type safety.
//!
//! Session, message, and tool-call identifiers are opaque strings minted by
//! the host. Wrapping each in its own newtype prevents accidentally passing
//! a message ID where a tool-call ID is expected.
//!
//! Tool-call IDs are compared case-insensitively throughout the engine, so
//! [`CallId::normalized`] lowercases on construction.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Unique identifier for a host session.
    SessionId
}

branded_id! {
    /// Unique identifier for a transcript message.
    MessageId
}

branded_id! {
    /// Unique identifier for a tool invocation within the transcript.
    CallId
}

impl CallId {
    /// Create a call ID normalized to lowercase.
    ///
    /// Providers disagree on tool-call ID casing across retries, so every
    /// lookup key in the engine goes through this constructor.
    #[must_use]
    pub fn normalized(s: &str) -> Self {
        Self(s.to_ascii_lowercase())
    }
}

impl MessageId {
    /// Prefix carried by every message the engine itself injects.
    pub const SYNTHETIC_PREFIX: &'static str = "msg_dcp_";

    /// Returns `true` if this message was minted by the engine rather than
    /// the host.
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.0.starts_with(Self::SYNTHETIC_PREFIX)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
