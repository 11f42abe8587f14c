//! # dcp-core
//!
//! Foundation types and utilities for the DCP (Dynamic Context Pruning)
//! engine.
//!
//! This crate provides the shared vocabulary the other DCP crates depend on:
//!
//! - **Branded IDs**: `SessionId`, `MessageId`, `CallId` newtypes
//! - **Messages**: the host transcript model (`Message`, `Part`, `ToolState`)
//! - **Token estimation**: chars/4 approximation over parts and messages
//! - **Path utilities**: glob matching and display shortening
//! - **Text utilities**: UTF-8–safe truncation, progress bars
//! - **Errors**: `DcpError` hierarchy via `thiserror`

pub mod errors;
pub mod ids;
pub mod messages;
pub mod paths;
pub mod text;
pub mod tokens;

pub use errors::{DcpError, ValidationError};
pub use ids::{CallId, MessageId, SessionId};
pub use messages::{Message, MessageInfo, Part, Role, TimeInfo, ToolState, ToolStatus};
