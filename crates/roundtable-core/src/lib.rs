//! Core value types for the Roundtable conversation runtime.
//!
//! This crate holds everything the orchestration layers build on:
//!
//! - [`message`] -- Agent identity, immutable messages, and the append-only
//!   transcript.
//! - [`tool`] -- Tool schemas, the concurrent registry, and the invoker that
//!   converts every tool failure into a reportable outcome.
//! - [`builtin`] -- Built-in tools (calculator, web-search stub).
//! - [`termination`] -- The composable termination-condition algebra and its
//!   per-run evaluator.
//! - [`error`] -- Core error types.
//!
//! All public types are `Send + Sync` and designed for use within a
//! multi-threaded tokio runtime.

pub mod builtin;
pub mod error;
pub mod message;
pub mod termination;
pub mod tool;

// Re-export the most commonly used types at the crate root.
pub use builtin::{Calculator, WebSearch};
pub use error::{CoreError, Result};
pub use message::{AgentId, ChatMessage, MessageKind, ToolCall, ToolOutcome, Transcript};
pub use termination::{
    MatchMode, StopHandle, StopReason, TerminationCondition, TerminationEvaluator,
};
pub use tool::{ParamSpec, ParamType, Tool, ToolRegistry, ToolSchema};
