//! Team runtime for Roundtable.
//!
//! This crate drives conversations:
//!
//! - [`selector`] -- Turn-selection policies: deterministic round-robin and
//!   model-driven selection behind one trait.
//! - [`chat`] -- The group-chat orchestrator loop: step budget, bounded
//!   tool reentry, per-run termination evaluation.
//! - [`sink`] -- Write-only message observers (console).
//! - [`error`] -- Team error types.

pub mod chat;
pub mod error;
pub mod selector;
pub mod sink;

// Re-export the most commonly used types at the crate root.
pub use chat::{ChatConfig, ChatOutcome, GroupChat, StopCause};
pub use error::{Result, TeamError};
pub use selector::{ModelSelector, RosterEntry, RoundRobin, TurnSelector};
pub use sink::{ConsoleSink, MessageSink};
