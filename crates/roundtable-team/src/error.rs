//! Team error types.
//!
//! A [`TeamError`] returned from the orchestrator is fatal to its run: the
//! recoverable failure modes (bad tool arguments, non-roster selector
//! replies, reentry-budget overruns) are handled inside the loop and never
//! surface here.

use roundtable_agent::AgentError;
use roundtable_core::CoreError;

/// Unified error type for the team runtime.
#[derive(Debug, thiserror::Error)]
pub enum TeamError {
    /// The team is misconfigured; detected before the run loop starts.
    #[error("team configuration error: {reason}")]
    Config { reason: String },

    /// An agent failed in a way the loop cannot recover from (completion
    /// service unreachable, input collaborator gone).
    #[error("agent `{agent}` failed: {source}")]
    Agent {
        agent: String,
        #[source]
        source: AgentError,
    },

    /// The turn selector failed fatally (its completion service errored).
    #[error("turn selector failed: {source}")]
    Selector {
        #[source]
        source: AgentError,
    },

    /// An error propagated from the core crate.
    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

/// Convenience alias used throughout the team crate.
pub type Result<T> = std::result::Result<T, TeamError>;
