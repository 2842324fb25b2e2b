//! Agents for the Roundtable conversation runtime.
//!
//! This crate provides the two seams the orchestration layer plugs into:
//!
//! - [`completion`] -- The opaque completion-service boundary: trait,
//!   non-streaming HTTP client (OpenAI-compatible and Anthropic), and a
//!   deterministic scripted stub.
//! - [`agent`] -- The agent capability contract and its variants
//!   (model-backed assistant, human proxy, tool runner).
//! - [`error`] -- Agent error types.

pub mod agent;
pub mod completion;
pub mod error;

// Re-export the most commonly used types at the crate root.
pub use agent::{
    Agent, AgentAction, AssistantAgent, FixedInput, InputProvider, ToolRunnerAgent,
    UserProxyAgent,
};
pub use completion::{
    CompletionOutcome, CompletionService, HttpCompletionClient, HttpCompletionConfig,
    PromptMessage, PromptRole, Provider, ScriptedCompletion,
};
pub use error::{AgentError, Result};
