//! The completion-service boundary.
//!
//! Everything model-backed in the runtime — assistant agents and the
//! model-driven turn selector — depends on the [`CompletionService`] trait
//! and receives its implementation at construction, never through ambient
//! global state.  Tests substitute [`ScriptedCompletion`]; production wires
//! an [`HttpCompletionClient`].
//!
//! - [`types`] -- Prompt messages and the completion outcome.
//! - [`http`] -- Non-streaming OpenAI / Anthropic HTTP client.
//! - [`scripted`] -- Deterministic replay stub for tests and demos.

pub mod http;
pub mod scripted;
pub mod types;

use async_trait::async_trait;

use roundtable_core::ToolSchema;

use crate::error::Result;

// Re-export the most commonly used types for convenience.
pub use http::{HttpCompletionClient, HttpCompletionConfig, Provider};
pub use scripted::ScriptedCompletion;
pub use types::{CompletionOutcome, PromptMessage, PromptRole};

/// The opaque completion contract: prompt history plus available tools in,
/// either text or structured tool calls out.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Produce one completion for the given prompt.
    async fn complete(
        &self,
        messages: &[PromptMessage],
        tools: &[ToolSchema],
    ) -> Result<CompletionOutcome>;
}
