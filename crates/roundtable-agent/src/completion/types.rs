//! Wire-adjacent types for the completion-service boundary.
//!
//! These types model what flows between agents and a completion provider.
//! They are provider-agnostic at this layer; the [`super::http`] module
//! translates them into provider-specific wire formats.

use serde::{Deserialize, Serialize};

use roundtable_core::ToolCall;

// ---------------------------------------------------------------------------
// Prompt messages
// ---------------------------------------------------------------------------

/// The role of a prompt message as seen by a completion provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    /// Instructions that shape model behavior.
    System,
    /// Input the model should respond to.
    User,
    /// Prior output of the model itself.
    Assistant,
    /// Result of a tool invocation, fed back to the model.
    Tool,
}

/// One message in the prompt sent to a completion provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    /// Who produced this message, from the model's point of view.
    pub role: PromptRole,

    /// Textual content.  May be empty for assistant messages that carry
    /// only tool calls.
    #[serde(default)]
    pub content: String,

    /// Tool calls requested by the assistant (only on `Assistant` role).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Which tool call this message answers (only on `Tool` role).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl PromptMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create an assistant text message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create an assistant message that carries tool calls.
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: PromptRole::Assistant,
            content: String::new(),
            tool_calls,
            tool_call_id: None,
        }
    }

    /// Create a tool-result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Completion outcome
// ---------------------------------------------------------------------------

/// What the completion service produced for one invocation.
#[derive(Debug, Clone)]
pub enum CompletionOutcome {
    /// The model produced a final text answer.
    Text(String),

    /// The model wants one or more tools invoked before continuing.
    ToolCalls(Vec<ToolCall>),
}
