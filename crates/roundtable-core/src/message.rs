//! Conversation messages and the append-only transcript.
//!
//! A [`ChatMessage`] is an immutable value: once appended to a
//! [`Transcript`] it is never mutated, and the transcript's order is the
//! single source of truth for conversation history.  Sequence numbers are
//! assigned by the transcript at append time; re-appending a message whose
//! sequence number is already present is rejected so downstream observers
//! (the termination evaluator in particular) see each logical append exactly
//! once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, Result};

// ---------------------------------------------------------------------------
// Agent identity
// ---------------------------------------------------------------------------

/// Unique, stable identifier of a conversation participant.
///
/// Stable for the runtime's lifetime; used for message routing and for the
/// selector's role-description lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Create an id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The reserved sender id for the seeding task message.
    pub fn user() -> Self {
        Self("user".into())
    }

    /// The reserved sender id for registry-executed tool results.
    pub fn tools() -> Self {
        Self("tools".into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Tool payloads
// ---------------------------------------------------------------------------

/// A tool invocation requested by an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlation id, echoed back on the matching [`ToolOutcome`].
    pub id: String,

    /// The name of the tool to invoke (must match a registered tool).
    pub name: String,

    /// Arguments as a JSON object matching the tool's schema.
    pub arguments: Value,
}

/// The result of executing one tool call, ready to flow back into the
/// conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// The [`ToolCall::id`] this outcome corresponds to.
    pub call_id: String,

    /// Serialized result content, or the error text when `is_error` is set.
    pub content: String,

    /// Whether the invocation produced an error result.
    #[serde(default)]
    pub is_error: bool,
}

impl ToolOutcome {
    /// Build a success outcome.
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// Build an error outcome carrying the failure text.
    pub fn error(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// What a message carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageKind {
    /// Plain conversational text.
    Text,

    /// A request to invoke one or more tools.
    ToolCallRequest { calls: Vec<ToolCall> },

    /// The results of a previously requested tool invocation.
    ToolCallResult { outcomes: Vec<ToolOutcome> },
}

/// A single immutable message in the conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Opaque sequence number, assigned by the transcript at append time.
    pub seq: u64,

    /// Who produced this message.
    pub sender: AgentId,

    /// The payload variant.
    pub kind: MessageKind,

    /// Textual content.  Empty for pure tool-call requests.
    pub content: String,

    /// When the message was appended.
    pub sent_at: DateTime<Utc>,
}

impl ChatMessage {
    /// The text a content-based termination condition should scan.
    ///
    /// Tool results contribute their outcome contents so a mention inside a
    /// tool response can terminate a run, matching mention-anywhere
    /// semantics.
    pub fn scan_text(&self) -> String {
        match &self.kind {
            MessageKind::Text | MessageKind::ToolCallRequest { .. } => self.content.clone(),
            MessageKind::ToolCallResult { outcomes } => outcomes
                .iter()
                .map(|o| o.content.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

// ---------------------------------------------------------------------------
// Transcript
// ---------------------------------------------------------------------------

/// The append-only, ordered message log of one conversation.
///
/// Owned and mutated exclusively by the orchestrator; every other component
/// sees it as an immutable slice.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    /// Create an empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and append a message, assigning the next sequence number.
    ///
    /// Returns a reference to the appended message.
    pub fn push(
        &mut self,
        sender: AgentId,
        kind: MessageKind,
        content: impl Into<String>,
    ) -> &ChatMessage {
        let msg = ChatMessage {
            seq: self.messages.len() as u64,
            sender,
            kind,
            content: content.into(),
            sent_at: Utc::now(),
        };
        // push cannot fail: the seq was just derived from the log length.
        self.messages.push(msg);
        self.messages.last().expect("just pushed")
    }

    /// Append an already-built message, enforcing sequence continuity.
    ///
    /// A message whose `seq` is already present is rejected with
    /// [`CoreError::DuplicateMessage`]; a `seq` beyond the next slot is a
    /// [`CoreError::SequenceGap`].
    pub fn append(&mut self, msg: ChatMessage) -> Result<()> {
        let expected = self.messages.len() as u64;
        if msg.seq < expected {
            return Err(CoreError::DuplicateMessage { seq: msg.seq });
        }
        if msg.seq > expected {
            return Err(CoreError::SequenceGap {
                expected,
                got: msg.seq,
            });
        }
        self.messages.push(msg);
        Ok(())
    }

    /// The full ordered history.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of messages in the log.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The most recently appended message, if any.
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
