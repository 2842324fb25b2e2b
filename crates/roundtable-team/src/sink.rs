//! Message sinks.
//!
//! A [`MessageSink`] is a write-only observer notified of every appended
//! message.  Sinks must never affect control flow: `emit` is infallible
//! from the orchestrator's point of view, and a misbehaving sink is the
//! sink's problem, not the run's.

use roundtable_core::{ChatMessage, MessageKind};

/// Write-only observer of the conversation.
pub trait MessageSink: Send + Sync {
    /// Observe one appended message.
    fn emit(&self, message: &ChatMessage);
}

// ---------------------------------------------------------------------------
// Console sink
// ---------------------------------------------------------------------------

/// Renders every message to stdout as `sender: content` lines, with tool
/// traffic summarized.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    /// Create a console sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn render(message: &ChatMessage) -> String {
        match &message.kind {
            MessageKind::Text => format!("{}: {}", message.sender, message.content),
            MessageKind::ToolCallRequest { calls } => {
                let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
                format!("{}: [calling {}]", message.sender, names.join(", "))
            }
            MessageKind::ToolCallResult { outcomes } => {
                let parts: Vec<String> = outcomes
                    .iter()
                    .map(|o| {
                        if o.is_error {
                            format!("error: {}", o.content)
                        } else {
                            o.content.clone()
                        }
                    })
                    .collect();
                format!("{}: [tool result] {}", message.sender, parts.join("; "))
            }
        }
    }
}

impl MessageSink for ConsoleSink {
    fn emit(&self, message: &ChatMessage) {
        println!("{}", Self::render(message));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
