//! Deterministic scripted completion service.
//!
//! Returns a fixed sequence of outcomes, one per `complete` call.  Used by
//! tests and offline demos to drive agents and the model selector without a
//! live provider.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use roundtable_core::{ToolCall, ToolSchema};

use crate::completion::CompletionService;
use crate::completion::types::{CompletionOutcome, PromptMessage};
use crate::error::{AgentError, Result};

/// A [`CompletionService`] that replays a pre-recorded script.
///
/// Each `complete` call pops the next outcome; an exhausted script is a
/// service failure, which makes over-running tests fail loudly instead of
/// looping.
pub struct ScriptedCompletion {
    script: Mutex<VecDeque<CompletionOutcome>>,
}

impl ScriptedCompletion {
    /// Create a service that replays `outcomes` in order.
    pub fn new(outcomes: Vec<CompletionOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
        }
    }

    /// Convenience: a script of plain text replies.
    pub fn replies(texts: &[&str]) -> Self {
        Self::new(
            texts
                .iter()
                .map(|t| CompletionOutcome::Text((*t).to_owned()))
                .collect(),
        )
    }

    /// Convenience: a single tool-call outcome followed by text replies.
    pub fn tool_call_then_replies(calls: Vec<ToolCall>, texts: &[&str]) -> Self {
        let mut outcomes = vec![CompletionOutcome::ToolCalls(calls)];
        outcomes.extend(texts.iter().map(|t| CompletionOutcome::Text((*t).to_owned())));
        Self::new(outcomes)
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(
        &self,
        _messages: &[PromptMessage],
        _tools: &[ToolSchema],
    ) -> Result<CompletionOutcome> {
        self.script
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| AgentError::ServiceFailed {
                reason: "scripted completion exhausted".into(),
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_in_order_then_fails() {
        let service = ScriptedCompletion::replies(&["first", "second"]);

        let a = service.complete(&[], &[]).await.unwrap();
        assert!(matches!(a, CompletionOutcome::Text(t) if t == "first"));

        let b = service.complete(&[], &[]).await.unwrap();
        assert!(matches!(b, CompletionOutcome::Text(t) if t == "second"));

        let err = service.complete(&[], &[]).await.unwrap_err();
        assert!(matches!(err, AgentError::ServiceFailed { .. }));
    }
}
