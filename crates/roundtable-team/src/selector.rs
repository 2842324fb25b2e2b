//! Turn selection.
//!
//! Two policies decide who speaks next: a deterministic [`RoundRobin`]
//! cycle, and a [`ModelSelector`] that delegates the decision to a
//! completion service.  The model-driven variant is the runtime's only
//! AI-driven control-flow decision, so it lives behind the [`TurnSelector`]
//! trait and can be swapped for a deterministic policy in tests.

use std::sync::Arc;

use async_trait::async_trait;

use roundtable_agent::{CompletionOutcome, CompletionService, PromptMessage};
use roundtable_core::{AgentId, ChatMessage};

use crate::error::{Result, TeamError};

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// One roster slot: identity plus the role description shown to the
/// model-driven selector.
#[derive(Debug, Clone)]
pub struct RosterEntry {
    /// The agent's id.
    pub id: AgentId,
    /// Human-readable role description.
    pub description: String,
}

// ---------------------------------------------------------------------------
// Selector trait
// ---------------------------------------------------------------------------

/// Decides the next speaking agent.
#[async_trait]
pub trait TurnSelector: Send + Sync {
    /// Pick the next speaker from a non-empty roster given the history.
    async fn select_next(
        &mut self,
        roster: &[RosterEntry],
        history: &[ChatMessage],
    ) -> Result<AgentId>;
}

// ---------------------------------------------------------------------------
// Round-robin
// ---------------------------------------------------------------------------

/// Deterministic cyclic selection.
///
/// State is solely an index into the roster, advanced by one per completed
/// turn and wrapping modulo the roster size, so N consecutive selections
/// over a roster of size N are exactly the roster order.
#[derive(Debug, Default)]
pub struct RoundRobin {
    next: usize,
}

impl RoundRobin {
    /// Create a selector starting at the first roster member.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TurnSelector for RoundRobin {
    async fn select_next(
        &mut self,
        roster: &[RosterEntry],
        _history: &[ChatMessage],
    ) -> Result<AgentId> {
        if roster.is_empty() {
            return Err(TeamError::Config {
                reason: "cannot select from an empty roster".into(),
            });
        }
        let entry = &roster[self.next % roster.len()];
        self.next = (self.next + 1) % roster.len();
        Ok(entry.id.clone())
    }
}

// ---------------------------------------------------------------------------
// Model-driven selector
// ---------------------------------------------------------------------------

/// Prompt template for the model-driven selector.  Placeholders:
/// `{roles}` (one `id: description` line per roster member),
/// `{participants}` (comma-separated ids), `{history}` (the rendered log).
const SELECTOR_TEMPLATE: &str = "\
You are coordinating a conversation between these roles:
{roles}

Read the following conversation. Then select the next role from {participants} to play. Only return the role name.

{history}

Read the above conversation. Then select the next role from {participants} to play. Only return the role name.";

/// Content-driven selection delegating to a completion service.
///
/// The returned name is validated against the roster.  An invalid or
/// unparseable reply is re-prompted once; a second failure falls back to
/// the first roster member with a warning — never a crash.
pub struct ModelSelector {
    completion: Arc<dyn CompletionService>,
    template: String,
}

impl ModelSelector {
    /// Create a selector using the default prompt template.
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self {
            completion,
            template: SELECTOR_TEMPLATE.to_owned(),
        }
    }

    /// Override the prompt template.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    fn render_prompt(&self, roster: &[RosterEntry], history: &[ChatMessage]) -> String {
        let roles = roster
            .iter()
            .map(|e| format!("{}: {}", e.id, e.description))
            .collect::<Vec<_>>()
            .join("\n");
        let participants = roster
            .iter()
            .map(|e| e.id.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let rendered_history = history
            .iter()
            .map(|m| format!("{}: {}", m.sender, m.scan_text()))
            .collect::<Vec<_>>()
            .join("\n");

        self.template
            .replace("{roles}", &roles)
            .replace("{participants}", &participants)
            .replace("{history}", &rendered_history)
    }

    /// Match the model's reply against the roster.
    ///
    /// Accepts an exact id (after trimming) or a reply containing exactly
    /// one roster id as a substring.
    fn parse_role(reply: &str, roster: &[RosterEntry]) -> Option<AgentId> {
        let trimmed = reply.trim();
        if let Some(entry) = roster.iter().find(|e| e.id.as_str() == trimmed) {
            return Some(entry.id.clone());
        }

        let mentioned: Vec<&RosterEntry> = roster
            .iter()
            .filter(|e| trimmed.contains(e.id.as_str()))
            .collect();
        match mentioned.as_slice() {
            [single] => Some(single.id.clone()),
            _ => None,
        }
    }
}

#[async_trait]
impl TurnSelector for ModelSelector {
    async fn select_next(
        &mut self,
        roster: &[RosterEntry],
        history: &[ChatMessage],
    ) -> Result<AgentId> {
        if roster.is_empty() {
            return Err(TeamError::Config {
                reason: "cannot select from an empty roster".into(),
            });
        }

        let prompt = self.render_prompt(roster, history);

        // One initial attempt plus one re-prompt.
        for attempt in 0..2 {
            let outcome = self
                .completion
                .complete(&[PromptMessage::user(&prompt)], &[])
                .await
                .map_err(|source| TeamError::Selector { source })?;

            match outcome {
                CompletionOutcome::Text(reply) => {
                    if let Some(id) = Self::parse_role(&reply, roster) {
                        tracing::debug!(agent = %id, attempt, "model selector picked next speaker");
                        return Ok(id);
                    }
                    tracing::warn!(reply = %reply, attempt, "selector reply is not a roster member");
                }
                CompletionOutcome::ToolCalls(_) => {
                    tracing::warn!(attempt, "selector reply was a tool call, expected a role name");
                }
            }
        }

        // Documented fallback: the first roster member.
        let fallback = roster[0].id.clone();
        tracing::warn!(agent = %fallback, "selector fell back to first roster member");
        Ok(fallback)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
