//! The agent capability contract and its variants.
//!
//! An [`Agent`] consumes the immutable conversation history and produces
//! exactly one [`AgentAction`].  The orchestrator depends only on this
//! trait; the three variants mirror the classic group-chat roster:
//!
//! - [`AssistantAgent`] -- model-backed, may request tool calls.
//! - [`UserProxyAgent`] -- delegates to an external input collaborator.
//! - [`ToolRunnerAgent`] -- executes the pending tool-call request.

use std::sync::Arc;

use async_trait::async_trait;

use roundtable_core::{AgentId, ChatMessage, MessageKind, ToolCall, ToolOutcome, ToolRegistry, ToolSchema};

use crate::completion::{CompletionOutcome, CompletionService, PromptMessage};
use crate::error::{AgentError, Result};

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// What an agent produced for its turn.
#[derive(Debug, Clone)]
pub enum AgentAction {
    /// A text reply attributed to the agent.
    Reply(String),

    /// A request to invoke one or more registered tools.
    CallTools(Vec<ToolCall>),

    /// Results of executing a pending tool-call request (tool-executing
    /// variants only).
    ToolResults(Vec<ToolOutcome>),

    /// A delegation signal: the agent wants external input resolved through
    /// [`Agent::provide_input`] (human-proxy variants only).
    RequestInput { prompt: String },
}

// ---------------------------------------------------------------------------
// Agent trait
// ---------------------------------------------------------------------------

/// The capability contract every conversation participant implements.
#[async_trait]
pub trait Agent: Send + Sync {
    /// The agent's unique, stable identifier.
    fn id(&self) -> &AgentId;

    /// Role description used by content-driven turn selection.
    fn description(&self) -> &str;

    /// Take one turn given the full history.
    ///
    /// The history is never empty — the log always holds at least the seed
    /// task message; being invoked without one is a configuration error and
    /// fails fast.
    async fn act(&self, history: &[ChatMessage]) -> Result<AgentAction>;

    /// Resolve a [`AgentAction::RequestInput`] delegation signal.
    ///
    /// Only human-proxy variants support this; the default rejects.
    async fn provide_input(&self, _prompt: &str) -> Result<String> {
        Err(AgentError::InputUnsupported {
            agent: self.id().to_string(),
        })
    }
}

/// Guard shared by every variant: an empty history is a configuration
/// error, not something to tolerate silently.
fn ensure_seeded(agent: &AgentId, history: &[ChatMessage]) -> Result<()> {
    if history.is_empty() {
        return Err(AgentError::EmptyHistory {
            agent: agent.to_string(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Input provider
// ---------------------------------------------------------------------------

/// External human-input collaborator.
///
/// Blocking from the orchestrator's viewpoint: one prompt in, one line of
/// text out.
#[async_trait]
pub trait InputProvider: Send + Sync {
    /// Request one line of input from the external collaborator.
    async fn read_input(&self, prompt: &str) -> Result<String>;
}

/// An [`InputProvider`] that replays fixed lines; used in tests and demos.
pub struct FixedInput {
    lines: tokio::sync::Mutex<std::collections::VecDeque<String>>,
}

impl FixedInput {
    /// Create a provider replaying `lines` in order.
    pub fn new(lines: &[&str]) -> Self {
        Self {
            lines: tokio::sync::Mutex::new(lines.iter().map(|l| (*l).to_owned()).collect()),
        }
    }
}

#[async_trait]
impl InputProvider for FixedInput {
    async fn read_input(&self, _prompt: &str) -> Result<String> {
        self.lines
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| AgentError::InputFailed {
                reason: "fixed input exhausted".into(),
            })
    }
}

// ---------------------------------------------------------------------------
// Assistant agent
// ---------------------------------------------------------------------------

/// A model-backed agent.
///
/// Holds an injected [`CompletionService`], an optional system prompt, and
/// the tool schemas it advertises.  Its `act` maps the completion outcome
/// directly onto the action protocol.
pub struct AssistantAgent {
    id: AgentId,
    description: String,
    system_prompt: Option<String>,
    tools: Vec<ToolSchema>,
    completion: Arc<dyn CompletionService>,
}

impl AssistantAgent {
    /// Create an assistant with the given identity and completion service.
    pub fn new(
        id: impl Into<AgentId>,
        description: impl Into<String>,
        completion: Arc<dyn CompletionService>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            system_prompt: None,
            tools: Vec::new(),
            completion,
        }
    }

    /// Set the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Advertise tool schemas to the model.
    pub fn with_tools(mut self, tools: Vec<ToolSchema>) -> Self {
        self.tools = tools;
        self
    }

    /// Convert the shared history into this agent's point of view.
    ///
    /// Own messages become assistant turns; everyone else's text is folded
    /// into user turns prefixed with the sender id so the model can tell
    /// participants apart.  Tool exchanges keep their structured roles only
    /// when this agent initiated them; another agent's tool traffic is
    /// flattened to text.
    fn history_to_prompt(&self, history: &[ChatMessage]) -> Vec<PromptMessage> {
        let mut prompt = Vec::with_capacity(history.len() + 1);
        if let Some(sys) = &self.system_prompt {
            prompt.push(PromptMessage::system(sys));
        }

        let mut own_request_pending = false;
        for msg in history {
            let own = msg.sender == self.id;
            match &msg.kind {
                MessageKind::Text => {
                    own_request_pending = false;
                    if own {
                        prompt.push(PromptMessage::assistant(&msg.content));
                    } else {
                        prompt.push(PromptMessage::user(format!(
                            "{}: {}",
                            msg.sender, msg.content
                        )));
                    }
                }
                MessageKind::ToolCallRequest { calls } => {
                    own_request_pending = own;
                    if own {
                        prompt.push(PromptMessage::assistant_tool_calls(calls.clone()));
                    } else {
                        let names: Vec<&str> =
                            calls.iter().map(|c| c.name.as_str()).collect();
                        prompt.push(PromptMessage::user(format!(
                            "{} requested tools: {}",
                            msg.sender,
                            names.join(", ")
                        )));
                    }
                }
                MessageKind::ToolCallResult { outcomes } => {
                    if own_request_pending {
                        for o in outcomes {
                            prompt.push(PromptMessage::tool_result(&o.call_id, &o.content));
                        }
                    } else {
                        let texts: Vec<&str> =
                            outcomes.iter().map(|o| o.content.as_str()).collect();
                        prompt.push(PromptMessage::user(format!(
                            "tool results: {}",
                            texts.join("; ")
                        )));
                    }
                    own_request_pending = false;
                }
            }
        }

        prompt
    }
}

#[async_trait]
impl Agent for AssistantAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn act(&self, history: &[ChatMessage]) -> Result<AgentAction> {
        ensure_seeded(&self.id, history)?;

        let prompt = self.history_to_prompt(history);
        let outcome = self.completion.complete(&prompt, &self.tools).await?;

        match outcome {
            CompletionOutcome::Text(text) => {
                tracing::debug!(agent = %self.id, "assistant replied with text");
                Ok(AgentAction::Reply(text))
            }
            CompletionOutcome::ToolCalls(mut calls) => {
                // Backfill correlation ids a provider (or a script) omitted.
                for (i, call) in calls.iter_mut().enumerate() {
                    if call.id.is_empty() {
                        call.id = format!("{}-call-{}", self.id, i);
                    }
                }
                tracing::debug!(
                    agent = %self.id,
                    tools = ?calls.iter().map(|c| &c.name).collect::<Vec<_>>(),
                    "assistant requested tool calls"
                );
                Ok(AgentAction::CallTools(calls))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// User proxy agent
// ---------------------------------------------------------------------------

/// A human-proxy agent.
///
/// Its turn is a delegation signal; the orchestrator resolves it through
/// [`Agent::provide_input`], which blocks on the injected collaborator.
pub struct UserProxyAgent {
    id: AgentId,
    description: String,
    input: Arc<dyn InputProvider>,
}

impl UserProxyAgent {
    /// Create a proxy with the given identity and input collaborator.
    pub fn new(
        id: impl Into<AgentId>,
        description: impl Into<String>,
        input: Arc<dyn InputProvider>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            input,
        }
    }
}

#[async_trait]
impl Agent for UserProxyAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn act(&self, history: &[ChatMessage]) -> Result<AgentAction> {
        ensure_seeded(&self.id, history)?;

        // The prompt shows the latest message so the human knows what they
        // are replying to.
        let latest = history.last().expect("history is non-empty");
        Ok(AgentAction::RequestInput {
            prompt: format!("[{}] {} — your reply: ", latest.sender, latest.content),
        })
    }

    async fn provide_input(&self, prompt: &str) -> Result<String> {
        self.input.read_input(prompt).await
    }
}

// ---------------------------------------------------------------------------
// Tool runner agent
// ---------------------------------------------------------------------------

/// A tool-executing agent.
///
/// When the latest message is a tool-call request, it executes every call
/// through its registry and produces the results.  It never invents
/// arguments: malformed ones come back as error outcomes from the invoker.
pub struct ToolRunnerAgent {
    id: AgentId,
    description: String,
    registry: Arc<ToolRegistry>,
}

impl ToolRunnerAgent {
    /// Create a tool runner over the given registry.
    pub fn new(
        id: impl Into<AgentId>,
        description: impl Into<String>,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            registry,
        }
    }
}

#[async_trait]
impl Agent for ToolRunnerAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn act(&self, history: &[ChatMessage]) -> Result<AgentAction> {
        ensure_seeded(&self.id, history)?;

        let latest = history.last().expect("history is non-empty");
        let MessageKind::ToolCallRequest { calls } = &latest.kind else {
            return Err(AgentError::NoPendingToolCalls {
                agent: self.id.to_string(),
            });
        };

        tracing::debug!(agent = %self.id, count = calls.len(), "executing pending tool calls");
        let outcomes = self.registry.invoke_all(calls).await;
        Ok(AgentAction::ToolResults(outcomes))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
