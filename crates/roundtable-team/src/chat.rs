//! The group-chat orchestrator.
//!
//! [`GroupChat`] ties the turn selector, the agents, the tool registry, and
//! the termination evaluator together.  It owns the transcript and the step
//! budget; nothing else mutates the log.
//!
//! One run is one logical thread of control: the loop issues one agent or
//! tool invocation at a time and only proceeds when it returns, so every
//! step happens-before the next.  Independent runs share nothing but the
//! read-only tool registry.

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use roundtable_agent::{Agent, AgentAction};
use roundtable_core::{
    AgentId, MessageKind, StopReason, TerminationCondition, TerminationEvaluator, ToolOutcome,
    ToolRegistry, Transcript,
};

use crate::error::{Result, TeamError};
use crate::selector::{RosterEntry, TurnSelector};
use crate::sink::MessageSink;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Run parameters for a group chat.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Maximum number of selector turns per run (the step budget).
    pub max_steps: usize,

    /// How many consecutive tool rounds one turn may contain before the
    /// pending request is answered with an error and the turn concludes.
    pub max_tool_reentry: u32,

    /// Optional cap on consecutive turns by the same agent; enforced by the
    /// orchestrator, never by the agent.
    pub max_consecutive_turns: Option<u32>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_steps: 25,
            max_tool_reentry: 1,
            max_consecutive_turns: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Why a run stopped without failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopCause {
    /// The termination condition fired.
    Terminated(StopReason),
    /// The step budget ran out before any condition fired.
    BudgetExhausted,
}

impl std::fmt::Display for StopCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Terminated(reason) => write!(f, "terminated: {reason}"),
            Self::BudgetExhausted => write!(f, "step budget exhausted"),
        }
    }
}

/// The result of a completed (non-failed) run.
#[derive(Debug)]
pub struct ChatOutcome {
    /// Unique identifier of this run.
    pub run_id: Uuid,

    /// The full conversation log.
    pub transcript: Transcript,

    /// Why the run stopped.
    pub stop: StopCause,

    /// The content of the last text message, for callers that only want
    /// the final answer.
    pub final_message: String,
}

// ---------------------------------------------------------------------------
// Group chat
// ---------------------------------------------------------------------------

/// A conversation between a fixed roster of agents.
///
/// Construct with [`GroupChat::new`], wire the optional pieces with the
/// `with_*` builders, then drive one conversation per [`GroupChat::run`]
/// call.  Each call builds a fresh termination evaluator and transcript, so
/// the same team can serve successive tasks.
pub struct GroupChat {
    agents: Vec<Arc<dyn Agent>>,
    roster: Vec<RosterEntry>,
    selector: Box<dyn TurnSelector>,
    registry: Arc<ToolRegistry>,
    termination: TerminationCondition,
    sinks: Vec<Box<dyn MessageSink>>,
    config: ChatConfig,
}

impl GroupChat {
    /// Create a team over the given roster and selection policy.
    pub fn new(agents: Vec<Arc<dyn Agent>>, selector: Box<dyn TurnSelector>) -> Self {
        let roster = agents
            .iter()
            .map(|a| RosterEntry {
                id: a.id().clone(),
                description: a.description().to_owned(),
            })
            .collect();

        Self {
            agents,
            roster,
            selector,
            registry: Arc::new(ToolRegistry::new()),
            termination: TerminationCondition::max_messages(25),
            sinks: Vec::new(),
            config: ChatConfig::default(),
        }
    }

    /// Share a tool registry with this team.
    pub fn with_registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Set the termination condition tree.
    pub fn with_termination(mut self, condition: TerminationCondition) -> Self {
        self.termination = condition;
        self
    }

    /// Attach a message sink.
    pub fn with_sink(mut self, sink: Box<dyn MessageSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Override the run parameters.
    pub fn with_config(mut self, config: ChatConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one conversation seeded with `task`.
    ///
    /// Returns the outcome (terminated or budget-exhausted) or a fatal
    /// error — never a silent hang.
    pub async fn run(&mut self, task: &str) -> Result<ChatOutcome> {
        self.validate(task)?;

        let run_id = Uuid::now_v7();
        // A fresh evaluator per run: the latch is terminal and never reused.
        let mut evaluator = TerminationEvaluator::new(&self.termination)?;
        let mut transcript = Transcript::new();

        tracing::info!(
            run_id = %run_id,
            agents = self.agents.len(),
            max_steps = self.config.max_steps,
            "group chat run started"
        );

        // Seed the log with the task message.
        let seed = transcript
            .push(AgentId::user(), MessageKind::Text, task)
            .clone();
        self.emit(&seed);
        if let Some(reason) = evaluator.observe(&transcript) {
            return Ok(self.outcome(run_id, transcript, StopCause::Terminated(reason)));
        }

        let mut last_speaker: Option<AgentId> = None;
        let mut consecutive = 0u32;

        for step in 0..self.config.max_steps {
            // Cancellation (and any already-satisfied condition) is checked
            // at the top of each step, before a new agent acts.
            if let Some(reason) = evaluator.observe(&transcript) {
                return Ok(self.outcome(run_id, transcript, StopCause::Terminated(reason)));
            }

            let mut next_id = self
                .selector
                .select_next(&self.roster, transcript.messages())
                .await?;

            // Reject an agent that exceeded its consecutive-turn cap and
            // hand the turn to the next roster member instead.
            if let Some(cap) = self.config.max_consecutive_turns
                && last_speaker.as_ref() == Some(&next_id)
                && consecutive >= cap
            {
                let replacement = self.next_after(&next_id);
                tracing::warn!(
                    agent = %next_id,
                    cap,
                    replacement = %replacement,
                    "consecutive-turn cap reached, reassigning turn"
                );
                next_id = replacement;
            }

            let agent = match self.agent_by_id(&next_id) {
                Some(a) => a,
                None => {
                    // A selector handing back a non-roster id after its own
                    // retry is a protocol error; the documented default is
                    // the first roster member.
                    tracing::warn!(agent = %next_id, "selector returned non-roster id, using first member");
                    Arc::clone(&self.agents[0])
                }
            };
            let speaker = agent.id().clone();

            consecutive = if last_speaker.as_ref() == Some(&speaker) {
                consecutive + 1
            } else {
                1
            };
            last_speaker = Some(speaker.clone());

            tracing::debug!(step, agent = %speaker, "turn started");

            let action = agent
                .act(transcript.messages())
                .await
                .map_err(|source| TeamError::Agent {
                    agent: speaker.to_string(),
                    source,
                })?;

            let fired = self
                .conclude_turn(&agent, action, &mut transcript, &mut evaluator)
                .await?;

            if let Some(reason) = fired {
                return Ok(self.outcome(run_id, transcript, StopCause::Terminated(reason)));
            }
        }

        tracing::info!(run_id = %run_id, "step budget exhausted");
        Ok(self.outcome(run_id, transcript, StopCause::BudgetExhausted))
    }

    /// Drive one agent turn to completion: resolve delegation signals,
    /// execute tool rounds within the reentry bound, and append the final
    /// message.  Returns the stop reason if termination fired mid-turn.
    async fn conclude_turn(
        &self,
        agent: &Arc<dyn Agent>,
        mut action: AgentAction,
        transcript: &mut Transcript,
        evaluator: &mut TerminationEvaluator,
    ) -> Result<Option<StopReason>> {
        let speaker = agent.id().clone();
        let mut rounds = 0u32;

        loop {
            match action {
                AgentAction::Reply(text) => {
                    let msg = transcript
                        .push(speaker.clone(), MessageKind::Text, text)
                        .clone();
                    self.emit(&msg);
                    return Ok(evaluator.observe(transcript));
                }

                AgentAction::ToolResults(outcomes) => {
                    let msg = transcript
                        .push(
                            speaker.clone(),
                            MessageKind::ToolCallResult { outcomes },
                            "",
                        )
                        .clone();
                    self.emit(&msg);
                    return Ok(evaluator.observe(transcript));
                }

                AgentAction::RequestInput { prompt } => {
                    // Blocking from the orchestrator's viewpoint: the human
                    // proxy resolves its own delegation signal.
                    let text = agent.provide_input(&prompt).await.map_err(|source| {
                        TeamError::Agent {
                            agent: speaker.to_string(),
                            source,
                        }
                    })?;
                    action = AgentAction::Reply(text);
                }

                AgentAction::CallTools(calls) => {
                    let request = transcript
                        .push(
                            speaker.clone(),
                            MessageKind::ToolCallRequest {
                                calls: calls.clone(),
                            },
                            "",
                        )
                        .clone();
                    self.emit(&request);
                    if let Some(reason) = evaluator.observe(transcript) {
                        return Ok(Some(reason));
                    }

                    if rounds >= self.config.max_tool_reentry {
                        // Reentry budget exhausted: answer the request with
                        // error outcomes and conclude the turn without a
                        // reply, so a tool-hungry agent cannot loop forever.
                        tracing::warn!(
                            agent = %speaker,
                            rounds,
                            "tool reentry budget exhausted, concluding turn"
                        );
                        let outcomes: Vec<ToolOutcome> = calls
                            .iter()
                            .map(|c| {
                                ToolOutcome::error(
                                    &c.id,
                                    "Error: tool budget for this turn is exhausted",
                                )
                            })
                            .collect();
                        let msg = transcript
                            .push(AgentId::tools(), MessageKind::ToolCallResult { outcomes }, "")
                            .clone();
                        self.emit(&msg);
                        return Ok(evaluator.observe(transcript));
                    }

                    let outcomes = self.registry.invoke_all(&calls).await;
                    let result = transcript
                        .push(AgentId::tools(), MessageKind::ToolCallResult { outcomes }, "")
                        .clone();
                    self.emit(&result);
                    if let Some(reason) = evaluator.observe(transcript) {
                        return Ok(Some(reason));
                    }

                    rounds += 1;

                    // Bounded reentry: the same agent consumes the result.
                    action = agent.act(transcript.messages()).await.map_err(|source| {
                        TeamError::Agent {
                            agent: speaker.to_string(),
                            source,
                        }
                    })?;
                }
            }
        }
    }

    // -- Private helpers ----------------------------------------------------

    fn validate(&self, task: &str) -> Result<()> {
        if self.agents.is_empty() {
            return Err(TeamError::Config {
                reason: "roster must contain at least one agent".into(),
            });
        }
        if task.trim().is_empty() {
            return Err(TeamError::Config {
                reason: "task must not be empty".into(),
            });
        }
        if self.config.max_steps == 0 {
            return Err(TeamError::Config {
                reason: "max_steps must be at least 1".into(),
            });
        }

        let mut seen = HashSet::new();
        for agent in &self.agents {
            let id = agent.id().as_str();
            if id == AgentId::user().as_str() || id == AgentId::tools().as_str() {
                return Err(TeamError::Config {
                    reason: format!("agent id `{id}` is reserved"),
                });
            }
            if !seen.insert(id.to_owned()) {
                return Err(TeamError::Config {
                    reason: format!("duplicate agent id `{id}`"),
                });
            }
        }

        Ok(())
    }

    fn agent_by_id(&self, id: &AgentId) -> Option<Arc<dyn Agent>> {
        self.agents.iter().find(|a| a.id() == id).cloned()
    }

    /// The roster member after `id`, wrapping around.
    fn next_after(&self, id: &AgentId) -> AgentId {
        let pos = self
            .roster
            .iter()
            .position(|e| &e.id == id)
            .unwrap_or(0);
        self.roster[(pos + 1) % self.roster.len()].id.clone()
    }

    fn emit(&self, msg: &roundtable_core::ChatMessage) {
        for sink in &self.sinks {
            sink.emit(msg);
        }
    }

    fn outcome(&self, run_id: Uuid, transcript: Transcript, stop: StopCause) -> ChatOutcome {
        let final_message = transcript
            .messages()
            .iter()
            .rev()
            .find(|m| matches!(m.kind, MessageKind::Text))
            .map(|m| m.content.clone())
            .unwrap_or_default();

        tracing::info!(
            run_id = %run_id,
            messages = transcript.len(),
            stop = %stop,
            "group chat run finished"
        );

        ChatOutcome {
            run_id,
            transcript,
            stop,
            final_message,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::RoundRobin;
    use roundtable_agent::{AssistantAgent, ScriptedCompletion};

    fn scripted_agent(id: &str, replies: &[&str]) -> Arc<dyn Agent> {
        Arc::new(AssistantAgent::new(
            id,
            format!("the {id} role"),
            Arc::new(ScriptedCompletion::replies(replies)),
        ))
    }

    #[tokio::test]
    async fn empty_roster_fails_fast() {
        let mut chat = GroupChat::new(Vec::new(), Box::new(RoundRobin::new()));
        let err = chat.run("task").await.unwrap_err();
        assert!(matches!(err, TeamError::Config { .. }));
    }

    #[tokio::test]
    async fn empty_task_fails_fast() {
        let mut chat = GroupChat::new(
            vec![scripted_agent("a", &["hi"])],
            Box::new(RoundRobin::new()),
        );
        let err = chat.run("   ").await.unwrap_err();
        assert!(matches!(err, TeamError::Config { .. }));
    }

    #[tokio::test]
    async fn duplicate_agent_ids_fail_fast() {
        let mut chat = GroupChat::new(
            vec![scripted_agent("a", &["x"]), scripted_agent("a", &["y"])],
            Box::new(RoundRobin::new()),
        );
        let err = chat.run("task").await.unwrap_err();
        assert!(matches!(err, TeamError::Config { .. }));
    }

    #[tokio::test]
    async fn reserved_agent_id_fails_fast() {
        let mut chat = GroupChat::new(
            vec![scripted_agent("user", &["x"])],
            Box::new(RoundRobin::new()),
        );
        let err = chat.run("task").await.unwrap_err();
        assert!(matches!(err, TeamError::Config { .. }));
    }

    #[tokio::test]
    async fn zero_step_budget_fails_fast() {
        let mut chat = GroupChat::new(
            vec![scripted_agent("a", &["x"])],
            Box::new(RoundRobin::new()),
        )
        .with_config(ChatConfig {
            max_steps: 0,
            ..ChatConfig::default()
        });
        let err = chat.run("task").await.unwrap_err();
        assert!(matches!(err, TeamError::Config { .. }));
    }

    #[tokio::test]
    async fn budget_exhaustion_is_an_outcome_not_an_error() {
        let mut chat = GroupChat::new(
            vec![scripted_agent("a", &["one", "two", "three"])],
            Box::new(RoundRobin::new()),
        )
        .with_termination(TerminationCondition::text_mention("NEVER"))
        .with_config(ChatConfig {
            max_steps: 3,
            ..ChatConfig::default()
        });

        let outcome = chat.run("talk").await.unwrap();
        assert_eq!(outcome.stop, StopCause::BudgetExhausted);
        // Seed plus three replies.
        assert_eq!(outcome.transcript.len(), 4);
        assert_eq!(outcome.final_message, "three");
    }

    #[tokio::test]
    async fn fatal_agent_error_surfaces() {
        // An exhausted script acts like an unreachable completion service.
        let mut chat = GroupChat::new(
            vec![scripted_agent("a", &[])],
            Box::new(RoundRobin::new()),
        );
        let err = chat.run("task").await.unwrap_err();
        assert!(matches!(err, TeamError::Agent { .. }));
    }

    #[tokio::test]
    async fn consecutive_turn_cap_reassigns_turn() {
        // Single-agent roster with a cap: once the cap is hit the turn
        // wraps back to the same (only) agent, which just proves the cap
        // path does not wedge the loop; with two agents the reassignment
        // picks the other member.
        let mut chat = GroupChat::new(
            vec![
                scripted_agent("a", &["from a", "from a again"]),
                scripted_agent("b", &["from b"]),
            ],
            Box::new(AlwaysFirst),
        )
        .with_termination(TerminationCondition::max_messages(4))
        .with_config(ChatConfig {
            max_consecutive_turns: Some(1),
            ..ChatConfig::default()
        });

        let outcome = chat.run("go").await.unwrap();
        let senders: Vec<String> = outcome
            .transcript
            .messages()
            .iter()
            .map(|m| m.sender.to_string())
            .collect();
        // Selector always says "a"; the cap forces every second turn to "b".
        assert_eq!(senders, ["user", "a", "b", "a"]);
    }

    /// A selector that always picks the first roster member, for exercising
    /// the orchestrator's cap enforcement.
    struct AlwaysFirst;

    #[async_trait::async_trait]
    impl crate::selector::TurnSelector for AlwaysFirst {
        async fn select_next(
            &mut self,
            roster: &[RosterEntry],
            _history: &[roundtable_core::ChatMessage],
        ) -> Result<AgentId> {
            Ok(roster[0].id.clone())
        }
    }
}
