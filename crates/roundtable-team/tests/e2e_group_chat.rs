//! End-to-end tests for the group-chat runtime.
//!
//! These exercise real agents over scripted completion services, the real
//! tool registry, and the real termination evaluator — no shortcuts: every
//! message flows through the orchestrator's transcript exactly as it would
//! with a live provider.

use std::sync::Arc;

use serde_json::json;

use roundtable_agent::{
    Agent, AssistantAgent, CompletionOutcome, FixedInput, ScriptedCompletion, UserProxyAgent,
};
use roundtable_core::{
    AgentId, Calculator, MessageKind, StopHandle, StopReason, TerminationCondition, ToolCall,
    ToolRegistry,
};
use roundtable_team::{ChatConfig, GroupChat, ModelSelector, RoundRobin, StopCause};

fn assistant(id: &str, replies: &[&str]) -> Arc<dyn Agent> {
    Arc::new(AssistantAgent::new(
        id,
        format!("the {id} role"),
        Arc::new(ScriptedCompletion::replies(replies)),
    ))
}

// ── round-robin with a human proxy ───────────────────────────────────────────

/// Roster [assistant, human-proxy], round-robin, `MaxMessages(4)`.
/// Seed "say hi" → assistant "hi" → proxy "hello" → assistant "bye".
/// The run must stop for the message budget with exactly 4 logged messages.
#[tokio::test]
async fn round_robin_with_proxy_stops_on_message_budget() {
    let proxy: Arc<dyn Agent> = Arc::new(UserProxyAgent::new(
        "user_proxy",
        "a human in the loop",
        Arc::new(FixedInput::new(&["hello"])),
    ));

    let mut chat = GroupChat::new(
        vec![assistant("assistant", &["hi", "bye"]), proxy],
        Box::new(RoundRobin::new()),
    )
    .with_termination(TerminationCondition::max_messages(4));

    let outcome = chat.run("say hi").await.expect("run succeeds");

    assert_eq!(outcome.stop, StopCause::Terminated(StopReason::MaxMessages(4)));
    assert_eq!(outcome.transcript.len(), 4);

    let contents: Vec<&str> = outcome
        .transcript
        .messages()
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, ["say hi", "hi", "hello", "bye"]);

    let senders: Vec<String> = outcome
        .transcript
        .messages()
        .iter()
        .map(|m| m.sender.to_string())
        .collect();
    assert_eq!(senders, ["user", "assistant", "user_proxy", "assistant"]);
}

// ── tool round with bounded reentry ──────────────────────────────────────────

/// Single assistant with a calculator. The scripted model first requests
/// `calculator(2, 2, "+")`, then — re-invoked once to consume the result —
/// replies "4. TERMINATE".  The run must stop on the mention.
#[tokio::test]
async fn tool_call_then_mention_terminates() {
    let registry = Arc::new(ToolRegistry::new());
    registry.register(Arc::new(Calculator::new())).unwrap();

    let script = ScriptedCompletion::tool_call_then_replies(
        vec![ToolCall {
            id: "call-1".into(),
            name: "calculator".into(),
            arguments: json!({"a": 2, "b": 2, "op": "+"}),
        }],
        &["4. TERMINATE"],
    );

    let solver: Arc<dyn Agent> = Arc::new(
        AssistantAgent::new("solver", "solves arithmetic with tools", Arc::new(script))
            .with_tools(registry.schemas()),
    );

    let mut chat = GroupChat::new(vec![solver], Box::new(RoundRobin::new()))
        .with_registry(registry)
        .with_termination(
            TerminationCondition::max_messages(10)
                .or(TerminationCondition::text_mention("TERMINATE")),
        );

    let outcome = chat.run("What is 2+2?").await.expect("run succeeds");

    assert_eq!(
        outcome.stop,
        StopCause::Terminated(StopReason::TextMention("TERMINATE".into()))
    );
    assert_eq!(outcome.final_message, "4. TERMINATE");

    // Log shape: seed, tool request, tool result, final reply.
    let kinds: Vec<&str> = outcome
        .transcript
        .messages()
        .iter()
        .map(|m| match &m.kind {
            MessageKind::Text => "text",
            MessageKind::ToolCallRequest { .. } => "request",
            MessageKind::ToolCallResult { .. } => "result",
        })
        .collect();
    assert_eq!(kinds, ["text", "request", "result", "text"]);

    // The tool result itself must carry the computed value.
    let MessageKind::ToolCallResult { outcomes } = &outcome.transcript.messages()[2].kind else {
        panic!("third message must be the tool result");
    };
    assert_eq!(outcomes[0].content, "4");
    assert!(!outcomes[0].is_error);
    assert_eq!(outcome.transcript.messages()[2].sender, AgentId::tools());
}

// ── unknown tool is recoverable ──────────────────────────────────────────────

/// An agent requesting a tool nobody registered gets an error outcome fed
/// back, consumes it on reentry, and the run continues to a clean stop.
#[tokio::test]
async fn unknown_tool_yields_error_outcome_and_run_continues() {
    let script = ScriptedCompletion::tool_call_then_replies(
        vec![ToolCall {
            id: "call-1".into(),
            name: "no_such_tool".into(),
            arguments: json!({}),
        }],
        &["I could not use that tool. TERMINATE"],
    );

    let solver: Arc<dyn Agent> = Arc::new(AssistantAgent::new(
        "solver",
        "tries tools",
        Arc::new(script),
    ));

    let mut chat = GroupChat::new(vec![solver], Box::new(RoundRobin::new()))
        .with_termination(TerminationCondition::text_mention("TERMINATE"));

    let outcome = chat.run("use a tool").await.expect("run succeeds");

    let MessageKind::ToolCallResult { outcomes } = &outcome.transcript.messages()[2].kind else {
        panic!("expected a tool result message");
    };
    assert!(outcomes[0].is_error);
    assert!(outcomes[0].content.contains("unknown tool"));
    assert!(matches!(
        outcome.stop,
        StopCause::Terminated(StopReason::TextMention(_))
    ));
}

// ── tool reentry bound ───────────────────────────────────────────────────────

/// An agent that requests tools again after its bounded reentry gets the
/// second request answered with budget-error outcomes and loses the turn;
/// the run then proceeds instead of looping forever.
#[tokio::test]
async fn reentry_bound_stops_tool_hungry_agent() {
    let call = ToolCall {
        id: "c".into(),
        name: "calculator".into(),
        arguments: json!({"a": 1, "b": 1, "op": "+"}),
    };
    let script = ScriptedCompletion::new(vec![
        CompletionOutcome::ToolCalls(vec![call.clone()]),
        CompletionOutcome::ToolCalls(vec![call]),
        CompletionOutcome::Text("giving up. TERMINATE".into()),
    ]);

    let registry = Arc::new(ToolRegistry::new());
    registry.register(Arc::new(Calculator::new())).unwrap();

    let solver: Arc<dyn Agent> = Arc::new(
        AssistantAgent::new("solver", "loops on tools", Arc::new(script))
            .with_tools(registry.schemas()),
    );

    let mut chat = GroupChat::new(vec![solver], Box::new(RoundRobin::new()))
        .with_registry(registry)
        .with_termination(TerminationCondition::text_mention("TERMINATE"))
        .with_config(ChatConfig {
            max_tool_reentry: 1,
            ..ChatConfig::default()
        });

    let outcome = chat.run("keep calling tools").await.expect("run succeeds");

    // Turn 1: request, result, second request, budget-error result.
    // Turn 2: the final text reply fires the mention.
    let budget_result = outcome
        .transcript
        .messages()
        .iter()
        .filter_map(|m| match &m.kind {
            MessageKind::ToolCallResult { outcomes } => Some(outcomes),
            _ => None,
        })
        .nth(1)
        .expect("second tool result present");
    assert!(budget_result[0].is_error);
    assert!(budget_result[0].content.contains("budget"));
    assert_eq!(outcome.final_message, "giving up. TERMINATE");
}

// ── external cancellation ────────────────────────────────────────────────────

/// A stop raised between steps ends the run before the next agent acts.
#[tokio::test]
async fn external_signal_stops_before_next_step() {
    let handle = StopHandle::new();

    // The agent's script would answer forever; the signal must win first.
    let chatty = assistant("chatty", &["one"]);

    let mut chat = GroupChat::new(vec![chatty], Box::new(RoundRobin::new()))
        .with_termination(TerminationCondition::external(handle.clone()));

    // Raise before the run: the seed append completes, the evaluator
    // observes the signal, and no agent ever acts.
    handle.raise();
    let outcome = chat.run("talk forever").await.expect("run succeeds");

    assert_eq!(
        outcome.stop,
        StopCause::Terminated(StopReason::ExternalSignal)
    );
    assert_eq!(outcome.transcript.len(), 1, "only the seed was logged");
}

// ── model-driven selection ───────────────────────────────────────────────────

/// A model selector drives the same roster: the scripted coordinator picks
/// the critic first, then the writer, and the mention ends the run.
#[tokio::test]
async fn model_selector_drives_turn_order() {
    let writer = assistant("writer", &["final draft. TERMINATE"]);
    let critic = assistant("critic", &["needs work"]);

    let coordinator = Arc::new(ScriptedCompletion::replies(&["critic", "writer"]));

    let mut chat = GroupChat::new(
        vec![writer, critic],
        Box::new(ModelSelector::new(coordinator)),
    )
    .with_termination(TerminationCondition::text_mention("TERMINATE"));

    let outcome = chat.run("write a paragraph").await.expect("run succeeds");

    let senders: Vec<String> = outcome
        .transcript
        .messages()
        .iter()
        .map(|m| m.sender.to_string())
        .collect();
    assert_eq!(senders, ["user", "critic", "writer"]);
    assert!(matches!(
        outcome.stop,
        StopCause::Terminated(StopReason::TextMention(_))
    ));
}

// ── successive runs on one team ──────────────────────────────────────────────

/// Each `run` call builds a fresh transcript and evaluator, so the same
/// team serves successive tasks without state bleeding between runs.
#[tokio::test]
async fn successive_runs_use_fresh_state() {
    let agent = assistant("echoer", &["first answer. DONE", "second answer. DONE"]);

    let mut chat = GroupChat::new(vec![agent], Box::new(RoundRobin::new()))
        .with_termination(TerminationCondition::text_mention("DONE"));

    let first = chat.run("task one").await.expect("first run");
    assert_eq!(first.transcript.len(), 2);
    assert_eq!(first.final_message, "first answer. DONE");

    let second = chat.run("task two").await.expect("second run");
    assert_eq!(second.transcript.len(), 2, "fresh transcript per run");
    assert_eq!(second.final_message, "second answer. DONE");
    assert_ne!(first.run_id, second.run_id);
}
