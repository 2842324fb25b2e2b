//! Termination-condition algebra and evaluator.
//!
//! Conditions are declared as a tree of [`TerminationCondition`] values and
//! compiled per run into a [`TerminationEvaluator`].  The evaluator is a
//! `running -> terminated` latch: once it fires it stays fired, and a fresh
//! evaluator must be built for every run.
//!
//! `TextMention` scans the whole log (mention-anywhere semantics) but each
//! message is scanned exactly once thanks to an internal cursor, so a
//! duplicate append can never double-fire a condition.  Token matching is
//! exact-substring; case sensitivity is an explicit [`MatchMode`] flag, not
//! a guess.

use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use aho_corasick::AhoCorasick;

use crate::error::{CoreError, Result};
use crate::message::Transcript;

// ---------------------------------------------------------------------------
// Stop handle
// ---------------------------------------------------------------------------

/// Cloneable out-of-band cancellation flag.
///
/// A supervising task raises the handle; the evaluator observes it at the
/// top of each orchestrator step, so in-flight steps complete but no new
/// step begins.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    raised: Arc<AtomicBool>,
}

impl StopHandle {
    /// Create an unraised handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal.  Idempotent.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    /// Whether the signal has been raised.
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Condition tree
// ---------------------------------------------------------------------------

/// How `TextMention` compares its token against message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Case-sensitive substring match (the default).
    #[default]
    Exact,
    /// Case-insensitive substring match.
    CaseInsensitive,
}

/// A declarative termination condition, composable into a boolean tree.
#[derive(Debug, Clone)]
pub enum TerminationCondition {
    /// Fires once the log holds at least `n` messages.
    MaxMessages(usize),

    /// Fires once any message's text contains the token as a substring.
    TextMention { token: String, mode: MatchMode },

    /// Fires once the associated [`StopHandle`] has been raised.
    ExternalSignal(StopHandle),

    /// Fires once every child condition has fired.
    All(Vec<TerminationCondition>),

    /// Fires once any child condition has fired.
    Any(Vec<TerminationCondition>),
}

impl TerminationCondition {
    /// A message-count condition.
    pub fn max_messages(n: usize) -> Self {
        Self::MaxMessages(n)
    }

    /// A case-sensitive substring mention condition.
    pub fn text_mention(token: impl Into<String>) -> Self {
        Self::TextMention {
            token: token.into(),
            mode: MatchMode::Exact,
        }
    }

    /// A mention condition with an explicit match mode.
    pub fn text_mention_with_mode(token: impl Into<String>, mode: MatchMode) -> Self {
        Self::TextMention {
            token: token.into(),
            mode,
        }
    }

    /// An external-cancellation condition observing `handle`.
    pub fn external(handle: StopHandle) -> Self {
        Self::ExternalSignal(handle)
    }

    /// Combine with another condition; the result fires when either does.
    pub fn or(self, other: TerminationCondition) -> Self {
        match self {
            Self::Any(mut children) => {
                children.push(other);
                Self::Any(children)
            }
            first => Self::Any(vec![first, other]),
        }
    }

    /// Combine with another condition; the result fires when both have.
    pub fn and(self, other: TerminationCondition) -> Self {
        match self {
            Self::All(mut children) => {
                children.push(other);
                Self::All(children)
            }
            first => Self::All(vec![first, other]),
        }
    }

    /// Structural validation, run before a conversation starts.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::MaxMessages(0) => Err(CoreError::MalformedCondition {
                reason: "MaxMessages budget must be at least 1".into(),
            }),
            Self::MaxMessages(_) | Self::ExternalSignal(_) => Ok(()),
            Self::TextMention { token, .. } if token.is_empty() => {
                Err(CoreError::MalformedCondition {
                    reason: "TextMention token must not be empty".into(),
                })
            }
            Self::TextMention { .. } => Ok(()),
            Self::All(children) | Self::Any(children) => {
                if children.is_empty() {
                    return Err(CoreError::MalformedCondition {
                        reason: "composite condition must have at least one child".into(),
                    });
                }
                children.iter().try_for_each(TerminationCondition::validate)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Stop reasons
// ---------------------------------------------------------------------------

/// Why a run terminated.  Composites report the leaf that decided them:
/// `Any` the leaf that fired, `All` the leaf that completed the conjunction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The message budget was reached.
    MaxMessages(usize),
    /// The token was mentioned in a message.
    TextMention(String),
    /// The external stop signal was raised.
    ExternalSignal,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MaxMessages(n) => write!(f, "message budget reached ({n})"),
            Self::TextMention(token) => write!(f, "`{token}` mentioned"),
            Self::ExternalSignal => write!(f, "external stop signal"),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

/// Compiled, latching form of one condition-tree node.
enum EvalNode {
    MaxMessages {
        n: usize,
        fired: Option<StopReason>,
    },
    TextMention {
        token: String,
        automaton: AhoCorasick,
        fired: Option<StopReason>,
    },
    External {
        handle: StopHandle,
        fired: Option<StopReason>,
    },
    All {
        children: Vec<EvalNode>,
        fired: Option<StopReason>,
    },
    Any {
        children: Vec<EvalNode>,
        fired: Option<StopReason>,
    },
}

impl EvalNode {
    fn compile(condition: &TerminationCondition) -> Result<Self> {
        match condition {
            TerminationCondition::MaxMessages(n) => Ok(Self::MaxMessages {
                n: *n,
                fired: None,
            }),
            TerminationCondition::TextMention { token, mode } => {
                let automaton = AhoCorasick::builder()
                    .ascii_case_insensitive(*mode == MatchMode::CaseInsensitive)
                    .build([token.as_str()])
                    .map_err(|e| CoreError::MalformedCondition {
                        reason: format!("cannot compile mention matcher: {e}"),
                    })?;
                Ok(Self::TextMention {
                    token: token.clone(),
                    automaton,
                    fired: None,
                })
            }
            TerminationCondition::ExternalSignal(handle) => Ok(Self::External {
                handle: handle.clone(),
                fired: None,
            }),
            TerminationCondition::All(children) => Ok(Self::All {
                children: children
                    .iter()
                    .map(Self::compile)
                    .collect::<Result<Vec<_>>>()?,
                fired: None,
            }),
            TerminationCondition::Any(children) => Ok(Self::Any {
                children: children
                    .iter()
                    .map(Self::compile)
                    .collect::<Result<Vec<_>>>()?,
                fired: None,
            }),
        }
    }

    /// Evaluate this node against the log, scanning only `fresh` messages
    /// for content conditions.  Fired nodes stay fired.
    fn evaluate(&mut self, log: &Transcript, fresh: &Range<usize>) -> Option<StopReason> {
        match self {
            Self::MaxMessages { n, fired } => {
                if fired.is_none() && log.len() >= *n {
                    *fired = Some(StopReason::MaxMessages(*n));
                }
                fired.clone()
            }
            Self::TextMention {
                token,
                automaton,
                fired,
            } => {
                if fired.is_none() {
                    for msg in &log.messages()[fresh.clone()] {
                        if automaton.is_match(&msg.scan_text()) {
                            *fired = Some(StopReason::TextMention(token.clone()));
                            break;
                        }
                    }
                }
                fired.clone()
            }
            Self::External { handle, fired } => {
                if fired.is_none() && handle.is_raised() {
                    *fired = Some(StopReason::ExternalSignal);
                }
                fired.clone()
            }
            Self::All { children, fired } => {
                if fired.is_none() {
                    let mut last: Option<StopReason> = None;
                    let mut all_fired = true;
                    for child in children.iter_mut() {
                        match child.evaluate(log, fresh) {
                            Some(reason) => last = Some(reason),
                            None => all_fired = false,
                        }
                    }
                    if all_fired {
                        *fired = last;
                    }
                }
                fired.clone()
            }
            Self::Any { children, fired } => {
                if fired.is_none() {
                    for child in children.iter_mut() {
                        if let Some(reason) = child.evaluate(log, fresh) {
                            *fired = Some(reason);
                            break;
                        }
                    }
                }
                fired.clone()
            }
        }
    }
}

/// Stateful predicate over a growing transcript.
///
/// Build one per run via [`TerminationEvaluator::new`]; the constructor
/// validates the tree, so a malformed condition fails fast before any agent
/// acts.
pub struct TerminationEvaluator {
    root: EvalNode,
    /// Index of the next message to scan for content conditions.
    cursor: usize,
    fired: Option<StopReason>,
}

impl TerminationEvaluator {
    /// Compile a fresh evaluator from a declarative tree.
    pub fn new(condition: &TerminationCondition) -> Result<Self> {
        condition.validate()?;
        Ok(Self {
            root: EvalNode::compile(condition)?,
            cursor: 0,
            fired: None,
        })
    }

    /// Evaluate against the current log snapshot.
    ///
    /// Returns the stop reason once the tree fires; subsequent calls return
    /// the same reason.  Safe to call with no new messages (external
    /// signals are re-polled every time).
    pub fn observe(&mut self, log: &Transcript) -> Option<StopReason> {
        if let Some(reason) = &self.fired {
            return Some(reason.clone());
        }

        let fresh = self.cursor..log.len();
        self.cursor = log.len();

        let reason = self.root.evaluate(log, &fresh);
        if let Some(r) = &reason {
            tracing::info!(reason = %r, messages = log.len(), "termination condition fired");
            self.fired = reason.clone();
        }
        reason
    }

    /// Whether the evaluator has reached its terminal state.
    pub fn is_terminated(&self) -> bool {
        self.fired.is_some()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{AgentId, MessageKind};

    fn log_with(texts: &[&str]) -> Transcript {
        let mut log = Transcript::new();
        for t in texts {
            log.push(AgentId::user(), MessageKind::Text, *t);
        }
        log
    }

    #[test]
    fn max_messages_boundary() {
        let mut eval =
            TerminationEvaluator::new(&TerminationCondition::max_messages(3)).unwrap();

        let log = log_with(&["one", "two"]);
        assert_eq!(eval.observe(&log), None, "must stay running at n-1");

        let log = log_with(&["one", "two", "three"]);
        assert_eq!(eval.observe(&log), Some(StopReason::MaxMessages(3)));
        assert!(eval.is_terminated());
    }

    #[test]
    fn text_mention_fires_on_substring() {
        let mut eval =
            TerminationEvaluator::new(&TerminationCondition::text_mention("TERMINATE")).unwrap();

        let log = log_with(&["still working"]);
        assert_eq!(eval.observe(&log), None);

        // Substring policy: "TERMINATED" contains "TERMINATE" and fires.
        let log = log_with(&["still working", "all done. TERMINATED"]);
        assert_eq!(
            eval.observe(&log),
            Some(StopReason::TextMention("TERMINATE".into()))
        );
    }

    #[test]
    fn text_mention_is_case_sensitive_by_default() {
        let mut eval =
            TerminationEvaluator::new(&TerminationCondition::text_mention("TERMINATE")).unwrap();
        let log = log_with(&["please terminate now"]);
        assert_eq!(eval.observe(&log), None, "lowercase must not match Exact mode");
    }

    #[test]
    fn text_mention_case_insensitive_mode() {
        let mut eval = TerminationEvaluator::new(&TerminationCondition::text_mention_with_mode(
            "TERMINATE",
            MatchMode::CaseInsensitive,
        ))
        .unwrap();
        let log = log_with(&["please terminate now"]);
        assert_eq!(
            eval.observe(&log),
            Some(StopReason::TextMention("TERMINATE".into()))
        );
    }

    #[test]
    fn mention_anywhere_in_history() {
        // The token arrived before the evaluator's first observe call; the
        // whole log is scanned, not just the latest message.
        let mut eval =
            TerminationEvaluator::new(&TerminationCondition::text_mention("APPROVE")).unwrap();
        let log = log_with(&["APPROVE this", "unrelated", "more"]);
        assert!(eval.observe(&log).is_some());
    }

    #[test]
    fn external_signal_polled_without_new_messages() {
        let handle = StopHandle::new();
        let mut eval =
            TerminationEvaluator::new(&TerminationCondition::external(handle.clone())).unwrap();

        let log = log_with(&["seed"]);
        assert_eq!(eval.observe(&log), None);

        handle.raise();
        // Same log snapshot; the signal alone must fire the evaluator.
        assert_eq!(eval.observe(&log), Some(StopReason::ExternalSignal));
    }

    #[test]
    fn or_composition_fires_on_either() {
        let cond = TerminationCondition::max_messages(10)
            .or(TerminationCondition::text_mention("TERMINATE"));
        let mut eval = TerminationEvaluator::new(&cond).unwrap();

        let log = log_with(&["short chat. TERMINATE"]);
        assert_eq!(
            eval.observe(&log),
            Some(StopReason::TextMention("TERMINATE".into()))
        );
    }

    #[test]
    fn and_composition_needs_both() {
        let cond = TerminationCondition::max_messages(2)
            .and(TerminationCondition::text_mention("DONE"));
        let mut eval = TerminationEvaluator::new(&cond).unwrap();

        let log = log_with(&["one", "two"]);
        assert_eq!(eval.observe(&log), None, "count fired but mention did not");

        let log = log_with(&["one", "two", "DONE"]);
        let reason = eval.observe(&log);
        assert_eq!(reason, Some(StopReason::TextMention("DONE".into())));
    }

    #[test]
    fn terminated_is_a_latch() {
        let mut eval =
            TerminationEvaluator::new(&TerminationCondition::max_messages(1)).unwrap();
        let log = log_with(&["only"]);
        let first = eval.observe(&log);
        assert!(first.is_some());

        // Growing the log afterwards cannot change the recorded reason.
        let log = log_with(&["only", "and more", "TERMINATE"]);
        assert_eq!(eval.observe(&log), first);
    }

    #[test]
    fn malformed_trees_fail_fast() {
        assert!(TerminationEvaluator::new(&TerminationCondition::max_messages(0)).is_err());
        assert!(TerminationEvaluator::new(&TerminationCondition::Any(vec![])).is_err());
        assert!(TerminationEvaluator::new(&TerminationCondition::text_mention("")).is_err());
    }
}
