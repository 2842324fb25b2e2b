//! Agent error types.
//!
//! All agent subsystems surface errors through [`AgentError`].  Service
//! failures (unreachable endpoint, unparseable response) are fatal to a run;
//! everything recoverable is reported through tool outcomes at the core
//! layer instead.

/// Unified error type for the agent layer.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    // -- Completion-service errors ------------------------------------------
    /// The HTTP request to the completion provider failed outright.
    #[error("completion service unreachable: {reason}")]
    ServiceUnreachable { reason: String },

    /// The provider answered with a non-success status.
    #[error("completion service failed: {reason}")]
    ServiceFailed { reason: String },

    /// The provider's response could not be parsed into the expected shape.
    #[error("completion response parse error: {reason}")]
    ResponseParse { reason: String },

    /// The API key is missing for a provider that requires one.
    #[error("missing api key for provider: {provider}")]
    MissingApiKey { provider: String },

    // -- Agent contract errors ----------------------------------------------
    /// An agent was invoked with an empty history; the log always holds at
    /// least the seed task message.
    #[error("agent `{agent}` invoked with empty history")]
    EmptyHistory { agent: String },

    /// A tool-executing agent took a turn with no pending tool-call request.
    #[error("agent `{agent}` has no pending tool calls to execute")]
    NoPendingToolCalls { agent: String },

    /// The agent does not support resolving external-input requests.
    #[error("agent `{agent}` cannot provide external input")]
    InputUnsupported { agent: String },

    /// Reading external input failed.
    #[error("input collaborator failed: {reason}")]
    InputFailed { reason: String },

    // -- Upstream crate errors -----------------------------------------------
    /// An error propagated from the core crate.
    #[error("core error: {0}")]
    Core(#[from] roundtable_core::CoreError),
}

/// Convenience alias used throughout the agent crate.
pub type Result<T> = std::result::Result<T, AgentError>;

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        Self::ServiceUnreachable {
            reason: err.to_string(),
        }
    }
}
