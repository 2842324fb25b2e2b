//! Core error types.
//!
//! All core subsystems surface errors through [`CoreError`].  Each variant
//! carries enough context for callers to decide how to handle the failure
//! without inspecting opaque strings.

/// Unified error type for the conversation-runtime core.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    // -- Tool errors --------------------------------------------------------
    /// A tool call referenced a name that is not in the registry.
    #[error("unknown tool: {name}")]
    UnknownTool { name: String },

    /// A tool with the same name is already registered.
    #[error("duplicate tool registration: {name}")]
    DuplicateTool { name: String },

    /// The arguments of a tool call do not satisfy the tool's schema.
    #[error("invalid arguments for tool `{tool}`: {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// The tool body reported a failure.
    #[error("tool `{tool}` failed: {reason}")]
    ToolFailed { tool: String, reason: String },

    // -- Transcript errors --------------------------------------------------
    /// The appended message carries a sequence number already in the log.
    #[error("duplicate message append (seq {seq})")]
    DuplicateMessage { seq: u64 },

    /// The appended message skips ahead of the log's next sequence number.
    #[error("message sequence gap: expected {expected}, got {got}")]
    SequenceGap { expected: u64, got: u64 },

    // -- Termination errors -------------------------------------------------
    /// The termination tree is structurally invalid (e.g. an empty
    /// composite or a zero message budget).
    #[error("malformed termination condition: {reason}")]
    MalformedCondition { reason: String },

    // -- Serialization ------------------------------------------------------
    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    // -- Generic ------------------------------------------------------------
    /// Catch-all for unexpected internal errors.  Prefer a typed variant
    /// whenever possible.
    #[error("internal core error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;
