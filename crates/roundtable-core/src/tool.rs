//! Tool schemas, registry, and invocation.
//!
//! Tools are registered by name in a [`ToolRegistry`] backed by [`DashMap`],
//! which is read-only from the orchestrator's perspective once a
//! conversation starts and safe to share across concurrent runs.
//!
//! [`ToolRegistry::invoke`] is the single entry point for executing a
//! [`ToolCall`] and it never raises: an unknown name, arguments that fail
//! schema validation, a failing tool body, and a panicking tool body all
//! come back as an error-flagged [`ToolOutcome`] that flows into the
//! conversation instead of crashing the run.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{CoreError, Result};
use crate::message::{ToolCall, ToolOutcome};

// ---------------------------------------------------------------------------
// Schema types
// ---------------------------------------------------------------------------

/// The JSON type a tool parameter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// A JSON string.
    String,
    /// Any JSON number.
    Number,
    /// An integral JSON number.
    Integer,
    /// A JSON boolean.
    Bool,
}

impl ParamType {
    /// The JSON-Schema `type` keyword for this parameter type.
    fn schema_name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Bool => "boolean",
        }
    }

    /// Whether `value` is acceptable for this type.
    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Bool => value.is_boolean(),
        }
    }
}

/// One parameter in a tool's ordered parameter list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name, unique within the tool.
    pub name: String,

    /// Accepted JSON type.
    pub param_type: ParamType,

    /// Whether the parameter must be present in every call.
    pub required: bool,

    /// Human-readable description shown to the model.
    pub description: String,
}

impl ParamSpec {
    /// Build a required parameter.
    pub fn required(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: true,
            description: description.into(),
        }
    }

    /// Build an optional parameter.
    pub fn optional(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: false,
            description: description.into(),
        }
    }
}

/// The callable contract of one tool: name, description, and an ordered
/// parameter list.  Names are unique within a registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool name.
    pub name: String,

    /// Human-readable description of what the tool does.
    pub description: String,

    /// Ordered parameter list.
    pub params: Vec<ParamSpec>,
}

impl ToolSchema {
    /// Build a schema from a name, description, and parameter list.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        params: Vec<ParamSpec>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params,
        }
    }

    /// Project the parameter list into a JSON-Schema object suitable for a
    /// completion provider's tool definition.
    pub fn input_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required: Vec<&str> = Vec::new();

        for p in &self.params {
            properties.insert(
                p.name.clone(),
                json!({
                    "type": p.param_type.schema_name(),
                    "description": p.description,
                }),
            );
            if p.required {
                required.push(&p.name);
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Validate a call's arguments against this schema.
    ///
    /// Arguments must be a JSON object; every required parameter must be
    /// present; present parameters must match their declared type.  Unknown
    /// keys are tolerated.
    pub fn validate(&self, args: &Value) -> Result<()> {
        let Some(obj) = args.as_object() else {
            return Err(CoreError::InvalidArguments {
                tool: self.name.clone(),
                reason: "arguments must be a JSON object".into(),
            });
        };

        for p in &self.params {
            match obj.get(&p.name) {
                Some(v) => {
                    if !p.param_type.accepts(v) {
                        return Err(CoreError::InvalidArguments {
                            tool: self.name.clone(),
                            reason: format!(
                                "parameter `{}` must be of type {}",
                                p.name,
                                p.param_type.schema_name()
                            ),
                        });
                    }
                }
                None if p.required => {
                    return Err(CoreError::InvalidArguments {
                        tool: self.name.clone(),
                        reason: format!("missing required parameter `{}`", p.name),
                    });
                }
                None => {}
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tool trait
// ---------------------------------------------------------------------------

/// A callable tool.
///
/// Implementations return their result as a string suitable for feeding back
/// into the conversation.  Failures are reported through the `Result`; the
/// registry converts them into error outcomes rather than letting them
/// propagate into the orchestrator.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's schema (name, description, parameters).
    fn schema(&self) -> &ToolSchema;

    /// Execute the tool with validated arguments.
    async fn run(&self, args: Value) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Concurrent tool registry backed by [`DashMap`].
///
/// Cheaply cloneable (`Arc`-backed) and `Send + Sync`; the schema table is
/// read-only after initialization, so concurrent conversations can share one
/// registry without locking.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    inner: Arc<DashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its schema name.
    ///
    /// Registering a second tool with the same name is a configuration
    /// error.
    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.schema().name.clone();
        if self.inner.contains_key(&name) {
            return Err(CoreError::DuplicateTool { name });
        }

        tracing::info!(tool = %name, "tool registered");
        self.inner.insert(name, tool);
        Ok(())
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.inner.get(name).map(|e| e.value().clone())
    }

    /// Snapshot of all registered schemas, sorted by name for stable output.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> =
            self.inner.iter().map(|e| e.value().schema().clone()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Number of registered tools.
    pub fn count(&self) -> usize {
        self.inner.len()
    }

    /// Execute one tool call, converting every failure mode into an error
    /// outcome.
    ///
    /// The tool body runs on a spawned task so a panic inside it is
    /// contained and reported as an error outcome as well.
    pub async fn invoke(&self, call: &ToolCall) -> ToolOutcome {
        let Some(tool) = self.get(&call.name) else {
            tracing::warn!(tool = %call.name, "unknown tool requested");
            let err = CoreError::UnknownTool {
                name: call.name.clone(),
            };
            return ToolOutcome::error(&call.id, format!("Error: {err}"));
        };

        if let Err(e) = tool.schema().validate(&call.arguments) {
            tracing::warn!(tool = %call.name, error = %e, "tool arguments rejected");
            return ToolOutcome::error(&call.id, format!("Error: {e}"));
        }

        let args = call.arguments.clone();
        let tool_name = call.name.clone();
        let handle = tokio::spawn(async move { tool.run(args).await });

        match handle.await {
            Ok(Ok(content)) => {
                tracing::debug!(tool = %tool_name, "tool executed");
                ToolOutcome::ok(&call.id, content)
            }
            Ok(Err(e)) => {
                tracing::warn!(tool = %tool_name, error = %e, "tool execution failed");
                ToolOutcome::error(&call.id, format!("Error: {e}"))
            }
            Err(e) => {
                tracing::warn!(tool = %tool_name, error = %e, "tool task panicked");
                ToolOutcome::error(&call.id, format!("Error: tool `{tool_name}` crashed: {e}"))
            }
        }
    }

    /// Execute a batch of calls in order, one outcome per call.
    pub async fn invoke_all(&self, calls: &[ToolCall]) -> Vec<ToolOutcome> {
        let mut outcomes = Vec::with_capacity(calls.len());
        for call in calls {
            outcomes.push(self.invoke(call).await);
        }
        outcomes
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct Shout {
        schema: ToolSchema,
    }

    impl Shout {
        fn new() -> Self {
            Self {
                schema: ToolSchema::new(
                    "shout",
                    "Uppercase the input",
                    vec![ParamSpec::required(
                        "text",
                        ParamType::String,
                        "Text to uppercase",
                    )],
                ),
            }
        }
    }

    #[async_trait]
    impl Tool for Shout {
        fn schema(&self) -> &ToolSchema {
            &self.schema
        }

        async fn run(&self, args: Value) -> Result<String> {
            let text = args["text"].as_str().unwrap_or_default();
            Ok(text.to_uppercase())
        }
    }

    struct Faulty {
        schema: ToolSchema,
    }

    #[async_trait]
    impl Tool for Faulty {
        fn schema(&self) -> &ToolSchema {
            &self.schema
        }

        async fn run(&self, _args: Value) -> Result<String> {
            Err(CoreError::ToolFailed {
                tool: "faulty".into(),
                reason: "it always breaks".into(),
            })
        }
    }

    fn call(name: &str, args: Value) -> ToolCall {
        ToolCall {
            id: "call-1".into(),
            name: name.into(),
            arguments: args,
        }
    }

    #[tokio::test]
    async fn invoke_success() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(Shout::new())).unwrap();

        let outcome = registry.invoke(&call("shout", json!({"text": "hi"}))).await;
        assert!(!outcome.is_error);
        assert_eq!(outcome.content, "HI");
        assert_eq!(outcome.call_id, "call-1");
    }

    #[tokio::test]
    async fn invoke_unknown_tool_is_error_outcome() {
        let registry = ToolRegistry::new();
        let outcome = registry.invoke(&call("nope", json!({}))).await;
        assert!(outcome.is_error);
        assert!(outcome.content.contains("unknown tool"));
    }

    #[tokio::test]
    async fn invoke_missing_required_param_is_error_outcome() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(Shout::new())).unwrap();

        let outcome = registry.invoke(&call("shout", json!({}))).await;
        assert!(outcome.is_error);
        assert!(outcome.content.contains("missing required parameter"));
    }

    #[tokio::test]
    async fn invoke_type_mismatch_is_error_outcome() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(Shout::new())).unwrap();

        let outcome = registry
            .invoke(&call("shout", json!({"text": 42})))
            .await;
        assert!(outcome.is_error);
        assert!(outcome.content.contains("must be of type string"));
    }

    #[tokio::test]
    async fn invoke_tool_failure_is_error_outcome() {
        let registry = ToolRegistry::new();
        registry
            .register(Arc::new(Faulty {
                schema: ToolSchema::new("faulty", "Always fails", vec![]),
            }))
            .unwrap();

        let outcome = registry.invoke(&call("faulty", json!({}))).await;
        assert!(outcome.is_error);
        assert!(outcome.content.contains("it always breaks"));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(Shout::new())).unwrap();
        let err = registry.register(Arc::new(Shout::new())).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateTool { .. }));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn input_schema_projection() {
        let schema = ToolSchema::new(
            "demo",
            "Demo tool",
            vec![
                ParamSpec::required("a", ParamType::Number, "First operand"),
                ParamSpec::optional("note", ParamType::String, "Optional note"),
            ],
        );

        let projected = schema.input_schema();
        assert_eq!(projected["type"], "object");
        assert_eq!(projected["properties"]["a"]["type"], "number");
        assert_eq!(projected["required"], json!(["a"]));
    }

    #[test]
    fn validate_rejects_non_object_arguments() {
        let schema = ToolSchema::new("demo", "Demo", vec![]);
        let err = schema.validate(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, CoreError::InvalidArguments { .. }));
    }
}
