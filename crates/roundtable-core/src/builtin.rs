//! Built-in tools.
//!
//! A small set of tools registered by default in the CLI and exercised
//! heavily in tests: a four-function calculator and a canned web-search
//! stub.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{CoreError, Result};
use crate::tool::{ParamSpec, ParamType, Tool, ToolSchema};

// ---------------------------------------------------------------------------
// Calculator
// ---------------------------------------------------------------------------

/// Basic four-function calculator.
///
/// Division by zero and an unrecognized operator are reported as error
/// values, never as a fault that could abort a conversation.
pub struct Calculator {
    schema: ToolSchema,
}

impl Calculator {
    /// Create the calculator with its fixed schema.
    #[must_use]
    pub fn new() -> Self {
        Self {
            schema: ToolSchema::new(
                "calculator",
                "Basic calculator for the four arithmetic operations",
                vec![
                    ParamSpec::required("a", ParamType::Number, "Left operand"),
                    ParamSpec::required("b", ParamType::Number, "Right operand"),
                    ParamSpec::required("op", ParamType::String, "Operator: +, -, * or /"),
                ],
            ),
        }
    }
}

impl Default for Calculator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for Calculator {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn run(&self, args: Value) -> Result<String> {
        // Validation upstream guarantees both operands are numbers and the
        // operator is a string.
        let a = args["a"].as_f64().unwrap_or_default();
        let b = args["b"].as_f64().unwrap_or_default();
        let op = args["op"].as_str().unwrap_or_default();

        let value = match op {
            "+" => a + b,
            "-" => a - b,
            "*" => a * b,
            "/" => {
                if b == 0.0 {
                    return Err(CoreError::ToolFailed {
                        tool: self.schema.name.clone(),
                        reason: "division by zero".into(),
                    });
                }
                a / b
            }
            other => {
                return Err(CoreError::ToolFailed {
                    tool: self.schema.name.clone(),
                    reason: format!("invalid operator `{other}`, use +, -, * or /"),
                });
            }
        };

        // Render integral results without a trailing ".0" so "2+2" is "4".
        if value.fract() == 0.0 && value.abs() < 1e15 {
            Ok(format!("{}", value as i64))
        } else {
            Ok(value.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Web search stub
// ---------------------------------------------------------------------------

/// Canned web search returning a single fixed result.
///
/// Stands in for a real search backend in demos and tests.
pub struct WebSearch {
    schema: ToolSchema,
    canned: String,
}

impl WebSearch {
    /// Create the stub with the default canned result.
    #[must_use]
    pub fn new() -> Self {
        Self::with_result(
            "Roundtable is a runtime for building multi-agent conversations.",
        )
    }

    /// Create the stub with a specific canned result.
    pub fn with_result(result: impl Into<String>) -> Self {
        Self {
            schema: ToolSchema::new(
                "web_search",
                "Find information on the web",
                vec![ParamSpec::required(
                    "query",
                    ParamType::String,
                    "Search query",
                )],
            ),
            canned: result.into(),
        }
    }
}

impl Default for WebSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebSearch {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn run(&self, args: Value) -> Result<String> {
        let query = args["query"].as_str().unwrap_or_default();
        tracing::debug!(query = %query, "web search (stub)");
        Ok(self.canned.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ToolCall;
    use crate::tool::ToolRegistry;
    use serde_json::json;
    use std::sync::Arc;

    fn calc_call(a: f64, b: f64, op: &str) -> ToolCall {
        ToolCall {
            id: "c".into(),
            name: "calculator".into(),
            arguments: json!({"a": a, "b": b, "op": op}),
        }
    }

    #[tokio::test]
    async fn calculator_four_operations() {
        let calc = Calculator::new();
        assert_eq!(calc.run(json!({"a": 2, "b": 2, "op": "+"})).await.unwrap(), "4");
        assert_eq!(calc.run(json!({"a": 7, "b": 2, "op": "-"})).await.unwrap(), "5");
        assert_eq!(calc.run(json!({"a": 3, "b": 4, "op": "*"})).await.unwrap(), "12");
        assert_eq!(calc.run(json!({"a": 9, "b": 2, "op": "/"})).await.unwrap(), "4.5");
    }

    #[tokio::test]
    async fn division_by_zero_is_reported_error_value() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(Calculator::new())).unwrap();

        let outcome = registry.invoke(&calc_call(6.0, 0.0, "/")).await;
        assert!(outcome.is_error);
        assert!(
            outcome.content.contains("division by zero"),
            "outcome must mention division by zero: {}",
            outcome.content
        );
    }

    #[tokio::test]
    async fn invalid_operator_is_reported_error_value() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(Calculator::new())).unwrap();

        let outcome = registry.invoke(&calc_call(1.0, 2.0, "%")).await;
        assert!(outcome.is_error);
        assert!(outcome.content.contains("invalid operator"));
    }

    #[tokio::test]
    async fn web_search_returns_canned_result() {
        let search = WebSearch::with_result("canned answer");
        let out = search.run(json!({"query": "anything"})).await.unwrap();
        assert_eq!(out, "canned answer");
    }
}
