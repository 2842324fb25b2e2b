//! HTTP completion client.
//!
//! Speaks the **OpenAI Chat Completions API** (including OpenAI-compatible
//! endpoints such as Ollama, Together, and vLLM) and the **Anthropic
//! Messages API**, non-streaming.  One blocking request per suspension
//! point is all the conversation runtime needs; request timeouts live here
//! and surface as fatal service errors.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};

use roundtable_core::{ToolCall, ToolSchema};

use crate::completion::types::{CompletionOutcome, PromptMessage, PromptRole};
use crate::completion::CompletionService;
use crate::error::{AgentError, Result};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default OpenAI API base URL.
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default Anthropic API base URL.
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

// ---------------------------------------------------------------------------
// Provider & configuration
// ---------------------------------------------------------------------------

/// Identifies which completion provider the client targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// OpenAI Chat Completions API (also covers compatible endpoints).
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
}

impl Provider {
    fn name(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }
}

/// Configuration for connecting to a single completion endpoint.
#[derive(Debug, Clone)]
pub struct HttpCompletionConfig {
    /// Which provider this configuration targets.
    pub provider: Provider,
    /// API key for authentication.
    pub api_key: String,
    /// Base URL for the API.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Maximum tokens per response.
    pub max_tokens: u32,
    /// Optional sampling temperature.
    pub temperature: Option<f32>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl HttpCompletionConfig {
    /// Configuration for the OpenAI API.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: Provider::OpenAi,
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_owned(),
            model: model.into(),
            max_tokens: 4096,
            temperature: None,
            timeout: Duration::from_secs(120),
        }
    }

    /// Configuration for any OpenAI-compatible endpoint (e.g. Ollama at
    /// `http://localhost:11434/v1`).
    pub fn openai_compatible(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::openai(api_key, model)
        }
    }

    /// Configuration for the Anthropic Claude API.
    pub fn anthropic(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: Provider::Anthropic,
            api_key: api_key.into(),
            base_url: ANTHROPIC_BASE_URL.to_owned(),
            model: model.into(),
            max_tokens: 4096,
            temperature: None,
            timeout: Duration::from_secs(120),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// A [`CompletionService`] backed by an HTTP completion provider.
#[derive(Debug, Clone)]
pub struct HttpCompletionClient {
    config: HttpCompletionConfig,
    http: reqwest::Client,
}

impl HttpCompletionClient {
    /// Create a new client with the given configuration.
    pub fn new(config: HttpCompletionConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(AgentError::MissingApiKey {
                provider: config.provider.name().into(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AgentError::ServiceUnreachable {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { config, http })
    }

    async fn complete_openai(
        &self,
        messages: &[PromptMessage],
        tools: &[ToolSchema],
    ) -> Result<CompletionOutcome> {
        let mut body = json!({
            "model": self.config.model,
            "messages": messages_to_openai(messages),
            "max_tokens": self.config.max_tokens,
        });
        if let Some(temp) = self.config.temperature {
            body["temperature"] = json!(temp);
        }
        if !tools.is_empty() {
            body["tools"] = tools_to_openai(tools);
        }

        let url = format!("{}/chat/completions", self.config.base_url);
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key)).map_err(
            |e| AgentError::ServiceUnreachable {
                reason: format!("invalid authorization header: {e}"),
            },
        )?;

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        tracing::debug!(url = %url, model = %self.config.model, provider = "openai", "sending completion request");

        let resp = self.http.post(&url).headers(headers).json(&body).send().await?;
        let v = read_json_body(resp).await?;
        parse_openai_response(&v)
    }

    async fn complete_anthropic(
        &self,
        messages: &[PromptMessage],
        tools: &[ToolSchema],
    ) -> Result<CompletionOutcome> {
        let (system_text, wire_messages) = messages_to_anthropic(messages);

        let mut body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": wire_messages,
        });
        if let Some(system) = system_text {
            body["system"] = json!(system);
        }
        if let Some(temp) = self.config.temperature {
            body["temperature"] = json!(temp);
        }
        if !tools.is_empty() {
            body["tools"] = tools_to_anthropic(tools);
        }

        let url = format!("{}/v1/messages", self.config.base_url);
        let key = HeaderValue::from_str(&self.config.api_key).map_err(|e| {
            AgentError::ServiceUnreachable {
                reason: format!("invalid API key header: {e}"),
            }
        })?;

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", key);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        tracing::debug!(url = %url, model = %self.config.model, provider = "anthropic", "sending completion request");

        let resp = self.http.post(&url).headers(headers).json(&body).send().await?;
        let v = read_json_body(resp).await?;
        parse_anthropic_response(&v)
    }
}

#[async_trait]
impl CompletionService for HttpCompletionClient {
    async fn complete(
        &self,
        messages: &[PromptMessage],
        tools: &[ToolSchema],
    ) -> Result<CompletionOutcome> {
        match self.config.provider {
            Provider::OpenAi => self.complete_openai(messages, tools).await,
            Provider::Anthropic => self.complete_anthropic(messages, tools).await,
        }
    }
}

/// Read a response body, mapping non-success statuses and invalid JSON to
/// service errors.
async fn read_json_body(resp: reqwest::Response) -> Result<Value> {
    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| AgentError::ServiceUnreachable {
            reason: format!("failed to read response body: {e}"),
        })?;

    if !status.is_success() {
        return Err(AgentError::ServiceFailed {
            reason: format!("API returned {status}: {text}"),
        });
    }

    serde_json::from_str(&text).map_err(|e| AgentError::ResponseParse {
        reason: format!("invalid JSON response: {e}"),
    })
}

// ===========================================================================
// OpenAI format conversion (free functions)
// ===========================================================================

/// Convert prompt messages to the OpenAI Chat Completions wire format.
///
/// System messages are part of the `messages` array, tool calls live in
/// `assistant.tool_calls`, and tool results use `role: "tool"` with a
/// `tool_call_id`.
pub fn messages_to_openai(messages: &[PromptMessage]) -> Vec<Value> {
    let mut wire: Vec<Value> = Vec::with_capacity(messages.len());

    for msg in messages {
        match msg.role {
            PromptRole::System => wire.push(json!({
                "role": "system",
                "content": msg.content,
            })),
            PromptRole::User => wire.push(json!({
                "role": "user",
                "content": msg.content,
            })),
            PromptRole::Assistant => {
                if msg.tool_calls.is_empty() {
                    wire.push(json!({
                        "role": "assistant",
                        "content": msg.content,
                    }));
                } else {
                    let tool_calls: Vec<Value> = msg
                        .tool_calls
                        .iter()
                        .map(|tc| {
                            json!({
                                "id": tc.id,
                                "type": "function",
                                "function": {
                                    "name": tc.name,
                                    "arguments": tc.arguments.to_string(),
                                }
                            })
                        })
                        .collect();

                    let mut m = json!({
                        "role": "assistant",
                        "tool_calls": tool_calls,
                    });
                    if !msg.content.is_empty() {
                        m["content"] = json!(msg.content);
                    }
                    wire.push(m);
                }
            }
            PromptRole::Tool => wire.push(json!({
                "role": "tool",
                "tool_call_id": msg.tool_call_id,
                "content": msg.content,
            })),
        }
    }

    wire
}

/// Convert tool schemas into the OpenAI tool-definition format.
///
/// OpenAI wraps each tool in `{"type": "function", "function": {...}}`.
pub fn tools_to_openai(tools: &[ToolSchema]) -> Value {
    let values: Vec<Value> = tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.input_schema(),
                }
            })
        })
        .collect();
    json!(values)
}

/// Parse a non-streaming OpenAI Chat Completions response.
pub fn parse_openai_response(v: &Value) -> Result<CompletionOutcome> {
    let message = &v["choices"][0]["message"];

    if message.is_null() {
        return Err(AgentError::ResponseParse {
            reason: "missing `choices[0].message` in response".into(),
        });
    }

    if let Some(tool_calls) = message["tool_calls"].as_array()
        && !tool_calls.is_empty()
    {
        let calls: Result<Vec<ToolCall>> = tool_calls
            .iter()
            .map(|tc| {
                let func = &tc["function"];
                let name = func["name"].as_str().unwrap_or_default().to_owned();
                let args_str = func["arguments"].as_str().unwrap_or("{}");
                let arguments: Value =
                    serde_json::from_str(args_str).map_err(|e| AgentError::ResponseParse {
                        reason: format!("invalid JSON in tool call `{name}` arguments: {e}"),
                    })?;

                Ok(ToolCall {
                    id: tc["id"].as_str().unwrap_or_default().to_owned(),
                    name,
                    arguments,
                })
            })
            .collect();

        return Ok(CompletionOutcome::ToolCalls(calls?));
    }

    let content = message["content"].as_str().unwrap_or_default();
    Ok(CompletionOutcome::Text(content.to_owned()))
}

// ===========================================================================
// Anthropic format conversion (free functions)
// ===========================================================================

/// Split the system message out (Anthropic expects it as a top-level field)
/// and convert the remaining messages to the Anthropic wire format.
pub fn messages_to_anthropic(messages: &[PromptMessage]) -> (Option<String>, Vec<Value>) {
    let mut system: Option<String> = None;
    let mut wire: Vec<Value> = Vec::with_capacity(messages.len());

    for msg in messages {
        match msg.role {
            PromptRole::System => match &mut system {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(&msg.content);
                }
                None => system = Some(msg.content.clone()),
            },
            PromptRole::User => wire.push(json!({
                "role": "user",
                "content": msg.content,
            })),
            PromptRole::Assistant => {
                if msg.tool_calls.is_empty() {
                    wire.push(json!({
                        "role": "assistant",
                        "content": msg.content,
                    }));
                } else {
                    let mut content: Vec<Value> = Vec::new();
                    if !msg.content.is_empty() {
                        content.push(json!({
                            "type": "text",
                            "text": msg.content,
                        }));
                    }
                    for tc in &msg.tool_calls {
                        content.push(json!({
                            "type": "tool_use",
                            "id": tc.id,
                            "name": tc.name,
                            "input": tc.arguments,
                        }));
                    }
                    wire.push(json!({
                        "role": "assistant",
                        "content": content,
                    }));
                }
            }
            PromptRole::Tool => wire.push(json!({
                "role": "user",
                "content": [{
                    "type": "tool_result",
                    "tool_use_id": msg.tool_call_id,
                    "content": msg.content,
                }],
            })),
        }
    }

    (system, wire)
}

/// Convert tool schemas into the Anthropic tool-definition format.
pub fn tools_to_anthropic(tools: &[ToolSchema]) -> Value {
    let values: Vec<Value> = tools
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "description": t.description,
                "input_schema": t.input_schema(),
            })
        })
        .collect();
    json!(values)
}

/// Parse a non-streaming Anthropic Messages response.
pub fn parse_anthropic_response(v: &Value) -> Result<CompletionOutcome> {
    let content = v["content"].as_array().ok_or_else(|| AgentError::ResponseParse {
        reason: "missing `content` array in response".into(),
    })?;

    let mut text_parts: Vec<String> = Vec::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();

    for block in content {
        match block["type"].as_str() {
            Some("text") => {
                if let Some(t) = block["text"].as_str() {
                    text_parts.push(t.to_owned());
                }
            }
            Some("tool_use") => tool_calls.push(ToolCall {
                id: block["id"].as_str().unwrap_or_default().to_owned(),
                name: block["name"].as_str().unwrap_or_default().to_owned(),
                arguments: block["input"].clone(),
            }),
            _ => {}
        }
    }

    if tool_calls.is_empty() {
        Ok(CompletionOutcome::Text(text_parts.join("")))
    } else {
        Ok(CompletionOutcome::ToolCalls(tool_calls))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
