//! Generic OpenAI-compatible LLM provider
//!
//! Works with any API that follows the OpenAI chat completions format:
//! DeepSeek, OpenAI, OpenRouter, local servers. Only non-streaming
//! function calling is used.
//!
//! SECURITY: the API key is only sent to the configured endpoint.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::error::LlmError;
use super::types::{ChatRequest, ChatResponse, ChatUsage, LlmProvider, StopReason};
use crate::capability::Capability;
use crate::transcript::{ConversationTurn, Role, ToolCall};

pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// Configuration for an OpenAI-compatible provider
#[derive(Debug, Clone)]
pub struct OpenAiCompatConfig {
    /// Provider name used in logs (e.g. "deepseek")
    pub name: String,
    /// Base URL; `/chat/completions` is appended unless already present
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
}

impl Default for OpenAiCompatConfig {
    fn default() -> Self {
        Self {
            name: "deepseek".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            max_tokens: None,
            timeout: Duration::from_secs(60),
        }
    }
}

impl OpenAiCompatConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full chat-completions endpoint
    pub fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            format!("{}/chat/completions", base)
        }
    }
}

/// Provider for OpenAI-compatible chat completion endpoints
pub struct OpenAiCompatProvider {
    config: OpenAiCompatConfig,
    http: Client,
}

impl OpenAiCompatProvider {
    pub fn new(config: OpenAiCompatConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &OpenAiCompatConfig {
        &self.config
    }

    fn build_body(&self, request: &ChatRequest<'_>) -> CompletionRequest {
        let tools: Vec<WireTool> = request.tools.iter().map(WireTool::from).collect();
        let has_tools = !tools.is_empty();
        CompletionRequest {
            model: self.config.model.clone(),
            messages: request.messages.iter().map(WireMessage::from).collect(),
            tools: has_tools.then_some(tools),
            tool_choice: has_tools.then(|| "auto".to_string()),
            temperature: request.temperature.or(self.config.temperature),
            max_tokens: request.max_tokens.or(self.config.max_tokens),
            stop: (!request.stop.is_empty()).then(|| request.stop.clone()),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn provider_name(&self) -> &str {
        &self.config.name
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn chat(&self, request: &ChatRequest<'_>) -> Result<ChatResponse, LlmError> {
        let body = self.build_body(request);
        let url = self.config.endpoint();
        debug!(
            "POST {} ({} messages, {} tools)",
            url,
            body.messages.len(),
            request.tools.len()
        );

        let mut req = self.http.post(&url).json(&body);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.map_err(|e| self.map_transport_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status.as_u16(), &text));
        }

        let text = resp.text().await.map_err(|e| self.map_transport_error(e))?;
        parse_completion(&text)
    }
}

impl OpenAiCompatProvider {
    fn map_transport_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout(self.config.timeout)
        } else {
            LlmError::Network(e.to_string())
        }
    }
}

/// Parse a chat-completions response body
pub fn parse_completion(body: &str) -> Result<ChatResponse, LlmError> {
    let parsed: CompletionResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::InvalidResponse(format!("{} in body: {}", e, preview(body))))?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCall {
            id: tc.id,
            name: tc.function.name,
            arguments: tc.function.arguments,
        })
        .collect::<Vec<_>>();

    let mut stop_reason = StopReason::from_finish_reason(choice.finish_reason.as_deref());
    if !tool_calls.is_empty() {
        stop_reason = StopReason::ToolUse;
    }

    let usage = parsed
        .usage
        .map(|u| ChatUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    Ok(ChatResponse {
        content: choice.message.content,
        tool_calls,
        stop_reason,
        usage,
        model: parsed.model.unwrap_or_default(),
    })
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

// ── Wire format ─────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: Role,
    /// Null for assistant turns that only carry tool calls
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl From<&ConversationTurn> for WireMessage {
    fn from(turn: &ConversationTurn) -> Self {
        let tool_calls = (!turn.tool_calls.is_empty()).then(|| {
            turn.tool_calls
                .iter()
                .map(|tc| WireToolCall {
                    id: tc.id.clone(),
                    call_type: "function".to_string(),
                    function: WireFunctionCall {
                        name: tc.name.clone(),
                        arguments: tc.arguments.clone(),
                    },
                })
                .collect()
        });
        let content = if turn.content.is_empty() && tool_calls.is_some() {
            None
        } else {
            Some(turn.content.clone())
        };
        Self {
            role: turn.role,
            content,
            tool_calls,
            tool_call_id: turn.tool_call_id.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

impl From<&Capability> for WireTool {
    fn from(capability: &Capability) -> Self {
        Self {
            tool_type: "function",
            function: WireFunction {
                name: capability.name.clone(),
                description: capability.description.clone(),
                parameters: capability.parameter_schema.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: WireFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct CompletionUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAiCompatProvider {
        OpenAiCompatProvider::new(OpenAiCompatConfig::default()).unwrap()
    }

    fn add_capability() -> Capability {
        Capability::new(
            "add",
            "Add two numbers",
            serde_json::json!({
                "type": "object",
                "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
                "required": ["a", "b"]
            }),
        )
    }

    #[test]
    fn test_endpoint_construction() {
        assert_eq!(
            OpenAiCompatConfig::default().endpoint(),
            "https://api.deepseek.com/chat/completions"
        );
        assert_eq!(
            OpenAiCompatConfig::new("https://api.openai.com/v1/", "gpt-4o").endpoint(),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            OpenAiCompatConfig::new("http://localhost:8080/v1/chat/completions", "m").endpoint(),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn test_request_body_with_tools() {
        let turns = vec![
            ConversationTurn::system("You are a calculator"),
            ConversationTurn::user("what is 5 + 7?"),
        ];
        let tools = vec![add_capability()];
        let body = provider().build_body(&ChatRequest::new(&turns, &tools));
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["model"], "deepseek-chat");
        assert_eq!(json["tool_choice"], "auto");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "what is 5 + 7?");
        assert_eq!(json["tools"][0]["type"], "function");
        assert_eq!(json["tools"][0]["function"]["name"], "add");
        assert_eq!(json["tools"][0]["function"]["parameters"]["required"][0], "a");
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_request_body_without_tools_omits_tool_choice() {
        let turns = vec![ConversationTurn::user("hello")];
        let mut request = ChatRequest::new(&turns, &[]);
        request.temperature = Some(0.7);
        request.max_tokens = Some(1000);
        request.stop = vec!["\n\n".to_string()];
        let json = serde_json::to_value(provider().build_body(&request)).unwrap();

        assert!(json.get("tools").is_none());
        assert!(json.get("tool_choice").is_none());
        assert_eq!(json["max_tokens"], 1000);
        assert_eq!(json["stop"][0], "\n\n");
    }

    #[test]
    fn test_tool_turns_on_the_wire() {
        let turns = vec![
            ConversationTurn::assistant_with_calls(
                "",
                vec![ToolCall {
                    id: "call_1".into(),
                    name: "add".into(),
                    arguments: r#"{"a":5,"b":7}"#.into(),
                }],
            ),
            ConversationTurn::tool("call_1", "12"),
        ];
        let json = serde_json::to_value(provider().build_body(&ChatRequest::new(&turns, &[]))).unwrap();

        let assistant = &json["messages"][0];
        assert!(assistant["content"].is_null());
        assert_eq!(assistant["tool_calls"][0]["type"], "function");
        assert_eq!(assistant["tool_calls"][0]["function"]["arguments"], r#"{"a":5,"b":7}"#);

        let tool = &json["messages"][1];
        assert_eq!(tool["role"], "tool");
        assert_eq!(tool["tool_call_id"], "call_1");
        assert_eq!(tool["content"], "12");
    }

    #[test]
    fn test_parse_plain_completion() {
        let body = r#"{
            "model": "deepseek-chat",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hello!"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 9, "completion_tokens": 3, "total_tokens": 12}
        }"#;
        let response = parse_completion(body).unwrap();
        assert_eq!(response.content_text(), "Hello!");
        assert!(!response.wants_tools());
        assert_eq!(response.stop_reason, StopReason::EndTurn);
        assert_eq!(response.usage.input_tokens, 9);
        assert_eq!(response.model, "deepseek-chat");
    }

    #[test]
    fn test_parse_tool_call_completion() {
        let body = r#"{
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {"id": "call_1", "type": "function", "function": {"name": "add", "arguments": "{\"a\":5,\"b\":7}"}},
                        {"id": "call_2", "type": "function", "function": {"name": "divide", "arguments": "{\"a\":1,\"b\":0}"}}
                    ]
                },
                "finish_reason": "tool_calls"
            }]
        }"#;
        let response = parse_completion(body).unwrap();
        assert!(response.content.is_none());
        assert_eq!(response.tool_calls.len(), 2);
        assert_eq!(response.tool_calls[0].name, "add");
        assert_eq!(response.tool_calls[1].id, "call_2");
        assert!(response.stop_reason.is_tool_use());
    }

    #[test]
    fn test_parse_no_choices_is_invalid() {
        let err = parse_completion(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }

    #[test]
    fn test_parse_garbage_is_invalid() {
        let err = parse_completion("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_chat_connection_refused() {
        let config = OpenAiCompatConfig::new("http://127.0.0.1:1", "test-model")
            .with_timeout(Duration::from_secs(5));
        let provider = OpenAiCompatProvider::new(config).unwrap();
        let turns = vec![ConversationTurn::user("hello")];
        let err = provider.chat(&ChatRequest::new(&turns, &[])).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
