//! Provider-agnostic types for LLM calls

use async_trait::async_trait;

use super::error::LlmError;
use crate::capability::Capability;
use crate::transcript::{ConversationTurn, ToolCall};

/// One completion request: the transcript plus the capabilities on offer
#[derive(Debug, Clone, Default)]
pub struct ChatRequest<'a> {
    pub messages: &'a [ConversationTurn],
    /// Offered as functions with `tool_choice: "auto"`; empty means no tools
    pub tools: &'a [Capability],
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stop: Vec<String>,
}

impl<'a> ChatRequest<'a> {
    pub fn new(messages: &'a [ConversationTurn], tools: &'a [Capability]) -> Self {
        Self {
            messages,
            tools,
            ..Default::default()
        }
    }
}

/// Provider-agnostic response from an LLM
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: StopReason,
    pub usage: ChatUsage,
    pub model: String,
}

impl ChatResponse {
    /// Plain text answer with no tool calls
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            stop_reason: StopReason::EndTurn,
            ..Default::default()
        }
    }

    /// Response requesting the given tool calls
    pub fn tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            stop_reason: StopReason::ToolUse,
            ..Default::default()
        }
    }

    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    pub fn content_text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    #[default]
    Unknown,
}

impl StopReason {
    /// Map an OpenAI-style `finish_reason`
    pub fn from_finish_reason(reason: Option<&str>) -> Self {
        match reason {
            Some("stop") => Self::EndTurn,
            Some("tool_calls") | Some("function_call") => Self::ToolUse,
            Some("length") => Self::MaxTokens,
            _ => Self::Unknown,
        }
    }

    /// Whether the model wants to call tools
    pub fn is_tool_use(&self) -> bool {
        matches!(self, Self::ToolUse)
    }

    /// Whether the model finished its turn
    pub fn is_end_turn(&self) -> bool {
        matches!(self, Self::EndTurn)
    }
}

/// Token usage from a single API call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChatUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Trait that all LLM providers implement
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g. "deepseek")
    fn provider_name(&self) -> &str;

    /// Model identifier (e.g. "deepseek-chat")
    fn model(&self) -> &str;

    /// Send a chat request with optional tools
    async fn chat(&self, request: &ChatRequest<'_>) -> Result<ChatResponse, LlmError>;
}
