//! Typed `sampling/createMessage` structures
//!
//! A server can hand the client a sampling request (here, embedded as JSON
//! in a prompt message); the client runs it against its own LLM and
//! answers with a [`CreateMessageResult`].

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use mia_core::providers::{ChatResponse, StopReason};
use mia_core::ConversationTurn;

use crate::protocol::{Content, GetPromptResult, PromptRole};

pub const CREATE_MESSAGE_METHOD: &str = "sampling/createMessage";

/// A JSON-RPC style sampling request without an id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingRequest {
    pub method: String,
    pub params: CreateMessageParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageParams {
    pub messages: Vec<SamplingMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_preferences: Option<ModelPreferences>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingMessage {
    pub role: PromptRole,
    pub content: Content,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPreferences {
    #[serde(default)]
    pub hints: Vec<ModelHint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_priority: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_priority: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intelligence_priority: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelHint {
    pub name: String,
}

/// The client's answer to a sampling request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageResult {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    pub role: PromptRole,
    pub content: Content,
}

impl SamplingRequest {
    /// Extract the sampling request embedded in a prompt's first text message
    pub fn from_prompt(prompt: &GetPromptResult) -> Result<Self> {
        let text = prompt
            .messages
            .iter()
            .find_map(|m| m.content.as_text())
            .ok_or_else(|| anyhow!("prompt carries no text message"))?;

        let request: SamplingRequest =
            serde_json::from_str(text).context("prompt text is not a sampling request")?;
        if request.method != CREATE_MESSAGE_METHOD {
            return Err(anyhow!(
                "unexpected sampling method '{}', expected {}",
                request.method,
                CREATE_MESSAGE_METHOD
            ));
        }
        Ok(request)
    }
}

impl CreateMessageParams {
    /// Replace temperature and token limit where an override is given
    pub fn apply_overrides(&mut self, temperature: Option<f32>, max_tokens: Option<u32>) {
        if let Some(t) = temperature {
            self.temperature = Some(t);
        }
        if let Some(n) = max_tokens {
            self.max_tokens = n;
        }
    }

    /// Conversation turns for the LLM: system prompt first, then the
    /// text messages in order
    pub fn to_turns(&self) -> Vec<ConversationTurn> {
        let mut turns = Vec::with_capacity(self.messages.len() + 1);
        if let Some(system) = self.system_prompt.as_deref().filter(|s| !s.trim().is_empty()) {
            turns.push(ConversationTurn::system(system));
        }
        for message in &self.messages {
            let Some(text) = message.content.as_text() else {
                continue;
            };
            turns.push(match message.role {
                PromptRole::User => ConversationTurn::user(text),
                PromptRole::Assistant => ConversationTurn::assistant(text),
            });
        }
        turns
    }
}

impl CreateMessageResult {
    pub fn from_response(response: &ChatResponse, fallback_model: &str) -> Self {
        let model = if response.model.is_empty() {
            fallback_model.to_string()
        } else {
            response.model.clone()
        };
        let stop_reason = match response.stop_reason {
            StopReason::EndTurn => Some("endTurn"),
            StopReason::MaxTokens => Some("maxTokens"),
            StopReason::ToolUse => Some("toolUse"),
            StopReason::Unknown => None,
        };
        Self {
            model,
            stop_reason: stop_reason.map(str::to_string),
            role: PromptRole::Assistant,
            content: Content::text(response.content_text()),
        }
    }
}
