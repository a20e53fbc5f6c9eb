//! Invocation requests and results
//!
//! A request is parsed from a model's tool call and moved into the broker,
//! which always hands back a result. Failures are data, not errors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::transcript::{ConversationTurn, ToolCall};

/// A single request to execute a capability with concrete arguments
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRequest {
    pub call_id: String,
    pub capability_name: String,
    pub arguments: Map<String, Value>,
}

impl InvocationRequest {
    pub fn new(
        call_id: impl Into<String>,
        capability_name: impl Into<String>,
        arguments: Map<String, Value>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            capability_name: capability_name.into(),
            arguments,
        }
    }

    /// Parse a model tool call; the arguments string must encode a JSON object.
    ///
    /// An empty argument string is treated as `{}`. On failure the error
    /// result to feed back to the model is returned instead.
    pub fn from_tool_call(call: &ToolCall) -> Result<Self, InvocationResult> {
        let raw = call.arguments.trim();
        if raw.is_empty() {
            return Ok(Self::new(&call.id, &call.name, Map::new()));
        }

        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(arguments)) => Ok(Self::new(&call.id, &call.name, arguments)),
            Ok(other) => Err(InvocationResult::error(
                &call.id,
                InvocationErrorKind::InvalidArguments,
                format!(
                    "arguments for '{}' must be a JSON object, got {}",
                    call.name,
                    json_type_name(&other)
                ),
            )),
            Err(e) => Err(InvocationResult::error(
                &call.id,
                InvocationErrorKind::InvalidArguments,
                format!("malformed arguments for '{}': {}", call.name, e),
            )),
        }
    }

    /// Arguments as a JSON value, for forwarding over the wire
    pub fn arguments_value(&self) -> Value {
        Value::Object(self.arguments.clone())
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Why an invocation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationErrorKind {
    /// Name not present in the capability registry
    UnknownCapability,
    /// Arguments missing, malformed, or rejected by the callee's schema
    InvalidArguments,
    /// The capability ran and reported a failure (e.g. division by zero)
    ToolFailed,
    /// The provider channel failed
    Transport,
    /// The provider did not answer in time
    Timeout,
}

impl InvocationErrorKind {
    /// Whether repeating the same invocation could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport | Self::Timeout)
    }
}

impl std::fmt::Display for InvocationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownCapability => write!(f, "unknown capability"),
            Self::InvalidArguments => write!(f, "invalid arguments"),
            Self::ToolFailed => write!(f, "tool failed"),
            Self::Transport => write!(f, "transport error"),
            Self::Timeout => write!(f, "timed out"),
        }
    }
}

/// Outcome of an invocation
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationOutcome {
    Success {
        text: String,
        structured: Option<Value>,
    },
    Error {
        kind: InvocationErrorKind,
        message: String,
    },
}

/// Result of one invocation, keyed by the tool call it answers
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationResult {
    pub tool_call_id: String,
    pub outcome: InvocationOutcome,
}

impl InvocationResult {
    pub fn success(tool_call_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            outcome: InvocationOutcome::Success {
                text: text.into(),
                structured: None,
            },
        }
    }

    pub fn structured(tool_call_id: impl Into<String>, text: impl Into<String>, structured: Value) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            outcome: InvocationOutcome::Success {
                text: text.into(),
                structured: Some(structured),
            },
        }
    }

    pub fn error(
        tool_call_id: impl Into<String>,
        kind: InvocationErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            outcome: InvocationOutcome::Error {
                kind,
                message: message.into(),
            },
        }
    }

    pub fn unknown_capability(tool_call_id: impl Into<String>, name: &str) -> Self {
        Self::error(
            tool_call_id,
            InvocationErrorKind::UnknownCapability,
            format!("unknown tool: {}", name),
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, InvocationOutcome::Error { .. })
    }

    /// Text placed in the transcript's tool turn
    pub fn content_text(&self) -> String {
        match &self.outcome {
            InvocationOutcome::Success { text, structured } => {
                if text.is_empty() {
                    structured
                        .as_ref()
                        .map(|s| s.to_string())
                        .unwrap_or_default()
                } else {
                    text.clone()
                }
            }
            InvocationOutcome::Error { kind, message } if kind.is_retryable() => {
                format!("Error ({}, retryable): {}", kind, message)
            }
            InvocationOutcome::Error { message, .. } => format!("Error: {}", message),
        }
    }

    /// Consume into the `tool` turn appended to the transcript
    pub fn into_turn(self) -> ConversationTurn {
        let content = self.content_text();
        ConversationTurn::tool(self.tool_call_id, content)
    }
}
