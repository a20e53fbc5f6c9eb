//! Conversation loop
//!
//! Drives one user query to an answer: the transcript and capability list
//! go to the LLM, requested tool calls are resolved through the broker in
//! the order the model listed them, and the LLM is re-queried until it
//! answers without tools or the iteration budget runs out.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::broker::InvocationBroker;
use crate::invocation::{InvocationRequest, InvocationResult};
use crate::providers::{ChatRequest, LlmError, LlmProvider};
use crate::transcript::{ConversationTurn, ToolCall, Transcript};

/// Errors that abandon the current query
#[derive(Debug, Error)]
pub enum LoopError {
    #[error("LLM request failed: {0}")]
    Llm(#[from] LlmError),

    /// The model kept requesting tools past the per-query LLM call budget
    #[error("tool budget exceeded: no final answer after {limit} LLM calls")]
    ToolBudgetExceeded { limit: usize },
}

impl LoopError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Llm(e) => e.is_retryable(),
            Self::ToolBudgetExceeded { .. } => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Maximum LLM calls per query
    pub max_iterations: usize,
    /// Deadline for a single LLM completion
    pub llm_timeout: Duration,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            llm_timeout: Duration::from_secs(60),
            system_prompt: None,
            temperature: None,
            max_tokens: None,
        }
    }
}

/// Final answer to one query
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub transcript: Transcript,
    /// Every invocation result, in the order it was appended
    pub invocations: Vec<InvocationResult>,
    pub llm_calls: usize,
}

enum TurnState {
    LlmPending,
    ToolPending(Vec<ToolCall>),
    Done(String),
}

/// Coordinates the LLM's function-calling decisions with a broker
pub struct ConversationLoop {
    provider: Arc<dyn LlmProvider>,
    broker: Arc<dyn InvocationBroker>,
    config: LoopConfig,
}

impl ConversationLoop {
    pub fn new(provider: Arc<dyn LlmProvider>, broker: Arc<dyn InvocationBroker>, config: LoopConfig) -> Self {
        Self {
            provider,
            broker,
            config,
        }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn broker(&self) -> &Arc<dyn InvocationBroker> {
        &self.broker
    }

    /// Run one user query through to a final answer.
    ///
    /// The transcript is created here and returned with the answer; nothing
    /// carries over between queries.
    pub async fn run_query(&self, input: &str) -> Result<Answer, LoopError> {
        let mut transcript = Transcript::with_system(self.config.system_prompt.as_deref());
        transcript.push(ConversationTurn::user(input));

        let capabilities = self.broker.capabilities().list();
        let mut invocations = Vec::new();
        let mut llm_calls = 0usize;
        let mut state = TurnState::LlmPending;

        loop {
            state = match state {
                TurnState::LlmPending => {
                    if llm_calls >= self.config.max_iterations {
                        warn!(
                            "Query abandoned after {} LLM calls without a final answer",
                            llm_calls
                        );
                        return Err(LoopError::ToolBudgetExceeded {
                            limit: self.config.max_iterations,
                        });
                    }
                    llm_calls += 1;
                    debug!(
                        "LLM call {}/{} ({} turns, {} tools)",
                        llm_calls,
                        self.config.max_iterations,
                        transcript.len(),
                        capabilities.len()
                    );

                    let response = {
                        let mut request = ChatRequest::new(transcript.turns(), capabilities);
                        request.temperature = self.config.temperature;
                        request.max_tokens = self.config.max_tokens;
                        match tokio::time::timeout(self.config.llm_timeout, self.provider.chat(&request)).await {
                            Ok(result) => result?,
                            Err(_) => return Err(LlmError::Timeout(self.config.llm_timeout).into()),
                        }
                    };

                    if response.wants_tools() {
                        let content = response.content_text().to_string();
                        let calls = response.tool_calls;
                        transcript.push(ConversationTurn::assistant_with_calls(content, calls.clone()));
                        TurnState::ToolPending(calls)
                    } else {
                        let text = response.content.unwrap_or_default();
                        transcript.push(ConversationTurn::assistant(text.clone()));
                        TurnState::Done(text)
                    }
                }
                TurnState::ToolPending(calls) => {
                    for call in calls {
                        let result = self.resolve(&call).await;
                        transcript.push(result.clone().into_turn());
                        invocations.push(result);
                    }
                    TurnState::LlmPending
                }
                TurnState::Done(text) => {
                    info!(
                        "Query answered after {} LLM calls and {} invocations",
                        llm_calls,
                        invocations.len()
                    );
                    return Ok(Answer {
                        text,
                        transcript,
                        invocations,
                        llm_calls,
                    });
                }
            };
        }
    }

    async fn resolve(&self, call: &ToolCall) -> InvocationResult {
        match InvocationRequest::from_tool_call(call) {
            Ok(request) => {
                debug!("Invoking {} ({})", request.capability_name, request.call_id);
                let result = self.broker.invoke(request).await;
                if result.is_error() {
                    debug!("Invocation {} failed: {}", call.id, result.content_text());
                }
                result
            }
            Err(result) => {
                warn!("Rejected tool call {} ({}): malformed arguments", call.id, call.name);
                result
            }
        }
    }
}
