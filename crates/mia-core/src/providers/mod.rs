//! LLM provider abstraction layer
//!
//! Providers implement the [`LlmProvider`] trait. The workspace ships one
//! implementation, [`OpenAiCompatProvider`], which talks to any endpoint
//! following the OpenAI chat-completions format (DeepSeek by default).

pub mod error;
pub mod openai_compat;
pub mod types;

pub use error::LlmError;
pub use openai_compat::{OpenAiCompatConfig, OpenAiCompatProvider};
pub use types::{ChatRequest, ChatResponse, ChatUsage, LlmProvider, StopReason};
