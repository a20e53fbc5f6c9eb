//! Core of the MCP tool-calling client
//!
//! Holds the capability model shared by providers and consumers, the LLM
//! provider abstraction, and the conversation loop that coordinates a
//! model's function-calling decisions with an [`InvocationBroker`].

pub mod agent;
pub mod broker;
pub mod capability;
pub mod invocation;
pub mod providers;
pub mod session;
pub mod tools;
pub mod transcript;

pub use agent::{Answer, ConversationLoop, LoopConfig, LoopError};
pub use broker::{InvocationBroker, LocalBroker};
pub use capability::{Capability, CapabilityRegistry};
pub use invocation::{InvocationErrorKind, InvocationOutcome, InvocationRequest, InvocationResult};
pub use providers::{ChatRequest, ChatResponse, LlmError, LlmProvider};
pub use session::{Session, SessionConfig, SessionSummary};
pub use transcript::{ConversationTurn, Role, ToolCall, Transcript};
