//! A2A (Agent-to-Agent) protocol support
//!
//! Provides both server (an echo agent served over HTTP with axum) and client
//! (fetch agent cards and send tasks to peers).

pub mod client;
pub mod protocol;
pub mod server;
pub mod task_manager;

pub use client::A2aClient;
pub use protocol::{AgentCard, Message, Part, Task, TaskSendParams, TaskState};
pub use server::{A2aServer, echo_agent_card};
pub use task_manager::{A2aError, EchoTaskManager, TaskManager};
