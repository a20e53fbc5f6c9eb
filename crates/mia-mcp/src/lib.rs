//! MCP (Model Context Protocol) support
//!
//! Provides both the server side (serve tools, resources and prompts over
//! STDIO) and the client side (spawn a server, discover its capabilities
//! and broker invocations to it).

pub mod adapter;
pub mod broker;
pub mod client;
pub mod error;
pub mod protocol;
pub mod provider;
pub mod sampling;
pub mod server;

pub use adapter::McpToolAdapter;
pub use broker::{McpBroker, load_capabilities};
pub use client::{McpClient, McpClientConfig, McpTimeouts};
pub use error::{McpError, ProviderError};
pub use provider::{PromptProvider, ResourceProvider};
pub use sampling::{CreateMessageParams, CreateMessageResult, SamplingRequest};
pub use server::McpServer;
