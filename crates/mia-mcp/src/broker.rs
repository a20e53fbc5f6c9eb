//! Invocation broker and capability loading for a remote MCP server

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use mia_core::{
    Capability, CapabilityRegistry, InvocationBroker, InvocationErrorKind, InvocationRequest,
    InvocationResult,
};

use crate::client::McpClient;
use crate::error::McpError;
use crate::protocol::{INVALID_PARAMS, McpTool};

impl From<McpTool> for Capability {
    fn from(tool: McpTool) -> Self {
        Capability::new(tool.name, tool.description, tool.input_schema)
    }
}

/// Fetch the server's tools once and freeze them into a registry
pub async fn load_capabilities(client: &McpClient) -> Result<CapabilityRegistry, McpError> {
    let tools = client.list_tools().await?;
    let registry = CapabilityRegistry::new(tools.into_iter().map(Capability::from).collect());
    info!(
        "Loaded {} capabilities from {}: {}",
        registry.len(),
        client.name(),
        registry.names().join(", ")
    );
    Ok(registry)
}

/// Forwards invocations to a remote MCP server, one at a time
pub struct McpBroker {
    client: Arc<McpClient>,
    registry: CapabilityRegistry,
}

impl McpBroker {
    pub fn new(client: Arc<McpClient>, registry: CapabilityRegistry) -> Self {
        Self { client, registry }
    }

    /// Load the capability list and build a broker over it
    pub async fn connect(client: Arc<McpClient>) -> Result<Self, McpError> {
        let registry = load_capabilities(&client).await?;
        Ok(Self::new(client, registry))
    }

    pub fn client(&self) -> &Arc<McpClient> {
        &self.client
    }
}

#[async_trait]
impl InvocationBroker for McpBroker {
    fn capabilities(&self) -> &CapabilityRegistry {
        &self.registry
    }

    async fn invoke(&self, request: InvocationRequest) -> InvocationResult {
        if !self.registry.contains(&request.capability_name) {
            warn!("Invocation of unknown tool: {}", request.capability_name);
            return InvocationResult::unknown_capability(request.call_id, &request.capability_name);
        }

        debug!("Calling remote tool {} ({})", request.capability_name, request.call_id);
        let arguments = request.arguments_value();
        match self.client.call_tool(&request.capability_name, arguments).await {
            Ok(result) if result.is_error() => {
                InvocationResult::error(request.call_id, InvocationErrorKind::ToolFailed, result.text_content())
            }
            Ok(result) => {
                let text = result.text_content();
                match result.structured_content {
                    Some(structured) => InvocationResult::structured(request.call_id, text, structured),
                    None => InvocationResult::success(request.call_id, text),
                }
            }
            Err(e) => {
                warn!("Remote tool {} failed: {}", request.capability_name, e);
                let kind = match &e {
                    McpError::Timeout { .. } => InvocationErrorKind::Timeout,
                    McpError::Rpc { code, .. } if *code == INVALID_PARAMS => InvocationErrorKind::InvalidArguments,
                    McpError::Rpc { .. } => InvocationErrorKind::ToolFailed,
                    McpError::Closed | McpError::Io(_) | McpError::Protocol(_) => InvocationErrorKind::Transport,
                };
                InvocationResult::error(request.call_id, kind, e.to_string())
            }
        }
    }
}
