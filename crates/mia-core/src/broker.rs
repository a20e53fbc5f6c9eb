//! Invocation brokers: dispatch a capability call to whoever owns it

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::capability::{Capability, CapabilityRegistry};
use crate::invocation::{InvocationErrorKind, InvocationRequest, InvocationResult};
use crate::tools::{ToolExecutor, ToolRegistry};

/// Dispatches invocations and always returns a result.
///
/// Implementations never surface failures as errors: unknown names,
/// callee failures, transport problems and timeouts all become error
/// results so the conversation loop can report them to the model.
#[async_trait]
pub trait InvocationBroker: Send + Sync {
    /// Capabilities this broker can dispatch to
    fn capabilities(&self) -> &CapabilityRegistry;

    async fn invoke(&self, request: InvocationRequest) -> InvocationResult;
}

/// Broker over an in-process [`ToolRegistry`]
pub struct LocalBroker {
    tools: Arc<ToolRegistry>,
    registry: CapabilityRegistry,
    timeout: Duration,
}

impl LocalBroker {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        let registry = CapabilityRegistry::new(tools.list_tools());
        Self {
            tools,
            registry,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn list(&self) -> &[Capability] {
        self.registry.list()
    }
}

#[async_trait]
impl InvocationBroker for LocalBroker {
    fn capabilities(&self) -> &CapabilityRegistry {
        &self.registry
    }

    async fn invoke(&self, request: InvocationRequest) -> InvocationResult {
        let InvocationRequest {
            call_id,
            capability_name,
            arguments,
        } = request;

        if !self.registry.contains(&capability_name) {
            warn!("Invocation of unknown tool: {}", capability_name);
            return InvocationResult::unknown_capability(call_id, &capability_name);
        }

        debug!("Invoking local tool {}", capability_name);
        let call = self
            .tools
            .execute(&capability_name, serde_json::Value::Object(arguments));

        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(output)) => match output.structured {
                Some(structured) => InvocationResult::structured(call_id, output.text, structured),
                None => InvocationResult::success(call_id, output.text),
            },
            Ok(Err(e)) => InvocationResult::error(call_id, InvocationErrorKind::ToolFailed, e.to_string()),
            Err(_) => InvocationResult::error(
                call_id,
                InvocationErrorKind::Timeout,
                format!("tool '{}' timed out after {:?}", capability_name, self.timeout),
            ),
        }
    }
}
