//! Adapter between the in-process ToolRegistry and the MCP tool format

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use mia_core::tools::{ToolExecutor, ToolRegistry};

use crate::protocol::{McpTool, ToolCallResult};

/// Serves a [`ToolRegistry`] as MCP tools
pub struct McpToolAdapter {
    registry: Arc<ToolRegistry>,
}

impl McpToolAdapter {
    /// Create a new adapter wrapping a ToolRegistry
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// List all tools as MCP tool definitions
    pub fn list_tools(&self) -> Vec<McpTool> {
        self.registry
            .list_tools()
            .into_iter()
            .map(|t| McpTool {
                name: t.name,
                description: t.description,
                input_schema: t.parameter_schema,
            })
            .collect()
    }

    /// Execute a tool and return an MCP-formatted result.
    ///
    /// Failures, including unknown tools, are `isError` results.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> ToolCallResult {
        debug!("MCP calling tool: {}", name);
        match self.registry.execute(name, arguments).await {
            Ok(output) => {
                let result = ToolCallResult::text(output.text);
                match output.structured {
                    Some(structured) => result.with_structured(structured),
                    None => result,
                }
            }
            Err(e) => ToolCallResult::error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use mia_core::tools::{ToolHandler, ToolOutput, json_schema};

    struct HalveTool;

    #[async_trait]
    impl ToolHandler for HalveTool {
        fn name(&self) -> &str {
            "halve"
        }
        fn description(&self) -> &str {
            "Divide a number by two"
        }
        fn input_schema(&self) -> Value {
            json_schema(serde_json::json!({"n": {"type": "number"}}), vec!["n"])
        }
        async fn execute(&self, input: Value) -> Result<String> {
            self.execute_structured(input).await.map(|o| o.text)
        }
        async fn execute_structured(&self, input: Value) -> Result<ToolOutput> {
            let n = input["n"].as_f64().ok_or_else(|| anyhow!("'n' must be a number"))?;
            Ok(ToolOutput::text((n / 2.0).to_string()).with_structured(serde_json::json!({"value": n / 2.0})))
        }
    }

    fn adapter() -> McpToolAdapter {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(HalveTool));
        McpToolAdapter::new(Arc::new(registry))
    }

    #[test]
    fn test_adapter_lists_tools() {
        let tools = adapter().list_tools();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "halve");
        assert_eq!(tools[0].input_schema["required"][0], "n");
    }

    #[tokio::test]
    async fn test_call_returns_structured_content() {
        let result = adapter().call_tool("halve", serde_json::json!({"n": 9})).await;
        assert!(!result.is_error());
        assert_eq!(result.text_content(), "4.5");
        assert_eq!(result.structured_content.unwrap()["value"], 4.5);
    }

    #[tokio::test]
    async fn test_call_failure_is_error_result() {
        let result = adapter().call_tool("halve", serde_json::json!({"n": "x"})).await;
        assert!(result.is_error());
        assert!(result.text_content().contains("'n' must be a number"));
    }

    #[tokio::test]
    async fn test_call_unknown_tool() {
        let result = adapter().call_tool("nonexistent", serde_json::json!({})).await;
        assert!(result.is_error());
    }
}
