//! Demo tools: a four-function calculator and a text analyzer

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use mia_core::tools::{ToolHandler, ToolOutput, ToolRegistry, json_schema};
use std::sync::Arc;

fn number_param(input: &Value, key: &str) -> Result<f64> {
    input
        .get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| anyhow!("Missing or non-numeric '{}' parameter", key))
}

/// Basic arithmetic on two numbers
pub struct CalculatorTool;

#[async_trait]
impl ToolHandler for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Perform basic arithmetic (add, subtract, multiply, divide) on two numbers."
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "operation": {
                    "type": "string",
                    "enum": ["add", "subtract", "multiply", "divide"],
                    "description": "Operation to perform"
                },
                "a": {"type": "number", "description": "First operand"},
                "b": {"type": "number", "description": "Second operand"}
            }),
            vec!["operation", "a", "b"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        self.execute_structured(input).await.map(|output| output.text)
    }

    async fn execute_structured(&self, input: Value) -> Result<ToolOutput> {
        let operation = input
            .get("operation")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("Missing 'operation' parameter"))?;
        let a = number_param(&input, "a")?;
        let b = number_param(&input, "b")?;

        let value = match operation {
            "add" => a + b,
            "subtract" => a - b,
            "multiply" => a * b,
            "divide" => {
                if b == 0.0 {
                    return Err(anyhow!("division by zero"));
                }
                a / b
            }
            other => return Err(anyhow!("Unknown operation '{}'", other)),
        };
        if !value.is_finite() {
            return Err(anyhow!("{} of {} and {} is out of range", operation, a, b));
        }
        debug!("calculator: {} {} {} = {}", a, operation, b, value);

        Ok(ToolOutput::text(value.to_string())
            .with_structured(serde_json::json!({ "operation": operation, "value": value })))
    }
}

/// Counts characters and whitespace-separated words
pub struct TextAnalyzerTool;

#[async_trait]
impl ToolHandler for TextAnalyzerTool {
    fn name(&self) -> &str {
        "text_analyzer"
    }

    fn description(&self) -> &str {
        "Analyze a text: count its characters and words."
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "text": {"type": "string", "description": "Text to analyze"}
            }),
            vec!["text"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        self.execute_structured(input).await.map(|output| output.text)
    }

    async fn execute_structured(&self, input: Value) -> Result<ToolOutput> {
        let text = input
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("Missing 'text' parameter"))?;

        let characters = text.chars().count();
        let words = text.split_whitespace().count();

        Ok(
            ToolOutput::text(format!("characters: {}\nwords: {}", characters, words))
                .with_structured(serde_json::json!({ "characters": characters, "words": words })),
        )
    }
}

/// Registry with every demo tool
pub fn demo_tools() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(CalculatorTool));
    registry.register(Arc::new(TextAnalyzerTool));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use mia_core::tools::ToolExecutor;

    async fn calc(operation: &str, a: f64, b: f64) -> Result<ToolOutput> {
        CalculatorTool
            .execute_structured(serde_json::json!({"operation": operation, "a": a, "b": b}))
            .await
    }

    #[tokio::test]
    async fn test_calculator_operations() {
        assert_eq!(calc("add", 5.0, 7.0).await.unwrap().text, "12");
        assert_eq!(calc("subtract", 5.0, 7.0).await.unwrap().text, "-2");
        assert_eq!(calc("multiply", 2.5, 4.0).await.unwrap().text, "10");
        assert_eq!(calc("divide", 7.0, 2.0).await.unwrap().text, "3.5");
    }

    #[tokio::test]
    async fn test_calculator_structured_content() {
        let output = calc("add", 5.0, 7.0).await.unwrap();
        let structured = output.structured.unwrap();
        assert_eq!(structured["operation"], "add");
        assert_eq!(structured["value"], 12.0);
    }

    #[tokio::test]
    async fn test_divide_by_zero() {
        let err = calc("divide", 1.0, 0.0).await.unwrap_err();
        assert_eq!(err.to_string(), "division by zero");
    }

    #[tokio::test]
    async fn test_overflow_is_tool_error() {
        let err = calc("multiply", 1e308, 10.0).await.unwrap_err();
        assert!(err.to_string().contains("out of range"));
        assert!(calc("add", f64::MAX, f64::MAX).await.is_err());
        assert!(calc("multiply", 1e154, 1e154).await.is_ok());
    }

    #[tokio::test]
    async fn test_calculator_bad_input() {
        assert!(calc("modulo", 1.0, 2.0).await.is_err());
        let err = CalculatorTool
            .execute(serde_json::json!({"operation": "add", "a": 1}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("'b'"));
    }

    #[tokio::test]
    async fn test_text_analyzer_counts() {
        let output = TextAnalyzerTool
            .execute_structured(serde_json::json!({"text": "héllo  wörld\nagain"}))
            .await
            .unwrap();
        assert_eq!(output.text, "characters: 18\nwords: 3");
        assert_eq!(output.structured.unwrap()["words"], 3);
    }

    #[test]
    fn test_demo_tools_listed_in_order() {
        let names: Vec<String> = demo_tools().list_tools().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["calculator", "text_analyzer"]);
    }
}
