//! Demo prompt templates: code review, code explanation and a
//! file-system assistant that answers with a sampling request

use async_trait::async_trait;
use std::collections::HashMap;

use mia_mcp::protocol::{GetPromptResult, Prompt, PromptArgument, PromptMessage};
use mia_mcp::provider::check_required;
use mia_mcp::{ProviderError, PromptProvider};

pub const CODE_REVIEW: &str = "code-review";
pub const EXPLAIN_CODE: &str = "explain-code";
pub const FILE_SYSTEM_ASSISTANT: &str = "file-system-assistant";

fn argument(name: &str, description: &str, required: bool) -> PromptArgument {
    PromptArgument {
        name: name.to_string(),
        description: Some(description.to_string()),
        required,
    }
}

/// Which templates a catalog serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    /// code-review and explain-code
    CodeTemplates,
    /// file-system-assistant only
    Sampling,
    All,
}

pub struct PromptCatalog {
    prompts: Vec<Prompt>,
}

impl PromptCatalog {
    pub fn new(kind: CatalogKind) -> Self {
        let mut prompts = Vec::new();
        if kind != CatalogKind::Sampling {
            prompts.push(Prompt {
                name: CODE_REVIEW.to_string(),
                description: Some("Review code and suggest improvements".to_string()),
                arguments: vec![
                    argument("code", "Code to review", true),
                    argument("language", "Programming language", true),
                    argument(
                        "focus",
                        "Review focus (optional: performance, security, readability)",
                        false,
                    ),
                ],
            });
            prompts.push(Prompt {
                name: EXPLAIN_CODE.to_string(),
                description: Some("Explain how a piece of code works".to_string()),
                arguments: vec![
                    argument("code", "Code to explain", true),
                    argument("language", "Programming language", true),
                ],
            });
        }
        if kind != CatalogKind::CodeTemplates {
            prompts.push(Prompt {
                name: FILE_SYSTEM_ASSISTANT.to_string(),
                description: Some(
                    "File system assistant; answers with a sampling request for the client's LLM".to_string(),
                ),
                arguments: vec![argument("question", "The user's question", true)],
            });
        }
        Self { prompts }
    }
}

#[async_trait]
impl PromptProvider for PromptCatalog {
    fn list_prompts(&self) -> Vec<Prompt> {
        self.prompts.clone()
    }

    async fn get(
        &self,
        name: &str,
        arguments: &HashMap<String, String>,
    ) -> Result<GetPromptResult, ProviderError> {
        let prompt = self
            .prompts
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| ProviderError::InvalidParams(format!("Unknown prompt: {}", name)))?;
        check_required(prompt, arguments)?;

        let arg = |key: &str| arguments.get(key).map(String::as_str).unwrap_or_default();
        let messages = match name {
            CODE_REVIEW => {
                let focus = arguments
                    .get("focus")
                    .map(|f| f.trim())
                    .filter(|f| !f.is_empty())
                    .unwrap_or("general");
                vec![
                    PromptMessage::user(format!(
                        "You are a professional code reviewer focusing on the {} aspects of {} code.",
                        focus,
                        arg("language")
                    )),
                    PromptMessage::user(format!(
                        "Please review the following {} code and suggest improvements:\n\n{}",
                        arg("language"),
                        arg("code")
                    )),
                ]
            }
            EXPLAIN_CODE => vec![
                PromptMessage::user(format!(
                    "You are a programming mentor who explains {} code clearly.",
                    arg("language")
                )),
                PromptMessage::user(format!(
                    "Please explain how the following {} code works:\n\n{}",
                    arg("language"),
                    arg("code")
                )),
            ],
            _ => vec![PromptMessage::assistant(sampling_request(arg("question")).to_string())],
        };

        Ok(GetPromptResult {
            description: prompt.description.clone(),
            messages,
        })
    }
}

/// `sampling/createMessage` request for a file-system question
fn sampling_request(question: &str) -> serde_json::Value {
    serde_json::json!({
        "method": "sampling/createMessage",
        "params": {
            "messages": [
                {"role": "user", "content": {"type": "text", "text": question}}
            ],
            "modelPreferences": {
                "hints": [{"name": "deepseek-chat"}],
                "costPriority": 0.5,
                "speedPriority": 0.7,
                "intelligencePriority": 0.8
            },
            "systemPrompt": "You are a file system assistant who helps users understand the state and contents of their file system.",
            "includeContext": "thisServer",
            "temperature": 0.7,
            "maxTokens": 1000,
            "stopSequences": ["\n\n"],
            "metadata": {"requestType": "file-system-query"}
        }
    })
}
