//! Traits implemented by resource and prompt providers mounted on an
//! [`crate::McpServer`]

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::ProviderError;
use crate::protocol::{GetPromptResult, Prompt, Resource, ResourceContents, ResourceTemplate};

#[async_trait]
pub trait ResourceProvider: Send + Sync {
    fn list_resources(&self) -> Vec<Resource>;

    fn list_templates(&self) -> Vec<ResourceTemplate> {
        Vec::new()
    }

    /// Read a resource; unknown URIs are [`ProviderError::NotFound`]
    async fn read(&self, uri: &str) -> Result<Vec<ResourceContents>, ProviderError>;

    fn contains(&self, uri: &str) -> bool {
        self.list_resources().iter().any(|r| r.uri == uri)
    }
}

#[async_trait]
pub trait PromptProvider: Send + Sync {
    fn list_prompts(&self) -> Vec<Prompt>;

    /// Render a prompt; unknown names and missing required arguments are
    /// [`ProviderError::InvalidParams`]
    async fn get(
        &self,
        name: &str,
        arguments: &HashMap<String, String>,
    ) -> Result<GetPromptResult, ProviderError>;
}

/// Check that every required argument of `prompt` is present and non-empty
pub fn check_required(prompt: &Prompt, arguments: &HashMap<String, String>) -> Result<(), ProviderError> {
    for arg in prompt.arguments.iter().filter(|a| a.required) {
        let present = arguments
            .get(&arg.name)
            .is_some_and(|v| !v.trim().is_empty());
        if !present {
            return Err(ProviderError::InvalidParams(format!(
                "Missing required argument '{}' for prompt '{}'",
                arg.name, prompt.name
            )));
        }
    }
    Ok(())
}
