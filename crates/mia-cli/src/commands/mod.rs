//! Subcommand implementations

pub mod a2a;
pub mod chat;
pub mod inspect;
pub mod prompt;
pub mod serve;

use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use mia_core::providers::{LlmProvider, OpenAiCompatProvider};
use mia_mcp::{McpClient, McpClientConfig};
use mia_providers::ProviderKind;

use crate::config::MiaConfig;

/// Spawn the provider command, or this executable's own demo server for
/// `fallback` when no command is given
pub async fn connect_provider(provider: &[String], fallback: ProviderKind, config: &MiaConfig) -> Result<Arc<McpClient>> {
    let client_config = match provider.split_first() {
        Some((command, args)) => {
            let name = Path::new(command)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| command.clone());
            McpClientConfig::new(name, command.clone()).with_args(args.to_vec())
        }
        None => {
            let exe = std::env::current_exe().context("Cannot locate the mia executable")?;
            McpClientConfig::new(fallback.as_str(), exe.to_string_lossy().into_owned())
                .with_args(vec!["serve".to_string(), fallback.as_str().to_string()])
        }
    };
    info!("Starting provider {} ({})", client_config.name, client_config.command);

    McpClient::connect(client_config.with_timeouts(config.mcp_timeouts()))
        .await
        .context("Failed to start the capability provider")
}

pub fn build_llm(config: &MiaConfig) -> Result<Arc<dyn LlmProvider>> {
    let provider_config = config.provider_config();
    if provider_config.api_key.is_none() {
        warn!("No LLM API key configured; set DEEPSEEK_API_KEY or [llm].api_key");
    }
    Ok(Arc::new(OpenAiCompatProvider::new(provider_config)?))
}

/// Parse `key=value` pairs given with `-a`
pub fn parse_arguments(pairs: &[String]) -> Result<HashMap<String, String>> {
    let mut arguments = HashMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("Argument '{}' is not in key=value form", pair);
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("Argument '{}' has an empty key", pair);
        }
        arguments.insert(key.to_string(), value.to_string());
    }
    Ok(arguments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arguments() {
        let args = parse_arguments(&["language=Rust".to_string(), "code=a = b".to_string()]).unwrap();
        assert_eq!(args["language"], "Rust");
        assert_eq!(args["code"], "a = b");

        assert!(parse_arguments(&["novalue".to_string()]).is_err());
        assert!(parse_arguments(&["=x".to_string()]).is_err());
    }

    #[tokio::test]
    async fn test_connect_missing_command_fails() {
        let config = MiaConfig::default();
        let result = connect_provider(
            &["/nonexistent/mia-provider".to_string()],
            ProviderKind::Tools,
            &config,
        )
        .await;
        assert!(result.is_err());
    }
}
