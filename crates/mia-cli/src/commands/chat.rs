//! `mia chat`: the interactive tool-calling loop

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::info;

use mia_core::{ConversationLoop, InvocationBroker, LocalBroker, Session};
use mia_mcp::protocol::ResourceContents;
use mia_mcp::{McpBroker, McpClient, ResourceProvider};
use mia_providers::{ProviderKind, ResourceStore, demo_tools};

use super::{build_llm, connect_provider};
use crate::config::MiaConfig;

pub struct ChatOptions {
    pub provider: Vec<String>,
    pub with_resources: bool,
    pub local: bool,
}

/// Append every text resource to the system prompt as reference material
fn with_reference(system_prompt: Option<String>, contents: &[ResourceContents]) -> Option<String> {
    let mut sections: Vec<String> = contents
        .iter()
        .filter_map(|c| c.text.as_deref().map(|text| format!("--- {} ---\n{}", c.uri, text)))
        .collect();
    if sections.is_empty() {
        return system_prompt;
    }
    sections.insert(0, "Reference material:".to_string());
    let reference = sections.join("\n\n");
    Some(match system_prompt {
        Some(prompt) => format!("{}\n\n{}", prompt, reference),
        None => reference,
    })
}

async fn read_remote_resources(client: &McpClient) -> Result<Vec<ResourceContents>> {
    let mut contents = Vec::new();
    for resource in client.list_resources().await? {
        contents.extend(client.read_resource(&resource.uri).await?.contents);
    }
    Ok(contents)
}

async fn read_local_resources() -> Result<Vec<ResourceContents>> {
    let store = ResourceStore::new();
    let mut contents = Vec::new();
    for resource in store.list_resources() {
        contents.extend(store.read(&resource.uri).await.map_err(anyhow::Error::from)?);
    }
    Ok(contents)
}

pub async fn run(options: ChatOptions, config: &MiaConfig) -> Result<()> {
    let llm = build_llm(config)?;
    let mut loop_config = config.loop_config();

    let mut client = None;
    let broker: Arc<dyn InvocationBroker> = if options.local {
        if options.with_resources {
            loop_config.system_prompt = with_reference(loop_config.system_prompt, &read_local_resources().await?);
        }
        Arc::new(LocalBroker::new(Arc::new(demo_tools())))
    } else {
        let fallback = if options.with_resources {
            ProviderKind::All
        } else {
            ProviderKind::Tools
        };
        let connected = connect_provider(&options.provider, fallback, config).await?;
        if options.with_resources {
            let contents = read_remote_resources(&connected)
                .await
                .context("Failed to read provider resources")?;
            info!("Loaded {} resource documents", contents.len());
            loop_config.system_prompt = with_reference(loop_config.system_prompt, &contents);
        }
        let broker = McpBroker::connect(connected.clone())
            .await
            .context("Failed to list provider tools")?;
        client = Some(connected);
        Arc::new(broker)
    };

    let names = broker.capabilities().names().join(", ");
    let mut session_config = config.session_config();
    session_config.greeting = Some(format!(
        "Connected. Available tools: {}\nType your question, or '{}' to quit.",
        if names.is_empty() { "(none)" } else { names.as_str() },
        session_config.sentinels.first().map(String::as_str).unwrap_or("exit"),
    ));

    let session = Session::new(ConversationLoop::new(llm, broker, loop_config), session_config);
    let summary = session
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;
    info!("Session ended after {} queries ({} failed)", summary.queries, summary.failures);

    if let Some(client) = client {
        client.shutdown().await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_reference_appends_text_only() {
        let contents = vec![
            ResourceContents::text("file:///a.txt", "text/plain", "alpha"),
            ResourceContents::blob("file:///logo.png", "image/png", "iVBO"),
        ];
        let prompt = with_reference(Some("Be helpful.".to_string()), &contents).unwrap();
        assert!(prompt.starts_with("Be helpful.\n\nReference material:"));
        assert!(prompt.contains("--- file:///a.txt ---\nalpha"));
        assert!(!prompt.contains("logo.png"));
    }

    #[test]
    fn test_with_reference_without_text() {
        assert_eq!(with_reference(None, &[]), None);
        assert_eq!(with_reference(Some("x".to_string()), &[]).as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn test_local_resources_include_system_log() {
        let contents = read_local_resources().await.unwrap();
        assert_eq!(contents.len(), 2);
        let prompt = with_reference(None, &contents).unwrap();
        assert!(prompt.contains("file:///logs/system.log"));
    }
}
