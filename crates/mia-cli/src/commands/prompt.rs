//! `mia prompt` and `mia sample`: prompt templates and sampling requests
//! answered by the configured LLM

use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use mia_core::providers::{ChatRequest, ChatResponse, LlmProvider};
use mia_core::{ConversationTurn, SessionConfig};
use mia_mcp::protocol::{GetPromptResult, Prompt, PromptRole};
use mia_mcp::{CreateMessageResult, McpClient, SamplingRequest};
use mia_providers::ProviderKind;
use mia_providers::prompts::FILE_SYSTEM_ASSISTANT;

use super::{build_llm, connect_provider, parse_arguments};
use crate::config::MiaConfig;

fn prompt_turns(prompt: &GetPromptResult) -> Vec<ConversationTurn> {
    prompt
        .messages
        .iter()
        .filter_map(|m| {
            let text = m.content.as_text()?;
            Some(match m.role {
                PromptRole::User => ConversationTurn::user(text),
                PromptRole::Assistant => ConversationTurn::assistant(text),
            })
        })
        .collect()
}

fn render_prompts(prompts: &[Prompt]) -> String {
    let mut lines = Vec::new();
    for p in prompts {
        lines.push(format!("{}: {}", p.name, p.description.as_deref().unwrap_or("")));
        for a in &p.arguments {
            lines.push(format!(
                "  {}{} {}",
                a.name,
                if a.required { "*" } else { "" },
                a.description.as_deref().unwrap_or("")
            ));
        }
    }
    lines.join("\n")
}

async fn complete(llm: &dyn LlmProvider, request: &ChatRequest<'_>, timeout: Duration) -> Result<ChatResponse> {
    tokio::time::timeout(timeout, llm.chat(request))
        .await
        .map_err(|_| anyhow!("LLM call timed out after {:?}", timeout))?
        .map_err(anyhow::Error::from)
}

pub async fn prompt(provider: &[String], name: Option<&str>, pairs: &[String], config: &MiaConfig) -> Result<()> {
    let client = connect_provider(provider, ProviderKind::Prompts, config).await?;
    let result = run_prompt(&client, name, pairs, config).await;
    client.shutdown().await;
    result
}

async fn run_prompt(client: &McpClient, name: Option<&str>, pairs: &[String], config: &MiaConfig) -> Result<()> {
    let Some(name) = name else {
        println!("{}", render_prompts(&client.list_prompts().await?));
        return Ok(());
    };

    let arguments = parse_arguments(pairs)?;
    let prompt = client
        .get_prompt(name, &arguments)
        .await
        .with_context(|| format!("Failed to get prompt '{}'", name))?;
    let turns = prompt_turns(&prompt);
    info!("Prompt '{}' expanded to {} messages", name, turns.len());

    let llm = build_llm(config)?;
    let mut request = ChatRequest::new(&turns, &[]);
    request.temperature = config.llm.temperature;
    request.max_tokens = config.llm.max_tokens;
    let response = complete(llm.as_ref(), &request, config.loop_config().llm_timeout).await?;
    println!("{}", response.content_text());
    Ok(())
}

/// Answer one question through the sampling prompt
async fn sample_once(
    client: &McpClient,
    llm: &Arc<dyn LlmProvider>,
    question: &str,
    overrides: (Option<f32>, Option<u32>),
    timeout: Duration,
) -> Result<CreateMessageResult> {
    let mut arguments = HashMap::new();
    arguments.insert("question".to_string(), question.to_string());
    let prompt = client.get_prompt(FILE_SYSTEM_ASSISTANT, &arguments).await?;

    let mut sampling = SamplingRequest::from_prompt(&prompt)?;
    sampling.params.apply_overrides(overrides.0, overrides.1);
    let params = &sampling.params;

    let turns = params.to_turns();
    let mut request = ChatRequest::new(&turns, &[]);
    request.temperature = params.temperature;
    request.max_tokens = Some(params.max_tokens);
    request.stop = params.stop_sequences.clone();

    let response = complete(llm.as_ref(), &request, timeout).await?;
    Ok(CreateMessageResult::from_response(&response, llm.model()))
}

pub async fn sample(
    provider: &[String],
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    config: &MiaConfig,
) -> Result<()> {
    let client = connect_provider(provider, ProviderKind::Sampling, config).await?;
    let llm = build_llm(config)?;
    let session: SessionConfig = config.session_config();
    let timeout = config.loop_config().llm_timeout;

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    stdout
        .write_all(b"Ask the file system assistant a question.\n")
        .await?;
    loop {
        stdout.write_all(session.prompt.as_bytes()).await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if session.is_sentinel(&line) {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }

        let output = match sample_once(&client, &llm, question, (temperature, max_tokens), timeout).await {
            Ok(result) => serde_json::to_string_pretty(&result)?,
            Err(e) => {
                warn!("Sampling failed: {:#}", e);
                format!("Error: {:#}", e)
            }
        };
        stdout.write_all(format!("\n{}\n\n", output).as_bytes()).await?;
    }

    client.shutdown().await;
    Ok(())
}
