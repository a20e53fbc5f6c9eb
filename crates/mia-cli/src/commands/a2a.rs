//! `mia a2a`: the echo agent and a client for it

use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use mia_a2a::{A2aClient, A2aServer, EchoTaskManager, Task, echo_agent_card};

pub fn card(host: &str, port: u16) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&echo_agent_card(host, port))?);
    Ok(())
}

pub async fn serve(host: &str, port: u16) -> Result<()> {
    let server = A2aServer::new(echo_agent_card(host, port), Arc::new(EchoTaskManager::new()));
    let token = CancellationToken::new();

    let shutdown = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down A2A server");
        }
        shutdown.cancel();
    });

    server.bind_and_serve(host, port, token).await
}

fn render_task(task: &Task) -> String {
    let mut out = format!("Task {} {}", task.id, task.status.state);
    let text = task.artifact_text();
    if !text.is_empty() {
        out.push('\n');
        out.push_str(&text);
    }
    out
}

pub async fn send(url: &str, text: &str, session: Option<&str>) -> Result<()> {
    let client = A2aClient::new()?;
    match client.fetch_agent_card(url, None).await {
        Ok(card) => info!("Sending to agent '{}' ({})", card.name, card.version),
        Err(e) => warn!("Could not fetch agent card: {:#}", e),
    }
    let task = client.send_text(url, text, session).await?;
    println!("{}", render_task(&task));
    Ok(())
}
