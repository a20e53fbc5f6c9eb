//! A2A client: fetches agent cards and sends tasks to peer agents

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::protocol::*;

/// Resolve `path` relative to an agent's base URL, keeping any base path
fn endpoint(base_url: &str, path: &str) -> Result<Url> {
    let mut base = Url::parse(base_url).with_context(|| format!("Invalid agent URL: {}", base_url))?;
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path.trim_start_matches('/'))
        .with_context(|| format!("Invalid endpoint {} for {}", path, base_url))
}

/// A2A client for communicating with peer agents
pub struct A2aClient {
    http: Client,
    next_id: AtomicU64,
}

impl A2aClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            next_id: AtomicU64::new(1),
        })
    }

    /// Fetch an agent's capability card
    pub async fn fetch_agent_card(&self, base_url: &str, token: Option<&str>) -> Result<AgentCard> {
        let url = endpoint(base_url, crate::server::AGENT_CARD_PATH)?;
        debug!("Fetching agent card from {}", url);

        let mut req = self.http.get(url.clone());
        if let Some(t) = token {
            req = req.bearer_auth(t);
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("Failed to fetch agent card from {}", url))?;
        if !resp.status().is_success() {
            return Err(anyhow!("Agent card request failed: HTTP {}", resp.status()));
        }

        resp.json()
            .await
            .with_context(|| format!("Invalid agent card at {}", url))
    }

    /// `tasks/send`
    pub async fn send_task(&self, base_url: &str, params: &TaskSendParams) -> Result<Task> {
        let task: Task = self.rpc(base_url, "tasks/send", params).await?;
        info!("Task {} is {}", task.id, task.status.state);
        Ok(task)
    }

    /// Send a single text message as a new task
    pub async fn send_text(&self, base_url: &str, text: &str, session_id: Option<&str>) -> Result<Task> {
        let params = TaskSendParams {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: Some(
                session_id
                    .map(str::to_string)
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            ),
            message: Message::user(text),
            history_length: None,
            metadata: None,
        };
        self.send_task(base_url, &params).await
    }

    /// `tasks/get`
    pub async fn get_task(&self, base_url: &str, task_id: &str, history_length: Option<usize>) -> Result<Task> {
        let params = TaskQueryParams {
            id: task_id.to_string(),
            history_length,
        };
        self.rpc(base_url, "tasks/get", &params).await
    }

    /// `tasks/cancel`
    pub async fn cancel_task(&self, base_url: &str, task_id: &str) -> Result<Task> {
        let params = TaskIdParams {
            id: task_id.to_string(),
        };
        self.rpc(base_url, "tasks/cancel", &params).await
    }

    /// POST a JSON-RPC request; error responses come back as [`JsonRpcError`]
    async fn rpc<P: Serialize, T: DeserializeOwned>(&self, base_url: &str, method: &str, params: &P) -> Result<T> {
        let url = endpoint(base_url, "")?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, serde_json::to_value(params)?);
        debug!("A2A {} -> {}", method, url);

        let resp = self
            .http
            .post(url.clone())
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to send {} to {}", method, url))?;
        if !resp.status().is_success() {
            return Err(anyhow!("{} failed: HTTP {}", method, resp.status()));
        }

        let response: JsonRpcResponse = resp
            .json()
            .await
            .with_context(|| format!("Invalid JSON-RPC response from {}", url))?;
        if let Some(error) = response.error {
            return Err(error.into());
        }
        let result = response
            .result
            .ok_or_else(|| anyhow!("{} response carried neither result nor error", method))?;
        serde_json::from_value(result).with_context(|| format!("Unexpected {} result", method))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_construction() {
        assert_eq!(
            endpoint("http://localhost:10002", "/.well-known/agent.json").unwrap().as_str(),
            "http://localhost:10002/.well-known/agent.json"
        );
        assert_eq!(
            endpoint("http://localhost:10002/", "").unwrap().as_str(),
            "http://localhost:10002/"
        );
        assert_eq!(
            endpoint("http://host/agents/echo", "/.well-known/agent.json").unwrap().as_str(),
            "http://host/agents/echo/.well-known/agent.json"
        );
        assert!(endpoint("not a url", "").is_err());
    }

    #[tokio::test]
    async fn test_fetch_agent_card_connection_refused() {
        let client = A2aClient::new().unwrap();
        let result = client.fetch_agent_card("http://127.0.0.1:1", None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_send_task_connection_refused() {
        let client = A2aClient::new().unwrap();
        let err = client.send_text("http://127.0.0.1:1/", "hi", None).await.unwrap_err();
        assert!(err.to_string().contains("Failed to send tasks/send"));
        assert!(err.downcast_ref::<JsonRpcError>().is_none());
    }

    #[tokio::test]
    async fn test_get_and_cancel_connection_refused() {
        let client = A2aClient::new().unwrap();
        assert!(client.get_task("http://127.0.0.1:1", "t", None).await.is_err());
        assert!(client.cancel_task("http://127.0.0.1:1", "t").await.is_err());
    }
}
