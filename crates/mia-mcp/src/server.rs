//! MCP server implementation over STDIO
//!
//! Reads JSON-RPC requests line by line, dispatches to the mounted tool,
//! resource and prompt providers, and writes responses back.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::{Instant, Interval};
use tracing::{debug, info, warn};

use crate::adapter::McpToolAdapter;
use crate::error::ProviderError;
use crate::protocol::*;
use crate::provider::{PromptProvider, ResourceProvider};

/// MCP server that communicates over a line channel
pub struct McpServer {
    name: String,
    tools: Option<McpToolAdapter>,
    resources: Option<Arc<dyn ResourceProvider>>,
    prompts: Option<Arc<dyn PromptProvider>>,
    update_interval: Option<Duration>,
    subscriptions: Mutex<BTreeSet<String>>,
}

impl McpServer {
    /// Create a server with nothing mounted
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tools: None,
            resources: None,
            prompts: None,
            update_interval: None,
            subscriptions: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn with_tools(mut self, adapter: McpToolAdapter) -> Self {
        self.tools = Some(adapter);
        self
    }

    pub fn with_resources(mut self, provider: Arc<dyn ResourceProvider>) -> Self {
        self.resources = Some(provider);
        self
    }

    pub fn with_prompts(mut self, provider: Arc<dyn PromptProvider>) -> Self {
        self.prompts = Some(provider);
        self
    }

    /// Emit `notifications/resources/updated` for subscribed URIs at this interval
    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = Some(interval);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the MCP server over STDIO (stdin/stdout)
    pub async fn serve_stdio(&self) -> Result<()> {
        info!("MCP server '{}' starting on STDIO", self.name);
        self.serve(BufReader::new(io::stdin()), io::stdout()).await?;
        info!("MCP server STDIO closed");
        Ok(())
    }

    /// Serve until the reader reaches end of input
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut ticker = self
            .update_interval
            .filter(|_| self.resources.is_some())
            .map(|period| tokio::time::interval_at(Instant::now() + period, period));

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    if let Some(resp) = self.handle_line(&line).await {
                        write_message(&mut writer, &resp).await?;
                    }
                }
                _ = tick(&mut ticker) => {
                    self.notify_subscribers(&mut writer).await?;
                }
            }
        }
        Ok(())
    }

    /// Parse and handle one raw line; `None` when nothing is to be sent back
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        debug!("MCP received: {}", preview(line));

        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                warn!("Invalid JSON-RPC request: {}", e);
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ));
            }
        };

        let id = value.get("id").cloned();
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => id.map(|id| JsonRpcResponse::error(id, INVALID_REQUEST, format!("Invalid request: {}", e))),
        }
    }

    /// Handle a single JSON-RPC request
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            match request.method.as_str() {
                "notifications/initialized" => info!("MCP client initialized"),
                other => debug!("MCP notification ignored: {}", other),
            }
            return None;
        }

        let id = request.id.clone().unwrap_or(Value::Null);
        let outcome = match request.method.as_str() {
            "initialize" => to_result(&self.initialize_result()),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" | "tools/call" => match &self.tools {
                Some(tools) => self.handle_tools(tools, &request).await,
                None => Err(not_mounted(&request.method)),
            },
            "resources/list"
            | "resources/templates/list"
            | "resources/read"
            | "resources/subscribe"
            | "resources/unsubscribe" => match &self.resources {
                Some(resources) => self.handle_resources(resources.as_ref(), &request).await,
                None => Err(not_mounted(&request.method)),
            },
            "prompts/list" | "prompts/get" => match &self.prompts {
                Some(prompts) => self.handle_prompts(prompts.as_ref(), &request).await,
                None => Err(not_mounted(&request.method)),
            },
            _ => {
                warn!("MCP unknown method: {}", request.method);
                Err((METHOD_NOT_FOUND, format!("Unknown method: {}", request.method)))
            }
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err((code, message)) => JsonRpcResponse::error(id, code, message),
        })
    }

    fn initialize_result(&self) -> InitializeResult {
        InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: self.tools.as_ref().map(|_| ToolsCapability::default()),
                resources: self.resources.as_ref().map(|_| ResourcesCapability {
                    subscribe: true,
                    list_changed: false,
                }),
                prompts: self.prompts.as_ref().map(|_| PromptsCapability::default()),
            },
            server_info: ServerInfo {
                name: self.name.clone(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    async fn handle_tools(&self, tools: &McpToolAdapter, request: &JsonRpcRequest) -> RpcOutcome {
        if request.method == "tools/list" {
            let tools = tools.list_tools();
            info!("MCP tools/list: returning {} tools", tools.len());
            return to_result(&ListToolsResult { tools });
        }

        let name = required_str(&request.params, "name")?;
        let arguments = match request.params.get("arguments") {
            None | Some(Value::Null) => serde_json::json!({}),
            Some(Value::Object(map)) => Value::Object(map.clone()),
            Some(_) => return Err((INVALID_PARAMS, "'arguments' must be an object".to_string())),
        };

        info!("MCP tools/call: {}", name);
        to_result(&tools.call_tool(name, arguments).await)
    }

    async fn handle_resources(&self, resources: &dyn ResourceProvider, request: &JsonRpcRequest) -> RpcOutcome {
        match request.method.as_str() {
            "resources/list" => to_result(&ListResourcesResult {
                resources: resources.list_resources(),
            }),
            "resources/templates/list" => to_result(&ListResourceTemplatesResult {
                resource_templates: resources.list_templates(),
            }),
            "resources/read" => {
                let uri = required_str(&request.params, "uri")?;
                info!("MCP resources/read: {}", uri);
                let contents = resources.read(uri).await.map_err(provider_error)?;
                to_result(&ReadResourceResult { contents })
            }
            "resources/subscribe" => {
                let uri = required_str(&request.params, "uri")?;
                if !resources.contains(uri) {
                    return Err(provider_error(ProviderError::NotFound(uri.to_string())));
                }
                info!("MCP resources/subscribe: {}", uri);
                self.lock_subscriptions().insert(uri.to_string());
                Ok(serde_json::json!({}))
            }
            _ => {
                let uri = required_str(&request.params, "uri")?;
                info!("MCP resources/unsubscribe: {}", uri);
                self.lock_subscriptions().remove(uri);
                Ok(serde_json::json!({}))
            }
        }
    }

    async fn handle_prompts(&self, prompts: &dyn PromptProvider, request: &JsonRpcRequest) -> RpcOutcome {
        if request.method == "prompts/list" {
            return to_result(&ListPromptsResult {
                prompts: prompts.list_prompts(),
            });
        }

        let name = required_str(&request.params, "name")?;
        let arguments: HashMap<String, String> = request
            .params
            .get("arguments")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| {
                        let value = match v {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        (k.clone(), value)
                    })
                    .collect()
            })
            .unwrap_or_default();

        info!("MCP prompts/get: {}", name);
        let result = prompts.get(name, &arguments).await.map_err(provider_error)?;
        to_result(&result)
    }

    /// URIs with an active subscription, in order
    pub fn subscriptions(&self) -> Vec<String> {
        self.lock_subscriptions().iter().cloned().collect()
    }

    fn lock_subscriptions(&self) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
        // A panic while holding the set cannot leave it inconsistent
        self.subscriptions.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn notify_subscribers<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> Result<()> {
        let timestamp = chrono::Utc::now().to_rfc3339();
        for uri in self.subscriptions() {
            debug!("Resource updated: {}", uri);
            let notification = JsonRpcNotification::new(
                "notifications/resources/updated",
                Some(serde_json::json!({ "uri": uri, "timestamp": timestamp })),
            );
            write_message(writer, &notification).await?;
        }
        Ok(())
    }
}

type RpcOutcome = std::result::Result<Value, (i64, String)>;

fn to_result<T: Serialize>(value: &T) -> RpcOutcome {
    serde_json::to_value(value).map_err(|e| (INTERNAL_ERROR, format!("Failed to serialize result: {}", e)))
}

fn required_str<'a>(params: &'a Value, key: &str) -> std::result::Result<&'a str, (i64, String)> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| (INVALID_PARAMS, format!("Missing '{}' parameter", key)))
}

fn provider_error(e: ProviderError) -> (i64, String) {
    if let ProviderError::Internal(inner) = &e {
        warn!("MCP provider failure: {:#}", inner);
    }
    (e.code(), e.to_string())
}

fn not_mounted(method: &str) -> (i64, String) {
    (METHOD_NOT_FOUND, format!("Method not supported by this server: {}", method))
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn preview(line: &str) -> &str {
    match line.char_indices().nth(200) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}

/// Write one JSON-RPC message (newline-delimited)
async fn write_message<W: AsyncWrite + Unpin, T: Serialize>(writer: &mut W, message: &T) -> Result<()> {
    let json = serde_json::to_string(message).context("Failed to serialize response")?;
    debug!("MCP sending: {}", preview(&json));
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
