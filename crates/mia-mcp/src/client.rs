//! MCP client: connects to an MCP server over STDIO and calls its methods

use anyhow::{Context, Result, anyhow};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::McpError;
use crate::protocol::{
    GetPromptResult, InitializeResult, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    ListPromptsResult, ListResourceTemplatesResult, ListResourcesResult, ListToolsResult, McpTool,
    PROTOCOL_VERSION, Prompt, ReadResourceResult, Resource, ResourceTemplate, ToolCallResult,
};

type BoxedReader = Box<dyn AsyncBufRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Deadlines for the handshake and for every later request
#[derive(Debug, Clone, Copy)]
pub struct McpTimeouts {
    pub init: Duration,
    pub request: Duration,
}

impl Default for McpTimeouts {
    fn default() -> Self {
        Self {
            init: Duration::from_secs(60),
            request: Duration::from_secs(30),
        }
    }
}

/// Configuration for an external MCP server
#[derive(Debug, Clone)]
pub struct McpClientConfig {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
    pub timeouts: McpTimeouts,
}

impl McpClientConfig {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
            timeouts: McpTimeouts::default(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_timeouts(mut self, timeouts: McpTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

/// Reader and writer of one server connection; a request holds both
/// from write to matching response, so exchanges never interleave.
///
/// Both directions buffer across a cancelled exchange: a timed-out request
/// leaves its unsent bytes in `outbound` and any half-read line in
/// `inbound`, and the next exchange picks up where it stopped.
struct Channel {
    reader: BoxedReader,
    writer: BoxedWriter,
    inbound: Vec<u8>,
    outbound: Vec<u8>,
}

impl Channel {
    fn new(reader: BoxedReader, writer: BoxedWriter) -> Self {
        Self {
            reader,
            writer,
            inbound: Vec::new(),
            outbound: Vec::new(),
        }
    }

    /// Queue a line and write out everything pending
    async fn send(&mut self, line: &str) -> Result<(), McpError> {
        self.outbound.extend_from_slice(line.as_bytes());
        while !self.outbound.is_empty() {
            // `write` either accepts bytes or is dropped having written none
            let n = self.writer.write(&self.outbound).await?;
            if n == 0 {
                return Err(McpError::Closed);
            }
            self.outbound.drain(..n);
        }
        self.writer.flush().await?;
        Ok(())
    }

    /// Next complete line; a partial line stays buffered if this is cancelled
    async fn next_line(&mut self) -> Result<String, McpError> {
        loop {
            let bytes = self.reader.read_until(b'\n', &mut self.inbound).await?;
            if bytes == 0 {
                return Err(McpError::Closed);
            }
            if self.inbound.last() == Some(&b'\n') {
                let line = String::from_utf8_lossy(&self.inbound).into_owned();
                self.inbound.clear();
                return Ok(line);
            }
        }
    }

    /// Read until we get a response matching the given id
    async fn read_response(&mut self, expected_id: u64) -> Result<JsonRpcResponse, McpError> {
        loop {
            let line = self.next_line().await?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let msg: Value = serde_json::from_str(line)
                .map_err(|e| McpError::Protocol(format!("{} in: {}", e, preview(line))))?;

            // Server notifications and stale responses carry no matching id
            if msg.get("id").and_then(Value::as_u64) == Some(expected_id) {
                return serde_json::from_value(msg).map_err(|e| McpError::Protocol(e.to_string()));
            }
            debug!("MCP notification: {}", preview(line));
        }
    }
}

/// MCP client that communicates with an MCP server over a line channel
pub struct McpClient {
    name: String,
    child: Mutex<Option<Child>>,
    channel: Mutex<Channel>,
    next_id: AtomicU64,
    request_timeout: Duration,
    server: OnceLock<InitializeResult>,
}

impl McpClient {
    /// Spawn and connect to an MCP server process
    pub async fn connect(config: McpClientConfig) -> Result<Arc<Self>> {
        info!("Connecting to MCP server: {} ({})", config.name, config.command);

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in &config.env {
            cmd.env(key, value);
        }
        if let Some(cwd) = &config.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn MCP server: {}", config.command))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("Failed to capture MCP server stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("Failed to capture MCP server stdout"))?;

        // Drain stderr in background so server errors are visible in logs
        if let Some(stderr) = child.stderr.take() {
            let server_name = config.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if !line.trim().is_empty() {
                        warn!("MCP server '{}' stderr: {}", server_name, line);
                    }
                }
            });
        }

        let client = Self::build(
            &config.name,
            Box::new(BufReader::new(stdout)),
            Box::new(stdin),
            Some(child),
            config.timeouts,
        );
        client.handshake(config.timeouts.init).await?;
        Ok(client)
    }

    /// Attach to an already-open reader/writer pair (in-process servers, tests)
    pub async fn from_streams<R, W>(
        name: &str,
        reader: R,
        writer: W,
        timeouts: McpTimeouts,
    ) -> Result<Arc<Self>>
    where
        R: AsyncBufRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let client = Self::build(name, Box::new(reader), Box::new(writer), None, timeouts);
        client.handshake(timeouts.init).await?;
        Ok(client)
    }

    fn build(
        name: &str,
        reader: BoxedReader,
        writer: BoxedWriter,
        child: Option<Child>,
        timeouts: McpTimeouts,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            child: Mutex::new(child),
            channel: Mutex::new(Channel::new(reader, writer)),
            next_id: AtomicU64::new(1),
            request_timeout: timeouts.request,
            server: OnceLock::new(),
        })
    }

    async fn handshake(&self, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.initialize())
            .await
            .map_err(|_| anyhow!("MCP server '{}' initialize timed out after {:?}", self.name, timeout))?
    }

    /// Send initialize handshake
    async fn initialize(&self) -> Result<()> {
        let result: InitializeResult = self
            .request_typed(
                "initialize",
                serde_json::json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "mia",
                        "version": env!("CARGO_PKG_VERSION")
                    }
                }),
            )
            .await
            .with_context(|| format!("MCP server '{}' rejected initialize", self.name))?;

        debug!("MCP initialize response: {:?}", result);
        if result.protocol_version != PROTOCOL_VERSION {
            warn!(
                "MCP server '{}' speaks protocol {}, expected {}",
                self.name, result.protocol_version, PROTOCOL_VERSION
            );
        }
        info!(
            "MCP client connected to {} ({} {})",
            self.name, result.server_info.name, result.server_info.version
        );
        let _ = self.server.set(result);

        self.send_notification("notifications/initialized", None).await?;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Server's answer to `initialize`
    pub fn server(&self) -> Option<&InitializeResult> {
        self.server.get()
    }

    pub async fn list_tools(&self) -> Result<Vec<McpTool>, McpError> {
        let result: ListToolsResult = self.request_typed("tools/list", serde_json::json!({})).await?;
        info!("Discovered {} tools from MCP server {}", result.tools.len(), self.name);
        Ok(result.tools)
    }

    /// Call a tool; tool failures come back as `isError` results, not errors
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, McpError> {
        self.request_typed(
            "tools/call",
            serde_json::json!({
                "name": name,
                "arguments": arguments,
            }),
        )
        .await
    }

    pub async fn list_resources(&self) -> Result<Vec<Resource>, McpError> {
        let result: ListResourcesResult = self.request_typed("resources/list", serde_json::json!({})).await?;
        Ok(result.resources)
    }

    pub async fn list_resource_templates(&self) -> Result<Vec<ResourceTemplate>, McpError> {
        let result: ListResourceTemplatesResult = self
            .request_typed("resources/templates/list", serde_json::json!({}))
            .await?;
        Ok(result.resource_templates)
    }

    pub async fn read_resource(&self, uri: &str) -> Result<ReadResourceResult, McpError> {
        self.request_typed("resources/read", serde_json::json!({ "uri": uri }))
            .await
    }

    pub async fn subscribe_resource(&self, uri: &str) -> Result<(), McpError> {
        self.request("resources/subscribe", serde_json::json!({ "uri": uri }))
            .await
            .map(|_| ())
    }

    pub async fn unsubscribe_resource(&self, uri: &str) -> Result<(), McpError> {
        self.request("resources/unsubscribe", serde_json::json!({ "uri": uri }))
            .await
            .map(|_| ())
    }

    pub async fn list_prompts(&self) -> Result<Vec<Prompt>, McpError> {
        let result: ListPromptsResult = self.request_typed("prompts/list", serde_json::json!({})).await?;
        Ok(result.prompts)
    }

    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: &HashMap<String, String>,
    ) -> Result<GetPromptResult, McpError> {
        self.request_typed(
            "prompts/get",
            serde_json::json!({
                "name": name,
                "arguments": arguments,
            }),
        )
        .await
    }

    pub async fn ping(&self) -> Result<(), McpError> {
        self.request("ping", serde_json::json!({})).await.map(|_| ())
    }

    async fn request_typed<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, McpError> {
        let result = self.request(method, params).await?;
        serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("unexpected '{}' result: {}", method, e)))
    }

    /// Send a JSON-RPC request and wait for the matching response
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let line = serde_json::to_string(&JsonRpcRequest::new(id, method, params))
            .map_err(|e| McpError::Protocol(e.to_string()))?
            + "\n";

        let mut channel = self.channel.lock().await;
        debug!("MCP -> {}: {}", self.name, preview(&line));

        let exchange = async {
            channel.send(&line).await?;
            channel.read_response(id).await
        };

        let response = tokio::time::timeout(self.request_timeout, exchange)
            .await
            .map_err(|_| McpError::Timeout {
                method: method.to_string(),
                after: self.request_timeout,
            })??;

        if let Some(error) = response.error {
            return Err(error.into());
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Send a JSON-RPC notification (no response expected)
    async fn send_notification(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let line = serde_json::to_string(&JsonRpcNotification::new(method, params))
            .map_err(|e| McpError::Protocol(e.to_string()))?
            + "\n";

        self.channel.lock().await.send(&line).await
    }

    /// Close the channel and stop the server process
    pub async fn shutdown(&self) {
        {
            let mut channel = self.channel.lock().await;
            let _ = channel.writer.shutdown().await;
        }

        let mut child_guard = self.child.lock().await;
        if let Some(child) = child_guard.as_mut() {
            match tokio::time::timeout(Duration::from_secs(2), child.wait()).await {
                Ok(Ok(status)) => debug!("MCP server '{}' exited: {}", self.name, status),
                _ => {
                    let _ = child.kill().await;
                }
            }
        }
        *child_guard = None;
        info!("MCP client for {} shut down", self.name);
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        // Best-effort cleanup, can't await in drop
        if let Ok(mut guard) = self.child.try_lock() {
            if let Some(child) = guard.as_mut() {
                let _ = child.start_kill();
            }
        }
    }
}

fn preview(line: &str) -> &str {
    let line = line.trim_end();
    match line.char_indices().nth(200) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}
