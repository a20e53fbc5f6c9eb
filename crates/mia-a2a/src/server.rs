//! A2A HTTP server
//!
//! Serves the agent card at `GET /.well-known/agent.json` and JSON-RPC task
//! methods at `POST /`.

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

use crate::protocol::*;
use crate::task_manager::{A2aError, TaskManager};

pub const AGENT_CARD_PATH: &str = "/.well-known/agent.json";

/// Card for the built-in echo agent reachable at `http://{host}:{port}/`
pub fn echo_agent_card(host: &str, port: u16) -> AgentCard {
    AgentCard {
        name: "Echo Agent".to_string(),
        description: Some("This agent echos the input given".to_string()),
        url: format!("http://{}:{}/", host, port),
        version: env!("CARGO_PKG_VERSION").to_string(),
        default_input_modes: default_modes(),
        default_output_modes: default_modes(),
        capabilities: AgentCapabilities::default(),
        skills: vec![AgentSkill {
            id: "echo-skill".to_string(),
            name: "Echo Tool".to_string(),
            description: Some("Echos the input given".to_string()),
            tags: Some(vec!["echo".to_string(), "repeater".to_string()]),
            examples: Some(vec!["I will see this echoed back to me".to_string()]),
            input_modes: Some(default_modes()),
            output_modes: Some(default_modes()),
        }],
    }
}

struct AppState {
    card: AgentCard,
    manager: Arc<dyn TaskManager>,
}

pub struct A2aServer {
    state: Arc<AppState>,
}

impl A2aServer {
    pub fn new(card: AgentCard, manager: Arc<dyn TaskManager>) -> Self {
        Self {
            state: Arc::new(AppState { card, manager }),
        }
    }

    pub fn card(&self) -> &AgentCard {
        &self.state.card
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", post(handle_rpc))
            .route(AGENT_CARD_PATH, get(agent_card))
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .with_state(self.state.clone())
    }

    /// Serve on an already-bound listener until `shutdown` is cancelled
    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        let addr = listener.local_addr()?;
        info!("A2A server '{}' listening on http://{}", self.state.card.name, addr);
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .context("A2A server failed")?;
        info!("A2A server stopped");
        Ok(())
    }

    /// Bind `host:port` and serve until `shutdown` is cancelled
    pub async fn bind_and_serve(&self, host: &str, port: u16, shutdown: CancellationToken) -> Result<()> {
        let listener = bind(host, port).await?;
        self.serve(listener, shutdown).await
    }
}

pub async fn bind(host: &str, port: u16) -> Result<TcpListener> {
    let addr = if host == "localhost" {
        SocketAddr::from(([127, 0, 0, 1], port))
    } else {
        format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", host, port))?
    };
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))
}

async fn agent_card(State(state): State<Arc<AppState>>) -> Json<AgentCard> {
    Json(state.card.clone())
}

async fn handle_rpc(State(state): State<Arc<AppState>>, body: String) -> Json<JsonRpcResponse> {
    Json(dispatch(state.manager.as_ref(), &body).await)
}

fn params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, A2aError> {
    serde_json::from_value(params.unwrap_or(Value::Null))
        .map_err(|e| A2aError::InvalidParams(e.to_string()))
}

/// Decode one JSON-RPC body and route it to the task manager
async fn dispatch(manager: &dyn TaskManager, body: &str) -> JsonRpcResponse {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => {
            warn!("Unparseable A2A request: {}", e);
            return JsonRpcResponse::error(Value::Null, JsonRpcError::new(PARSE_ERROR, format!("Parse error: {}", e)));
        }
    };
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let request: JsonRpcRequest = match serde_json::from_value::<JsonRpcRequest>(value) {
        Ok(r) if r.jsonrpc == JSONRPC_VERSION => r,
        _ => {
            return JsonRpcResponse::error(id, JsonRpcError::new(INVALID_REQUEST, "Invalid request"));
        }
    };
    debug!("A2A request {}", request.method);

    let result = match request.method.as_str() {
        "tasks/send" => match params(request.params) {
            Ok(p) => manager.on_send_task(p).await,
            Err(e) => Err(e),
        },
        "tasks/get" => match params(request.params) {
            Ok(p) => manager.on_get_task(p).await,
            Err(e) => Err(e),
        },
        "tasks/cancel" => match params(request.params) {
            Ok(p) => manager.on_cancel_task(p).await,
            Err(e) => Err(e),
        },
        "tasks/sendSubscribe" => match params(request.params) {
            Ok(p) => manager.on_send_task_subscribe(p).await,
            Err(e) => Err(e),
        },
        other => {
            return JsonRpcResponse::error(
                id,
                JsonRpcError::new(METHOD_NOT_FOUND, format!("Method not found: {}", other)),
            );
        }
    };

    match result.and_then(|task| {
        serde_json::to_value(task).map_err(|e| A2aError::Internal(e.to_string()))
    }) {
        Ok(task) => JsonRpcResponse::success(id, task),
        Err(e) => JsonRpcResponse::error(id, e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::A2aClient;
    use crate::task_manager::EchoTaskManager;

    async fn spawn_echo() -> (String, CancellationToken) {
        let listener = bind("127.0.0.1", 0).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = A2aServer::new(echo_agent_card("127.0.0.1", port), Arc::new(EchoTaskManager::new()));
        let token = CancellationToken::new();
        let shutdown = token.clone();
        tokio::spawn(async move { server.serve(listener, shutdown).await });
        (format!("http://127.0.0.1:{}", port), token)
    }

    async fn raw(body: &str) -> JsonRpcResponse {
        dispatch(&EchoTaskManager::new(), body).await
    }

    #[tokio::test]
    async fn test_parse_error() {
        let resp = raw("{not json").await;
        assert_eq!(resp.error.unwrap().code, PARSE_ERROR);
        assert!(resp.id.is_null());
    }

    #[tokio::test]
    async fn test_invalid_request() {
        let resp = raw(r#"{"id": 3, "params": {}}"#).await;
        assert_eq!(resp.error.unwrap().code, INVALID_REQUEST);
        assert_eq!(resp.id, 3);

        let resp = raw(r#"{"jsonrpc": "1.0", "id": 4, "method": "tasks/get"}"#).await;
        assert_eq!(resp.error.unwrap().code, INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_method_not_found_and_bad_params() {
        let resp = raw(r#"{"jsonrpc": "2.0", "id": 1, "method": "tasks/resubscribe"}"#).await;
        assert_eq!(resp.error.unwrap().code, METHOD_NOT_FOUND);

        let resp = raw(r#"{"jsonrpc": "2.0", "id": 2, "method": "tasks/send", "params": {"id": "t"}}"#).await;
        assert_eq!(resp.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_send_subscribe_unsupported() {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": "s",
            "method": "tasks/sendSubscribe",
            "params": {"id": "t", "message": {"role": "user", "parts": [{"type": "text", "text": "x"}]}}
        });
        let resp = raw(&body.to_string()).await;
        assert_eq!(resp.error.unwrap().code, UNSUPPORTED_OPERATION);
    }

    #[tokio::test]
    async fn test_echo_round_trip_over_http() {
        let (url, token) = spawn_echo().await;
        let client = A2aClient::new().unwrap();

        let card = client.fetch_agent_card(&url, None).await.unwrap();
        assert_eq!(card.name, "Echo Agent");
        assert_eq!(card.skills[0].id, "echo-skill");

        let task = client.send_text(&url, "hello a2a", Some("s-1")).await.unwrap();
        assert_eq!(task.status.state, TaskState::Completed);
        assert_eq!(task.artifact_text(), "Echo: hello a2a");

        let fetched = client.get_task(&url, &task.id, Some(2)).await.unwrap();
        assert_eq!(fetched.history.unwrap().len(), 2);

        let err = client.cancel_task(&url, &task.id).await.unwrap_err();
        assert_eq!(err.downcast_ref::<JsonRpcError>().unwrap().code, TASK_NOT_CANCELABLE);

        let err = client.get_task(&url, "missing", None).await.unwrap_err();
        assert_eq!(err.downcast_ref::<JsonRpcError>().unwrap().code, TASK_NOT_FOUND);

        token.cancel();
    }

    #[tokio::test]
    async fn test_empty_text_over_http() {
        let (url, token) = spawn_echo().await;
        let client = A2aClient::new().unwrap();
        let err = client.send_text(&url, "", None).await.unwrap_err();
        assert_eq!(err.downcast_ref::<JsonRpcError>().unwrap().code, INTERNAL_ERROR);
        token.cancel();
    }

    #[test]
    fn test_echo_card_url() {
        let card = echo_agent_card("localhost", 10002);
        assert_eq!(card.url, "http://localhost:10002/");
        assert!(!card.capabilities.streaming);
    }
}
