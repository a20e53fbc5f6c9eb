//! Task managers: own the task store and turn incoming messages into results

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::protocol::{
    Artifact, INTERNAL_ERROR, INVALID_PARAMS, JsonRpcError, Message, Part, TASK_NOT_CANCELABLE,
    TASK_NOT_FOUND, Task, TaskIdParams, TaskQueryParams, TaskSendParams, TaskState, TaskStatus,
    UNSUPPORTED_OPERATION,
};

/// Failures a task manager reports back as JSON-RPC errors
#[derive(Debug, Error)]
pub enum A2aError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task cannot be canceled: {0}")]
    NotCancelable(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("{0} is not supported")]
    Unsupported(String),

    #[error("{0}")]
    Internal(String),
}

impl A2aError {
    pub fn code(&self) -> i64 {
        match self {
            Self::TaskNotFound(_) => TASK_NOT_FOUND,
            Self::NotCancelable(_) => TASK_NOT_CANCELABLE,
            Self::InvalidParams(_) => INVALID_PARAMS,
            Self::Unsupported(_) => UNSUPPORTED_OPERATION,
            Self::Internal(_) => INTERNAL_ERROR,
        }
    }
}

impl From<A2aError> for JsonRpcError {
    fn from(err: A2aError) -> Self {
        JsonRpcError::new(err.code(), err.to_string())
    }
}

#[async_trait]
pub trait TaskManager: Send + Sync {
    /// `tasks/send`: run the task to completion and return it
    async fn on_send_task(&self, params: TaskSendParams) -> Result<Task, A2aError>;

    /// `tasks/get`
    async fn on_get_task(&self, params: TaskQueryParams) -> Result<Task, A2aError>;

    /// `tasks/cancel`
    async fn on_cancel_task(&self, params: TaskIdParams) -> Result<Task, A2aError>;

    /// `tasks/sendSubscribe`; streaming is opt-in
    async fn on_send_task_subscribe(&self, _params: TaskSendParams) -> Result<Task, A2aError> {
        Err(A2aError::Unsupported("Streaming".to_string()))
    }
}

#[derive(Debug, Clone)]
struct StoredTask {
    task: Task,
    history: Vec<Message>,
}

/// Copy of a stored task with history trimmed to the last `history_length` messages
fn snapshot(stored: &StoredTask, history_length: Option<usize>) -> Task {
    let mut task = stored.task.clone();
    task.history = match history_length {
        Some(n) if n > 0 => {
            let skip = stored.history.len().saturating_sub(n);
            Some(stored.history[skip..].to_vec())
        }
        _ => None,
    };
    task
}

/// In-memory echo agent: every task completes with `Echo: <text>`
pub struct EchoTaskManager {
    tasks: RwLock<HashMap<String, StoredTask>>,
}

impl EchoTaskManager {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
        }
    }

    pub async fn task_count(&self) -> usize {
        self.tasks.read().await.len()
    }

    /// Insert the task or append the new message to an existing one
    async fn upsert(&self, params: &TaskSendParams) {
        let mut tasks = self.tasks.write().await;
        let stored = tasks.entry(params.id.clone()).or_insert_with(|| StoredTask {
            task: Task {
                id: params.id.clone(),
                session_id: params.session_id.clone(),
                status: TaskStatus::new(TaskState::Submitted),
                artifacts: None,
                history: None,
                metadata: params.metadata.clone(),
            },
            history: Vec::new(),
        });
        stored.history.push(params.message.clone());
    }

    async fn finish(
        &self,
        id: &str,
        status: TaskStatus,
        artifact: Option<Artifact>,
        reply: Option<Message>,
        history_length: Option<usize>,
    ) -> Result<Task, A2aError> {
        let mut tasks = self.tasks.write().await;
        let stored = tasks
            .get_mut(id)
            .ok_or_else(|| A2aError::TaskNotFound(id.to_string()))?;
        stored.task.status = status;
        if let Some(artifact) = artifact {
            stored.task.artifacts = Some(vec![artifact]);
        }
        if let Some(reply) = reply {
            stored.history.push(reply);
        }
        Ok(snapshot(stored, history_length))
    }
}

impl Default for EchoTaskManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskManager for EchoTaskManager {
    async fn on_send_task(&self, params: TaskSendParams) -> Result<Task, A2aError> {
        self.upsert(&params).await;
        debug!("Task {} received {} parts", params.id, params.message.parts.len());

        let text = params.message.first_text().map(str::trim).unwrap_or_default();
        if text.is_empty() {
            warn!("Task {} has no text content", params.id);
            self.finish(&params.id, TaskStatus::new(TaskState::Failed), None, None, None)
                .await?;
            return Err(A2aError::Internal(
                "Invalid message: no non-empty text part".to_string(),
            ));
        }

        let reply = format!("Echo: {}", text);
        let artifact = Artifact {
            name: None,
            parts: vec![Part::text(reply.clone())],
            index: 0,
        };
        let task = self
            .finish(
                &params.id,
                TaskStatus::new(TaskState::Completed),
                Some(artifact),
                Some(Message::agent(reply)),
                params.history_length,
            )
            .await?;
        info!("Task {} completed", task.id);
        Ok(task)
    }

    async fn on_get_task(&self, params: TaskQueryParams) -> Result<Task, A2aError> {
        let tasks = self.tasks.read().await;
        let stored = tasks
            .get(&params.id)
            .ok_or_else(|| A2aError::TaskNotFound(params.id.clone()))?;
        Ok(snapshot(stored, params.history_length))
    }

    async fn on_cancel_task(&self, params: TaskIdParams) -> Result<Task, A2aError> {
        let mut tasks = self.tasks.write().await;
        let stored = tasks
            .get_mut(&params.id)
            .ok_or_else(|| A2aError::TaskNotFound(params.id.clone()))?;
        if stored.task.status.state.is_terminal() {
            return Err(A2aError::NotCancelable(format!(
                "{} is already {}",
                params.id, stored.task.status.state
            )));
        }
        stored.task.status = TaskStatus::new(TaskState::Canceled);
        info!("Task {} canceled", params.id);
        Ok(snapshot(stored, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn send(id: &str, message: Message, history_length: Option<usize>) -> TaskSendParams {
        TaskSendParams {
            id: id.to_string(),
            session_id: Some("session-1".to_string()),
            message,
            history_length,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_echo_completes_task() {
        let manager = EchoTaskManager::new();
        let task = manager
            .on_send_task(send("t-1", Message::user("hello"), None))
            .await
            .unwrap();
        assert_eq!(task.status.state, TaskState::Completed);
        assert_eq!(task.artifact_text(), "Echo: hello");
        assert_eq!(task.session_id.as_deref(), Some("session-1"));
        assert!(task.history.is_none());
    }

    #[tokio::test]
    async fn test_history_trimmed() {
        let manager = EchoTaskManager::new();
        let task = manager
            .on_send_task(send("t-1", Message::user("hi"), Some(1)))
            .await
            .unwrap();
        let history = task.history.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0], Message::agent("Echo: hi"));

        let task = manager
            .on_get_task(TaskQueryParams {
                id: "t-1".to_string(),
                history_length: Some(10),
            })
            .await
            .unwrap();
        assert_eq!(task.history.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_first_text_part_used() {
        let mut data = serde_json::Map::new();
        data.insert("k".to_string(), serde_json::json!(1));
        let message = Message {
            role: crate::protocol::MessageRole::User,
            parts: vec![Part::Data { data }, Part::text("second")],
        };
        let task = EchoTaskManager::new()
            .on_send_task(send("t-2", message, None))
            .await
            .unwrap();
        assert_eq!(task.artifact_text(), "Echo: second");
    }

    #[tokio::test]
    async fn test_empty_text_is_internal_error() {
        let manager = EchoTaskManager::new();
        let err = manager
            .on_send_task(send("t-3", Message::user("   "), None))
            .await
            .unwrap_err();
        assert_eq!(err.code(), INTERNAL_ERROR);

        let task = manager
            .on_get_task(TaskQueryParams {
                id: "t-3".to_string(),
                history_length: None,
            })
            .await
            .unwrap();
        assert_eq!(task.status.state, TaskState::Failed);
    }

    #[tokio::test]
    async fn test_get_and_cancel_unknown_task() {
        let manager = EchoTaskManager::new();
        let err = manager
            .on_get_task(TaskQueryParams {
                id: "missing".to_string(),
                history_length: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), TASK_NOT_FOUND);

        let err = manager
            .on_cancel_task(TaskIdParams {
                id: "missing".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), TASK_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_completed_task_not_cancelable() {
        let manager = EchoTaskManager::new();
        manager
            .on_send_task(send("t-4", Message::user("x"), None))
            .await
            .unwrap();
        let err = manager
            .on_cancel_task(TaskIdParams {
                id: "t-4".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), TASK_NOT_CANCELABLE);
        assert_eq!(manager.task_count().await, 1);
    }

    #[tokio::test]
    async fn test_subscribe_unsupported() {
        let err = EchoTaskManager::new()
            .on_send_task_subscribe(send("t-5", Message::user("x"), None))
            .await
            .unwrap_err();
        assert_eq!(err.code(), UNSUPPORTED_OPERATION);
    }

    #[test]
    fn test_error_to_json_rpc() {
        let err: JsonRpcError = A2aError::TaskNotFound("t".to_string()).into();
        assert_eq!(err.code, TASK_NOT_FOUND);
        assert_eq!(err.message, "Task not found: t");
    }
}
