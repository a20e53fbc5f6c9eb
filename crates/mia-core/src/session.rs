//! Interactive session: reads queries line by line and answers each one
//! through a [`ConversationLoop`] until a sentinel line ends the session.

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::agent::ConversationLoop;

pub const DEFAULT_SENTINELS: [&str; 3] = ["退出", "exit", "quit"];

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Inputs that end the session, compared case-insensitively after trimming
    pub sentinels: Vec<String>,
    /// Printed before every read
    pub prompt: String,
    /// Printed once when the session starts
    pub greeting: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sentinels: DEFAULT_SENTINELS.iter().map(|s| s.to_string()).collect(),
            prompt: "> ".to_string(),
            greeting: None,
        }
    }
}

impl SessionConfig {
    pub fn is_sentinel(&self, line: &str) -> bool {
        let line = line.trim();
        self.sentinels
            .iter()
            .any(|s| s.trim().to_lowercase() == line.to_lowercase())
    }
}

/// Counters reported when a session ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub queries: usize,
    pub failures: usize,
}

/// Owns the conversation loop for the lifetime of one REPL
pub struct Session {
    agent: ConversationLoop,
    config: SessionConfig,
}

impl Session {
    pub fn new(agent: ConversationLoop, config: SessionConfig) -> Self {
        Self { agent, config }
    }

    pub fn agent(&self) -> &ConversationLoop {
        &self.agent
    }

    /// Run the REPL until a sentinel line or end of input.
    ///
    /// Query failures are printed and the session continues; only I/O
    /// errors on the reader or writer end it early.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<SessionSummary>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut summary = SessionSummary::default();

        if let Some(greeting) = &self.config.greeting {
            writer.write_all(format!("{}\n", greeting).as_bytes()).await?;
        }

        loop {
            writer.write_all(self.config.prompt.as_bytes()).await?;
            writer.flush().await?;

            let Some(line) = lines.next_line().await? else {
                debug!("Input closed, ending session");
                break;
            };
            let query = line.trim();
            if query.is_empty() {
                continue;
            }
            if self.config.is_sentinel(query) {
                debug!("Sentinel received, ending session");
                break;
            }

            summary.queries += 1;
            let output = match self.agent.run_query(query).await {
                Ok(answer) => format!("\n{}\n\n", answer.text.trim_end()),
                Err(e) => {
                    warn!("Query failed: {}", e);
                    summary.failures += 1;
                    format!("\nError: {}\n\n", e)
                }
            };
            writer.write_all(output.as_bytes()).await?;
            writer.flush().await?;
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::LoopConfig;
    use crate::broker::LocalBroker;
    use crate::providers::{ChatRequest, ChatResponse, LlmError, LlmProvider};
    use crate::tools::ToolRegistry;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    struct QueueProvider {
        replies: Mutex<VecDeque<Result<ChatResponse, LlmError>>>,
        calls: Mutex<usize>,
    }

    impl QueueProvider {
        fn new(replies: Vec<Result<ChatResponse, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl LlmProvider for QueueProvider {
        fn provider_name(&self) -> &str {
            "queue"
        }

        fn model(&self) -> &str {
            "queue-model"
        }

        async fn chat(&self, _request: &ChatRequest<'_>) -> Result<ChatResponse, LlmError> {
            *self.calls.lock().unwrap() += 1;
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ChatResponse::text("(no more replies)")))
        }
    }

    /// Stalls past any short deadline on its first call, answers afterwards
    struct StallOnceProvider {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl LlmProvider for StallOnceProvider {
        fn provider_name(&self) -> &str {
            "stall-once"
        }

        fn model(&self) -> &str {
            "stall-once-model"
        }

        async fn chat(&self, _request: &ChatRequest<'_>) -> Result<ChatResponse, LlmError> {
            let first = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls == 1
            };
            if first {
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            }
            Ok(ChatResponse::text("answered in time"))
        }
    }

    fn session(provider: Arc<QueueProvider>) -> Session {
        let broker = Arc::new(LocalBroker::new(Arc::new(ToolRegistry::new())));
        Session::new(
            ConversationLoop::new(provider, broker, LoopConfig::default()),
            SessionConfig::default(),
        )
    }

    async fn run(session: &Session, input: &str) -> (SessionSummary, String) {
        let mut out = Vec::new();
        let summary = session.run(input.as_bytes(), &mut out).await.unwrap();
        (summary, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_sentinel_matching() {
        let config = SessionConfig::default();
        assert!(config.is_sentinel("exit"));
        assert!(config.is_sentinel("  QUIT \n"));
        assert!(config.is_sentinel("退出"));
        assert!(!config.is_sentinel("exit now"));
        assert!(!config.is_sentinel(""));
    }

    #[tokio::test]
    async fn test_sentinel_ends_without_llm_calls() {
        let provider = QueueProvider::new(vec![]);
        let session = session(provider.clone());

        let (summary, out) = run(&session, "exit\nhello\n").await;
        assert_eq!(summary, SessionSummary::default());
        assert_eq!(provider.calls(), 0);
        assert_eq!(out, "> ");
    }

    #[tokio::test]
    async fn test_one_query_prints_one_answer() {
        let provider = QueueProvider::new(vec![Ok(ChatResponse::text("Hi! How can I help?"))]);
        let session = session(provider.clone());

        let (summary, out) = run(&session, "hello\nquit\n").await;
        assert_eq!(summary.queries, 1);
        assert_eq!(provider.calls(), 1);
        assert_eq!(out.matches("Hi! How can I help?").count(), 1);
    }

    #[tokio::test]
    async fn test_empty_lines_ignored() {
        let provider = QueueProvider::new(vec![]);
        let session = session(provider.clone());

        let (summary, _) = run(&session, "\n   \n退出\n").await;
        assert_eq!(summary.queries, 0);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_llm_failure_continues_session() {
        let provider = QueueProvider::new(vec![
            Err(LlmError::Network("connection reset".into())),
            Ok(ChatResponse::text("second try worked")),
        ]);
        let session = session(provider.clone());

        let (summary, out) = run(&session, "first\nsecond\nexit\n").await;
        assert_eq!(summary.queries, 2);
        assert_eq!(summary.failures, 1);
        assert!(out.contains("Error: LLM request failed: Network error: connection reset"));
        assert!(out.contains("second try worked"));
    }

    #[tokio::test]
    async fn test_llm_timeout_reported_and_session_continues() {
        let provider = Arc::new(StallOnceProvider { calls: Mutex::new(0) });
        let broker = Arc::new(LocalBroker::new(Arc::new(ToolRegistry::new())));
        let config = LoopConfig {
            llm_timeout: std::time::Duration::from_millis(50),
            ..Default::default()
        };
        let session = Session::new(
            ConversationLoop::new(provider, broker, config),
            SessionConfig::default(),
        );

        let (summary, out) = run(&session, "first\nsecond\nexit\n").await;
        assert_eq!(summary, SessionSummary { queries: 2, failures: 1 });
        assert!(out.contains("Error: LLM request failed: LLM request timed out after 50ms"));
        assert!(out.contains("answered in time"));
    }

    #[tokio::test]
    async fn test_end_of_input_ends_session() {
        let provider = QueueProvider::new(vec![Ok(ChatResponse::text("answer"))]);
        let session = session(provider);

        let (summary, out) = run(&session, "question").await;
        assert_eq!(summary.queries, 1);
        assert!(out.contains("answer"));
    }
}
