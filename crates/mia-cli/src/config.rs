//! Configuration: `~/.config/mia/config.toml` with `${VAR}` expansion

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use mia_core::providers::openai_compat::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use mia_core::providers::OpenAiCompatConfig;
use mia_core::session::DEFAULT_SENTINELS;
use mia_core::{LoopConfig, SessionConfig};
use mia_mcp::McpTimeouts;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Use the available tools when they help answer the user's question.";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MiaConfig {
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub mcp: McpConfig,
    pub a2a: A2aConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: Some("${DEEPSEEK_API_KEY}".to_string()),
            temperature: None,
            max_tokens: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub system_prompt: String,
    pub max_iterations: usize,
    pub sentinels: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_iterations: 10,
            sentinels: DEFAULT_SENTINELS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    pub init_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            init_timeout_secs: 60,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct A2aConfig {
    pub host: String,
    pub port: u16,
}

impl Default for A2aConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 10002,
        }
    }
}

/// Replace every `${NAME}` with `lookup(NAME)`; unset variables become empty
pub fn expand_vars(text: &str, lookup: &dyn Fn(&str) -> Option<String>) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").map_err(|e| anyhow!("Invalid regex: {}", e))?;
    let expanded = re.replace_all(text, |caps: &regex::Captures| {
        let name = &caps[1];
        lookup(name).unwrap_or_else(|| {
            warn!("Environment variable '{}' is not set", name);
            String::new()
        })
    });
    Ok(expanded.into_owned())
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("mia").join("config.toml"))
}

impl MiaConfig {
    /// Load `path` (or the default location); a missing file yields defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path(),
        };

        let mut config = match path {
            Some(path) if path.exists() => {
                debug!("Loading config from {}", path.display());
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                Self::parse(&content).with_context(|| format!("Invalid config {}", path.display()))?
            }
            Some(path) => {
                debug!("No config at {}, using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        };
        config.expand_env(&|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config TOML")
    }

    /// Expand `${VAR}` references in every string setting
    pub fn expand_env(&mut self, lookup: &dyn Fn(&str) -> Option<String>) -> Result<()> {
        self.llm.base_url = expand_vars(&self.llm.base_url, lookup)?;
        self.llm.model = expand_vars(&self.llm.model, lookup)?;
        self.llm.api_key = self
            .llm
            .api_key
            .as_deref()
            .map(|key| expand_vars(key, lookup))
            .transpose()?
            .filter(|key| !key.trim().is_empty());
        self.agent.system_prompt = expand_vars(&self.agent.system_prompt, lookup)?;
        self.a2a.host = expand_vars(&self.a2a.host, lookup)?;
        Ok(())
    }

    pub fn provider_config(&self) -> OpenAiCompatConfig {
        let mut config = OpenAiCompatConfig::new(&self.llm.base_url, &self.llm.model)
            .with_timeout(Duration::from_secs(self.llm.timeout_secs));
        if let Some(key) = &self.llm.api_key {
            config = config.with_api_key(key);
        }
        config.temperature = self.llm.temperature;
        config.max_tokens = self.llm.max_tokens;
        config
    }

    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            max_iterations: self.agent.max_iterations.max(1),
            llm_timeout: Duration::from_secs(self.llm.timeout_secs),
            system_prompt: Some(self.agent.system_prompt.clone()).filter(|s| !s.trim().is_empty()),
            temperature: self.llm.temperature,
            max_tokens: self.llm.max_tokens,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            sentinels: self.agent.sentinels.clone(),
            ..SessionConfig::default()
        }
    }

    pub fn mcp_timeouts(&self) -> McpTimeouts {
        McpTimeouts {
            init: Duration::from_secs(self.mcp.init_timeout_secs),
            request: Duration::from_secs(self.mcp.request_timeout_secs),
        }
    }
}
