//! Demo MCP capability providers
//!
//! Each provider kind assembles an [`McpServer`] with the matching tools,
//! resources or prompt templates mounted.

pub mod prompts;
pub mod resources;
pub mod tools;

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mia_mcp::{McpServer, McpToolAdapter};

pub use prompts::{CatalogKind, PromptCatalog};
pub use resources::ResourceStore;
pub use tools::{CalculatorTool, TextAnalyzerTool, demo_tools};

/// Which demo provider to serve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Tools,
    Resources,
    Prompts,
    Sampling,
    All,
}

impl ProviderKind {
    /// Argument accepted by `mia serve`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tools => "tools",
            Self::Resources => "resources",
            Self::Prompts => "prompts",
            Self::Sampling => "sampling",
            Self::All => "all",
        }
    }

    fn server_name(&self) -> &'static str {
        match self {
            Self::Tools => "tools-server",
            Self::Resources => "resource-server",
            Self::Prompts => "code-review-server",
            Self::Sampling => "file-system-assistant",
            Self::All => "mia-demo",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProviderOptions {
    /// Directory whose `*.txt` files are served as resources
    pub docs_dir: Option<PathBuf>,
    /// Interval for resource update notifications
    pub update_interval: Option<Duration>,
}

/// Assemble the server for a provider kind
pub fn build_server(kind: ProviderKind, options: &ProviderOptions) -> Result<McpServer> {
    let mut server = McpServer::new(kind.server_name());

    if matches!(kind, ProviderKind::Tools | ProviderKind::All) {
        server = server.with_tools(McpToolAdapter::new(Arc::new(demo_tools())));
    }

    if matches!(kind, ProviderKind::Resources | ProviderKind::All) {
        let mut store = ResourceStore::new();
        if let Some(dir) = &options.docs_dir {
            store = store.with_documents(dir)?;
        }
        server = server.with_resources(Arc::new(store));
        if let Some(interval) = options.update_interval {
            server = server.with_update_interval(interval);
        }
    }

    let catalog = match kind {
        ProviderKind::Prompts => Some(CatalogKind::CodeTemplates),
        ProviderKind::Sampling => Some(CatalogKind::Sampling),
        ProviderKind::All => Some(CatalogKind::All),
        _ => None,
    };
    if let Some(catalog) = catalog {
        server = server.with_prompts(Arc::new(PromptCatalog::new(catalog)));
    }

    Ok(server)
}
