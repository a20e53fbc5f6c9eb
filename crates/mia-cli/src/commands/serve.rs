//! `mia serve`: run a demo MCP provider on stdio

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use mia_providers::{ProviderKind, ProviderOptions, build_server};

pub async fn run(kind: ProviderKind, docs_dir: Option<PathBuf>, update_interval: Option<u64>) -> Result<()> {
    let options = ProviderOptions {
        docs_dir,
        update_interval: update_interval.filter(|s| *s > 0).map(Duration::from_secs),
    };
    let server = build_server(kind, &options)?;
    info!("Serving '{}' provider on stdio", kind.as_str());
    server.serve_stdio().await
}
