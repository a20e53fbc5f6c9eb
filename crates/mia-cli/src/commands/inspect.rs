//! `mia tools` and `mia resources`: print what a provider exposes

use anyhow::Result;
use std::fmt::Write;

use mia_core::CapabilityRegistry;
use mia_mcp::load_capabilities;
use mia_mcp::protocol::{Resource, ResourceContents, ResourceTemplate};
use mia_providers::ProviderKind;

use super::connect_provider;
use crate::config::MiaConfig;

fn render_capabilities(registry: &CapabilityRegistry) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "{} tools:", registry.len())?;
    for capability in registry.list() {
        writeln!(out, "\n{}: {}", capability.name, capability.description)?;
        let required = capability.required_parameters();
        if !required.is_empty() {
            writeln!(out, "  required: {}", required.join(", "))?;
        }
        writeln!(out, "{}", serde_json::to_string_pretty(&capability.parameter_schema)?)?;
    }
    Ok(out)
}

fn render_contents(contents: &ResourceContents) -> String {
    let mime = contents.mime_type.as_deref().unwrap_or("application/octet-stream");
    match (&contents.text, &contents.blob) {
        (Some(text), _) => text.clone(),
        (None, Some(blob)) => format!("<binary {}, {} base64 chars>", mime, blob.len()),
        (None, None) => format!("<empty {}>", mime),
    }
}

fn render_listing(resources: &[Resource], templates: &[ResourceTemplate]) -> String {
    let mut lines = vec![format!("{} resources:", resources.len())];
    for r in resources {
        lines.push(format!(
            "  {} ({}) {}",
            r.uri,
            r.mime_type.as_deref().unwrap_or("unknown"),
            r.description.as_deref().unwrap_or(&r.name)
        ));
    }
    lines.push(format!("{} templates:", templates.len()));
    for t in templates {
        lines.push(format!("  {} {}", t.uri_template, t.name));
    }
    lines.join("\n")
}

pub async fn tools(provider: &[String], config: &MiaConfig) -> Result<()> {
    let client = connect_provider(provider, ProviderKind::Tools, config).await?;
    let registry = load_capabilities(&client).await?;
    print!("{}", render_capabilities(&registry)?);
    client.shutdown().await;
    Ok(())
}

pub async fn resources(provider: &[String], config: &MiaConfig) -> Result<()> {
    let client = connect_provider(provider, ProviderKind::Resources, config).await?;
    let resources = client.list_resources().await?;
    let templates = client.list_resource_templates().await?;
    println!("{}", render_listing(&resources, &templates));

    for resource in &resources {
        println!("\n=== {} ===", resource.uri);
        match client.read_resource(&resource.uri).await {
            Ok(result) => {
                for contents in &result.contents {
                    println!("{}", render_contents(contents));
                }
            }
            Err(e) => println!("Error: {}", e),
        }
    }
    client.shutdown().await;
    Ok(())
}
