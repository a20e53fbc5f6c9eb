//! mia: MCP tool-calling client, demo MCP providers and an A2A echo agent
//!
//! Usage:
//!   mia chat                       # chat with the demo tools server
//!   mia chat python server.py      # chat with any stdio MCP provider
//!   mia serve resources            # run a demo provider on stdio
//!   mia a2a serve                  # run the A2A echo agent

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use config::MiaConfig;
use mia_providers::ProviderKind;

#[derive(Parser)]
#[command(name = "mia")]
#[command(version, about = "MCP tool-calling client, demo providers and A2A echo agent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ~/.config/mia/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override the LLM model
    #[arg(long, global = true)]
    model: Option<String>,

    /// Override the LLM base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Override the per-query LLM call budget
    #[arg(long, global = true)]
    max_iterations: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat; the LLM calls the provider's tools
    Chat {
        /// Mount resources and add their text to the system prompt
        #[arg(long)]
        with_resources: bool,

        /// Use the demo tools in-process instead of spawning a provider
        #[arg(long, conflicts_with = "provider")]
        local: bool,

        /// Provider command and arguments (default: built-in demo server)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        provider: Vec<String>,
    },

    /// List the provider's tools with their schemas
    Tools {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        provider: Vec<String>,
    },

    /// List and read the provider's resources
    Resources {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        provider: Vec<String>,
    },

    /// Expand a prompt template and send it to the LLM (lists prompts without --name)
    Prompt {
        #[arg(long)]
        name: Option<String>,

        /// Template argument as key=value
        #[arg(short = 'a', long = "arg")]
        args: Vec<String>,

        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        provider: Vec<String>,
    },

    /// Ask questions through the file-system assistant's sampling requests
    Sample {
        #[arg(long)]
        temperature: Option<f32>,

        #[arg(long)]
        max_tokens: Option<u32>,

        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        provider: Vec<String>,
    },

    /// Serve a demo MCP provider on stdio
    Serve {
        kind: ServeKind,

        /// Serve every *.txt file in this directory as a resource
        #[arg(long)]
        docs_dir: Option<PathBuf>,

        /// Seconds between resource update notifications to subscribers
        #[arg(long)]
        update_interval: Option<u64>,
    },

    /// A2A echo agent
    A2a {
        #[command(subcommand)]
        command: A2aCommand,
    },
}

#[derive(Subcommand)]
enum A2aCommand {
    /// Print the echo agent card
    Card {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run the echo agent over HTTP
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },

    /// Send a text task to an agent
    Send {
        #[arg(long)]
        url: String,

        #[arg(long)]
        session: Option<String>,

        text: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ServeKind {
    Tools,
    Resources,
    Prompts,
    Sampling,
    All,
}

impl From<ServeKind> for ProviderKind {
    fn from(kind: ServeKind) -> Self {
        match kind {
            ServeKind::Tools => ProviderKind::Tools,
            ServeKind::Resources => ProviderKind::Resources,
            ServeKind::Prompts => ProviderKind::Prompts,
            ServeKind::Sampling => ProviderKind::Sampling,
            ServeKind::All => ProviderKind::All,
        }
    }
}

/// Log to stderr; stdout carries JSON-RPC when serving and the REPL otherwise
fn init_logging(verbose: bool, default_level: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<MiaConfig> {
    let mut config = MiaConfig::load(cli.config.as_deref())?;
    if let Some(model) = &cli.model {
        config.llm.model = model.clone();
    }
    if let Some(base_url) = &cli.base_url {
        config.llm.base_url = base_url.clone();
    }
    if let Some(max) = cli.max_iterations {
        config.agent.max_iterations = max;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let serving = matches!(
        cli.command,
        Commands::Serve { .. } | Commands::A2a { command: A2aCommand::Serve { .. } }
    );
    init_logging(cli.verbose, if serving { "info" } else { "warn" });

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Chat {
            with_resources,
            local,
            provider,
        } => {
            commands::chat::run(
                commands::chat::ChatOptions {
                    provider,
                    with_resources,
                    local,
                },
                &config,
            )
            .await
        }
        Commands::Tools { provider } => commands::inspect::tools(&provider, &config).await,
        Commands::Resources { provider } => commands::inspect::resources(&provider, &config).await,
        Commands::Prompt { name, args, provider } => {
            commands::prompt::prompt(&provider, name.as_deref(), &args, &config).await
        }
        Commands::Sample {
            temperature,
            max_tokens,
            provider,
        } => commands::prompt::sample(&provider, temperature, max_tokens, &config).await,
        Commands::Serve {
            kind,
            docs_dir,
            update_interval,
        } => commands::serve::run(kind.into(), docs_dir, update_interval).await,
        Commands::A2a { command } => match command {
            A2aCommand::Card { host, port } => commands::a2a::card(
                host.as_deref().unwrap_or(&config.a2a.host),
                port.unwrap_or(config.a2a.port),
            ),
            A2aCommand::Serve { host, port } => {
                commands::a2a::serve(
                    host.as_deref().unwrap_or(&config.a2a.host),
                    port.unwrap_or(config.a2a.port),
                )
                .await
            }
            A2aCommand::Send { url, session, text } => {
                commands::a2a::send(&url, &text, session.as_deref()).await
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_chat_provider_trailing_args() {
        let cli = Cli::parse_from(["mia", "chat", "--with-resources", "python", "server.py", "--port", "1"]);
        match cli.command {
            Commands::Chat {
                with_resources,
                local,
                provider,
            } => {
                assert!(with_resources);
                assert!(!local);
                assert_eq!(provider, vec!["python", "server.py", "--port", "1"]);
            }
            _ => panic!("expected chat"),
        }
    }

    #[test]
    fn test_global_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[llm]\nmodel = \"from-file\"\n").unwrap();
        let cli = Cli::parse_from([
            "mia",
            "tools",
            "--config",
            path.to_str().unwrap(),
            "--model",
            "from-flag",
            "--max-iterations",
            "4",
        ]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.llm.model, "from-flag");
        assert_eq!(config.agent.max_iterations, 4);
    }

    #[test]
    fn test_prompt_and_a2a_parsing() {
        let cli = Cli::parse_from(["mia", "prompt", "--name", "code-review", "-a", "language=Rust", "-a", "code=x"]);
        match cli.command {
            Commands::Prompt { name, args, provider } => {
                assert_eq!(name.as_deref(), Some("code-review"));
                assert_eq!(args.len(), 2);
                assert!(provider.is_empty());
            }
            _ => panic!("expected prompt"),
        }

        let cli = Cli::parse_from(["mia", "a2a", "send", "--url", "http://localhost:10002", "hello there"]);
        assert!(matches!(
            cli.command,
            Commands::A2a {
                command: A2aCommand::Send { .. }
            }
        ));
    }

    #[test]
    fn test_serve_kind() {
        let cli = Cli::parse_from(["mia", "serve", "sampling", "--update-interval", "5"]);
        match cli.command {
            Commands::Serve {
                kind, update_interval, ..
            } => {
                assert_eq!(ProviderKind::from(kind), ProviderKind::Sampling);
                assert_eq!(update_interval, Some(5));
            }
            _ => panic!("expected serve"),
        }
    }
}
