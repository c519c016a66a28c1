// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Parley main entry point - CLI and REPL.

use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use parley::config::{self, CliOptions, ResolvedConfig};
use parley::providers::{create_provider, create_provider_from_env, ProviderConfig, ProviderKind};
use parley::session::{EvictionSweeper, MemoryStore, SessionManager};
use parley::telemetry::{init_telemetry, TelemetryConfig};
use parley::types::{SharedProvider, TurnOverrides};

/// Parley version string.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parley - session-aware conversation proxy for LLM providers.
#[derive(Parser)]
#[command(name = "parley")]
#[command(author, version, about = "Session-aware conversation proxy for LLM providers", long_about = None)]
struct Cli {
    /// Provider to use
    #[arg(short, long, env = "PARLEY_PROVIDER")]
    provider: Option<Provider>,

    /// Model to use for new sessions
    #[arg(short, long, env = "PARLEY_MODEL")]
    model: Option<String>,

    /// Base URL for the provider API
    #[arg(long, env = "PARLEY_BASE_URL")]
    base_url: Option<String>,

    /// Session id to converse under
    #[arg(short, long)]
    session: Option<String>,

    /// Run a single prompt and exit
    #[arg(short = 'P', long)]
    prompt: Option<String>,

    /// Idle seconds before a session is evicted
    #[arg(long)]
    idle_timeout: Option<u64>,

    /// Seconds between eviction sweeps
    #[arg(long)]
    sweep_interval: Option<u64>,

    /// Show debug output
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available providers.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Provider {
    /// Anthropic - Claude models
    Anthropic,
    /// OpenAI - GPT models
    Openai,
    /// Ollama - Local models
    Ollama,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Anthropic => write!(f, "anthropic"),
            Provider::Openai => write!(f, "openai"),
            Provider::Ollama => write!(f, "ollama"),
        }
    }
}

/// Subcommands for parley.
#[derive(Subcommand)]
enum Commands {
    /// Show resolved configuration
    Config,
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let telemetry = if cli.debug {
        TelemetryConfig::development()
    } else {
        TelemetryConfig::default()
    };
    let _guard = init_telemetry(&telemetry)?;

    let cli_options = CliOptions {
        provider: cli.provider.map(|p| p.to_string()),
        model: cli.model,
        base_url: cli.base_url,
        idle_timeout_secs: cli.idle_timeout,
        sweep_interval_secs: cli.sweep_interval,
    };

    let workspace_root = std::env::current_dir()?;
    let config = config::load_config(&workspace_root, cli_options)?;

    if let Some(command) = cli.command {
        return handle_command(command, &config);
    }

    let provider = build_provider(&config)?;
    let store = Arc::new(MemoryStore::new());

    let mut manager = SessionManager::new(store.clone(), provider);
    if let Some(model) = &config.model {
        manager = manager.with_default_model(model.clone());
    }

    let sweeper = EvictionSweeper::spawn(store, config.session.clone());

    let session_id = cli
        .session
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let overrides = overrides_from(&config);
    let result = match cli.prompt {
        Some(prompt) => run_prompt(&manager, &session_id, &prompt, overrides).await,
        None => run_repl(&manager, &session_id, overrides).await,
    };

    sweeper.shutdown().await;
    result
}

fn handle_command(command: Commands, config: &ResolvedConfig) -> anyhow::Result<()> {
    match command {
        Commands::Config => {
            println!("provider:       {}", config.provider.as_deref().unwrap_or("(auto)"));
            println!("model:          {}", config.model.as_deref().unwrap_or("(provider default)"));
            println!("base_url:       {}", config.base_url.as_deref().unwrap_or("(provider default)"));
            println!("idle_timeout:   {}s", config.session.idle_timeout_secs);
            println!("sweep_interval: {}s", config.session.sweep_interval_secs);
        }
        Commands::Version => {
            println!("parley {}", VERSION);
        }
    }
    Ok(())
}

/// Build a provider from the resolved configuration, falling back to
/// environment auto-detection when no provider is named.
fn build_provider(config: &ResolvedConfig) -> anyhow::Result<SharedProvider> {
    let kind: ProviderKind = match &config.provider {
        Some(name) => name
            .parse()
            .map_err(|_| anyhow::anyhow!("Unknown provider: {name}"))?,
        None => return Ok(create_provider_from_env()?),
    };

    let api_key = match kind {
        ProviderKind::Anthropic => std::env::var("ANTHROPIC_API_KEY").ok(),
        ProviderKind::OpenAi => std::env::var("OPENAI_API_KEY").ok(),
        ProviderKind::Ollama => None,
    };

    let provider_config = ProviderConfig {
        api_key,
        model: config.model.clone(),
        base_url: config.base_url.clone(),
        timeout_ms: config.timeout_ms,
    };

    Ok(create_provider(kind, provider_config)?)
}

/// Turn overrides carrying the configured generation defaults.
fn overrides_from(config: &ResolvedConfig) -> TurnOverrides {
    TurnOverrides {
        model: None,
        temperature: config.temperature,
        top_p: config.top_p,
        max_tokens: config.max_tokens,
    }
}

async fn run_prompt(
    manager: &SessionManager,
    session_id: &str,
    prompt: &str,
    overrides: TurnOverrides,
) -> anyhow::Result<()> {
    let response = manager
        .continue_conversation(session_id, prompt, overrides)
        .await?;
    println!("{}", response.text);
    Ok(())
}

async fn run_repl(
    manager: &SessionManager,
    session_id: &str,
    overrides: TurnOverrides,
) -> anyhow::Result<()> {
    println!("parley {} - session {session_id}", VERSION);
    println!("Type a message, or /sessions, /delete <id>, /quit");

    let mut session_id = session_id.to_string();
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };
        let input = line.trim();

        if input.is_empty() {
            continue;
        }

        match input {
            "/quit" | "/exit" => break,
            "/new" => {
                session_id = uuid::Uuid::new_v4().to_string();
                println!("Started session {session_id}");
            }
            "/sessions" => {
                let sessions = manager.list_sessions().await?;
                if sessions.is_empty() {
                    println!("No active sessions");
                }
                for info in sessions {
                    println!("{}", info.format());
                }
            }
            _ if input.starts_with("/delete ") => {
                let id = input.trim_start_matches("/delete ").trim();
                if manager.delete_session(id).await? {
                    println!("Deleted session {id}");
                } else {
                    println!("No session {id}");
                }
            }
            _ => {
                match manager
                    .continue_conversation(&session_id, input, overrides.clone())
                    .await
                {
                    Ok(response) => println!("{}", response.text),
                    Err(e) => eprintln!("error: {e}"),
                }
            }
        }
    }

    Ok(())
}
