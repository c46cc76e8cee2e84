//! Mnemo CLI
//!
//! A stdin/stdout chat loop around the persistent-memory agent. The hosted
//! chat UI this agent is meant to sit behind is an external collaborator;
//! this binary is the minimal transport at that boundary.

use clap::Parser;
use mnemo::{ChatAgent, MemoryStore, MnemoConfig, OpenRouterClient};
use serde::Deserialize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Mnemo - chat agent with persistent cross-session memory
#[derive(Parser, Debug)]
#[command(name = "mnemo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Identity key partitioning the memory (one per user/session owner)
    #[arg(short, long, default_value = "default")]
    identity: String,

    /// Path to the durable memory file
    #[arg(long)]
    memory_file: Option<PathBuf>,

    /// Character budget for the injected context block
    #[arg(long)]
    context_budget: Option<usize>,

    /// How many recent turns the context may include
    #[arg(long)]
    recent_turns: Option<usize>,

    /// Model identifier for the completion endpoint
    #[arg(long)]
    model: Option<String>,
}

/// Partial config.toml parsing; CLI flags win over file values.
#[derive(Debug, Default, Deserialize)]
struct ConfigToml {
    memory_file: Option<PathBuf>,
    context_budget: Option<usize>,
    recent_turns: Option<usize>,
    model: Option<String>,
    api_base: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mnemo_home = get_mnemo_home()?;
    let config = resolve_config(&cli, &mnemo_home).await?;

    let api_key = std::env::var("OPENROUTER_API_KEY")
        .or_else(|_| std::env::var("OPENAI_API_KEY"))
        .map_err(|_| {
            anyhow::anyhow!("OPENROUTER_API_KEY (or OPENAI_API_KEY) not set in environment")
        })?;

    let store = Arc::new(MemoryStore::open(config.memory_file.clone()).await?);
    let client = OpenRouterClient::new(&config, api_key)?;
    let agent = ChatAgent::new(&config, Arc::clone(&store), client);

    info!(identity = %cli.identity, "Mnemo ready");
    println!("Hi there! I'm your personal assistant. I remember things across sessions.");

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let user_text = match line {
            Ok(l) => l.trim().to_string(),
            Err(e) => {
                error!("Error reading stdin: {}", e);
                break;
            }
        };
        if user_text.is_empty() {
            continue;
        }
        if user_text == "/quit" || user_text == "/exit" {
            break;
        }

        match agent.handle_turn(&cli.identity, &user_text).await {
            Ok(reply) => {
                writeln!(io::stdout(), "{}", reply)?;
                io::stdout().flush()?;
            }
            Err(e) => {
                error!("Turn failed: {}", e);
                println!("Sorry, something went wrong while processing your request.");
            }
        }
    }

    store.flush().await?;
    info!("Memory flushed, goodbye");
    Ok(())
}

/// Merge defaults, optional config.toml, and CLI flags into the final config.
async fn resolve_config(cli: &Cli, mnemo_home: &std::path::Path) -> anyhow::Result<MnemoConfig> {
    let file_config = load_config_toml(&mnemo_home.join("config.toml")).await;

    let memory_file = cli
        .memory_file
        .clone()
        .or(file_config.memory_file)
        .unwrap_or_else(|| mnemo_home.join("memory.json"));

    let mut config = MnemoConfig::new(memory_file);
    if let Some(budget) = cli.context_budget.or(file_config.context_budget) {
        config = config.with_context_budget(budget);
    }
    if let Some(turns) = cli.recent_turns.or(file_config.recent_turns) {
        config = config.with_recent_turns(turns);
    }
    if let Some(model) = cli.model.clone().or(file_config.model) {
        config = config.with_model(model);
    }
    if let Some(base) = file_config.api_base {
        config = config.with_api_base(base);
    }
    Ok(config)
}

async fn load_config_toml(path: &std::path::Path) -> ConfigToml {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => match toml::from_str(&content) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!(path = %path.display(), "Invalid config.toml, ignoring: {}", e);
                ConfigToml::default()
            }
        },
        Err(_) => ConfigToml::default(),
    }
}

/// Get the Mnemo home directory
fn get_mnemo_home() -> anyhow::Result<PathBuf> {
    if let Ok(home) = std::env::var("MNEMO_HOME") {
        return Ok(PathBuf::from(home));
    }

    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
    Ok(home.join(".mnemo"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_mnemo_home() {
        // Should not panic
        let result = get_mnemo_home();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_missing_config_toml_yields_defaults() {
        let parsed = load_config_toml(std::path::Path::new("/nonexistent/config.toml")).await;
        assert!(parsed.memory_file.is_none());
        assert!(parsed.model.is_none());
    }
}
