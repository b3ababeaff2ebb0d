//! # chainrun
//!
//! Command-line front end for the chain runtime.
//!
//! ```bash
//! # Write an example configuration to the platform config directory
//! chainrun init
//!
//! # Build every chain and list them
//! chainrun check --config chains.yaml
//!
//! # Process one message and print the report
//! chainrun run --config chains.yaml --chain main --message message.json
//! ```
//!
//! Logging goes to stderr and follows `RUST_LOG` (default `warn`).

use std::{fs, io, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use chain_runtime::{
    actor::MessageBus,
    adapter::registry::{AfterActionTable, InMemoryChainRegistry, ReceiverTable},
    cli::{ChainCli, ChainCliCommand},
    config::{AppConfig, get_config_file_path, init_config},
    domain::record::{Message, MessageContext},
    port::registry::ChainRegistry
};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(io::stderr)
        .init();

    let cli = ChainCli::parse();

    match cli.command {
        ChainCliCommand::Run { config, chain, message } => run(config, &chain, message).await,
        ChainCliCommand::Check { config } => check(config),
        ChainCliCommand::Init { config } => {
            let path = config_path(config)?;
            if init_config(&path)? {
                println!("Wrote example configuration to {}", path.display());
            } else {
                println!("Configuration already exists at {}", path.display());
            }
            Ok(())
        }
    }
}

async fn run(config: Option<PathBuf>, chain: &str, message: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(&config_path(config)?)?;
    let registry = build_registry(&config)?;

    let message = match message {
        Some(path) => {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read message file: {}", path.display()))?;
            serde_json::from_str::<Message>(&content)
                .with_context(|| format!("Message file must hold a JSON object: {}", path.display()))?
        }
        None => Message::new()
    };

    let bus = MessageBus::start(&config.runtime, Arc::new(registry)).await?;
    let result = bus.process(chain, message, MessageContext::new()).await;
    bus.shutdown().await?;

    let report = result?;
    println!("{}", serde_json::to_string_pretty(&report).context("Failed to serialize report")?);
    Ok(())
}

fn check(config: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(&config_path(config)?)?;
    let registry = build_registry(&config)?;

    for name in registry.names() {
        let chain = registry.resolve(&name)?;
        println!("{} ({} steps, {} fallbacks)", name, chain.len(), chain.exceptional().len());
    }
    Ok(())
}

fn build_registry(config: &AppConfig) -> Result<InMemoryChainRegistry> {
    InMemoryChainRegistry::build(&config.chains, &ReceiverTable::with_builtins(), &AfterActionTable::new())
        .context("Failed to build chains")
}

fn config_path(config: Option<PathBuf>) -> Result<PathBuf> {
    match config {
        Some(path) => Ok(path),
        None => get_config_file_path()
    }
}
