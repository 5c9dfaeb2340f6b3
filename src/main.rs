//! Backhaul CLI - Drive tunnel providers from the command line
//!
//! Validate provider configurations and run a provider with a set of
//! forwarding rules for manual verification.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use backhaul_provider::{NoopFactory, Protocol, ProviderRegistry};
use backhaul_ssh::SshProviderFactory;

/// Backhaul - Expose private TCP services through remote tunnel hosts
#[derive(Parser, Debug)]
#[command(name = "backhaul")]
#[command(about = "Expose private TCP services through remote tunnel hosts")]
#[command(version = env!("GIT_TAG"))]
#[command(long_version = concat!(env!("GIT_TAG"), "\nCommit: ", env!("GIT_HASH"), "\nBuilt: ", env!("BUILD_TIME")))]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available provider transports
    Providers,

    /// Validate a provider configuration without connecting
    Check {
        /// Provider transport name (see `backhaul providers`)
        #[arg(long, default_value = "ssh")]
        provider: String,

        /// Configuration JSON, or @path to read it from a file
        #[arg(long, env = "BACKHAUL_CONFIG")]
        config: String,
    },

    /// Run a provider and keep its forwarding rules up until Ctrl+C
    #[command(long_about = r#"
Construct a provider, start it and register forwarding rules, then relay
inbound tunnel connections to their private destinations until Ctrl+C.

EXAMPLES:
  # Expose a private web server on port 8080 of the tunnel host
  backhaul run --provider ssh \
    --config @tunnel.json \
    --forward 192.168.1.50:80:8080

  # Multiple rules over one session
  backhaul run --config @tunnel.json \
    --forward 10.0.0.5:22:2222 \
    --forward 10.0.0.5:5432:15432

ENVIRONMENT VARIABLES:
  BACKHAUL_CONFIG  Configuration JSON or @path to a file
    "#)]
    Run {
        /// Provider transport name (see `backhaul providers`)
        #[arg(long, default_value = "ssh")]
        provider: String,

        /// Configuration JSON, or @path to read it from a file
        #[arg(long, env = "BACKHAUL_CONFIG")]
        config: String,

        /// Forwarding rule as sourceIP:sourcePort:destPort (repeatable)
        #[arg(long = "forward")]
        forwards: Vec<String>,
    },
}

/// Setup logging with the specified log level
fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();
}

fn build_registry() -> ProviderRegistry {
    ProviderRegistry::new()
        .with_factory(Arc::new(SshProviderFactory))
        .with_factory(Arc::new(NoopFactory))
}

/// Resolve `@path` config references to file contents
fn load_config(config: &str) -> Result<String> {
    if let Some(path) = config.strip_prefix('@') {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path))
    } else {
        Ok(config.to_string())
    }
}

/// Parse a forward spec of the form sourceIP:sourcePort:destPort
fn parse_forward(spec: &str) -> Result<(String, u16, u16)> {
    let parts: Vec<&str> = spec.rsplitn(3, ':').collect();
    if parts.len() != 3 || parts[2].is_empty() {
        anyhow::bail!(
            "Invalid forward '{}'. Expected sourceIP:sourcePort:destPort",
            spec
        );
    }
    let dest_port: u16 = parts[0].parse().with_context(|| {
        format!("Invalid destination port '{}' in forward '{}'", parts[0], spec)
    })?;
    let source_port: u16 = parts[1]
        .parse()
        .with_context(|| format!("Invalid source port '{}' in forward '{}'", parts[1], spec))?;
    Ok((parts[2].to_string(), source_port, dest_port))
}

fn handle_providers(registry: &ProviderRegistry) {
    println!("Available providers ({})", registry.len());
    for name in registry.names() {
        println!("  {}", name);
    }
}

fn handle_check(registry: &ProviderRegistry, provider: &str, config: &str) -> Result<()> {
    let factory = registry.get(provider).with_context(|| {
        format!(
            "Unknown provider '{}'. Available: {}",
            provider,
            registry.names().join(", ")
        )
    })?;

    let raw = load_config(config)?;
    let result = factory.check_config(&raw);

    if result.success {
        println!("✅ Configuration is valid");
        Ok(())
    } else {
        match result.message {
            Some(message) => println!("❌ {}", message),
            None => println!("❌ Configuration is invalid"),
        }
        std::process::exit(1);
    }
}

async fn handle_run(
    registry: &ProviderRegistry,
    provider_name: &str,
    config: &str,
    forwards: &[String],
) -> Result<()> {
    let factory = registry.get(provider_name).with_context(|| {
        format!(
            "Unknown provider '{}'. Available: {}",
            provider_name,
            registry.names().join(", ")
        )
    })?;

    let raw = load_config(config)?;

    // Parse every forward before any network work happens
    let mut rules = Vec::new();
    for spec in forwards {
        rules.push(parse_forward(spec)?);
    }

    let provider = factory
        .create(&raw)
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    info!("Starting provider '{}'...", provider_name);
    if !provider.start().await {
        for entry in provider.logs() {
            eprintln!("{}", entry);
        }
        anyhow::bail!("Provider failed to start");
    }

    for (source_ip, source_port, dest_port) in rules {
        if let Err(e) = provider
            .add_connection(&source_ip, source_port, dest_port, Protocol::Tcp)
            .await
        {
            error!(
                "Failed to add forward {}:{} -> remote port {}: {}",
                source_ip, source_port, dest_port, e
            );
            provider.stop().await;
            anyhow::bail!("Forward registration failed");
        }
        info!(
            "Forwarding remote port {} to {}:{}",
            dest_port, source_ip, source_port
        );
    }

    info!("Provider is running. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Received Ctrl+C, shutting down...");

    if !provider.stop().await {
        warn!("Provider did not stop cleanly");
    }

    println!();
    println!("Event log:");
    for entry in provider.logs() {
        println!("  {}", entry);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let registry = build_registry();

    match cli.command {
        Commands::Providers => {
            handle_providers(&registry);
            Ok(())
        }
        Commands::Check { provider, config } => handle_check(&registry, &provider, &config),
        Commands::Run {
            provider,
            config,
            forwards,
        } => handle_run(&registry, &provider, &config, &forwards).await,
    }
}
