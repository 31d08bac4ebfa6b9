//! # AI Gateway CLI (`aigw`)
//!
//! ## Usage
//!
//! ```bash
//! aigw --config ./config/aigw.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `aigw serve` | Start the HTTP gateway |
//! | `aigw providers` | Show which provider credentials are configured |
//!
//! Provider keys are read from `HUGGINGFACE_API_TOKEN`,
//! `GOOGLE_GEMINI_API_KEY` and `OPENROUTER_API_KEY`. Log verbosity follows
//! `RUST_LOG` (default `info`).

use ai_gateway::config::{self, Config, Credentials};
use ai_gateway::gateway::Gateway;
use ai_gateway::server;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// AI Gateway: chat, summarization, OCR, classification, Q&A and RAG behind
/// one HTTP API with provider fallback.
#[derive(Parser)]
#[command(name = "aigw", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// A missing file is not an error: built-in defaults are used.
    #[arg(long, global = true, default_value = "./config/aigw.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway.
    Serve {
        /// Override `[server].bind` (e.g. `0.0.0.0:8080`).
        #[arg(long)]
        bind: Option<String>,
    },

    /// List provider credentials and the capabilities they enable.
    Providers,
}

fn load_or_default(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        tracing::warn!(path = %path.display(), "config file not found; using defaults");
        Ok(Config::default())
    }
}

/// `RUST_LOG` directives, or `info` when none are given.
fn log_filter(directives: &str) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .parse_lossy(directives)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(&directives))
        .init();

    let cli = Cli::parse();
    let mut cfg = load_or_default(&cli.config)?;
    let credentials = Credentials::from_env();

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            tracing::info!(?credentials, "starting gateway");
            let gateway = Arc::new(Gateway::from_config(&cfg, &credentials)?);
            server::run_server(&cfg, gateway).await?;
        }
        Commands::Providers => {
            let gateway = Gateway::from_config(&cfg, &credentials)?;
            println!("{:<12} {:<24} STATUS", "PROVIDER", "ENV VAR");
            for status in &gateway.credentials {
                let state = if status.configured { "configured" } else { "missing" };
                println!("{:<12} {:<24} {}", status.provider, status.env_var, state);
            }
            println!();
            println!("{:<12} STATUS", "CAPABILITY");
            for (capability, ok) in gateway.capability_status() {
                let state = if ok { "available" } else { "not configured" };
                println!("{:<12} {}", capability, state);
            }
        }
    }

    Ok(())
}
