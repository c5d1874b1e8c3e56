//! Sigil - session and auth-token manager for GraphQL applications
//!
//! Main entry point for the Sigil CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{auth, config};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Sigil - session and auth-token manager for GraphQL applications
#[derive(Parser)]
#[command(name = "sigil")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Application server URL (default: http://localhost:3000)
    #[arg(long, global = true, env = "SIGIL_API_URL")]
    pub server: Option<String>,

    /// Directory holding remembered credentials
    #[arg(long, global = true, env = "SIGIL_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in, sign up, sign out and inspect the session
    Auth(auth::AuthArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "sigil=debug,sigil_session=debug,sigil_client=debug,sigil_config=debug,info"
    } else {
        "sigil=info,sigil_session=warn,sigil_client=warn,warn"
    };

    let log_dir = sigil_config::user_config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "sigil.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "sigil=trace,sigil_session=trace,sigil_client=trace,sigil_config=trace,info",
                )),
        )
        .init();

    let project_dir = std::env::current_dir().ok();
    let loaded = sigil_config::ConfigLocations::discover(project_dir.as_deref()).load();
    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }
    loaded.config.validate()?;

    // Create context for commands
    let ctx = commands::Context {
        loaded,
        server_url: cli.server,
        data_dir: cli.data_dir,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    // Dispatch to command handlers
    match cli.command {
        Commands::Auth(args) => auth::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
