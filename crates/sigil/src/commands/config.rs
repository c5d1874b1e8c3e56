//! Config command - configuration management.

use anyhow::Result;
use clap::{Args, Subcommand};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved configuration
    Show,

    /// Show which config files are loaded and their precedence
    Which,

    /// Initialize a config file with defaults
    Init {
        /// Create project-local config (./sigil.toml) instead of user config
        #[arg(long)]
        local: bool,
    },

    /// Show configuration file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
        ConfigCommand::Init { local } => cmd_init(local),
        ConfigCommand::Path => cmd_path(),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let config = ctx.config();
    let api = config.api();
    let retry = config.retry();
    let session = config.session();
    let cache = config.cache();

    if ctx.json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "server": ctx.server_url(),
                "timeoutSecs": api.timeout_secs,
                "retry": {"maxAttempts": retry.max_attempts, "baseDelayMs": retry.base_delay_ms},
                "dataDir": ctx.data_dir(),
                "identityQueries": session.identity_queries,
                "remember": session.remember,
                "cache": {"maxEntries": cache.max_entries, "ttlSecs": cache.ttl_secs},
            }))?
        );
        return Ok(());
    }

    println!("# Sigil Configuration\n");

    let sources = ctx.loaded.loaded_from();
    if sources.is_empty() {
        println!("No config files loaded (using defaults)\n");
    } else {
        println!("Config files:");
        for source in &sources {
            println!("  {}", source.display());
        }
        println!();
    }

    println!("Server:");
    println!("  url: {}", ctx.server_url());
    println!("  timeout: {}s", api.timeout_secs);
    println!(
        "  retry: {} attempts, {}ms base delay",
        retry.max_attempts, retry.base_delay_ms
    );
    println!();

    println!("Session:");
    println!("  data dir: {}", ctx.data_dir().display());
    println!("  remember: {}", session.remember);
    println!("  identity queries: {}", session.identity_queries.join(", "));
    println!();

    println!("Cache:");
    println!("  max entries: {}", cache.max_entries);
    match cache.ttl_secs {
        Some(ttl) => println!("  ttl: {}s", ttl),
        None => println!("  ttl: none"),
    }

    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    println!("Config file search order (later overrides earlier):\n");

    for source in &ctx.loaded.sources {
        let status = if source.loaded {
            "✓ loaded"
        } else {
            "· not found"
        };
        println!("  {} {}", status, source.path.display());
    }

    println!();
    let loaded_count = ctx.loaded.loaded_from().len();
    if loaded_count == 0 {
        println!("No config files found. Run 'sigil config init' to create one.");
    } else {
        println!("{} config file(s) loaded.", loaded_count);
    }

    Ok(())
}

fn cmd_init(local: bool) -> Result<()> {
    let path = if local {
        std::path::PathBuf::from("sigil.toml")
    } else {
        sigil_config::user_config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
    };

    if path.exists() {
        println!("Config file already exists: {}", path.display());
        return Ok(());
    }

    let defaults = sigil_config::SigilConfig {
        api: Some(Default::default()),
        retry: Some(Default::default()),
        session: Some(Default::default()),
        cache: Some(Default::default()),
        ..Default::default()
    };
    sigil_config::write_config(&defaults, &path)?;

    println!("Created config file: {}", path.display());
    Ok(())
}

fn cmd_path() -> Result<()> {
    if let Some(path) = sigil_config::user_config_path() {
        println!("{}", path.display());
    } else {
        eprintln!("Could not determine config directory");
    }
    Ok(())
}
