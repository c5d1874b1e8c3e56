//! CLI command handlers.

use std::path::PathBuf;

use anyhow::Result;
use sigil_config::{LoadedConfig, SigilConfig};
use sigil_session::SessionContext;

pub mod auth;
pub mod config;

/// Shared context for all commands.
#[derive(Debug)]
pub struct Context {
    /// Merged configuration and where it came from.
    pub loaded: LoadedConfig,
    /// Server URL from `--server`, overriding the config file.
    pub server_url: Option<String>,
    /// Credentials directory from `--data-dir`.
    pub data_dir: Option<PathBuf>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    pub fn config(&self) -> &SigilConfig {
        &self.loaded.config
    }

    /// Application server URL after flag and env overrides.
    pub fn server_url(&self) -> String {
        self.server_url
            .clone()
            .unwrap_or_else(|| self.config().api().effective_url())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| self.config().storage().effective_data_dir())
    }

    /// Wire up storage, cache and client for this invocation.
    pub fn session(&self) -> Result<SessionContext> {
        let ctx = SessionContext::from_config(self.config())
            .base_url(self.server_url())
            .data_dir(self.data_dir())
            .build()?;
        Ok(ctx)
    }
}
