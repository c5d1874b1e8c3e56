//! Configuration system for the Sigil session client.
//!
//! Provides TOML-based configuration with:
//! - API endpoint and transport settings (`[api]`, `[retry]`)
//! - Token storage location (`[storage]`)
//! - Session behavior such as identity-dependent queries (`[session]`)
//! - Request cache sizing (`[cache]`)
//! - Config file layering (XDG user config + project-local overrides)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigLocations, ConfigSource, LoadedConfig, read_config, user_config_dir, user_config_path,
    write_config,
};
pub use error::{ConfigError, Result};
pub use types::*;
