//! Finding and merging config files.
//!
//! Two layers are read, the second overriding the first:
//! 1. The user file, `$SIGIL_CONFIG_DIR/config.toml` or the platform config
//!    directory (`~/.config/sigil/config.toml` on Linux)
//! 2. `sigil.toml` in the project directory
//!
//! Command-line flags are applied by the caller on top of the result.

use std::path::{Path, PathBuf};

use crate::{ConfigError, Result, SigilConfig};

const PROJECT_CONFIG_FILE: &str = "sigil.toml";
const USER_CONFIG_FILE: &str = "config.toml";
const APP_NAME: &str = "sigil";
const CONFIG_DIR_ENV: &str = "SIGIL_CONFIG_DIR";

/// One candidate config file and whether it contributed.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    /// False when the file is missing or failed to parse.
    pub loaded: bool,
}

/// Merged configuration plus the layers that produced it.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: SigilConfig,
    /// Candidate files, lowest precedence first.
    pub sources: Vec<ConfigSource>,
    /// Problems worth surfacing that did not stop loading.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Paths of the files that were merged.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Where the config layers live.
#[derive(Debug, Clone)]
pub struct ConfigLocations {
    /// `None` when no user config directory can be determined.
    pub user: Option<PathBuf>,
    pub project: PathBuf,
}

impl ConfigLocations {
    /// Standard locations, with the project file looked up in `project_dir`
    /// (the working directory when `None`).
    pub fn discover(project_dir: Option<&Path>) -> Self {
        let project = match project_dir {
            Some(dir) => dir.join(PROJECT_CONFIG_FILE),
            None => PathBuf::from(PROJECT_CONFIG_FILE),
        };
        Self {
            user: user_config_path(),
            project,
        }
    }

    /// Read and merge every layer. Unreadable layers become warnings.
    pub fn load(&self) -> LoadedConfig {
        let mut loaded = LoadedConfig {
            config: SigilConfig::new(),
            sources: Vec::with_capacity(2),
            warnings: Vec::new(),
        };

        for path in self.user.iter().chain(std::iter::once(&self.project)) {
            let merged = merge_layer(&mut loaded, path);
            loaded.sources.push(ConfigSource {
                path: path.clone(),
                loaded: merged,
            });
        }

        if loaded.config.session().identity_queries.is_empty() {
            loaded.warnings.push(
                "[session] identity_queries is empty; cached identity data will not refresh after sign-in"
                    .to_string(),
            );
        }
        loaded
    }
}

fn merge_layer(loaded: &mut LoadedConfig, path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    match read_config(path) {
        Ok(layer) => {
            loaded.config.merge(layer);
            true
        }
        Err(e) => {
            loaded
                .warnings
                .push(format!("Failed to load {}: {}", path.display(), e));
            false
        }
    }
}

/// Parse a single config file.
pub fn read_config(path: &Path) -> Result<SigilConfig> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.display().to_string(),
        source,
    })?;
    SigilConfig::from_toml(&contents)
}

/// Write `config` as TOML to `path`, creating missing directories.
pub fn write_config(config: &SigilConfig, path: &Path) -> Result<()> {
    let write_error = |target: &Path, source| ConfigError::WriteFile {
        path: target.display().to_string(),
        source,
    };

    let contents = config.to_toml()?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| write_error(parent, e))?;
    }
    std::fs::write(path, contents).map_err(|e| write_error(path, e))
}

/// The user config file, if a config directory is known.
pub fn user_config_path() -> Option<PathBuf> {
    Some(user_config_dir()?.join(USER_CONFIG_FILE))
}

/// `SIGIL_CONFIG_DIR` when set, otherwise `sigil` under the platform
/// config directory.
pub fn user_config_dir() -> Option<PathBuf> {
    match std::env::var_os(CONFIG_DIR_ENV) {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::config_dir().map(|d| d.join(APP_NAME)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
