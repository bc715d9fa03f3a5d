// Runtime configuration.
// Defaults, an optional JSON config file, and environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_FALLBACK_SVG;
use crate::cache::ResolveOptions;
use crate::error::{RemoteSvgError, Result};
use crate::fetch::DEFAULT_USER_AGENT;

const ENV_CACHE_DIR: &str = "REMOTE_SVG_CACHE_DIR";
const ENV_FRESHNESS_SECS: &str = "REMOTE_SVG_FRESHNESS_SECS";
const ENV_RESET_INTERVAL_SECS: &str = "REMOTE_SVG_RESET_INTERVAL_SECS";

/// Get the platform cache directory (~/.cache/remote-svg on Linux).
pub fn default_cache_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.cache_dir().to_path_buf())
}

/// Path to the default config file.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.json"))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "remote-svg")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default freshness window for resolves.
    pub freshness_window_secs: u64,
    /// Minimum time between global sweeps.
    pub reset_interval_secs: u64,
    /// Payload served when a resource cannot be retrieved.
    pub fallback_svg: String,
    /// Whether to keep the cache on disk. When false an in-memory store is used.
    pub persist: bool,
    /// Directory holding the store document. Platform default when unset.
    pub cache_dir: Option<PathBuf>,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            freshness_window_secs: 60,
            reset_interval_secs: 10 * 60,
            fallback_svg: DEFAULT_FALLBACK_SVG.to_string(),
            persist: true,
            cache_dir: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or the default location when `None`.
    ///
    /// An explicit path must exist. A missing default file means defaults.
    /// Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Apply overrides looked up through `var`.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(dir) = var(ENV_CACHE_DIR) {
            self.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(secs) = var(ENV_FRESHNESS_SECS) {
            self.freshness_window_secs = parse_secs(ENV_FRESHNESS_SECS, &secs)?;
        }
        if let Some(secs) = var(ENV_RESET_INTERVAL_SECS) {
            self.reset_interval_secs = parse_secs(ENV_RESET_INTERVAL_SECS, &secs)?;
        }
        Ok(())
    }

    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.freshness_window_secs)
    }

    pub fn reset_interval(&self) -> Duration {
        Duration::from_secs(self.reset_interval_secs)
    }

    /// Resolve the cache directory, falling back to the platform default.
    pub fn cache_dir(&self) -> Option<PathBuf> {
        self.cache_dir.clone().or_else(default_cache_dir)
    }

    /// Default per-call options derived from this configuration.
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            freshness: self.freshness_window(),
            cacheable: true,
        }
    }
}

fn parse_secs(name: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| RemoteSvgError::Other(format!("{} must be a whole number of seconds", name)))
}
