use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{mlog_debug, Error, Result};

pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
pub const DEFAULT_EVENT_BUFFER: usize = 100;

/// User configuration, read from `~/.maestro/maestro.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Upper bound on agent calls in flight at once.
    pub max_concurrency: Option<usize>,
    /// Deadline for a single agent call.
    pub task_timeout_secs: Option<u64>,
    /// Reject plans naming unregistered capabilities before running them.
    #[serde(default)]
    pub strict_capabilities: bool,
    /// Capacity of the progress channel.
    pub event_buffer: Option<usize>,
    /// Directory of `.txt` files for the knowledge agent.
    pub knowledge_dir: Option<String>,
}

impl Config {
    pub fn maestro_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".maestro"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::maestro_dir()?.join("maestro.toml"))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        mlog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            mlog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        mlog_debug!(
            "Config loaded: max_concurrency={:?}, task_timeout_secs={:?}, strict={}",
            config.max_concurrency,
            config.task_timeout_secs,
            config.strict_capabilities
        );
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        mlog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == Some(0) {
            return Err(Error::Config("max_concurrency must be at least 1".to_string()));
        }
        if self.event_buffer == Some(0) {
            return Err(Error::Config("event_buffer must be at least 1".to_string()));
        }
        if self.task_timeout_secs == Some(0) {
            return Err(Error::Config("task_timeout_secs must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn effective_max_concurrency(&self) -> usize {
        self.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY)
    }

    pub fn effective_event_buffer(&self) -> usize {
        self.event_buffer.unwrap_or(DEFAULT_EVENT_BUFFER)
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_secs.map(Duration::from_secs)
    }

    pub fn knowledge_dir(&self) -> Result<PathBuf> {
        match &self.knowledge_dir {
            Some(dir) => Ok(expand_tilde(dir)),
            None => Ok(Self::maestro_dir()?.join("knowledge_base")),
        }
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
