//! Configuration loading and management
//!
//! Handles parsing of `.weft.toml` configuration files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::graph::Worker;
use crate::lock::DEFAULT_LOCK_TIMEOUT_MS;

/// Config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".weft.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Tasks configuration
    #[serde(default)]
    pub tasks: TasksConfig,

    /// Agent configuration
    #[serde(default)]
    pub agent: AgentConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            tasks: TasksConfig::default(),
            agent: AgentConfig::default(),
        }
    }
}

/// Store-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store directory, relative to the working directory
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,

    /// Lock acquisition timeout in milliseconds
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_store_dir() -> PathBuf {
    PathBuf::from(".weft")
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// Tasks configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Task ID prefix
    #[serde(default = "default_task_id_prefix")]
    pub id_prefix: String,

    /// Minimum task ID suffix length
    #[serde(default = "default_task_id_min_len")]
    pub id_min_len: usize,

    /// Default worker kind for new tasks
    #[serde(default)]
    pub default_worker: Worker,
}

fn default_task_id_prefix() -> String {
    "wf".to_string()
}

fn default_task_id_min_len() -> usize {
    3
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            id_prefix: default_task_id_prefix(),
            id_min_len: default_task_id_min_len(),
            default_worker: Worker::default(),
        }
    }
}

/// Agent-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Default agent identity when none is specified
    #[serde(default = "default_agent")]
    pub default: String,
}

fn default_agent() -> String {
    "unknown".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            default: default_agent(),
        }
    }
}

impl Config {
    /// Load configuration from a `.weft.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the working directory, or return defaults
    pub fn load_from_dir(dir: &Path) -> Self {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path).unwrap_or_default()
        } else {
            Self::default()
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.store.validate()?;
        self.tasks.validate()?;
        Ok(())
    }
}

impl StoreConfig {
    fn validate(&self) -> Result<()> {
        if self.dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfig(
                "store.dir cannot be empty".to_string(),
            ));
        }
        if self.lock_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "store.lock_timeout_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl TasksConfig {
    fn validate(&self) -> Result<()> {
        let prefix = self.id_prefix.trim();
        if prefix.is_empty() {
            return Err(Error::InvalidConfig(
                "tasks.id_prefix cannot be empty".to_string(),
            ));
        }
        if !prefix.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return Err(Error::InvalidConfig(
                "tasks.id_prefix must be alphanumeric".to_string(),
            ));
        }
        if self.id_min_len < 3 {
            return Err(Error::InvalidConfig(
                "tasks.id_min_len must be >= 3".to_string(),
            ));
        }
        if self.id_min_len > 16 {
            return Err(Error::InvalidConfig(
                "tasks.id_min_len must be <= 16".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.store.dir, PathBuf::from(".weft"));
        assert_eq!(config.store.lock_timeout_ms, DEFAULT_LOCK_TIMEOUT_MS);
        assert_eq!(config.tasks.id_prefix, "wf");
        assert_eq!(config.tasks.id_min_len, 3);
        assert_eq!(config.tasks.default_worker, Worker::Any);
        assert_eq!(config.agent.default, "unknown");
    }

    #[test]
    fn load_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            "[tasks]\nid_prefix = \"job\"\n\n[agent]\ndefault = \"bot-7\"\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.tasks.id_prefix, "job");
        assert_eq!(config.tasks.id_min_len, 3);
        assert_eq!(config.agent.default, "bot-7");
        assert_eq!(config.store.dir, PathBuf::from(".weft"));
    }

    #[test]
    fn load_from_dir_without_file_returns_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_from_dir(temp_dir.path());
        assert_eq!(config.tasks.id_prefix, "wf");
    }

    #[test]
    fn invalid_prefix_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        fs::write(&path, "[tasks]\nid_prefix = \"wf-\"\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn zero_lock_timeout_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        fs::write(&path, "[store]\nlock_timeout_ms = 0\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn save_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);

        let mut config = Config::default();
        config.tasks.id_prefix = "job".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.tasks.id_prefix, "job");
    }
}
