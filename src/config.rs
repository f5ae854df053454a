//! Queue configuration.
//!
//! A `QueueConfig` can be built in code or loaded from a TOML file. Missing
//! files and missing keys fall back to defaults so a partial config is
//! always usable.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::Result;

/// Ordering discipline of the ready queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueueMode {
    /// First in, first out.
    #[default]
    Fifo,
    /// Lower priority number dequeues first; FIFO within equal priority.
    Priority,
}

impl std::fmt::Display for QueueMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueMode::Fifo => write!(f, "fifo"),
            QueueMode::Priority => write!(f, "priority"),
        }
    }
}

/// Configuration for a [`TaskQueue`](crate::TaskQueue).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Queue name, used in log output and the default snapshot path.
    pub name: String,
    /// Ready-queue ordering mode.
    pub mode: QueueMode,
    /// Number of concurrent workers (clamped to at least 1 on start).
    pub max_workers: usize,
    /// Write a metadata snapshot after lifecycle events.
    pub persistent: bool,
    /// Snapshot file path; defaults to `.task_queue_<name>.json`.
    pub persistence_file: Option<PathBuf>,
    /// Scheduler tick interval in milliseconds.
    pub tick_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "queue".to_string(),
            mode: QueueMode::Fifo,
            max_workers: 4,
            persistent: false,
            persistence_file: None,
            tick_ms: 100,
        }
    }
}

impl QueueConfig {
    /// Create a config with the given name and defaults for everything else.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Load a config from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        debug!(
            name = %config.name,
            mode = %config.mode,
            max_workers = config.max_workers,
            "config loaded"
        );
        Ok(config)
    }

    /// Save the config as pretty TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Effective snapshot path.
    pub fn snapshot_path(&self) -> PathBuf {
        self.persistence_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!(".task_queue_{}.json", self.name)))
    }

    /// Scheduler tick interval.
    pub fn scheduler_tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Set the ready-queue mode.
    pub fn with_mode(mut self, mode: QueueMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the worker count.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Enable persistence, optionally at an explicit path.
    pub fn with_persistence(mut self, file: Option<PathBuf>) -> Self {
        self.persistent = true;
        self.persistence_file = file;
        self
    }

    /// Set the scheduler tick interval in milliseconds.
    pub fn with_tick_ms(mut self, tick_ms: u64) -> Self {
        self.tick_ms = tick_ms;
        self
    }
}
