//! Configuration for tinyconsole.
//!
//! Loaded from `~/.tinyconsole/config.toml`. Every key is optional:
//!
//! ```toml
//! # Terminal type for capability lookup (defaults to $TERM)
//! terminal = "xterm-256color"
//!
//! # Use escape codes even on a Windows console
//! force_ansi = false
//!
//! # Log filter when RUST_LOG is not set
//! log_level = "info"
//!
//! [cursor_query]
//! first_timeout_ds = 100
//! timeout_ds = 10
//! scan_capacity = 256
//!
//! # Capability overrides, by terminfo name
//! [capabilities]
//! cup = "\u001b[%i%p1%d;%p2%dH"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::cpr::{QueryTiming, DEFAULT_SCAN_CAPACITY};
use crate::term::caps::{default_terminal_name, TerminalCapabilities};

/// Bounds applied to `cursor_query.scan_capacity`.
pub const MIN_SCAN_CAPACITY: usize = 16;
pub const MAX_SCAN_CAPACITY: usize = 4096;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Terminal type, overriding `TERM`
    pub terminal: Option<String>,
    /// Prefer the ANSI backend on Windows
    pub force_ansi: bool,
    /// Default log filter
    pub log_level: String,
    /// Cursor position query tuning
    pub cursor_query: CursorQueryConfig,
    /// Capability template overrides
    pub capabilities: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            terminal: None,
            force_ansi: false,
            log_level: "info".to_string(),
            cursor_query: CursorQueryConfig::default(),
            capabilities: BTreeMap::new(),
        }
    }
}

/// Cursor query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorQueryConfig {
    /// Deciseconds to wait on the first query of the process
    pub first_timeout_ds: u8,
    /// Deciseconds to wait on later queries
    pub timeout_ds: u8,
    /// Longest reply candidate, in tokens
    pub scan_capacity: usize,
}

impl Default for CursorQueryConfig {
    fn default() -> Self {
        let timing = QueryTiming::default();
        Self {
            first_timeout_ds: timing.first_timeout_ds,
            timeout_ds: timing.timeout_ds,
            scan_capacity: DEFAULT_SCAN_CAPACITY,
        }
    }
}

impl CursorQueryConfig {
    pub fn timing(&self) -> QueryTiming {
        QueryTiming {
            first_timeout_ds: self.first_timeout_ds,
            timeout_ds: self.timeout_ds,
        }
    }

    pub fn scan_capacity(&self) -> usize {
        self.scan_capacity
            .clamp(MIN_SCAN_CAPACITY, MAX_SCAN_CAPACITY)
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => {
                debug!(path = %path.display(), "configuration loaded");
                config
            }
            Err(e) => {
                warn!(error = %e, "using default configuration");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// `~/.tinyconsole`, created on first use
    pub fn config_dir() -> Option<PathBuf> {
        let dir = home_dir()?.join(".tinyconsole");
        if !dir.exists() {
            let _ = fs::create_dir_all(&dir);
        }
        Some(dir)
    }

    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Configured terminal type, else the environment's.
    pub fn terminal_name(&self) -> String {
        self.terminal
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(default_terminal_name)
    }

    /// Built-in capabilities for the terminal with the overrides applied.
    pub fn capabilities(&self) -> TerminalCapabilities {
        TerminalCapabilities::builtin(&self.terminal_name()).with_overrides(&self.capabilities)
    }
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}
