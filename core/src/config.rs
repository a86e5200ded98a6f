//! Configuration accepted by the core
//!
//! The caller owns config discovery (file location, environment, flags);
//! the core only parses a TOML document into [`Config`]. Every field has a
//! default so an empty document is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::filter::MAX_LIMIT;
use crate::retention::{RetentionPolicy, Tier};

/// Default number of source lines shown either side of the error line
pub const DEFAULT_FILE_WINDOW: usize = 5;

/// Default number of recent commits captured
pub const DEFAULT_COMMIT_COUNT: usize = 5;

/// Default timeout for external commands (git, runtimes)
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 300;

/// Files larger than this are not read for context
pub const DEFAULT_MAX_FILE_BYTES: u64 = 2 * 1024 * 1024;

/// Default search result limit
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub context: ContextConfig,
    pub search: SearchConfig,
    pub retention: RetentionConfig,
    pub store: StoreConfig,
}

impl Config {
    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but cannot be used.
    ///
    /// # Errors
    /// Returns [`Error::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if let Some(days) = self.retention.max_age_days {
            if days.checked_mul(SECS_PER_DAY).is_none() {
                return Err(Error::Config(format!(
                    "retention.max_age_days {} is too large",
                    days
                )));
            }
        }
        let limit = self.search.default_limit;
        if limit == 0 || limit > MAX_LIMIT {
            return Err(Error::Config(format!(
                "search.default_limit {} must be between 1 and {}",
                limit, MAX_LIMIT
            )));
        }
        Ok(())
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if the file cannot be read and
    /// [`Error::Config`] if it does not parse.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

/// Where extra pattern definitions come from.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Optional TOML catalog appended after the builtin patterns
    pub path: Option<PathBuf>,
}

/// Context extraction limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub file_window: usize,
    pub commit_count: usize,
    pub command_timeout_ms: u64,
    pub max_file_bytes: u64,
    /// Version-control executable
    pub vcs_binary: String,
    /// Maximum directory depth when searching for a file by name
    pub search_depth: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            file_window: DEFAULT_FILE_WINDOW,
            commit_count: DEFAULT_COMMIT_COUNT,
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            vcs_binary: "git".to_string(),
            search_depth: 6,
        }
    }
}

impl ContextConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

/// Full-text tokenization and query options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Treat the last query token as a prefix
    pub prefix: bool,
    /// Use the porter stemmer in the FTS index (fixed at store creation)
    pub porter: bool,
    pub default_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            prefix: true,
            porter: false,
            default_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

/// Retention settings; explicit values override the tier defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub tier: Tier,
    pub max_age_days: Option<u64>,
    pub max_records: Option<u64>,
}

impl RetentionConfig {
    /// Resolve the effective retention policy.
    ///
    /// An age too large to represent saturates, keeping everything.
    pub fn policy(&self) -> RetentionPolicy {
        let mut policy = RetentionPolicy::for_tier(self.tier);
        if let Some(days) = self.max_age_days {
            policy.max_age = Duration::from_secs(days.saturating_mul(SECS_PER_DAY));
        }
        if let Some(max) = self.max_records {
            policy.max_record_count = Some(max);
        }
        policy
    }
}

/// Store location.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    /// Configured path, or `<data dir>/tracelens/tracelens.db`.
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_store_path)
    }
}

fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .map(|d| d.join("tracelens"))
        .unwrap_or_else(|| PathBuf::from("/tmp/tracelens"))
        .join("tracelens.db")
}
