//! Configuration module for shelfmirror.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! file, with loading, validation, defaults, and a builder for programmatic
//! and test use.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ports::remote_store::DateField;

/// What to do when a local file exists but its created timestamp does not
/// match the remote one (and no date thresholds are configured).
///
/// This is the explicit policy flag resolving the skip-vs-redownload
/// ambiguity: `skip` keeps the local copy and logs the discrepancy,
/// `redownload` fetches the remote version again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MismatchPolicy {
    /// Keep the local copy; log the timestamp discrepancy
    #[default]
    Skip,
    /// Re-download the remote copy
    Redownload,
}

/// Top-level configuration for shelfmirror.
///
/// Every section is optional in the YAML file; missing sections and fields
/// fall back to their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub sync: SyncConfig,
    pub filter: FilterConfig,
    pub dates: DateFilterConfig,
    pub logging: LoggingConfig,
}

/// Remote site settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the remote site, e.g. `https://acme.example.com/sites/acme`.
    pub site_url: String,
    /// Name of the environment variable holding the bearer token.
    pub token_env: String,
    /// Page size for listing requests.
    pub page_size: u32,
    /// Row cap for date-range queries; the store refuses result sets
    /// larger than its own view threshold, typically 5000.
    pub row_limit: u32,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Root directory of the local mirror.
    pub local_root: PathBuf,
    /// Optional explicit starting subtree: a server-relative folder path
    /// or a library title. Explicit targets bypass the name filter.
    pub start_path: Option<String>,
    /// Maximum simultaneous remote operations (downloads and listings).
    pub concurrency: usize,
    /// Policy when a local created timestamp disagrees with the remote one.
    pub on_created_mismatch: MismatchPolicy,
}

/// Name filter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Token a library title or folder name must contain to be in scope.
    pub token: String,
}

/// Date filter and range-partitioning settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DateFilterConfig {
    /// Re-download files whose remote created stamp is strictly newer.
    pub created_after: Option<DateTime<Utc>>,
    /// Re-download files whose remote modified stamp is strictly newer.
    pub modified_after: Option<DateTime<Utc>>,
    /// Overall range start for windowed (ranged-mode) runs.
    pub range_start: Option<DateTime<Utc>>,
    /// Overall range end (exclusive) for windowed runs.
    pub range_end: Option<DateTime<Utc>>,
    /// Initial window step in minutes for ranged mode.
    pub step_minutes: Option<i64>,
    /// Which remote date column ranged-mode queries filter on.
    pub field: Option<DateField>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Console log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Path to the persistent run log file.
    pub file: PathBuf,
}

/// Default initial step for ranged mode: one day.
pub const DEFAULT_STEP_MINUTES: i64 = 1440;

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/shelfmirror/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("shelfmirror")
            .join("config.yaml")
    }

    /// Whether a windowed (ranged-mode) run is configured.
    pub fn has_date_range(&self) -> bool {
        self.dates.range_start.is_some() && self.dates.range_end.is_some()
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            site_url: String::new(),
            token_env: "SHELFMIRROR_TOKEN".to_string(),
            page_size: 500,
            row_limit: 5000,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            local_root: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("ShelfMirror"),
            start_path: None,
            concurrency: 8,
            on_created_mismatch: MismatchPolicy::Skip,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            token: "_".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("shelfmirror");
        Self {
            level: "info".to_string(),
            file: data_dir.join("shelfmirror.log"),
        }
    }
}

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.concurrency"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- remote ---
        if self.remote.site_url.is_empty() {
            errors.push(ValidationError {
                field: "remote.site_url".into(),
                message: "must not be empty".into(),
            });
        }
        if self.remote.token_env.is_empty() {
            errors.push(ValidationError {
                field: "remote.token_env".into(),
                message: "must not be empty".into(),
            });
        }
        if self.remote.page_size == 0 {
            errors.push(ValidationError {
                field: "remote.page_size".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.remote.row_limit == 0 {
            errors.push(ValidationError {
                field: "remote.row_limit".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- sync ---
        if self.sync.concurrency == 0 || self.sync.concurrency > 64 {
            errors.push(ValidationError {
                field: "sync.concurrency".into(),
                message: "must be in range 1..=64".into(),
            });
        }

        // --- filter ---
        if self.filter.token.is_empty() {
            errors.push(ValidationError {
                field: "filter.token".into(),
                message: "must not be empty".into(),
            });
        }

        // --- dates ---
        match (self.dates.range_start, self.dates.range_end) {
            (Some(start), Some(end)) => {
                if start >= end {
                    errors.push(ValidationError {
                        field: "dates.range_start".into(),
                        message: "range_start must be before range_end".into(),
                    });
                }
            }
            (Some(_), None) | (None, Some(_)) => {
                errors.push(ValidationError {
                    field: "dates.range_start".into(),
                    message: "range_start and range_end must be set together".into(),
                });
            }
            (None, None) => {}
        }
        if let Some(step) = self.dates.step_minutes {
            if step < 1 {
                errors.push(ValidationError {
                    field: "dates.step_minutes".into(),
                    message: "must be at least 1".into(),
                });
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- remote ---

    pub fn site_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.site_url = url.into();
        self
    }

    pub fn token_env(mut self, var: impl Into<String>) -> Self {
        self.config.remote.token_env = var.into();
        self
    }

    pub fn page_size(mut self, n: u32) -> Self {
        self.config.remote.page_size = n;
        self
    }

    pub fn row_limit(mut self, n: u32) -> Self {
        self.config.remote.row_limit = n;
        self
    }

    // --- sync ---

    pub fn local_root(mut self, root: PathBuf) -> Self {
        self.config.sync.local_root = root;
        self
    }

    pub fn start_path(mut self, path: impl Into<String>) -> Self {
        self.config.sync.start_path = Some(path.into());
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.sync.concurrency = n;
        self
    }

    pub fn on_created_mismatch(mut self, policy: MismatchPolicy) -> Self {
        self.config.sync.on_created_mismatch = policy;
        self
    }

    // --- filter ---

    pub fn filter_token(mut self, token: impl Into<String>) -> Self {
        self.config.filter.token = token.into();
        self
    }

    // --- dates ---

    pub fn created_after(mut self, t: DateTime<Utc>) -> Self {
        self.config.dates.created_after = Some(t);
        self
    }

    pub fn modified_after(mut self, t: DateTime<Utc>) -> Self {
        self.config.dates.modified_after = Some(t);
        self
    }

    pub fn date_range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.config.dates.range_start = Some(start);
        self.config.dates.range_end = Some(end);
        self
    }

    pub fn step_minutes(mut self, minutes: i64) -> Self {
        self.config.dates.step_minutes = Some(minutes);
        self
    }

    pub fn date_field(mut self, field: DateField) -> Self {
        self.config.dates.field = Some(field);
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_file(mut self, file: PathBuf) -> Self {
        self.config.logging.file = file;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
