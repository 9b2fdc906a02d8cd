//! Sync command - run one mirror pass
//!
//! Provides the `shelfmirror sync` CLI command which:
//! 1. Loads configuration and applies flag overrides
//! 2. Reads the bearer token from the environment variable named in config
//! 3. Opens the persistent run log and wires up the adapters
//! 4. Runs the SyncEngine and prints the run summary
//!
//! The process exits non-zero only when the run itself fails (setup or an
//! unexpected query error); per-item failures are reported in the summary
//! and still exit zero.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use tracing::info;

use shelfmirror_core::config::Config;
use shelfmirror_core::ports::remote_store::DateField;

fn parse_utc(s: &str) -> Result<DateTime<Utc>, String> {
    s.parse::<DateTime<Utc>>()
        .map_err(|e| format!("invalid timestamp '{s}': {e}"))
}

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Start from this folder path or library title (bypasses the name filter)
    #[arg(long)]
    pub start_path: Option<String>,

    /// Local mirror root directory
    #[arg(long)]
    pub local_root: Option<PathBuf>,

    /// Maximum simultaneous remote operations
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Re-download files created after this instant (RFC 3339)
    #[arg(long, value_parser = parse_utc)]
    pub created_after: Option<DateTime<Utc>>,

    /// Re-download files modified after this instant (RFC 3339)
    #[arg(long, value_parser = parse_utc)]
    pub modified_after: Option<DateTime<Utc>>,

    /// Ranged mode: overall range start (RFC 3339)
    #[arg(long, value_parser = parse_utc, requires = "range_end")]
    pub range_start: Option<DateTime<Utc>>,

    /// Ranged mode: overall range end, exclusive (RFC 3339)
    #[arg(long, value_parser = parse_utc, requires = "range_start")]
    pub range_end: Option<DateTime<Utc>>,

    /// Ranged mode: initial window step in minutes
    #[arg(long)]
    pub step_minutes: Option<i64>,

    /// Ranged mode: date column to query (created or modified)
    #[arg(long, value_parser = parse_field)]
    pub field: Option<DateField>,
}

fn parse_field(s: &str) -> Result<DateField, String> {
    match s.to_lowercase().as_str() {
        "created" => Ok(DateField::Created),
        "modified" => Ok(DateField::Modified),
        other => Err(format!("invalid field '{other}'; use 'created' or 'modified'")),
    }
}

impl SyncCommand {
    /// Execute the sync command
    pub async fn execute(&self, config_path: &Path) -> Result<()> {
        use shelfmirror_remote::{SpClient, SpRemoteStore};
        use shelfmirror_sync::engine::SyncEngine;
        use shelfmirror_sync::filesystem::LocalStoreAdapter;
        use shelfmirror_sync::runlog::FileSyncLog;

        let mut config = Config::load_or_default(config_path);
        self.apply_overrides(&mut config);

        let errors = config.validate();
        if !errors.is_empty() {
            for error in &errors {
                eprintln!("config error: {error}");
            }
            anyhow::bail!("invalid configuration ({} error(s))", errors.len());
        }

        info!(config_path = %config_path.display(), "Loaded configuration");

        let token = std::env::var(&config.remote.token_env).with_context(|| {
            format!(
                "bearer token not found in environment variable '{}'",
                config.remote.token_env
            )
        })?;

        let run_log = Arc::new(
            FileSyncLog::open(&config.logging.file).with_context(|| {
                format!("cannot open run log '{}'", config.logging.file.display())
            })?,
        );

        let client = SpClient::new(&config.remote.site_url, token)?;
        let remote = Arc::new(SpRemoteStore::new(client, config.remote.page_size));
        let local = Arc::new(LocalStoreAdapter::new());

        let engine = Arc::new(SyncEngine::new(remote, local, run_log, &config));
        let report = engine.run().await?;

        println!(
            "Downloaded {}, skipped {}, visited {} folder(s), pruned {}, {} window(s) skipped, {} error(s) in {} ms",
            report.files_downloaded,
            report.files_skipped,
            report.folders_visited,
            report.folders_pruned,
            report.windows_skipped,
            report.errors.len(),
            report.duration_ms
        );
        if report.has_errors() {
            eprintln!(
                "{} item(s) failed; see '{}' for details",
                report.errors.len(),
                config.logging.file.display()
            );
        }
        Ok(())
    }

    fn apply_overrides(&self, config: &mut Config) {
        if let Some(start_path) = &self.start_path {
            config.sync.start_path = Some(start_path.clone());
        }
        if let Some(local_root) = &self.local_root {
            config.sync.local_root = local_root.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.sync.concurrency = concurrency;
        }
        if let Some(t) = self.created_after {
            config.dates.created_after = Some(t);
        }
        if let Some(t) = self.modified_after {
            config.dates.modified_after = Some(t);
        }
        if let Some(t) = self.range_start {
            config.dates.range_start = Some(t);
        }
        if let Some(t) = self.range_end {
            config.dates.range_end = Some(t);
        }
        if let Some(step) = self.step_minutes {
            config.dates.step_minutes = Some(step);
        }
        if let Some(field) = self.field {
            config.dates.field = Some(field);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> SyncCommand {
        SyncCommand {
            start_path: None,
            local_root: None,
            concurrency: None,
            created_after: None,
            modified_after: None,
            range_start: None,
            range_end: None,
            step_minutes: None,
            field: None,
        }
    }

    #[test]
    fn test_overrides_replace_config_values() {
        let mut config = Config::default();
        let cmd = SyncCommand {
            start_path: Some("Proj_Lib".to_string()),
            local_root: Some(PathBuf::from("/srv/mirror")),
            concurrency: Some(12),
            modified_after: Some("2024-05-01T00:00:00Z".parse().unwrap()),
            ..command()
        };

        cmd.apply_overrides(&mut config);
        assert_eq!(config.sync.start_path.as_deref(), Some("Proj_Lib"));
        assert_eq!(config.sync.local_root, PathBuf::from("/srv/mirror"));
        assert_eq!(config.sync.concurrency, 12);
        assert!(config.dates.modified_after.is_some());
    }

    #[test]
    fn test_no_overrides_leave_config_alone() {
        let mut config = Config::default();
        let before = config.sync.concurrency;
        command().apply_overrides(&mut config);
        assert_eq!(config.sync.concurrency, before);
        assert!(config.sync.start_path.is_none());
    }

    #[test]
    fn test_parse_utc_accepts_rfc3339() {
        assert!(parse_utc("2024-01-01T00:00:00Z").is_ok());
        assert!(parse_utc("yesterday").is_err());
    }

    #[test]
    fn test_parse_field() {
        assert_eq!(parse_field("created"), Ok(DateField::Created));
        assert_eq!(parse_field("Modified"), Ok(DateField::Modified));
        assert!(parse_field("size").is_err());
    }
}
