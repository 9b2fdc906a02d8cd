//! Download synchronization engine
//!
//! The [`SyncEngine`] orchestrates one mirror run against the remote
//! document store. Two modes share the same per-file pipeline:
//!
//! 1. **Tree mode**: resolve the sync roots (an explicit start path, or
//!    every library whose title passes the name filter), then walk each
//!    subtree level by level, filtering folder names, stamping
//!    directories, and scheduling file downloads.
//! 2. **Ranged mode** (an overall date range is configured): per in-scope
//!    library, drive the [`DateRangePartitioner`] over the range; the
//!    engine acts as the partitioner's sink, reconciling ancestor
//!    directories before each file goes through the same skip/download
//!    decision.
//!
//! ## Failure handling
//!
//! Root resolution and the first listing of each root are fatal; anything
//! deeper is isolated per item. A failed download or directory creation
//! is logged as ERROR, counted, and abandoned; its siblings and the rest
//! of the run continue. There is no in-run retry: the next run re-detects
//! the absent file and tries again.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::Context;
use tracing::debug;

use shelfmirror_core::{
    config::{Config, DateFilterConfig, DEFAULT_STEP_MINUTES},
    domain::{
        remote_item::{FileEntry, FolderEntry, LibraryEntry, RemoteItem},
        window::TimeWindow,
    },
    ports::{
        local_store::ILocalStore,
        remote_store::{DateField, IRemoteStore, ItemTimes},
        run_log::ISyncLog,
    },
};

use crate::{
    filter::NameFilter,
    inspector::{DateThresholds, Decision, LocalStateInspector},
    partition::{DateRangePartitioner, WindowSink},
    scheduler::DownloadScheduler,
    SyncError,
};

// ============================================================================
// Run counters and report
// ============================================================================

/// Shared counters incremented by concurrent tasks during a run
#[derive(Debug, Default)]
struct RunCounters {
    downloaded: AtomicU64,
    skipped: AtomicU64,
    folders_visited: AtomicU64,
    folders_pruned: AtomicU64,
    windows_skipped: AtomicU64,
    errors: Mutex<Vec<String>>,
}

impl RunCounters {
    fn record_error(&self, message: String) {
        match self.errors.lock() {
            Ok(mut errors) => errors.push(message),
            Err(poisoned) => poisoned.into_inner().push(message),
        }
    }

    fn snapshot(&self, duration: Duration) -> SyncReport {
        let errors = match self.errors.lock() {
            Ok(errors) => errors.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        SyncReport {
            files_downloaded: self.downloaded.load(Ordering::Relaxed),
            files_skipped: self.skipped.load(Ordering::Relaxed),
            folders_visited: self.folders_visited.load(Ordering::Relaxed),
            folders_pruned: self.folders_pruned.load(Ordering::Relaxed),
            windows_skipped: self.windows_skipped.load(Ordering::Relaxed),
            errors,
            duration_ms: duration.as_millis() as u64,
        }
    }
}

/// Summary of a completed mirror run
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Files whose content was fetched and written
    pub files_downloaded: u64,
    /// Files left alone by the skip decision
    pub files_skipped: u64,
    /// Folders entered (created or revisited)
    pub folders_visited: u64,
    /// Folders rejected by the name filter, subtree and all
    pub folders_pruned: u64,
    /// Date windows abandoned at the split floor
    pub windows_skipped: u64,
    /// Per-item errors encountered (non-fatal)
    pub errors: Vec<String>,
    /// Wall-clock duration of the run in milliseconds
    pub duration_ms: u64,
}

impl SyncReport {
    /// Whether any per-item failure was recorded
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

// ============================================================================
// SyncEngine
// ============================================================================

/// A resolved sync root: where to start on the remote and what to call
/// the corresponding directory under the local mirror root.
struct RootTarget {
    remote_path: String,
    local_name: String,
    times: ItemTimes,
}

/// Download-only mirror engine
///
/// Shared across spawned tasks via `Arc`; the only mutable state is the
/// counter block, the run log, and the scheduler's permit pool.
pub struct SyncEngine {
    remote: Arc<dyn IRemoteStore>,
    local: Arc<dyn ILocalStore>,
    log: Arc<dyn ISyncLog>,
    scheduler: DownloadScheduler,
    filter: NameFilter,
    inspector: LocalStateInspector,
    local_root: PathBuf,
    start_path: Option<String>,
    dates: DateFilterConfig,
    row_limit: u32,
    counters: RunCounters,
}

impl SyncEngine {
    /// Creates an engine wired to the given adapters and configuration
    pub fn new(
        remote: Arc<dyn IRemoteStore>,
        local: Arc<dyn ILocalStore>,
        log: Arc<dyn ISyncLog>,
        config: &Config,
    ) -> Self {
        let thresholds = DateThresholds::from_config(&config.dates);
        Self {
            remote,
            local,
            log,
            scheduler: DownloadScheduler::new(config.sync.concurrency),
            filter: NameFilter::new(config.filter.token.clone()),
            inspector: LocalStateInspector::new(thresholds, config.sync.on_created_mismatch),
            local_root: config.sync.local_root.clone(),
            start_path: config.sync.start_path.clone(),
            dates: config.dates.clone(),
            row_limit: config.remote.row_limit,
            counters: RunCounters::default(),
        }
    }

    /// Runs one full mirror pass and returns the run summary
    ///
    /// `Err` means a setup failure or an unexpected query failure; the
    /// run did not complete. Per-item failures never surface here, they
    /// are collected in [`SyncReport::errors`].
    pub async fn run(self: Arc<Self>) -> anyhow::Result<SyncReport> {
        let started = std::time::Instant::now();

        self.local
            .create_dir(&self.local_root)
            .await
            .map_err(|_| SyncError::LocalRootUnusable(self.local_root.clone()))
            .context("cannot prepare local mirror root")?;

        match self.configured_window()? {
            Some(window) => self.run_ranged(window).await?,
            None => self.run_tree().await?,
        }

        let report = self.counters.snapshot(started.elapsed());
        self.log.info(
            true,
            &format!(
                "Sync complete: {} downloaded, {} skipped, {} folder(s) pruned, {} error(s), {} ms",
                report.files_downloaded,
                report.files_skipped,
                report.folders_pruned,
                report.errors.len(),
                report.duration_ms
            ),
        );
        Ok(report)
    }

    /// The overall range window when ranged mode is configured
    fn configured_window(&self) -> anyhow::Result<Option<TimeWindow>> {
        match (self.dates.range_start, self.dates.range_end) {
            (Some(start), Some(end)) => {
                let step = self.dates.step_minutes.unwrap_or(DEFAULT_STEP_MINUTES);
                let window = TimeWindow::new(start, end, step)
                    .map_err(SyncError::from)
                    .context("invalid date range configuration")?;
                Ok(Some(window))
            }
            _ => Ok(None),
        }
    }

    // ========================================================================
    // Tree mode
    // ========================================================================

    async fn run_tree(self: &Arc<Self>) -> anyhow::Result<()> {
        let roots = self.resolve_roots().await?;
        if roots.is_empty() {
            self.log
                .info(true, "No libraries match the name filter; nothing to do");
            return Ok(());
        }

        for root in roots {
            let local_dir = self.local_root.join(&root.local_name);
            self.local
                .create_dir(&local_dir)
                .await
                .with_context(|| format!("cannot create sync root '{}'", local_dir.display()))?;

            // The first listing of a root is setup work; its failure
            // aborts the run, unlike listings further down.
            let children = {
                let _permit = self.scheduler.acquire().await?;
                self.remote
                    .list_children(&root.remote_path)
                    .await
                    .with_context(|| format!("cannot list sync root '{}'", root.remote_path))?
            };

            self.counters.folders_visited.fetch_add(1, Ordering::Relaxed);
            self.log.info(
                true,
                &format!(
                    "Syncing '{}' into '{}'",
                    root.remote_path,
                    local_dir.display()
                ),
            );

            self.process_children(children, &local_dir).await;

            if let Err(e) = self
                .local
                .set_timestamps(&local_dir, root.times.created, root.times.modified)
                .await
            {
                self.log.warning(
                    false,
                    &format!("Could not stamp '{}': {e:#}", local_dir.display()),
                );
            }
        }
        Ok(())
    }

    /// Resolves where the run starts
    ///
    /// An explicit start path bypasses the name filter and may name
    /// either a folder (by server-relative path) or a library (by
    /// title); folder classification is tried first. With no start path,
    /// every library whose title passes the filter becomes a root.
    async fn resolve_roots(&self) -> anyhow::Result<Vec<RootTarget>> {
        if let Some(start) = &self.start_path {
            let folder = {
                let _permit = self.scheduler.acquire().await?;
                self.remote
                    .get_folder(start)
                    .await
                    .with_context(|| format!("cannot classify start path '{start}'"))?
            };
            if let Some(folder) = folder {
                return Ok(vec![RootTarget {
                    local_name: folder.name.clone(),
                    times: ItemTimes {
                        created: folder.created,
                        modified: folder.modified,
                    },
                    remote_path: folder.server_relative_path,
                }]);
            }

            let library = {
                let _permit = self.scheduler.acquire().await?;
                self.remote
                    .get_library(start)
                    .await
                    .with_context(|| format!("cannot classify start path '{start}'"))?
            };
            return match library {
                Some(lib) => Ok(vec![Self::library_root(&lib)]),
                None => Err(SyncError::StartPathNotFound(start.clone()).into()),
            };
        }

        let libraries = {
            let _permit = self.scheduler.acquire().await?;
            self.remote
                .list_libraries()
                .await
                .context("cannot enumerate document libraries")?
        };
        Ok(libraries
            .iter()
            .filter(|lib| self.filter.matches(&lib.title))
            .map(Self::library_root)
            .collect())
    }

    fn library_root(lib: &LibraryEntry) -> RootTarget {
        RootTarget {
            remote_path: lib.root_path.clone(),
            local_name: lib.title.clone(),
            times: ItemTimes {
                created: lib.created,
                modified: lib.modified,
            },
        }
    }

    /// Fans one level of listed children out into concurrent tasks
    ///
    /// Folders are filtered by name before any remote call is spent on
    /// them; files always proceed to inspection. Each task isolates its
    /// own failures.
    async fn process_children(self: &Arc<Self>, children: Vec<RemoteItem>, local_dir: &Path) {
        let mut tasks = tokio::task::JoinSet::new();

        for child in children {
            match child {
                RemoteItem::Folder(folder) => {
                    if self.filter.matches(&folder.name) {
                        let engine = self.clone();
                        let child_dir = local_dir.join(&folder.name);
                        tasks.spawn(async move {
                            engine.walk_folder(folder, child_dir).await;
                        });
                    } else {
                        self.counters.folders_pruned.fetch_add(1, Ordering::Relaxed);
                        self.log.info(
                            false,
                            &format!(
                                "Pruned folder '{}' (name filter)",
                                folder.server_relative_path
                            ),
                        );
                    }
                }
                RemoteItem::File(file) => {
                    let engine = self.clone();
                    let local_path = local_dir.join(&file.name);
                    tasks.spawn(async move {
                        engine.process_file(file, local_path).await;
                    });
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                // Task panic; the item it carried is lost, the run is not.
                self.counters.record_error(format!("task failed: {e}"));
                self.log.error(true, &format!("Worker task failed: {e}"));
            }
        }
    }

    /// Mirrors one folder subtree; all failures are local to it
    fn walk_folder(
        self: Arc<Self>,
        folder: FolderEntry,
        local_dir: PathBuf,
    ) -> Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
        Box::pin(async move {
            if let Err(e) = self.local.create_dir(&local_dir).await {
                let msg = format!("Cannot create '{}': {e:#}", local_dir.display());
                self.counters.record_error(msg.clone());
                self.log.error(true, &msg);
                return;
            }
            self.counters.folders_visited.fetch_add(1, Ordering::Relaxed);

            let listing = {
                let _permit = match self.scheduler.acquire().await {
                    Ok(p) => p,
                    Err(e) => {
                        self.counters.record_error(e.to_string());
                        return;
                    }
                };
                self.remote
                    .list_children(&folder.server_relative_path)
                    .await
            };
            let children = match listing {
                Ok(children) => children,
                Err(e) => {
                    let msg = format!(
                        "Cannot list '{}': {e:#}; skipping subtree",
                        folder.server_relative_path
                    );
                    self.counters.record_error(msg.clone());
                    self.log.error(true, &msg);
                    return;
                }
            };

            debug!(
                path = %folder.server_relative_path,
                children = children.len(),
                "walking folder"
            );
            self.process_children(children, &local_dir).await;

            // Stamp after the subtree settles so child writes don't
            // disturb the directory's modified time.
            if let Err(e) = self
                .local
                .set_timestamps(&local_dir, folder.created, folder.modified)
                .await
            {
                self.log.warning(
                    false,
                    &format!("Could not stamp '{}': {e:#}", local_dir.display()),
                );
            }
        })
    }

    // ========================================================================
    // Per-file pipeline (shared by both modes)
    // ========================================================================

    /// Inspects one remote file and downloads it when needed
    async fn process_file(self: Arc<Self>, file: FileEntry, local_path: PathBuf) {
        let state = match self.local.get_state(&local_path).await {
            Ok(state) => state,
            Err(e) => {
                let msg = format!("Cannot stat '{}': {e:#}", local_path.display());
                self.counters.record_error(msg.clone());
                self.log.error(true, &msg);
                return;
            }
        };

        let times = ItemTimes {
            created: file.created,
            modified: file.modified,
        };
        let decision = self.inspector.should_download(&times, &state);

        if decision.is_download() {
            self.download_file(&file, &local_path).await;
            return;
        }

        self.counters.skipped.fetch_add(1, Ordering::Relaxed);
        match decision {
            Decision::SkipUpToDate => {
                self.log.info(
                    false,
                    &format!("Up to date: '{}'", file.server_relative_path),
                );
            }
            Decision::SkipNotNewerThanThreshold => {
                self.log.info(
                    false,
                    &format!(
                        "Not newer than configured threshold: '{}'",
                        file.server_relative_path
                    ),
                );
            }
            Decision::SkipCreatedMismatch => {
                // The local copy stays and keeps its stamps, so the
                // discrepancy resurfaces on every run until resolved.
                self.log.warning(
                    false,
                    &format!(
                        "Created timestamp mismatch for '{}' (local {:?}, remote {}); keeping local copy",
                        file.server_relative_path, state.created, file.created
                    ),
                );
                return;
            }
            _ => {}
        }

        // Re-assert the remote stamps on revisited entries; this is what
        // anchors the skip decision of the next run.
        if let Err(e) = self
            .local
            .set_timestamps(&local_path, file.created, file.modified)
            .await
        {
            self.log.warning(
                false,
                &format!("Could not stamp '{}': {e:#}", local_path.display()),
            );
        }
    }

    async fn download_file(&self, file: &FileEntry, local_path: &Path) {
        let content = {
            let _permit = match self.scheduler.acquire().await {
                Ok(p) => p,
                Err(e) => {
                    self.counters.record_error(e.to_string());
                    return;
                }
            };
            self.remote.download_file(&file.server_relative_path).await
        };
        let data = match content {
            Ok(data) => data,
            Err(e) => {
                let msg = format!("Download failed for '{}': {e:#}", file.server_relative_path);
                self.counters.record_error(msg.clone());
                self.log.error(true, &msg);
                return;
            }
        };

        if let Err(e) = self.local.write_file(local_path, &data).await {
            let msg = format!("Write failed for '{}': {e:#}", local_path.display());
            self.counters.record_error(msg.clone());
            self.log.error(true, &msg);
            return;
        }

        if let Err(e) = self
            .local
            .set_timestamps(local_path, file.created, file.modified)
            .await
        {
            self.log.warning(
                false,
                &format!("Could not stamp '{}': {e:#}", local_path.display()),
            );
        }

        self.counters.downloaded.fetch_add(1, Ordering::Relaxed);
        self.log.info(
            true,
            &format!(
                "Downloaded '{}' ({} bytes)",
                file.server_relative_path,
                data.len()
            ),
        );
    }

    // ========================================================================
    // Ranged mode
    // ========================================================================

    async fn run_ranged(self: &Arc<Self>, window: TimeWindow) -> anyhow::Result<()> {
        let libraries = self.resolve_ranged_libraries().await?;
        if libraries.is_empty() {
            self.log
                .info(true, "No libraries match the name filter; nothing to do");
            return Ok(());
        }

        let field = self.dates.field.unwrap_or(DateField::Modified);
        let partitioner = DateRangePartitioner::new(
            self.remote.clone(),
            self.log.clone(),
            self.scheduler.clone(),
            field,
            self.row_limit,
        );

        for library in libraries {
            let library_dir = self.local_root.join(&library.title);
            self.local
                .create_dir(&library_dir)
                .await
                .with_context(|| format!("cannot create sync root '{}'", library_dir.display()))?;
            self.counters.folders_visited.fetch_add(1, Ordering::Relaxed);

            let sink = EngineSink {
                engine: self.clone(),
                library_root: library.root_path.trim_end_matches('/').to_string(),
                library_dir: library_dir.clone(),
                reconciled: tokio::sync::Mutex::new(HashSet::new()),
            };

            let report = partitioner.run(&library, window.clone(), &sink).await?;
            self.counters
                .windows_skipped
                .fetch_add(u64::from(report.windows_skipped), Ordering::Relaxed);

            if let Err(e) = self
                .local
                .set_timestamps(&library_dir, library.created, library.modified)
                .await
            {
                self.log.warning(
                    false,
                    &format!("Could not stamp '{}': {e:#}", library_dir.display()),
                );
            }
        }
        Ok(())
    }

    /// Ranged mode operates on whole libraries; a start path must name one
    async fn resolve_ranged_libraries(&self) -> anyhow::Result<Vec<LibraryEntry>> {
        if let Some(start) = &self.start_path {
            let library = {
                let _permit = self.scheduler.acquire().await?;
                self.remote
                    .get_library(start)
                    .await
                    .with_context(|| format!("cannot classify start path '{start}'"))?
            };
            return match library {
                Some(lib) => Ok(vec![lib]),
                None => Err(SyncError::StartPathNotFound(start.clone()).into()),
            };
        }

        let libraries = {
            let _permit = self.scheduler.acquire().await?;
            self.remote
                .list_libraries()
                .await
                .context("cannot enumerate document libraries")?
        };
        Ok(libraries
            .into_iter()
            .filter(|lib| self.filter.matches(&lib.title))
            .collect())
    }
}

// ============================================================================
// EngineSink - the engine as the partitioner's window sink
// ============================================================================

/// Per-library sink adapting window query results onto the engine's
/// per-file pipeline
struct EngineSink {
    engine: Arc<SyncEngine>,
    /// Library root path with any trailing slash removed
    library_root: String,
    library_dir: PathBuf,
    /// Directories already created and stamped during this library's run
    reconciled: tokio::sync::Mutex<HashSet<PathBuf>>,
}

/// Splits `full` into path segments below `base`, or `None` when `full`
/// does not live under `base`
fn segments_below<'a>(base: &str, full: &'a str) -> Option<Vec<&'a str>> {
    let rest = full.strip_prefix(base)?.strip_prefix('/')?;
    if rest.is_empty() {
        return None;
    }
    Some(rest.split('/').collect())
}

impl EngineSink {
    /// Ensures every ancestor directory of the file exists and carries
    /// its remote stamps; returns the directory the file lands in
    async fn reconcile_ancestors(&self, folder_segments: &[&str]) -> anyhow::Result<PathBuf> {
        let engine = &self.engine;
        let mut local_dir = self.library_dir.clone();
        let mut remote_path = self.library_root.clone();

        for segment in folder_segments {
            local_dir.push(segment);
            remote_path.push('/');
            remote_path.push_str(segment);

            let mut reconciled = self.reconciled.lock().await;
            if reconciled.contains(&local_dir) {
                continue;
            }

            let state = engine.local.get_state(&local_dir).await?;
            if !state.exists {
                engine.local.create_dir(&local_dir).await?;
                engine
                    .counters
                    .folders_visited
                    .fetch_add(1, Ordering::Relaxed);
            }

            // Stamp from remote metadata, pre-existing directories
            // included: revisits overwrite whatever an earlier run left
            // behind, same as the tree-mode walk. A failed probe
            // degrades to an unstamped directory, not a failed file.
            let times = {
                let _permit = engine.scheduler.acquire().await?;
                engine.remote.get_item_times(&remote_path).await
            };
            match times {
                Ok(times) => {
                    if let Err(e) = engine
                        .local
                        .set_timestamps(&local_dir, times.created, times.modified)
                        .await
                    {
                        engine.log.warning(
                            false,
                            &format!("Could not stamp '{}': {e:#}", local_dir.display()),
                        );
                    }
                }
                Err(e) => {
                    engine.log.warning(
                        false,
                        &format!("No remote metadata for '{remote_path}': {e:#}"),
                    );
                }
            }
            reconciled.insert(local_dir.clone());
        }

        Ok(local_dir)
    }
}

#[async_trait::async_trait]
impl WindowSink for EngineSink {
    async fn process_files(
        &self,
        _library: &LibraryEntry,
        files: Vec<FileEntry>,
    ) -> anyhow::Result<()> {
        let engine = &self.engine;
        let mut tasks = tokio::task::JoinSet::new();

        for file in files {
            let Some(segments) = segments_below(&self.library_root, &file.server_relative_path)
            else {
                engine.log.warning(
                    false,
                    &format!(
                        "Ignoring '{}': outside library root '{}'",
                        file.server_relative_path, self.library_root
                    ),
                );
                continue;
            };
            let (folders, _name) = match segments.split_last() {
                Some((name, folders)) => (folders, name),
                None => continue,
            };

            // Every ancestor folder name must pass the filter, matching
            // the pruning a tree-mode walk would have applied.
            if let Some(rejected) = folders.iter().find(|seg| !engine.filter.matches(seg)) {
                engine.counters.skipped.fetch_add(1, Ordering::Relaxed);
                engine.log.info(
                    false,
                    &format!(
                        "Skipped '{}': folder '{}' fails the name filter",
                        file.server_relative_path, rejected
                    ),
                );
                continue;
            }

            let target_dir = match self.reconcile_ancestors(folders).await {
                Ok(dir) => dir,
                Err(e) => {
                    let msg = format!(
                        "Cannot prepare directory for '{}': {e:#}",
                        file.server_relative_path
                    );
                    engine.counters.record_error(msg.clone());
                    engine.log.error(true, &msg);
                    continue;
                }
            };

            let local_path = target_dir.join(&file.name);
            let engine = engine.clone();
            tasks.spawn(async move {
                engine.process_file(file, local_path).await;
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                engine.counters.record_error(format!("task failed: {e}"));
                engine.log.error(true, &format!("Worker task failed: {e}"));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Unit tests
// ============================================================================
