//! Date-range partitioner
//!
//! Drives ranged-mode sync for one library: the overall date range is
//! tiled into [`TimeWindow`]s at the configured step and worked through an
//! explicit queue. A window whose query trips the remote row cap is
//! re-tiled at the next narrower step and its sub-windows take its place
//! at the front of the queue, so processing stays chronological. A window
//! that still overflows at the one-minute floor is abandoned with a
//! WARNING; any non-threshold query error aborts the run.
//!
//! The queue makes progress inspectable and bounds the state to pending
//! windows; there is no recursion to unwind.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::Context;
use shelfmirror_core::{
    domain::{remote_item::FileEntry, remote_item::LibraryEntry, window::TimeWindow},
    ports::{
        remote_store::{is_threshold_error, DateField, DateRangeQuery, IRemoteStore},
        run_log::ISyncLog,
    },
};
use tracing::debug;

use crate::scheduler::DownloadScheduler;

/// Receives the files of each successfully queried window
///
/// The engine implements this; the indirection keeps the partitioner
/// testable with a collecting double.
#[async_trait::async_trait]
pub trait WindowSink: Send + Sync {
    /// Processes the files one window yielded, in query order
    async fn process_files(
        &self,
        library: &LibraryEntry,
        files: Vec<FileEntry>,
    ) -> anyhow::Result<()>;
}

/// Counters for one partitioner run over one library
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionReport {
    /// Windows whose query succeeded and whose files reached the sink
    pub windows_processed: u32,
    /// Windows replaced by narrower sub-windows after a row-cap refusal
    pub windows_split: u32,
    /// Windows abandoned at the one-minute floor
    pub windows_skipped: u32,
    /// Total files delivered to the sink
    pub files_seen: u64,
}

/// Worklist-based adaptive partitioner over one library's date range
pub struct DateRangePartitioner {
    remote: Arc<dyn IRemoteStore>,
    log: Arc<dyn ISyncLog>,
    scheduler: DownloadScheduler,
    field: DateField,
    row_limit: u32,
}

impl DateRangePartitioner {
    /// Creates a partitioner querying `field` with the given row cap
    pub fn new(
        remote: Arc<dyn IRemoteStore>,
        log: Arc<dyn ISyncLog>,
        scheduler: DownloadScheduler,
        field: DateField,
        row_limit: u32,
    ) -> Self {
        Self {
            remote,
            log,
            scheduler,
            field,
            row_limit,
        }
    }

    /// Works through `window` (the overall range at its initial step),
    /// delivering each sub-range's files to `sink`
    ///
    /// Returns the run counters, or the first non-threshold query error.
    pub async fn run(
        &self,
        library: &LibraryEntry,
        window: TimeWindow,
        sink: &dyn WindowSink,
    ) -> anyhow::Result<PartitionReport> {
        let mut report = PartitionReport::default();
        let mut queue: VecDeque<TimeWindow> = TimeWindow::tile(
            window.start(),
            window.end(),
            window.step_minutes(),
        )
        .map_err(anyhow::Error::from)
        .context("invalid date range")?
        .into();

        self.log.info(
            true,
            &format!(
                "Querying '{}' over {} in {} window(s)",
                library.title,
                window,
                queue.len()
            ),
        );

        while let Some(current) = queue.pop_front() {
            let query = DateRangeQuery {
                field: self.field,
                start: current.start(),
                end: current.end(),
                row_limit: self.row_limit,
            };

            let result = {
                let _permit = self.scheduler.acquire().await?;
                self.remote.query_files(library, &query).await
            };

            match result {
                Ok(files) => {
                    debug!(window = %current, count = files.len(), "window query succeeded");
                    report.windows_processed += 1;
                    report.files_seen += files.len() as u64;
                    if !files.is_empty() {
                        self.log.info(
                            false,
                            &format!("Window {} matched {} file(s)", current, files.len()),
                        );
                    }
                    sink.process_files(library, files).await?;
                }
                Err(err) if is_threshold_error(&err) => match current.narrower_step() {
                    Some(step) => {
                        let subs = current.split(step);
                        self.log.info(
                            true,
                            &format!(
                                "Window {} exceeds the row cap, splitting into {} window(s) of {}m",
                                current,
                                subs.len(),
                                step
                            ),
                        );
                        report.windows_split += 1;
                        // Front-insert in reverse so pop order stays
                        // chronological.
                        for sub in subs.into_iter().rev() {
                            queue.push_front(sub);
                        }
                    }
                    None => {
                        report.windows_skipped += 1;
                        self.log.warning(
                            true,
                            &format!(
                                "Window {} still exceeds the row cap at the 1-minute floor; \
                                 skipping it permanently",
                                current
                            ),
                        );
                    }
                },
                Err(err) => {
                    self.log.error(
                        true,
                        &format!("Query failed for window {current}: {err:#}"),
                    );
                    return Err(err).with_context(|| {
                        format!("date-range query failed for library '{}'", library.title)
                    });
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::{DateTime, Duration, Utc};
    use shelfmirror_core::domain::remote_item::{FolderEntry, RemoteItem};
    use shelfmirror_core::ports::remote_store::ItemTimes;

    use crate::runlog::MemorySyncLog;

    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn library() -> LibraryEntry {
        LibraryEntry {
            title: "Proj_Lib".to_string(),
            root_path: "/sites/acme/Proj_Lib".to_string(),
            created: ts("2020-01-01T00:00:00Z"),
            modified: ts("2024-01-01T00:00:00Z"),
        }
    }

    fn file_at(modified: DateTime<Utc>, idx: usize) -> FileEntry {
        FileEntry {
            name: format!("f{idx}.txt"),
            server_relative_path: format!("/sites/acme/Proj_Lib/f{idx}.txt"),
            created: modified,
            modified,
            size: Some(10),
        }
    }

    /// Remote double holding a fixed file population; refuses queries
    /// matching more than `row_limit` rows, like the real store.
    struct PopulatedRemote {
        files: Vec<FileEntry>,
        queries: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
    }

    impl PopulatedRemote {
        fn spread(start: DateTime<Utc>, count: usize, over: Duration) -> Self {
            let gap = over / count as i32;
            let files = (0..count).map(|i| file_at(start + gap * i as i32, i)).collect();
            Self {
                files,
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl IRemoteStore for PopulatedRemote {
        async fn list_libraries(&self) -> anyhow::Result<Vec<LibraryEntry>> {
            Ok(vec![library()])
        }
        async fn get_library(&self, _title: &str) -> anyhow::Result<Option<LibraryEntry>> {
            Ok(Some(library()))
        }
        async fn get_folder(&self, _path: &str) -> anyhow::Result<Option<FolderEntry>> {
            Ok(None)
        }
        async fn list_children(&self, _path: &str) -> anyhow::Result<Vec<RemoteItem>> {
            Ok(Vec::new())
        }
        async fn query_files(
            &self,
            _library: &LibraryEntry,
            query: &DateRangeQuery,
        ) -> anyhow::Result<Vec<FileEntry>> {
            self.queries
                .lock()
                .unwrap()
                .push((query.start, query.end));
            let matched: Vec<FileEntry> = self
                .files
                .iter()
                .filter(|f| f.modified >= query.start && f.modified < query.end)
                .cloned()
                .collect();
            if matched.len() > query.row_limit as usize {
                anyhow::bail!(
                    "The attempted operation is prohibited because it exceeds the list view threshold"
                );
            }
            Ok(matched)
        }
        async fn get_item_times(&self, _path: &str) -> anyhow::Result<ItemTimes> {
            anyhow::bail!("not used in this test")
        }
        async fn download_file(&self, _path: &str) -> anyhow::Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    /// Sink double collecting every delivered file
    #[derive(Default)]
    struct CollectingSink {
        files: Mutex<Vec<FileEntry>>,
    }

    #[async_trait::async_trait]
    impl WindowSink for CollectingSink {
        async fn process_files(
            &self,
            _library: &LibraryEntry,
            files: Vec<FileEntry>,
        ) -> anyhow::Result<()> {
            self.files.lock().unwrap().extend(files);
            Ok(())
        }
    }

    fn partitioner(remote: Arc<dyn IRemoteStore>, log: Arc<MemorySyncLog>, row_limit: u32) -> DateRangePartitioner {
        DateRangePartitioner::new(
            remote,
            log,
            DownloadScheduler::new(4),
            DateField::Modified,
            row_limit,
        )
    }

    #[tokio::test]
    async fn test_fitting_windows_need_no_split() {
        let start = ts("2024-01-01T00:00:00Z");
        let remote = Arc::new(PopulatedRemote::spread(start, 100, Duration::days(1)));
        let log = Arc::new(MemorySyncLog::new());
        let sink = CollectingSink::default();

        let window = TimeWindow::new(start, start + Duration::days(1), 1440).unwrap();
        let report = partitioner(remote.clone(), log, 5000)
            .run(&library(), window, &sink)
            .await
            .expect("run");

        assert_eq!(report.windows_processed, 1);
        assert_eq!(report.windows_split, 0);
        assert_eq!(report.windows_skipped, 0);
        assert_eq!(report.files_seen, 100);
        assert_eq!(sink.files.lock().unwrap().len(), 100);
    }

    #[tokio::test]
    async fn test_overfull_day_splits_to_hours_and_reaches_every_file() {
        // 6000 files spread over one day exceed a 5000-row cap; hourly
        // sub-windows (250 files each) fit.
        let start = ts("2024-01-01T00:00:00Z");
        let remote = Arc::new(PopulatedRemote::spread(start, 6000, Duration::days(1)));
        let log = Arc::new(MemorySyncLog::new());
        let sink = CollectingSink::default();

        let window = TimeWindow::new(start, start + Duration::days(1), 1440).unwrap();
        let report = partitioner(remote.clone(), log, 5000)
            .run(&library(), window, &sink)
            .await
            .expect("run");

        assert_eq!(report.windows_split, 1);
        assert_eq!(report.windows_processed, 24);
        assert_eq!(report.windows_skipped, 0);
        assert_eq!(report.files_seen, 6000);
        assert_eq!(sink.files.lock().unwrap().len(), 6000);
    }

    #[tokio::test]
    async fn test_processing_stays_chronological_after_split() {
        let start = ts("2024-01-01T00:00:00Z");
        let remote = Arc::new(PopulatedRemote::spread(start, 6000, Duration::days(1)));
        let log = Arc::new(MemorySyncLog::new());
        let sink = CollectingSink::default();

        let window = TimeWindow::new(start, start + Duration::days(1), 1440).unwrap();
        partitioner(remote.clone(), log, 5000)
            .run(&library(), window, &sink)
            .await
            .expect("run");

        // Skip the first (refused) probe of the full day; the successful
        // hourly queries must be in ascending start order.
        let queries = remote.queries.lock().unwrap();
        let hourly = &queries[1..];
        for pair in hourly.windows(2) {
            assert!(pair[0].0 < pair[1].0, "queries out of order: {pair:?}");
        }
    }

    #[tokio::test]
    async fn test_floor_window_is_abandoned_with_warning() {
        // All 10 files share one timestamp, so no split can ever thin the
        // result below a cap of 5. The containing minute is abandoned;
        // every other minute of the hour still processes.
        let start = ts("2024-01-01T00:00:00Z");
        let files: Vec<FileEntry> = (0..10).map(|i| file_at(start, i)).collect();
        let remote = Arc::new(PopulatedRemote {
            files,
            queries: Mutex::new(Vec::new()),
        });
        let log = Arc::new(MemorySyncLog::new());
        let sink = CollectingSink::default();

        let window = TimeWindow::new(start, start + Duration::hours(1), 60).unwrap();
        let report = partitioner(remote.clone(), log.clone(), 5)
            .run(&library(), window, &sink)
            .await
            .expect("run");

        assert_eq!(report.windows_skipped, 1);
        assert_eq!(report.windows_split, 1);
        assert_eq!(report.windows_processed, 59);
        assert_eq!(report.files_seen, 0);
        assert!(log.contains("1-minute floor"));
    }

    #[tokio::test]
    async fn test_unexpected_query_error_is_fatal() {
        struct FailingRemote;

        #[async_trait::async_trait]
        impl IRemoteStore for FailingRemote {
            async fn list_libraries(&self) -> anyhow::Result<Vec<LibraryEntry>> {
                Ok(Vec::new())
            }
            async fn get_library(&self, _t: &str) -> anyhow::Result<Option<LibraryEntry>> {
                Ok(None)
            }
            async fn get_folder(&self, _p: &str) -> anyhow::Result<Option<FolderEntry>> {
                Ok(None)
            }
            async fn list_children(&self, _p: &str) -> anyhow::Result<Vec<RemoteItem>> {
                Ok(Vec::new())
            }
            async fn query_files(
                &self,
                _l: &LibraryEntry,
                _q: &DateRangeQuery,
            ) -> anyhow::Result<Vec<FileEntry>> {
                anyhow::bail!("403 Forbidden")
            }
            async fn get_item_times(&self, _p: &str) -> anyhow::Result<ItemTimes> {
                anyhow::bail!("not used")
            }
            async fn download_file(&self, _p: &str) -> anyhow::Result<Vec<u8>> {
                Ok(Vec::new())
            }
        }

        let log = Arc::new(MemorySyncLog::new());
        let sink = CollectingSink::default();
        let window = TimeWindow::new(
            ts("2024-01-01T00:00:00Z"),
            ts("2024-01-02T00:00:00Z"),
            1440,
        )
        .unwrap();

        let result = partitioner(Arc::new(FailingRemote), log.clone(), 5000)
            .run(&library(), window, &sink)
            .await;

        assert!(result.is_err());
        assert!(log.contains("403 Forbidden"));
    }
}
