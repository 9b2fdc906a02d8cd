//! Local state inspector
//!
//! Decides, per remote file, whether content needs to be downloaded or the
//! local copy can be kept. The decision is pure: it looks only at the
//! remote timestamp pair, the observed local state, and the configured
//! thresholds/policy. Filesystem effects (stamping, writing) happen in the
//! engine after the decision.
//!
//! ## Decision rules
//!
//! 1. No local entry (or not a regular file) - download.
//! 2. Date thresholds configured (`created_after` / `modified_after`) -
//!    download iff the remote stamp is strictly newer than any configured
//!    threshold; the local created comparison is not consulted.
//! 3. No thresholds - compare local and remote created stamps at second
//!    precision; equal means up to date. On mismatch the configured
//!    [`MismatchPolicy`] decides: `skip` keeps the local copy (and the
//!    engine logs the discrepancy), `redownload` fetches again.

use chrono::{DateTime, SubsecRound, Utc};
use shelfmirror_core::{
    config::{DateFilterConfig, MismatchPolicy},
    ports::{local_store::LocalEntryState, remote_store::ItemTimes},
};

/// Date thresholds lifted out of configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct DateThresholds {
    /// Re-download when the remote created stamp is strictly newer
    pub created_after: Option<DateTime<Utc>>,
    /// Re-download when the remote modified stamp is strictly newer
    pub modified_after: Option<DateTime<Utc>>,
}

impl DateThresholds {
    /// Extracts the threshold pair from the dates section
    pub fn from_config(dates: &DateFilterConfig) -> Self {
        Self {
            created_after: dates.created_after,
            modified_after: dates.modified_after,
        }
    }

    /// Whether any threshold is configured
    pub fn any(&self) -> bool {
        self.created_after.is_some() || self.modified_after.is_some()
    }
}

/// Outcome of inspecting one remote file against its local counterpart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No local entry exists at the mirror path
    DownloadAbsent,
    /// A remote stamp is strictly newer than a configured threshold
    DownloadNewerThanThreshold,
    /// Created stamps disagree and policy is `redownload`
    DownloadCreatedMismatch,
    /// Thresholds are configured and no remote stamp exceeds them
    SkipNotNewerThanThreshold,
    /// Local and remote created stamps agree (second precision)
    SkipUpToDate,
    /// Created stamps disagree and policy is `skip`
    SkipCreatedMismatch,
}

impl Decision {
    /// Whether the decision requires fetching remote content
    pub fn is_download(&self) -> bool {
        matches!(
            self,
            Decision::DownloadAbsent
                | Decision::DownloadNewerThanThreshold
                | Decision::DownloadCreatedMismatch
        )
    }
}

/// Pure decision logic for incremental skip/download
#[derive(Debug, Clone, Copy)]
pub struct LocalStateInspector {
    thresholds: DateThresholds,
    mismatch_policy: MismatchPolicy,
}

impl LocalStateInspector {
    /// Creates an inspector with the given thresholds and mismatch policy
    pub fn new(thresholds: DateThresholds, mismatch_policy: MismatchPolicy) -> Self {
        Self {
            thresholds,
            mismatch_policy,
        }
    }

    /// Decides whether a remote file needs downloading
    pub fn should_download(&self, remote: &ItemTimes, local: &LocalEntryState) -> Decision {
        if !local.exists || !local.is_file {
            return Decision::DownloadAbsent;
        }

        if self.thresholds.any() {
            let newer_created = self
                .thresholds
                .created_after
                .is_some_and(|t| remote.created > t);
            let newer_modified = self
                .thresholds
                .modified_after
                .is_some_and(|t| remote.modified > t);
            return if newer_created || newer_modified {
                Decision::DownloadNewerThanThreshold
            } else {
                Decision::SkipNotNewerThanThreshold
            };
        }

        // Filesystem stamps round-trip at second precision, so the remote
        // side is truncated the same way before comparing.
        let remote_created = remote.created.trunc_subsecs(0);
        match local.created.map(|c| c.trunc_subsecs(0)) {
            Some(local_created) if local_created == remote_created => Decision::SkipUpToDate,
            _ => match self.mismatch_policy {
                MismatchPolicy::Skip => Decision::SkipCreatedMismatch,
                MismatchPolicy::Redownload => Decision::DownloadCreatedMismatch,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn times(created: &str, modified: &str) -> ItemTimes {
        ItemTimes {
            created: t(created),
            modified: t(modified),
        }
    }

    fn local_file(created: &str) -> LocalEntryState {
        LocalEntryState {
            exists: true,
            is_file: true,
            created: Some(t(created)),
            modified: Some(t(created)),
        }
    }

    fn inspector(thresholds: DateThresholds, policy: MismatchPolicy) -> LocalStateInspector {
        LocalStateInspector::new(thresholds, policy)
    }

    #[test]
    fn test_absent_local_file_downloads() {
        let insp = inspector(DateThresholds::default(), MismatchPolicy::Skip);
        let decision = insp.should_download(
            &times("2024-03-01T10:00:00Z", "2024-03-02T10:00:00Z"),
            &LocalEntryState::not_found(),
        );
        assert_eq!(decision, Decision::DownloadAbsent);
        assert!(decision.is_download());
    }

    #[test]
    fn test_directory_at_file_path_downloads() {
        let insp = inspector(DateThresholds::default(), MismatchPolicy::Skip);
        let local = LocalEntryState {
            exists: true,
            is_file: false,
            created: Some(t("2024-03-01T10:00:00Z")),
            modified: None,
        };
        let decision = insp.should_download(
            &times("2024-03-01T10:00:00Z", "2024-03-01T10:00:00Z"),
            &local,
        );
        assert_eq!(decision, Decision::DownloadAbsent);
    }

    #[test]
    fn test_matching_created_stamp_skips() {
        let insp = inspector(DateThresholds::default(), MismatchPolicy::Skip);
        let decision = insp.should_download(
            &times("2024-03-01T10:00:00Z", "2024-03-05T08:00:00Z"),
            &local_file("2024-03-01T10:00:00Z"),
        );
        assert_eq!(decision, Decision::SkipUpToDate);
        assert!(!decision.is_download());
    }

    #[test]
    fn test_subsecond_difference_still_matches() {
        let insp = inspector(DateThresholds::default(), MismatchPolicy::Skip);
        let remote = ItemTimes {
            created: t("2024-03-01T10:00:00.750Z"),
            modified: t("2024-03-01T10:00:00.750Z"),
        };
        let decision = insp.should_download(&remote, &local_file("2024-03-01T10:00:00Z"));
        assert_eq!(decision, Decision::SkipUpToDate);
    }

    #[test]
    fn test_created_mismatch_skip_policy() {
        let insp = inspector(DateThresholds::default(), MismatchPolicy::Skip);
        let decision = insp.should_download(
            &times("2024-03-02T10:00:00Z", "2024-03-02T10:00:00Z"),
            &local_file("2024-03-01T10:00:00Z"),
        );
        assert_eq!(decision, Decision::SkipCreatedMismatch);
    }

    #[test]
    fn test_created_mismatch_redownload_policy() {
        let insp = inspector(DateThresholds::default(), MismatchPolicy::Redownload);
        let decision = insp.should_download(
            &times("2024-03-02T10:00:00Z", "2024-03-02T10:00:00Z"),
            &local_file("2024-03-01T10:00:00Z"),
        );
        assert_eq!(decision, Decision::DownloadCreatedMismatch);
        assert!(decision.is_download());
    }

    #[test]
    fn test_modified_after_threshold_downloads_newer() {
        let thresholds = DateThresholds {
            created_after: None,
            modified_after: Some(t("2024-06-01T00:00:00Z")),
        };
        let insp = inspector(thresholds, MismatchPolicy::Skip);

        // Modified after the threshold, created stamps identical: still
        // a download, because the threshold rule wins.
        let decision = insp.should_download(
            &times("2024-01-01T00:00:00Z", "2024-06-15T00:00:00Z"),
            &local_file("2024-01-01T00:00:00Z"),
        );
        assert_eq!(decision, Decision::DownloadNewerThanThreshold);
    }

    #[test]
    fn test_modified_after_threshold_skips_older() {
        let thresholds = DateThresholds {
            created_after: None,
            modified_after: Some(t("2024-06-01T00:00:00Z")),
        };
        let insp = inspector(thresholds, MismatchPolicy::Skip);

        // Created stamps differ but nothing exceeds the threshold.
        let decision = insp.should_download(
            &times("2024-02-01T00:00:00Z", "2024-05-01T00:00:00Z"),
            &local_file("2024-01-01T00:00:00Z"),
        );
        assert_eq!(decision, Decision::SkipNotNewerThanThreshold);
    }

    #[test]
    fn test_threshold_boundary_is_strict() {
        let thresholds = DateThresholds {
            created_after: None,
            modified_after: Some(t("2024-06-01T00:00:00Z")),
        };
        let insp = inspector(thresholds, MismatchPolicy::Skip);

        // Exactly at the threshold is not "newer than".
        let decision = insp.should_download(
            &times("2024-01-01T00:00:00Z", "2024-06-01T00:00:00Z"),
            &local_file("2023-01-01T00:00:00Z"),
        );
        assert_eq!(decision, Decision::SkipNotNewerThanThreshold);
    }

    #[test]
    fn test_created_after_threshold() {
        let thresholds = DateThresholds {
            created_after: Some(t("2024-06-01T00:00:00Z")),
            modified_after: None,
        };
        let insp = inspector(thresholds, MismatchPolicy::Skip);

        let newer = insp.should_download(
            &times("2024-07-01T00:00:00Z", "2024-07-01T00:00:00Z"),
            &local_file("2024-07-01T00:00:00Z"),
        );
        assert_eq!(newer, Decision::DownloadNewerThanThreshold);

        let older = insp.should_download(
            &times("2024-05-01T00:00:00Z", "2024-05-01T00:00:00Z"),
            &local_file("2024-05-01T00:00:00Z"),
        );
        assert_eq!(older, Decision::SkipNotNewerThanThreshold);
    }

    #[test]
    fn test_thresholds_apply_only_to_existing_files() {
        // An absent file downloads even when it is older than every
        // threshold; thresholds gate re-downloads, not first downloads.
        let thresholds = DateThresholds {
            created_after: None,
            modified_after: Some(t("2024-06-01T00:00:00Z")),
        };
        let insp = inspector(thresholds, MismatchPolicy::Skip);
        let decision = insp.should_download(
            &times("2024-01-01T00:00:00Z", "2024-01-01T00:00:00Z"),
            &LocalEntryState::not_found(),
        );
        assert_eq!(decision, Decision::DownloadAbsent);
    }
}
