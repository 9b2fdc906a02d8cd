//! Time windows for the adaptive date-range partitioner
//!
//! A [`TimeWindow`] is a half-open interval `[start, end)` carrying the step
//! size (in minutes) it was tiled with. The partitioner keeps a worklist of
//! windows; when the remote store refuses a query because the result set
//! exceeds its view threshold, the offending window is re-tiled at the next
//! narrower step and the sub-windows replace it on the worklist.
//!
//! Step sizes only ever shrink, following a fixed ladder: whatever the
//! configured step was, the first split goes to 60 minutes, the second to
//! 1 minute. One minute is the floor; a window that still overflows at the
//! floor is abandoned (logged by the caller), which keeps the whole process
//! provably terminating.

use chrono::{DateTime, Duration, Utc};

use super::errors::DomainError;

/// Minimum step granularity in minutes; windows never split below this.
pub const MIN_STEP_MINUTES: i64 = 1;

/// Intermediate rung of the split ladder.
pub const HOUR_STEP_MINUTES: i64 = 60;

/// A half-open time interval `[start, end)` plus the step it was tiled with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step_minutes: i64,
}

impl TimeWindow {
    /// Creates a window, validating that `end` lies strictly after `start`
    /// and that the step is at least one minute.
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step_minutes: i64,
    ) -> Result<Self, DomainError> {
        if end <= start {
            return Err(DomainError::InvalidWindow {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        if step_minutes < MIN_STEP_MINUTES {
            return Err(DomainError::InvalidStep(step_minutes));
        }
        Ok(Self {
            start,
            end,
            step_minutes,
        })
    }

    /// Window start (inclusive)
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Window end (exclusive)
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Step size in minutes this window was tiled with
    pub fn step_minutes(&self) -> i64 {
        self.step_minutes
    }

    /// The next narrower step on the ladder, or `None` at the floor.
    ///
    /// Ladder: anything above 60 minutes drops to 60; anything above
    /// 1 minute drops to 1; at 1 minute there is nowhere left to go.
    pub fn narrower_step(&self) -> Option<i64> {
        if self.step_minutes > HOUR_STEP_MINUTES {
            Some(HOUR_STEP_MINUTES)
        } else if self.step_minutes > MIN_STEP_MINUTES {
            Some(MIN_STEP_MINUTES)
        } else {
            None
        }
    }

    /// Tiles `[start, end)` into consecutive windows of `step_minutes`.
    ///
    /// The final window is truncated to `end` so the tiling never
    /// overshoots; the union of the tiles reproduces the range exactly,
    /// with no gaps and no overlaps.
    pub fn tile(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step_minutes: i64,
    ) -> Result<Vec<TimeWindow>, DomainError> {
        // Validates the overall range and step up front.
        TimeWindow::new(start, end, step_minutes)?;

        let step = Duration::minutes(step_minutes);
        let mut windows = Vec::new();
        let mut cursor = start;
        while cursor < end {
            let next = std::cmp::min(cursor + step, end);
            windows.push(TimeWindow {
                start: cursor,
                end: next,
                step_minutes,
            });
            cursor = next;
        }
        Ok(windows)
    }

    /// Re-tiles this window at a narrower step, in chronological order.
    ///
    /// Callers must pass a step obtained from [`narrower_step`]; the
    /// sub-windows exactly cover `[start, end)`.
    ///
    /// [`narrower_step`]: TimeWindow::narrower_step
    pub fn split(&self, step_minutes: i64) -> Vec<TimeWindow> {
        // A window is non-empty by construction, so tiling cannot fail
        // once the step has been validated by the ladder.
        TimeWindow::tile(self.start, self.end, step_minutes)
            .unwrap_or_else(|_| vec![self.clone()])
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{} .. {}) @{}m",
            self.start.format("%Y-%m-%dT%H:%M:%SZ"),
            self.end.format("%Y-%m-%dT%H:%M:%SZ"),
            self.step_minutes
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn new_rejects_inverted_range() {
        let err = TimeWindow::new(
            ts("2024-01-02T00:00:00Z"),
            ts("2024-01-01T00:00:00Z"),
            60,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidWindow { .. }));
    }

    #[test]
    fn new_rejects_empty_range() {
        let t = ts("2024-01-01T00:00:00Z");
        assert!(TimeWindow::new(t, t, 60).is_err());
    }

    #[test]
    fn new_rejects_sub_minute_step() {
        let err = TimeWindow::new(
            ts("2024-01-01T00:00:00Z"),
            ts("2024-01-02T00:00:00Z"),
            0,
        )
        .unwrap_err();
        assert_eq!(err, DomainError::InvalidStep(0));
    }

    #[test]
    fn tile_covers_range_exactly() {
        let start = ts("2024-01-01T00:00:00Z");
        let end = ts("2024-01-02T00:00:00Z");
        let windows = TimeWindow::tile(start, end, 360).unwrap();

        assert_eq!(windows.len(), 4);
        assert_eq!(windows[0].start(), start);
        assert_eq!(windows[3].end(), end);
        // No gaps, no overlaps.
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end(), pair[1].start());
        }
    }

    #[test]
    fn tile_truncates_final_window() {
        let start = ts("2024-01-01T00:00:00Z");
        let end = ts("2024-01-01T02:30:00Z");
        let windows = TimeWindow::tile(start, end, 60).unwrap();

        assert_eq!(windows.len(), 3);
        assert_eq!(windows[2].start(), ts("2024-01-01T02:00:00Z"));
        assert_eq!(windows[2].end(), end);
    }

    #[test]
    fn tile_single_window_when_step_exceeds_range() {
        let start = ts("2024-01-01T00:00:00Z");
        let end = ts("2024-01-01T00:10:00Z");
        let windows = TimeWindow::tile(start, end, 1440).unwrap();

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start(), start);
        assert_eq!(windows[0].end(), end);
    }

    #[test]
    fn ladder_descends_to_sixty_then_one() {
        let w = TimeWindow::new(
            ts("2024-01-01T00:00:00Z"),
            ts("2024-01-02T00:00:00Z"),
            1440,
        )
        .unwrap();
        assert_eq!(w.narrower_step(), Some(60));

        let w = TimeWindow::new(
            ts("2024-01-01T00:00:00Z"),
            ts("2024-01-01T01:00:00Z"),
            60,
        )
        .unwrap();
        assert_eq!(w.narrower_step(), Some(1));

        let w = TimeWindow::new(
            ts("2024-01-01T00:00:00Z"),
            ts("2024-01-01T00:01:00Z"),
            1,
        )
        .unwrap();
        assert_eq!(w.narrower_step(), None);
    }

    #[test]
    fn ladder_skips_directly_to_sixty_from_odd_steps() {
        let w = TimeWindow::new(
            ts("2024-01-01T00:00:00Z"),
            ts("2024-01-01T02:00:00Z"),
            90,
        )
        .unwrap();
        assert_eq!(w.narrower_step(), Some(60));
    }

    #[test]
    fn split_tiles_sub_windows_chronologically() {
        let w = TimeWindow::new(
            ts("2024-01-01T00:00:00Z"),
            ts("2024-01-02T00:00:00Z"),
            1440,
        )
        .unwrap();
        let subs = w.split(720);

        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].start(), w.start());
        assert_eq!(subs[0].end(), ts("2024-01-01T12:00:00Z"));
        assert_eq!(subs[1].start(), ts("2024-01-01T12:00:00Z"));
        assert_eq!(subs[1].end(), w.end());
        assert_eq!(subs[0].step_minutes(), 720);
    }

    #[test]
    fn split_union_equals_parent() {
        let w = TimeWindow::new(
            ts("2024-03-01T00:00:00Z"),
            ts("2024-03-01T03:07:00Z"),
            187,
        )
        .unwrap();
        let subs = w.split(60);

        assert_eq!(subs.first().unwrap().start(), w.start());
        assert_eq!(subs.last().unwrap().end(), w.end());
        for pair in subs.windows(2) {
            assert_eq!(pair[0].end(), pair[1].start());
        }
    }

    #[test]
    fn display_formats_half_open_interval() {
        let w = TimeWindow::new(
            ts("2024-01-01T00:00:00Z"),
            ts("2024-01-01T01:00:00Z"),
            60,
        )
        .unwrap();
        assert_eq!(
            w.to_string(),
            "[2024-01-01T00:00:00Z .. 2024-01-01T01:00:00Z) @60m"
        );
    }
}
