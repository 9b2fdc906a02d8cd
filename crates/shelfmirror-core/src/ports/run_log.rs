//! Run log port
//!
//! The one resource every concurrent task writes to. Implementations must
//! serialize appends so each entry lands as a single uncorrupted line, and
//! must never fail the caller: a sync run does not abort because its log
//! sink hiccuped.
//!
//! The port is injected explicitly into every component (no global mutable
//! log state), which also enables capture doubles in tests.

/// Severity of a run-log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Routine progress and skip decisions
    Info,
    /// Degraded but continuing (e.g. a window abandoned at the step floor)
    Warning,
    /// A failed item or subtree
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// Port trait for the append-only, thread-safe run log
///
/// `console` controls whether the entry is also echoed to the console
/// stream; everything is always persisted. High-level progress and errors
/// go to both, per-item skip detail goes to the file only.
pub trait ISyncLog: Send + Sync {
    /// Appends one entry
    fn log(&self, severity: Severity, console: bool, message: &str);

    /// Appends an INFO entry
    fn info(&self, console: bool, message: &str) {
        self.log(Severity::Info, console, message);
    }

    /// Appends a WARNING entry
    fn warning(&self, console: bool, message: &str) {
        self.log(Severity::Warning, console, message);
    }

    /// Appends an ERROR entry
    fn error(&self, console: bool, message: &str) {
        self.log(Severity::Error, console, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_display_matches_log_levels() {
        assert_eq!(Severity::Info.to_string(), "INFO");
        assert_eq!(Severity::Warning.to_string(), "WARNING");
        assert_eq!(Severity::Error.to_string(), "ERROR");
    }
}
