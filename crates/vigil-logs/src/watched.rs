use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use vigil_types::{ErrorFact, StatusFact};

use crate::classify::LineClassifier;
use crate::error::SourceError;
use crate::session::SubscriptionManager;
use crate::source::{LogSource, Rewind};
use crate::state::SourceState;

/// Default seconds before an extracted error stops being reported
pub const DEFAULT_ERROR_TIMEOUT: i64 = 3600;

/// A single watched log file: the byte-level tailer, the line classifier
/// for its dialect, the derived status/error facts, and the live-stream
/// subscriber sessions of this source.
pub struct WatchedLog {
    name: String,
    source: LogSource,
    classifier: Box<dyn LineClassifier>,
    state: SourceState,
    error_timeout: i64,
    pub sessions: SubscriptionManager,
}

impl WatchedLog {
    /// Start watching `path`. The cursor starts at end-of-file, then one
    /// error-timeout window of history is replayed into the facts so a
    /// recent error is reported immediately while older ones are ignored.
    pub fn open(
        path: impl Into<PathBuf>,
        name: Option<String>,
        classifier: Box<dyn LineClassifier>,
        error_timeout: Option<i64>,
        now: NaiveDateTime,
    ) -> Result<Self, SourceError> {
        let path = path.into();
        let name = name.unwrap_or_else(|| default_name(&path));
        let error_timeout = error_timeout.unwrap_or(DEFAULT_ERROR_TIMEOUT);

        let mut log = Self {
            name,
            source: LogSource::open(path, true)?,
            classifier,
            state: SourceState::default(),
            error_timeout,
            sessions: SubscriptionManager::new(),
        };
        log.rewind(Rewind::by_seconds(log.error_timeout), now)?;
        log.flush()?;
        Ok(log)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        self.source.path()
    }

    /// Consume newly appended bytes, update the facts from every
    /// classifiable complete line, and return the ready block verbatim.
    ///
    /// Unparseable lines update nothing but stay part of the returned
    /// text; that is how multi-line entries reach subscribers unmangled.
    /// A whitespace-only block yields an empty result.
    pub fn flush(&mut self) -> Result<String, SourceError> {
        let block = self.source.read_ready()?;
        if block.trim().is_empty() {
            return Ok(String::new());
        }
        for line in block.lines() {
            if let Some(event) = self.classifier.classify(line) {
                self.state.apply(event, self.error_timeout);
            }
        }
        Ok(block)
    }

    /// Reposition the tail cursor; the next flush replays from there
    pub fn rewind(&mut self, spec: Rewind, now: NaiveDateTime) -> Result<(), SourceError> {
        self.source.rewind(spec, now, self.classifier.as_ref())
    }

    pub fn status(&self) -> Option<&StatusFact> {
        self.state.status()
    }

    /// The current error fact, unless it has expired by `now`
    pub fn error(&self, now: NaiveDateTime) -> Option<&ErrorFact> {
        self.state.error(now)
    }

    /// Drop an expired error fact; run once per scheduling cycle
    pub fn sweep(&mut self, now: NaiveDateTime) {
        self.state.sweep(now);
    }
}

/// Display name for a source: the file's base name up to the first dot
fn default_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .unwrap_or("log")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::StructuredClassifier;
    use std::io::Write;
    use tempfile::tempdir;
    use vigil_types::TIME_FORMAT;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, TIME_FORMAT).unwrap()
    }

    fn write_file(path: &Path, content: &str) {
        std::fs::write(path, content).unwrap();
    }

    fn append(path: &Path, content: &str) {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    fn open(path: &Path, now: &str) -> WatchedLog {
        WatchedLog::open(path, None, Box::new(StructuredClassifier), None, ts(now)).unwrap()
    }

    const TEN_LINES: &str = "2011-09-21 01:00:01,854 - basic - INFO - Line 01\n\
                             2011-09-21 02:00:01,854 - basic - INFO - Line 02\n\
                             2011-09-21 03:00:01,854 - basic - INFO - Line 03\n\
                             2011-09-21 04:00:01,854 - basic - INFO - Line 04\n\
                             2011-09-21 05:00:01,854 - basic - INFO - Line 05\n\
                             2011-09-21 06:00:01,854 - basic - INFO - Line 06\n\
                             2011-09-21 07:00:01,854 - basic - INFO - Line 07\n\
                             2011-09-21 08:00:01,854 - basic - INFO - Line 08\n\
                             2011-09-21 09:00:01,854 - basic - INFO - Line 09\n\
                             2011-09-21 10:00:01,854 - basic - INFO - Line 10\n";

    const MULTI_LINE: &str = "2011-09-21 01:00:01,854 - basic - INFO - Line 01\n\
                              2011-09-21 02:00:01,854 - basic - INFO - Line 02\n\
                              2011-09-21 03:00:01,854 - basic - INFO - Line 03\n\
                              2011-09-21 04:00:01,854 - basic - INFO - Line 04\n\
                              2011-09-21 05:00:01,854 - basic - INFO - Line 05\n\
                              2011-09-21 06:00:01,854 - basic - INFO - Line 06\n\
                              2011-09-21 07:00:01,854 - basic - INFO - Line 07\n\
                              2011-09-21 08:00:01,854 - basic - INFO - Line 08\n\
                              this is a second line of same log line\n\
                              there is even a third line\n\
                              2011-09-21 09:00:01,854 - basic - INFO - Line 09\n\
                              2011-09-21 10:00:01,854 - basic - INFO - Line 10\n";

    #[test]
    fn test_tailing_works_with_non_existing_log() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.log");

        let mut log = open(&path, "2011-09-21 00:00:00");
        assert_eq!(log.flush().unwrap(), "");
        assert_eq!(log.flush().unwrap(), "");

        write_file(&path, "2011-09-21 01:00:01,854 - basic - INFO - Line 01\n");
        assert_eq!(
            log.flush().unwrap(),
            "2011-09-21 01:00:01,854 - basic - INFO - Line 01"
        );

        append(
            &path,
            "2011-09-21 02:00:01,854 - basic - INFO - Line 02\n\
             2011-09-21 03:00:01,854 - basic - INFO - Line 03\n",
        );
        assert_eq!(
            log.flush().unwrap(),
            "2011-09-21 02:00:01,854 - basic - INFO - Line 02\n\
             2011-09-21 03:00:01,854 - basic - INFO - Line 03"
        );
    }

    #[test]
    fn test_log_is_reopened_if_rotated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("basic.log");

        let mut log = open(&path, "2011-09-21 00:00:00");

        let content = "2011-09-21 01:00:01,854 - basic - INFO - Line 01\n\
                       2011-09-21 02:00:01,854 - basic - INFO - Line 02\n\
                       2011-09-21 03:00:01,854 - basic - INFO - Line 03\n";
        write_file(&path, content);
        assert_eq!(log.flush().unwrap(), content.trim_end());

        // File is rewritten, not appended
        let content = "2011-09-21 04:00:01,854 - basic - INFO - Line 04\n\
                       2011-09-21 05:00:01,854 - basic - INFO - Line 05\n";
        write_file(&path, content);
        assert_eq!(log.flush().unwrap(), content.trim_end());
    }

    #[test]
    fn test_rewind_by_entry_count() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("basic.log");
        let mut log = open(&path, "2011-09-21 00:00:00");
        let now = ts("2011-09-21 10:00:05");

        write_file(&path, TEN_LINES);
        log.flush().unwrap();
        assert_eq!(log.flush().unwrap(), "");

        log.rewind(Rewind::by_entries(1), now).unwrap();
        assert_eq!(
            log.flush().unwrap(),
            "2011-09-21 10:00:01,854 - basic - INFO - Line 10"
        );

        log.rewind(Rewind::by_entries(2), now).unwrap();
        assert_eq!(
            log.flush().unwrap(),
            "2011-09-21 09:00:01,854 - basic - INFO - Line 09\n\
             2011-09-21 10:00:01,854 - basic - INFO - Line 10"
        );

        log.rewind(Rewind::by_entries(3), now).unwrap();
        assert_eq!(
            log.flush().unwrap(),
            "2011-09-21 08:00:01,854 - basic - INFO - Line 08\n\
             2011-09-21 09:00:01,854 - basic - INFO - Line 09\n\
             2011-09-21 10:00:01,854 - basic - INFO - Line 10"
        );

        append(&path, "2011-09-21 11:00:01,854 - basic - INFO - Line 11\n");
        log.rewind(Rewind::by_entries(4), now).unwrap();
        assert_eq!(
            log.flush().unwrap(),
            "2011-09-21 08:00:01,854 - basic - INFO - Line 08\n\
             2011-09-21 09:00:01,854 - basic - INFO - Line 09\n\
             2011-09-21 10:00:01,854 - basic - INFO - Line 10\n\
             2011-09-21 11:00:01,854 - basic - INFO - Line 11"
        );
    }

    #[test]
    fn test_rewind_by_time_window() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("basic.log");
        let mut log = open(&path, "2011-09-21 00:00:00");
        let now = ts("2011-09-21 10:00:05");

        write_file(&path, TEN_LINES);
        log.flush().unwrap();
        assert_eq!(log.flush().unwrap(), "");

        log.rewind(Rewind::by_seconds(5), now).unwrap();
        assert_eq!(
            log.flush().unwrap(),
            "2011-09-21 10:00:01,854 - basic - INFO - Line 10"
        );

        log.rewind(Rewind::by_seconds(3600), now).unwrap();
        assert_eq!(
            log.flush().unwrap(),
            "2011-09-21 10:00:01,854 - basic - INFO - Line 10"
        );

        log.rewind(Rewind::by_seconds(3605), now).unwrap();
        assert_eq!(
            log.flush().unwrap(),
            "2011-09-21 09:00:01,854 - basic - INFO - Line 09\n\
             2011-09-21 10:00:01,854 - basic - INFO - Line 10"
        );

        // A later rewind always starts over from end-of-file
        log.rewind(Rewind::by_seconds(3600), now).unwrap();
        log.rewind(Rewind::by_seconds(1), now).unwrap();
        assert_eq!(log.flush().unwrap(), "");

        log.rewind(Rewind::by_seconds(3600 * 24), now).unwrap();
        assert_eq!(log.flush().unwrap(), TEN_LINES.trim_end());
    }

    #[test]
    fn test_rewind_by_time_tolerates_multi_line_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("basic.log");
        let mut log = open(&path, "2011-09-21 00:00:00");
        let now = ts("2011-09-21 10:00:05");

        write_file(&path, MULTI_LINE);
        log.flush().unwrap();
        assert_eq!(log.flush().unwrap(), "");

        log.rewind(Rewind::by_seconds(5), now).unwrap();
        assert_eq!(
            log.flush().unwrap(),
            "2011-09-21 10:00:01,854 - basic - INFO - Line 10"
        );

        log.rewind(Rewind::by_seconds(3605), now).unwrap();
        assert_eq!(
            log.flush().unwrap(),
            "2011-09-21 09:00:01,854 - basic - INFO - Line 09\n\
             2011-09-21 10:00:01,854 - basic - INFO - Line 10"
        );

        // The window boundary falls on Line 08; its continuation lines
        // must come along verbatim
        log.rewind(Rewind::by_seconds(7205), now).unwrap();
        assert_eq!(
            log.flush().unwrap(),
            "2011-09-21 08:00:01,854 - basic - INFO - Line 08\n\
             this is a second line of same log line\n\
             there is even a third line\n\
             2011-09-21 09:00:01,854 - basic - INFO - Line 09\n\
             2011-09-21 10:00:01,854 - basic - INFO - Line 10"
        );

        log.rewind(Rewind::by_seconds(3600), now).unwrap();
        log.rewind(Rewind::by_seconds(1), now).unwrap();
        assert_eq!(log.flush().unwrap(), "");

        log.rewind(Rewind::by_seconds(3600 * 24), now).unwrap();
        assert_eq!(log.flush().unwrap(), MULTI_LINE.trim_end());
    }

    #[test]
    fn test_rewind_by_entries_tolerates_multi_line_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("basic.log");
        let mut log = open(&path, "2011-09-21 00:00:00");
        let now = ts("2011-09-21 10:00:05");

        write_file(&path, MULTI_LINE);
        log.flush().unwrap();

        log.rewind(Rewind::by_entries(2), now).unwrap();
        assert_eq!(
            log.flush().unwrap(),
            "2011-09-21 09:00:01,854 - basic - INFO - Line 09\n\
             2011-09-21 10:00:01,854 - basic - INFO - Line 10"
        );

        log.rewind(Rewind::by_entries(3), now).unwrap();
        assert_eq!(
            log.flush().unwrap(),
            "2011-09-21 08:00:01,854 - basic - INFO - Line 08\n\
             this is a second line of same log line\n\
             there is even a third line\n\
             2011-09-21 09:00:01,854 - basic - INFO - Line 09\n\
             2011-09-21 10:00:01,854 - basic - INFO - Line 10"
        );
    }

    #[test]
    fn test_empty_log_has_clean_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.log");

        let log = open(&path, "2011-09-21 00:00:00");
        assert!(log.error(ts("2011-09-21 00:00:01")).is_none());
        assert!(log.status().is_none());
    }

    #[test]
    fn test_error_entries_set_the_error_fact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("basic.log");
        let mut log = open(&path, "2011-09-21 00:00:00");

        write_file(&path, "2011-09-21 01:00:01,854 - basic - INFO - Line 01\n");
        log.flush().unwrap();
        assert!(log.error(ts("2011-09-21 01:00:02")).is_none());

        append(
            &path,
            "2011-09-21 01:00:02,854 - basic - ERROR - Some error message\n",
        );
        log.flush().unwrap();
        let error = log.error(ts("2011-09-21 01:00:03")).unwrap();
        assert_eq!(error.time(), "2011-09-21 01:00:02");
        assert_eq!(error.message, "Some error message");

        // The latest error wins
        append(
            &path,
            "2011-09-21 01:00:03,854 - basic - ERROR - Error message #2\n\
             2011-09-21 01:00:04,854 - basic - ERROR - Error message #3\n",
        );
        log.flush().unwrap();
        let error = log.error(ts("2011-09-21 01:00:04")).unwrap();
        assert_eq!(error.time(), "2011-09-21 01:00:04");
        assert_eq!(error.message, "Error message #3");
    }

    #[test]
    fn test_error_fact_expires() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("basic.log");
        write_file(
            &path,
            "2011-09-21 01:00:02,854 - basic - ERROR - Some error message\n",
        );

        let log = WatchedLog::open(
            &path,
            None,
            Box::new(StructuredClassifier),
            Some(120),
            ts("2011-09-21 01:00:03"),
        )
        .unwrap();

        let error = log.error(ts("2011-09-21 01:00:03")).unwrap();
        assert_eq!(error.time(), "2011-09-21 01:00:02");
        assert_eq!(error.message, "Some error message");

        assert!(log.error(ts("2011-09-21 01:04:03")).is_none());
    }

    #[test]
    fn test_recent_errors_are_picked_up_on_startup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("basic.log");
        write_file(
            &path,
            "2011-09-21 01:00:01,854 - basic - INFO - Line 01\n\
             2011-09-21 01:00:02,854 - basic - ERROR - Line 02\n\
             2011-09-21 01:00:03,854 - basic - INFO - Line 03\n\
             2011-09-21 01:00:04,854 - basic - ERROR - Line 04\n\
             2011-09-21 01:00:05,854 - basic - INFO - Line 05\n",
        );

        let now = ts("2011-09-21 01:00:10");
        let log =
            WatchedLog::open(&path, None, Box::new(StructuredClassifier), Some(120), now).unwrap();

        let error = log.error(now).unwrap();
        assert_eq!(error.time(), "2011-09-21 01:00:04");
        assert_eq!(error.message, "Line 04");
    }

    #[test]
    fn test_old_errors_are_ignored_on_startup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("basic.log");
        write_file(
            &path,
            "2011-09-21 01:00:01,854 - basic - INFO - Line 01\n\
             2011-09-21 01:00:02,854 - basic - ERROR - Line 02\n\
             2011-09-21 01:00:04,854 - basic - ERROR - Line 04\n",
        );

        let now = ts("2011-09-21 01:05:10");
        let log =
            WatchedLog::open(&path, None, Box::new(StructuredClassifier), Some(120), now).unwrap();

        assert!(log.error(now).is_none());
    }

    #[test]
    fn test_last_info_entry_becomes_the_status() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("basic.log");
        let mut log = open(&path, "2011-09-21 00:00:00");

        assert!(log.status().is_none());

        write_file(
            &path,
            "2011-09-21 01:00:03,854 - basic - INFO - Line 03\n\
             2011-09-21 01:00:04,854 - basic - ERROR - Line 04\n\
             2011-09-21 01:00:05,854 - basic - INFO - Line 05\n",
        );
        log.flush().unwrap();
        let status = log.status().unwrap();
        assert_eq!(status.time(), "2011-09-21 01:00:05");
        assert_eq!(status.message, "Line 05");

        write_file(
            &path,
            "2011-09-21 01:05:16,854 - basic - INFO - Line 06\n\
             2011-09-21 01:05:17,854 - basic - INFO - Line 07\n",
        );
        log.flush().unwrap();
        let status = log.status().unwrap();
        assert_eq!(status.time(), "2011-09-21 01:05:17");
        assert_eq!(status.message, "Line 07");
    }

    #[test]
    fn test_default_name_is_the_base_name() {
        let dir = tempdir().unwrap();
        let log = open(&dir.path().join("basic.log"), "2011-09-21 00:00:00");
        assert_eq!(log.name(), "basic");
    }
}
