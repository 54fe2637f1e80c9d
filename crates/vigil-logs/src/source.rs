use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{NaiveDateTime, TimeDelta};
use tracing::debug;

use crate::classify::LineClassifier;
use crate::error::SourceError;

/// How far back [`LogSource::rewind`] repositions the cursor
#[derive(Clone, Copy, Debug, Default)]
pub struct Rewind {
    /// Maximum number of classified entries to step back over
    pub entries: Option<usize>,

    /// In-file time window to step back over
    pub window: Option<TimeDelta>,
}

impl Rewind {
    pub fn by_entries(entries: usize) -> Self {
        Self {
            entries: Some(entries),
            window: None,
        }
    }

    pub fn by_window(window: TimeDelta) -> Self {
        Self {
            entries: None,
            window: Some(window),
        }
    }

    pub fn by_seconds(seconds: i64) -> Self {
        Self::by_window(TimeDelta::seconds(seconds))
    }
}

/// Byte-level tailer for a single append-only, rotating log file.
///
/// Owns the file handle, the consumed-byte offset, and the unterminated
/// tail of the last read. The file shrinking below the offset,
/// disappearing, or changing creation time triggers a transparent reopen;
/// a missing file reads as empty and tailing resumes once it reappears.
pub struct LogSource {
    path: PathBuf,
    file: Option<File>,
    /// Bytes consumed so far. Never ahead of the file size except
    /// transiently right before a rotation is detected.
    offset: u64,
    /// Unterminated tail of the last read
    pending: Vec<u8>,
    /// Creation time of the currently open handle, where the filesystem
    /// reports one
    rotation_marker: Option<SystemTime>,
}

impl LogSource {
    /// Open a tailer for `path`. With `start_at_end`, historical content
    /// is skipped and only bytes appended after this call are observed.
    pub fn open(path: impl Into<PathBuf>, start_at_end: bool) -> Result<Self, SourceError> {
        let mut source = Self {
            path: path.into(),
            file: None,
            offset: 0,
            pending: Vec::new(),
            rotation_marker: None,
        };
        source.reopen(start_at_end).map_err(|e| source.wrap(e))?;
        Ok(source)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the file on disk, or 0 while it is absent
    pub fn current_size(&self) -> u64 {
        std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    fn creation_time(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.path)
            .ok()
            .and_then(|m| m.created().ok())
    }

    /// True when the file on disk is no longer the one behind our handle
    fn rotated(&self) -> bool {
        self.file.is_some()
            && (self.offset > self.current_size()
                || (self.rotation_marker.is_some()
                    && self.creation_time() != self.rotation_marker))
    }

    /// (Re)open the handle and record the new rotation marker. A missing
    /// file leaves the source closed.
    fn reopen(&mut self, start_at_end: bool) -> io::Result<()> {
        self.file = None;
        self.offset = 0;
        self.rotation_marker = None;
        match File::open(&self.path) {
            Ok(file) => {
                self.rotation_marker = file.metadata()?.created().ok();
                if start_at_end {
                    self.offset = self.current_size();
                }
                self.file = Some(file);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn ensure_open(&mut self) -> io::Result<()> {
        if self.file.is_none() || self.rotated() {
            debug!(path = %self.path.display(), "reopening log source");
            self.reopen(false)?;
        }
        Ok(())
    }

    fn wrap(&self, source: io::Error) -> SourceError {
        SourceError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Read exactly the bytes appended since the last read, advancing the
    /// offset. Empty when nothing new has arrived.
    pub fn read_new(&mut self) -> Result<Vec<u8>, SourceError> {
        self.read_new_inner().map_err(|e| self.wrap(e))
    }

    fn read_new_inner(&mut self) -> io::Result<Vec<u8>> {
        self.ensure_open()?;
        let Some(file) = self.file.as_mut() else {
            return Ok(Vec::new());
        };
        let size = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        let new_bytes = size.saturating_sub(self.offset);
        if new_bytes == 0 {
            return Ok(Vec::new());
        }
        file.seek(SeekFrom::Start(self.offset))?;
        let mut buf = vec![0u8; new_bytes as usize];
        file.read_exact(&mut buf)?;
        self.offset += new_bytes;
        Ok(buf)
    }

    /// Consume newly appended bytes and return the complete-line portion,
    /// without its final newline. The unterminated tail is retained for
    /// the next call.
    pub fn read_ready(&mut self) -> Result<String, SourceError> {
        let new = self.read_new()?;
        self.pending.extend_from_slice(&new);
        let Some(split) = self.pending.iter().rposition(|&b| b == b'\n') else {
            return Ok(String::new());
        };
        let ready: Vec<u8> = self.pending.drain(..=split).collect();
        Ok(String::from_utf8_lossy(&ready[..ready.len() - 1]).into_owned())
    }

    /// Reposition the read cursor backward from end-of-file by a number of
    /// classified entries and/or an in-file time window.
    ///
    /// The scan walks backward one physical line at a time. A line the
    /// classifier accepts is an entry boundary: it consumes the entry
    /// budget and moves the rolling timestamp used for the window test. A
    /// rejected line is a continuation and consumes nothing, but is
    /// counted so a window stop can step the cursor forward past the
    /// excluded boundary entry and its continuation lines.
    ///
    /// Rewinds always start over from end-of-file; they are not
    /// cumulative. An absent or empty file leaves the cursor untouched.
    pub fn rewind(
        &mut self,
        spec: Rewind,
        now: NaiveDateTime,
        classifier: &dyn LineClassifier,
    ) -> Result<(), SourceError> {
        self.rewind_inner(spec, now, classifier)
            .map_err(|e| self.wrap(e))
    }

    fn rewind_inner(
        &mut self,
        spec: Rewind,
        now: NaiveDateTime,
        classifier: &dyn LineClassifier,
    ) -> io::Result<()> {
        let size = self.current_size();
        if size == 0 {
            return Ok(());
        }
        self.ensure_open()?;
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };

        let mut pos = size;
        if spec.entries.is_none() && spec.window.is_none() {
            self.offset = pos;
            return Ok(());
        }

        let limit = spec.window.map(|w| now - w);
        let mut stamp = now;
        let mut matched = 0usize;
        // Continuation counters for the current entry boundary and the one
        // before it (depth two is all the boundary adjustment needs).
        let mut current_run = 0usize;
        let mut previous_run: Option<usize> = None;

        loop {
            if pos == 0 {
                break;
            }
            if spec.entries.is_some_and(|budget| matched >= budget) {
                break;
            }
            if limit.is_some_and(|limit| stamp <= limit) {
                break;
            }

            pos = scan_back_one_line(file, pos)?;
            let line = read_line_at(file, pos)?;
            match classifier.classify(&line) {
                Some(event) => {
                    stamp = event.timestamp;
                    previous_run = Some(current_run);
                    current_run = 0;
                    matched += 1;
                }
                None => current_run += 1,
            }
        }

        // A window stop lands on the first entry outside the window; step
        // forward past that entry's header and its continuation lines so
        // the next read begins at a clean boundary. A pure entry-count
        // stop needs no adjustment.
        if pos > 0 && spec.window.is_some() {
            pos = skip_line(file, pos)?;
            for _ in 0..previous_run.unwrap_or(0) {
                pos = skip_line(file, pos)?;
            }
        }

        self.offset = pos;
        Ok(())
    }
}

/// Byte at `pos`, read through the handle
fn byte_at(file: &mut File, pos: u64) -> io::Result<u8> {
    file.seek(SeekFrom::Start(pos))?;
    let mut byte = [0u8; 1];
    file.read_exact(&mut byte)?;
    Ok(byte[0])
}

/// Step back to the start of the physical line preceding `pos`, scanning
/// byte-by-byte for the previous newline
fn scan_back_one_line(file: &mut File, pos: u64) -> io::Result<u64> {
    if pos < 2 {
        return Ok(0);
    }
    let mut p = pos - 2;
    while p > 0 && byte_at(file, p)? != b'\n' {
        p -= 1;
    }
    if p > 0 {
        p += 1;
    }
    Ok(p)
}

/// The physical line starting at `pos`, without its trailing newline
fn read_line_at(file: &mut File, pos: u64) -> io::Result<String> {
    file.seek(SeekFrom::Start(pos))?;
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    while file.read(&mut byte)? != 0 {
        if byte[0] == b'\n' {
            break;
        }
        buf.push(byte[0]);
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// `pos` advanced past one physical line, trailing newline included
fn skip_line(file: &mut File, pos: u64) -> io::Result<u64> {
    file.seek(SeekFrom::Start(pos))?;
    let mut advanced = pos;
    let mut byte = [0u8; 1];
    while file.read(&mut byte)? != 0 {
        advanced += 1;
        if byte[0] == b'\n' {
            break;
        }
    }
    Ok(advanced)
}
