//! The append-only event log on disk.
//!
//! All durable state is a single JSONL file, one event per line, inside the
//! store directory (`.weft/` by default). Append order is the total order of
//! the log; nothing is ever rewritten in place except by compaction, which
//! goes through an atomic whole-file replace.
//!
//! Crash tolerance is asymmetric on purpose. A malformed FINAL line is the
//! signature of an interrupted append and is dropped with a notice. A
//! malformed INTERIOR line means the log was edited or damaged and is fatal,
//! because everything after it replayed against a state we cannot trust.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Error, Result};
use crate::event::Event;
use crate::lock::{write_atomic, FileLock};

/// Event log file name, relative to the store directory.
pub const EVENTS_LOG: &str = "events.jsonl";

/// Lock file name, relative to the store directory.
pub const LOCK_FILE: &str = "graph.lock";

/// Notice that a truncated final line was dropped during a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncationNotice {
    pub path: PathBuf,
    pub line: usize,
}

/// Handle to one on-disk store directory.
#[derive(Debug, Clone)]
pub struct EventStore {
    dir: PathBuf,
    lock_timeout_ms: u64,
}

impl EventStore {
    /// Open an existing store. Fails with [`Error::NotInitialized`] when the
    /// log is absent.
    pub fn open(dir: impl Into<PathBuf>, lock_timeout_ms: u64) -> Result<Self> {
        let store = Self {
            dir: dir.into(),
            lock_timeout_ms,
        };
        if !store.is_initialized() {
            return Err(Error::NotInitialized(store.dir));
        }
        Ok(store)
    }

    /// Create the store directory and an empty log. Idempotent.
    pub fn init(dir: impl Into<PathBuf>, lock_timeout_ms: u64) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let log = dir.join(EVENTS_LOG);
        if !log.exists() {
            fs::write(&log, b"")?;
        }
        Ok(Self {
            dir,
            lock_timeout_ms,
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.log_path().is_file()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(EVENTS_LOG)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    /// Take the writer lock. Held for the duration of a read-validate-append
    /// critical section; pure readers never call this.
    pub fn lock(&self) -> Result<FileLock> {
        FileLock::acquire(self.lock_path(), self.lock_timeout_ms)
    }

    /// Append events to the log, one JSON line each, and flush to disk.
    pub fn append(&self, events: &[Event]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut buf = Vec::new();
        for event in events {
            serde_json::to_writer(&mut buf, event)?;
            buf.push(b'\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path())?;
        file.write_all(&buf)?;
        file.sync_all()?;
        Ok(())
    }

    /// Read and decode the whole log in append order.
    ///
    /// A malformed final line is dropped and reported via the notice; a
    /// malformed interior line is [`Error::Corrupt`].
    pub fn read_all(&self) -> Result<(Vec<Event>, Option<TruncationNotice>)> {
        let path = self.log_path();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotInitialized(self.dir.clone()));
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let lines: Vec<(usize, &str)> = raw
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx + 1, line))
            .filter(|(_, line)| !line.trim().is_empty())
            .collect();

        let mut events = Vec::with_capacity(lines.len());
        let mut notice = None;

        for (pos, &(line_no, line)) in lines.iter().enumerate() {
            match serde_json::from_str::<Event>(line) {
                Ok(event) => events.push(event),
                Err(e) if pos + 1 == lines.len() => {
                    // Interrupted append: the writer died mid-line. The
                    // prefix is still a valid log.
                    warn!(path = %path.display(), line = line_no, "dropping truncated final line");
                    notice = Some(TruncationNotice {
                        path: path.clone(),
                        line: line_no,
                    });
                    let _ = e;
                }
                Err(e) => {
                    return Err(Error::Corrupt {
                        path: path.clone(),
                        line: line_no,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok((events, notice))
    }

    /// Replace the entire log with `events`, atomically.
    ///
    /// Callers hold the writer lock across the read that produced `events`
    /// and this replace, so no append can slip in between.
    pub fn replace_all(&self, events: &[Event]) -> Result<()> {
        let mut buf = Vec::new();
        for event in events {
            serde_json::to_writer(&mut buf, event)?;
            buf.push(b'\n');
        }
        write_atomic(self.log_path(), &buf)
    }
}
