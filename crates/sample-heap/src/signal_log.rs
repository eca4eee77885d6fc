//! The per-process signal log file.
//!
//! Records are appended with `O_APPEND | O_SYNC` and one `write` per record,
//! so a consumer tailing the file never sees a partial line once a write has
//! returned. The file is reopened for every record; nothing is buffered in
//! between.

use core::fmt::Write as _;
use std::{
    fs::{self, OpenOptions},
    io::{self, Write as _},
    os::unix::fs::OpenOptionsExt as _,
};

use arrayvec::ArrayString;
use snafu::{ResultExt as _, ensure};

use crate::{
    error::{CreateLogSnafu, LogPathSnafu, SampleHeapError},
    record::Record,
};

/// Longest signal log path.
pub const MAX_PATH_LEN: usize = 256;

/// Longest formatted record, newline included.
const MAX_RECORD_LEN: usize = 64;

const LOG_MODE: u32 = 0o600;

/// Owner of the signal log file. Dropping it removes the file.
#[derive(Debug)]
pub struct SignalLog {
    path: ArrayString<MAX_PATH_LEN>,
}

impl SignalLog {
    /// Creates `<dir>/<prefix><pid>`, truncating a stale file of the same
    /// name.
    pub fn create(
        dir: &'static str,
        prefix: &'static str,
        pid: u32,
    ) -> Result<Self, SampleHeapError> {
        let mut path = ArrayString::new();
        let formatted = write!(path, "{dir}/{prefix}{pid}").is_ok();
        ensure!(formatted, LogPathSnafu { dir, prefix });

        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(LOG_MODE)
            .open(path.as_str())
            .context(CreateLogSnafu { path })?;

        Ok(Self { path })
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Appends one record and syncs it to the file.
    pub fn append(&self, record: &Record) -> io::Result<()> {
        let mut line = ArrayString::<MAX_RECORD_LEN>::new();
        if writeln!(line, "{record}").is_err() {
            return Err(io::ErrorKind::InvalidData.into());
        }

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .mode(LOG_MODE)
            .custom_flags(libc::O_SYNC)
            .open(self.path.as_str())?;
        file.write_all(line.as_bytes())
    }

    fn remove(&self) -> io::Result<()> {
        match fs::remove_file(self.path.as_str()) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

impl Drop for SignalLog {
    fn drop(&mut self) {
        match self.remove() {
            Ok(()) => debug!("removed signal log {}", self.path),
            Err(err) => warn!("failed to remove signal log {}: {err}", self.path),
        }
    }
}
