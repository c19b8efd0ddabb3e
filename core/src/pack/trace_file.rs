//! Trace sink behind `debug function`
//!
//! The file is created on the first event, named after the time it was
//! opened: `<trace_dir>/debug-<timestamp>.txt`. Each `debug function` run
//! builds its own `TraceFile`; the file is flushed when the run drops it.

use crate::engine::{TraceSink, TraceWriter};
use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub struct TraceFile {
    dir: PathBuf,
    path: Option<PathBuf>,
    writer: Option<TraceWriter<File>>,
    failed: bool,
}

impl TraceFile {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            path: None,
            writer: None,
            failed: false,
        }
    }

    /// Path of the trace file, once created
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn writer(&mut self) -> Option<&mut TraceWriter<File>> {
        if self.writer.is_none() && !self.failed {
            match self.open() {
                Ok((path, file)) => {
                    tracing::debug!(path = %path.display(), "Trace file created");
                    self.path = Some(path);
                    self.writer = Some(TraceWriter::new(file));
                }
                Err(e) => {
                    tracing::warn!(dir = %self.dir.display(), error = %e, "Failed to create trace file");
                    self.failed = true;
                }
            }
        }
        self.writer.as_mut()
    }

    /// Never overwrites: a clash within the same millisecond gets a suffix
    fn open(&self) -> std::io::Result<(PathBuf, File)> {
        fs::create_dir_all(&self.dir)?;
        let stamp = Utc::now().format("%Y-%m-%d_%H.%M.%S%.3f").to_string();
        let mut attempt = 0;
        loop {
            let name = match attempt {
                0 => format!("debug-{}.txt", stamp),
                n => format!("debug-{}-{}.txt", stamp, n),
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e),
            }
        }
    }
}

impl TraceSink for TraceFile {
    fn on_command(&mut self, depth: usize, command: &str) {
        if let Some(w) = self.writer() {
            w.on_command(depth, command);
        }
    }

    fn on_return(&mut self, depth: usize, command: &str, result: i32) {
        if let Some(w) = self.writer() {
            w.on_return(depth, command, result);
        }
    }

    fn on_call(&mut self, depth: usize, function: &str, entries: usize) {
        if let Some(w) = self.writer() {
            w.on_call(depth, function, entries);
        }
    }

    fn on_error(&mut self, message: &str) {
        if let Some(w) = self.writer() {
            w.on_error(message);
        }
    }

    fn on_message(&mut self, message: &str) {
        if let Some(w) = self.writer() {
            w.on_message(message);
        }
    }
}

impl Drop for TraceFile {
    fn drop(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            if let Err(e) = w.finish() {
                tracing::warn!(error = %e, "Failed to flush trace file");
            }
        }
    }
}
