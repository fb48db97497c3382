//! Run audit log
//!
//! One append-only file per run plus a colored console echo. Lines look
//! like `[2024-03-09 14:05:07] Processing: web1`.

use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local};
use colored::Colorize;
use tracing::warn;

use crate::error::CoreError;

/// Console color for an audit line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Progress,
    Success,
    Failure,
}

/// Timestamped transcript of a rotation run
#[derive(Debug)]
pub struct AuditLog {
    file: Option<Mutex<LineWriter<File>>>,
    path: Option<PathBuf>,
    console: bool,
}

impl AuditLog {
    /// Open `update_log_<YYYYmmdd_HHMMSS>.txt` in `dir`, named after `started`
    ///
    /// # Errors
    /// Returns `CoreError::Io` if the directory or file cannot be created
    pub fn create(dir: &Path, started: DateTime<Local>) -> Result<Self, CoreError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!(
            "update_log_{}.txt",
            started.format("%Y%m%d_%H%M%S")
        ));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            file: Some(Mutex::new(LineWriter::new(file))),
            path: Some(path),
            console: true,
        })
    }

    /// Console output only, nothing persisted
    #[must_use]
    pub fn console_only() -> Self {
        Self {
            file: None,
            path: None,
            console: true,
        }
    }

    /// Toggle the stdout echo
    #[must_use]
    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    /// Path of the log file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write one timestamped line
    ///
    /// A failing log file is reported through tracing and never interrupts
    /// the run.
    pub fn record(&self, tone: Tone, message: &str) {
        let line = format_line(Local::now(), message);

        if self.console {
            let shown = match tone {
                Tone::Plain => line.normal(),
                Tone::Progress => line.yellow(),
                Tone::Success => line.green(),
                Tone::Failure => line.red(),
            };
            println!("{shown}");
        }

        if let Some(file) = &self.file {
            let mut writer = match file.lock() {
                Ok(w) => w,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Err(e) = writeln!(writer, "{line}") {
                warn!(error = %e, "failed to write audit log line");
            }
        }
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.record(Tone::Plain, message.as_ref());
    }

    pub fn progress(&self, message: impl AsRef<str>) {
        self.record(Tone::Progress, message.as_ref());
    }

    pub fn success(&self, message: impl AsRef<str>) {
        self.record(Tone::Success, message.as_ref());
    }

    pub fn failure(&self, message: impl AsRef<str>) {
        self.record(Tone::Failure, message.as_ref());
    }
}

fn format_line(at: DateTime<Local>, message: &str) -> String {
    format!("[{}] {message}", at.format("%Y-%m-%d %H:%M:%S"))
}
