//! Reopenable log files behind the `logforth` logger.
//!
//! The application log and the web access log are both [`LogFile`]s. A
//! `LogFile` can be rotated (closed and reopened at the same path, so an
//! external tool may move the old file away) and closed for good at shutdown.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use anyhow::{Context, Result};
use chrono::Utc;
use log::{LevelFilter, Record};
use parking_lot::Mutex;

use crate::conf::LogSettings;

#[derive(Debug, Default)]
struct LogFileInner {
    path: Option<PathBuf>,
    file: Option<File>,
    closed: bool,
}

/// A shared handle on a log destination.
///
/// Without a path, lines go to stdout. After `close()`, lines go to stderr
/// until the file is reopened.
#[derive(Debug, Clone, Default)]
pub struct LogFile {
    inner: Arc<Mutex<LogFileInner>>,
}

fn open_append(path: &Path) -> Result<File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    }
    OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}

impl LogFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Points the handle at `path`; an empty path means stdout.
    pub fn open(&self, path: &str) -> Result<()> {
        let path = path.trim();
        let mut inner = self.inner.lock();
        if path.is_empty() {
            inner.path = None;
            inner.file = None;
            inner.closed = false;
            return Ok(());
        }

        let path = PathBuf::from(path);
        let file = open_append(&path)?;
        inner.path = Some(path);
        inner.file = Some(file);
        inner.closed = false;
        Ok(())
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.inner.lock().path.clone()
    }

    pub fn is_file(&self) -> bool {
        self.inner.lock().path.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Closes the current handle and opens the same path again.
    pub fn rotate(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some(mut old) = inner.file.take() {
            let _ = old.flush();
        }
        inner.closed = false;
        if let Some(path) = inner.path.clone() {
            inner.file = Some(open_append(&path)?);
        }
        Ok(())
    }

    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if let Some(mut f) = inner.file.take() {
            let _ = f.flush();
        }
        inner.closed = true;
    }

    pub fn write_line(&self, line: &str) -> io::Result<()> {
        let mut inner = self.inner.lock();
        if let Some(f) = inner.file.as_mut() {
            return writeln!(f, "{}", line);
        }
        if inner.closed {
            return writeln!(io::stderr(), "{}", line);
        }
        writeln!(io::stdout(), "{}", line)
    }
}

/// The two log destinations of the process.
#[derive(Debug, Clone, Default)]
pub struct Logs {
    pub app: LogFile,
    pub access: LogFile,
}

impl Logs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the configured files and the application log level.
    pub fn apply(&self, app: &LogSettings, access: &LogSettings) -> Result<()> {
        self.app.open(&app.file)?;
        log::set_max_level(app.level_filter());
        log::info!(
            "Application log: {}",
            self.app
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "stdout".to_string())
        );

        self.access.open(&access.file)?;
        if let Some(p) = self.access.path() {
            log::info!("Web access log: {}", p.display());
        }
        Ok(())
    }

    pub fn rotate(&self) {
        for (name, f) in [("application", &self.app), ("access", &self.access)] {
            if let Err(err) = f.rotate() {
                log::error!("Failed to rotate the {} log: {:#}", name, err);
            }
        }
    }

    pub fn close(&self) {
        self.access.close();
        self.app.close();
    }
}

/// `logforth` appender writing formatted records into a [`LogFile`].
#[derive(Debug)]
pub struct FileAppender {
    file: LogFile,
}

impl FileAppender {
    pub fn new(file: LogFile) -> Self {
        Self { file }
    }
}

fn format_record(record: &Record) -> String {
    format!(
        "{} {:>5} {}: {}",
        Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
        record.level(),
        record.target(),
        record.args()
    )
}

impl logforth::Append for FileAppender {
    fn append(
        &self,
        record: &Record,
        _diagnostics: &[logforth::Diagnostic],
    ) -> anyhow::Result<()> {
        self.file.write_line(&format_record(record))?;
        Ok(())
    }
}

/// Installs the global logger; must be called once per process.
pub fn init(logs: &Logs) {
    let appender = FileAppender::new(logs.app.clone());
    logforth::builder()
        .dispatch(|d| d.filter(LevelFilter::Trace).append(appender))
        .apply();
    log::set_max_level(LevelFilter::Info);
}

pub fn parse_level(level: &str) -> LevelFilter {
    LevelFilter::from_str(level.trim()).unwrap_or(LevelFilter::Info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_level(" WARN "), LevelFilter::Warn);
        assert_eq!(parse_level("verbose"), LevelFilter::Info);
    }

    #[test]
    fn test_rotate_reopens_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/app.log");
        let rotated = dir.path().join("logs/app.log.1");

        let f = LogFile::new();
        f.open(path.to_str().unwrap()).unwrap();
        f.write_line("first").unwrap();

        fs::rename(&path, &rotated).unwrap();
        f.write_line("second").unwrap();
        f.rotate().unwrap();
        f.write_line("third").unwrap();

        assert_eq!(fs::read_to_string(&rotated).unwrap(), "first\nsecond\n");
        assert_eq!(fs::read_to_string(&path).unwrap(), "third\n");
    }

    #[test]
    fn test_close_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");

        let f = LogFile::new();
        f.open(path.to_str().unwrap()).unwrap();
        f.write_line("before").unwrap();
        f.close();
        assert!(f.is_closed());
        f.write_line("dropped to stderr").unwrap();

        f.rotate().unwrap();
        assert!(!f.is_closed());
        f.write_line("after").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "before\nafter\n");
    }

    #[test]
    fn test_stdout_without_path() {
        let f = LogFile::new();
        assert!(!f.is_file());
        assert!(f.rotate().is_ok());
        assert!(f.write_line("to stdout").is_ok());
    }
}
