//! Rolling Logger
//!
//! File logger with size-based rotation and an in-memory circular buffer
//! holding the most recent lines. Records from both `tracing` and the `log`
//! facade end up in the same sink.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use tracing_subscriber::fmt::MakeWriter;

/// Errors raised while setting up the logger
#[derive(Debug)]
pub enum LoggerError {
    Io(io::Error),
    AlreadyInitialized(String),
}

impl std::fmt::Display for LoggerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoggerError::Io(e) => write!(f, "Log file error: {}", e),
            LoggerError::AlreadyInitialized(msg) => write!(f, "Logger already initialized: {}", msg),
        }
    }
}

impl std::error::Error for LoggerError {}

impl From<io::Error> for LoggerError {
    fn from(e: io::Error) -> Self {
        LoggerError::Io(e)
    }
}

/// Logger tuning knobs
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Rotate once the active file grows past this many bytes
    pub max_file_bytes: u64,
    /// Number of rotated files kept next to the active one
    pub max_files: usize,
    /// Lines kept in the in-memory buffer
    pub buffer_lines: usize,
    /// Most verbose level written
    pub level: log::LevelFilter,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 1024 * 1024,
            max_files: 3,
            buffer_lines: 500,
            level: log::LevelFilter::Info,
        }
    }
}

// ========================
// Circular Buffer
// ========================

/// Fixed-capacity line buffer, oldest lines fall off the front
#[derive(Debug)]
pub struct RingBuffer {
    lines: VecDeque<String>,
    capacity: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn push(&mut self, line: String) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }
}

// ========================
// Rolling File Sink
// ========================

/// Active log file plus rotation bookkeeping
pub struct RollingFile {
    dir: PathBuf,
    base_name: String,
    max_bytes: u64,
    max_files: usize,
    file: File,
    written: u64,
    buffer: RingBuffer,
    pending: String,
}

impl RollingFile {
    pub fn open(dir: &Path, base_name: &str, config: &LoggerConfig) -> Result<Self, LoggerError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.log", base_name));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata().map(|m| m.len()).unwrap_or(0);
        Ok(Self {
            dir: dir.to_path_buf(),
            base_name: base_name.to_string(),
            max_bytes: config.max_file_bytes,
            max_files: config.max_files,
            file,
            written,
            buffer: RingBuffer::new(config.buffer_lines),
            pending: String::new(),
        })
    }

    fn path_for(&self, index: usize) -> PathBuf {
        if index == 0 {
            self.dir.join(format!("{}.log", self.base_name))
        } else {
            self.dir.join(format!("{}.{}.log", self.base_name, index))
        }
    }

    /// Shift `name.N.log` -> `name.N+1.log`, dropping the oldest
    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.max_files == 0 {
            self.file = OpenOptions::new().create(true).write(true).truncate(true).open(self.path_for(0))?;
            self.written = 0;
            return Ok(());
        }
        let oldest = self.path_for(self.max_files);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for index in (0..self.max_files).rev() {
            let from = self.path_for(index);
            if from.exists() {
                fs::rename(&from, self.path_for(index + 1))?;
            }
        }
        self.file = OpenOptions::new().create(true).append(true).open(self.path_for(0))?;
        self.written = 0;
        Ok(())
    }

    /// Feed text into the line buffer; complete lines are mirrored into the ring
    fn capture(&mut self, text: &str) {
        self.pending.push_str(text);
        while let Some(pos) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=pos).collect();
            self.buffer.push(line.trim_end().to_string());
        }
    }

    pub fn recent_lines(&self) -> Vec<String> {
        self.buffer.lines()
    }
}

impl Write for RollingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        self.file.write_all(buf)?;
        self.written += buf.len() as u64;
        self.capture(&String::from_utf8_lossy(buf));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Shared handle handed to the fmt subscriber
#[derive(Clone)]
pub struct SharedSink(Arc<Mutex<RollingFile>>);

impl SharedSink {
    pub fn new(file: RollingFile) -> Self {
        Self(Arc::new(Mutex::new(file)))
    }

    fn lock(&self) -> MutexGuard<'_, RollingFile> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn recent_lines(&self) -> Vec<String> {
        self.lock().recent_lines()
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock().flush()
    }
}

impl<'a> MakeWriter<'a> for SharedSink {
    type Writer = SharedSink;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

// ========================
// Global Logger
// ========================

static SINK: OnceLock<SharedSink> = OnceLock::new();

fn to_tracing_level(level: log::LevelFilter) -> tracing_subscriber::filter::LevelFilter {
    use tracing_subscriber::filter::LevelFilter;
    match level {
        log::LevelFilter::Off => LevelFilter::OFF,
        log::LevelFilter::Error => LevelFilter::ERROR,
        log::LevelFilter::Warn => LevelFilter::WARN,
        log::LevelFilter::Info => LevelFilter::INFO,
        log::LevelFilter::Debug => LevelFilter::DEBUG,
        log::LevelFilter::Trace => LevelFilter::TRACE,
    }
}

/// Initialize the global logger with default settings
pub fn init_logger(log_dir: impl AsRef<Path>, app_name: &str) -> Result<(), LoggerError> {
    init_logger_with(log_dir, app_name, LoggerConfig::default())
}

/// Initialize the global logger writing to `<log_dir>/<app_name>.log`
pub fn init_logger_with(
    log_dir: impl AsRef<Path>,
    app_name: &str,
    config: LoggerConfig,
) -> Result<(), LoggerError> {
    if SINK.get().is_some() {
        return Err(LoggerError::AlreadyInitialized(app_name.to_string()));
    }
    let mut file = RollingFile::open(log_dir.as_ref(), app_name, &config)?;
    writeln!(
        file,
        "=== {} session started {} ===",
        app_name,
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f")
    )?;
    let sink = SharedSink::new(file);

    tracing_subscriber::fmt()
        .with_writer(sink.clone())
        .with_ansi(false)
        .with_target(true)
        .with_max_level(to_tracing_level(config.level))
        .try_init()
        .map_err(|e| LoggerError::AlreadyInitialized(e.to_string()))?;

    let _ = SINK.set(sink);
    Ok(())
}

/// Recent lines from the in-memory buffer (empty before init)
pub fn recent_lines() -> Vec<String> {
    SINK.get().map(|s| s.recent_lines()).unwrap_or_default()
}

pub fn info(msg: &str) {
    tracing::info!("{}", msg);
}

pub fn warn(msg: &str) {
    tracing::warn!("{}", msg);
}

pub fn error(msg: &str) {
    tracing::error!("{}", msg);
}
