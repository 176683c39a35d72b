//! Logging setup for depth-matte.
//!
//! Installs an `env_logger` backend writing `[timestamp] [LEVEL] [target] message`
//! lines to stderr, optionally teed to a daily log file with size-based rotation
//! and cleanup of old files.

use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{MatteResult, ResultExt};

/// Maximum log file size before rotation (5MB)
const MAX_LOG_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum number of log files to keep
const MAX_LOG_FILES: usize = 5;

const LOG_PREFIX: &str = "depth_matte";

/// Initialize the global logger.
///
/// The default level is `info`; `RUST_LOG` overrides it. With `log_dir` set,
/// every line is also appended to `depth_matte_<date>.log` in that directory.
pub fn init_logging(log_dir: Option<&Path>) -> MatteResult<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    builder.format(|buf, record| {
        writeln!(
            buf,
            "{}",
            format_line(&record.level().to_string(), record.target(), &record.args().to_string())
        )
    });

    if let Some(dir) = log_dir {
        let file = RotatingFile::open(dir, MAX_LOG_SIZE, MAX_LOG_FILES)?;
        builder.target(env_logger::Target::Pipe(Box::new(TeeWriter { file })));
    }

    builder
        .try_init()
        .context("Failed to install logger")?;

    log::info!("[LOGGING] Logging system initialized");
    if let Some(dir) = log_dir {
        log::info!("[LOGGING] Log directory: {:?}", dir);
    }
    Ok(())
}

/// Render one log line (without the trailing newline).
pub fn format_line(level: &str, target: &str, message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
    format!("[{}] [{}] [{}] {}", timestamp, level, target, message)
}

fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

fn log_path_for(log_dir: &Path, date: &str) -> PathBuf {
    log_dir.join(format!("{}_{}.log", LOG_PREFIX, date))
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Remove old log files, keeping only the newest `keep`.
fn cleanup_old_logs(log_dir: &Path, keep: usize) {
    let Ok(entries) = fs::read_dir(log_dir) else {
        return;
    };

    let mut log_files: Vec<_> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map(|ext| ext == "log").unwrap_or(false))
        .collect();

    // Newest first
    log_files.sort_by(|a, b| {
        let a_time = a.metadata().and_then(|m| m.modified()).ok();
        let b_time = b.metadata().and_then(|m| m.modified()).ok();
        b_time.cmp(&a_time).then_with(|| b.file_name().cmp(&a.file_name()))
    });

    for file in log_files.into_iter().skip(keep) {
        let _ = fs::remove_file(file.path());
    }
}

/// Append-only log file that rolls over once it exceeds `max_size` and
/// when the local date changes.
struct RotatingFile {
    dir: PathBuf,
    /// File currently being appended to.
    path: PathBuf,
    /// Date `path` was opened for.
    date: String,
    file: File,
    written: u64,
    max_size: u64,
    max_files: usize,
    rotations: u32,
}

impl RotatingFile {
    fn open(dir: &Path, max_size: u64, max_files: usize) -> MatteResult<Self> {
        fs::create_dir_all(dir)?;
        let date = today();
        let path = log_path_for(dir, &date);
        let file = open_append(&path)?;
        let written = file.metadata().map(|m| m.len()).unwrap_or(0);
        cleanup_old_logs(dir, max_files);

        Ok(Self {
            dir: dir.to_path_buf(),
            path,
            date,
            file,
            written,
            max_size,
            max_files,
            rotations: 0,
        })
    }

    /// Switch to the log file for `date`, appending if it already exists.
    fn roll_to(&mut self, date: String) -> io::Result<()> {
        let path = log_path_for(&self.dir, &date);
        let file = open_append(&path)?;
        self.written = file.metadata().map(|m| m.len()).unwrap_or(0);
        self.file = file;
        self.path = path;
        self.date = date;
        cleanup_old_logs(&self.dir, self.max_files);
        Ok(())
    }

    /// Move the open file aside and start it over empty.
    fn rotate(&mut self) -> io::Result<()> {
        // Reset first so a failed rename retries only after another `max_size`.
        self.written = 0;
        self.rotations += 1;
        let timestamp = Local::now().format("%Y-%m-%d_%H%M%S");
        let rotated = self.dir.join(format!(
            "{}_{}_{}.log",
            LOG_PREFIX, timestamp, self.rotations
        ));
        fs::rename(&self.path, &rotated)?;

        self.file = open_append(&self.path)?;
        cleanup_old_logs(&self.dir, self.max_files);
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // A failed roll or rotation keeps appending to the open file.
        let date = today();
        if date != self.date {
            let _ = self.roll_to(date);
        } else if self.written > self.max_size {
            let _ = self.rotate();
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Writes every record to stderr and the log file.
struct TeeWriter {
    file: RotatingFile,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let _ = io::stderr().write_all(buf);
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = io::stderr().flush();
        self.file.flush()
    }
}
