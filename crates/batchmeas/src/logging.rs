use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log file size that triggers rotation (5 MB)
const MAX_LOG_SIZE: u64 = 5 * 1024 * 1024;
/// Most recent bytes kept by a rotation (1 MB)
const KEEP_SIZE: u64 = 1024 * 1024;

pub const LOG_FILE: &str = "batchmeas.log";

/// Where log lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    /// `batchmeas.log` in the data directory
    File,
}

/// Trim the log to its last KEEP_SIZE bytes once it exceeds MAX_LOG_SIZE
fn rotate_log_if_needed(log_path: &Path) -> io::Result<()> {
    if !log_path.exists() {
        return Ok(());
    }
    let size = fs::metadata(log_path)?.len();
    if size <= MAX_LOG_SIZE {
        return Ok(());
    }

    let mut file = File::open(log_path)?;
    file.seek(SeekFrom::Start(size.saturating_sub(KEEP_SIZE)))?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    drop(file);

    // Drop the partial first line
    let skip = buffer
        .iter()
        .position(|&b| b == b'\n')
        .map_or(0, |i| i + 1);

    let mut file = File::create(log_path)?;
    file.write_all(b"--- Log rotated (older entries removed) ---\n")?;
    file.write_all(&buffer[skip..])?;
    Ok(())
}

/// Hands out writers to the shared log file
#[derive(Clone)]
struct LogWriterFactory {
    file: Arc<Mutex<File>>,
}

struct LogWriter {
    file: Arc<Mutex<File>>,
}

impl LogWriter {
    fn with_file<T>(&self, f: impl FnOnce(&mut File) -> io::Result<T>) -> io::Result<T> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        f(&mut *file)
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with_file(|file| file.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with_file(|file| file.flush())
    }
}

impl<'a> MakeWriter<'a> for LogWriterFactory {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            file: self.file.clone(),
        }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides `level`. With [`LogTarget::File`] the log is
/// appended to `{data_dir}/batchmeas.log`, rotated by size.
pub fn init_logging(data_dir: &Path, level: &str, target: LogTarget) -> color_eyre::Result<()> {
    let default_filter = format!("batchmeas={level},batchmeas_core={level}");
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter));
    let registry = tracing_subscriber::registry().with(env_filter);

    match target {
        LogTarget::Stderr => {
            registry
                .with(fmt::layer().with_writer(io::stderr).with_target(false))
                .init();
        }
        LogTarget::File => {
            fs::create_dir_all(data_dir)?;
            let log_path = data_dir.join(LOG_FILE);
            if let Err(e) = rotate_log_if_needed(&log_path) {
                eprintln!("Warning: Failed to rotate log file: {e}");
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)?;
            let writer = LogWriterFactory {
                file: Arc::new(Mutex::new(file)),
            };
            registry
                .with(
                    fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_target(true)
                        .with_thread_ids(false),
                )
                .init();
            tracing::info!(log_path = %log_path.display(), "logging to file");
        }
    }
    Ok(())
}
