// EN: src/system/logging.rs

use crate::constants::LOG_TAG;
use anyhow::{Context, Result};
use env_logger::{Builder, Target, WriteStyle};
use log::LevelFilter;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

/// Where and how verbosely the supervisor logs.
///
/// Built once at startup from the resolved settings and handed to [`init`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Most verbose level that is written.
    pub level: LevelFilter,
    /// Log file, appended to. `None` disables file logging.
    pub file: Option<PathBuf>,
    /// Also write every line to stdout.
    pub echo_stdout: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            file: None,
            echo_stdout: true,
        }
    }
}

/// Installs the process-wide logger described by `config`.
///
/// Lines look like `2025-01-01T10:00:00.000Z - TETHER - INFO - Backend started with PID: 42`.
/// `RUST_LOG` is still honored on top of the configured level.
///
/// # Errors
/// Fails if the log file cannot be opened or a logger is already installed.
pub fn init(config: &LogConfig) -> Result<()> {
    let writer = TeeWriter::open(config)?;

    Builder::new()
        .filter_level(config.level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {} - {}",
                buf.timestamp_millis(),
                LOG_TAG,
                record.level(),
                record.args()
            )
        })
        .write_style(WriteStyle::Never)
        .target(Target::Pipe(Box::new(writer)))
        .try_init()
        .context("Could not install the logger")?;

    log::debug!("Logging initialized: {:?}", config);
    Ok(())
}

/// Duplicates log output to a file and, optionally, stdout.
#[derive(Debug)]
pub struct TeeWriter {
    file: Option<File>,
    echo_stdout: bool,
}

impl TeeWriter {
    /// Opens the log file in append mode, creating its directory if needed.
    pub fn open(config: &LogConfig) -> Result<Self> {
        let file = match &config.file {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create log directory '{}'", parent.display())
                    })?;
                }
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("Failed to open log file '{}'", path.display()))?;
                Some(file)
            }
            None => None,
        };

        Ok(Self {
            file,
            echo_stdout: config.echo_stdout,
        })
    }
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.echo_stdout {
            io::stdout().write_all(buf)?;
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.echo_stdout {
            io::stdout().flush()?;
        }
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}
