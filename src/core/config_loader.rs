//! # Config Loader
//!
//! Turns the command line, an optional `tether.toml` and built-in defaults into the
//! [`Settings`] for one run: the [`LaunchPlan`] handed to the supervisor and the
//! [`LogConfig`] handed to the logger.
//!
//! Precedence is always CLI flag, then file value, then default. Relative paths in
//! the file are resolved against the base directory; relative paths on the command
//! line are resolved against the current directory, like any other CLI tool.

use crate::cli::Cli;
use crate::constants::{
    CONFIG_DIR_NAME, CONFIG_FILENAME, DEFAULT_BACKEND_DIR, DEFAULT_BACKEND_STEM,
    DEFAULT_FRONTEND_DIR, DEFAULT_FRONTEND_STEM, DEFAULT_GRACE_TIMEOUT, DEFAULT_PROBE_INTERVAL,
    DEFAULT_PROBE_TIMEOUT, DEFAULT_SETTLE_DELAY, LOG_FILENAME,
};
use crate::models::{LaunchPlan, LaunchSpec, Readiness};
use crate::system::logging::LogConfig;
use anyhow::{Context, Result, anyhow, bail};
use log::LevelFilter;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

// --- `tether.toml` MODELS ---

/// The deserialized structure of a `tether.toml` file. Every key is optional.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// `[backend]`
    pub backend: BackendSection,
    /// `[frontend]`
    pub frontend: FrontendSection,
    /// `[timing]`
    pub timing: TimingSection,
    /// `[log]`
    pub log: LogSection,
}

/// The backend service. It always runs from its own directory.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct BackendSection {
    /// Path to the executable. `~` and `$VARS` are expanded.
    pub executable: Option<String>,
    /// Arguments, one per element.
    pub args: Vec<String>,
}

/// The frontend application.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FrontendSection {
    /// Path to the executable. `~` and `$VARS` are expanded.
    pub executable: Option<String>,
    /// Arguments, one per element.
    pub args: Vec<String>,
    /// Directory to start in. Defaults to the executable's directory.
    pub working_dir: Option<String>,
}

/// Startup and shutdown timing.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TimingSection {
    /// Fixed wait between the two launches.
    pub settle_delay_ms: Option<u64>,
    /// Time a process gets to stop before it is killed.
    pub grace_timeout_ms: Option<u64>,
    /// Probe this `host:port` instead of waiting a fixed delay.
    pub ready_tcp: Option<String>,
    /// Budget for the TCP probe.
    pub probe_timeout_ms: Option<u64>,
}

/// Logging output.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LogSection {
    /// Log file path. Defaults to `tether.log` in the base directory.
    pub file: Option<String>,
    /// `error`, `warn`, `info`, `debug` or `trace`.
    pub level: Option<String>,
    /// Also write the log to stdout. Defaults to `true`.
    pub echo_stdout: Option<bool>,
}

// --- RESOLVED SETTINGS ---

/// Everything a run needs, fully resolved.
#[derive(Debug, Clone)]
pub struct Settings {
    /// What the supervisor runs.
    pub plan: LaunchPlan,
    /// How the logger is set up.
    pub log: LogConfig,
    /// Directory relative file paths were resolved against.
    pub base_dir: PathBuf,
    /// The configuration file that was read, if any.
    pub config_path: Option<PathBuf>,
}

/// Loads the settings for this run.
///
/// # Errors
/// Fails if an explicitly requested config file is missing, if a config file cannot
/// be read or parsed, or if a value in it is invalid.
pub fn load(cli: &Cli) -> Result<Settings> {
    let exe_dir = supervisor_dir()?;
    let config_path = locate_config(cli.config.as_deref(), &exe_dir)?;

    let file = match &config_path {
        Some(path) => read_config(path)?,
        None => FileConfig::default(),
    };

    let base_dir = match (&cli.base_dir, &config_path) {
        (Some(dir), _) => absolute(dir)?,
        (None, Some(path)) => path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| exe_dir.clone()),
        (None, None) => exe_dir,
    };
    log::debug!(
        "Base directory: '{}', config file: {:?}",
        base_dir.display(),
        config_path
    );

    let mut settings = resolve(cli, &file, &base_dir)?;
    settings.config_path = config_path;
    Ok(settings)
}

/// Merges CLI flags over `file` values over defaults.
pub fn resolve(cli: &Cli, file: &FileConfig, base_dir: &Path) -> Result<Settings> {
    // --- Backend ---
    let backend_exe = match (&cli.backend, &file.backend.executable) {
        (Some(path), _) => absolute(path)?,
        (None, Some(raw)) => resolve_path(raw, base_dir)?,
        (None, None) => default_executable(base_dir, DEFAULT_BACKEND_DIR, DEFAULT_BACKEND_STEM),
    };
    let backend_args = match &cli.backend_args {
        Some(raw) => split_args(raw)?,
        None => file.backend.args.clone(),
    };

    // --- Frontend ---
    let frontend_exe = match (&cli.frontend, &file.frontend.executable) {
        (Some(path), _) => absolute(path)?,
        (None, Some(raw)) => resolve_path(raw, base_dir)?,
        (None, None) => default_executable(base_dir, DEFAULT_FRONTEND_DIR, DEFAULT_FRONTEND_STEM),
    };
    let frontend_args = match &cli.frontend_args {
        Some(raw) => split_args(raw)?,
        None => file.frontend.args.clone(),
    };
    let mut frontend = LaunchSpec::new(frontend_exe).with_args(frontend_args);
    if let Some(raw) = &file.frontend.working_dir {
        frontend = frontend.with_working_dir(resolve_path(raw, base_dir)?);
    }

    // --- Timing ---
    let timing = &file.timing;
    let readiness = match cli.ready_tcp.as_ref().or(timing.ready_tcp.as_ref()) {
        Some(address) => Readiness::TcpProbe {
            address: address.clone(),
            timeout: millis_or(
                cli.probe_timeout_ms.or(timing.probe_timeout_ms),
                DEFAULT_PROBE_TIMEOUT,
            ),
            interval: DEFAULT_PROBE_INTERVAL,
        },
        None => Readiness::Delay(millis_or(
            cli.settle_delay_ms.or(timing.settle_delay_ms),
            DEFAULT_SETTLE_DELAY,
        )),
    };
    let grace_timeout = millis_or(
        cli.grace_timeout_ms.or(timing.grace_timeout_ms),
        DEFAULT_GRACE_TIMEOUT,
    );

    // --- Logging ---
    let log = resolve_log(cli, &file.log, base_dir)?;

    Ok(Settings {
        plan: LaunchPlan {
            backend: LaunchSpec::backend(backend_exe, backend_args),
            frontend,
            readiness,
            grace_timeout,
        },
        log,
        base_dir: base_dir.to_path_buf(),
        config_path: None,
    })
}

fn resolve_log(cli: &Cli, section: &LogSection, base_dir: &Path) -> Result<LogConfig> {
    let configured = match &section.level {
        Some(raw) => LevelFilter::from_str(raw)
            .map_err(|_| anyhow!("Invalid log level '{}' in configuration", raw))?,
        None => LevelFilter::Info,
    };
    let level = match cli.verbose {
        0 => configured,
        1 => configured.max(LevelFilter::Debug),
        _ => LevelFilter::Trace,
    };

    let file = if cli.no_log_file {
        None
    } else {
        match (&cli.log_file, &section.file) {
            (Some(path), _) => Some(absolute(path)?),
            (None, Some(raw)) => Some(resolve_path(raw, base_dir)?),
            (None, None) => Some(base_dir.join(LOG_FILENAME)),
        }
    };

    Ok(LogConfig {
        level,
        file,
        echo_stdout: !cli.quiet && section.echo_stdout.unwrap_or(true),
    })
}

/// Finds the configuration file for this run, if any.
///
/// An explicit path must exist. Otherwise the file next to the executable wins over
/// the one in the user's config directory, and having neither is not an error.
pub fn locate_config(explicit: Option<&Path>, exe_dir: &Path) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.is_file() {
            bail!("Configuration file '{}' does not exist", path.display());
        }
        return Ok(Some(absolute(path)?));
    }

    let beside_exe = exe_dir.join(CONFIG_FILENAME);
    if beside_exe.is_file() {
        return Ok(Some(beside_exe));
    }

    let user_config = dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILENAME));
    Ok(user_config.filter(|path| path.is_file()))
}

/// Reads and parses one `tether.toml`.
pub fn read_config(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file '{}'", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse configuration file '{}'", path.display()))
}

/// Expands `~` and environment variables, then anchors relative paths at `base_dir`.
pub fn resolve_path(raw: &str, base_dir: &Path) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw)
        .map_err(|e| anyhow!("Failed to expand path '{}': {}", raw, e))?;
    let path = PathBuf::from(expanded.into_owned());
    let anchored = if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    };
    Ok(dunce::simplified(&anchored).to_path_buf())
}

/// Directory holding the running supervisor executable.
fn supervisor_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Failed to get current executable path")?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("Executable path '{}' has no parent directory", exe.display()))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path)
        .with_context(|| format!("Failed to make '{}' absolute", path.display()))?;
    Ok(dunce::simplified(&absolute).to_path_buf())
}

fn default_executable(base_dir: &Path, dir: &str, stem: &str) -> PathBuf {
    base_dir
        .join(dir)
        .join(format!("{}{}", stem, std::env::consts::EXE_SUFFIX))
}

fn split_args(raw: &str) -> Result<Vec<String>> {
    shlex::split(raw).ok_or_else(|| anyhow!("Could not parse arguments: {}", raw))
}

fn millis_or(value: Option<u64>, default: Duration) -> Duration {
    value.map(Duration::from_millis).unwrap_or(default)
}
