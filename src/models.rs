// EN: src/models.rs

use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use crate::constants::{DEFAULT_GRACE_TIMEOUT, DEFAULT_SETTLE_DELAY, EXIT_FAILURE};

// --- LAUNCH MODELS (What the supervisor is asked to run) ---

/// The two processes a session coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The long-lived service started first and stopped last.
    Backend,
    /// The user-facing process whose exit ends the session.
    Frontend,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend => f.write_str("backend"),
            Self::Frontend => f.write_str("frontend"),
        }
    }
}

/// Describes an executable to run and the directory to run it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Path to the program. Relative paths resolve against the supervisor's cwd.
    pub executable: PathBuf,
    /// Arguments passed verbatim, without a shell.
    pub args: Vec<String>,
    /// Explicit working directory. `None` means "the executable's own directory".
    pub working_dir: Option<PathBuf>,
    /// Ask the OS not to open a console window for the process (Windows only).
    pub hide_console: bool,
}

impl LaunchSpec {
    /// A spec with no arguments that runs from the executable's directory.
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            args: Vec::new(),
            working_dir: None,
            hide_console: false,
        }
    }

    /// Builds the spec for a backend service: it always runs from its own directory
    /// and never gets a console window.
    pub fn backend(executable: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            args,
            hide_console: true,
            ..Self::new(executable)
        }
    }

    /// Replaces the argument list.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Overrides the directory the process starts in.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// The directory the process will be started in.
    ///
    /// Falls back to the executable's parent, and to `.` for a bare file name.
    pub fn effective_working_dir(&self) -> PathBuf {
        if let Some(dir) = &self.working_dir {
            return dir.clone();
        }
        match self.executable.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Whether the executable path exists on disk.
    pub fn executable_exists(&self) -> bool {
        self.executable.exists()
    }
}

/// How the supervisor decides the backend is ready to serve the frontend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Wait a fixed duration, then assume the backend is up.
    Delay(Duration),
    /// Connect to `address` every `interval` until it accepts or `timeout` elapses.
    TcpProbe {
        /// `host:port` the backend listens on.
        address: String,
        /// Overall budget for the probe.
        timeout: Duration,
        /// Pause between two connection attempts.
        interval: Duration,
    },
}

impl Default for Readiness {
    fn default() -> Self {
        Self::Delay(DEFAULT_SETTLE_DELAY)
    }
}

/// Everything a supervisor needs for one session.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    /// Started first, stopped last.
    pub backend: LaunchSpec,
    /// Started once the backend is ready. Its exit ends the session.
    pub frontend: LaunchSpec,
    /// Gate between the two launches.
    pub readiness: Readiness,
    /// How long a graceful stop may take before the process is killed.
    pub grace_timeout: Duration,
}

impl LaunchPlan {
    /// A plan with the default readiness delay and grace timeout.
    pub fn new(backend: LaunchSpec, frontend: LaunchSpec) -> Self {
        Self {
            backend,
            frontend,
            readiness: Readiness::default(),
            grace_timeout: DEFAULT_GRACE_TIMEOUT,
        }
    }
}

// --- PROCESS STATE MODELS ---

/// Observed lifecycle state of a managed process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Spawned and not yet observed to exit.
    Running,
    /// Exited on its own with code 0.
    ExitedNormally,
    /// Exited on its own with a non-zero code or a signal.
    ExitedWithError,
    /// A graceful stop was sent and the exit has not been observed yet.
    TerminationRequested,
    /// Forcefully terminated by the supervisor.
    Killed,
}

impl ProcessState {
    /// Whether the process may still be running from the supervisor's point of view.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Running | Self::TerminationRequested)
    }
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitCode {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Terminating signal, Unix only.
    pub signal: Option<i32>,
}

impl ExitCode {
    /// An exit with `code` and no signal.
    pub fn from_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    /// Whether the process exited with code 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Maps the exit to a status the supervisor can itself exit with.
    ///
    /// Signals follow the shell convention of `128 + signal`.
    pub fn as_status(&self) -> i32 {
        match (self.code, self.signal) {
            (Some(code), _) => code,
            (None, Some(signal)) => 128 + signal,
            (None, None) => EXIT_FAILURE,
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "code {}", code),
            (None, Some(signal)) => write!(f, "signal {}", signal),
            (None, None) => f.write_str("unknown status"),
        }
    }
}

/// Result of a bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The process exited within the bound.
    Exited(ExitCode),
    /// The bound elapsed first. The process may still be running.
    TimedOut,
}

/// A snapshot of a managed process, kept after its handle is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessSummary {
    /// Which side of the session the process was.
    pub role: Role,
    /// OS process id assigned at spawn.
    pub pid: u32,
    /// Last observed state.
    pub state: ProcessState,
}
