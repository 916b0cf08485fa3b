// EN: src/constants.rs

use std::time::Duration;

/// The name of the configuration file looked up next to the supervisor and in the user config dir.
pub const CONFIG_FILENAME: &str = "tether.toml";

/// The name of the directory (inside the system config dir) holding the user-level config.
pub const CONFIG_DIR_NAME: &str = "tether";

/// The default log file, written next to the supervisor executable.
pub const LOG_FILENAME: &str = "tether.log";

/// Tag written on every log line so the supervisor's output is easy to tell apart.
pub const LOG_TAG: &str = "TETHER";

/// Default directory of the backend executable, relative to the base directory.
pub const DEFAULT_BACKEND_DIR: &str = "backend";
/// Default file stem of the backend executable (the platform suffix is appended).
pub const DEFAULT_BACKEND_STEM: &str = "backend_service";

/// Default directory of the frontend executable, relative to the base directory.
pub const DEFAULT_FRONTEND_DIR: &str = "frontend";
/// Default file stem of the frontend executable.
pub const DEFAULT_FRONTEND_STEM: &str = "app";

/// How long the backend is given to initialize before the frontend is launched.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(5_000);

/// How long a process may take to honor a graceful stop before it is killed.
pub const DEFAULT_GRACE_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Upper bound for the TCP readiness probe when one is configured.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Delay between two TCP readiness probe attempts.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_millis(200);

/// How long to wait for the OS to reap a process after a force kill.
pub const KILL_REAP_TIMEOUT: Duration = Duration::from_millis(2_000);

/// Exit status used by the supervisor for fatal errors.
pub const EXIT_FAILURE: i32 = 1;

/// Exit status used when the supervisor itself was interrupted (Ctrl+C, SIGTERM).
pub const EXIT_INTERRUPTED: i32 = 130;
