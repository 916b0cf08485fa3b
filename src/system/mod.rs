//! # System Interaction Layer
//!
//! The boundary between the supervision logic and the operating system.
//!
//! ## Modules
//!
//! - **`process`**: Spawns one child process and owns it until it is reaped. Knows how
//!   to ask it to stop (`SIGTERM` on Unix) and how to kill it outright.
//! - **`logging`**: Installs the process-wide logger that writes to `tether.log` and,
//!   optionally, stdout.
//! - **`signals`**: Resolves when tether itself is told to stop (Ctrl+C, `SIGTERM`,
//!   `SIGHUP`).

/// Logger setup.
pub mod logging;
/// One managed child process.
pub mod process;
/// Stop requests aimed at tether itself.
pub mod signals;
