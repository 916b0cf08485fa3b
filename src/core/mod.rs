// EN: src/core/mod.rs

//! Supervision logic, independent of how it is configured or where events are logged.

pub mod config_loader;
/// Lifecycle events and the observer they are reported to.
pub mod events;
pub mod readiness;
/// The session state machine and its final report.
pub mod session;
/// Startup ordering, monitoring and two-stage shutdown.
pub mod supervisor;
