//! # tether
//!
//! A small supervisor that keeps a backend service alive exactly as long as the
//! frontend that depends on it. The backend is started first and given time to come
//! up, then the frontend is started. When the frontend exits (or tether is asked to
//! stop) both processes are shut down: a graceful request first, a forced kill after
//! the grace timeout.
//!
//! The entry point for embedders is [`core::supervisor::Supervisor`]; the `tether`
//! binary wires it to [`core::config_loader`], [`system::logging`] and
//! [`system::signals`].

/// Command line flags.
pub mod cli;
/// File names, defaults and exit statuses.
pub mod constants;
pub mod core;
/// Plain data shared by every layer.
pub mod models;
pub mod system;
