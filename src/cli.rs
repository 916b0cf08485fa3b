// EN: src/cli.rs

use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// tether: starts a backend service, then its frontend, and tears the backend down
/// as soon as the frontend exits.
///
/// Every option can also be set in a `tether.toml` file. Flags given on the
/// command line win over the file. Lookup order for the file:
///
/// 1. `--config <path>`
/// 2. `tether.toml` next to the tether executable
/// 3. `tether/tether.toml` in the user's config directory
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a `tether.toml` configuration file.
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Directory that relative paths in the configuration are resolved against.
    /// Defaults to the configuration file's directory, or to tether's own directory.
    #[arg(long)]
    pub base_dir: Option<PathBuf>,

    /// Path to the backend executable.
    #[arg(long)]
    pub backend: Option<PathBuf>,

    /// Arguments for the backend, as a single shell-quoted string.
    #[arg(long, allow_hyphen_values = true)]
    pub backend_args: Option<String>,

    /// Path to the frontend executable.
    #[arg(long)]
    pub frontend: Option<PathBuf>,

    /// Arguments for the frontend, as a single shell-quoted string.
    #[arg(long, allow_hyphen_values = true)]
    pub frontend_args: Option<String>,

    /// How long to let the backend start before launching the frontend.
    #[arg(long, value_name = "MS")]
    pub settle_delay_ms: Option<u64>,

    /// Wait until the backend accepts TCP connections on this address
    /// (e.g. `127.0.0.1:8000`) instead of waiting a fixed delay.
    #[arg(long, value_name = "HOST:PORT")]
    pub ready_tcp: Option<String>,

    /// Give up on the TCP readiness probe after this long.
    #[arg(long, value_name = "MS")]
    pub probe_timeout_ms: Option<u64>,

    /// How long a process gets to stop after a graceful request before it is killed.
    #[arg(long, value_name = "MS")]
    pub grace_timeout_ms: Option<u64>,

    /// Write the log to this file instead of `tether.log` in the base directory.
    #[arg(long, conflicts_with = "no_log_file")]
    pub log_file: Option<PathBuf>,

    /// Do not write a log file.
    #[arg(long)]
    pub no_log_file: bool,

    /// Do not echo the log to stdout.
    #[arg(long, short)]
    pub quiet: bool,

    /// Increase log verbosity (-v for debug, -vv for trace).
    #[arg(long, short, action = ArgAction::Count)]
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_full_command_line() {
        let cli = Cli::try_parse_from([
            "tether",
            "--backend",
            "srv/backend",
            "--backend-args",
            "--port 8000 --name 'my app'",
            "--frontend",
            "ui/app",
            "--grace-timeout-ms",
            "1500",
            "--ready-tcp",
            "127.0.0.1:8000",
            "-vv",
            "-q",
        ])
        .unwrap();

        assert_eq!(cli.backend, Some(PathBuf::from("srv/backend")));
        assert_eq!(cli.backend_args.as_deref(), Some("--port 8000 --name 'my app'"));
        assert_eq!(cli.frontend, Some(PathBuf::from("ui/app")));
        assert_eq!(cli.grace_timeout_ms, Some(1500));
        assert_eq!(cli.ready_tcp.as_deref(), Some("127.0.0.1:8000"));
        assert_eq!(cli.verbose, 2);
        assert!(cli.quiet);
    }

    #[test]
    fn test_log_file_conflicts_with_no_log_file() {
        let result = Cli::try_parse_from(["tether", "--log-file", "a.log", "--no-log-file"]);
        assert!(result.is_err());
    }
}
