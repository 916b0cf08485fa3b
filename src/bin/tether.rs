// EN: src/bin/tether.rs

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use tether::cli::Cli;
use tether::constants::EXIT_FAILURE;
use tether::core::config_loader::{self, Settings};
use tether::core::session::SessionReport;
use tether::core::supervisor::{Supervisor, SupervisorError};
use tether::system::{logging, signals};

fn main() {
    let cli = Cli::parse();

    let settings = match config_loader::load(&cli).and_then(|settings| {
        logging::init(&settings.log)?;
        Ok(settings)
    }) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("\n{}: {:#}", "Error".red().bold(), e);
            std::process::exit(EXIT_FAILURE);
        }
    };

    match supervise(settings) {
        Ok(report) => {
            match &report.outcome {
                Ok(_) | Err(SupervisorError::Interrupted) => {}
                Err(e) => eprintln!("\n{}: {}", "Error".red().bold(), e),
            }
            std::process::exit(report.exit_status());
        }
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("\n{}: {:#}", "Error".red().bold(), e);
            std::process::exit(EXIT_FAILURE);
        }
    }
}

/// Runs one supervision session to completion on a fresh runtime.
fn supervise(settings: Settings) -> Result<SessionReport> {
    log::debug!("Resolved settings: {:?}", settings);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    let supervisor = Supervisor::new(settings.plan);
    Ok(runtime.block_on(supervisor.run_until(signals::stop_requested())))
}
