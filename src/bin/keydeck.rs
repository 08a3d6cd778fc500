// src/bin/keydeck.rs

use anyhow::Result;
use clap::Parser;
use colored::*;
use keydeck::cli::args::Cli;
use keydeck::cli::init::{self, InitError};
use keydeck::cli::interactive::InteractiveLoop;
use keydeck::core::config_loader::{self, ConfigError};
use keydeck::system::executor::ExecutionError;
use std::env;

/// Entry point: sets up logging, parses arguments, runs the interactive loop
/// and performs centralized error handling with the documented exit codes
/// (1 for configuration and runtime failures, 2 for an `--init` target that
/// already exists, 130 for interruption).
fn main() {
    env_logger::init();

    if let Err(e) = run_cli(Cli::parse()) {
        if let Some(init_err) = e.downcast_ref::<InitError>()
            && matches!(init_err, InitError::AlreadyExists(_))
        {
            eprintln!("\n{}: {}", "Error".red().bold(), init_err);
            std::process::exit(2);
        }
        if let Some(exec_err) = e.downcast_ref::<ExecutionError>()
            && matches!(exec_err, ExecutionError::Interrupted)
        {
            // A clean, shell-like exit for interruption.
            std::process::exit(130);
        }
        if let Some(config_err) = e.downcast_ref::<ConfigError>() {
            eprintln!("\n{}: {}", "Error".red().bold(), config_err);
            std::process::exit(1);
        }
        eprintln!("\n{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);

    if let Some(format) = &cli.init {
        let target = init::handle(format, &env::current_dir()?)?;
        println!(
            "Created starter configuration at '{}'.",
            target.display().to_string().green()
        );
        return Ok(());
    }

    let path = config_loader::discover(cli.file.as_deref())?;
    log::debug!("loading configuration from {}", path.display());
    let file = config_loader::load(&path)?;
    let root = config_loader::build_root(&file)?;

    InteractiveLoop::new(root).run()
}
