//! Arcade CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments or unknown game
//! - 3: Generation or launch failure
//! - 4: Another game is already running

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod active;

use commands::{AppContext, Cli, CliError, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const SESSION_FAILURE: u8 = 3;
    pub const ALREADY_RUNNING: u8 = 4;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // stdout carries the event stream, so logs go to stderr
    let default_filter = if cli.verbose {
        "arcade=debug,warn"
    } else {
        "arcade=info,warn"
    };
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let ctx = AppContext::from_cli(&cli);

    let result = match cli.command {
        Commands::Create(args) => commands::create::execute(args, &ctx).await,
        Commands::Remix(args) => commands::remix::execute(args, &ctx).await,
        Commands::Launch(args) => commands::launch::execute(args, &ctx).await,
        Commands::Stop(args) => commands::stop::execute(args, &ctx).await,
        Commands::List(args) => commands::list::execute(args, &ctx).await,
        Commands::Show(args) => commands::show::execute(args, &ctx).await,
        Commands::Delete(args) => commands::delete::execute(args, &ctx).await,
        Commands::Status(args) => commands::status::execute(args, &ctx).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    if let Some(cli_error) = e.downcast_ref::<CliError>() {
        return match cli_error {
            CliError::InvalidInput(_) | CliError::NotFound(_) => ExitCodes::INVALID_ARGS,
            CliError::AlreadyRunning => ExitCodes::ALREADY_RUNNING,
            CliError::SessionFailed(_) => ExitCodes::SESSION_FAILURE,
        };
    }

    if let Some(core_error) = e.downcast_ref::<arcade_core::CoreError>() {
        return match core_error {
            arcade_core::CoreError::GameNotFound(_) | arcade_core::CoreError::BuiltinGame(_) => {
                ExitCodes::INVALID_ARGS
            }
            arcade_core::CoreError::AlreadyRunning => ExitCodes::ALREADY_RUNNING,
            _ => ExitCodes::GENERAL_ERROR,
        };
    }

    ExitCodes::GENERAL_ERROR
}
