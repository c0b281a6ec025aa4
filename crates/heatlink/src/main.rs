//! `heatlink` binary entry point: argument parsing, tracing setup, and
//! command dispatch with miette error reporting.

mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::error::CliError;

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("HEATLINK_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Login(args) => commands::login::run(&cli.global, args).await,
        Command::Devices(args) => commands::devices::run(&cli.global, args).await,
        Command::Set(args) => commands::set::run(&cli.global, args).await,
        Command::Vane(args) => commands::vane::run(&cli.global, args).await,
        Command::Watch(args) => commands::watch::run(&cli.global, args).await,
        Command::Config(args) => commands::config_cmd::run(&cli.global, args),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
