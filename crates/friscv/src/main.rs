//! FRISC-V CLI - lock-step RTL vs Spike co-simulation

mod cli;
mod commands;
mod terminal;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let metrics_handle = if cli.metrics {
        friscv::metrics::CliRecorder::new().install()
    } else {
        None
    };
    friscv::metrics::init();

    let default_level = if cli.verbose {
        "friscv=debug"
    } else if cli.silent {
        "friscv=error"
    } else {
        match &cli.command {
            Commands::Batch { .. } => "friscv=warn",
            _ => "friscv=info",
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(default_level.parse().unwrap()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let exit_code = commands::run_command(&cli);

    if let Some(handle) = metrics_handle {
        handle.print_summary();
    }

    std::process::exit(exit_code);
}
