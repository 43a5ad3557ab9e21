//! Main entry point for repoquery CLI

use clap::Parser;
use repoquery::cli::Cli;
use repoquery::commands::execute_command;

fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging; the filter must be set before init
    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    // Execute the command
    if let Err(e) = execute_command(cli.command, cli.store.as_deref()) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
