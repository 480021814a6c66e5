//! Main entry point for the micro3d CLI

// Reports go to stdout; diagnostics go through log
#![allow(clippy::print_stdout)]

use anyhow::Result;
use clap::Parser;

use micro3d_cli::cli::{Cli, Commands};
use micro3d_cli::commands;

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    if cli.verbose > 0 {
        log::set_max_level(match cli.verbose {
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        });
    } else if cli.quiet {
        log::set_max_level(log::LevelFilter::Error);
    }

    let options = cli.render_options();

    match cli.command {
        Commands::Mbac { command } => commands::mbac::execute(command),
        Commands::Mtra { command } => commands::mtra::execute(command),
        Commands::Pose(args) => commands::pose::execute(args),
        Commands::Bmp { command } => commands::bmp::execute(command),
        Commands::Cmdlist { command } => commands::cmdlist::execute(command, options),
    }
}
