use std::process::exit;

use clap::Parser;
use cli::{Commands, GlobalArgs, LogLevel};
use commands::{check::check, run::run};
use env_logger::Target;
use log::{error, LevelFilter};

use crate::cli::Cli;

mod bridge;
mod cli;
mod commands;
mod config;
mod docker;
mod kubernetes;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    configure_logging(&cli.global_args);

    let result = match cli.command {
        Some(Commands::Run(args)) => run(cli.global_args, args).await,
        Some(Commands::Check) => check(cli.global_args).await,
        None => Ok(()),
    };

    if let Err(error) = result {
        error!("{error:#}");
        exit(1);
    }
}

fn configure_logging(global_args: &GlobalArgs) {
    let log_level = global_args.get_log_level();
    let mut logger = env_logger::builder();

    logger
        .format_timestamp(None)
        .format_module_path(matches!(log_level, LogLevel::Trace))
        .format_target(false)
        .format_level(false)
        .target(Target::Stderr);

    if let LogLevel::Normal = log_level {
        logger.filter(Some("gefyra"), LevelFilter::Info);
    }

    if let LogLevel::Verbose = log_level {
        logger.filter(Some("gefyra"), LevelFilter::Debug);
    }

    if let LogLevel::Trace = log_level {
        logger.filter(None, LevelFilter::Debug);
    }

    logger.init();
}
