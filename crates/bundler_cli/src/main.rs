use std::process::ExitCode;

use bundler_cli::cli::Args;
use bundler_cli::{config, logging, pipeline};
use clap::Parser;
use engine_logging::{engine_error, level_for};

#[tokio::main]
async fn main() -> ExitCode {
    // Usage errors exit with status 2 from here.
    let args = Args::parse();

    if let Err(err) = logging::initialize(level_for(args.verbose, args.quiet), args.log_file.as_deref()) {
        eprintln!("Error: cannot open log file: {err}");
        return ExitCode::FAILURE;
    }

    let settings = match config::load_settings(args.config.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            engine_error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    match pipeline::run(args.command, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            engine_error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}
