mod cli;
mod config;
mod render;
mod session;

use std::process::ExitCode;

use followscan_engine::EXTENSION_VERSION;
use scan_logging::{scan_error, scan_info};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse(std::env::args().skip(1)) {
        Ok(cli::Command::Run(args)) => args,
        Ok(cli::Command::Help) => {
            println!("{}", cli::usage());
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            eprintln!("{err}\n\n{}", cli::usage());
            return ExitCode::from(2);
        }
    };

    let config = match config::AppConfig::load(&args.config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err:#}");
            return ExitCode::FAILURE;
        }
    };
    scan_logging::initialize(args.log, config.level(), &config.log_path);
    scan_info!(
        "followscan {} starting (config {:?})",
        EXTENSION_VERSION,
        args.config_path
    );

    match session::run(&args, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            scan_error!("{:#}", err);
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
