use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use queue_sim::simulation::config::{CommandLineArgs, Config};
use queue_sim::simulation::controller;
use queue_sim::simulation::logging::init_std_out_logging_thread_local;

fn main() -> ExitCode {
    let _guard = init_std_out_logging_thread_local();

    let args = CommandLineArgs::parse();
    info!("Started with args: {:?}", args);

    let config = match Config::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };

    match controller::run(config) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Simulation failed: {e}");
            ExitCode::FAILURE
        }
    }
}
