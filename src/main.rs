//! The main entry point for the Harbor CLI.

#![warn(missing_docs)]

use std::process::ExitCode;

use clap::Parser;
use harbor::cli::{self, Args};

//================================================================================================
// Functions
//================================================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let _guard = cli::init_global_subscriber(args.log);

    if let Err(e) = args.change_directory() {
        harbor::fatal!(e);
        return ExitCode::FAILURE;
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Ctrl+C received, terminating...");
            ExitCode::SUCCESS
        }
        res = cli::run(args) => {
            if let Err(e) = res {
                harbor::fatal!(e);
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
    }
}
