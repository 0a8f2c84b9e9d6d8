mod commands;
pub mod logging;

use std::path::PathBuf;

use clap::Parser;
pub use commands::run;
pub use logging::init_global_subscriber;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Run as if started in this directory
    ///
    /// Relative paths, including the `archive.toml` manifest lookup,
    /// resolve against it.
    #[arg(short = 'C', value_name = "DIR", global = true, value_parser = validate_path)]
    working_directory: Option<PathBuf>,

    #[command(flatten)]
    pub log: LogArgs,

    #[command(subcommand)]
    command: commands::Commands,
}

#[derive(Parser, Clone, Copy, Debug)]
#[command(next_help_heading = "Log Options")]
pub struct LogArgs {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    ///
    /// The `RUST_LOG` environment variable takes precedence when set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbosity: u8,

    /// Decrease logging verbosity (-q for WARN, -qq for ERROR)
    ///
    /// Overrides both `--verbosity` and `RUST_LOG`.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    quiet: u8,
}

impl Args {
    /// Applies the `-C` flag before any command touches the filesystem.
    pub fn change_directory(&self) -> std::io::Result<()> {
        match &self.working_directory {
            Some(dir) => std::env::set_current_dir(dir),
            None => Ok(()),
        }
    }
}

fn validate_path(path: &str) -> Result<PathBuf, std::io::Error> {
    std::fs::canonicalize(path)
}
