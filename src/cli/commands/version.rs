//! This module defines the `version` subcommand.
//!
//! The `version` subcommand pins a symbolic version token against the
//! published versions of an artifact.

use std::str::FromStr;

use anyhow::Result;
use archive::Resolver;
use archive::version::VersionSpec;
use clap::Parser;

use super::CliResolver;

//================================================================================================
// Types
//================================================================================================

/// The `version` subcommand.
#[derive(Parser, Debug)]
#[command(arg_required_else_help = true)]
pub struct Args {
    /// The coordinate carrying the token, e.g. `com.example:app:arc:[1.0,2.0)`
    /// or `com.example:app` for `latest`.
    coordinate: String,
}

//================================================================================================
// Functions
//================================================================================================

/// The main entry point for the `version` subcommand.
pub(super) async fn run(resolver: CliResolver, args: Args) -> Result<()> {
    let coordinate = archive::Coordinate::from_str(&args.coordinate)?;
    let spec = VersionSpec::from_str(coordinate.version())?;

    let version = resolver.resolve_version(&coordinate, &spec).await?;
    println!("{version}");
    Ok(())
}
