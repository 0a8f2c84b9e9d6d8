//! This module defines the `resolve` subcommand.
//!
//! The `resolve` subcommand materializes the full dependency graph of a
//! root coordinate into the local store and prints each resolved node with
//! the path it landed at.

use anyhow::Result;
use archive::Resolver;
use clap::Parser;
use tracing::Instrument;

//================================================================================================
// Types
//================================================================================================

/// The `resolve` subcommand.
#[derive(Parser, Debug)]
pub struct Args {
    /// The coordinate to resolve, e.g. `com.example:app:arc:1.0.0`.
    ///
    /// When omitted, the archive.toml in the current directory supplies
    /// the root.
    coordinate: Option<String>,
}

//================================================================================================
// Functions
//================================================================================================

/// The main entry point for the `resolve` subcommand.
pub(super) async fn run(args: Args) -> Result<()> {
    let (root, resolver) = super::context(args.coordinate.as_deref())?;

    let resolved = resolver
        .resolve_transitive_dependencies(&root)
        .instrument(tracing::info_span!("resolve", root = %root))
        .await?;

    tracing::info!(root = %root, nodes = resolved.len(), "resolution complete");
    for coordinate in &resolved {
        match coordinate.location() {
            Some(location) => println!("{coordinate} {}", location.display()),
            None => println!("{coordinate}"),
        }
    }
    Ok(())
}
