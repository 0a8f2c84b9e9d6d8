//! This module defines the `deps` subcommand.
//!
//! The `deps` subcommand resolves an archive's dependencies and renders
//! them for inspection, either as the full tree or as the first-level
//! edges only.

use anyhow::Result;
use archive::Resolver;
use archive::graph::render_tree;
use clap::Parser;
use tracing::Instrument;

//================================================================================================
// Types
//================================================================================================

/// The `deps` subcommand.
#[derive(Parser, Debug)]
pub struct Args {
    /// The coordinate to inspect, e.g. `com.example:app:arc:1.0.0`.
    ///
    /// When omitted, the archive.toml in the current directory supplies
    /// the root.
    coordinate: Option<String>,

    /// Only list the first-level dependencies.
    #[arg(long)]
    direct: bool,
}

//================================================================================================
// Functions
//================================================================================================

/// The main entry point for the `deps` subcommand.
pub(super) async fn run(args: Args) -> Result<()> {
    let (root, resolver) = super::context(args.coordinate.as_deref())?;
    let span = tracing::info_span!("deps", root = %root);

    if args.direct {
        let direct = resolver
            .resolve_direct_dependencies(&root)
            .instrument(span)
            .await?;
        for coordinate in &direct {
            println!("{coordinate}");
        }
        return Ok(());
    }

    let resolved = resolver
        .resolve_transitive_dependencies(&root)
        .instrument(span)
        .await?;
    print!("{}", render_tree(&resolved));
    Ok(())
}
