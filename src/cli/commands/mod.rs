mod deps;
mod resolve;
mod version;

use std::sync::Arc;

use archive::{
    CachingResolver, Coordinate, ExclusionFilter, HttpRepository, Manifest, RemoteResolver,
    SignatureVerifier, VerifierChain,
};
use clap::Subcommand;
use config::CONFIG;

use super::Args;

/// The resolver stack every subcommand runs against.
type CliResolver = CachingResolver<RemoteResolver<HttpRepository>>;

#[derive(Subcommand)]
pub(super) enum Commands {
    /// Resolve and materialize an archive's dependency graph.
    ///
    /// Walks the full transitive graph of the given coordinate (or of the
    /// archive.toml in the current directory), verifies binary extensions
    /// against the trusted keyring, fetches every accepted artifact into
    /// the local store, and prints the resolved graph with its locations.
    ///
    /// Repeated resolutions of the same root are served from the on-disk
    /// plan cache without touching the network.
    #[command(verbatim_doc_comment)]
    Resolve(resolve::Args),
    /// Display an archive's dependencies.
    ///
    /// Renders the resolved dependency tree, or with --direct only the
    /// first-level edges, without printing store locations.
    #[command(verbatim_doc_comment)]
    Deps(deps::Args),
    /// Resolve a symbolic version token to a concrete version.
    ///
    /// Accepts the `latest` token or a bracketed range such as `[1.2,2.0)`
    /// and prints the highest published version satisfying it.
    #[command(verbatim_doc_comment)]
    Version(version::Args),
}

pub async fn run(args: Args) -> anyhow::Result<()> {
    match args.command {
        Commands::Resolve(args) => resolve::run(args).await,
        Commands::Deps(args) => deps::run(args).await,
        Commands::Version(args) => version::run(resolver(None), args).await,
    }
}

/// Assembles the production resolver stack from the application
/// configuration, layering a manifest's own repositories and exclusion
/// patterns over the configured ones when the root comes from one.
fn resolver(manifest: Option<&Manifest>) -> CliResolver {
    let verifier = match SignatureVerifier::load(&CONFIG.trust.keyring) {
        Ok(signatures) => VerifierChain::new().register(Arc::new(signatures)),
        Err(e) => {
            tracing::warn!(
                path = %CONFIG.trust.keyring.display(),
                error = %e,
                "no usable keyring, binary extensions will not be signature-checked"
            );
            VerifierChain::new()
        },
    };

    let mut index = HttpRepository::from_config();
    if let Some(manifest) = manifest {
        index = index.with_remotes(manifest.repositories().iter().cloned());
    }

    let mut remote = RemoteResolver::new(index, Arc::new(verifier), CONFIG.store.root.clone());
    if let Some(manifest) = manifest {
        let layered = ExclusionFilter::new(CONFIG.resolver.exclusions.iter().cloned())
            .merged(manifest.exclusion_filter().patterns().iter().cloned());
        remote = remote.with_exclusions(layered);
    }
    CachingResolver::new(remote)
}

/// The root to resolve and the resolver stack in effect for it: an explicit
/// coordinate string resolves with the configured exclusions alone, while
/// the manifest in the current directory contributes its declared edges,
/// repositories and exclusion patterns.
fn context(spec: Option<&str>) -> anyhow::Result<(Coordinate, CliResolver)> {
    match spec {
        Some(spec) => Ok((spec.parse()?, resolver(None))),
        None => {
            let dir = std::env::current_dir()?;
            let manifest = Manifest::load(&dir)?;
            let root = manifest.root_coordinate()?;
            Ok((root, resolver(Some(&manifest))))
        },
    }
}
