//! # Resolver Abstraction
//!
//! The [`Resolver`] trait is the seam between the graph-walking engine, the
//! on-disk plan cache, and the operation surface above them. The cache wraps
//! an inner resolver and delegates on a miss, so both layers speak the same
//! three operations.
//!
//! Every operation either succeeds with a complete result or fails with a
//! [`ResolverError`]; a partial graph is never returned.

use std::future::Future;

use semver::Version;

use crate::Coordinate;
use crate::coordinate::CoordinateError;
use crate::version::{VersionError, VersionSpec};

//================================================================================================
// Types
//================================================================================================

/// Errors surfaced by dependency resolution.
///
/// Cache corruption is deliberately absent: a damaged plan or version file is
/// discarded and re-resolved internally, never reported to the caller.
#[derive(thiserror::Error, Debug)]
pub enum ResolverError {
    /// No configured repository could be reached at all.
    #[error("no repository is reachable: {reason}")]
    RepositoryUnavailable {
        /// Description of the underlying transport failure.
        reason: String,
    },
    /// No published version of the artifact satisfies the requested spec.
    #[error("no version of `{group}:{artifact}` matches `{spec}`")]
    NoMatchingVersion {
        /// The requested group.
        group: String,
        /// The requested artifact.
        artifact: String,
        /// The symbolic version token that went unsatisfied.
        spec: String,
    },
    /// A binary-extension edge failed its verification chain.
    #[error("verification failed for `{coordinate}`")]
    VerificationFailed {
        /// The coordinate whose companions did not verify.
        coordinate: Coordinate,
    },
    /// An accepted artifact could not be materialized into the store.
    #[error("failed to fetch `{coordinate}` (via {})", render_path(path))]
    FetchFailed {
        /// The coordinate that failed to download.
        coordinate: Coordinate,
        /// The dependency path from the resolution root to the failed node.
        path: Vec<Coordinate>,
    },
    /// A descriptor declared a dependency string that does not parse.
    #[error(transparent)]
    Coordinate(#[from] CoordinateError),
    /// A descriptor declared a version token that does not parse.
    #[error(transparent)]
    Version(#[from] VersionError),
}

//================================================================================================
// Traits
//================================================================================================

/// The three resolution operations shared by the remote engine and its cache.
pub trait Resolver {
    /// Resolves a symbolic version token against the published versions of
    /// `coordinate`'s artifact, returning the highest concrete match.
    fn resolve_version(
        &self,
        coordinate: &Coordinate,
        spec: &VersionSpec,
    ) -> impl Future<Output = Result<Version, ResolverError>> + Send;

    /// Resolves only the immediate dependencies of `root`, fetched and
    /// located, without walking further.
    fn resolve_direct_dependencies(
        &self,
        root: &Coordinate,
    ) -> impl Future<Output = Result<Vec<Coordinate>, ResolverError>> + Send;

    /// Resolves the full transitive graph under `root`.
    ///
    /// The result lists the root first, followed by every accepted node in
    /// depth-first pre-order, each carrying the local path it was fetched to.
    fn resolve_transitive_dependencies(
        &self,
        root: &Coordinate,
    ) -> impl Future<Output = Result<Vec<Coordinate>, ResolverError>> + Send;
}

//================================================================================================
// Functions
//================================================================================================

fn render_path(path: &[Coordinate]) -> String {
    if path.is_empty() {
        return "the resolution root".to_string();
    }
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}
