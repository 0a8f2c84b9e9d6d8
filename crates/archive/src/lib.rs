//! # Archive Crate
//!
//! The `archive` crate provides the dependency-resolution engine underneath the
//! Harbor packaging tool. Callers ask for all artifacts needed to run an archive
//! `group:artifact:version` and receive a fully resolved, locally materialized
//! graph of files.
//!
//! ## Key Concepts
//!
//! **Coordinates** identify one artifact by its `(group, artifact, version,
//! extension)` tuple, optionally disambiguated by a classifier for side files
//! such as detached signatures.
//!
//! **Resolution** walks the transitive dependency graph of a root coordinate
//! against one or more remote repositories, prunes excluded and out-of-scope
//! edges, gates binary extensions behind a verification chain, and fetches every
//! accepted artifact into a shared local store in parallel.
//!
//! **Plans** memoize the outcome of a full resolution on disk so repeated
//! resolutions of the same root are served without any network traffic.
//!
//! ## Architecture
//!
//! The crate is organized into several key modules:
//! - [`coordinate`] - The immutable artifact coordinate value type.
//! - [`version`] - Symbolic version tokens (`latest`, bracketed ranges).
//! - [`exclude`] - Glob-pattern pruning of the dependency graph.
//! - [`verify`] - The pluggable trust gate for binary-extension edges.
//! - [`repository`] - The remote index abstraction and its HTTP client.
//! - [`graph`] - Transitive collection and parallel fetching.
//! - [`lock`] - Two-level locking over the shared artifact store.
//! - [`cache`] - On-disk memoization of resolved plans and versions.
//! - [`manifest`] - The `archive.toml` adapter producing root coordinates.
//! - [`surface`] - The published operation surface and its transform pipeline.
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use std::str::FromStr;
//!
//! use archive::Coordinate;
//!
//! let root = Coordinate::from_str("com.example:my-archive:1.0.0").unwrap();
//! ```

#![deny(missing_docs)]

pub use self::cache::CachingResolver;
pub use self::coordinate::{Coordinate, Extension, Scope};
pub use self::exclude::ExclusionFilter;
pub use self::graph::RemoteResolver;
pub use self::lock::LockManager;
pub use self::manifest::Manifest;
pub use self::repository::{HttpRepository, RepositoryIndex};
pub use self::resolver::{Resolver, ResolverError};
pub use self::verify::{SignatureVerifier, Verifier, VerifierChain};

pub mod cache;
pub mod coordinate;
pub mod exclude;
pub mod graph;
pub mod lock;
pub mod log;
pub mod manifest;
pub mod repository;
pub mod resolver;
pub mod surface;
pub mod verify;
pub mod version;

/// The conventional filename for an archive manifest.
pub const MANIFEST_NAME: &str = "archive.toml";
/// The plan file memoizing a remotely sourced root's resolved graph.
pub const PLAN_FILE_NAME: &str = "_resolver.plan";
/// The plan file memoizing a locally sourced root's resolved graph.
pub const LOCAL_PLAN_FILE_NAME: &str = "_local_resolver.plan";
/// The file memoizing a symbolic version resolution.
pub const VERSION_FILE_NAME: &str = "_resolver.version";
/// The directory under the store root holding advisory lock files.
pub const LOCK_DIR: &str = ".locks";
