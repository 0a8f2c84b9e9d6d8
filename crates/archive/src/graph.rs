//! # Graph Collection and Fetching
//!
//! [`RemoteResolver`] turns a root coordinate into a fully materialized
//! dependency graph in two phases.
//!
//! **Collection** walks breadth-first from the root, pinning symbolic
//! versions against the repository index as it goes. Out-of-scope edges are
//! never followed, excluded coordinates are pruned together with everything
//! below them, and when the same `(group, artifact, extension)` appears at
//! conflicting versions the occurrence nearest the root wins. Binary
//! extensions published alongside an archive join the graph as leaf children
//! of that archive.
//!
//! **Fetching** materializes every collected node into the store through a
//! bounded worker pool, holding the store locks for the whole batch. Binary
//! leaves must pass the signature [chain](crate::verify) before they count as
//! fetched. The first failure aborts the remaining workers and fails the
//! whole resolution; a partial graph is never returned.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use config::CONFIG;
use semver::Version;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::coordinate::{Extension, Origin};
use crate::lock::Access;
use crate::repository::IndexError;
use crate::{Coordinate, ExclusionFilter, LockManager, RepositoryIndex, Resolver, ResolverError};
use crate::{Verifier, version::VersionSpec};

//================================================================================================
// Types
//================================================================================================

/// Resolves dependency graphs directly against a repository index.
pub struct RemoteResolver<I> {
    index: Arc<I>,
    verifier: Arc<dyn Verifier>,
    locks: Arc<LockManager>,
    exclusions: ExclusionFilter,
    workers: usize,
}

/// One collected graph node, linked to its tree neighbors by index.
struct Node {
    coordinate: Coordinate,
    parent: Option<usize>,
    children: Vec<usize>,
    verify: bool,
}

enum FetchFailure {
    Unverified,
    Index(IndexError),
}

//================================================================================================
// Impls
//================================================================================================

impl<I> RemoteResolver<I>
where
    I: RepositoryIndex + Send + Sync + 'static,
{
    /// Creates a resolver over the given index, with the worker pool size and
    /// global exclusion patterns taken from the application configuration.
    pub fn new(index: I, verifier: Arc<dyn Verifier>, store_root: impl Into<PathBuf>) -> Self {
        Self {
            index: Arc::new(index),
            verifier,
            locks: Arc::new(LockManager::new(store_root)),
            exclusions: ExclusionFilter::new(CONFIG.resolver.exclusions.iter().cloned()),
            workers: CONFIG.resolver.workers,
        }
    }

    /// Returns self with the given exclusion filter in place of the
    /// configured one.
    pub fn with_exclusions(mut self, exclusions: ExclusionFilter) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// Returns self with a different worker pool size.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Substitutes a symbolic version token with its highest published match.
    async fn pin_version(&self, coordinate: &mut Coordinate) -> Result<(), ResolverError> {
        if !VersionSpec::is_symbolic(coordinate.version()) {
            return Ok(());
        }
        let spec = VersionSpec::from_str(coordinate.version())?;
        let pinned = query_highest(self.index.as_ref(), coordinate, &spec).await?;
        tracing::debug!(coordinate = %coordinate, version = %pinned, "pinned symbolic version");
        coordinate.set_version(pinned.to_string());
        Ok(())
    }

    /// The walkable children of a node: declared dependency edges plus any
    /// binary extension published at the same coordinates, which joins as a
    /// leaf.
    async fn children_of(&self, coordinate: &Coordinate) -> Result<Vec<Coordinate>, IndexError> {
        if coordinate.origin() == Origin::Local {
            // a local root's edges come from its manifest, already attached
            return Ok(coordinate.dependencies().to_vec());
        }
        if coordinate.extension() == Extension::Binary {
            return Ok(Vec::new());
        }

        let descriptor = self.index.descriptor(coordinate).await?;
        let mut children: Vec<Coordinate> = descriptor
            .dependencies
            .iter()
            .map(|dep| dep.to_coordinate())
            .collect();
        for extension in descriptor.extensions {
            if extension == Extension::Binary {
                children.push(Coordinate::new(
                    coordinate.group(),
                    coordinate.artifact(),
                    coordinate.version(),
                    Extension::Binary,
                ));
            }
        }
        Ok(children)
    }

    /// Walks the graph breadth-first, up to `depth` edges from the root.
    async fn collect(&self, root: &Coordinate, depth: Option<usize>) -> Result<Vec<Node>, ResolverError> {
        let mut root = root.clone();
        self.pin_version(&mut root).await?;

        let mut nodes = vec![Node {
            coordinate: root,
            parent: None,
            children: Vec::new(),
            verify: false,
        }];
        let mut chosen: HashMap<(String, String, Extension), usize> = HashMap::new();
        chosen.insert(node_key(&nodes[0].coordinate), 0);

        let mut queue = VecDeque::from([(0usize, 0usize)]);
        while let Some((idx, level)) = queue.pop_front() {
            let parent = nodes[idx].coordinate.clone();
            let children = self.children_of(&parent).await.map_err(|e| {
                map_index_error(e, &parent, || ancestry(&nodes, idx))
            })?;

            for mut child in children {
                if !child.scope().is_walked() {
                    tracing::trace!(coordinate = %child, scope = ?child.scope(), "scope not walked");
                    continue;
                }
                self.pin_version(&mut child).await?;
                if self.exclusions.excludes(&child) {
                    tracing::debug!(coordinate = %child, "excluded from graph");
                    continue;
                }

                // every binary child of an archive parent passes the
                // verification chain, wherever its edge was declared
                let verify = child.extension() == Extension::Binary
                    && parent.extension() == Extension::Archive;

                let key = node_key(&child);
                if let Some(&existing) = chosen.get(&key) {
                    if nodes[existing].coordinate.version() != child.version() {
                        tracing::debug!(
                            kept = %nodes[existing].coordinate,
                            dropped = %child,
                            "version conflict, keeping the occurrence nearest the root"
                        );
                    }
                    continue;
                }

                let child_idx = nodes.len();
                nodes.push(Node {
                    coordinate: child,
                    parent: Some(idx),
                    children: Vec::new(),
                    verify,
                });
                nodes[idx].children.push(child_idx);
                chosen.insert(key, child_idx);

                let walk_further = !verify && depth.is_none_or(|limit| level + 1 < limit);
                if walk_further {
                    queue.push_back((child_idx, level + 1));
                }
            }
        }

        Ok(nodes)
    }

    /// Materializes every collected node through the worker pool, verifying
    /// binary leaves, and records the resulting store paths.
    async fn fetch_all(&self, nodes: &mut [Node]) -> Result<(), ResolverError> {
        let pending = nodes.iter().filter(|n| n.coordinate.location().is_none()).count();
        let access = if pending == 0 { Access::Shared } else { Access::Exclusive };
        let _batch = self
            .locks
            .acquire(nodes.iter().map(|n| &n.coordinate), access)
            .await;

        let batch_span = tracing::info_span!("fetch", prefix = "resolve");
        crate::log::set_bar(&batch_span, "fetching artifacts", pending as u64);

        let permits = Arc::new(Semaphore::new(self.workers));
        let mut tasks: JoinSet<(usize, Result<PathBuf, FetchFailure>)> = JoinSet::new();

        for (idx, node) in nodes.iter().enumerate() {
            if node.coordinate.location().is_some() {
                continue;
            }
            let index = self.index.clone();
            let verifier = self.verifier.clone();
            let permits = permits.clone();
            let coordinate = node.coordinate.clone();
            let verify = node.verify;

            let task_span = tracing::debug_span!(parent: &batch_span, "fetch_task", coordinate = %coordinate);
            crate::log::set_sub_task(&task_span, &coordinate.to_string());

            tasks.spawn(
                async move {
                    let permit = permits.acquire_owned().await;
                    if permit.is_err() {
                        // pool was torn down after an earlier failure
                        return (idx, Err(FetchFailure::Index(IndexError::NotFound(
                            coordinate.to_string(),
                        ))));
                    }
                    let outcome = fetch_one(index.as_ref(), verifier.as_ref(), &coordinate, verify).await;
                    (idx, outcome)
                }
                .instrument(task_span),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            crate::log::inc(&batch_span, 1);
            let (idx, outcome) = match joined {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => continue,
                Err(e) => {
                    tracing::error!(error = %e, "fetch worker failed abnormally");
                    continue;
                },
            };

            match outcome {
                Ok(path) => nodes[idx].coordinate.set_location(path),
                Err(failure) => {
                    tasks.abort_all();
                    let coordinate = nodes[idx].coordinate.clone();
                    return Err(match failure {
                        FetchFailure::Unverified => {
                            ResolverError::VerificationFailed { coordinate }
                        },
                        FetchFailure::Index(e) => {
                            map_index_error(e, &coordinate, || ancestry(nodes, idx))
                        },
                    });
                },
            }
        }

        // a worker that vanished without reporting leaves its node unplaced
        if let Some(missing) = nodes.iter().position(|n| n.coordinate.location().is_none()) {
            let coordinate = nodes[missing].coordinate.clone();
            return Err(ResolverError::FetchFailed {
                coordinate,
                path: ancestry(nodes, missing),
            });
        }

        Ok(())
    }

    /// Flattens a collected graph into depth-first pre-order, each coordinate
    /// carrying its direct children as dependency edges.
    fn flatten(nodes: &[Node]) -> Vec<Coordinate> {
        let mut out = Vec::with_capacity(nodes.len());
        let mut stack = vec![0usize];
        while let Some(idx) = stack.pop() {
            let node = &nodes[idx];
            let mut coordinate = node.coordinate.clone();
            // a local root's declared edges are superseded by their
            // resolved counterparts
            coordinate.clear_dependencies();
            for &child in &node.children {
                coordinate.add_dependency(nodes[child].coordinate.clone());
            }
            out.push(coordinate);
            for &child in node.children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }
}

impl<I> Resolver for RemoteResolver<I>
where
    I: RepositoryIndex + Send + Sync + 'static,
{
    async fn resolve_version(
        &self,
        coordinate: &Coordinate,
        spec: &VersionSpec,
    ) -> Result<Version, ResolverError> {
        // a concrete version needs no index round-trip
        if let VersionSpec::Exact(version) = spec {
            return Ok(version.clone());
        }
        query_highest(self.index.as_ref(), coordinate, spec).await
    }

    async fn resolve_direct_dependencies(
        &self,
        root: &Coordinate,
    ) -> Result<Vec<Coordinate>, ResolverError> {
        let mut nodes = self.collect(root, Some(1)).await?;
        self.fetch_all(&mut nodes).await?;
        // drop the root itself, callers asked for its edges
        Ok(Self::flatten(&nodes).split_off(1))
    }

    async fn resolve_transitive_dependencies(
        &self,
        root: &Coordinate,
    ) -> Result<Vec<Coordinate>, ResolverError> {
        let mut nodes = self.collect(root, None).await?;
        self.fetch_all(&mut nodes).await?;

        let resolved = Self::flatten(&nodes);
        if tracing::enabled!(tracing::Level::DEBUG) {
            for line in render_tree(&resolved).lines() {
                tracing::debug!("{line}");
            }
        }
        Ok(resolved)
    }
}

//================================================================================================
// Functions
//================================================================================================

/// Renders a flattened graph (root first, children attached one level deep)
/// as an indented tree.
pub fn render_tree(resolved: &[Coordinate]) -> String {
    let Some(root) = resolved.first() else {
        return String::new();
    };
    let by_identity: HashMap<&Coordinate, &Coordinate> =
        resolved.iter().map(|c| (c, c)).collect();

    let mut out = format!("{root}\n");
    render_children(root, &by_identity, "", &mut out);
    out
}

fn render_children(
    node: &Coordinate,
    by_identity: &HashMap<&Coordinate, &Coordinate>,
    prefix: &str,
    out: &mut String,
) {
    let children = node.dependencies();
    for (i, child) in children.iter().enumerate() {
        let last = i + 1 == children.len();
        let glyph = if last { "└── " } else { "├── " };
        out.push_str(&format!("{prefix}{glyph}{child}\n"));

        let next_prefix = format!("{prefix}{}", if last { "    " } else { "│   " });
        if let Some(full) = by_identity.get(child) {
            render_children(full, by_identity, &next_prefix, out);
        }
    }
}

/// The highest published version of `coordinate`'s artifact matching `spec`.
async fn query_highest<I: RepositoryIndex>(
    index: &I,
    coordinate: &Coordinate,
    spec: &VersionSpec,
) -> Result<Version, ResolverError> {
    let published = index
        .published_versions(coordinate.group(), coordinate.artifact())
        .await
        .map_err(|e| match e {
            IndexError::NotFound(_) => no_matching_version(coordinate, spec),
            IndexError::Unreachable { reason } => ResolverError::RepositoryUnavailable { reason },
            other => ResolverError::RepositoryUnavailable {
                reason: other.to_string(),
            },
        })?;

    spec.highest_match(&published)
        .cloned()
        .ok_or_else(|| no_matching_version(coordinate, spec))
}

fn no_matching_version(coordinate: &Coordinate, spec: &VersionSpec) -> ResolverError {
    ResolverError::NoMatchingVersion {
        group: coordinate.group().to_string(),
        artifact: coordinate.artifact().to_string(),
        spec: spec.to_string(),
    }
}

/// Fetches one node's file, and for a verified leaf its full companion
/// chain, rejecting it unless every signature checks out.
async fn fetch_one<I: RepositoryIndex>(
    index: &I,
    verifier: &dyn Verifier,
    coordinate: &Coordinate,
    verify: bool,
) -> Result<PathBuf, FetchFailure> {
    let path = index.fetch(coordinate).await.map_err(FetchFailure::Index)?;

    if verify {
        // a missing companion rejects the edge just like a bad signature
        let descriptor_coordinate = coordinate.descriptor_companion();
        let chain = async {
            let signature = index.fetch(&coordinate.signature_companion()).await?;
            let descriptor = index.fetch(&descriptor_coordinate).await?;
            let descriptor_signature = index
                .fetch(&descriptor_coordinate.signature_companion())
                .await?;
            Ok::<_, IndexError>((signature, descriptor, descriptor_signature))
        };
        let Ok((signature, descriptor, descriptor_signature)) = chain.await else {
            tracing::warn!(coordinate = %coordinate, "verification companions are unavailable");
            return Err(FetchFailure::Unverified);
        };

        if !verifier.verify(&path, &signature, &descriptor, &descriptor_signature) {
            return Err(FetchFailure::Unverified);
        }
        tracing::debug!(coordinate = %coordinate, "signature chain verified");
    }

    Ok(path)
}

/// Translates a repository failure for `coordinate` into a resolver error,
/// lazily computing the dependency path from the root.
fn map_index_error(
    error: IndexError,
    coordinate: &Coordinate,
    path: impl FnOnce() -> Vec<Coordinate>,
) -> ResolverError {
    match error {
        IndexError::Unreachable { reason } => ResolverError::RepositoryUnavailable { reason },
        other => {
            tracing::warn!(coordinate = %coordinate, error = %other, "failed to fetch");
            ResolverError::FetchFailed {
                coordinate: coordinate.clone(),
                path: path(),
            }
        },
    }
}

/// The coordinates from the root down to (excluding) the node at `idx`.
fn ancestry(nodes: &[Node], idx: usize) -> Vec<Coordinate> {
    let mut path = Vec::new();
    let mut current = nodes[idx].parent;
    while let Some(i) = current {
        path.push(nodes[i].coordinate.clone());
        current = nodes[i].parent;
    }
    path.reverse();
    path
}

fn node_key(coordinate: &Coordinate) -> (String, String, Extension) {
    (
        coordinate.group().to_string(),
        coordinate.artifact().to_string(),
        coordinate.extension(),
    )
}

#[cfg(test)]
mod test;
