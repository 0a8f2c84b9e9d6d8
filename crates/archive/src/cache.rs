//! # Resolution Caching
//!
//! Resolving a graph is expensive, so [`CachingResolver`] memoizes outcomes
//! on disk and only delegates to its inner resolver on a miss.
//!
//! A **plan** records one root's fully resolved graph, one
//! `group#artifact#version#extension#location` line per node with the root
//! first. A plan is served only while it is fresh and every recorded location
//! still exists; otherwise it is deleted and the root re-resolved. Remotely
//! sourced roots go stale on a configurable timeout, locally sourced roots
//! whenever their manifest is newer than the plan.
//!
//! A **version file** memoizes the concrete version a symbolic token pinned
//! to, under the same timeout. The cached version is re-validated against the
//! requested token, so a `latest` answer never satisfies a range it falls
//! outside of.
//!
//! Cache corruption of any kind is recovered by re-resolution and never
//! surfaced to the caller. A failed resolution leaves no plan behind.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use config::CONFIG;
use semver::Version;
use tempfile::NamedTempFile;

use crate::coordinate::{Extension, Origin};
use crate::version::VersionSpec;
use crate::{
    Coordinate, LOCAL_PLAN_FILE_NAME, MANIFEST_NAME, PLAN_FILE_NAME, Resolver, ResolverError,
    VERSION_FILE_NAME,
};

//================================================================================================
// Types
//================================================================================================

/// Wraps a resolver with on-disk memoization of its outcomes.
pub struct CachingResolver<R> {
    delegate: R,
    root: PathBuf,
    timeout: Duration,
}

//================================================================================================
// Impls
//================================================================================================

impl<R: Resolver + Sync> CachingResolver<R> {
    /// Wraps the delegate, caching under the configured cache root with the
    /// configured staleness timeout.
    pub fn new(delegate: R) -> Self {
        Self {
            delegate,
            root: CONFIG.cache.root.clone(),
            timeout: Duration::from_secs(CONFIG.cache.stale_timeout_secs),
        }
    }

    /// Returns self caching under a different root directory.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Returns self with a different staleness timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn plan_path(&self, root: &Coordinate) -> PathBuf {
        let name = match root.origin() {
            Origin::Remote => PLAN_FILE_NAME,
            Origin::Local => LOCAL_PLAN_FILE_NAME,
        };
        self.root.join(root.dir_path()).join(name)
    }

    fn version_path(&self, coordinate: &Coordinate) -> PathBuf {
        let mut path: PathBuf = coordinate.group().split('.').collect();
        path.push(coordinate.artifact());
        self.root.join(path).join(VERSION_FILE_NAME)
    }

    /// Whether a cache file written at `mtime` may still be served for this
    /// root.
    fn fresh(&self, mtime: SystemTime, root: &Coordinate) -> bool {
        match root.origin() {
            Origin::Remote => {
                SystemTime::now()
                    .duration_since(mtime)
                    .map(|age| age < self.timeout)
                    .unwrap_or(false)
            },
            // a local plan ages against its manifest, not the clock
            Origin::Local => {
                let Some(dir) = root.location() else {
                    return false;
                };
                match std::fs::metadata(dir.join(MANIFEST_NAME)).and_then(|m| m.modified()) {
                    Ok(manifest_mtime) => manifest_mtime <= mtime,
                    Err(_) => false,
                }
            },
        }
    }

    /// Reads a plan back, returning `None` when it is absent, stale,
    /// malformed, or names a location that no longer exists.
    fn read_plan(&self, root: &Coordinate) -> Option<Vec<Coordinate>> {
        let path = self.plan_path(root);
        let mtime = std::fs::metadata(&path).and_then(|m| m.modified()).ok()?;
        if !self.fresh(mtime, root) {
            tracing::debug!(path = %path.display(), "plan is stale");
            return None;
        }

        let raw = std::fs::read_to_string(&path).ok()?;
        let mut resolved = Vec::new();
        for line in raw.lines().filter(|l| !l.is_empty()) {
            let Some(coordinate) = parse_plan_line(line) else {
                tracing::debug!(path = %path.display(), line, "discarding malformed plan");
                return None;
            };
            match coordinate.location() {
                Some(location) if location.exists() => resolved.push(coordinate),
                _ => {
                    tracing::debug!(
                        coordinate = %coordinate,
                        "planned location no longer exists, discarding plan"
                    );
                    return None;
                },
            }
        }
        if resolved.is_empty() {
            return None;
        }

        tracing::debug!(root = %root, nodes = resolved.len(), "serving resolution from plan");
        Some(resolved)
    }

    /// Atomically writes a freshly resolved plan; failure to do so is logged
    /// and otherwise ignored.
    fn write_plan(&self, root: &Coordinate, resolved: &[Coordinate]) {
        let path = self.plan_path(root);
        let write = || -> std::io::Result<()> {
            let dir = path.parent().ok_or_else(|| std::io::Error::other("no parent"))?;
            std::fs::create_dir_all(dir)?;
            let mut staged = NamedTempFile::new_in(dir)?;
            for coordinate in resolved {
                writeln!(staged, "{}", render_plan_line(coordinate)?)?;
            }
            staged.persist(&path)?;
            Ok(())
        };
        if let Err(e) = write() {
            tracing::warn!(path = %path.display(), error = %e, "failed to persist plan");
        }
    }

    fn read_version(&self, coordinate: &Coordinate, spec: &VersionSpec) -> Option<Version> {
        let path = self.version_path(coordinate);
        let mtime = std::fs::metadata(&path).and_then(|m| m.modified()).ok()?;
        let age = SystemTime::now().duration_since(mtime).ok()?;
        if age >= self.timeout {
            return None;
        }

        let cached = Version::parse(std::fs::read_to_string(&path).ok()?.trim()).ok()?;
        // a cached answer only satisfies tokens it actually matches
        spec.matches(&cached).then_some(cached)
    }

    fn write_version(&self, coordinate: &Coordinate, version: &Version) {
        let path = self.version_path(coordinate);
        let write = || -> std::io::Result<()> {
            let dir = path.parent().ok_or_else(|| std::io::Error::other("no parent"))?;
            std::fs::create_dir_all(dir)?;
            let mut staged = NamedTempFile::new_in(dir)?;
            writeln!(staged, "{version}")?;
            staged.persist(&path)?;
            Ok(())
        };
        if let Err(e) = write() {
            tracing::warn!(path = %path.display(), error = %e, "failed to persist version");
        }
    }
}

impl<R: Resolver + Sync> Resolver for CachingResolver<R> {
    async fn resolve_version(
        &self,
        coordinate: &Coordinate,
        spec: &VersionSpec,
    ) -> Result<Version, ResolverError> {
        if let Some(version) = self.read_version(coordinate, spec) {
            tracing::debug!(coordinate = %coordinate, %version, "serving version from cache");
            return Ok(version);
        }
        let version = self.delegate.resolve_version(coordinate, spec).await?;
        self.write_version(coordinate, &version);
        Ok(version)
    }

    async fn resolve_direct_dependencies(
        &self,
        root: &Coordinate,
    ) -> Result<Vec<Coordinate>, ResolverError> {
        // direct listings are cheap relative to a full walk; not memoized
        self.delegate.resolve_direct_dependencies(root).await
    }

    async fn resolve_transitive_dependencies(
        &self,
        root: &Coordinate,
    ) -> Result<Vec<Coordinate>, ResolverError> {
        if let Some(resolved) = self.read_plan(root) {
            return Ok(resolved);
        }

        // an invalidated plan must be gone before re-resolution starts, so a
        // failure cannot leave the old answer behind
        let path = self.plan_path(root);
        if path.exists()
            && let Err(e) = std::fs::remove_file(&path)
        {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove stale plan");
        }

        let resolved = self.delegate.resolve_transitive_dependencies(root).await?;
        self.write_plan(root, &resolved);
        Ok(resolved)
    }
}

//================================================================================================
// Functions
//================================================================================================

fn render_plan_line(coordinate: &Coordinate) -> std::io::Result<String> {
    let location = coordinate
        .location()
        .ok_or_else(|| std::io::Error::other("resolved coordinate without a location"))?;
    Ok(format!(
        "{}#{}#{}#{}#{}",
        coordinate.group(),
        coordinate.artifact(),
        coordinate.version(),
        coordinate.extension(),
        location.display()
    ))
}

fn parse_plan_line(line: &str) -> Option<Coordinate> {
    let mut segments = line.splitn(5, '#');
    let group = segments.next()?;
    let artifact = segments.next()?;
    let version = segments.next()?;
    let extension = Extension::from_str(segments.next()?).ok()?;
    let location = segments.next()?;
    if [group, artifact, version, location].iter().any(|s| s.is_empty()) {
        return None;
    }

    let mut coordinate = Coordinate::new(group, artifact, version, extension);
    coordinate.set_location(Path::new(location));
    Some(coordinate)
}
