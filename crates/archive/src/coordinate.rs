//! # Artifact Coordinates
//!
//! This module provides the core value type identifying one artifact inside a
//! repository: the [`Coordinate`]. Everything else in the crate operates on
//! coordinates.
//!
//! ## Identity
//!
//! Two coordinates are the same node in a dependency graph when their
//! `(group, artifact, version, extension)` tuples are equal. The classifier
//! disambiguates side files of the same artifact (a detached signature, a
//! metadata document) and deliberately does not participate in identity, nor
//! does the resolved location.
//!
//! ## Lifecycle
//!
//! A coordinate is constructed from a manifest or a colon-delimited string at
//! request time. Its `version` is substituted exactly once when a symbolic
//! token resolves to a concrete version, and its `location` is populated once
//! when the fetcher completes. After that the value is treated as immutable
//! and shared freely across resolver tasks.
//!
//! ## String Form
//!
//! `group:artifact[:extension][:version]` parses into a coordinate; the
//! version defaults to `latest` and the extension to the archive package
//! type. The canonical display form is `group:artifact:extension:version`,
//! which is also the form exclusion patterns match against.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

//================================================================================================
// Types
//================================================================================================

/// An error that can occur when parsing a coordinate from its string form.
#[derive(Error, Debug)]
pub enum CoordinateError {
    /// The string does not have between two and four colon-delimited segments.
    #[error("`{0}` should be of the form <group>:<artifact>[:<extension>][:<version>]")]
    Malformed(String),
    /// A segment was empty.
    #[error("`{0}` contains an empty segment")]
    EmptySegment(String),
    /// The extension segment is not a known extension.
    #[error("`{0}` is not a known extension (expected one of: arc, lib, json)")]
    UnknownExtension(String),
}

/// The enumerated artifact kinds a coordinate can refer to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Extension {
    /// An archive package, the unit Harbor deploys and resolves roots for.
    #[serde(rename = "arc")]
    #[default]
    Archive,
    /// A binary library extension, subject to the verification chain.
    #[serde(rename = "lib")]
    Binary,
    /// A metadata document describing an artifact's declared dependencies.
    #[serde(rename = "json")]
    Metadata,
}

/// Declares when a dependency edge is needed, governing whether it is walked
/// during collection.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Needed to compile and run; always walked.
    #[default]
    Compile,
    /// Needed at runtime only; walked.
    Runtime,
    /// Needed for tests only; never walked.
    Test,
    /// Provided by the host environment; never walked.
    Provided,
    /// Supplied out of band by the system; never walked.
    System,
}

/// Marks whether a root coordinate came from a local working copy or a remote
/// repository, which drives the cache staleness rule applied to its plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Origin {
    /// Sourced from a remote repository.
    #[default]
    Remote,
    /// Sourced from a local working copy; `location` points at the manifest
    /// directory.
    Local,
}

/// The immutable value type describing one artifact and its declared edges.
#[derive(Debug, Clone, Default)]
pub struct Coordinate {
    group: String,
    artifact: String,
    version: String,
    extension: Extension,
    scope: Scope,
    classifier: Option<String>,
    location: Option<PathBuf>,
    origin: Origin,
    dependencies: Vec<Coordinate>,
}

//================================================================================================
// Impls
//================================================================================================

impl Extension {
    /// The file suffix used in store and repository paths.
    pub fn suffix(&self) -> &'static str {
        match self {
            Extension::Archive => "arc",
            Extension::Binary => "lib",
            Extension::Metadata => "json",
        }
    }
}

impl FromStr for Extension {
    type Err = CoordinateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "arc" => Ok(Extension::Archive),
            "lib" => Ok(Extension::Binary),
            "json" => Ok(Extension::Metadata),
            other => Err(CoordinateError::UnknownExtension(other.into())),
        }
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

impl Scope {
    /// Whether edges with this scope contribute to the transitive graph.
    pub fn is_walked(&self) -> bool {
        matches!(self, Scope::Compile | Scope::Runtime)
    }
}

impl Coordinate {
    /// Creates a coordinate with the default compile scope and no classifier.
    pub fn new(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
        extension: Extension,
    ) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
            version: version.into(),
            extension,
            ..Default::default()
        }
    }

    /// Creates a locally sourced root coordinate whose `location` points at the
    /// directory containing its manifest.
    pub fn local(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
        dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
            version: version.into(),
            extension: Extension::Archive,
            location: Some(dir.into()),
            origin: Origin::Local,
            ..Default::default()
        }
    }

    /// The group identifier, e.g. `com.example`.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// The artifact identifier within the group.
    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    /// The version string: concrete, `latest`, or a bracketed range.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The artifact kind.
    pub fn extension(&self) -> Extension {
        self.extension
    }

    /// The declared scope of the edge this coordinate sits on.
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// The optional classifier disambiguating same-coordinate side files.
    pub fn classifier(&self) -> Option<&str> {
        self.classifier.as_deref()
    }

    /// The resolved local location, absent until the fetcher completes.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Whether this coordinate was sourced from a local working copy.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// The declared direct dependency edges.
    pub fn dependencies(&self) -> &[Coordinate] {
        &self.dependencies
    }

    /// Returns self with the given scope.
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Returns self with the given classifier.
    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    /// Returns a copy of this coordinate at a different version, preserving
    /// everything but the resolved location.
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            location: None,
            ..self.clone()
        }
    }

    /// Attaches a declared dependency edge.
    pub fn add_dependency(&mut self, dep: Coordinate) {
        self.dependencies.push(dep);
    }

    /// Drops the declared dependency edges.
    pub fn clear_dependencies(&mut self) {
        self.dependencies.clear();
    }

    /// Substitutes the concrete version a symbolic token resolved to.
    ///
    /// Called exactly once per coordinate, by the version resolver.
    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
    }

    /// Records the local file the fetcher materialized this coordinate into.
    ///
    /// Called exactly once per coordinate, when its fetch completes.
    pub fn set_location(&mut self, location: impl Into<PathBuf>) {
        self.location = Some(location.into());
    }

    /// Whether the given 4-tuple denotes the same graph node as this
    /// coordinate.
    pub fn matches(&self, group: &str, artifact: &str, version: &str, extension: Extension) -> bool {
        self.group == group
            && self.artifact == artifact
            && self.version == version
            && self.extension == extension
    }

    /// The detached-signature companion of this coordinate.
    pub fn signature_companion(&self) -> Coordinate {
        self.clone().with_classifier("sig")
    }

    /// The metadata-document companion describing this coordinate's declared
    /// dependencies.
    pub fn descriptor_companion(&self) -> Coordinate {
        Coordinate {
            extension: Extension::Metadata,
            classifier: None,
            location: None,
            dependencies: Vec::new(),
            ..self.clone()
        }
    }

    /// The file name this coordinate materializes under, e.g.
    /// `app-1.0.0.arc` or `ext-2.1.0-sig.lib`.
    pub fn file_name(&self) -> String {
        match &self.classifier {
            Some(c) => format!("{}-{}-{}.{}", self.artifact, self.version, c, self.extension),
            None => format!("{}-{}.{}", self.artifact, self.version, self.extension),
        }
    }

    /// The path of this coordinate relative to a store or repository root:
    /// the group with dots replaced by separators, then artifact, then
    /// version, then the file name.
    pub fn rel_path(&self) -> PathBuf {
        self.dir_path().join(self.file_name())
    }

    /// The directory of this coordinate's version relative to a store root.
    pub fn dir_path(&self) -> PathBuf {
        let mut path: PathBuf = self.group.split('.').collect();
        path.push(&self.artifact);
        path.push(&self.version);
        path
    }

    /// The key locks over this coordinate's store path are taken under.
    pub fn lock_key(&self) -> String {
        format!("{}~{}~{}", self.group, self.artifact, self.version)
    }
}

/// Graph identity deliberately ignores classifier, scope, location, origin and
/// declared edges.
impl PartialEq for Coordinate {
    fn eq(&self, other: &Self) -> bool {
        other.matches(&self.group, &self.artifact, &self.version, self.extension)
    }
}

impl Eq for Coordinate {}

impl Hash for Coordinate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.group.hash(state);
        self.artifact.hash(state);
        self.version.hash(state);
        self.extension.hash(state);
    }
}

impl FromStr for Coordinate {
    type Err = CoordinateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = s.split(':').collect();
        if segments.iter().any(|seg| seg.is_empty()) {
            return Err(CoordinateError::EmptySegment(s.into()));
        }
        match segments.as_slice() {
            [group, artifact] => Ok(Coordinate::new(*group, *artifact, "latest", Extension::Archive)),
            [group, artifact, third] => {
                // a third segment is an extension when it names one, a version
                // otherwise
                if let Ok(ext) = third.parse::<Extension>() {
                    Ok(Coordinate::new(*group, *artifact, "latest", ext))
                } else {
                    Ok(Coordinate::new(*group, *artifact, *third, Extension::Archive))
                }
            },
            [group, artifact, ext, version] => {
                let ext = ext.parse::<Extension>()?;
                Ok(Coordinate::new(*group, *artifact, *version, ext))
            },
            _ => Err(CoordinateError::Malformed(s.into())),
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.group, self.artifact, self.extension, self.version
        )
    }
}

#[cfg(test)]
mod test;
