//! # Archive Manifests
//!
//! An `archive.toml` declares a working copy's own coordinates, its
//! first-level dependency edges, any binary extensions it bundles, repository
//! endpoints of its own, and two independent exclusion lists: graph-pruning
//! patterns handed to the
//! [`ExclusionFilter`](crate::ExclusionFilter), and named capabilities hidden
//! from the published [surface](crate::surface) without touching the
//! dependency graph.
//!
//! ```toml
//! [archive]
//! group = "com.example"
//! artifact = "app"
//! version = "0.1.0"
//! requires = ">=0.2"
//! dependencies = ["com.example:core:arc:[1.0,2.0)"]
//! extensions = ["org.native:codec:lib:1.0.0"]
//!
//! [exclusions]
//! dependencies = ["com.banned:*:arc:*"]
//!
//! [excludes]
//! editors = ["beautify"]
//!
//! [[repositories]]
//! name = "internal"
//! url = "https://archives.example.com/"
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;

use semver::VersionReq;
use serde::Deserialize;

use crate::coordinate::CoordinateError;
use crate::repository::Remote;
use crate::{Coordinate, ExclusionFilter, MANIFEST_NAME};

//================================================================================================
// Types
//================================================================================================

/// An error that can occur loading a manifest.
#[derive(thiserror::Error, Debug)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("failed to read `{path}`")]
    Io {
        /// The manifest path that failed to read.
        path: PathBuf,
        /// The underlying filesystem error.
        source: std::io::Error,
    },
    /// The manifest is not valid TOML.
    #[error("malformed manifest")]
    Malformed(#[from] toml_edit::de::Error),
    /// A declared dependency or extension string does not parse.
    #[error(transparent)]
    Coordinate(#[from] CoordinateError),
}

/// A parsed `archive.toml`, together with the directory it was read from.
#[derive(Debug, Clone)]
pub struct Manifest {
    dir: PathBuf,
    archive: ArchiveSection,
    exclusions: ExclusionsSection,
    repositories: Vec<Remote>,
    /// Capability names hidden from the published surface, by category.
    pub excludes: SurfaceExcludes,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct ManifestFile {
    archive: ArchiveSection,
    #[serde(default)]
    exclusions: ExclusionsSection,
    #[serde(default)]
    excludes: SurfaceExcludes,
    #[serde(default)]
    repositories: Vec<Remote>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct ArchiveSection {
    group: String,
    artifact: String,
    version: String,
    /// The range of tool versions this archive is compatible with.
    #[serde(default)]
    requires: Option<VersionReq>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    extensions: Vec<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
struct ExclusionsSection {
    #[serde(default)]
    dependencies: Vec<String>,
}

/// The manifest's capability-surface excludes. The names are opaque to the
/// resolver; they are matched against resolved operation names by category.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct SurfaceExcludes {
    /// Editor names to hide.
    #[serde(default)]
    pub editors: Vec<String>,
    /// Generator names to hide.
    #[serde(default)]
    pub generators: Vec<String>,
    /// Reviewer names to hide.
    #[serde(default)]
    pub reviewers: Vec<String>,
    /// Handler names to hide.
    #[serde(default)]
    pub handlers: Vec<String>,
}

//================================================================================================
// Impls
//================================================================================================

impl Manifest {
    /// Loads the `archive.toml` inside the given directory.
    pub fn load(dir: &Path) -> Result<Self, ManifestError> {
        let path = dir.join(MANIFEST_NAME);
        let raw = std::fs::read_to_string(&path).map_err(|source| ManifestError::Io {
            path: path.clone(),
            source,
        })?;
        let file: ManifestFile = toml_edit::de::from_str(&raw)?;
        tracing::debug!(path = %path.display(), "loaded manifest");
        Ok(Self {
            dir: dir.to_path_buf(),
            archive: file.archive,
            exclusions: file.exclusions,
            repositories: file.repositories,
            excludes: file.excludes,
        })
    }

    /// The archive's own group.
    pub fn group(&self) -> &str {
        &self.archive.group
    }

    /// The archive's own artifact name.
    pub fn artifact(&self) -> &str {
        &self.archive.artifact
    }

    /// The archive's own version.
    pub fn version(&self) -> &str {
        &self.archive.version
    }

    /// The range of tool versions the archive declares compatibility with.
    pub fn requires(&self) -> Option<&VersionReq> {
        self.archive.requires.as_ref()
    }

    /// The locally sourced root coordinate this manifest describes, with its
    /// declared dependency and extension edges attached.
    pub fn root_coordinate(&self) -> Result<Coordinate, ManifestError> {
        let mut root = Coordinate::local(
            &self.archive.group,
            &self.archive.artifact,
            &self.archive.version,
            &self.dir,
        );
        for declared in self.archive.dependencies.iter().chain(&self.archive.extensions) {
            root.add_dependency(Coordinate::from_str(declared)?);
        }
        Ok(root)
    }

    /// The manifest's graph-pruning patterns as a filter.
    pub fn exclusion_filter(&self) -> ExclusionFilter {
        ExclusionFilter::new(self.exclusions.dependencies.iter().cloned())
    }

    /// The manifest's own repository endpoints, queried after the configured
    /// ones.
    pub fn repositories(&self) -> &[Remote] {
        &self.repositories
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::coordinate::Extension;

    fn write_manifest(dir: &Path, contents: &str) {
        std::fs::write(dir.join(MANIFEST_NAME), contents).unwrap();
    }

    #[test]
    fn full_manifest_round_trips_into_a_root() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_manifest(dir.path(), r#"
            [archive]
            group = "com.example"
            artifact = "app"
            version = "0.1.0"
            requires = ">=0.2"
            dependencies = ["com.example:core:arc:[1.0,2.0)"]
            extensions = ["org.native:codec:lib:1.0.0"]

            [exclusions]
            dependencies = ["com.banned:*:arc:*"]

            [excludes]
            editors = ["beautify"]

            [[repositories]]
            name = "internal"
            url = "https://archives.example.com/"
            username = "ci"
        "#);

        let manifest = Manifest::load(dir.path())?;
        let root = manifest.root_coordinate()?;

        assert_eq!(root.to_string(), "com.example:app:arc:0.1.0");
        assert_eq!(root.location(), Some(dir.path()));
        assert_eq!(root.dependencies().len(), 2);
        assert_eq!(root.dependencies()[1].extension(), Extension::Binary);

        let banned = Coordinate::new("com.banned", "x", "9.9.9", Extension::Archive);
        assert!(manifest.exclusion_filter().excludes(&banned));
        assert_eq!(manifest.excludes.editors, vec!["beautify"]);
        assert!(manifest.requires().unwrap().matches(&semver::Version::new(0, 2, 0)));
        assert_eq!(manifest.repositories()[0].name, "internal");
        assert_eq!(manifest.repositories()[0].username.as_deref(), Some("ci"));
        assert!(manifest.repositories()[0].password.is_none());
        Ok(())
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), r#"
            [archive]
            group = "com.example"
            artifact = "app"
            version = "0.1.0"
            colour = "mauve"
        "#);

        let err = Manifest::load(dir.path()).unwrap_err();
        assert!(matches!(err, ManifestError::Malformed(_)));
    }

    #[test]
    fn minimal_manifest_defaults_its_sections() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_manifest(dir.path(), r#"
            [archive]
            group = "com.example"
            artifact = "app"
            version = "0.1.0"
        "#);

        let manifest = Manifest::load(dir.path())?;
        assert!(manifest.root_coordinate()?.dependencies().is_empty());
        assert!(manifest.exclusion_filter().is_empty());
        assert!(manifest.requires().is_none());
        Ok(())
    }

    #[test]
    fn missing_manifest_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = Manifest::load(dir.path()).unwrap_err();
        assert!(matches!(err, ManifestError::Io { .. }));
    }
}
