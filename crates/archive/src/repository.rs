//! # Remote Repositories
//!
//! A repository publishes, for every artifact, a version index, a metadata
//! descriptor per version, and the artifact files themselves (with their
//! detached signatures). The [`RepositoryIndex`] trait abstracts those three
//! queries so the graph engine can be driven by an HTTP repository in
//! production and an in-memory fake under test.
//!
//! [`HttpRepository`] queries the configured remotes in name order and takes
//! the first that answers; a remote that cannot be reached is skipped with a
//! warning, and only when every remote is unreachable does a query fail as
//! such.

use std::future::Future;
use std::io::Write;
use std::path::PathBuf;

use config::CONFIG;
use semver::Version;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use url::Url;

use crate::Coordinate;
use crate::coordinate::{Extension, Scope};

//================================================================================================
// Types
//================================================================================================

/// An error that can occur while querying or fetching from repositories.
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// The requested entity exists in no reachable repository.
    #[error("`{0}` is not present in any configured repository")]
    NotFound(String),
    /// Every configured repository was unreachable.
    #[error("no repository is reachable: {reason}")]
    Unreachable {
        /// Description of the last transport failure observed.
        reason: String,
    },
    /// A repository answered with a malformed document.
    #[error("malformed response from repository")]
    Malformed(#[from] serde_json::Error),
    /// A transport-level failure while reading a response body.
    #[error("repository request failed")]
    Transport(#[from] reqwest::Error),
    /// A local filesystem failure while materializing an artifact.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The fetched artifact could not be moved into its store path.
    #[error("failed to persist fetched artifact")]
    Persist(#[from] tempfile::PersistError),
}

/// The version index a repository publishes per artifact.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VersionIndex {
    /// Every published version of the artifact.
    pub versions: Vec<Version>,
}

/// One dependency edge declared in a descriptor.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DeclaredDependency {
    /// The dependency's group.
    pub group: String,
    /// The dependency's artifact.
    pub artifact: String,
    /// The dependency's version token, possibly symbolic.
    pub version: String,
    /// The dependency's extension.
    #[serde(default)]
    pub extension: Extension,
    /// The scope the edge is declared under.
    #[serde(default)]
    pub scope: Scope,
}

/// The metadata document a repository publishes per artifact version.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Descriptor {
    /// The described artifact's group.
    pub group: String,
    /// The described artifact's name.
    pub artifact: String,
    /// The described artifact's concrete version.
    pub version: String,
    /// The declared dependency edges.
    #[serde(default)]
    pub dependencies: Vec<DeclaredDependency>,
    /// Additional extensions published at the same coordinates. A binary
    /// extension listed here becomes a verified child of the archive.
    #[serde(default)]
    pub extensions: Vec<Extension>,
}

/// A single named remote endpoint, with optional basic-auth credentials.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Remote {
    /// The configured name of the remote.
    pub name: String,
    /// The base URL requests are made against.
    pub url: Url,
    /// Optional basic-auth username.
    #[serde(default)]
    pub username: Option<String>,
    /// Optional basic-auth password.
    #[serde(default)]
    pub password: Option<String>,
}

/// A [`RepositoryIndex`] backed by one or more HTTP remotes and a local
/// artifact store.
#[derive(Debug, Clone)]
pub struct HttpRepository {
    remotes: Vec<Remote>,
    store: PathBuf,
    client: reqwest::Client,
}

//================================================================================================
// Traits
//================================================================================================

/// The three queries the graph engine makes against a repository.
pub trait RepositoryIndex {
    /// Every version of `group:artifact` the repository has published.
    fn published_versions(
        &self,
        group: &str,
        artifact: &str,
    ) -> impl Future<Output = Result<Vec<Version>, IndexError>> + Send;

    /// The metadata descriptor for a concrete coordinate.
    fn descriptor(
        &self,
        coordinate: &Coordinate,
    ) -> impl Future<Output = Result<Descriptor, IndexError>> + Send;

    /// Materializes the coordinate's file into the local store, returning its
    /// path. Fetching an already present file is a no-op returning the
    /// existing path.
    fn fetch(&self, coordinate: &Coordinate)
    -> impl Future<Output = Result<PathBuf, IndexError>> + Send;
}

//================================================================================================
// Impls
//================================================================================================

impl DeclaredDependency {
    /// The coordinate this edge points at, version still possibly symbolic.
    pub fn to_coordinate(&self) -> Coordinate {
        Coordinate::new(&self.group, &self.artifact, &self.version, self.extension)
            .with_scope(self.scope)
    }
}

impl HttpRepository {
    /// Creates a repository over the given remotes, materializing fetched
    /// artifacts under `store`.
    pub fn new(remotes: Vec<Remote>, store: impl Into<PathBuf>) -> Self {
        Self {
            remotes,
            store: store.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Creates a repository from the application configuration.
    pub fn from_config() -> Self {
        let remotes = CONFIG
            .repositories
            .iter()
            .map(|(name, repo)| Remote {
                name: name.clone(),
                url: repo.url.clone(),
                username: repo.username.clone(),
                password: repo.password.clone(),
            })
            .collect();
        Self::new(remotes, CONFIG.store.root.clone())
    }

    /// Returns self with additional remotes appended after the existing
    /// ones, preserving query order (e.g. a manifest's own endpoints after
    /// the configured ones).
    pub fn with_remotes(mut self, remotes: impl IntoIterator<Item = Remote>) -> Self {
        self.remotes.extend(remotes);
        self
    }

    /// The store root artifacts are materialized into.
    pub fn store(&self) -> &PathBuf {
        &self.store
    }

    /// Issues a GET for `path` against each remote in turn.
    ///
    /// Returns `NotFound` when every reachable remote answered 404 and
    /// `Unreachable` when no remote answered at all.
    async fn get(&self, path: &str) -> Result<reqwest::Response, IndexError> {
        let mut reachable = false;
        let mut last_failure = String::from("no repositories configured");

        for remote in &self.remotes {
            let url = match remote.url.join(path) {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!(remote = %remote.name, error = %e, "skipping remote with unjoinable url");
                    continue;
                },
            };

            tracing::trace!(remote = %remote.name, url = %url, "querying repository");
            let mut request = self.client.get(url.clone());
            if let Some(user) = &remote.username {
                request = request.basic_auth(user, remote.password.as_deref());
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) if response.status() == reqwest::StatusCode::NOT_FOUND => {
                    reachable = true;
                },
                Ok(response) => {
                    reachable = true;
                    tracing::warn!(
                        remote = %remote.name,
                        status = %response.status(),
                        "unexpected repository response"
                    );
                },
                Err(e) => {
                    tracing::warn!(remote = %remote.name, error = %e, "remote is unreachable");
                    last_failure = e.to_string();
                },
            }
        }

        if reachable {
            Err(IndexError::NotFound(path.to_string()))
        } else {
            Err(IndexError::Unreachable {
                reason: last_failure,
            })
        }
    }
}

impl RepositoryIndex for HttpRepository {
    async fn published_versions(
        &self,
        group: &str,
        artifact: &str,
    ) -> Result<Vec<Version>, IndexError> {
        let path = format!("{}/{}/index.json", group.replace('.', "/"), artifact);
        let body = self.get(&path).await?.text().await?;
        let index: VersionIndex = serde_json::from_str(&body)?;
        tracing::debug!(
            group,
            artifact,
            count = index.versions.len(),
            "fetched version index"
        );
        Ok(index.versions)
    }

    async fn descriptor(&self, coordinate: &Coordinate) -> Result<Descriptor, IndexError> {
        let path = remote_path(&coordinate.descriptor_companion());
        let body = self.get(&path).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn fetch(&self, coordinate: &Coordinate) -> Result<PathBuf, IndexError> {
        let target = self.store.join(coordinate.rel_path());
        if target.exists() {
            tracing::trace!(coordinate = %coordinate, "already materialized");
            return Ok(target);
        }

        let bytes = self.get(&remote_path(coordinate)).await?.bytes().await?;

        let dir = self.store.join(coordinate.dir_path());
        std::fs::create_dir_all(&dir)?;
        // stage next to the target so the final move is atomic
        let mut staged = NamedTempFile::new_in(&dir)?;
        staged.write_all(&bytes)?;
        staged.persist(&target)?;

        tracing::debug!(coordinate = %coordinate, path = %target.display(), "materialized artifact");
        Ok(target)
    }
}

//================================================================================================
// Functions
//================================================================================================

/// The URL path of a coordinate's file below a remote's base URL.
fn remote_path(coordinate: &Coordinate) -> String {
    format!(
        "{}/{}/{}/{}",
        coordinate.group().replace('.', "/"),
        coordinate.artifact(),
        coordinate.version(),
        coordinate.file_name()
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn descriptor_parses_with_defaults() -> anyhow::Result<()> {
        let raw = r#"{
            "group": "com.example",
            "artifact": "app",
            "version": "1.0.0",
            "dependencies": [
                { "group": "com.example", "artifact": "core", "version": "[1.0,2.0)" },
                { "group": "org.test", "artifact": "harness", "version": "3.1.0", "scope": "test" }
            ],
            "extensions": ["lib"]
        }"#;

        let descriptor: Descriptor = serde_json::from_str(raw)?;
        assert_eq!(descriptor.dependencies.len(), 2);
        assert_eq!(descriptor.extensions, vec![Extension::Binary]);

        let core = descriptor.dependencies[0].to_coordinate();
        assert_eq!(core.extension(), Extension::Archive);
        assert!(core.scope().is_walked());

        let harness = descriptor.dependencies[1].to_coordinate();
        assert!(!harness.scope().is_walked());
        Ok(())
    }

    #[test]
    fn remote_paths_follow_store_layout() {
        let coordinate = Coordinate::new("com.example", "app", "1.0.0", Extension::Archive);
        assert_eq!(remote_path(&coordinate), "com/example/app/1.0.0/app-1.0.0.arc");
        assert_eq!(
            remote_path(&coordinate.descriptor_companion()),
            "com/example/app/1.0.0/app-1.0.0.json"
        );
    }
}
