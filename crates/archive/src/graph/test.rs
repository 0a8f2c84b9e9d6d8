use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use semver::Version;

use super::*;
use crate::coordinate::Scope;
use crate::repository::{DeclaredDependency, Descriptor};

//================================================================================================
// Fixtures
//================================================================================================

/// An in-memory repository publishing versions, descriptors and files into a
/// temporary store, counting the queries made against it.
struct FakeIndex {
    store: PathBuf,
    versions: HashMap<(String, String), Vec<Version>>,
    descriptors: HashMap<String, Descriptor>,
    missing: HashSet<String>,
    version_calls: Arc<AtomicUsize>,
    fetch_calls: Arc<AtomicUsize>,
}

impl FakeIndex {
    fn new(store: &Path) -> Self {
        Self {
            store: store.to_path_buf(),
            versions: HashMap::new(),
            descriptors: HashMap::new(),
            missing: HashSet::new(),
            version_calls: Arc::new(AtomicUsize::new(0)),
            fetch_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Publishes an archive at `spec` (`group:artifact:arc:version`) with
    /// compile-scope dependency edges.
    fn publish(&mut self, spec: &str, deps: &[&str]) {
        let edges = deps
            .iter()
            .map(|d| {
                let c = Coordinate::from_str(d).unwrap();
                DeclaredDependency {
                    group: c.group().into(),
                    artifact: c.artifact().into(),
                    version: c.version().into(),
                    extension: c.extension(),
                    scope: Scope::Compile,
                }
            })
            .collect();
        self.publish_edges(spec, edges, Vec::new());
    }

    /// Publishes an archive that also carries a binary extension.
    fn publish_with_binary(&mut self, spec: &str, deps: &[&str]) {
        self.publish(spec, deps);
        let c = Coordinate::from_str(spec).unwrap();
        self.descriptors
            .get_mut(&c.to_string())
            .unwrap()
            .extensions
            .push(Extension::Binary);
    }

    fn publish_edges(&mut self, spec: &str, edges: Vec<DeclaredDependency>, extensions: Vec<Extension>) {
        let c = Coordinate::from_str(spec).unwrap();
        self.versions
            .entry((c.group().into(), c.artifact().into()))
            .or_default()
            .push(Version::parse(c.version()).unwrap());
        self.descriptors.insert(c.to_string(), Descriptor {
            group: c.group().into(),
            artifact: c.artifact().into(),
            version: c.version().into(),
            dependencies: edges,
            extensions,
        });
    }

    /// Makes fetches of the given file fail without unpublishing it.
    fn remove_file(&mut self, coordinate: &Coordinate) {
        self.missing.insert(coordinate.file_name());
    }
}

impl RepositoryIndex for FakeIndex {
    async fn published_versions(
        &self,
        group: &str,
        artifact: &str,
    ) -> Result<Vec<Version>, IndexError> {
        self.version_calls.fetch_add(1, Ordering::SeqCst);
        self.versions
            .get(&(group.to_string(), artifact.to_string()))
            .cloned()
            .ok_or_else(|| IndexError::NotFound(format!("{group}:{artifact}")))
    }

    async fn descriptor(&self, coordinate: &Coordinate) -> Result<Descriptor, IndexError> {
        self.descriptors
            .get(&coordinate.to_string())
            .cloned()
            .ok_or_else(|| IndexError::NotFound(coordinate.to_string()))
    }

    async fn fetch(&self, coordinate: &Coordinate) -> Result<PathBuf, IndexError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.missing.contains(&coordinate.file_name()) {
            return Err(IndexError::NotFound(coordinate.to_string()));
        }
        let path = self.store.join(coordinate.rel_path());
        let dir = path.parent().unwrap();
        std::fs::create_dir_all(dir)?;
        // same-coordinate writes stay idempotent under concurrency
        let mut staged = tempfile::NamedTempFile::new_in(dir)?;
        std::io::Write::write_all(&mut staged, coordinate.to_string().as_bytes())?;
        staged.persist(&path).map_err(|e| e.error)?;
        Ok(path)
    }
}

struct AcceptAll;

impl Verifier for AcceptAll {
    fn verify(&self, _: &Path, _: &Path, _: &Path, _: &Path) -> bool {
        true
    }
}

struct RejectAll;

impl Verifier for RejectAll {
    fn verify(&self, _: &Path, _: &Path, _: &Path, _: &Path) -> bool {
        false
    }
}

fn resolver(index: FakeIndex, store: &Path) -> RemoteResolver<FakeIndex> {
    RemoteResolver::new(index, Arc::new(AcceptAll), store).with_workers(4)
}

fn forms(resolved: &[Coordinate]) -> Vec<String> {
    resolved.iter().map(ToString::to_string).collect()
}

//================================================================================================
// Tests
//================================================================================================

#[tokio::test]
async fn transitive_graph_is_walked_and_materialized() -> anyhow::Result<()> {
    let store = tempfile::tempdir()?;
    let mut index = FakeIndex::new(store.path());
    index.publish("com.example:app:arc:1.0.0", &["com.example:core:arc:[1.0,2.0)"]);
    index.publish_with_binary("com.example:core:arc:1.0.0", &[]);
    index.publish_with_binary("com.example:core:arc:1.2.0", &["org.util:strings:arc:latest"]);
    index.publish_with_binary("com.example:core:arc:2.0.0", &[]);
    index.publish("org.util:strings:arc:0.9.0", &[]);

    let resolver = resolver(index, store.path());
    let root = Coordinate::from_str("com.example:app:arc:1.0.0")?;
    let resolved = resolver.resolve_transitive_dependencies(&root).await?;

    // depth-first pre-order, range pinned to the highest match below 2.0
    assert_eq!(forms(&resolved), vec![
        "com.example:app:arc:1.0.0",
        "com.example:core:arc:1.2.0",
        "org.util:strings:arc:0.9.0",
        "com.example:core:lib:1.2.0",
    ]);
    for coordinate in &resolved {
        let location = coordinate.location().expect("every node is materialized");
        assert!(location.exists());
    }
    Ok(())
}

#[tokio::test]
async fn tree_rendering_reflects_the_hierarchy() -> anyhow::Result<()> {
    let store = tempfile::tempdir()?;
    let mut index = FakeIndex::new(store.path());
    index.publish("com.example:app:arc:1.0.0", &[
        "com.example:core:arc:1.0.0",
        "org.util:strings:arc:0.9.0",
    ]);
    index.publish("com.example:core:arc:1.0.0", &["org.util:bytes:arc:0.1.0"]);
    index.publish("org.util:strings:arc:0.9.0", &[]);
    index.publish("org.util:bytes:arc:0.1.0", &[]);

    let resolver = resolver(index, store.path());
    let root = Coordinate::from_str("com.example:app")?;
    let resolved = resolver.resolve_transitive_dependencies(&root).await?;

    insta::assert_snapshot!(render_tree(&resolved), @r"
    com.example:app:arc:1.0.0
    ├── com.example:core:arc:1.0.0
    │   └── org.util:bytes:arc:0.1.0
    └── org.util:strings:arc:0.9.0
    ");
    Ok(())
}

#[tokio::test]
async fn test_scoped_edges_are_never_walked() -> anyhow::Result<()> {
    let store = tempfile::tempdir()?;
    let mut index = FakeIndex::new(store.path());
    index.publish_edges(
        "com.example:app:arc:1.0.0",
        vec![
            DeclaredDependency {
                group: "org.test".into(),
                artifact: "harness".into(),
                version: "3.0.0".into(),
                extension: Extension::Archive,
                scope: Scope::Test,
            },
            DeclaredDependency {
                group: "org.host".into(),
                artifact: "runtime".into(),
                version: "2.0.0".into(),
                extension: Extension::Archive,
                scope: Scope::Provided,
            },
        ],
        Vec::new(),
    );
    index.publish("org.test:harness:arc:3.0.0", &[]);
    index.publish("org.host:runtime:arc:2.0.0", &[]);

    let resolver = resolver(index, store.path());
    let root = Coordinate::from_str("com.example:app:arc:1.0.0")?;
    let resolved = resolver.resolve_transitive_dependencies(&root).await?;

    assert_eq!(forms(&resolved), vec!["com.example:app:arc:1.0.0"]);
    Ok(())
}

#[tokio::test]
async fn exclusion_prunes_the_subtree_but_keeps_siblings() -> anyhow::Result<()> {
    let store = tempfile::tempdir()?;
    let mut index = FakeIndex::new(store.path());
    index.publish("com.example:app:arc:1.0.0", &[
        "com.example:left:arc:1.0.0",
        "com.example:right:arc:1.0.0",
    ]);
    index.publish("com.example:left:arc:1.0.0", &["org.below:leaf:arc:1.0.0"]);
    index.publish("com.example:right:arc:1.0.0", &[]);
    index.publish("org.below:leaf:arc:1.0.0", &[]);

    let resolver = resolver(index, store.path())
        .with_exclusions(ExclusionFilter::new(["com.example:left:arc:*"]));
    let root = Coordinate::from_str("com.example:app:arc:1.0.0")?;
    let resolved = resolver.resolve_transitive_dependencies(&root).await?;

    assert_eq!(forms(&resolved), vec![
        "com.example:app:arc:1.0.0",
        "com.example:right:arc:1.0.0",
    ]);
    Ok(())
}

#[tokio::test]
async fn nearest_version_wins_a_conflict() -> anyhow::Result<()> {
    let store = tempfile::tempdir()?;
    let mut index = FakeIndex::new(store.path());
    index.publish("com.example:app:arc:1.0.0", &[
        "org.shared:d:arc:1.0.0",
        "com.example:b:arc:1.0.0",
    ]);
    index.publish("com.example:b:arc:1.0.0", &["org.shared:d:arc:2.0.0"]);
    index.publish("org.shared:d:arc:1.0.0", &[]);
    index.publish("org.shared:d:arc:2.0.0", &[]);

    let resolver = resolver(index, store.path());
    let root = Coordinate::from_str("com.example:app:arc:1.0.0")?;
    let resolved = resolver.resolve_transitive_dependencies(&root).await?;

    assert!(forms(&resolved).contains(&"org.shared:d:arc:1.0.0".to_string()));
    assert!(!forms(&resolved).contains(&"org.shared:d:arc:2.0.0".to_string()));
    Ok(())
}

#[tokio::test]
async fn rejected_verification_fails_the_resolution() -> anyhow::Result<()> {
    let store = tempfile::tempdir()?;
    let mut index = FakeIndex::new(store.path());
    index.publish_with_binary("com.example:app:arc:1.0.0", &[]);

    let resolver = RemoteResolver::new(index, Arc::new(RejectAll), store.path());
    let root = Coordinate::from_str("com.example:app:arc:1.0.0")?;
    let err = resolver
        .resolve_transitive_dependencies(&root)
        .await
        .unwrap_err();

    match err {
        ResolverError::VerificationFailed { coordinate } => {
            assert_eq!(coordinate.to_string(), "com.example:app:lib:1.0.0");
        },
        other => panic!("expected VerificationFailed, got {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn declared_binary_edges_pass_the_verification_chain() -> anyhow::Result<()> {
    let store = tempfile::tempdir()?;
    let workdir = tempfile::tempdir()?;
    let index = FakeIndex::new(store.path());

    let resolver = RemoteResolver::new(index, Arc::new(RejectAll), store.path());
    let mut root = Coordinate::local("com.example", "app", "0.1.0", workdir.path());
    root.add_dependency(Coordinate::from_str("org.native:codec:lib:1.0.0")?);

    let err = resolver
        .resolve_transitive_dependencies(&root)
        .await
        .unwrap_err();

    match err {
        ResolverError::VerificationFailed { coordinate } => {
            assert_eq!(coordinate.to_string(), "org.native:codec:lib:1.0.0");
        },
        other => panic!("expected VerificationFailed, got {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn descriptor_declared_binary_edges_are_verified_too() -> anyhow::Result<()> {
    let store = tempfile::tempdir()?;
    let mut index = FakeIndex::new(store.path());
    index.publish_edges(
        "com.example:app:arc:1.0.0",
        vec![DeclaredDependency {
            group: "org.native".into(),
            artifact: "codec".into(),
            version: "1.0.0".into(),
            extension: Extension::Binary,
            scope: Scope::Compile,
        }],
        Vec::new(),
    );

    let resolver = RemoteResolver::new(index, Arc::new(RejectAll), store.path());
    let root = Coordinate::from_str("com.example:app:arc:1.0.0")?;
    let err = resolver
        .resolve_transitive_dependencies(&root)
        .await
        .unwrap_err();

    assert!(matches!(err, ResolverError::VerificationFailed { .. }));
    Ok(())
}

#[tokio::test]
async fn missing_companion_fails_closed() -> anyhow::Result<()> {
    let store = tempfile::tempdir()?;
    let mut index = FakeIndex::new(store.path());
    index.publish_with_binary("com.example:app:arc:1.0.0", &[]);

    let binary = Coordinate::from_str("com.example:app:lib:1.0.0")?;
    index.remove_file(&binary.signature_companion());

    // the verifier would accept, but the chain cannot even be assembled
    let resolver = resolver(index, store.path());
    let root = Coordinate::from_str("com.example:app:arc:1.0.0")?;
    let err = resolver
        .resolve_transitive_dependencies(&root)
        .await
        .unwrap_err();

    assert!(matches!(err, ResolverError::VerificationFailed { .. }));
    Ok(())
}

#[tokio::test]
async fn fetch_failure_names_the_node_and_its_path() -> anyhow::Result<()> {
    let store = tempfile::tempdir()?;
    let mut index = FakeIndex::new(store.path());
    index.publish("com.example:app:arc:1.0.0", &["com.example:mid:arc:1.0.0"]);
    index.publish("com.example:mid:arc:1.0.0", &["org.below:leaf:arc:1.0.0"]);
    index.publish("org.below:leaf:arc:1.0.0", &[]);
    index.remove_file(&Coordinate::from_str("org.below:leaf:arc:1.0.0")?);

    let resolver = resolver(index, store.path());
    let root = Coordinate::from_str("com.example:app:arc:1.0.0")?;
    let err = resolver
        .resolve_transitive_dependencies(&root)
        .await
        .unwrap_err();

    match err {
        ResolverError::FetchFailed { coordinate, path } => {
            assert_eq!(coordinate.to_string(), "org.below:leaf:arc:1.0.0");
            assert_eq!(forms(&path), vec![
                "com.example:app:arc:1.0.0",
                "com.example:mid:arc:1.0.0",
            ]);
        },
        other => panic!("expected FetchFailed, got {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn unsatisfiable_range_reports_no_matching_version() -> anyhow::Result<()> {
    let store = tempfile::tempdir()?;
    let mut index = FakeIndex::new(store.path());
    index.publish("com.example:app:arc:1.0.0", &["com.example:core:arc:[3.0,4.0)"]);
    index.publish("com.example:core:arc:1.0.0", &[]);

    let resolver = resolver(index, store.path());
    let root = Coordinate::from_str("com.example:app:arc:1.0.0")?;
    let err = resolver
        .resolve_transitive_dependencies(&root)
        .await
        .unwrap_err();

    match err {
        ResolverError::NoMatchingVersion { group, artifact, spec } => {
            assert_eq!((group.as_str(), artifact.as_str()), ("com.example", "core"));
            assert_eq!(spec, "[3.0.0,4.0.0)");
        },
        other => panic!("expected NoMatchingVersion, got {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn direct_dependencies_stop_at_one_level() -> anyhow::Result<()> {
    let store = tempfile::tempdir()?;
    let mut index = FakeIndex::new(store.path());
    index.publish("com.example:app:arc:1.0.0", &["com.example:core:arc:1.0.0"]);
    index.publish("com.example:core:arc:1.0.0", &["org.below:leaf:arc:1.0.0"]);
    index.publish("org.below:leaf:arc:1.0.0", &[]);

    let resolver = resolver(index, store.path());
    let root = Coordinate::from_str("com.example:app:arc:1.0.0")?;
    let direct = resolver.resolve_direct_dependencies(&root).await?;

    assert_eq!(forms(&direct), vec!["com.example:core:arc:1.0.0"]);
    assert!(direct[0].location().is_some());
    Ok(())
}

#[tokio::test]
async fn concurrent_resolutions_share_the_store_cleanly() -> anyhow::Result<()> {
    let store = tempfile::tempdir()?;
    let mut index = FakeIndex::new(store.path());
    index.publish("com.example:app:arc:1.0.0", &["org.shared:core:arc:1.0.0"]);
    index.publish("com.example:tool:arc:1.0.0", &["org.shared:core:arc:1.0.0"]);
    index.publish("org.shared:core:arc:1.0.0", &[]);

    let resolver = Arc::new(resolver(index, store.path()));
    let mut tasks = tokio::task::JoinSet::new();
    for root in ["com.example:app:arc:1.0.0", "com.example:tool:arc:1.0.0"] {
        for _ in 0..4 {
            let resolver = resolver.clone();
            let root = Coordinate::from_str(root)?;
            tasks.spawn(async move { resolver.resolve_transitive_dependencies(&root).await });
        }
    }

    while let Some(joined) = tasks.join_next().await {
        let resolved = joined??;
        // every run observes a complete graph, never a partial one
        assert_eq!(resolved.len(), 2);
        for coordinate in &resolved {
            let contents = std::fs::read_to_string(coordinate.location().unwrap())?;
            assert_eq!(contents, coordinate.to_string());
        }
    }
    Ok(())
}

#[tokio::test]
async fn version_queries_resolve_the_highest_match() -> anyhow::Result<()> {
    let store = tempfile::tempdir()?;
    let mut index = FakeIndex::new(store.path());
    index.publish("com.example:core:arc:1.0.0", &[]);
    index.publish("com.example:core:arc:1.2.0", &[]);
    index.publish("com.example:core:arc:2.0.0", &[]);
    let calls = index.version_calls.clone();

    let resolver = resolver(index, store.path());
    let coordinate = Coordinate::from_str("com.example:core")?;

    let spec: crate::version::VersionSpec = "[1.0.0,2.0.0)".parse()?;
    assert_eq!(
        resolver.resolve_version(&coordinate, &spec).await?,
        Version::new(1, 2, 0)
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn concrete_version_queries_skip_the_index() -> anyhow::Result<()> {
    let store = tempfile::tempdir()?;
    let index = FakeIndex::new(store.path());
    let calls = index.version_calls.clone();

    // nothing is published; a concrete token never reaches the index
    let resolver = resolver(index, store.path());
    let coordinate = Coordinate::from_str("com.example:core:arc:1.0.0")?;
    let spec: crate::version::VersionSpec = "1.0.0".parse()?;

    assert_eq!(
        resolver.resolve_version(&coordinate, &spec).await?,
        Version::new(1, 0, 0)
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn local_roots_resolve_their_attached_edges() -> anyhow::Result<()> {
    let store = tempfile::tempdir()?;
    let workdir = tempfile::tempdir()?;
    let mut index = FakeIndex::new(store.path());
    index.publish("com.example:core:arc:1.0.0", &[]);

    let resolver = resolver(index, store.path());
    let mut root = Coordinate::local("com.example", "app", "0.1.0", workdir.path());
    root.add_dependency(Coordinate::from_str("com.example:core:arc:latest")?);
    root.add_dependency(Coordinate::from_str("org.native:codec:lib:1.0.0")?);

    let resolved = resolver.resolve_transitive_dependencies(&root).await?;
    assert_eq!(forms(&resolved), vec![
        "com.example:app:arc:0.1.0",
        "com.example:core:arc:1.0.0",
        "org.native:codec:lib:1.0.0",
    ]);
    // the local root keeps its working-copy location rather than a store path
    assert_eq!(resolved[0].location(), Some(workdir.path()));
    // each declared edge appears exactly once, as its resolved counterpart
    assert_eq!(resolved[0].dependencies().len(), 2);
    assert!(resolved[0].dependencies().iter().all(|d| d.location().is_some()));
    Ok(())
}

#[tokio::test]
async fn dependency_free_roots_resolve_without_fetching() -> anyhow::Result<()> {
    let store = tempfile::tempdir()?;
    let workdir = tempfile::tempdir()?;
    let index = FakeIndex::new(store.path());
    let fetches = index.fetch_calls.clone();

    // nothing is pending, so the batch only reads the store
    let resolver = Arc::new(resolver(index, store.path()));
    let root = Coordinate::local("com.example", "app", "0.1.0", workdir.path());

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..4 {
        let resolver = resolver.clone();
        let root = root.clone();
        tasks.spawn(async move { resolver.resolve_transitive_dependencies(&root).await });
    }
    while let Some(joined) = tasks.join_next().await {
        assert_eq!(joined??.len(), 1);
    }
    assert_eq!(fetches.load(Ordering::SeqCst), 0);
    Ok(())
}
