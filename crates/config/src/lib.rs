//! Manages application configuration by loading settings from standard locations.
//!
//! This crate provides a unified configuration object (`Config`) that aggregates
//! settings from files and environment variables, making them accessible
//! globally via a lazily initialized static reference (`CONFIG`).

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use etcetera::BaseStrategy;
use figment::providers::{Env, Format, Toml};
use figment::{Figment, Metadata, Provider};
use serde::{Deserialize, Serialize};
use url::Url;

/// The default configuration values
const DEFAULT_TOML_CONFIG: &str = include_str!("./harbor.default.toml");

//================================================================================================
// Statics
//================================================================================================

/// Provides a lazily instantiated static reference to the application `Config`.
///
/// This static variable ensures that configuration is parsed only once from
/// canonical locations and then made immutably available throughout the
/// application's lifecycle.
pub static CONFIG: LazyLock<Config> = LazyLock::new(load_config);

//================================================================================================
// Types
//================================================================================================

/// Defines cache-related configuration settings.
#[derive(Deserialize, Serialize)]
pub struct CacheConfig {
    /// The root directory for persisted resolution plans.
    pub root: PathBuf,
    /// How long a plan for a remotely sourced root stays fresh, in seconds.
    pub stale_timeout_secs: u64,
}

/// Settings governing graph collection and parallel artifact fetching.
#[derive(Deserialize, Serialize)]
pub struct ResolverConfig {
    /// The fixed size of the fetch worker pool.
    pub workers: usize,
    /// Globally applied exclusion patterns (`group:artifact:ext:version` globs).
    #[serde(default)]
    pub exclusions: Vec<String>,
}

/// A single named remote repository endpoint.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct RepositoryConfig {
    /// The base URL of the repository.
    pub url: Url,
    /// Optional username for basic authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Optional password for basic authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Settings for the local artifact store shared across resolutions.
#[derive(Deserialize, Serialize)]
pub struct StoreConfig {
    /// The root directory artifacts are materialized into.
    pub root: PathBuf,
}

/// Settings for the signature verification chain.
#[derive(Deserialize, Serialize)]
pub struct TrustConfig {
    /// The TOML keyring listing trusted signing keys.
    pub keyring: PathBuf,
}

/// Represents the application's primary configuration structure.
#[derive(Deserialize, Serialize, Default)]
pub struct Config {
    /// The local artifact store settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// Cache-related settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Resolver settings.
    #[serde(default)]
    pub resolver: ResolverConfig,
    /// Verification settings.
    #[serde(default)]
    pub trust: TrustConfig,
    /// Named remote repository endpoints, queried in declaration order.
    #[serde(default)]
    pub repositories: BTreeMap<String, RepositoryConfig>,
}

//================================================================================================
// Impls
//================================================================================================

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: get_cache_dir(),
            // two hours, matching the historical re-resolution window
            stale_timeout_secs: 2 * 60 * 60,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            exclusions: Vec::new(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: get_cache_dir().join("store"),
        }
    }
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            keyring: get_config_dir().join("keyring.toml"),
        }
    }
}

impl Config {
    /// Constructs a `Figment` instance for configuration loading.
    ///
    /// This method builds a configuration provider by layering default settings,
    /// user-specific configuration files, and environment variables.
    pub fn figment() -> Figment {
        let mut fig = Figment::from(Config::default()).merge(Toml::string(DEFAULT_TOML_CONFIG));

        if let Ok(c) = etcetera::choose_base_strategy() {
            let config = c.config_dir().join("harbor.toml");
            fig = fig.admerge(Toml::file(config));
        }

        fig.admerge(Env::prefixed("HARBOR_"))
    }

    /// Creates a `Config` instance from a given provider.
    pub fn from<T: Provider>(provider: T) -> Result<Config, Box<figment::Error>> {
        Figment::from(provider).extract().map_err(Box::new)
    }
}

impl Provider for Config {
    fn metadata(&self) -> figment::Metadata {
        Metadata::named("Harbor CLI Config")
    }

    fn data(
        &self,
    ) -> Result<figment::value::Map<figment::Profile, figment::value::Dict>, figment::Error> {
        figment::providers::Serialized::defaults(self).data()
    }
}

//================================================================================================
// Functions
//================================================================================================

/// Determines the appropriate configuration directory based on the operating
/// system.
fn get_config_dir() -> PathBuf {
    if let Ok(c) = etcetera::choose_base_strategy() {
        c.config_dir().join("harbor")
    } else {
        std::env::temp_dir().join("harbor")
    }
}

/// Determines the appropriate cache directory based on the operating system.
fn get_cache_dir() -> PathBuf {
    if let Ok(c) = etcetera::choose_base_strategy() {
        c.cache_dir().join("harbor")
    } else {
        std::env::temp_dir().join("harbor")
    }
}

/// Loads the application configuration using the default `Figment` provider.
///
/// This function is used to initialize the `CONFIG` static variable.
fn load_config() -> Config {
    Config::figment().extract().unwrap_or_else(|e| {
        tracing::error!(error = %e, "problem loading config from default sources, falling back to nearly empty configuration");
        Config::default()
    })
}
