//! Strongly-typed configuration for the media vault.
//!
//! Configuration is layered with `figment`: built-in defaults, then a config
//! file (TOML, YAML or JSON, chosen by extension), then `MVAULT_` environment
//! variables (`__` separates nested keys, e.g. `MVAULT_CACHE__BUDGET`). The
//! merged document is validated once into a [`Config`]; nothing downstream
//! ever sees an unvalidated value.

mod error;
mod matrix;
mod raw;

pub use crate::error::{Error, ErrorKind, Result};
pub use crate::matrix::{DEFAULT_MERGE_QUALITY, MediaMatrix, MergeTarget};

use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use mvault_storage::Tier;
use std::path::{Path, PathBuf};

/// Prefix of environment variables that override file settings.
pub const ENV_PREFIX: &str = "MVAULT_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub tiers: TierPaths,
    pub matrix: Vec<MediaMatrix>,
    pub cache: CacheSettings,
    pub transactions: TransactionSettings,
    pub media_server: Option<MediaServerConfig>,
}

/// Absolute roots of every storage tier, plus where persistent state lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierPaths {
    pub source: PathBuf,
    pub cache: PathBuf,
    pub merged: Option<PathBuf>,
    /// Directory holding the state document.
    pub state: PathBuf,
}
impl TierPaths {
    pub fn root(&self, tier: Tier) -> Option<&Path> {
        match tier {
            Tier::Source => Some(&self.source),
            Tier::Cache => Some(&self.cache),
            Tier::Merged => self.merged.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Size budget of the cache tier in bytes; `0` disables caching.
    pub budget: u64,
    /// Fill leftover budget with the most recently added source files.
    pub latest: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TransactionSettings {
    /// Write a JSON sidecar next to every linked, copied or moved file.
    pub write_metadata: bool,
}

#[derive(Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MediaServerConfig {
    pub url: String,
    pub api_key: String,
}
impl std::fmt::Debug for MediaServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaServerConfig")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl Config {
    /// Loads and validates configuration.
    ///
    /// An explicit `path` must exist. Without one, `config.toml` in the
    /// platform configuration directory is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(raw::RawConfig::default()));
        match path {
            Some(path) => {
                figment = match path.extension().and_then(|e| e.to_str()) {
                    Some("toml") => figment.merge(Toml::file_exact(path)),
                    Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
                    Some("json") => figment.merge(Json::file_exact(path)),
                    _ => exn::bail!(ErrorKind::invalid(format!(
                        "unsupported configuration format: {}",
                        path.display()
                    ))),
                };
            },
            None => {
                if let Some(path) = default_config_path() {
                    tracing::debug!(path = %path.display(), "Using default configuration file");
                    figment = figment.merge(Toml::file(path));
                }
            },
        }
        Self::from_figment(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Validates whatever `figment` resolves to.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let raw: raw::RawConfig = figment.extract().or_raise(|| ErrorKind::Load)?;
        raw.validate()
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "mvault")
}

fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

pub(crate) fn default_state_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    const TOML: &str = r#"
        [tiers]
        source = "/srv/media"
        cache = "/srv/cache"
        merged = "/srv/merged"
        state = "/var/lib/mvault"

        [cache]
        budget = 1000

        [[matrix]]
        media_type = "tv"
        quality_order = ["uhd", "hd"]
        merge_prefix = "tv"
        use_cache = true

        [[matrix]]
        media_type = "movie"
        prefix = "film"
        quality_order = ["hd"]
    "#;

    #[test]
    fn test_load_toml_file() {
        Jail::expect_with(|jail| {
            jail.create_file("mvault.toml", TOML)?;
            let config = Config::load(Some(Path::new("mvault.toml"))).unwrap();
            assert_eq!(config.tiers.source, PathBuf::from("/srv/media"));
            assert_eq!(config.tiers.root(Tier::Merged), Some(Path::new("/srv/merged")));
            assert_eq!(config.cache, CacheSettings { budget: 1000, latest: false });
            assert_eq!(config.transactions, TransactionSettings::default());
            assert!(config.media_server.is_none());
            assert_eq!(config.matrix.len(), 2);
            let tv = &config.matrix[0];
            assert_eq!(tv.prefix, "tv");
            assert_eq!(tv.merge.as_ref().unwrap().folder_name(), "tv-merged");
            assert!(tv.use_cache);
            let movie = &config.matrix[1];
            assert_eq!(movie.prefix, "film");
            assert!(movie.merge.is_none());
            Ok(())
        });
    }

    #[test]
    fn test_environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("mvault.toml", TOML)?;
            jail.set_env("MVAULT_CACHE__BUDGET", "42");
            jail.set_env("MVAULT_TRANSACTIONS__WRITE_METADATA", "true");
            let config = Config::load(Some(Path::new("mvault.toml"))).unwrap();
            assert_eq!(config.cache.budget, 42);
            assert!(config.transactions.write_metadata);
            Ok(())
        });
    }

    #[test]
    fn test_load_json_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "mvault.json",
                r#"{
                    "tiers": {"source": "/a", "cache": "/b", "state": "/s"},
                    "matrix": [{"media_type": "movie", "quality_order": ["hd"]}],
                    "media_server": {"url": "http://jellyfin:8096", "api_key": "secret"}
                }"#,
            )?;
            let config = Config::load(Some(Path::new("mvault.json"))).unwrap();
            assert_eq!(config.tiers.merged, None);
            assert_eq!(config.media_server.as_ref().unwrap().url, "http://jellyfin:8096");
            assert!(!format!("{:?}", config.media_server).contains("secret"));
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        Jail::expect_with(|_| {
            let err = Config::load(Some(Path::new("missing.toml"))).unwrap_err();
            assert_eq!(*err, ErrorKind::Load);
            Ok(())
        });
    }

    #[test]
    fn test_unknown_extension_is_invalid() {
        let err = Config::load(Some(Path::new("/etc/mvault.ini"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }
}
