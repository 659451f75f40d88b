//! Runtime configuration loaded from TOML.
//!
//! ```toml
//! [store]
//! path = "cache/data_cache.db"
//! enabled = true
//!
//! [fetch]
//! parallelism = 4
//!
//! [[sources]]
//! name = "macro"
//! kind = "csv"
//! path = "data/macro.csv"
//! ```
//!
//! Every section is optional.

use crate::data::localfile::{FileKind, LocalFileSource};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable consulted when no explicit store path is configured.
pub const CACHE_PATH_ENV: &str = "METASERIES_CACHE_PATH";

/// Store path used when neither an explicit path nor the env var is set.
pub const DEFAULT_CACHE_PATH: &str = "./cache/data_cache.db";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub store: StoreConfig,
    pub fetch: FetchConfig,
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Explicit database path; falls back to the env var, then the default.
    pub path: Option<PathBuf>,
    /// When false the coordinator runs without a cache.
    pub enabled: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    /// Maximum number of upstream fetches in flight. 1 means sequential.
    pub parallelism: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { parallelism: 4 }
    }
}

/// A local file registered as a named source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub name: String,
    pub kind: FileKind,
    pub path: PathBuf,
}

impl SourceConfig {
    pub fn to_source(&self) -> LocalFileSource {
        LocalFileSource::new(&self.name, &self.path, self.kind)
    }
}

impl Config {
    /// Load from a TOML file. Relative source paths are taken relative to
    /// the file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        if let Some(base) = path.parent() {
            for source in &mut config.sources {
                if source.path.is_relative() {
                    source.path = base.join(&source.path);
                }
            }
        }
        Ok(config)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.parallelism == 0 {
            return Err(ConfigError::Invalid(
                "fetch.parallelism must be at least 1".into(),
            ));
        }
        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(ConfigError::Invalid("source name must not be empty".into()));
            }
            if !seen.insert(source.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
        }
        Ok(())
    }

    /// Store path after applying the explicit / env / default order.
    pub fn store_path(&self) -> PathBuf {
        StoreLocation::resolve(self.store.path.as_deref())
    }
}

/// Store path resolution.
pub struct StoreLocation;

impl StoreLocation {
    /// Explicit path, else `METASERIES_CACHE_PATH`, else `./cache/data_cache.db`.
    pub fn resolve(explicit: Option<&Path>) -> PathBuf {
        Self::resolve_with(explicit, std::env::var(CACHE_PATH_ENV).ok())
    }

    /// Resolution with the environment value passed in.
    pub fn resolve_with(explicit: Option<&Path>, env_value: Option<String>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        match env_value {
            Some(value) if !value.trim().is_empty() => PathBuf::from(value),
            _ => PathBuf::from(DEFAULT_CACHE_PATH),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.store.enabled);
        assert_eq!(config.fetch.parallelism, 4);
    }

    #[test]
    fn full_config_parses() {
        let toml = r#"
            [store]
            path = "/tmp/ms.db"
            enabled = false

            [fetch]
            parallelism = 2

            [[sources]]
            name = "macro"
            kind = "csv"
            path = "data/macro.csv"
        "#;
        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.store.path, Some(PathBuf::from("/tmp/ms.db")));
        assert!(!config.store.enabled);
        assert_eq!(config.fetch.parallelism, 2);
        assert_eq!(config.sources[0].kind, FileKind::Csv);
        assert_eq!(config.store_path(), PathBuf::from("/tmp/ms.db"));
    }

    #[test]
    fn zero_parallelism_rejected() {
        let err = Config::from_toml("[fetch]\nparallelism = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn duplicate_source_names_rejected() {
        let toml = r#"
            [[sources]]
            name = "macro"
            kind = "csv"
            path = "a.csv"

            [[sources]]
            name = "macro"
            kind = "parquet"
            path = "b.parquet"
        "#;
        assert!(matches!(
            Config::from_toml(toml).unwrap_err(),
            ConfigError::Invalid(msg) if msg.contains("macro")
        ));
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(matches!(
            Config::from_toml("[store]\nlocation = \"x\"\n").unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn store_location_order() {
        let explicit = Path::new("/explicit.db");
        assert_eq!(
            StoreLocation::resolve_with(Some(explicit), Some("/env.db".into())),
            PathBuf::from("/explicit.db")
        );
        assert_eq!(
            StoreLocation::resolve_with(None, Some("/env.db".into())),
            PathBuf::from("/env.db")
        );
        assert_eq!(
            StoreLocation::resolve_with(None, Some("  ".into())),
            PathBuf::from(DEFAULT_CACHE_PATH)
        );
        assert_eq!(
            StoreLocation::resolve_with(None, None),
            PathBuf::from(DEFAULT_CACHE_PATH)
        );
    }

    #[test]
    fn relative_source_paths_follow_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("metaseries.toml");
        std::fs::write(
            &path,
            "[[sources]]\nname = \"macro\"\nkind = \"csv\"\npath = \"macro.csv\"\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.sources[0].path, dir.path().join("macro.csv"));
    }
}
