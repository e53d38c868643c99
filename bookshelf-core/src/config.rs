// bookshelf-core/src/config.rs
// TOML configuration: store location and logging level

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{BookshelfError, Result};

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "BOOKSHELF_CONFIG";
/// Config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "bookshelf.toml";

/// Where the catalog lives: database file, logical database, collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub path: PathBuf,
    pub database: String,
    pub collection: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            path: PathBuf::from("bookshelf.db"),
            database: "bookstore".to_string(),
            collection: "books".to_string(),
        }
    }
}

impl ConnectionConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ConnectionConfig {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_database(mut self, database: &str) -> Self {
        self.database = database.to_string();
        self
    }

    pub fn with_collection(mut self, collection: &str) -> Self {
        self.collection = collection.to_string();
        self
    }

    /// Sidecar file holding the exclusive lock
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
        }
    }
}

/// Top-level config file
///
/// ```toml
/// [store]
/// path = "bookshelf.db"
/// database = "bookstore"
/// collection = "books"
///
/// [logging]
/// level = "info"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookshelfConfig {
    pub store: ConnectionConfig,
    pub logging: LoggingConfig,
}

impl BookshelfConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse a config file; a missing file is an error here
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BookshelfError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| BookshelfError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Resolve the config: explicit path, then `BOOKSHELF_CONFIG`, then
    /// `bookshelf.toml`, then defaults
    ///
    /// A named file that does not exist falls back to defaults and is
    /// reported as [`ConfigSource::Missing`] so the caller can warn once
    /// logging is up; an unreadable or invalid file is an error.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, ConfigSource)> {
        let named = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        if let Some(path) = named {
            if !path.exists() {
                return Ok((Self::default(), ConfigSource::Missing(path)));
            }
            let config = Self::from_file(&path)?;
            return Ok((config, ConfigSource::File(path)));
        }

        let implicit = PathBuf::from(DEFAULT_CONFIG_FILE);
        if implicit.exists() {
            let config = Self::from_file(&implicit)?;
            Ok((config, ConfigSource::File(implicit)))
        } else {
            Ok((Self::default(), ConfigSource::Defaults))
        }
    }
}

/// Where [`BookshelfConfig::load`] took its values from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    File(PathBuf),
    /// A named file that does not exist; defaults were used
    Missing(PathBuf),
    Defaults,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = BookshelfConfig::default();
        assert_eq!(config.store.path, PathBuf::from("bookshelf.db"));
        assert_eq!(config.store.database, "bookstore");
        assert_eq!(config.store.collection, "books");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = BookshelfConfig::from_toml_str(
            r#"
            [store]
            path = "/var/lib/bookshelf/catalog.db"
            "#,
        )
        .unwrap();
        assert_eq!(config.store.path, PathBuf::from("/var/lib/bookshelf/catalog.db"));
        assert_eq!(config.store.collection, "books");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let err = BookshelfConfig::from_toml_str("[store]\npath = 42").unwrap_err();
        assert!(matches!(err, BookshelfError::Config(_)));
    }

    #[test]
    fn test_explicit_file_loaded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bookshelf.toml");
        std::fs::write(
            &path,
            "[store]\ndatabase = \"shop\"\n[logging]\nlevel = \"debug\"\n",
        )
        .unwrap();

        let (config, source) = BookshelfConfig::load(Some(path.as_path())).unwrap();
        assert_eq!(source, ConfigSource::File(path));
        assert_eq!(config.store.database, "shop");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_missing_explicit_file_falls_back() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        let (config, source) = BookshelfConfig::load(Some(missing.as_path())).unwrap();
        assert_eq!(config, BookshelfConfig::default());
        assert_eq!(source, ConfigSource::Missing(missing));
    }

    #[test]
    fn test_lock_path() {
        let config = ConnectionConfig::new("/tmp/catalog.db");
        assert_eq!(config.lock_path(), PathBuf::from("/tmp/catalog.db.lock"));
    }
}
