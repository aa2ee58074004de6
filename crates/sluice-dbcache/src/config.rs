use crate::error::DbCacheError;
use std::path::{Path, PathBuf};

/// Environment variable overriding the directory the cache file lives in.
pub const CACHE_DIR_ENV_VAR: &str = "SLUICE_CACHE_DIR";

/// Base name of the cache file; the build version is appended.
pub const DB_CACHE_FILE_PREFIX: &str = "db.cache-";

/// Where the database metadata cache lives and how it starts up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DbCacheConfig {
    /// Directory holding the cache file.
    pub directory: PathBuf,
    /// Build version embedded in the file name. Caches written by other versions are never read.
    pub version: String,
    /// Initial state of the active flag after loading.
    pub start_active: bool,
}

impl DbCacheConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            version: sluice_core::SLUICE_VERSION.to_string(),
            start_active: true,
        }
    }

    /// Uses `SLUICE_CACHE_DIR` when set, otherwise `~/.sluice`.
    pub fn from_env() -> Result<Self, DbCacheError> {
        let directory = match std::env::var_os(CACHE_DIR_ENV_VAR) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => default_cache_root()?,
        };
        Ok(Self::new(directory))
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_start_active(mut self, start_active: bool) -> Self {
        self.start_active = start_active;
        self
    }

    pub fn cache_file_path(&self) -> PathBuf {
        cache_file_path(&self.directory, &self.version)
    }
}

/// `<directory>/db.cache-<version>`.
pub fn cache_file_path(directory: &Path, version: &str) -> PathBuf {
    directory.join(format!("{DB_CACHE_FILE_PREFIX}{version}"))
}

/// `~/.sluice`, the per-user directory Sluice keeps its state in.
pub fn default_cache_root() -> Result<PathBuf, DbCacheError> {
    let home = std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .ok_or(DbCacheError::MissingHomeDir)?;

    Ok(home.join(".sluice"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_embeds_version() {
        let config = DbCacheConfig::new("/var/cache/sluice").with_version("9.4.0.0-343");
        assert_eq!(
            config.cache_file_path(),
            Path::new("/var/cache/sluice").join("db.cache-9.4.0.0-343")
        );
    }

    #[test]
    fn different_versions_never_share_a_file() {
        let dir = Path::new("cache");
        assert_ne!(cache_file_path(dir, "1.0.0"), cache_file_path(dir, "1.0.1"));
    }

    #[test]
    fn defaults_to_running_build() {
        let config = DbCacheConfig::new("cache");
        assert_eq!(config.version, sluice_core::SLUICE_VERSION);
        assert!(config.start_active);
    }
}
