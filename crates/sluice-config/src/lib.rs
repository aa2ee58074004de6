//! Sluice configuration.
//!
//! Settings are read from a TOML file (`sluice.toml`) and cover where the database metadata cache
//! lives and how logging is set up:
//!
//! ```toml
//! [db_cache]
//! directory = "/var/cache/sluice"
//! enabled = true
//!
//! [logging]
//! level = "info"
//! json = false
//! stderr = true
//! file = "/var/log/sluice.log"
//! ```

mod logging;

pub use logging::{init_tracing, LoggingConfig};

use parking_lot::ReentrantMutex;
use serde::{Deserialize, Serialize};
use sluice_dbcache::{DbCacheConfig, DbCacheError};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

/// Environment variable pointing at an explicit config file.
pub const SLUICE_CONFIG_ENV_VAR: &str = "SLUICE_CONFIG_PATH";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SluiceConfig {
    #[serde(default)]
    pub db_cache: DbCacheSection,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The `[db_cache]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DbCacheSection {
    /// Directory holding `db.cache-<version>`.
    ///
    /// When unset, `SLUICE_CACHE_DIR` is consulted, then `~/.sluice`. Relative paths in a config
    /// file are resolved against the directory containing that file.
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Whether the cache starts out active.
    #[serde(default = "DbCacheSection::default_enabled")]
    pub enabled: bool,
}

impl DbCacheSection {
    fn default_enabled() -> bool {
        true
    }
}

impl Default for DbCacheSection {
    fn default() -> Self {
        Self {
            directory: None,
            enabled: Self::default_enabled(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
}

const REDACTED: &str = "<redacted>";

/// Strips user-provided values out of a TOML/serde error message.
fn sanitize_toml_error_message(message: &str) -> String {
    static DOUBLE_QUOTED: OnceLock<regex::Regex> = OnceLock::new();
    static SINGLE_QUOTED: OnceLock<regex::Regex> = OnceLock::new();

    let double = DOUBLE_QUOTED.get_or_init(|| {
        regex::Regex::new(r#""(?:\\.|[^"\\])*""#).expect("quoted-string regex should compile")
    });
    let single = SINGLE_QUOTED.get_or_init(|| {
        regex::Regex::new(r"'(?:\\.|[^'\\])*'").expect("single-quoted-string regex should compile")
    });

    let out = double.replace_all(message, format!("\"{REDACTED}\""));
    let mut out = single
        .replace_all(&out, format!("'{REDACTED}'"))
        .into_owned();

    // Backticks hold both user input (`unknown field `x``, `invalid type: integer `1``) and schema
    // names (`missing field `x``, the `expected ...` list). Only the former is redacted.
    let start = ["unknown field `", "unknown variant `"]
        .iter()
        .filter_map(|pattern| out.find(pattern).map(|pos| pos + pattern.len() - 1))
        .min()
        .or_else(|| {
            if out.contains("invalid type:") || out.contains("invalid value:") {
                let boundary = out.find(", expected").unwrap_or(out.len());
                out[..boundary].find('`')
            } else {
                None
            }
        });
    if let Some(start) = start {
        let after = &out[start + 1..];
        let end = after
            .find("`, expected")
            .or_else(|| after.find('`'))
            .map(|rel| start + 1 + rel);
        if let Some(end) = end {
            out.replace_range(start + 1..end, REDACTED);
        }
    }

    out
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // `Display` for `toml::de::Error` quotes the offending source line; keep only the message.
        ConfigError::Toml(sanitize_toml_error_message(err.message()))
    }
}

impl SluiceConfig {
    /// Load a config file from TOML.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::load_from_str(&text)?;
        if let (Some(dir), Some(base)) = (config.db_cache.directory.as_mut(), path.parent()) {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
        Ok(config)
    }

    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// The database cache settings, with the directory resolved.
    pub fn db_cache_config(&self) -> Result<DbCacheConfig, DbCacheError> {
        let config = match &self.db_cache.directory {
            Some(directory) => DbCacheConfig::new(directory),
            None => with_config_env_lock(DbCacheConfig::from_env)?,
        };
        Ok(config.with_start_active(self.db_cache.enabled))
    }
}

static CONFIG_ENV_LOCK: OnceLock<ReentrantMutex<()>> = OnceLock::new();

/// Run `f` while holding the lock that serializes reads of Sluice's environment variables.
///
/// Tests that set `SLUICE_CONFIG_PATH` or `SLUICE_CACHE_DIR` should do so inside this.
pub fn with_config_env_lock<R>(f: impl FnOnce() -> R) -> R {
    let _guard = CONFIG_ENV_LOCK
        .get_or_init(|| ReentrantMutex::new(()))
        .lock();
    f()
}

/// Find the config file for `dir`.
///
/// Search order:
/// 1) `SLUICE_CONFIG_PATH` (absolute or relative to `dir`)
/// 2) `sluice.toml`
/// 3) `.sluice.toml`
pub fn discover_config_path(dir: &Path) -> Option<PathBuf> {
    with_config_env_lock(|| {
        if let Some(value) = std::env::var_os(SLUICE_CONFIG_ENV_VAR).filter(|v| !v.is_empty()) {
            let candidate = PathBuf::from(value);
            let path = if candidate.is_absolute() {
                candidate
            } else {
                dir.join(candidate)
            };
            return Some(path);
        }

        ["sluice.toml", ".sluice.toml"]
            .into_iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    })
}

/// Load the configuration for `dir`, or the defaults if there is no config file.
pub fn load_for_dir(dir: &Path) -> Result<(SluiceConfig, Option<PathBuf>), ConfigError> {
    match discover_config_path(dir) {
        Some(path) => {
            let config = SluiceConfig::load_from_path(&path)?;
            tracing::debug!(
                target: "sluice.config",
                path = %path.display(),
                "loaded sluice config"
            );
            Ok((config, Some(path)))
        }
        None => Ok((SluiceConfig::default(), None)),
    }
}
