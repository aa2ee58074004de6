use crate::codec;
use crate::config::DbCacheConfig;
use crate::error::{DbCacheError, Result};
use crate::store::DbCache;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

const SAVE_BUFFER_BYTES: usize = 64 * 1024;

/// A [`DbCache`] bound to its on-disk snapshot.
///
/// Opening loads the snapshot (if any); [`DbCacheService::save_to_disk`] writes the current
/// contents back. Dereferences to the underlying [`DbCache`] for lookups.
#[derive(Debug)]
pub struct DbCacheService {
    path: PathBuf,
    cache: Arc<DbCache>,
}

impl DbCacheService {
    pub fn open(config: &DbCacheConfig) -> Result<Self> {
        Self::open_at(config.cache_file_path(), config.start_active)
    }

    /// Opens the cache backed by `path`.
    ///
    /// A missing file yields an empty cache. A file that exists but can't be read completely is an
    /// [`DbCacheError::Init`] error; a partially loaded cache is never returned.
    pub fn open_at(path: impl Into<PathBuf>, start_active: bool) -> Result<Self> {
        let path = path.into();
        let cache = DbCache::new();

        match File::open(&path) {
            Ok(file) => {
                tracing::debug!(
                    target: "sluice.dbcache",
                    path = %path.display(),
                    "loading database cache"
                );
                let mut reader = BufReader::new(file);
                let count = codec::load_into(&mut reader, &cache).map_err(|err| {
                    DbCacheError::Init {
                        path: path.clone(),
                        source: Box::new(err),
                    }
                })?;
                tracing::debug!(
                    target: "sluice.dbcache",
                    path = %path.display(),
                    count,
                    "read cached row schemas from the database cache"
                );
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(
                    target: "sluice.dbcache",
                    path = %path.display(),
                    "the database cache doesn't exist yet"
                );
            }
            Err(err) => {
                return Err(DbCacheError::Init {
                    path,
                    source: Box::new(err.into()),
                });
            }
        }

        cache.set_active(start_active);
        Ok(Self {
            path,
            cache: Arc::new(cache),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cache(&self) -> &Arc<DbCache> {
        &self.cache
    }

    /// Writes every entry to the cache file, returning the number of records written.
    ///
    /// Refuses with [`DbCacheError::NotWritable`] when the file exists but this process can't
    /// open it for writing; the file is left untouched. Otherwise the new contents are streamed
    /// into a temporary sibling that takes over the old file's mode and is renamed over it, so a
    /// failed save leaves the previous snapshot in place.
    ///
    /// The file is rewritten in place instead when the path is a symlink (the link is kept and
    /// its target updated) or when the directory doesn't allow creating the temporary file.
    pub fn save_to_disk(&self) -> Result<usize> {
        let existing = self.open_for_write()?;
        let is_symlink = std::fs::symlink_metadata(&self.path)
            .map(|meta| meta.file_type().is_symlink())
            .unwrap_or(false);

        let count = match existing {
            Some(file) if is_symlink => self.save_in_place(file)?,
            Some(file) => match self.save_replacing() {
                Err(DbCacheError::Io(err)) if err.kind() == io::ErrorKind::PermissionDenied => {
                    tracing::debug!(
                        target: "sluice.dbcache",
                        path = %self.path.display(),
                        error = %err,
                        "can't replace the database cache file; rewriting it in place"
                    );
                    self.save_in_place(file)?
                }
                result => result?,
            },
            None => self.save_replacing()?,
        };

        tracing::debug!(
            target: "sluice.dbcache",
            path = %self.path.display(),
            count,
            "wrote cached row schemas to the database cache"
        );
        Ok(count)
    }

    /// Opens the existing cache file for writing without truncating it; `None` if there is none.
    fn open_for_write(&self) -> Result<Option<File>> {
        let not_writable = || {
            tracing::warn!(
                target: "sluice.dbcache",
                path = %self.path.display(),
                "database cache file is not writable; not saving"
            );
            DbCacheError::NotWritable {
                path: self.path.clone(),
            }
        };

        match std::fs::metadata(&self.path) {
            Ok(meta) if meta.permissions().readonly() => return Err(not_writable()),
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        }

        match OpenOptions::new().write(true).open(&self.path) {
            Ok(file) => Ok(Some(file)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => Err(not_writable()),
            Err(err) => Err(err.into()),
        }
    }

    fn save_replacing(&self) -> Result<usize> {
        let mut count = 0;
        crate::util::atomic_write_with(&self.path, |file| {
            count = self.write_snapshot(file)?;
            Ok(())
        })?;
        Ok(count)
    }

    fn save_in_place(&self, file: File) -> Result<usize> {
        let mut count = 0;
        crate::util::write_in_place(file, |file| {
            count = self.write_snapshot(file)?;
            Ok(())
        })?;
        Ok(count)
    }

    fn write_snapshot(&self, file: &mut File) -> Result<usize> {
        let mut writer = BufWriter::with_capacity(SAVE_BUFFER_BYTES, file);
        let count = codec::save_from(&self.cache, &mut writer)?;
        writer.flush()?;
        Ok(count)
    }
}

impl Deref for DbCacheService {
    type Target = DbCache;

    fn deref(&self) -> &DbCache {
        &self.cache
    }
}

type OpenFn = dyn Fn() -> Result<DbCacheService> + Send + Sync;

/// Lazily opened, shared [`DbCacheService`].
///
/// The first call to [`SharedDbCache::get`] opens the cache; every later call returns the same
/// instance. If opening fails, that failure is kept and handed to every caller: a broken cache
/// file is never silently replaced by an empty cache, and opening is never retried.
///
/// Compose one of these at the root of the engine and pass it down; [`SharedDbCache::global`] is
/// there for code that has no such root.
pub struct SharedDbCache {
    open: Box<OpenFn>,
    service: OnceLock<std::result::Result<Arc<DbCacheService>, Arc<DbCacheError>>>,
}

impl SharedDbCache {
    pub fn new(config: DbCacheConfig) -> Self {
        Self::with_opener(move || DbCacheService::open(&config))
    }

    /// Resolves the configuration from the environment on first use.
    pub fn from_env() -> Self {
        Self::with_opener(|| DbCacheService::open(&DbCacheConfig::from_env()?))
    }

    pub fn with_opener(
        open: impl Fn() -> Result<DbCacheService> + Send + Sync + 'static,
    ) -> Self {
        Self {
            open: Box::new(open),
            service: OnceLock::new(),
        }
    }

    /// Returns the process-wide instance, configured from the environment.
    pub fn global() -> &'static SharedDbCache {
        static GLOBAL: OnceLock<SharedDbCache> = OnceLock::new();
        GLOBAL.get_or_init(SharedDbCache::from_env)
    }

    pub fn get(&self) -> std::result::Result<Arc<DbCacheService>, Arc<DbCacheError>> {
        self.service
            .get_or_init(|| match (self.open)() {
                Ok(service) => Ok(Arc::new(service)),
                Err(err) => {
                    tracing::error!(
                        target: "sluice.dbcache",
                        error = %err,
                        "unable to create the database cache"
                    );
                    Err(Arc::new(err))
                }
            })
            .clone()
    }

    /// Whether [`SharedDbCache::get`] has already been attempted.
    pub fn is_initialized(&self) -> bool {
        self.service.get().is_some()
    }
}

impl fmt::Debug for SharedDbCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedDbCache")
            .field("service", &self.service.get())
            .finish_non_exhaustive()
    }
}
