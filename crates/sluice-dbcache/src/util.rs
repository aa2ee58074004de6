use crate::error::DbCacheError;
use std::fs;
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Hard upper bound for a single bincode-encoded value (one key or one schema) read from the
/// cache file.
///
/// A corrupted length prefix must fail the load instead of requesting an enormous allocation.
pub const BINCODE_PAYLOAD_LIMIT_BYTES: usize = 16 * 1024 * 1024;

pub(crate) fn bincode_options() -> impl bincode::Options + Copy {
    use bincode::Options as _;

    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
}

pub(crate) fn bincode_options_limited() -> impl bincode::Options + Copy {
    use bincode::Options as _;

    bincode_options().with_limit(BINCODE_PAYLOAD_LIMIT_BYTES as u64)
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Writes `path` by streaming into a temporary sibling file and renaming it into place.
///
/// Readers observe either the previous file or the complete new one. On failure the temporary
/// file is removed and `path` is left untouched.
pub(crate) fn atomic_write_with(
    path: &Path,
    write: impl FnOnce(&mut fs::File) -> Result<(), DbCacheError>,
) -> Result<(), DbCacheError> {
    let Some(parent) = path.parent() else {
        return Err(io::Error::other("path has no parent").into());
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };

    fs::create_dir_all(parent)?;

    let (tmp_path, mut file) = open_unique_tmp_file(path, parent)?;
    if let Ok(meta) = fs::metadata(path) {
        // The replacement keeps the mode of the file it replaces, not the umask default.
        if let Err(err) = file.set_permissions(meta.permissions()) {
            drop(file);
            remove_tmp_best_effort(&tmp_path, "atomic_write_with.set_permissions_failed");
            return Err(err.into());
        }
    }
    let write_result = write(&mut file).and_then(|()| Ok(file.sync_all()?));
    drop(file);
    if let Err(err) = write_result {
        remove_tmp_best_effort(&tmp_path, "atomic_write_with.write_failed");
        return Err(err);
    }

    if let Err(err) = rename_over(&tmp_path, path) {
        remove_tmp_best_effort(&tmp_path, "atomic_write_with.rename_failed");
        return Err(err.into());
    }

    sync_dir_best_effort(parent);
    Ok(())
}

/// Rewrites an already opened file in place: truncates it, runs `write`, then syncs.
///
/// Not atomic. A failure part way leaves a truncated file behind, which the next load reports as
/// corrupt.
pub(crate) fn write_in_place(
    mut file: fs::File,
    write: impl FnOnce(&mut fs::File) -> Result<(), DbCacheError>,
) -> Result<(), DbCacheError> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    write(&mut file)?;
    file.sync_all()?;
    Ok(())
}

fn rename_over(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        // `rename` doesn't replace an existing file on Windows.
        Err(err) if cfg!(windows) && to.exists() => {
            fs::remove_file(to)?;
            fs::rename(from, to).map_err(|_| err)
        }
        Err(err) => Err(err),
    }
}

fn remove_tmp_best_effort(path: &Path, reason: &'static str) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            tracing::debug!(
                target: "sluice.dbcache",
                path = %path.display(),
                reason,
                error = %err,
                "failed to remove temporary cache file"
            );
        }
    }
}

fn sync_dir_best_effort(dir: &Path) {
    #[cfg(unix)]
    {
        static SYNC_DIR_ERROR_LOGGED: std::sync::OnceLock<()> = std::sync::OnceLock::new();

        match fs::File::open(dir).and_then(|dir| dir.sync_all()) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                if SYNC_DIR_ERROR_LOGGED.set(()).is_ok() {
                    tracing::debug!(
                        target: "sluice.dbcache",
                        dir = %dir.display(),
                        error = %err,
                        "failed to sync cache directory (best effort)"
                    );
                }
            }
        }
    }

    #[cfg(not(unix))]
    let _ = dir;
}

fn open_unique_tmp_file(dest: &Path, parent: &Path) -> io::Result<(PathBuf, fs::File)> {
    let file_name = dest
        .file_name()
        .ok_or_else(|| io::Error::other("destination path has no file name"))?;
    let pid = std::process::id();

    loop {
        let counter = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(format!(".tmp.{pid}.{counter}"));
        let tmp_path = parent.join(tmp_name);

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
        {
            Ok(file) => return Ok((tmp_path, file)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err),
        }
    }
}
