use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, DbCacheError>;

/// Errors produced while loading, saving or locating the database metadata cache.
///
/// Lookups and inserts never fail; a cache problem only ever forfeits the optimization.
#[derive(Debug, thiserror::Error)]
pub enum DbCacheError {
    #[error("failed to determine home directory for default cache path")]
    MissingHomeDir,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A record was truncated or malformed. `record` is the 0-based index of the record being
    /// decoded.
    #[error("corrupt database cache record #{record}: {source}")]
    Corrupt {
        record: usize,
        #[source]
        source: bincode::Error,
    },

    #[error("couldn't read the database cache {path}: {source}")]
    Init {
        path: PathBuf,
        #[source]
        source: Box<DbCacheError>,
    },

    #[error("can't write to the database cache file {path}")]
    NotWritable { path: PathBuf },

    #[error("database cache has no schema for key [{database}] {signature}; refusing to save")]
    Inconsistent { database: String, signature: String },

    #[error("failed to encode database cache entry: {0}")]
    Encode(#[source] bincode::Error),
}

impl DbCacheError {
    /// Returns `true` for failures caused by unreadable or corrupt cache contents, as opposed to
    /// environment problems (missing home directory, permissions).
    pub fn is_corruption(&self) -> bool {
        match self {
            DbCacheError::Corrupt { .. } | DbCacheError::Inconsistent { .. } => true,
            DbCacheError::Init { source, .. } => source.is_corruption(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_error_names_path_and_cause() {
        let err = DbCacheError::Init {
            path: PathBuf::from("/tmp/sluice/db.cache-1.0"),
            source: Box::new(DbCacheError::Corrupt {
                record: 3,
                source: Box::new(bincode::ErrorKind::SizeLimit),
            }),
        };
        let message = err.to_string();
        assert!(message.contains("db.cache-1.0"), "{message}");
        assert!(message.contains("record #3"), "{message}");
        assert!(err.is_corruption());
    }

    #[test]
    fn permission_failures_are_not_corruption() {
        let err = DbCacheError::NotWritable {
            path: PathBuf::from("db.cache-1.0"),
        };
        assert!(!err.is_corruption());
    }
}
