//! Flat-file persistence for [`DbCache`].
//!
//! The file is a plain sequence of records, each an encoded [`DbCacheKey`] immediately followed by
//! an encoded [`RowMeta`]. There is no header, record count or length prefix: the end of the file
//! at a record boundary terminates the list, and running out of bytes anywhere else is corruption.

use crate::error::{DbCacheError, Result};
use crate::key::DbCacheKey;
use crate::store::DbCache;
use crate::util::bincode_options_limited;
use bincode::Options;
use sluice_core::RowMeta;
use std::io::{self, BufRead, Write};

/// Reads the next record. `Ok(None)` means the reader ended cleanly between records.
///
/// Running out of bytes inside a record or undecodable bytes are [`DbCacheError::Corrupt`];
/// a failing read from the underlying reader is [`DbCacheError::Io`]. `record` is only used to
/// label errors.
pub fn read_record<R: BufRead>(
    reader: &mut R,
    record: usize,
) -> Result<Option<(DbCacheKey, RowMeta)>> {
    let corrupt = |source: bincode::Error| match *source {
        bincode::ErrorKind::Io(err) if err.kind() != io::ErrorKind::UnexpectedEof => {
            DbCacheError::Io(err)
        }
        source => DbCacheError::Corrupt {
            record,
            source: Box::new(source),
        },
    };

    let Some(key) = DbCacheKey::decode(reader).map_err(corrupt)? else {
        return Ok(None);
    };
    let schema: RowMeta = bincode_options_limited()
        .deserialize_from(reader)
        .map_err(corrupt)?;
    Ok(Some((key, schema)))
}

pub fn write_record<W: Write>(writer: &mut W, key: &DbCacheKey, schema: &RowMeta) -> Result<()> {
    key.encode(writer).map_err(DbCacheError::Encode)?;
    bincode_options_limited()
        .serialize_into(writer, schema)
        .map_err(DbCacheError::Encode)
}

/// Loads every record from `reader` into `cache`, returning the number of records read.
///
/// Records are inserted whether or not the cache is active; a later record for the same key
/// replaces an earlier one. Fails on the first malformed record, leaving the records before it in
/// `cache`.
pub fn load_into<R: BufRead>(reader: &mut R, cache: &DbCache) -> Result<usize> {
    let mut count = 0usize;
    while let Some((key, schema)) = read_record(reader, count)? {
        cache.insert(key, schema);
        count += 1;
    }
    Ok(count)
}

/// Writes every entry of `cache` to `writer`, returning the number of records written.
///
/// The caller owns buffering and flushing.
pub fn save_from<W: Write>(cache: &DbCache, writer: &mut W) -> Result<usize> {
    write_entries(writer, cache.keys(), |key| cache.peek(key))
}

/// Writes `keys` in order, resolving each schema through `lookup`.
///
/// A key without a schema means the cache changed underneath the save (or is broken); the save is
/// abandoned rather than producing a file with a dangling key.
fn write_entries<W: Write>(
    writer: &mut W,
    keys: Vec<DbCacheKey>,
    mut lookup: impl FnMut(&DbCacheKey) -> Option<RowMeta>,
) -> Result<usize> {
    let mut count = 0usize;
    for key in keys {
        let Some(schema) = lookup(&key) else {
            return Err(DbCacheError::Inconsistent {
                database: key.database().to_string(),
                signature: key.signature().to_string(),
            });
        };
        write_record(writer, &key, &schema)?;
        count += 1;
    }
    Ok(count)
}
