use crate::util::bincode_options_limited;
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{BufRead, Write};

/// Identity of a cached schema lookup: a logical database plus the query or table signature that
/// was described against it.
///
/// Keys are compared by exact value. No whitespace, case or parameter-order normalization is
/// applied to the signature, so two spellings of the same query are two different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DbCacheKey {
    database: String,
    signature: String,
}

impl DbCacheKey {
    pub fn new(database: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            signature: signature.into(),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Whether this key was recorded against the database named `name` (exact, case-sensitive).
    pub fn matches_database(&self, name: &str) -> bool {
        self.database == name
    }

    pub fn encode<W: Write>(&self, writer: &mut W) -> bincode::Result<()> {
        bincode_options_limited().serialize_into(writer, self)
    }

    /// Decodes the next key from `reader`.
    ///
    /// Returns `Ok(None)` when the reader is exhausted before the first byte of a key. Running out
    /// of bytes anywhere after that is an error.
    pub fn decode<R: BufRead>(reader: &mut R) -> bincode::Result<Option<Self>> {
        if reader.fill_buf()?.is_empty() {
            return Ok(None);
        }
        bincode_options_limited().deserialize_from(reader).map(Some)
    }
}

impl fmt::Display for DbCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.database, self.signature)
    }
}
