//! Error types for paramdd-model

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for paramdd-model operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading, editing or diffing parameter sets
#[derive(Debug, Error)]
pub enum Error {
    /// A line does not have the `KEY = VALUE (TYPE)` shape
    #[error("Parse error at line {line}: '{content}' is not a `KEY = VALUE (TYPE)` record")]
    Parse {
        /// 1-based line number
        line: usize,
        /// Offending line content
        content: String,
    },

    /// The same key appears twice in one file
    #[error("Duplicate key at line {line}: {key}")]
    DuplicateKey {
        /// 1-based line number of the second occurrence
        line: usize,
        /// Repeated key
        key: String,
    },

    /// Two parameter sets disagree on the key at a position
    #[error("Key mismatch at position {position}: {left} vs {right}")]
    KeyMismatch {
        /// 0-based record position
        position: usize,
        /// Key in the left-hand set
        left: String,
        /// Key in the right-hand set
        right: String,
    },

    /// Two parameter sets have different record counts
    #[error("Length mismatch: {left} records vs {right} records")]
    LengthMismatch {
        /// Records in the left-hand set
        left: usize,
        /// Records in the right-hand set
        right: usize,
    },

    /// Replacement targeted a key the set does not contain
    #[error("Unknown key: {0}")]
    UnknownKey(String),

    /// Replacement record carries a different key than the slot
    #[error("Cannot replace '{slot}' with a record keyed '{record}'")]
    ReplaceKeyMismatch {
        /// Key being replaced
        slot: String,
        /// Key of the supplied record
        record: String,
    },

    /// Error tagged with the file it came from
    #[error("{}: {source}", path.display())]
    InFile {
        /// File being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: Box<Error>,
    },

    /// IO error
    #[error("IO error on {}: {source}", path.display())]
    Io {
        /// File being read or written
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// IO error without an associated path (streams)
    #[error("IO error: {0}")]
    Stream(#[from] std::io::Error),
}

impl Error {
    /// Attach a file path to a parse-level error
    #[must_use]
    pub fn in_file(self, path: impl Into<PathBuf>) -> Self {
        match self {
            Self::Io { .. } | Self::InFile { .. } => self,
            Self::Stream(source) => Self::Io {
                path: path.into(),
                source,
            },
            other => Self::InFile {
                path: path.into(),
                source: Box::new(other),
            },
        }
    }

    /// True for errors that indicate the two inputs were never comparable
    #[must_use]
    pub fn is_alignment_error(&self) -> bool {
        match self {
            Self::KeyMismatch { .. } | Self::LengthMismatch { .. } => true,
            Self::InFile { source, .. } => source.is_alignment_error(),
            _ => false,
        }
    }
}
