use std::fmt;
use std::path::PathBuf;

/// Which of the three co-indexed stores an append was writing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendStage {
    Blob,
    Catalog,
    Timeline,
}

impl fmt::Display for AppendStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blob => write!(f, "blob"),
            Self::Catalog => write!(f, "catalog"),
            Self::Timeline => write!(f, "timeline"),
        }
    }
}

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error from the underlying file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested index is past the end of the store.
    #[error("index {index} out of range (length {len})")]
    OutOfRange { index: u64, len: u64 },

    /// The file does not start with the expected magic bytes.
    #[error("invalid magic in {path:?}: expected {expected}, got {actual}")]
    InvalidMagic {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// The file was written by an unknown format version.
    #[error("unsupported format version {version} in {path:?}")]
    UnsupportedVersion { path: PathBuf, version: u32 },

    /// The table's record width does not match the codec in use.
    #[error("record width mismatch in {path:?}: expected {expected}, found {actual}")]
    WidthMismatch {
        path: PathBuf,
        expected: u32,
        actual: u32,
    },

    /// Structural damage: truncated frame or record, undecodable field.
    #[error("corrupt data in {path:?} at offset {offset}: {reason}")]
    Corrupt {
        path: PathBuf,
        offset: u64,
        reason: String,
    },

    /// A payload too large for the frame length field. Nothing was written.
    #[error("payload of {len} bytes does not fit a u32 frame length")]
    PayloadTooLarge { len: u64 },

    /// A stored record failed its CRC check.
    #[error("CRC mismatch in {path:?} for record {index}: expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch {
        path: PathBuf,
        index: u64,
        expected: u32,
        actual: u32,
    },

    /// A multi-store append failed after at least one store was written.
    /// The stores are left with unequal lengths.
    #[error("partial append of record {index}: {stage} store failed: {source}")]
    PartialAppend {
        index: u64,
        stage: AppendStage,
        source: Box<StoreError>,
    },

    /// The catalog holds the same content hash twice.
    #[error("hash {hash} stored at both index {first} and {second}")]
    DuplicateRecord { hash: String, first: u64, second: u64 },

    /// The co-indexed stores disagree on their length.
    #[error("store lengths disagree: {blobs} blobs, {rows} catalog rows, {timelines} timelines")]
    LengthMismatch { blobs: u64, rows: u64, timelines: u64 },
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
