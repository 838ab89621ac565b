//! Append-only storage for w3ml.
//!
//! Three co-indexed stores back a replay database: the blob log holding raw
//! replay bytes, the catalog table holding one [`ReplayRow`] per replay, and
//! the timeline table holding one [`ActionTimeline`] per replay. Record `i`
//! in each store belongs to the same replay.
//!
//! # Backends
//!
//! - [`FileBlobStore`] -- CRC-framed log of variable-length payloads
//! - [`FileTable`] -- fixed-width records with per-record CRC, random access
//! - [`InMemoryBlobStore`] / [`InMemoryTable`] -- `Vec`-backed, for tests and embedding
//!
//! # Design Rules
//!
//! 1. Records are never mutated or removed after append.
//! 2. Indices are dense and equal append order.
//! 3. Structural damage (bad header, truncated record, CRC mismatch) is an
//!    error, never silently skipped.
//! 4. All I/O errors are propagated.
//!
//! [`ReplayRow`]: w3ml_types::ReplayRow
//! [`ActionTimeline`]: w3ml_types::ActionTimeline

pub mod blob;
pub mod codec;
pub mod config;
pub mod error;
pub mod memory;
pub mod table;
pub mod traits;

pub use blob::FileBlobStore;
pub use codec::{RecordCodec, RowCodec, TimelineCodec};
pub use config::{StoreConfig, SyncMode, TimelineConfig};
pub use error::{AppendStage, StoreError, StoreResult};
pub use memory::{InMemoryBlobStore, InMemoryTable};
pub use table::FileTable;
pub use traits::{BlobStore, RecordTable};
