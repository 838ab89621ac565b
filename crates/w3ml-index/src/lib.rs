//! Replay catalog for w3ml.
//!
//! Ties the blob log, catalog table and timeline table of `w3ml-store`
//! together under one dense index space, and keeps the in-memory lookup
//! structures that make the catalog content-addressed.
//!
//! # Key Types
//!
//! - [`ReplayIndex`] -- open/add/resolve/list over the three co-indexed stores
//! - [`CatalogEntry`] -- a catalog row paired with its index
//! - [`SortedHashes`] -- ordered hash set driving prefix resolution

pub mod entry;
pub mod error;
pub mod index;
pub mod prefix;

pub use entry::CatalogEntry;
pub use error::{IndexError, IndexResult};
pub use index::{ReplayIndex, BLOBS_FILE, CATALOG_FILE, TIMELINE_FILE};
pub use prefix::SortedHashes;
