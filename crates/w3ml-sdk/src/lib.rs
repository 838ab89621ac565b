//! High-level SDK for w3ml.
//!
//! [`Database`] is the main entry point for applications embedding w3ml: it
//! owns one open replay index, runs the add-replay workflow on top of a
//! [`ReplayParser`], and flushes its stores when the session ends.

pub mod config;
pub mod database;
pub mod error;
pub mod parser;

pub use config::{DbConfig, FetchConfig, ParserConfig};
pub use database::{actions_per_minute, AddOutcome, Database};
pub use error::{SdkError, SdkResult};
pub use parser::{CommandParser, ParsedReplay, Participant, ReplayParser};

// Re-export key types
pub use w3ml_index::{CatalogEntry, IndexError};
pub use w3ml_store::{StoreConfig, StoreError, SyncMode, TimelineConfig};
pub use w3ml_types::{ActionTimeline, PlayerRow, ReplayHash, ReplayRow, SliceSpec, Token, COLUMNS};
