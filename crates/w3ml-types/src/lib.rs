//! Foundation types for w3ml, the Warcraft III replay index.
//!
//! Every other w3ml crate depends on `w3ml-types`.
//!
//! # Key Types
//!
//! - [`ReplayHash`] -- 20-byte content hash identifying a stored replay
//! - [`ReplayRow`] / [`PlayerRow`] -- fixed-width catalog metadata
//! - [`ActionTimeline`] -- per-player action counts over fixed time buckets
//! - [`Token`] -- user input accepted by index resolution
//! - [`SliceSpec`] -- windowed listing over the catalog

pub mod error;
pub mod hash;
pub mod record;
pub mod slice;
pub mod token;

pub use error::TypeError;
pub use hash::ReplayHash;
pub use record::{widths, ActionTimeline, PlayerRow, ReplayRow, COLUMNS, PLAYERS};
pub use slice::{SliceRange, SliceSpec};
pub use token::Token;
