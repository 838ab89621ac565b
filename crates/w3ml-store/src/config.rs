use serde::{Deserialize, Serialize};

/// Flush/sync strategy for store appends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// `fsync` after every append (safest, highest latency).
    EveryWrite,
    /// Rely on OS page-cache buffering until the store is flushed.
    OsDefault,
}

impl Default for SyncMode {
    fn default() -> Self {
        Self::OsDefault
    }
}

/// Shape of the per-replay action timeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Number of buckets per player track.
    pub buckets: usize,
    /// Width of one bucket in game milliseconds.
    pub bucket_ms: u32,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            buckets: 60,
            bucket_ms: 60_000,
        }
    }
}

/// Configuration for a replay store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub sync_mode: SyncMode,
    pub timeline: TimelineConfig,
}
