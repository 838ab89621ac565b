use std::path::Path;

use serde::{Deserialize, Serialize};
use w3ml_store::StoreConfig;

use crate::error::SdkResult;

/// Top-level database configuration, usually read from a TOML file.
///
/// ```toml
/// [store]
/// sync_mode = "every-write"
///
/// [store.timeline]
/// buckets = 60
/// bucket_ms = 60000
///
/// [parser]
/// program = "w3g-json"
/// args = []
/// events_args = ["--events"]
///
/// [fetch]
/// timeout_secs = 30
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub store: StoreConfig,
    pub parser: ParserConfig,
    pub fetch: FetchConfig,
}

impl DbConfig {
    /// Load from a TOML file. Missing sections and keys take their defaults.
    pub fn load(path: &Path) -> SdkResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> SdkResult<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// External replay parser invocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Program that reads a replay on stdin and prints JSON on stdout.
    pub program: String,
    /// Arguments for metadata output.
    pub args: Vec<String>,
    /// Arguments for event-stream output.
    pub events_args: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            program: "w3g-json".into(),
            args: Vec::new(),
            events_args: vec!["--events".into()],
        }
    }
}

/// HTTP download settings for replay URLs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("w3ml/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}
