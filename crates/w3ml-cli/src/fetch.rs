//! Replay input sources: local files, directories, and HTTP URLs.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use tracing::debug;
use walkdir::WalkDir;

use w3ml_sdk::FetchConfig;

/// Largest replay accepted from a download.
const MAX_DOWNLOAD_BYTES: u64 = 64 * 1024 * 1024;
const REPLAY_EXTENSION: &str = "w3g";

/// One replay to add.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    File(PathBuf),
    Url(String),
}

impl Input {
    pub fn read(&self, agent: &ureq::Agent) -> anyhow::Result<Vec<u8>> {
        match self {
            Self::File(path) => {
                std::fs::read(path).with_context(|| format!("reading {}", path.display()))
            }
            Self::Url(url) => download(agent, url),
        }
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Url(url) => write!(f, "{url}"),
        }
    }
}

pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Turn command-line arguments into replay inputs. Directories are walked
/// recursively for `.w3g` files, in path order.
pub fn expand_inputs(args: &[String]) -> anyhow::Result<Vec<Input>> {
    let mut inputs = Vec::new();
    for arg in args {
        if is_url(arg) {
            inputs.push(Input::Url(arg.clone()));
            continue;
        }
        let path = Path::new(arg);
        if path.is_dir() {
            let before = inputs.len();
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry.with_context(|| format!("walking {}", path.display()))?;
                if entry.file_type().is_file() && is_replay_file(entry.path()) {
                    inputs.push(Input::File(entry.into_path()));
                }
            }
            debug!(dir = %path.display(), replays = inputs.len() - before, "expanded directory");
        } else if path.exists() {
            inputs.push(Input::File(path.to_path_buf()));
        } else {
            bail!("no such file or directory: {}", path.display());
        }
    }
    Ok(inputs)
}

fn is_replay_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(REPLAY_EXTENSION))
}

pub fn build_agent(config: &FetchConfig) -> ureq::Agent {
    let timeout = Duration::from_secs(config.timeout_secs.max(1));
    ureq::AgentBuilder::new()
        .timeout_connect(timeout)
        .timeout_read(timeout)
        .timeout_write(timeout)
        .user_agent(&config.user_agent)
        .build()
}

fn download(agent: &ureq::Agent, url: &str) -> anyhow::Result<Vec<u8>> {
    let response = match agent.get(url).call() {
        Ok(response) => response,
        Err(ureq::Error::Status(code, _)) => bail!("GET {url} failed with http status {code}"),
        Err(ureq::Error::Transport(err)) => bail!("GET {url} transport error: {err}"),
    };
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_DOWNLOAD_BYTES + 1)
        .read_to_end(&mut bytes)
        .with_context(|| format!("downloading {url}"))?;
    if bytes.len() as u64 > MAX_DOWNLOAD_BYTES {
        bail!("{url} is larger than {MAX_DOWNLOAD_BYTES} bytes");
    }
    debug!(url, len = bytes.len(), "downloaded replay");
    Ok(bytes)
}
