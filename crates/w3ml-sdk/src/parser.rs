//! Replay parser integration.
//!
//! w3ml does not decode the replay format itself. A [`ReplayParser`] turns
//! raw replay bytes into a [`ParsedReplay`] and, on request, into the
//! replay's structured event stream. [`CommandParser`] delegates both to an
//! external program speaking JSON.

use std::collections::BTreeMap;
use std::io::Write;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::ParserConfig;
use crate::error::{SdkError, SdkResult};

/// One player as reported by the parser.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub player_name: String,
    pub race: String,
    pub color: String,
    /// Total actions issued over the game.
    pub action_count: u32,
    /// Game time of every action, in milliseconds.
    #[serde(default)]
    pub action_timeline: Vec<u32>,
}

/// Metadata extracted from a replay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParsedReplay {
    pub map_name: String,
    pub build_num: u32,
    pub replay_length_ms: u32,
    pub game_speed: String,
    /// Players keyed by lobby slot id.
    pub players: BTreeMap<u8, Participant>,
    /// Slot id of the winner, if the parser could tell.
    #[serde(default)]
    pub winner: Option<u8>,
}

impl ParsedReplay {
    /// The winning participant and its slot.
    pub fn winner(&self) -> Option<(u8, &Participant)> {
        let slot = self.winner?;
        self.players.get(&slot).map(|p| (slot, p))
    }

    pub fn participants(&self) -> usize {
        self.players.len()
    }
}

/// Extracts metadata and events from raw replay bytes.
pub trait ReplayParser {
    fn parse(&self, bytes: &[u8]) -> SdkResult<ParsedReplay>;

    /// Structured events of one replay, passed through verbatim.
    fn events(&self, bytes: &[u8]) -> SdkResult<Vec<Value>>;
}

/// Runs an external program per replay: the replay bytes go to its stdin,
/// a JSON document is read from its stdout.
#[derive(Clone, Debug)]
pub struct CommandParser {
    config: ParserConfig,
}

impl CommandParser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    fn run(&self, args: &[String], bytes: &[u8]) -> SdkResult<Vec<u8>> {
        let program = &self.config.program;
        debug!(program = %program, ?args, len = bytes.len(), "running replay parser");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SdkError::Parse(format!("failed to start {program}: {e}")))?;

        // stdin is fed while stdout drains. The writer drops stdin when it
        // returns, so the child always sees EOF and is reaped.
        let stdin = child.stdin.take();
        let (written, output) = std::thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(bytes),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            (writer.join(), output)
        });
        let output = output?;
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(SdkError::Parse(format!("writing replay to {program} panicked"))),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SdkError::Parse(format!(
                "{program} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }
}

impl ReplayParser for CommandParser {
    fn parse(&self, bytes: &[u8]) -> SdkResult<ParsedReplay> {
        let stdout = self.run(&self.config.args, bytes)?;
        serde_json::from_slice(&stdout)
            .map_err(|e| SdkError::Parse(format!("invalid replay metadata: {e}")))
    }

    fn events(&self, bytes: &[u8]) -> SdkResult<Vec<Value>> {
        let stdout = self.run(&self.config.events_args, bytes)?;
        serde_json::from_slice(&stdout)
            .map_err(|e| SdkError::Parse(format!("invalid replay events: {e}")))
    }
}
