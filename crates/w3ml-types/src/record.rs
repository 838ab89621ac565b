//! Catalog row schema.
//!
//! A [`ReplayRow`] is the fixed-width metadata stored for every replay. String
//! fields have a maximum byte width (see [`widths`]); [`ReplayRow::fit`]
//! truncates them the same way the on-disk codec does, so a fitted row
//! survives a write/read cycle unchanged.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;
use crate::hash::ReplayHash;

/// Number of participants every catalog row carries.
pub const PLAYERS: usize = 2;

/// Maximum byte widths of the fixed-width string fields.
pub mod widths {
    pub const MAP_NAME: usize = 64;
    pub const SOURCE: usize = 128;
    pub const GAME_SPEED: usize = 8;
    pub const PLAYER_NAME: usize = 32;
    pub const RACE: usize = 12;
    pub const COLOR: usize = 12;
}

/// Column names accepted by [`ReplayRow::column`], in display order.
pub const COLUMNS: &[&str] = &[
    "hash",
    "map_name",
    "source",
    "build_num",
    "game_speed",
    "duration_ms",
    "winner",
    "p0_slot",
    "p0_name",
    "p0_race",
    "p0_color",
    "p0_actions",
    "p0_apm",
    "p1_slot",
    "p1_name",
    "p1_race",
    "p1_color",
    "p1_actions",
    "p1_apm",
];

/// Truncate `s` to at most `max` bytes without splitting a character.
pub fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn fit_string(s: &mut String, max: usize) {
    let end = truncate_utf8(s, max).len();
    s.truncate(end);
}

/// Per-player catalog fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerRow {
    /// Slot id assigned by the game lobby.
    pub slot: u8,
    pub name: String,
    pub race: String,
    pub color: String,
    /// Total actions issued over the whole game.
    pub actions: u32,
    /// Actions per minute over the game duration.
    pub apm: f32,
}

/// One catalog row: the metadata of a stored replay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayRow {
    /// Content hash of the replay bytes.
    pub hash: ReplayHash,
    pub map_name: String,
    /// Local path or URL the replay was added from.
    pub source: String,
    pub build_num: u32,
    pub game_speed: String,
    pub duration_ms: u32,
    /// Slot id of the winning player, when the parser could determine one.
    pub winner: Option<u8>,
    /// Participants in ascending slot order.
    pub players: [PlayerRow; PLAYERS],
}

impl ReplayRow {
    /// Truncate every string field to its fixed width.
    pub fn fit(mut self) -> Self {
        fit_string(&mut self.map_name, widths::MAP_NAME);
        fit_string(&mut self.source, widths::SOURCE);
        fit_string(&mut self.game_speed, widths::GAME_SPEED);
        for player in &mut self.players {
            fit_string(&mut player.name, widths::PLAYER_NAME);
            fit_string(&mut player.race, widths::RACE);
            fit_string(&mut player.color, widths::COLOR);
        }
        self
    }

    /// Look up a single column by name.
    pub fn column(&self, name: &str) -> Result<Value, TypeError> {
        let value = match name {
            "hash" => Value::from(self.hash.to_hex()),
            "map_name" => Value::from(self.map_name.as_str()),
            "source" => Value::from(self.source.as_str()),
            "build_num" => Value::from(self.build_num),
            "game_speed" => Value::from(self.game_speed.as_str()),
            "duration_ms" => Value::from(self.duration_ms),
            "winner" => self.winner.map(Value::from).unwrap_or(Value::Null),
            other => return self.player_column(other),
        };
        Ok(value)
    }

    fn player_column(&self, name: &str) -> Result<Value, TypeError> {
        let unknown = || TypeError::UnknownColumn(name.to_string());
        let (which, field) = name
            .strip_prefix('p')
            .and_then(|rest| rest.split_once('_'))
            .ok_or_else(unknown)?;
        let player = match which {
            "0" => &self.players[0],
            "1" => &self.players[1],
            _ => return Err(unknown()),
        };
        let value = match field {
            "slot" => Value::from(player.slot),
            "name" => Value::from(player.name.as_str()),
            "race" => Value::from(player.race.as_str()),
            "color" => Value::from(player.color.as_str()),
            "actions" => Value::from(player.actions),
            "apm" => Value::from(f64::from(player.apm)),
            _ => return Err(unknown()),
        };
        Ok(value)
    }
}

/// Action counts per fixed-width time bucket, one track per player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTimeline {
    pub tracks: [Vec<u32>; PLAYERS],
}

impl ActionTimeline {
    /// An all-zero timeline with `buckets` entries per track.
    pub fn zeroed(buckets: usize) -> Self {
        Self {
            tracks: [vec![0; buckets], vec![0; buckets]],
        }
    }

    /// Bin per-player action timestamps (milliseconds) into `buckets`
    /// buckets of `bucket_ms` each. Actions past the last bucket are dropped.
    pub fn bin(actions_ms: [&[u32]; PLAYERS], buckets: usize, bucket_ms: u32) -> Self {
        let mut timeline = Self::zeroed(buckets);
        if bucket_ms == 0 {
            return timeline;
        }
        for (track, times) in timeline.tracks.iter_mut().zip(actions_ms) {
            for &t in times {
                let bucket = (t / bucket_ms) as usize;
                if let Some(count) = track.get_mut(bucket) {
                    *count += 1;
                }
            }
        }
        timeline
    }

    /// Number of buckets per track.
    pub fn buckets(&self) -> usize {
        self.tracks[0].len()
    }

    /// Total actions counted on one track.
    pub fn total(&self, player: usize) -> u64 {
        self.tracks
            .get(player)
            .map(|t| t.iter().map(|&c| u64::from(c)).sum())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(slot: u8, name: &str) -> PlayerRow {
        PlayerRow {
            slot,
            name: name.into(),
            race: "human".into(),
            color: "red".into(),
            actions: 1200,
            apm: 80.0,
        }
    }

    fn row() -> ReplayRow {
        ReplayRow {
            hash: ReplayHash::of(b"row"),
            map_name: "(2)EchoIsles.w3x".into(),
            source: "replays/echo.w3g".into(),
            build_num: 6059,
            game_speed: "fast".into(),
            duration_ms: 900_000,
            winner: Some(1),
            players: [player(0, "Grubby"), player(1, "Moon")],
        }
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_utf8("abc", 8), "abc");
        assert_eq!(truncate_utf8("abcdef", 3), "abc");
        // 'é' is two bytes; cutting at 2 would split it.
        assert_eq!(truncate_utf8("aé", 2), "a");
    }

    #[test]
    fn fit_truncates_long_fields() {
        let mut r = row();
        r.map_name = "m".repeat(200);
        r.players[0].name = "n".repeat(100);
        let fitted = r.fit();
        assert_eq!(fitted.map_name.len(), widths::MAP_NAME);
        assert_eq!(fitted.players[0].name.len(), widths::PLAYER_NAME);
        assert_eq!(fitted.players[1].name, "Moon");
    }

    #[test]
    fn column_lookup() {
        let r = row();
        assert_eq!(r.column("build_num").unwrap(), Value::from(6059));
        assert_eq!(r.column("p1_name").unwrap(), Value::from("Moon"));
        assert_eq!(r.column("p0_apm").unwrap(), Value::from(80.0));
        assert_eq!(r.column("winner").unwrap(), Value::from(1));
    }

    #[test]
    fn every_listed_column_resolves() {
        let r = row();
        for name in COLUMNS {
            assert!(r.column(name).is_ok(), "column {name} should resolve");
        }
    }

    #[test]
    fn unknown_columns_are_rejected() {
        let r = row();
        for name in ["p2_name", "p0_height", "players", "p_name"] {
            assert_eq!(
                r.column(name).unwrap_err(),
                TypeError::UnknownColumn(name.into())
            );
        }
    }

    #[test]
    fn missing_winner_is_null() {
        let mut r = row();
        r.winner = None;
        assert_eq!(r.column("winner").unwrap(), Value::Null);
    }

    #[test]
    fn bin_counts_actions_per_bucket() {
        let p0 = [0, 10, 59_999, 60_000, 130_000];
        let p1 = [500];
        let t = ActionTimeline::bin([&p0, &p1], 3, 60_000);
        assert_eq!(t.tracks[0], vec![3, 1, 1]);
        assert_eq!(t.tracks[1], vec![1, 0, 0]);
        assert_eq!(t.total(0), 5);
    }

    #[test]
    fn bin_drops_actions_past_last_bucket() {
        let p0 = [0, 200_000];
        let t = ActionTimeline::bin([&p0, &[]], 2, 60_000);
        assert_eq!(t.tracks[0], vec![1, 0]);
        assert_eq!(t.buckets(), 2);
    }

    #[test]
    fn bin_with_zero_bucket_width_is_empty() {
        let t = ActionTimeline::bin([&[1, 2, 3], &[]], 4, 0);
        assert_eq!(t, ActionTimeline::zeroed(4));
    }
}
