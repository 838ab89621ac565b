use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use w3ml_index::{CatalogEntry, IndexError, ReplayIndex};
use w3ml_types::{ActionTimeline, PlayerRow, ReplayHash, ReplayRow, SliceSpec, Token, PLAYERS};

use crate::config::DbConfig;
use crate::error::SdkResult;
use crate::parser::{ParsedReplay, Participant, ReplayParser};

/// What happened to one replay passed to [`Database::add_replay`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AddOutcome {
    /// Stored under a new index.
    Added { index: u64, hash: ReplayHash },
    /// Already catalogued; nothing was written.
    Duplicate { index: u64 },
    /// Not a two-player game; nothing was written.
    Skipped { participants: usize },
}

/// Actions per minute over a game of `duration_ms`. Zero for an empty game.
pub fn actions_per_minute(actions: u32, duration_ms: u32) -> f32 {
    if duration_ms == 0 {
        return 0.0;
    }
    let minutes = f64::from(duration_ms) / 60_000.0;
    (f64::from(actions) / minutes) as f32
}

/// An open replay database session.
///
/// The session owns its stores exclusively. They are flushed by
/// [`close`](Self::close) or, if the session is dropped without closing,
/// by `Drop`.
pub struct Database {
    index: ReplayIndex,
    config: DbConfig,
    closed: bool,
}

impl Database {
    /// Open (or create) the database in directory `path`.
    pub fn open(path: impl AsRef<Path>, config: DbConfig) -> SdkResult<Self> {
        let path = path.as_ref();
        let index = ReplayIndex::open(path, &config.store)?;
        info!(path = %path.display(), replays = index.len(), "opened replay database");
        Ok(Self {
            index,
            config,
            closed: false,
        })
    }

    /// A database that lives only in memory.
    pub fn in_memory(config: DbConfig) -> Self {
        Self {
            index: ReplayIndex::in_memory(&config.store),
            config,
            closed: false,
        }
    }

    /// Open the database, run `f`, and close it again.
    ///
    /// The database is closed even when `f` fails; `f`'s error takes
    /// precedence over a close error.
    pub fn with<T, F>(path: impl AsRef<Path>, config: DbConfig, f: F) -> SdkResult<T>
    where
        F: FnOnce(&mut Database) -> SdkResult<T>,
    {
        let mut db = Self::open(path, config)?;
        let result = f(&mut db);
        let closed = db.close();
        let value = result?;
        closed?;
        Ok(value)
    }

    /// Flush and close the session.
    pub fn close(mut self) -> SdkResult<()> {
        self.closed = true;
        self.index.flush()?;
        debug!(location = ?self.index.location(), "closed replay database");
        Ok(())
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn index(&self) -> &ReplayIndex {
        &self.index
    }

    pub fn location(&self) -> Option<&Path> {
        self.index.location()
    }

    pub fn len(&self) -> u64 {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    // ---- Adding replays ----

    /// Parse `bytes` with `parser` and add the result.
    ///
    /// Replays already in the catalog are reported as duplicates without
    /// being parsed.
    pub fn add_with(
        &mut self,
        parser: &dyn ReplayParser,
        bytes: &[u8],
        source: &str,
    ) -> SdkResult<AddOutcome> {
        let hash = ReplayHash::of(bytes);
        if let Some(index) = self.index.index_of(&hash) {
            info!(index, hash = %hash, source, "replay already present");
            return Ok(AddOutcome::Duplicate { index });
        }
        let parsed = parser.parse(bytes)?;
        self.add_replay(bytes, source, &parsed)
    }

    /// Add one replay whose metadata has already been parsed.
    pub fn add_replay(
        &mut self,
        bytes: &[u8],
        source: &str,
        parsed: &ParsedReplay,
    ) -> SdkResult<AddOutcome> {
        let hash = ReplayHash::of(bytes);
        if let Some(index) = self.index.index_of(&hash) {
            info!(index, hash = %hash, source, "replay already present");
            return Ok(AddOutcome::Duplicate { index });
        }

        let participants: Vec<(u8, &Participant)> =
            parsed.players.iter().map(|(&slot, p)| (slot, p)).collect();
        let Ok(participants) = <[(u8, &Participant); PLAYERS]>::try_from(participants) else {
            let found = parsed.participants();
            warn!(hash = %hash, source, participants = found, "skipping replay: not a two-player game");
            return Ok(AddOutcome::Skipped {
                participants: found,
            });
        };

        let (row, timeline) = self.catalog_record(hash, source, parsed, participants);
        match self.index.add(bytes, &row, &timeline) {
            Ok(index) => {
                info!(index, hash = %hash, source, "added replay");
                Ok(AddOutcome::Added { index, hash })
            }
            Err(IndexError::Duplicate { index, .. }) => {
                info!(index, hash = %hash, source, "replay already present");
                Ok(AddOutcome::Duplicate { index })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn catalog_record(
        &self,
        hash: ReplayHash,
        source: &str,
        parsed: &ParsedReplay,
        participants: [(u8, &Participant); PLAYERS],
    ) -> (ReplayRow, ActionTimeline) {
        let duration_ms = parsed.replay_length_ms;
        let players = participants.map(|(slot, p)| PlayerRow {
            slot,
            name: p.player_name.clone(),
            race: p.race.clone(),
            color: p.color.clone(),
            actions: p.action_count,
            apm: actions_per_minute(p.action_count, duration_ms),
        });
        let [(_, first), (_, second)] = participants;
        let shape = &self.config.store.timeline;
        let timeline = ActionTimeline::bin(
            [first.action_timeline.as_slice(), second.action_timeline.as_slice()],
            shape.buckets,
            shape.bucket_ms,
        );

        let row = ReplayRow {
            hash,
            map_name: parsed.map_name.clone(),
            source: source.to_string(),
            build_num: parsed.build_num,
            game_speed: parsed.game_speed.clone(),
            duration_ms,
            winner: parsed.winner,
            players,
        };
        (row, timeline)
    }

    // ---- Reading replays ----

    /// Map a hash, hash prefix or index token to a catalog index.
    pub fn resolve(&self, token: impl Into<Token>) -> SdkResult<u64> {
        Ok(self.index.resolve(token)?)
    }

    /// Raw bytes of the replay at `index`.
    pub fn get(&self, index: u64) -> SdkResult<Vec<u8>> {
        Ok(self.index.get(index)?)
    }

    pub fn row(&self, index: u64) -> SdkResult<ReplayRow> {
        Ok(self.index.row(index)?)
    }

    pub fn entry(&self, index: u64) -> SdkResult<CatalogEntry> {
        Ok(self.index.entry(index)?)
    }

    pub fn timeline(&self, index: u64) -> SdkResult<ActionTimeline> {
        Ok(self.index.timeline(index)?)
    }

    /// Catalog entries selected by `slice`; `None` lists everything.
    pub fn list(&self, slice: Option<&SliceSpec>) -> SdkResult<Vec<CatalogEntry>> {
        Ok(self.index.list(slice)?)
    }

    /// Structured events of the replay at `index`.
    pub fn events_with(&self, parser: &dyn ReplayParser, index: u64) -> SdkResult<Vec<Value>> {
        let bytes = self.get(index)?;
        parser.events(&bytes)
    }

    pub fn flush(&mut self) -> SdkResult<()> {
        Ok(self.index.flush()?)
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.index.flush() {
            warn!(error = %e, location = ?self.index.location(), "failed to flush replay database");
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("index", &self.index)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::BTreeMap;

    use crate::error::SdkError;
    use w3ml_store::TimelineConfig;

    fn participant(name: &str, actions: u32, timeline: Vec<u32>) -> Participant {
        Participant {
            player_name: name.into(),
            race: "human".into(),
            color: "red".into(),
            action_count: actions,
            action_timeline: timeline,
        }
    }

    fn parsed(players: usize) -> ParsedReplay {
        let names = ["Sky", "Moon", "Grubby", "Fly"];
        let players: BTreeMap<u8, Participant> = names
            .iter()
            .take(players)
            .enumerate()
            .map(|(i, n)| (i as u8 * 2, participant(n, 300, vec![0, 30_000, 90_000])))
            .collect();
        ParsedReplay {
            map_name: "(2)TerenasStand.w3x".into(),
            build_num: 6105,
            replay_length_ms: 180_000,
            game_speed: "fast".into(),
            players,
            winner: Some(2),
        }
    }

    fn config() -> DbConfig {
        let mut config = DbConfig::default();
        config.store.timeline = TimelineConfig {
            buckets: 4,
            bucket_ms: 60_000,
        };
        config
    }

    /// Parser returning a fixed result and counting its calls.
    struct StubParser {
        result: ParsedReplay,
        calls: Cell<usize>,
    }

    impl StubParser {
        fn new(result: ParsedReplay) -> Self {
            Self {
                result,
                calls: Cell::new(0),
            }
        }
    }

    impl ReplayParser for StubParser {
        fn parse(&self, _bytes: &[u8]) -> SdkResult<ParsedReplay> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.result.clone())
        }

        fn events(&self, bytes: &[u8]) -> SdkResult<Vec<Value>> {
            Ok(vec![Value::from(bytes.len())])
        }
    }

    struct BrokenParser;

    impl ReplayParser for BrokenParser {
        fn parse(&self, _bytes: &[u8]) -> SdkResult<ParsedReplay> {
            Err(SdkError::Parse("unexpected end of replay header".into()))
        }

        fn events(&self, _bytes: &[u8]) -> SdkResult<Vec<Value>> {
            Err(SdkError::Parse("unexpected end of replay header".into()))
        }
    }

    #[test]
    fn apm_over_duration() {
        assert_eq!(actions_per_minute(300, 180_000), 100.0);
        assert_eq!(actions_per_minute(150, 30_000), 300.0);
        assert_eq!(actions_per_minute(500, 0), 0.0);
    }

    #[test]
    fn add_then_duplicate_then_second() {
        let mut db = Database::in_memory(config());
        let meta = parsed(2);

        let first = db.add_replay(b"replay one", "one.w3g", &meta).unwrap();
        let h1 = ReplayHash::of(b"replay one");
        assert_eq!(
            first,
            AddOutcome::Added {
                index: 0,
                hash: h1
            }
        );
        assert_eq!(
            db.add_replay(b"replay one", "again.w3g", &meta).unwrap(),
            AddOutcome::Duplicate { index: 0 }
        );
        assert_eq!(db.len(), 1);

        assert!(matches!(
            db.add_replay(b"replay two", "two.w3g", &meta).unwrap(),
            AddOutcome::Added { index: 1, .. }
        ));
        assert_eq!(db.len(), 2);
        assert_eq!(db.resolve(&h1.to_hex()[..8]).unwrap(), 0);
        assert_eq!(db.get(db.resolve("1").unwrap()).unwrap(), b"replay two");
        // The first source is kept for a duplicate.
        assert_eq!(db.row(0).unwrap().source, "one.w3g");
    }

    #[test]
    fn row_is_built_from_parse_result() {
        let mut db = Database::in_memory(config());
        db.add_replay(b"bytes", "https://example.org/r.w3g", &parsed(2))
            .unwrap();

        let row = db.row(0).unwrap();
        assert_eq!(row.map_name, "(2)TerenasStand.w3x");
        assert_eq!(row.build_num, 6105);
        assert_eq!(row.duration_ms, 180_000);
        assert_eq!(row.winner, Some(2));
        assert_eq!(row.players[0].slot, 0);
        assert_eq!(row.players[0].name, "Sky");
        assert_eq!(row.players[1].slot, 2);
        assert_eq!(row.players[1].name, "Moon");
        assert_eq!(row.players[1].apm, 100.0);

        let timeline = db.timeline(0).unwrap();
        assert_eq!(timeline.tracks[0], vec![2, 1, 0, 0]);
        assert_eq!(timeline.tracks[1], vec![2, 1, 0, 0]);
    }

    #[test]
    fn non_two_player_games_are_skipped() {
        let mut db = Database::in_memory(config());
        for players in [0, 1, 3, 4] {
            let outcome = db.add_replay(b"ffa", "ffa.w3g", &parsed(players)).unwrap();
            assert_eq!(outcome, AddOutcome::Skipped { participants: players });
        }
        assert!(db.is_empty());
        assert!(db.list(None).unwrap().is_empty());
    }

    #[test]
    fn add_with_parses_only_new_replays() {
        let mut db = Database::in_memory(config());
        let parser = StubParser::new(parsed(2));

        assert!(matches!(
            db.add_with(&parser, b"w3g", "a.w3g").unwrap(),
            AddOutcome::Added { index: 0, .. }
        ));
        assert_eq!(
            db.add_with(&parser, b"w3g", "a.w3g").unwrap(),
            AddOutcome::Duplicate { index: 0 }
        );
        assert_eq!(parser.calls.get(), 1);
        assert_eq!(db.events_with(&parser, 0).unwrap(), vec![Value::from(3)]);
    }

    #[test]
    fn parse_failure_writes_nothing() {
        let mut db = Database::in_memory(config());
        let err = db.add_with(&BrokenParser, b"w3g", "bad.w3g").unwrap_err();
        assert!(matches!(err, SdkError::Parse(_)));
        assert!(db.is_empty());
    }

    #[test]
    fn resolve_errors_surface() {
        let db = Database::in_memory(config());
        assert!(matches!(
            db.resolve("abcdef"),
            Err(SdkError::Index(IndexError::NotFound(_)))
        ));
        assert!(matches!(
            db.get(0),
            Err(SdkError::Index(IndexError::OutOfRange { index: 0, len: 0 }))
        ));
    }

    #[test]
    fn with_closes_and_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replays.db");

        let outcome = Database::with(&path, config(), |db| {
            db.add_replay(b"persisted", "p.w3g", &parsed(2))
        })
        .unwrap();
        assert!(matches!(outcome, AddOutcome::Added { index: 0, .. }));

        let count = Database::with(&path, config(), |db| {
            assert_eq!(db.get(0)?, b"persisted");
            assert_eq!(db.location(), Some(path.as_path()));
            Ok(db.len())
        })
        .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn with_returns_closure_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Database::with(dir.path(), config(), |db| db.resolve("zz")).unwrap_err();
        assert!(matches!(err, SdkError::Index(IndexError::NotFound(_))));
    }

    #[test]
    fn dropped_session_is_readable_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut db = Database::open(dir.path(), config()).unwrap();
            db.add_replay(b"dropped", "d.w3g", &parsed(2)).unwrap();
        }
        let db = Database::open(dir.path(), config()).unwrap();
        assert_eq!(db.len(), 1);
        assert_eq!(db.entry(0).unwrap().row.source, "d.w3g");
    }

    #[test]
    fn outcome_json() {
        let json = serde_json::to_value(AddOutcome::Skipped { participants: 3 }).unwrap();
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["participants"], 3);
    }
}
