//! Fixed-width record encodings.
//!
//! Every record of a [`FileTable`](crate::FileTable) occupies exactly
//! [`RecordCodec::width`] bytes. Integers are little-endian; strings are
//! UTF-8, truncated at a character boundary and zero-padded to their field
//! width.

use w3ml_types::record::truncate_utf8;
use w3ml_types::{widths, ActionTimeline, PlayerRow, ReplayHash, ReplayRow, PLAYERS};

/// Encodes one record type to and from a fixed-width byte layout.
pub trait RecordCodec {
    type Record;

    /// Magic bytes identifying tables of this record type.
    fn magic(&self) -> [u8; 4];

    /// Encoded size of one record in bytes.
    fn width(&self) -> usize;

    /// Encode `record` into `buf`, which is exactly `width()` bytes.
    fn encode(&self, record: &Self::Record, buf: &mut [u8]);

    /// Decode a record from exactly `width()` bytes.
    fn decode(&self, buf: &[u8]) -> Result<Self::Record, String>;
}

struct FieldWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> FieldWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        buf.fill(0);
        Self { buf, pos: 0 }
    }

    fn bytes(&mut self, data: &[u8]) {
        self.buf[self.pos..self.pos + data.len()].copy_from_slice(data);
        self.pos += data.len();
    }

    fn u8(&mut self, v: u8) {
        self.bytes(&[v]);
    }

    fn u32(&mut self, v: u32) {
        self.bytes(&v.to_le_bytes());
    }

    fn str(&mut self, s: &str, width: usize) {
        let s = truncate_utf8(s, width);
        self.buf[self.pos..self.pos + s.len()].copy_from_slice(s.as_bytes());
        self.pos += width;
    }
}

struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> &'a [u8] {
        let field = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        field
    }

    fn u8(&mut self) -> u8 {
        self.take(1)[0]
    }

    fn u32(&mut self) -> u32 {
        let mut le = [0u8; 4];
        le.copy_from_slice(self.take(4));
        u32::from_le_bytes(le)
    }

    fn str(&mut self, width: usize, field: &str) -> Result<String, String> {
        let raw = self.take(width);
        let end = raw.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
        String::from_utf8(raw[..end].to_vec()).map_err(|e| format!("{field}: {e}"))
    }
}

const PLAYER_WIDTH: usize = 1 + widths::PLAYER_NAME + widths::RACE + widths::COLOR + 4 + 4;

/// Layout of a catalog row (360 bytes):
///
/// ```text
/// hash        20
/// map_name    64
/// source     128
/// build_num    4
/// game_speed   8
/// duration_ms  4
/// winner       2   [present: u8][slot: u8]
/// players  2 x 65  [slot: u8][name: 32][race: 12][color: 12][actions: u32][apm: f32]
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct RowCodec;

impl RowCodec {
    pub const WIDTH: usize = 20
        + widths::MAP_NAME
        + widths::SOURCE
        + 4
        + widths::GAME_SPEED
        + 4
        + 2
        + PLAYERS * PLAYER_WIDTH;
}

impl RecordCodec for RowCodec {
    type Record = ReplayRow;

    fn magic(&self) -> [u8; 4] {
        *b"W3MC"
    }

    fn width(&self) -> usize {
        Self::WIDTH
    }

    fn encode(&self, row: &ReplayRow, buf: &mut [u8]) {
        let mut w = FieldWriter::new(buf);
        w.bytes(row.hash.as_bytes());
        w.str(&row.map_name, widths::MAP_NAME);
        w.str(&row.source, widths::SOURCE);
        w.u32(row.build_num);
        w.str(&row.game_speed, widths::GAME_SPEED);
        w.u32(row.duration_ms);
        match row.winner {
            Some(slot) => {
                w.u8(1);
                w.u8(slot);
            }
            None => {
                w.u8(0);
                w.u8(0);
            }
        }
        for p in &row.players {
            w.u8(p.slot);
            w.str(&p.name, widths::PLAYER_NAME);
            w.str(&p.race, widths::RACE);
            w.str(&p.color, widths::COLOR);
            w.u32(p.actions);
            w.u32(p.apm.to_bits());
        }
    }

    fn decode(&self, buf: &[u8]) -> Result<ReplayRow, String> {
        let mut r = FieldReader::new(buf);
        let mut digest = [0u8; 20];
        digest.copy_from_slice(r.take(20));
        let hash = ReplayHash::from_digest(digest);
        let map_name = r.str(widths::MAP_NAME, "map_name")?;
        let source = r.str(widths::SOURCE, "source")?;
        let build_num = r.u32();
        let game_speed = r.str(widths::GAME_SPEED, "game_speed")?;
        let duration_ms = r.u32();
        let winner = match (r.u8(), r.u8()) {
            (0, _) => None,
            (1, slot) => Some(slot),
            (flag, _) => return Err(format!("winner: invalid presence flag {flag}")),
        };
        let mut read_player = || -> Result<PlayerRow, String> {
            Ok(PlayerRow {
                slot: r.u8(),
                name: r.str(widths::PLAYER_NAME, "name")?,
                race: r.str(widths::RACE, "race")?,
                color: r.str(widths::COLOR, "color")?,
                actions: r.u32(),
                apm: f32::from_bits(r.u32()),
            })
        };
        let players = [read_player()?, read_player()?];
        Ok(ReplayRow {
            hash,
            map_name,
            source,
            build_num,
            game_speed,
            duration_ms,
            winner,
            players,
        })
    }
}

/// Layout of an action timeline: `PLAYERS` tracks of `buckets` little-endian
/// `u32` counts, track 0 first.
#[derive(Clone, Copy, Debug)]
pub struct TimelineCodec {
    buckets: usize,
}

impl TimelineCodec {
    pub fn new(buckets: usize) -> Self {
        Self { buckets }
    }

    pub fn buckets(&self) -> usize {
        self.buckets
    }
}

impl RecordCodec for TimelineCodec {
    type Record = ActionTimeline;

    fn magic(&self) -> [u8; 4] {
        *b"W3MT"
    }

    fn width(&self) -> usize {
        PLAYERS * self.buckets * 4
    }

    fn encode(&self, timeline: &ActionTimeline, buf: &mut [u8]) {
        let mut w = FieldWriter::new(buf);
        for track in &timeline.tracks {
            // Tracks are padded or cut to the configured bucket count.
            for i in 0..self.buckets {
                w.u32(track.get(i).copied().unwrap_or(0));
            }
        }
    }

    fn decode(&self, buf: &[u8]) -> Result<ActionTimeline, String> {
        let mut r = FieldReader::new(buf);
        let mut read_track = || (0..self.buckets).map(|_| r.u32()).collect::<Vec<u32>>();
        let first = read_track();
        let second = read_track();
        Ok(ActionTimeline {
            tracks: [first, second],
        })
    }
}
