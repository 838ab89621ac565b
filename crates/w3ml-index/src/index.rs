use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use w3ml_store::{
    AppendStage, BlobStore, FileBlobStore, FileTable, InMemoryBlobStore, InMemoryTable,
    RecordTable, RowCodec, StoreConfig, StoreError, TimelineCodec,
};
use w3ml_types::{ActionTimeline, ReplayHash, ReplayRow, SliceSpec, Token};

use crate::entry::CatalogEntry;
use crate::error::{IndexError, IndexResult};
use crate::prefix::SortedHashes;

/// Blob log file name inside a database directory.
pub const BLOBS_FILE: &str = "blobs.log";
/// Catalog table file name inside a database directory.
pub const CATALOG_FILE: &str = "catalog.tbl";
/// Timeline table file name inside a database directory.
pub const TIMELINE_FILE: &str = "timeline.tbl";

/// Content-addressed catalog over three co-indexed stores.
///
/// Record `i` of the blob log, the catalog table and the timeline table all
/// describe the same replay. The hash map and the sorted hash set are rebuilt
/// from the catalog on open and updated only after all three appends of an
/// [`add`](Self::add) succeed.
pub struct ReplayIndex {
    blobs: Box<dyn BlobStore>,
    catalog: Box<dyn RecordTable<ReplayRow>>,
    timelines: Box<dyn RecordTable<ActionTimeline>>,
    by_hash: HashMap<ReplayHash, u64>,
    sorted: SortedHashes,
    buckets: usize,
    location: Option<PathBuf>,
}

impl ReplayIndex {
    /// Open (or create) the index stored in directory `dir`.
    pub fn open(dir: &Path, config: &StoreConfig) -> IndexResult<Self> {
        std::fs::create_dir_all(dir)?;
        let sync = config.sync_mode;
        let buckets = config.timeline.buckets;

        let blobs = FileBlobStore::open(&dir.join(BLOBS_FILE), sync)?;
        let catalog = FileTable::open(&dir.join(CATALOG_FILE), RowCodec, sync)?;
        let timelines = FileTable::open(
            &dir.join(TIMELINE_FILE),
            TimelineCodec::new(buckets),
            sync,
        )?;

        let mut index = Self::from_parts(
            Box::new(blobs),
            Box::new(catalog),
            Box::new(timelines),
            buckets,
        )?;
        index.location = Some(dir.to_path_buf());
        debug!(path = %dir.display(), replays = index.len(), "opened replay index");
        Ok(index)
    }

    /// An index over in-memory stores. Nothing is persisted.
    pub fn in_memory(config: &StoreConfig) -> Self {
        Self {
            blobs: Box::new(InMemoryBlobStore::new()),
            catalog: Box::new(InMemoryTable::new()),
            timelines: Box::new(InMemoryTable::new()),
            by_hash: HashMap::new(),
            sorted: SortedHashes::new(),
            buckets: config.timeline.buckets,
            location: None,
        }
    }

    /// Assemble an index from existing stores, rebuilding the lookup
    /// structures with one scan of the catalog.
    pub fn from_parts(
        blobs: Box<dyn BlobStore>,
        catalog: Box<dyn RecordTable<ReplayRow>>,
        timelines: Box<dyn RecordTable<ActionTimeline>>,
        buckets: usize,
    ) -> IndexResult<Self> {
        check_lengths(blobs.as_ref(), catalog.as_ref(), timelines.as_ref())?;

        let rows = catalog.scan()?;
        let mut by_hash = HashMap::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let index = i as u64;
            if let Some(first) = by_hash.insert(row.hash, index) {
                return Err(StoreError::DuplicateRecord {
                    hash: row.hash.to_hex(),
                    first,
                    second: index,
                }
                .into());
            }
        }
        let sorted = SortedHashes::from_unsorted(by_hash.keys().copied().collect());
        debug!(replays = rows.len(), "rebuilt hash index");

        Ok(Self {
            blobs,
            catalog,
            timelines,
            by_hash,
            sorted,
            buckets,
            location: None,
        })
    }

    /// Directory backing this index, if it is file-backed.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Bucket count of every stored timeline.
    pub fn timeline_buckets(&self) -> usize {
        self.buckets
    }

    /// Number of catalogued replays.
    pub fn len(&self) -> u64 {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, hash: &ReplayHash) -> bool {
        self.by_hash.contains_key(hash)
    }

    /// Index of a replay by its full hash.
    pub fn index_of(&self, hash: &ReplayHash) -> Option<u64> {
        self.by_hash.get(hash).copied()
    }

    /// Catalogued hashes in lexicographic order.
    pub fn hashes(&self) -> &[ReplayHash] {
        self.sorted.as_slice()
    }

    /// Map a user token to a catalog index.
    ///
    /// Tried in order: a known full hash, a literal index (all ASCII
    /// digits), then a hash prefix. Text is trimmed and matched
    /// case-insensitively. Literal indices are not bounds-checked here; an
    /// index past the end fails on the subsequent read.
    pub fn resolve(&self, token: impl Into<Token>) -> IndexResult<u64> {
        let text = match token.into() {
            Token::Index(index) => return Ok(index),
            Token::Text(text) => text,
        };
        let needle = text.trim().to_ascii_lowercase();
        if needle.is_empty() {
            return Err(IndexError::NotFound(text));
        }

        if let Some(index) = ReplayHash::from_hex(&needle)
            .ok()
            .and_then(|hash| self.index_of(&hash))
        {
            return Ok(index);
        }
        if let Some(index) = Token::from(needle.as_str()).as_index() {
            return Ok(index);
        }
        self.sorted
            .descend(&needle)
            .and_then(|hash| self.index_of(&hash))
            .ok_or(IndexError::NotFound(text))
    }

    /// Append one replay: raw bytes, its catalog row and its timeline.
    ///
    /// `row.hash` must be the content hash of `bytes`. String fields are
    /// truncated to their fixed widths and the timeline is padded or cut to
    /// the configured bucket count before writing.
    ///
    /// A failure after the blob append leaves the stores at unequal lengths
    /// and is reported as [`StoreError::PartialAppend`]. Nothing is rolled
    /// back; further adds in this session fail with
    /// [`StoreError::LengthMismatch`], as does reopening the directory.
    pub fn add(
        &mut self,
        bytes: &[u8],
        row: &ReplayRow,
        timeline: &ActionTimeline,
    ) -> IndexResult<u64> {
        let content = ReplayHash::of(bytes);
        if row.hash != content {
            return Err(IndexError::HashMismatch {
                row: row.hash,
                content,
            });
        }
        if let Some(index) = self.index_of(&content) {
            return Err(IndexError::Duplicate {
                hash: content,
                index,
            });
        }
        check_lengths(
            self.blobs.as_ref(),
            self.catalog.as_ref(),
            self.timelines.as_ref(),
        )?;

        let index = self.blobs.append(bytes)?;
        let row = row.clone().fit();
        if let Err(source) = self.catalog.append(&row) {
            return Err(partial(index, AppendStage::Catalog, source));
        }
        let timeline = self.fit_timeline(timeline);
        if let Err(source) = self.timelines.append(&timeline) {
            return Err(partial(index, AppendStage::Timeline, source));
        }

        self.by_hash.insert(content, index);
        self.sorted.insert(content);
        debug!(index, hash = %content, "catalogued replay");
        Ok(index)
    }

    /// Catalog entries selected by `slice`, in storage order. `None` lists
    /// the whole catalog.
    pub fn list(&self, slice: Option<&SliceSpec>) -> IndexResult<Vec<CatalogEntry>> {
        let range = slice.copied().unwrap_or_default().resolve(self.len());
        range
            .indices()
            .map(|index| {
                Ok(CatalogEntry {
                    index,
                    row: self.catalog.get(index)?,
                })
            })
            .collect()
    }

    /// Raw bytes of the replay at `index`.
    pub fn get(&self, index: u64) -> IndexResult<Vec<u8>> {
        Ok(self.blobs.get(index)?)
    }

    pub fn row(&self, index: u64) -> IndexResult<ReplayRow> {
        Ok(self.catalog.get(index)?)
    }

    pub fn entry(&self, index: u64) -> IndexResult<CatalogEntry> {
        Ok(CatalogEntry {
            index,
            row: self.row(index)?,
        })
    }

    pub fn timeline(&self, index: u64) -> IndexResult<ActionTimeline> {
        Ok(self.timelines.get(index)?)
    }

    /// Flush all three stores.
    pub fn flush(&mut self) -> IndexResult<()> {
        self.blobs.flush()?;
        self.catalog.flush()?;
        self.timelines.flush()?;
        Ok(())
    }

    fn fit_timeline(&self, timeline: &ActionTimeline) -> ActionTimeline {
        let mut fitted = timeline.clone();
        for track in &mut fitted.tracks {
            track.resize(self.buckets, 0);
        }
        fitted
    }
}

fn check_lengths(
    blobs: &dyn BlobStore,
    catalog: &dyn RecordTable<ReplayRow>,
    timelines: &dyn RecordTable<ActionTimeline>,
) -> IndexResult<()> {
    let (b, r, t) = (blobs.len(), catalog.len(), timelines.len());
    if b != r || r != t {
        return Err(StoreError::LengthMismatch {
            blobs: b,
            rows: r,
            timelines: t,
        }
        .into());
    }
    Ok(())
}

fn partial(index: u64, stage: AppendStage, source: StoreError) -> IndexError {
    IndexError::Storage(StoreError::PartialAppend {
        index,
        stage,
        source: Box::new(source),
    })
}

impl fmt::Debug for ReplayIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayIndex")
            .field("location", &self.location)
            .field("replays", &self.len())
            .field("buckets", &self.buckets)
            .finish()
    }
}
