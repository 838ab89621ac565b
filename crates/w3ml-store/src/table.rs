use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::blob::discard_torn;
use crate::codec::RecordCodec;
use crate::config::SyncMode;
use crate::error::{StoreError, StoreResult};
use crate::traits::RecordTable;

const VERSION: u32 = 1;
/// Header: 4 bytes magic + 4 bytes version + 4 bytes record width.
const HEADER_SIZE: u64 = 12;
const CRC_SIZE: usize = 4;

/// Table of fixed-width records with random access by index.
///
/// On-disk format:
/// ```text
/// [4 bytes: codec magic] [4 bytes: version (LE u32)] [4 bytes: record width (LE u32)]
/// repeated:
///   [width bytes: encoded record] [4 bytes: CRC32 of record (LE u32)]
/// ```
///
/// Record `i` starts at `12 + i * (width + 4)`, so no scan is needed to find
/// it. A trailing partial record is corruption.
pub struct FileTable<C: RecordCodec> {
    path: PathBuf,
    file: File,
    codec: C,
    len: u64,
    sync_mode: SyncMode,
}

impl<C: RecordCodec> FileTable<C> {
    /// Open (or create) a table at the given path.
    pub fn open(path: &Path, codec: C, sync_mode: SyncMode) -> StoreResult<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        let width = codec.width() as u32;
        let file_len = file.metadata()?.len();
        if file_len == 0 {
            let mut header = Vec::with_capacity(HEADER_SIZE as usize);
            header.extend_from_slice(&codec.magic());
            header.extend_from_slice(&VERSION.to_le_bytes());
            header.extend_from_slice(&width.to_le_bytes());
            file.write_all(&header)?;
            file.sync_all()?;
            debug!(path = %path.display(), width, "created record table");
        } else {
            check_header(path, &mut file, &codec, file_len)?;
        }

        let body = file_len.saturating_sub(HEADER_SIZE);
        let stride = width as u64 + CRC_SIZE as u64;
        if body % stride != 0 {
            return Err(StoreError::Corrupt {
                path: path.to_path_buf(),
                offset: HEADER_SIZE + body / stride * stride,
                reason: format!("trailing partial record ({} bytes)", body % stride),
            });
        }

        let table = Self {
            path: path.to_path_buf(),
            file,
            codec,
            len: body / stride,
            sync_mode,
        };
        debug!(path = %table.path.display(), records = table.len, "opened record table");
        Ok(table)
    }

    /// Path to the table file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn stride(&self) -> u64 {
        self.codec.width() as u64 + CRC_SIZE as u64
    }

    fn offset_of(&self, index: u64) -> u64 {
        HEADER_SIZE + index * self.stride()
    }

    fn decode_checked(&self, index: u64, slot: &[u8]) -> StoreResult<C::Record> {
        let (data, crc) = slot.split_at(self.codec.width());
        let expected = u32::from_le_bytes([crc[0], crc[1], crc[2], crc[3]]);
        let actual = crc32fast::hash(data);
        if actual != expected {
            return Err(StoreError::CrcMismatch {
                path: self.path.clone(),
                index,
                expected,
                actual,
            });
        }
        self.codec.decode(data).map_err(|reason| StoreError::Corrupt {
            path: self.path.clone(),
            offset: self.offset_of(index),
            reason,
        })
    }
}

fn check_header<C: RecordCodec>(
    path: &Path,
    file: &mut File,
    codec: &C,
    file_len: u64,
) -> StoreResult<()> {
    if file_len < HEADER_SIZE {
        return Err(StoreError::Corrupt {
            path: path.to_path_buf(),
            offset: 0,
            reason: "table header truncated".into(),
        });
    }
    let mut header = [0u8; HEADER_SIZE as usize];
    file.seek(SeekFrom::Start(0))?;
    file.read_exact(&mut header)?;

    let magic = codec.magic();
    if header[..4] != magic {
        return Err(StoreError::InvalidMagic {
            path: path.to_path_buf(),
            expected: String::from_utf8_lossy(&magic).into(),
            actual: String::from_utf8_lossy(&header[..4]).into(),
        });
    }
    let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if version != VERSION {
        return Err(StoreError::UnsupportedVersion {
            path: path.to_path_buf(),
            version,
        });
    }
    let width = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);
    if width as usize != codec.width() {
        return Err(StoreError::WidthMismatch {
            path: path.to_path_buf(),
            expected: codec.width() as u32,
            actual: width,
        });
    }
    Ok(())
}

impl<C: RecordCodec> RecordTable<C::Record> for FileTable<C> {
    fn append(&mut self, record: &C::Record) -> StoreResult<u64> {
        let index = self.len;
        let width = self.codec.width();
        let mut slot = vec![0u8; width + CRC_SIZE];
        self.codec.encode(record, &mut slot[..width]);
        let crc = crc32fast::hash(&slot[..width]);
        slot[width..].copy_from_slice(&crc.to_le_bytes());

        let offset = self.offset_of(index);
        let written = self
            .file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.write_all(&slot));
        if let Err(e) = written {
            // Keep the file a whole number of records.
            return Err(discard_torn(&self.file, offset, &self.path, e.into()));
        }
        if matches!(self.sync_mode, SyncMode::EveryWrite) {
            self.file.sync_data()?;
        }
        self.len += 1;

        debug!(path = %self.path.display(), index, "record append");
        Ok(index)
    }

    fn get(&self, index: u64) -> StoreResult<C::Record> {
        if index >= self.len {
            return Err(StoreError::OutOfRange {
                index,
                len: self.len,
            });
        }
        let mut slot = vec![0u8; self.stride() as usize];
        let mut reader = &self.file;
        reader.seek(SeekFrom::Start(self.offset_of(index)))?;
        reader.read_exact(&mut slot)?;
        self.decode_checked(index, &slot)
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn scan(&self) -> StoreResult<Vec<C::Record>> {
        let mut reader = BufReader::new(&self.file);
        reader.seek(SeekFrom::Start(HEADER_SIZE))?;
        let mut slot = vec![0u8; self.stride() as usize];
        let mut records = Vec::with_capacity(self.len as usize);
        for index in 0..self.len {
            reader.read_exact(&mut slot)?;
            records.push(self.decode_checked(index, &slot)?);
        }
        Ok(records)
    }

    fn flush(&mut self) -> StoreResult<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}

impl<C: RecordCodec> std::fmt::Debug for FileTable<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileTable")
            .field("path", &self.path)
            .field("width", &self.codec.width())
            .field("records", &self.len)
            .finish()
    }
}
