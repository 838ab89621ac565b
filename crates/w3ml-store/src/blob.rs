use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::SyncMode;
use crate::error::{StoreError, StoreResult};
use crate::traits::BlobStore;

const MAGIC: [u8; 4] = *b"W3MB";
const VERSION: u32 = 1;
const FILE_HEADER_SIZE: u64 = 8;
/// Frame header size: 4 bytes length + 4 bytes CRC.
const FRAME_HEADER_SIZE: u64 = 8;

/// Location of one stored payload inside the log file.
#[derive(Clone, Copy, Debug)]
struct Frame {
    /// Offset of the payload (just past the frame header).
    offset: u64,
    len: u32,
    crc: u32,
}

/// Append-only log of variable-length payloads.
///
/// On-disk format:
/// ```text
/// [4 bytes: magic "W3MB"] [4 bytes: version (little-endian u32)]
/// repeated:
///   [4 bytes: payload length (little-endian u32)]
///   [4 bytes: CRC32 of payload (little-endian u32)]
///   [N bytes: payload]
/// ```
///
/// Opening scans frame headers once to rebuild the offset table; payload
/// CRCs are checked on every read.
pub struct FileBlobStore {
    path: PathBuf,
    file: File,
    frames: Vec<Frame>,
    /// End of the last complete frame.
    end: u64,
    sync_mode: SyncMode,
}

impl FileBlobStore {
    /// Open (or create) a blob log at the given path.
    pub fn open(path: &Path, sync_mode: SyncMode) -> StoreResult<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        let file_len = file.metadata()?.len();
        if file_len == 0 {
            let mut header = [0u8; FILE_HEADER_SIZE as usize];
            header[..4].copy_from_slice(&MAGIC);
            header[4..].copy_from_slice(&VERSION.to_le_bytes());
            file.write_all(&header)?;
            file.sync_all()?;
            debug!(path = %path.display(), "created blob log");
        }

        let mut store = Self {
            path: path.to_path_buf(),
            file,
            frames: Vec::new(),
            end: FILE_HEADER_SIZE,
            sync_mode,
        };
        if file_len > 0 {
            store.load(file_len)?;
        }
        Ok(store)
    }

    /// Path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn corrupt(&self, offset: u64, reason: impl Into<String>) -> StoreError {
        StoreError::Corrupt {
            path: self.path.clone(),
            offset,
            reason: reason.into(),
        }
    }

    fn load(&mut self, file_len: u64) -> StoreResult<()> {
        if file_len < FILE_HEADER_SIZE {
            return Err(self.corrupt(0, "file header truncated"));
        }
        let mut header = [0u8; FILE_HEADER_SIZE as usize];
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_exact(&mut header)?;
        if header[..4] != MAGIC {
            return Err(StoreError::InvalidMagic {
                path: self.path.clone(),
                expected: String::from_utf8_lossy(&MAGIC).into(),
                actual: String::from_utf8_lossy(&header[..4]).into(),
            });
        }
        let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if version != VERSION {
            return Err(StoreError::UnsupportedVersion {
                path: self.path.clone(),
                version,
            });
        }

        let mut offset = FILE_HEADER_SIZE;
        while offset < file_len {
            if offset + FRAME_HEADER_SIZE > file_len {
                return Err(self.corrupt(offset, "truncated frame header"));
            }
            let mut frame_header = [0u8; FRAME_HEADER_SIZE as usize];
            self.file.seek(SeekFrom::Start(offset))?;
            self.file.read_exact(&mut frame_header)?;
            let len = u32::from_le_bytes([
                frame_header[0],
                frame_header[1],
                frame_header[2],
                frame_header[3],
            ]);
            let crc = u32::from_le_bytes([
                frame_header[4],
                frame_header[5],
                frame_header[6],
                frame_header[7],
            ]);
            let payload_at = offset + FRAME_HEADER_SIZE;
            if payload_at + u64::from(len) > file_len {
                return Err(self.corrupt(
                    offset,
                    format!("frame of {len} bytes extends past end of file ({file_len})"),
                ));
            }
            self.frames.push(Frame {
                offset: payload_at,
                len,
                crc,
            });
            offset = payload_at + u64::from(len);
        }
        self.end = offset;

        debug!(path = %self.path.display(), blobs = self.frames.len(), "loaded blob log");
        Ok(())
    }

    fn write_frame(&mut self, data: &[u8]) -> StoreResult<Frame> {
        let len = frame_len(data.len())?;
        let crc = crc32fast::hash(data);

        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE as usize + data.len());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(data);

        self.file.seek(SeekFrom::Start(self.end))?;
        self.file.write_all(&frame)?;
        if matches!(self.sync_mode, SyncMode::EveryWrite) {
            self.file.sync_data()?;
        }

        Ok(Frame {
            offset: self.end + FRAME_HEADER_SIZE,
            len,
            crc,
        })
    }
}

/// Truncate `file` back to `len` after a failed append and return the
/// append's error. A failed truncation is logged, never reported in its place.
pub(crate) fn discard_torn(file: &File, len: u64, path: &Path, err: StoreError) -> StoreError {
    if let Err(trunc) = file.set_len(len) {
        warn!(path = %path.display(), error = %trunc, "failed to truncate torn write");
    }
    err
}

/// Frame length field for a payload of `len` bytes.
fn frame_len(len: usize) -> StoreResult<u32> {
    u32::try_from(len).map_err(|_| StoreError::PayloadTooLarge { len: len as u64 })
}

impl BlobStore for FileBlobStore {
    fn append(&mut self, data: &[u8]) -> StoreResult<u64> {
        let index = self.frames.len() as u64;
        let frame = match self.write_frame(data) {
            Ok(frame) => frame,
            // Cut off whatever part of the frame made it to disk.
            Err(e) => return Err(discard_torn(&self.file, self.end, &self.path, e)),
        };
        self.end = frame.offset + u64::from(frame.len);
        self.frames.push(frame);

        debug!(index, len = data.len(), "blob append");
        Ok(index)
    }

    fn get(&self, index: u64) -> StoreResult<Vec<u8>> {
        let frame = usize::try_from(index)
            .ok()
            .and_then(|i| self.frames.get(i))
            .ok_or(StoreError::OutOfRange {
                index,
                len: self.len(),
            })?;

        let mut payload = vec![0u8; frame.len as usize];
        let mut reader = &self.file;
        reader.seek(SeekFrom::Start(frame.offset))?;
        reader.read_exact(&mut payload)?;

        let actual = crc32fast::hash(&payload);
        if actual != frame.crc {
            return Err(StoreError::CrcMismatch {
                path: self.path.clone(),
                index,
                expected: frame.crc,
                actual,
            });
        }
        Ok(payload)
    }

    fn len(&self) -> u64 {
        self.frames.len() as u64
    }

    fn flush(&mut self) -> StoreResult<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}

impl std::fmt::Debug for FileBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBlobStore")
            .field("path", &self.path)
            .field("blobs", &self.frames.len())
            .field("end", &self.end)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(dir: &tempfile::TempDir) -> FileBlobStore {
        FileBlobStore::open(&dir.path().join("blobs.log"), SyncMode::default()).unwrap()
    }

    #[test]
    fn append_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir);

        assert_eq!(store.append(b"first replay").unwrap(), 0);
        assert_eq!(store.append(b"second").unwrap(), 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(0).unwrap(), b"first replay");
        assert_eq!(store.get(1).unwrap(), b"second");
    }

    #[test]
    fn get_past_end_is_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir);
        store.append(b"only").unwrap();

        let err = store.get(1).unwrap_err();
        assert!(matches!(err, StoreError::OutOfRange { index: 1, len: 1 }));
    }

    #[test]
    fn reopen_restores_frames() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = open(&dir);
            store.append(b"alpha").unwrap();
            store.append(b"").unwrap();
            store.append(&[7u8; 4096]).unwrap();
            store.flush().unwrap();
        }

        let mut store = open(&dir);
        assert_eq!(store.len(), 3);
        assert_eq!(store.get(0).unwrap(), b"alpha");
        assert!(store.get(1).unwrap().is_empty());
        assert_eq!(store.get(2).unwrap(), vec![7u8; 4096]);

        // Appends continue after the reloaded frames.
        assert_eq!(store.append(b"delta").unwrap(), 3);
        assert_eq!(store.get(3).unwrap(), b"delta");
    }

    #[test]
    fn crc_detects_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blobs.log");
        {
            let mut store = FileBlobStore::open(&path, SyncMode::EveryWrite).unwrap();
            store.append(b"payload").unwrap();
        }

        // Flip the first payload byte.
        {
            let mut file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
            let at = FILE_HEADER_SIZE + FRAME_HEADER_SIZE;
            let mut buf = [0u8; 1];
            file.seek(SeekFrom::Start(at)).unwrap();
            file.read_exact(&mut buf).unwrap();
            buf[0] ^= 0xFF;
            file.seek(SeekFrom::Start(at)).unwrap();
            file.write_all(&buf).unwrap();
        }

        let store = FileBlobStore::open(&path, SyncMode::default()).unwrap();
        assert!(matches!(
            store.get(0),
            Err(StoreError::CrcMismatch { index: 0, .. })
        ));
    }

    #[test]
    fn truncated_tail_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blobs.log");
        {
            let mut store = FileBlobStore::open(&path, SyncMode::default()).unwrap();
            store.append(b"first").unwrap();
            store.append(b"second").unwrap();
            store.flush().unwrap();
        }
        let len = std::fs::metadata(&path).unwrap().len();
        OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(len - 3)
            .unwrap();

        let err = FileBlobStore::open(&path, SyncMode::default()).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn empty_payload_is_a_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir);
        assert_eq!(store.append(b"").unwrap(), 0);
        assert_eq!(store.append(b"after").unwrap(), 1);
        assert!(store.get(0).unwrap().is_empty());
        assert_eq!(store.get(1).unwrap(), b"after");
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn oversized_payload_is_too_large() {
        assert_eq!(frame_len(4096).unwrap(), 4096);
        assert_eq!(frame_len(u32::MAX as usize).unwrap(), u32::MAX);
        let err = frame_len(u32::MAX as usize + 1).unwrap_err();
        assert!(matches!(err, StoreError::PayloadTooLarge { len } if len == u64::from(u32::MAX) + 1));
    }

    #[test]
    fn failed_truncate_keeps_append_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blobs.log");
        std::fs::write(&path, b"W3MB\x01\x00\x00\x00partial").unwrap();

        // Truncating through a read-only handle fails.
        let file = File::open(&path).unwrap();
        let original = StoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        let err = discard_torn(&file, FILE_HEADER_SIZE, &path, original);
        assert!(matches!(&err, StoreError::Io(e) if e.to_string() == "disk full"));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 15);
    }

    #[test]
    fn truncate_cuts_torn_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blobs.log");
        std::fs::write(&path, b"W3MB\x01\x00\x00\x00partial").unwrap();

        let file = OpenOptions::new().write(true).open(&path).unwrap();
        let err = discard_torn(&file, FILE_HEADER_SIZE, &path, StoreError::PayloadTooLarge { len: 1 });
        assert!(matches!(err, StoreError::PayloadTooLarge { len: 1 }));
        drop(file);

        let store = FileBlobStore::open(&path, SyncMode::default()).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blobs.log");
        std::fs::write(&path, b"NOPE\x01\x00\x00\x00").unwrap();

        let err = FileBlobStore::open(&path, SyncMode::default()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidMagic { .. }));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blobs.log");
        std::fs::write(&path, b"W3MB\x09\x00\x00\x00").unwrap();

        let err = FileBlobStore::open(&path, SyncMode::default()).unwrap_err();
        assert!(matches!(
            err,
            StoreError::UnsupportedVersion { version: 9, .. }
        ));
    }
}
