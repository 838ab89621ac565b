use crate::error::{StoreError, StoreResult};
use crate::traits::{BlobStore, RecordTable};

/// In-memory, `Vec`-backed blob store.
///
/// Intended for tests and embedding. Nothing is persisted; `flush` is a no-op.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: Vec<Vec<u8>>,
}

impl InMemoryBlobStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn append(&mut self, data: &[u8]) -> StoreResult<u64> {
        self.blobs.push(data.to_vec());
        Ok(self.blobs.len() as u64 - 1)
    }

    fn get(&self, index: u64) -> StoreResult<Vec<u8>> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.blobs.get(i))
            .cloned()
            .ok_or(StoreError::OutOfRange {
                index,
                len: self.len(),
            })
    }

    fn len(&self) -> u64 {
        self.blobs.len() as u64
    }

    fn flush(&mut self) -> StoreResult<()> {
        Ok(())
    }
}

/// In-memory, `Vec`-backed record table. Records are cloned on read/write.
#[derive(Debug)]
pub struct InMemoryTable<T> {
    records: Vec<T>,
}

impl<T> InMemoryTable<T> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<T> Default for InMemoryTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> RecordTable<T> for InMemoryTable<T> {
    fn append(&mut self, record: &T) -> StoreResult<u64> {
        self.records.push(record.clone());
        Ok(self.records.len() as u64 - 1)
    }

    fn get(&self, index: u64) -> StoreResult<T> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.records.get(i))
            .cloned()
            .ok_or(StoreError::OutOfRange {
                index,
                len: self.len(),
            })
    }

    fn len(&self) -> u64 {
        self.records.len() as u64
    }

    fn scan(&self) -> StoreResult<Vec<T>> {
        Ok(self.records.clone())
    }

    fn flush(&mut self) -> StoreResult<()> {
        Ok(())
    }
}
