use crate::error::StoreResult;

/// Append-only store of opaque byte payloads addressed by dense index.
///
/// All implementations must satisfy these invariants:
/// - `append` returns `len()` as it was before the call, then grows by one.
/// - Payloads are immutable once appended.
/// - `get` on an index `>= len()` fails with `StoreError::OutOfRange`.
pub trait BlobStore {
    /// Append a payload and return its index.
    fn append(&mut self, data: &[u8]) -> StoreResult<u64>;

    /// Read the payload at `index`.
    fn get(&self, index: u64) -> StoreResult<Vec<u8>>;

    /// Number of stored payloads.
    fn len(&self) -> u64;

    /// Returns `true` if nothing has been appended.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push buffered writes to durable storage.
    fn flush(&mut self) -> StoreResult<()>;
}

/// Append-only table of typed records addressed by dense index.
///
/// Same invariants as [`BlobStore`], for decoded records.
pub trait RecordTable<T> {
    /// Append a record and return its index.
    fn append(&mut self, record: &T) -> StoreResult<u64>;

    /// Read the record at `index`.
    fn get(&self, index: u64) -> StoreResult<T>;

    /// Number of stored records.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read every record in index order.
    ///
    /// Default implementation calls `get()` for each index. Backends may
    /// override for better performance (e.g., one sequential read).
    fn scan(&self) -> StoreResult<Vec<T>> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }

    /// Push buffered writes to durable storage.
    fn flush(&mut self) -> StoreResult<()>;
}
