//! Hash-prefix resolution.
//!
//! [`SortedHashes`] keeps every catalogued hash in lexicographic order,
//! updated by insertion on each append. [`SortedHashes::descend`] probes it
//! with a halving descent that compares the prefix against whole hashes:
//!
//! 1. Start at `i = n / 2`.
//! 2. If `hash[i]` starts with the prefix, return it.
//! 3. If the prefix sorts after `hash[i]`, move to `(i + n) / 2`, otherwise
//!    to `i / 2`.
//! 4. Give up as soon as an index would be probed a second time.
//!
//! The descent returns the first match it lands on, which is not necessarily
//! the smallest matching hash. Short prefixes shared by several hashes can
//! resolve to any one of them, and a prefix that falls between the probed
//! neighbours of its only match can miss it. Callers should pass prefixes
//! long enough to be unambiguous.

use std::collections::HashSet;

use w3ml_types::ReplayHash;

/// Ordered set of catalogued hashes.
#[derive(Clone, Debug, Default)]
pub struct SortedHashes {
    hashes: Vec<ReplayHash>,
}

impl SortedHashes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from hashes in any order.
    pub fn from_unsorted(mut hashes: Vec<ReplayHash>) -> Self {
        hashes.sort_unstable();
        hashes.dedup();
        Self { hashes }
    }

    /// Insert a hash, keeping order. Returns `false` if it was already present.
    pub fn insert(&mut self, hash: ReplayHash) -> bool {
        match self.hashes.binary_search(&hash) {
            Ok(_) => false,
            Err(pos) => {
                self.hashes.insert(pos, hash);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn as_slice(&self) -> &[ReplayHash] {
        &self.hashes
    }

    /// Find a hash whose hex form starts with `prefix` (lowercase).
    pub fn descend(&self, prefix: &str) -> Option<ReplayHash> {
        let n = self.hashes.len();
        if n == 0 {
            return None;
        }
        let mut probed = HashSet::new();
        let mut i = n / 2;
        while probed.insert(i) {
            let candidate = self.hashes[i];
            if candidate.has_prefix(prefix) {
                return Some(candidate);
            }
            i = if prefix > candidate.to_hex().as_str() {
                (i + n) / 2
            } else {
                i / 2
            };
        }
        None
    }
}
