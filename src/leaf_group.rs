//! Leaf groups: the ordered record sets that populate the bottom level of the
//! tree, one per populated bucket.
//!
//! Digest caching follows the same lazy scheme at both layers: an
//! `Option<H256>` where `None` means the cached value is stale. Per-record
//! caching makes repeated updates of unrelated records in the same bucket
//! cheap, since only the touched record's digest is recomputed.

use bytes::Bytes;
use ethereum_types::H256;

use crate::tree_hashing::{fold_digests, hash_record};

/// A single key/value entry owned by a [`LeafGroup`].
#[derive(Clone, Debug)]
pub(crate) struct Record {
    key: Bytes,
    value: Bytes,
    /// Lazily cached digest of `key ‖ value`. `None` means stale.
    hash: Option<H256>,
}

impl Record {
    fn new(key: Bytes, value: Bytes) -> Self {
        Self {
            key,
            value,
            hash: None,
        }
    }

    fn digest(&mut self) -> H256 {
        match self.hash {
            Some(h) => h,
            None => {
                let h = hash_record(&self.key, &self.value);
                self.hash = Some(h);
                h
            }
        }
    }

    #[cfg(test)]
    pub(crate) const fn is_clean(&self) -> bool {
        self.hash.is_some()
    }

    #[cfg(test)]
    pub(crate) fn force_dirty(&mut self) {
        self.hash = None;
    }
}

/// The ordered set of records sharing one bucket.
///
/// Record order is canonicalised (ascending lexicographic key order) at every
/// group-digest recomputation rather than on every mutation, so the group
/// digest is independent of insertion order while mutation stays `O(n)`.
#[derive(Clone, Debug, Default)]
pub(crate) struct LeafGroup {
    records: Vec<Record>,
    hash: Option<H256>,
}

impl LeafGroup {
    /// Inserts a record, or overwrites the value of an existing one with the
    /// same key. Returns `true` iff the group actually changed: a put whose
    /// value is byte-equal to the stored one is a full no-op and leaves every
    /// cached digest intact.
    pub(crate) fn set(&mut self, key: Bytes, value: Bytes) -> bool {
        match self.records.iter_mut().find(|r| r.key == key) {
            Some(record) => {
                if record.value == value {
                    return false;
                }

                record.value = value;
                record.hash = None;
                self.hash = None;
                true
            }
            None => {
                self.records.push(Record::new(key, value));
                self.hash = None;
                true
            }
        }
    }

    /// Removes the record whose key matches byte-for-byte. Returns `true` iff
    /// a record was actually removed.
    pub(crate) fn remove(&mut self, key: &[u8]) -> bool {
        match self.records.iter().position(|r| r.key.as_ref() == key) {
            Some(idx) => {
                self.records.remove(idx);
                self.hash = None;
                true
            }
            None => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The group digest: record digests concatenated in ascending key order
    /// and folded. Must not be called on an empty group.
    pub(crate) fn digest(&mut self) -> H256 {
        if let Some(h) = self.hash {
            return h;
        }
        debug_assert!(
            !self.records.is_empty(),
            "Attempted to hash an empty leaf group! Empty groups must be pruned by their owner."
        );

        self.records.sort_unstable_by(|a, b| a.key.cmp(&b.key));
        let h = fold_digests(self.records.iter_mut().map(Record::digest));

        self.hash = Some(h);
        h
    }

    #[cfg(test)]
    pub(crate) fn records(&self) -> &[Record] {
        &self.records
    }

    #[cfg(test)]
    pub(crate) const fn is_clean(&self) -> bool {
        self.hash.is_some()
    }

    #[cfg(test)]
    pub(crate) fn force_dirty(&mut self) {
        self.hash = None;
        for record in &mut self.records {
            record.force_dirty();
        }
    }
}
