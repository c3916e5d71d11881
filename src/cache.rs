//! The public face of the state hash tree: the [`HashCache`] and the
//! [`WriteOp`] batch type fed to it by ledger write paths.

use std::collections::HashMap;

use bytes::Bytes;
use enum_as_inner::EnumAsInner;
use ethereum_types::H256;
use log::{error, info, trace};
use serde::{Deserialize, Serialize};

use crate::{
    bucket::bucket_of,
    tree::{NodeArena, NodeId},
};

/// A single operation inside a write batch.
///
/// Batches are ordered: operations are applied in the order given, and the
/// digest returned by [`HashCache::update`] reflects all of them.
#[derive(Clone, Debug, Deserialize, EnumAsInner, Eq, Hash, PartialEq, Serialize)]
pub enum WriteOp {
    /// Insert a record, or overwrite the value stored under an existing key.
    Put {
        /// The record key. Empty keys are silently ignored.
        key: Bytes,
        /// The record value. May be empty.
        value: Bytes,
    },
    /// Remove the record stored under a key, if present.
    Delete {
        /// The key to remove. Empty keys are silently ignored.
        key: Bytes,
    },
}

impl WriteOp {
    /// Creates a `Put` operation.
    pub fn put(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Creates a `Delete` operation.
    pub fn delete(key: impl Into<Bytes>) -> Self {
        Self::Delete { key: key.into() }
    }
}

/// An in-memory authenticated accumulator over a key/value mapping.
///
/// The cache owns a fixed-depth bucketed hash tree plus a direct index from
/// bucket id to leaf node, giving `O(1)` access on mutation. Digests are
/// cached per record, per leaf group and per node, and recomputed lazily:
/// mutations only flip dirty flags upward, and [`root_digest`] walks dirty
/// subtrees only.
///
/// The cache is single-writer by contract. Every operation (including
/// [`root_digest`], which refreshes caches) takes `&mut self`, so exclusive
/// access is enforced by the borrow checker; callers that need to share the
/// cache across threads wrap it in a mutex at the ledger layer.
///
/// [`root_digest`]: Self::root_digest
#[derive(Clone, Debug)]
pub struct HashCache {
    arena: NodeArena,
    root: NodeId,
    /// bucket id -> leaf node. Has an entry iff the bucket holds records.
    leaves: HashMap<usize, NodeId>,
    initialized: bool,
}

impl Default for HashCache {
    fn default() -> Self {
        Self::new()
    }
}

impl HashCache {
    /// Creates an empty, uninitialized cache. [`init`](Self::init) must be
    /// called before the first [`update`](Self::update).
    pub fn new() -> Self {
        let mut arena = NodeArena::default();
        let root = arena.alloc_root();

        Self {
            arena,
            root,
            leaves: HashMap::new(),
            initialized: false,
        }
    }

    /// Loads the initial snapshot of the persistent store into the tree.
    ///
    /// Runs at most once per cache: redundant calls are silently ignored, and
    /// the snapshot supplied to the first call wins. Snapshot order is
    /// irrelevant; the tree digest is order-independent by construction.
    pub fn init<I, K, V>(&mut self, snapshot: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Bytes>,
        V: Into<Bytes>,
    {
        if self.initialized {
            trace!("Redundant state hash cache init ignored");
            return;
        }
        self.initialized = true;

        let mut count = 0_usize;
        for (key, value) in snapshot {
            self.set(key.into(), value.into());
            count += 1;
        }

        info!(
            "State hash cache initialized with {} records across {} populated buckets",
            count,
            self.leaves.len()
        );
    }

    /// The current root digest, recomputing only dirty subtrees.
    pub fn root_digest(&mut self) -> H256 {
        self.arena.digest(self.root)
    }

    /// Applies a write batch in order and returns the new root digest.
    ///
    /// # Panics
    /// Panics if [`init`](Self::init) has not been called: updating an
    /// uninitialized cache is a programmer error, and silently producing a
    /// digest over partial state would be worse than aborting.
    pub fn update<I>(&mut self, batch: I) -> H256
    where
        I: IntoIterator<Item = WriteOp>,
    {
        assert!(
            self.initialized,
            "`update` called on an uninitialized state hash cache"
        );

        for op in batch {
            match op {
                WriteOp::Put { key, value } => self.set(key, value),
                WriteOp::Delete { key } => self.remove(&key),
            }
        }

        self.root_digest()
    }

    /// Total number of records currently in the tree.
    pub fn record_count(&self) -> usize {
        self.leaves
            .values()
            .map(|&leaf| self.arena.group_len(leaf))
            .sum()
    }

    /// Number of buckets currently holding at least one record.
    pub fn populated_buckets(&self) -> usize {
        self.leaves.len()
    }

    fn set(&mut self, key: Bytes, value: Bytes) {
        if key.is_empty() {
            return;
        }

        let bucket = bucket_of(&key);
        if let Some(&leaf) = self.leaves.get(&bucket) {
            self.arena.set(leaf, key, value);
            return;
        }

        match self.arena.add_leaf(self.root, key, value, bucket) {
            Ok(leaf) => {
                self.leaves.insert(bucket, leaf);
            }
            Err(e) => error!("Dropping insertion into bucket {}: {}", bucket, e),
        }
    }

    fn remove(&mut self, key: &[u8]) {
        if key.is_empty() {
            return;
        }

        let bucket = bucket_of(key);
        if let Some(&leaf) = self.leaves.get(&bucket) {
            if !self.arena.remove(leaf, key) {
                self.leaves.remove(&bucket);
            }
        }
    }

    #[cfg(feature = "tree_debug")]
    pub(crate) const fn arena(&self) -> &NodeArena {
        &self.arena
    }
}

#[cfg(test)]
impl HashCache {
    /// Every node, group and record digest is cached (clean).
    pub(crate) fn is_fully_clean(&self) -> bool {
        self.arena.live_nodes().all(|node| {
            node.is_clean()
                && node.group().map_or(true, |group| {
                    group.is_clean() && group.records().iter().all(|r| r.is_clean())
                })
        })
    }

    pub(crate) fn force_dirty_all(&mut self) {
        self.arena.force_dirty_all();
    }

    pub(crate) fn live_node_count(&self) -> usize {
        self.arena.live_node_count()
    }

    pub(crate) fn has_bucket(&self, bucket: usize) -> bool {
        self.leaves.contains_key(&bucket)
    }
}
