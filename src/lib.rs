//! Types and utility functions for maintaining a ledger state root over an
//! arbitrary key/value mapping.
//!
//! The core of this library is the [`HashCache`][cache::HashCache] type: a
//! bucketed, fixed-fanout hash tree that summarises the entire current
//! mapping in one 32-byte digest and updates that digest incrementally.
//! Keys are distributed across a fixed number of buckets by a fast
//! non-cryptographic hash; each populated bucket is served by one leaf node
//! whose records are hashed in sorted key order, so the root digest is a
//! pure deterministic function of the record set regardless of insertion
//! order. Mutations only flip dirty flags upward through the tree, and
//! reading the root recomputes dirty subtrees only.
//!
//! The cache is fed by a ledger's write path: it is loaded once from a
//! persistent-store snapshot via [`init`][cache::HashCache::init], then
//! driven by ordered [`WriteOp`][cache::WriteOp] batches whose resulting
//! root digest can be embedded in block headers and compared across nodes.

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]
#![deny(missing_docs)]

pub mod bucket;
pub mod cache;
mod leaf_group;
mod tree;
mod tree_hashing;

#[cfg(feature = "tree_debug")]
pub mod stats;

#[cfg(test)]
pub(crate) mod testing_utils;
