//! The bucket coordinate layer: design-fixed tree geometry, plus the pure
//! functions that map keys to buckets and buckets to root-to-leaf paths.
//!
//! All of the constants here are part of the digest wire contract: two nodes
//! that compare state roots must agree on every one of them (including the
//! bucketing hash), or identical record sets will produce different digests.

/// Width in bytes of every digest in the tree.
pub const HASH_SIZE: usize = 32;

/// Total number of leaf buckets keys are distributed across.
pub const N_BUCKETS: usize = 4096;

/// Branching factor of internal nodes.
pub const BRANCH: usize = 16;

/// Depth of the tree in levels. The root is level `1` and leaves sit at level
/// [`TREE_LEVELS`].
pub const TREE_LEVELS: usize = 4;

/// `STRIDES[level]` is the number of buckets spanned by a single child slot of
/// a node at `level`, i.e. `BRANCH^(TREE_LEVELS - level)`.
pub(crate) const STRIDES: [usize; TREE_LEVELS + 1] = build_strides();

const fn build_strides() -> [usize; TREE_LEVELS + 1] {
    let mut strides = [1_usize; TREE_LEVELS + 1];

    let mut level = TREE_LEVELS;
    while level > 0 {
        level -= 1;
        strides[level] = strides[level + 1] * BRANCH;
    }

    strides
}

// Every bucket id must map to a unique leaf coordinate.
const _: () = assert!(STRIDES[1] >= N_BUCKETS);

/// Maps a key to its bucket id in `[0, N_BUCKETS)`.
///
/// The hash here is fast and deterministic, **not** cryptographic: the state
/// root authenticates the actual record contents, so bucket assignment has no
/// security role. The seahash output is truncated to 32 bits before the
/// modulo so that the assignment is stable across word sizes.
pub fn bucket_of(key: &[u8]) -> usize {
    (seahash::hash(key) as u32) as usize % N_BUCKETS
}

/// Splits a bucket id (or a residual thereof) into the child index taken at
/// `level` and the residual passed down to deeper levels.
///
/// Applied repeatedly from level `2` down to [`TREE_LEVELS`], this enumerates
/// the unique root-to-leaf path of a bucket.
pub const fn path_of(bucket: usize, level: usize) -> (usize, usize) {
    let stride = STRIDES[level];
    (bucket / stride, bucket % stride)
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};

    use super::*;

    #[test]
    fn strides_match_tree_geometry() {
        assert_eq!(STRIDES[TREE_LEVELS], 1);
        assert_eq!(STRIDES[TREE_LEVELS - 1], BRANCH);
        assert_eq!(STRIDES[1], N_BUCKETS);
    }

    #[test]
    fn every_bucket_has_a_unique_leaf_coordinate() {
        for bucket in 0..N_BUCKETS {
            let mut residual = bucket;
            let mut reconstructed = 0;

            for level in 2..=TREE_LEVELS {
                let (index, rest) = path_of(residual, level);
                assert!(index < BRANCH, "child index out of range for {}", bucket);

                reconstructed += index * STRIDES[level];
                residual = rest;
            }

            // The path digits recombine into the original bucket id, so the
            // bucket -> path mapping is injective.
            assert_eq!(reconstructed, bucket);
            assert_eq!(residual, 0);
        }
    }

    #[test]
    fn bucket_of_is_deterministic_and_in_range() {
        let mut rng = StdRng::seed_from_u64(0xb0c4);

        for _ in 0..1000 {
            let mut key = vec![0_u8; rng.gen_range(1..=64)];
            rng.fill_bytes(&mut key);

            let bucket = bucket_of(&key);
            assert!(bucket < N_BUCKETS);
            assert_eq!(bucket, bucket_of(&key));
        }
    }
}
