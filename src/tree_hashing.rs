use bytes::BytesMut;
use ethereum_types::H256;
use keccak_hash::keccak;

use crate::bucket::HASH_SIZE;

/// Digest of a single record: the hash of `key ‖ value` with no length
/// prefixes.
pub(crate) fn hash_record(key: &[u8], value: &[u8]) -> H256 {
    let mut buf = BytesMut::with_capacity(key.len() + value.len());
    buf.extend_from_slice(key);
    buf.extend_from_slice(value);

    keccak(&buf)
}

/// Folds an ordered sequence of digests into a single parent digest.
///
/// A concatenation of exactly [`HASH_SIZE`] bytes is a single digest and is
/// adopted verbatim instead of being re-hashed. This is the single-child
/// collapse rule: it keeps digests stable under sparse population and also
/// makes a one-record leaf group hash to that record's own digest. An empty
/// sequence folds to the hash of the empty byte string.
pub(crate) fn fold_digests<I>(digests: I) -> H256
where
    I: IntoIterator<Item = H256>,
{
    let mut buf = BytesMut::new();
    for digest in digests {
        buf.extend_from_slice(digest.as_bytes());
    }

    match buf.len() == HASH_SIZE {
        true => H256::from_slice(&buf),
        false => keccak(&buf),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_digest_folds_verbatim() {
        let digest = keccak([1_u8, 2, 3]);
        assert_eq!(fold_digests([digest]), digest);
    }

    #[test]
    fn multiple_digests_fold_to_hash_of_concatenation() {
        let a = keccak([1_u8]);
        let b = keccak([2_u8]);

        let mut concat = Vec::new();
        concat.extend_from_slice(a.as_bytes());
        concat.extend_from_slice(b.as_bytes());

        assert_eq!(fold_digests([a, b]), keccak(&concat));
    }

    #[test]
    fn empty_sequence_folds_to_hash_of_empty_bytes() {
        assert_eq!(fold_digests([]), keccak([0_u8; 0]));
    }

    #[test]
    fn record_hash_has_no_length_prefixes() {
        assert_eq!(hash_record(&[1, 2], &[3]), hash_record(&[1], &[2, 3]));
    }
}
