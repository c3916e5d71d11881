use bytes::Bytes;
use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};

use crate::cache::HashCache;

pub(crate) type TestKvEntry = (Bytes, Bytes);

pub(crate) fn common_setup() {
    // Try init since multiple tests calling `init` will cause an error.
    let _ = pretty_env_logger::try_init();
}

/// Random-looking entries with guaranteed-unique keys: a random prefix plus
/// the entry ordinal, so permutation tests never see two values for one key.
pub(crate) fn generate_n_random_entries(n: usize, seed: u64) -> Vec<TestKvEntry> {
    let mut rng = StdRng::seed_from_u64(seed);

    (0..n as u32)
        .map(|i| {
            let mut key = vec![0_u8; 8];
            rng.fill_bytes(&mut key);
            key.extend_from_slice(&i.to_be_bytes());

            // Empty values are legal and worth covering.
            let mut value = vec![0_u8; rng.gen_range(0..=32)];
            rng.fill_bytes(&mut value);

            (Bytes::from(key), Bytes::from(value))
        })
        .collect()
}

pub(crate) fn init_cache_with_entries(entries: &[TestKvEntry]) -> HashCache {
    let mut cache = HashCache::new();
    cache.init(entries.iter().cloned());

    cache
}
