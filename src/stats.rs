//! Simple tooling to extract stats from state hash trees.
//!
//! Useful when judging how evenly the bucketing hash is spreading a workload
//! across leaf groups.

use std::fmt::{self, Display};

use crate::cache::HashCache;

/// Statistics for a given tree: node counts by shape plus record and bucket
/// occupancy.
#[derive(Clone, Debug, Default)]
pub struct TreeStats {
    name: Option<String>,
    /// Number of internal nodes (the root included).
    pub internal_nodes: usize,
    /// Number of leaf nodes, i.e. populated buckets.
    pub leaf_nodes: usize,
    /// Total number of records across all leaf groups.
    pub records: usize,
    /// Size of the largest leaf group.
    pub largest_group: usize,
}

impl Display for TreeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tree Stats:")?;

        match self.name.as_ref() {
            Some(name) => writeln!(f, " ({})", name)?,
            None => writeln!(f)?,
        }

        writeln!(f, "Internal nodes: {}", self.internal_nodes)?;
        writeln!(f, "Leaf nodes: {}", self.leaf_nodes)?;
        writeln!(f, "Records: {}", self.records)?;
        writeln!(f, "Largest leaf group: {}", self.largest_group)?;
        writeln!(
            f,
            "Avg records per populated bucket: {:.2}",
            match self.leaf_nodes {
                0 => 0.0,
                n => self.records as f32 / n as f32,
            }
        )
    }
}

/// Collects stats on a cache's tree.
pub fn get_tree_stats(cache: &HashCache) -> TreeStats {
    get_tree_stats_common(cache, None)
}

/// Collects stats on a cache's tree and includes a name in the output.
pub fn get_tree_stats_with_name(cache: &HashCache, name: String) -> TreeStats {
    get_tree_stats_common(cache, Some(name))
}

fn get_tree_stats_common(cache: &HashCache, name: Option<String>) -> TreeStats {
    let mut stats = TreeStats {
        name,
        ..Default::default()
    };

    for node in cache.arena().live_nodes() {
        match node.group() {
            Some(group) => {
                stats.leaf_nodes += 1;
                stats.records += group.len();
                stats.largest_group = stats.largest_group.max(group.len());
            }
            None => stats.internal_nodes += 1,
        }
    }

    stats
}
