//! The interior of the state hash tree: a fixed-depth, fixed-fanout node
//! structure with lazy dirty propagation.
//!
//! Nodes live in an arena owned by the cache and refer to each other by
//! [`NodeId`]. Parent back-references are plain arena indices, used only to
//! walk upward for dirty propagation and detachment; ownership always flows
//! parent to child through the slot arrays.

use bytes::Bytes;
use ethereum_types::H256;
use log::trace;
use thiserror::Error;

use crate::{
    bucket::{path_of, BRANCH, TREE_LEVELS},
    leaf_group::LeafGroup,
    tree_hashing::fold_digests,
};

/// Stores the result of structural tree operations. Returns a [`TreeOpError`]
/// upon failure.
pub(crate) type TreeOpResult<T> = Result<T, TreeOpError>;

/// An error type for structural tree operations.
#[derive(Clone, Debug, Eq, Error, Hash, PartialEq)]
pub(crate) enum TreeOpError {
    /// A bucket path produced a child index outside the node fanout. This
    /// cannot happen while the tree geometry invariants hold; the guard
    /// exists so a violation corrupts one insertion instead of the tree.
    #[error("Computed child index {index} out of range at level {level} (residual bucket: {residual})")]
    ChildIndexOutOfRange {
        /// The level the out-of-range index was computed for.
        level: usize,
        /// The offending child index.
        index: usize,
        /// The residual bucket id the index was derived from.
        residual: usize,
    },
}

/// Index of a node inside the arena.
pub(crate) type NodeId = usize;

const ROOT_LEVEL: usize = 1;

/// A node of the state hash tree. A single type carries both shapes: nodes at
/// [`TREE_LEVELS`] are leaves and own a [`LeafGroup`]; every other node is
/// internal and owns up to [`BRANCH`] children.
#[derive(Clone, Debug)]
pub(crate) struct TreeNode {
    level: usize,
    /// Child index of this node inside its parent's slot array.
    slot: usize,
    parent: Option<NodeId>,
    children: [Option<NodeId>; BRANCH],
    /// `Some` iff this is a leaf node.
    group: Option<LeafGroup>,
    /// Lazily cached digest. `None` means dirty.
    hash: Option<H256>,
}

impl TreeNode {
    fn new_internal(level: usize, slot: usize, parent: Option<NodeId>) -> Self {
        Self {
            level,
            slot,
            parent,
            children: [None; BRANCH],
            group: None,
            hash: None,
        }
    }

    fn new_leaf(slot: usize, parent: NodeId) -> Self {
        Self {
            level: TREE_LEVELS,
            slot,
            parent: Some(parent),
            children: [None; BRANCH],
            group: Some(LeafGroup::default()),
            hash: None,
        }
    }

    pub(crate) const fn is_leaf(&self) -> bool {
        self.level == TREE_LEVELS
    }

    #[cfg(any(feature = "tree_debug", test))]
    pub(crate) const fn group(&self) -> Option<&LeafGroup> {
        self.group.as_ref()
    }

    #[cfg(test)]
    pub(crate) const fn is_clean(&self) -> bool {
        self.hash.is_some()
    }
}

/// Arena of tree nodes. Freed slots are recycled through a free list, so ids
/// stay dense under churn.
#[derive(Clone, Debug, Default)]
pub(crate) struct NodeArena {
    nodes: Vec<Option<TreeNode>>,
    free: Vec<NodeId>,
}

impl NodeArena {
    /// Allocates the root node. The root is the only node without a parent
    /// and is never pruned, even when the tree becomes empty.
    pub(crate) fn alloc_root(&mut self) -> NodeId {
        self.alloc(TreeNode::new_internal(ROOT_LEVEL, 0, None))
    }

    fn alloc(&mut self, node: TreeNode) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = Some(node);
                id
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        }
    }

    fn free_slot(&mut self, id: NodeId) {
        self.nodes[id] = None;
        self.free.push(id);
    }

    fn node(&self, id: NodeId) -> &TreeNode {
        self.nodes[id]
            .as_ref()
            .expect("Node id pointed at a freed arena slot")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut TreeNode {
        self.nodes[id]
            .as_mut()
            .expect("Node id pointed at a freed arena slot")
    }

    /// Descends from `id` (normally the root) along the path encoded by
    /// `residual`, creating missing nodes on the way, and installs the record
    /// into the leaf group at the bottom. Returns the leaf's id.
    ///
    /// Every node on the path is marked dirty: this is only ever called for
    /// buckets that currently hold no records, so the insertion is always a
    /// genuine state change.
    pub(crate) fn add_leaf(
        &mut self,
        id: NodeId,
        key: Bytes,
        value: Bytes,
        residual: usize,
    ) -> TreeOpResult<NodeId> {
        if self.node(id).is_leaf() {
            let node = self.node_mut(id);
            node.group
                .as_mut()
                .expect("Leaf node without a leaf group")
                .set(key, value);
            node.hash = None;

            return Ok(id);
        }

        let level = self.node(id).level;
        let (index, rest) = path_of(residual, level + 1);
        if index >= BRANCH {
            return Err(TreeOpError::ChildIndexOutOfRange {
                level: level + 1,
                index,
                residual,
            });
        }

        self.node_mut(id).hash = None;
        let child = match self.node(id).children[index] {
            Some(child) => child,
            None => {
                trace!("Creating level {} node at slot {}", level + 1, index);

                let child = match level + 1 == TREE_LEVELS {
                    true => self.alloc(TreeNode::new_leaf(index, id)),
                    false => self.alloc(TreeNode::new_internal(level + 1, index, Some(id))),
                };
                self.node_mut(id).children[index] = Some(child);
                child
            }
        };

        self.add_leaf(child, key, value, rest)
    }

    /// Inserts a record into an existing leaf node's group. Dirty flags are
    /// propagated only when the group actually changed, so a value-equal put
    /// leaves every cached digest intact.
    pub(crate) fn set(&mut self, id: NodeId, key: Bytes, value: Bytes) {
        let node = self.node_mut(id);
        let changed = node
            .group
            .as_mut()
            .expect("`set` called on an internal node")
            .set(key, value);

        if changed {
            self.propagate_dirty(id);
        }
    }

    /// Removes a record from a leaf node's group. Returns `true` iff the leaf
    /// is still valid afterwards; an emptied leaf detaches itself from its
    /// parent chain instead of propagating dirty (the detachment restructures
    /// the surviving ancestors, which dirties them).
    pub(crate) fn remove(&mut self, id: NodeId, key: &[u8]) -> bool {
        let node = self.node_mut(id);
        let group = node
            .group
            .as_mut()
            .expect("`remove` called on an internal node");

        if !group.remove(key) {
            return true;
        }

        if group.is_empty() {
            trace!("Leaf emptied by removal, detaching");
            self.detach(id);
            false
        } else {
            self.propagate_dirty(id);
            true
        }
    }

    /// Unlinks `id` from its parent and frees its arena slot.
    fn detach(&mut self, id: NodeId) {
        let (parent, slot) = {
            let node = self.node(id);
            (node.parent, node.slot)
        };
        self.free_slot(id);

        if let Some(parent) = parent {
            self.remove_child(parent, slot);
        }
    }

    /// Clears a child slot. A node left without any valid descendant removes
    /// itself from its own parent in turn; otherwise the change propagates as
    /// a dirty flag. The root never detaches.
    pub(crate) fn remove_child(&mut self, id: NodeId, slot: usize) {
        self.node_mut(id).children[slot] = None;

        if self.node(id).parent.is_some() && !self.valid(id) {
            self.detach(id);
        } else {
            self.propagate_dirty(id);
        }
    }

    /// Whether a node still holds any records: a leaf is valid iff its group
    /// is non-empty, an internal node iff any child is valid.
    pub(crate) fn valid(&self, id: NodeId) -> bool {
        let node = self.node(id);
        match &node.group {
            Some(group) => !group.is_empty(),
            None => node
                .children
                .iter()
                .flatten()
                .any(|&child| self.valid(child)),
        }
    }

    /// Marks a node and its ancestors dirty. Stops at the first node that is
    /// already dirty: invariantly its ancestors are dirty too.
    pub(crate) fn propagate_dirty(&mut self, id: NodeId) {
        let mut current = Some(id);

        while let Some(id) = current {
            let node = self.node_mut(id);
            if node.hash.is_none() {
                break;
            }

            node.hash = None;
            current = node.parent;
        }
    }

    /// The digest of a node, recomputing only dirty subtrees.
    ///
    /// Leaves copy their group's digest. Internal nodes concatenate the
    /// digests of their non-null children in slot order and fold them; a
    /// single-child concatenation is adopted verbatim (see
    /// [`fold_digests`]).
    pub(crate) fn digest(&mut self, id: NodeId) -> H256 {
        if let Some(h) = self.node(id).hash {
            return h;
        }

        let h = match self.node(id).is_leaf() {
            true => self
                .node_mut(id)
                .group
                .as_mut()
                .expect("Leaf node without a leaf group")
                .digest(),
            false => {
                let children: Vec<NodeId> =
                    self.node(id).children.iter().flatten().copied().collect();
                let digests: Vec<H256> = children
                    .into_iter()
                    .map(|child| self.digest(child))
                    .collect();

                fold_digests(digests)
            }
        };

        self.node_mut(id).hash = Some(h);
        h
    }

    /// Number of records in a leaf node's group.
    pub(crate) fn group_len(&self, id: NodeId) -> usize {
        self.node(id)
            .group
            .as_ref()
            .map_or(0, LeafGroup::len)
    }

    #[cfg(any(feature = "tree_debug", test))]
    pub(crate) fn live_nodes(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.iter().flatten()
    }

    #[cfg(test)]
    pub(crate) fn live_node_count(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    #[cfg(test)]
    pub(crate) fn force_dirty_all(&mut self) {
        for node in self.nodes.iter_mut().flatten() {
            node.hash = None;
            if let Some(group) = node.group.as_mut() {
                group.force_dirty();
            }
        }
    }
}
