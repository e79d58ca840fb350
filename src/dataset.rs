//! Tree-shaped handle over partitioned data.
//!
//! A [`PartitionedDataset`] is either a **leaf** holding one in-process shard, or an internal
//! node whose logical content is the left-to-right concatenation of its children. Handles are
//! immutable and cheap to clone (`Arc` inside), so any number of concurrent requests can share
//! one dataset; `map` and `sketch` always produce new handles or results.
//!
//! Leaves carry a **weight** (defaults to 1) that the runner uses to report progress by data
//! volume rather than by leaf count.
//!
//! ```
//! use ironsketch::PartitionedDataset;
//!
//! let ds = PartitionedDataset::from_leaves(vec![vec![1, 2], vec![3], vec![4, 5, 6]], 2)?;
//! assert_eq!(ds.leaf_count(), 3);
//! assert_eq!(ds.depth(), 3);
//! # Ok::<_, ironsketch::SketchError>(())
//! ```

use crate::error::{Result, SketchError};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Position of a node in a dataset tree: child indices from the root.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn child(&self, index: usize) -> Self {
        let mut v = self.0.clone();
        v.push(index);
        Self(v)
    }

    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<usize>> for NodePath {
    fn from(v: Vec<usize>) -> Self {
        Self(v)
    }
}

impl Display for NodePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for i in &self.0 {
            write!(f, "/{i}")?;
        }
        Ok(())
    }
}

enum DatasetNode<S> {
    Leaf { shard: S, weight: u64 },
    Parallel(Vec<PartitionedDataset<S>>),
}

/// Immutable tree of shards. See the [module docs](self).
pub struct PartitionedDataset<S> {
    node: Arc<DatasetNode<S>>,
}

impl<S> Clone for PartitionedDataset<S> {
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
        }
    }
}

impl<S> std::fmt::Debug for PartitionedDataset<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.node.as_ref() {
            DatasetNode::Leaf { weight, .. } => write!(f, "Leaf(weight={weight})"),
            DatasetNode::Parallel(children) => f.debug_list().entries(children).finish(),
        }
    }
}

impl<S> PartitionedDataset<S> {
    /// A single-shard dataset with weight 1.
    pub fn leaf(shard: S) -> Self {
        Self::leaf_weighted(shard, 1)
    }

    /// A single-shard dataset whose share of the total work is `weight` (at least 1).
    pub fn leaf_weighted(shard: S, weight: u64) -> Self {
        Self {
            node: Arc::new(DatasetNode::Leaf {
                shard,
                weight: weight.max(1),
            }),
        }
    }

    /// Concatenation of `children`, in order.
    pub fn parallel(children: Vec<Self>) -> Self {
        Self {
            node: Arc::new(DatasetNode::Parallel(children)),
        }
    }

    /// Build a balanced tree with at most `fanout` children per internal node.
    ///
    /// # Errors
    /// [`SketchError::InvalidConfig`] when `fanout < 2`.
    pub fn from_leaves(shards: Vec<S>, fanout: usize) -> Result<Self> {
        Self::from_weighted_leaves(shards.into_iter().map(|s| (s, 1)).collect(), fanout)
    }

    /// Like [`from_leaves`](Self::from_leaves), with an explicit weight per shard.
    ///
    /// # Errors
    /// [`SketchError::InvalidConfig`] when `fanout < 2`.
    pub fn from_weighted_leaves(shards: Vec<(S, u64)>, fanout: usize) -> Result<Self> {
        if fanout < 2 {
            return Err(SketchError::invalid(format!(
                "dataset fanout must be at least 2, got {fanout}"
            )));
        }
        let mut level: Vec<Self> = shards
            .into_iter()
            .map(|(s, w)| Self::leaf_weighted(s, w))
            .collect();
        if level.len() == 1 {
            return Ok(level.remove(0));
        }
        while level.len() > fanout {
            let mut next = Vec::with_capacity(level.len().div_ceil(fanout));
            let mut it = level.into_iter().peekable();
            while it.peek().is_some() {
                next.push(Self::parallel(it.by_ref().take(fanout).collect()));
            }
            level = next;
        }
        Ok(Self::parallel(level))
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self.node.as_ref(), DatasetNode::Leaf { .. })
    }

    /// The shard, when this handle is a leaf.
    #[must_use]
    pub fn shard(&self) -> Option<&S> {
        match self.node.as_ref() {
            DatasetNode::Leaf { shard, .. } => Some(shard),
            DatasetNode::Parallel(_) => None,
        }
    }

    /// Children of an internal node; empty for a leaf.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        match self.node.as_ref() {
            DatasetNode::Leaf { .. } => &[],
            DatasetNode::Parallel(c) => c,
        }
    }

    /// Leaf weight, or the sum of the leaf weights below an internal node.
    #[must_use]
    pub fn weight(&self) -> u64 {
        match self.node.as_ref() {
            DatasetNode::Leaf { weight, .. } => *weight,
            DatasetNode::Parallel(c) => c.iter().map(Self::weight).sum(),
        }
    }

    #[must_use]
    pub fn leaf_count(&self) -> usize {
        match self.node.as_ref() {
            DatasetNode::Leaf { .. } => 1,
            DatasetNode::Parallel(c) => c.iter().map(Self::leaf_count).sum(),
        }
    }

    /// Number of levels; a single leaf has depth 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self.node.as_ref() {
            DatasetNode::Leaf { .. } => 1,
            DatasetNode::Parallel(c) => 1 + c.iter().map(Self::depth).max().unwrap_or(0),
        }
    }

    /// Leaf handles in left-to-right order, with their paths.
    #[must_use]
    pub fn leaves(&self) -> Vec<(NodePath, Self)> {
        let mut out = Vec::new();
        self.collect_leaves(NodePath::root(), &mut out);
        out
    }

    fn collect_leaves(&self, path: NodePath, out: &mut Vec<(NodePath, Self)>) {
        match self.node.as_ref() {
            DatasetNode::Leaf { .. } => out.push((path, self.clone())),
            DatasetNode::Parallel(children) => {
                for (i, c) in children.iter().enumerate() {
                    c.collect_leaves(path.child(i), out);
                }
            }
        }
    }

    /// The subtree at `path`, e.g. to retry a failed leaf.
    #[must_use]
    pub fn subtree(&self, path: &NodePath) -> Option<Self> {
        let mut cur = self;
        for &i in path.indices() {
            cur = cur.children().get(i)?;
        }
        Some(cur.clone())
    }

    /// Rebuild a dataset with this tree's shape, taking leaves (and their weights) from
    /// `leaves` in left-to-right order.
    pub(crate) fn rebuild<O, I>(&self, leaves: &mut I) -> PartitionedDataset<O>
    where
        I: Iterator<Item = O>,
    {
        match self.node.as_ref() {
            DatasetNode::Leaf { weight, .. } => match leaves.next() {
                Some(shard) => PartitionedDataset::leaf_weighted(shard, *weight),
                None => PartitionedDataset::parallel(Vec::new()),
            },
            DatasetNode::Parallel(children) => PartitionedDataset::parallel(
                children.iter().map(|c| c.rebuild(leaves)).collect(),
            ),
        }
    }
}
