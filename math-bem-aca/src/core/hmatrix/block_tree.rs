//! Block cluster tree pairing test and trial clusters
//!
//! A block is admissible when the clusters are separated relative to their
//! size:
//!
//! ```text
//! dist(τ, σ) > 0  and  min(diam(τ), diam(σ)) <= η · dist(τ, σ)
//! ```
//!
//! Admissible blocks small enough to store become leaves; everything else is
//! split along whichever side still has children.

use super::cluster::ClusterTree;
use crate::core::error::Result;
use std::ops::Range;

/// Classification of a block, fixed when the block tree is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// Admissible and large enough for low-rank approximation
    Compressible,
    /// Admissible but stored dense
    AdmissibleDense,
    /// Not admissible
    Inadmissible,
}

impl BlockKind {
    /// Whether the clusters are well separated
    pub fn is_admissible(self) -> bool {
        !matches!(self, Self::Inadmissible)
    }
}

/// Parameters controlling block tree construction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockTreeOptions {
    /// Admissibility parameter η
    pub eta: f64,
    /// Smallest side length of a compressible block
    pub minimum_block_size: usize,
    /// Largest side length of a leaf block
    pub maximum_block_size: usize,
}

/// Block cluster tree node
#[derive(Debug, Clone)]
pub struct BlockNode {
    /// Test cluster node index
    pub test_cluster: usize,
    /// Trial cluster node index
    pub trial_cluster: usize,
    /// Permuted row range
    pub rows: Range<usize>,
    /// Permuted column range
    pub cols: Range<usize>,
    /// Classification
    pub kind: BlockKind,
    /// Level in the tree (0 = root)
    pub level: usize,
    /// Parent node index (None for root)
    pub parent: Option<usize>,
    /// Children node indices, empty for leaves
    pub children: Vec<usize>,
}

impl BlockNode {
    /// Check if this node is a leaf
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of rows
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns
    pub fn num_cols(&self) -> usize {
        self.cols.len()
    }

    /// Whether the block lies on the diagonal of a symmetric tree
    pub fn is_diagonal(&self) -> bool {
        self.test_cluster == self.trial_cluster
    }
}

/// Block cluster tree
#[derive(Debug, Clone)]
pub struct BlockClusterTree {
    nodes: Vec<BlockNode>,
    leaves: Vec<usize>,
    symmetric: bool,
}

impl BlockClusterTree {
    /// Build the tree for a test and a trial cluster tree
    ///
    /// With `symmetric` set, both trees must be the same object and only the
    /// lower block triangle is generated: diagonal blocks skip their upper
    /// child, off-diagonal leaves stand for themselves and their mirror.
    pub fn build(
        test: &ClusterTree,
        trial: &ClusterTree,
        options: &BlockTreeOptions,
        symmetric: bool,
    ) -> Result<Self> {
        let mut tree = Self {
            nodes: Vec::new(),
            leaves: Vec::new(),
            symmetric,
        };
        let (t, s) = (test.root(), trial.root());
        tree.nodes.push(BlockNode {
            test_cluster: t,
            trial_cluster: s,
            rows: test.node(t).range.clone(),
            cols: trial.node(s).range.clone(),
            kind: BlockKind::Inadmissible,
            level: 0,
            parent: None,
            children: Vec::new(),
        });
        tree.refine(0, test, trial, options);
        Ok(tree)
    }

    fn refine(
        &mut self,
        block: usize,
        test: &ClusterTree,
        trial: &ClusterTree,
        options: &BlockTreeOptions,
    ) {
        let (t, s) = (self.nodes[block].test_cluster, self.nodes[block].trial_cluster);
        let (tau, sigma) = (test.node(t), trial.node(s));
        let (m, n) = (tau.size(), sigma.size());

        let dist = tau.bbox.distance(&sigma.bbox);
        let admissible =
            dist > 0.0 && tau.bbox.diameter().min(sigma.bbox.diameter()) <= options.eta * dist;

        if admissible && m <= options.maximum_block_size && n <= options.maximum_block_size {
            self.nodes[block].kind = if m.min(n) >= options.minimum_block_size {
                BlockKind::Compressible
            } else {
                BlockKind::AdmissibleDense
            };
            self.leaves.push(block);
            return;
        }

        let kind = if admissible {
            BlockKind::AdmissibleDense
        } else {
            BlockKind::Inadmissible
        };
        self.nodes[block].kind = kind;

        let pairs: Vec<(usize, usize)> = match (tau.children, sigma.children) {
            (Some([t0, t1]), Some([s0, s1])) => {
                if self.symmetric && t == s {
                    vec![(t0, s0), (t1, s0), (t1, s1)]
                } else {
                    vec![(t0, s0), (t0, s1), (t1, s0), (t1, s1)]
                }
            }
            (Some([t0, t1]), None) => vec![(t0, s), (t1, s)],
            (None, Some([s0, s1])) => vec![(t, s0), (t, s1)],
            (None, None) => {
                self.leaves.push(block);
                return;
            }
        };

        let level = self.nodes[block].level + 1;
        let mut children = Vec::with_capacity(pairs.len());
        for (ct, cs) in pairs {
            children.push(self.nodes.len());
            self.nodes.push(BlockNode {
                test_cluster: ct,
                trial_cluster: cs,
                rows: test.node(ct).range.clone(),
                cols: trial.node(cs).range.clone(),
                kind,
                level,
                parent: Some(block),
                children: Vec::new(),
            });
        }
        self.nodes[block].children = children.clone();
        for child in children {
            self.refine(child, test, trial, options);
        }
    }

    /// Index of the root block
    pub fn root(&self) -> usize {
        0
    }

    /// Block by index
    pub fn node(&self, index: usize) -> &BlockNode {
        &self.nodes[index]
    }

    /// All blocks in creation order, including removed subtrees after recompression
    pub fn nodes(&self) -> &[BlockNode] {
        &self.nodes
    }

    /// Leaf blocks in depth-first order
    pub fn leaves(&self) -> &[usize] {
        &self.leaves
    }

    /// Number of leaf blocks
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Whether only the lower block triangle is stored
    pub fn is_symmetric(&self) -> bool {
        self.symmetric
    }

    /// Turn an inner block whose children are all leaves into a leaf
    pub(crate) fn collapse_into_leaf(&mut self, block: usize, kind: BlockKind) {
        let children = std::mem::take(&mut self.nodes[block].children);
        let first = self.leaves.iter().position(|l| children.contains(l));
        self.leaves.retain(|l| !children.contains(l));
        match first {
            Some(pos) => self.leaves.insert(pos, block),
            None => self.leaves.push(block),
        }
        self.nodes[block].kind = kind;
    }
}
