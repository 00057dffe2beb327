//! Binary cluster tree over DOF positions
//!
//! Each node owns a contiguous range of *permuted* indices and the bounding
//! box of the points in that range. Nodes are stored in a flat arena; node 0
//! is the root and children always have larger indices than their parent.

use crate::core::error::{AssemblyError, Result};
use crate::core::grid::Point3;
use math_audio_linalg::IndexPermutation;
use std::cmp::Ordering;
use std::ops::Range;

/// Depth limit independent of the point geometry
pub const MAX_CLUSTER_DEPTH: usize = 64;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner coordinates
    pub min: Point3,
    /// Maximum corner coordinates
    pub max: Point3,
}

impl BoundingBox {
    /// Create an empty (invalid) bounding box
    pub fn empty() -> Self {
        Self {
            min: [f64::INFINITY; 3],
            max: [f64::NEG_INFINITY; 3],
        }
    }

    /// Smallest box containing all points
    pub fn from_points<'a, I: IntoIterator<Item = &'a Point3>>(points: I) -> Self {
        let mut bbox = Self::empty();
        for p in points {
            bbox.expand(p);
        }
        bbox
    }

    /// Expand the bounding box to include a point
    pub fn expand(&mut self, point: &Point3) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(point[i]);
            self.max[i] = self.max[i].max(point[i]);
        }
    }

    /// Get the center of the bounding box
    pub fn center(&self) -> Point3 {
        [
            0.5 * (self.min[0] + self.max[0]),
            0.5 * (self.min[1] + self.max[1]),
            0.5 * (self.min[2] + self.max[2]),
        ]
    }

    /// Length of the box diagonal
    pub fn diameter(&self) -> f64 {
        let mut sum = 0.0;
        for i in 0..3 {
            let d = (self.max[i] - self.min[i]).max(0.0);
            sum += d * d;
        }
        sum.sqrt()
    }

    /// Axis of greatest extent
    pub fn longest_axis(&self) -> usize {
        let extent = |i: usize| self.max[i] - self.min[i];
        let mut axis = 0;
        for i in 1..3 {
            if extent(i) > extent(axis) {
                axis = i;
            }
        }
        axis
    }

    /// Minimum Euclidean distance between two boxes, zero when they touch or overlap
    pub fn distance(&self, other: &BoundingBox) -> f64 {
        let mut sum = 0.0;
        for i in 0..3 {
            let gap = (other.min[i] - self.max[i]).max(self.min[i] - other.max[i]);
            if gap > 0.0 {
                sum += gap * gap;
            }
        }
        sum.sqrt()
    }

    /// Check if another box lies inside this one
    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        (0..3).all(|i| self.min[i] <= other.min[i] && other.max[i] <= self.max[i])
    }
}

/// Cluster tree node
#[derive(Debug, Clone)]
pub struct ClusterNode {
    /// Permuted index range
    pub range: Range<usize>,
    /// Bounding box of the points in the range
    pub bbox: BoundingBox,
    /// Level in the tree (0 = root)
    pub level: usize,
    /// Parent node index (None for root)
    pub parent: Option<usize>,
    /// Children node indices (None if leaf)
    pub children: Option<[usize; 2]>,
}

impl ClusterNode {
    /// Check if this node is a leaf
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Number of indices in the node
    pub fn size(&self) -> usize {
        self.range.len()
    }
}

/// Cluster tree and the permutation it induces
#[derive(Debug, Clone)]
pub struct ClusterTree {
    nodes: Vec<ClusterNode>,
    permutation: IndexPermutation,
    min_block_size: usize,
}

impl ClusterTree {
    /// Build a tree by recursive median bisection along the longest box axis
    ///
    /// A node becomes a leaf when it holds fewer than `min_block_size` points,
    /// fewer than two points, or sits at [`MAX_CLUSTER_DEPTH`].
    pub fn build(points: &[Point3], min_block_size: usize) -> Result<Self> {
        if points.is_empty() {
            return Err(AssemblyError::EmptyInput(
                "cluster tree needs at least one point".to_string(),
            ));
        }
        if let Some(index) = points
            .iter()
            .position(|p| p.iter().any(|c| !c.is_finite()))
        {
            return Err(AssemblyError::NonFiniteCoordinate { index });
        }

        let mut order: Vec<usize> = (0..points.len()).collect();
        let mut tree = Self {
            nodes: Vec::new(),
            permutation: IndexPermutation::identity(0),
            min_block_size: min_block_size.max(1),
        };
        tree.nodes.push(ClusterNode {
            range: 0..points.len(),
            bbox: BoundingBox::from_points(points),
            level: 0,
            parent: None,
            children: None,
        });
        tree.subdivide(0, points, &mut order);
        tree.permutation = IndexPermutation::from_p2o(order)?;
        Ok(tree)
    }

    fn subdivide(&mut self, node_idx: usize, points: &[Point3], order: &mut [usize]) {
        let node = &self.nodes[node_idx];
        let size = node.size();
        if size < self.min_block_size || size < 2 || node.level >= MAX_CLUSTER_DEPTH {
            return;
        }
        let range = node.range.clone();
        let level = node.level;
        let axis = node.bbox.longest_axis();

        // coincident coordinates fall back to the original index
        order[range.clone()].sort_unstable_by(|&a, &b| {
            points[a][axis]
                .partial_cmp(&points[b][axis])
                .unwrap_or(Ordering::Equal)
                .then(a.cmp(&b))
        });
        let mid = range.start + size / 2;

        let mut child_indices = [0usize; 2];
        for (slot, child_range) in [range.start..mid, mid..range.end].into_iter().enumerate() {
            let bbox = BoundingBox::from_points(order[child_range.clone()].iter().map(|&i| &points[i]));
            child_indices[slot] = self.nodes.len();
            self.nodes.push(ClusterNode {
                range: child_range,
                bbox,
                level: level + 1,
                parent: Some(node_idx),
                children: None,
            });
        }
        self.nodes[node_idx].children = Some(child_indices);

        for &child in &child_indices {
            self.subdivide(child, points, order);
        }
    }

    /// Index of the root node
    pub fn root(&self) -> usize {
        0
    }

    /// Node by index
    pub fn node(&self, index: usize) -> &ClusterNode {
        &self.nodes[index]
    }

    /// All nodes in creation order
    pub fn nodes(&self) -> &[ClusterNode] {
        &self.nodes
    }

    /// Number of clustered points
    pub fn num_points(&self) -> usize {
        self.permutation.len()
    }

    /// Natural/clustered index maps
    pub fn permutation(&self) -> &IndexPermutation {
        &self.permutation
    }

    /// Original indices of a permuted range
    pub fn original_indices(&self, range: Range<usize>) -> &[usize] {
        &self.permutation.p2o()[range]
    }

    /// Leaf block size used during construction
    pub fn min_block_size(&self) -> usize {
        self.min_block_size
    }

    /// Get indices of all leaf nodes, ordered by range start
    pub fn leaves(&self) -> Vec<usize> {
        let mut leaves: Vec<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_leaf())
            .map(|(i, _)| i)
            .collect();
        leaves.sort_by_key(|&i| self.nodes[i].range.start);
        leaves
    }

    /// Number of levels
    pub fn depth(&self) -> usize {
        self.nodes.iter().map(|n| n.level).max().unwrap_or(0) + 1
    }
}
