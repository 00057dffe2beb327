//! Hierarchical matrix as a linear operator
//!
//! Leaf payloads live in clustered (permuted) index space. Applying the
//! operator permutes the input, accumulates every leaf into the permuted
//! output and permutes back. In symmetric mode off-diagonal leaves also
//! contribute their transpose at the mirrored position.

use super::aca::{AcaOutcome, AcaSettings, BlockOracle, partial_aca};
use super::block_tree::{BlockClusterTree, BlockKind, BlockNode};
use super::blocks::{BlockData, LowRankBlock};
use super::cluster::ClusterTree;
use crate::core::error::{AssemblyError, Result};
use math_audio_linalg::{ComplexField, LinearOperator, TransposeMode};
use ndarray::{Array1, Array2, s};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// Storage summary of a hierarchical matrix
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct HMatrixStats {
    /// Number of rows
    pub rows: usize,
    /// Number of columns
    pub cols: usize,
    /// Total number of leaf blocks
    pub leaf_count: usize,
    /// Leaves stored as low-rank factors
    pub low_rank_leaves: usize,
    /// Leaves stored dense
    pub dense_leaves: usize,
    /// Largest rank of a low-rank leaf
    pub max_rank: usize,
    /// Mean rank of the low-rank leaves
    pub mean_rank: f64,
    /// Scalars held by all payloads
    pub stored_entries: usize,
    /// Stored entries divided by `rows · cols`
    pub compression_ratio: f64,
}

impl fmt::Display for HMatrixStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} H-matrix: {} leaves ({} low-rank, {} dense), max rank {}, mean rank {:.1}, {} entries stored ({:.1}% of dense)",
            self.rows,
            self.cols,
            self.leaf_count,
            self.low_rank_leaves,
            self.dense_leaves,
            self.max_rank,
            self.mean_rank,
            self.stored_entries,
            100.0 * self.compression_ratio
        )
    }
}

/// Hierarchical matrix over a test and a trial cluster tree
#[derive(Debug, Clone)]
pub struct HMatrix<T: ComplexField> {
    test_tree: Arc<ClusterTree>,
    trial_tree: Arc<ClusterTree>,
    blocks: BlockClusterTree,
    payloads: Vec<Option<BlockData<T>>>,
}

impl<T: ComplexField> HMatrix<T> {
    /// Assemble from the trees and one payload per leaf, in the order of
    /// [`BlockClusterTree::leaves`]
    pub fn new(
        test_tree: Arc<ClusterTree>,
        trial_tree: Arc<ClusterTree>,
        blocks: BlockClusterTree,
        leaf_payloads: Vec<BlockData<T>>,
    ) -> Result<Self> {
        if leaf_payloads.len() != blocks.leaf_count() {
            return Err(AssemblyError::SizeMismatch {
                context: "H-matrix leaf payloads",
                expected: blocks.leaf_count(),
                found: leaf_payloads.len(),
            });
        }
        if blocks.is_symmetric() && !Arc::ptr_eq(&test_tree, &trial_tree) {
            return Err(AssemblyError::InvalidConfiguration(
                "symmetric H-matrix needs a shared cluster tree".to_string(),
            ));
        }
        let mut payloads = vec![None; blocks.nodes().len()];
        for (&leaf, payload) in blocks.leaves().iter().zip(leaf_payloads) {
            let node = blocks.node(leaf);
            if payload.num_rows() != node.num_rows() {
                return Err(AssemblyError::SizeMismatch {
                    context: "H-matrix block rows",
                    expected: node.num_rows(),
                    found: payload.num_rows(),
                });
            }
            if payload.num_cols() != node.num_cols() {
                return Err(AssemblyError::SizeMismatch {
                    context: "H-matrix block columns",
                    expected: node.num_cols(),
                    found: payload.num_cols(),
                });
            }
            payloads[leaf] = Some(payload);
        }
        Ok(Self {
            test_tree,
            trial_tree,
            blocks,
            payloads,
        })
    }

    /// Test (row) cluster tree
    pub fn test_tree(&self) -> &ClusterTree {
        &self.test_tree
    }

    /// Trial (column) cluster tree
    pub fn trial_tree(&self) -> &ClusterTree {
        &self.trial_tree
    }

    /// Block structure
    pub fn block_tree(&self) -> &BlockClusterTree {
        &self.blocks
    }

    /// Whether the upper block triangle is implied by symmetry
    pub fn is_symmetric(&self) -> bool {
        self.blocks.is_symmetric()
    }

    /// Leaf blocks with their payloads
    pub fn leaf_blocks(&self) -> impl Iterator<Item = (&BlockNode, &BlockData<T>)> + '_ {
        self.blocks.leaves().iter().filter_map(move |&leaf| {
            self.payloads[leaf]
                .as_ref()
                .map(|payload| (self.blocks.node(leaf), payload))
        })
    }

    /// Apply in clustered index space: `y_p += op(A_p) x_p`
    fn apply_permuted(&self, mode: TransposeMode, x: &Array1<T>, y: &mut Array1<T>) {
        for (node, payload) in self.leaf_blocks() {
            apply_block(payload, mode, &node.rows, &node.cols, x, y);
            if self.blocks.is_symmetric() && !node.is_diagonal() {
                apply_block(payload, mode.flip_transpose(), &node.rows, &node.cols, x, y);
            }
        }
    }

    /// Materialize the matrix in natural DOF order
    pub fn to_dense(&self) -> Array2<T> {
        let row_p2o = self.test_tree.permutation().p2o();
        let col_p2o = self.trial_tree.permutation().p2o();
        let mut dense = Array2::zeros((self.num_rows(), self.num_cols()));
        for (node, payload) in self.leaf_blocks() {
            let block = payload.to_dense();
            for (bi, p) in node.rows.clone().enumerate() {
                for (bj, q) in node.cols.clone().enumerate() {
                    let value = block[[bi, bj]];
                    dense[[row_p2o[p], col_p2o[q]]] = value;
                    if self.blocks.is_symmetric() && !node.is_diagonal() {
                        dense[[col_p2o[q], row_p2o[p]]] = value;
                    }
                }
            }
        }
        dense
    }

    /// Storage summary
    pub fn stats(&self) -> HMatrixStats {
        let mut stats = HMatrixStats {
            rows: self.num_rows(),
            cols: self.num_cols(),
            leaf_count: 0,
            low_rank_leaves: 0,
            dense_leaves: 0,
            max_rank: 0,
            mean_rank: 0.0,
            stored_entries: 0,
            compression_ratio: 0.0,
        };
        let mut rank_sum = 0;
        for (_, payload) in self.leaf_blocks() {
            stats.leaf_count += 1;
            stats.stored_entries += payload.stored_entries();
            match payload.rank() {
                Some(rank) => {
                    stats.low_rank_leaves += 1;
                    stats.max_rank = stats.max_rank.max(rank);
                    rank_sum += rank;
                }
                None => stats.dense_leaves += 1,
            }
        }
        if stats.low_rank_leaves > 0 {
            stats.mean_rank = rank_sum as f64 / stats.low_rank_leaves as f64;
        }
        let full = (stats.rows * stats.cols).max(1);
        stats.compression_ratio = stats.stored_entries as f64 / full as f64;
        stats
    }

    /// Merge sibling low-rank leaves into their parent where this saves storage
    ///
    /// Visits inner blocks bottom-up. A block whose children are all low-rank
    /// leaves is recompressed by ACA on the stacked factors; the result
    /// replaces the children when its rank does not exceed the sum of the
    /// children's ranks and it stores no more entries than they do. Diagonal
    /// blocks of a symmetric matrix are left alone. Returns the number of
    /// merges.
    pub fn recompress(&mut self, eps: f64, max_rank: usize) -> Result<usize> {
        let mut merges = 0;
        for block in (0..self.blocks.nodes().len()).rev() {
            let node = self.blocks.node(block);
            if node.is_leaf() || (self.blocks.is_symmetric() && node.is_diagonal()) {
                continue;
            }
            let mut parts = Vec::with_capacity(node.children.len());
            for &child in &node.children {
                let child_node = self.blocks.node(child);
                match (child_node.is_leaf(), &self.payloads[child]) {
                    (true, Some(BlockData::LowRank(lr))) => parts.push((
                        child_node.rows.start - node.rows.start,
                        child_node.cols.start - node.cols.start,
                        lr,
                    )),
                    _ => break,
                }
            }
            if parts.len() != node.children.len() {
                continue;
            }

            let rank_sum: usize = parts.iter().map(|(_, _, lr)| lr.rank()).sum();
            let stored: usize = parts.iter().map(|(_, _, lr)| lr.u.len() + lr.v.len()).sum();
            let oracle = StackedLowRank {
                rows: node.num_rows(),
                cols: node.num_cols(),
                parts,
            };
            let settings = AcaSettings {
                eps,
                max_rank: rank_sum.min(max_rank).max(1),
                scaling: 1.0,
            };
            let AcaOutcome::LowRank(merged) = partial_aca(&oracle, &settings)? else {
                continue;
            };
            if merged.rank() > rank_sum || merged.u.len() + merged.v.len() > stored {
                continue;
            }

            let children = node.children.clone();
            for child in children {
                self.payloads[child] = None;
            }
            self.payloads[block] = Some(BlockData::LowRank(merged));
            self.blocks.collapse_into_leaf(block, BlockKind::Compressible);
            merges += 1;
        }
        if merges > 0 {
            log::debug!("recompression merged {merges} blocks");
        }
        Ok(merges)
    }
}

/// `y[rows] += op(B) x[cols]`, or `y[cols] += op(B) x[rows]` for transposed modes
fn apply_block<T: ComplexField>(
    payload: &BlockData<T>,
    mode: TransposeMode,
    rows: &Range<usize>,
    cols: &Range<usize>,
    x: &Array1<T>,
    y: &mut Array1<T>,
) {
    let (input, output) = if mode.is_transposed() {
        (rows, cols)
    } else {
        (cols, rows)
    };
    payload.apply_add(
        mode,
        x.slice(s![input.clone()]),
        y.slice_mut(s![output.clone()]),
    );
}

impl<T: ComplexField> LinearOperator<T> for HMatrix<T> {
    fn num_rows(&self) -> usize {
        self.test_tree.num_points()
    }

    fn num_cols(&self) -> usize {
        self.trial_tree.num_points()
    }

    fn apply(&self, x: &Array1<T>) -> Array1<T> {
        self.apply_mode(TransposeMode::NoTranspose, x)
    }

    fn apply_transpose(&self, x: &Array1<T>) -> Array1<T> {
        self.apply_mode(TransposeMode::Transpose, x)
    }

    fn apply_hermitian(&self, x: &Array1<T>) -> Array1<T> {
        self.apply_mode(TransposeMode::ConjugateTranspose, x)
    }

    fn apply_conjugate(&self, x: &Array1<T>) -> Array1<T> {
        self.apply_mode(TransposeMode::Conjugate, x)
    }

    fn apply_mode(&self, mode: TransposeMode, x: &Array1<T>) -> Array1<T> {
        let (input, output) = if mode.is_transposed() {
            (&self.test_tree, &self.trial_tree)
        } else {
            (&self.trial_tree, &self.test_tree)
        };
        let in_p2o = input.permutation().p2o();
        let out_o2p = output.permutation().o2p();

        let x_p = Array1::from_shape_fn(in_p2o.len(), |p| x[in_p2o[p]]);
        let mut y_p = Array1::zeros(out_o2p.len());
        self.apply_permuted(mode, &x_p, &mut y_p);
        Array1::from_shape_fn(out_o2p.len(), |o| y_p[out_o2p[o]])
    }
}

/// Row/column oracle over low-rank children of one block
struct StackedLowRank<'a, T: ComplexField> {
    rows: usize,
    cols: usize,
    /// (row offset, column offset, factors)
    parts: Vec<(usize, usize, &'a LowRankBlock<T>)>,
}

impl<T: ComplexField> BlockOracle<T> for StackedLowRank<'_, T> {
    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    fn evaluate_row(&self, row: usize, out: &mut [T]) -> Result<()> {
        out.fill(T::zero());
        for &(r0, c0, lr) in &self.parts {
            if (r0..r0 + lr.u.nrows()).contains(&row) {
                for j in 0..lr.v.nrows() {
                    out[c0 + j] += lr.entry(row - r0, j);
                }
            }
        }
        Ok(())
    }

    fn evaluate_column(&self, col: usize, out: &mut [T]) -> Result<()> {
        out.fill(T::zero());
        for &(r0, c0, lr) in &self.parts {
            if (c0..c0 + lr.v.nrows()).contains(&col) {
                for i in 0..lr.u.nrows() {
                    out[r0 + i] += lr.entry(i, col - c0);
                }
            }
        }
        Ok(())
    }
}
