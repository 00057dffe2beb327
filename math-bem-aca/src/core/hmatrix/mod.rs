//! Hierarchical matrices
//!
//! ## Module Organization
//!
//! - [`cluster`] - Binary cluster trees over DOF positions
//! - [`block_tree`] - Admissibility-driven pairing of test and trial clusters
//! - [`aca`] - Partial-pivot adaptive cross approximation
//! - [`blocks`] - Dense and low-rank leaf payloads
//! - [`operator`] - The assembled matrix as a [`LinearOperator`](math_audio_linalg::LinearOperator)
//! - [`postscript`] - Block structure diagnostics

pub mod aca;
pub mod block_tree;
pub mod blocks;
pub mod cluster;
pub mod operator;
pub mod postscript;

pub use aca::{AcaOutcome, AcaSettings, BlockOracle, partial_aca};
pub use block_tree::{BlockClusterTree, BlockKind, BlockNode, BlockTreeOptions};
pub use blocks::{BlockData, LowRankBlock};
pub use cluster::{BoundingBox, ClusterNode, ClusterTree, MAX_CLUSTER_DEPTH};
pub use operator::{HMatrix, HMatrixStats};
pub use postscript::write_postscript;
