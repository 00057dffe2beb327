//! Structural properties of cluster and block cluster trees built from DOF positions

use math_audio_bem_aca::core::assembly::{assemble_hmatrix, prepare_local_assembler};
use math_audio_bem_aca::core::hmatrix::{BlockClusterTree, BlockKind, BlockTreeOptions, ClusterTree};
use math_audio_bem_aca::core::*;
use ndarray::Array2;
use std::sync::Arc;

fn sphere_p1() -> Arc<dyn Space> {
    let grid: Arc<dyn Grid> = Arc::new(icosphere_grid(2.0, 2).unwrap());
    Arc::new(PiecewiseLinearContinuousScalarSpace::new(grid).unwrap())
}

fn sphere_p0() -> Arc<dyn Space> {
    let grid: Arc<dyn Grid> = Arc::new(icosphere_grid(2.0, 2).unwrap());
    Arc::new(PiecewiseConstantScalarSpace::new(grid).unwrap())
}

fn options(min_block: usize) -> BlockTreeOptions {
    BlockTreeOptions {
        eta: 1.2,
        minimum_block_size: min_block,
        maximum_block_size: usize::MAX,
    }
}

/// How often each entry is covered by a leaf (and its mirror when symmetric)
fn coverage(blocks: &BlockClusterTree, rows: usize, cols: usize) -> Array2<u32> {
    let mut count = Array2::zeros((rows, cols));
    for &leaf in blocks.leaves() {
        let node = blocks.node(leaf);
        for i in node.rows.clone() {
            for j in node.cols.clone() {
                count[[i, j]] += 1;
                if blocks.is_symmetric() && !node.is_diagonal() {
                    count[[j, i]] += 1;
                }
            }
        }
    }
    count
}

#[test]
fn test_cluster_tree_of_dof_positions() {
    let space = sphere_p1();
    let points = space.global_dof_positions();
    let tree = ClusterTree::build(&points, 8).unwrap();

    let perm = tree.permutation();
    for i in 0..points.len() {
        assert_eq!(perm.p2o()[perm.o2p()[i]], i);
        assert_eq!(perm.o2p()[perm.p2o()[i]], i);
    }

    let mut next = 0;
    for leaf in tree.leaves() {
        let node = tree.node(leaf);
        assert_eq!(node.range.start, next);
        assert!(node.size() < 8);
        next = node.range.end;
    }
    assert_eq!(next, points.len());

    for node in tree.nodes() {
        for &p in tree.original_indices(node.range.clone()) {
            let q = points[p];
            for axis in 0..3 {
                assert!(q[axis] >= node.bbox.min[axis] && q[axis] <= node.bbox.max[axis]);
            }
        }
        if let Some([a, b]) = node.children {
            assert!(node.bbox.contains_box(&tree.node(a).bbox));
            assert!(node.bbox.contains_box(&tree.node(b).bbox));
            assert_eq!(tree.node(a).range.start, node.range.start);
            assert_eq!(tree.node(a).range.end, tree.node(b).range.start);
            assert_eq!(tree.node(b).range.end, node.range.end);
        }
    }
}

#[test]
fn test_leaves_tile_the_matrix() {
    let test = ClusterTree::build(&sphere_p0().global_dof_positions(), 8).unwrap();
    let trial = ClusterTree::build(&sphere_p1().global_dof_positions(), 8).unwrap();
    let blocks = BlockClusterTree::build(&test, &trial, &options(8), false).unwrap();
    let count = coverage(&blocks, test.num_points(), trial.num_points());
    assert!(count.iter().all(|&c| c == 1));
}

#[test]
fn test_symmetric_leaves_and_mirrors_tile_the_matrix() {
    let tree = ClusterTree::build(&sphere_p1().global_dof_positions(), 8).unwrap();
    let blocks = BlockClusterTree::build(&tree, &tree, &options(8), true).unwrap();
    let n = tree.num_points();
    let count = coverage(&blocks, n, n);
    assert!(count.iter().all(|&c| c == 1));

    let full = BlockClusterTree::build(&tree, &tree, &options(8), false).unwrap();
    assert!(blocks.leaf_count() < full.leaf_count());
}

#[test]
fn test_admissibility_of_leaves() {
    let test = ClusterTree::build(&sphere_p0().global_dof_positions(), 8).unwrap();
    let trial = ClusterTree::build(&sphere_p1().global_dof_positions(), 8).unwrap();
    let opts = options(8);
    let blocks = BlockClusterTree::build(&test, &trial, &opts, false).unwrap();

    let mut compressible = 0;
    for &leaf in blocks.leaves() {
        let node = blocks.node(leaf);
        let tau = &test.node(node.test_cluster).bbox;
        let sigma = &trial.node(node.trial_cluster).bbox;
        let dist = tau.distance(sigma);
        match node.kind {
            BlockKind::Compressible => {
                compressible += 1;
                assert!(dist > 0.0);
                assert!(tau.diameter().min(sigma.diameter()) <= opts.eta * dist);
                assert!(node.num_rows().min(node.num_cols()) >= opts.minimum_block_size);
            }
            BlockKind::AdmissibleDense => {
                assert!(dist > 0.0);
            }
            BlockKind::Inadmissible => {
                assert!(test.node(node.test_cluster).is_leaf() && trial.node(node.trial_cluster).is_leaf());
            }
        }
    }
    assert!(compressible > 0);
}

#[test]
fn test_maximum_block_size_splits_admissible_blocks() {
    let tree = ClusterTree::build(&sphere_p0().global_dof_positions(), 8).unwrap();
    let capped = BlockTreeOptions {
        maximum_block_size: 20,
        ..options(8)
    };
    let blocks = BlockClusterTree::build(&tree, &tree, &capped, false).unwrap();
    for &leaf in blocks.leaves() {
        let node = blocks.node(leaf);
        if node.kind.is_admissible() {
            assert!(node.num_rows() <= 20 && node.num_cols() <= 20);
        }
    }
}

#[test]
fn test_rebuilding_is_deterministic() {
    let space = sphere_p0();
    let kernel: Arc<dyn KernelEvaluator> =
        Arc::new(GreenKernel::new(GreenFunction::Laplace, LayerKind::DoubleLayer).unwrap());
    let aca = AcaOptions::default().with_eps(1e-6);
    let options = AssemblyOptions::aca(aca.clone()).with_verbosity(VerbosityLevel::Low);

    let build = || {
        let assembler =
            prepare_local_assembler::<f64>(space.clone(), space.clone(), kernel.clone(), &options)
                .unwrap();
        assemble_hmatrix(&assembler, &options, &aca).unwrap()
    };
    let first = build();
    let second = build();

    assert_eq!(first.stats(), second.stats());
    let structure = |h: &HMatrix<f64>| {
        h.leaf_blocks()
            .map(|(node, payload)| (node.rows.clone(), node.cols.clone(), node.kind, payload.rank()))
            .collect::<Vec<_>>()
    };
    assert_eq!(structure(&first), structure(&second));
    assert_eq!(first.to_dense(), second.to_dense());
}
