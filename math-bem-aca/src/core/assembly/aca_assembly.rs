//! Hierarchical matrix assembly
//!
//! ```text
//! DOF positions ─► cluster trees ─► block cluster tree
//!                                        │
//!            compressible leaves ◄───────┴───────► dense leaves
//!              partial ACA                         exact entries
//!                   └──────────► HMatrix ◄─────────────┘
//! ```
//!
//! Leaves are assembled in parallel, each into its own payload slot. When the
//! H-matrix is built over flat-local DOFs it is wrapped as
//! `P_test · H · P_trialᵀ` so the result always maps global DOFs.

use super::entries::{DofIndexing, EntryEvaluator};
use super::local::LocalAssembler;
use crate::core::config::{AcaOptions, AssemblyOptions};
use crate::core::error::Result;
use crate::core::hmatrix::{
    AcaOutcome, AcaSettings, BlockClusterTree, BlockData, BlockKind, BlockOracle,
    BlockTreeOptions, ClusterTree, HMatrix, partial_aca, write_postscript,
};
use crate::core::parallel::{try_parallel_map, with_thread_pool};
use crate::core::space::{local_to_global_matrix, same_space};
use math_audio_linalg::{
    ComplexField, ProductOperator, SharedOperator, TransposeMode, TransposedOperator,
};
use std::sync::Arc;
use std::time::Instant;

/// Rows and columns of one leaf, as DOF indices
struct LeafOracle<'a, 'b, T: ComplexField> {
    entries: &'b EntryEvaluator<'a, T>,
    rows: &'b [usize],
    cols: &'b [usize],
}

impl<T: ComplexField> BlockOracle<T> for LeafOracle<'_, '_, T> {
    fn rows(&self) -> usize {
        self.rows.len()
    }

    fn cols(&self) -> usize {
        self.cols.len()
    }

    fn evaluate_row(&self, row: usize, out: &mut [T]) -> Result<()> {
        let values = self.entries.evaluate(&self.rows[row..=row], self.cols)?;
        for (slot, value) in out.iter_mut().zip(values.iter()) {
            *slot = *value;
        }
        Ok(())
    }

    fn evaluate_column(&self, col: usize, out: &mut [T]) -> Result<()> {
        let values = self.entries.evaluate(self.rows, &self.cols[col..=col])?;
        for (slot, value) in out.iter_mut().zip(values.iter()) {
            *slot = *value;
        }
        Ok(())
    }
}

fn assemble_leaf<T: ComplexField>(
    entries: &EntryEvaluator<'_, T>,
    rows: &[usize],
    cols: &[usize],
    kind: BlockKind,
    settings: &AcaSettings,
) -> Result<BlockData<T>> {
    if kind == BlockKind::Compressible {
        let oracle = LeafOracle {
            entries,
            rows,
            cols,
        };
        if let AcaOutcome::LowRank(block) = partial_aca(&oracle, settings)? {
            return Ok(BlockData::LowRank(block));
        }
    }
    Ok(BlockData::Dense(entries.evaluate(rows, cols)?))
}

/// Build the H-matrix of a weak form in the numbering chosen by `aca`
///
/// The matrix is stored symmetrically when test and trial space are the same
/// object and the kernel is symmetric.
pub fn assemble_hmatrix<T: ComplexField>(
    assembler: &LocalAssembler<T>,
    options: &AssemblyOptions,
    aca: &AcaOptions,
) -> Result<HMatrix<T>> {
    aca.validate()?;
    let start = Instant::now();
    let indexing = if aca.global_assembly_before_compression {
        DofIndexing::Global
    } else {
        DofIndexing::FlatLocal
    };
    let test_space = assembler.test_space();
    let trial_space = assembler.trial_space();
    let symmetric = same_space(test_space, trial_space) && assembler.kernel().is_symmetric();

    let test_tree = Arc::new(ClusterTree::build(
        &indexing.positions(test_space.as_ref()),
        aca.minimum_block_size,
    )?);
    let trial_tree = if symmetric {
        Arc::clone(&test_tree)
    } else {
        Arc::new(ClusterTree::build(
            &indexing.positions(trial_space.as_ref()),
            aca.minimum_block_size,
        )?)
    };
    let block_options = BlockTreeOptions {
        eta: aca.eta,
        minimum_block_size: aca.minimum_block_size,
        maximum_block_size: aca.maximum_block_size,
    };
    let blocks = BlockClusterTree::build(&test_tree, &trial_tree, &block_options, symmetric)?;
    if options.verbosity.reports_details() {
        log::debug!(
            "cluster trees: {} test nodes (depth {}), {} trial nodes (depth {}), {} leaf blocks{}",
            test_tree.nodes().len(),
            test_tree.depth(),
            trial_tree.nodes().len(),
            trial_tree.depth(),
            blocks.leaf_count(),
            if symmetric { ", symmetric" } else { "" }
        );
    }

    let entries = EntryEvaluator::new(assembler, indexing);
    let settings = AcaSettings {
        eps: aca.eps,
        max_rank: aca.maximum_rank,
        scaling: aca.scaling,
    };
    let leaves = blocks.leaves().to_vec();
    let payloads = with_thread_pool(&options.parallelization, || {
        try_parallel_map(&leaves, |&leaf| {
            let node = blocks.node(leaf);
            assemble_leaf(
                &entries,
                test_tree.original_indices(node.rows.clone()),
                trial_tree.original_indices(node.cols.clone()),
                node.kind,
                &settings,
            )
        })
    })??;

    let mut hmatrix = HMatrix::new(test_tree, trial_tree, blocks, payloads)?;
    if aca.recompress {
        let merges = hmatrix.recompress(aca.eps, aca.maximum_rank)?;
        if options.verbosity.reports_details() {
            log::debug!("recompression merged {merges} sibling groups");
        }
    }
    if options.verbosity.reports_progress() {
        log::info!(
            "{} ({}) assembled in {:.2?}: {}",
            assembler.kernel().name(),
            match indexing {
                DofIndexing::Global => "global DOFs",
                DofIndexing::FlatLocal => "flat-local DOFs",
            },
            start.elapsed(),
            hmatrix.stats()
        );
    }
    if aca.output_postscript {
        write_postscript(&hmatrix, &aca.output_fname)?;
    }
    Ok(hmatrix)
}

/// Assemble in ACA mode and return an operator on global DOFs
pub fn assemble_aca<T: ComplexField>(
    assembler: &LocalAssembler<T>,
    options: &AssemblyOptions,
    aca: &AcaOptions,
) -> Result<SharedOperator<T>> {
    let hmatrix: SharedOperator<T> = Arc::new(assemble_hmatrix(assembler, options, aca)?);
    if aca.global_assembly_before_compression {
        return Ok(hmatrix);
    }
    let test_map: SharedOperator<T> =
        Arc::new(local_to_global_matrix::<T>(assembler.test_space().as_ref())?);
    let trial_map: SharedOperator<T> =
        Arc::new(local_to_global_matrix::<T>(assembler.trial_space().as_ref())?);
    let trial_map_t: SharedOperator<T> =
        Arc::new(TransposedOperator::new(TransposeMode::Transpose, trial_map));
    let right: SharedOperator<T> = Arc::new(ProductOperator::new(hmatrix, trial_map_t)?);
    Ok(Arc::new(ProductOperator::new(test_map, right)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assembly::dense::assemble_dense;
    use crate::core::config::{AccuracyOptions, VerbosityLevel};
    use crate::core::grid::{Grid, icosphere_grid};
    use crate::core::kernel::{GreenFunction, GreenKernel, KernelEvaluator, LayerKind};
    use crate::core::space::{PiecewiseConstantScalarSpace, PiecewiseLinearContinuousScalarSpace, Space};
    use math_audio_linalg::{LinearOperator, relative_frobenius_error, to_dense};

    fn sphere_assembler(layer: LayerKind) -> LocalAssembler<f64> {
        let grid: Arc<dyn Grid> = Arc::new(icosphere_grid(1.0, 1).unwrap());
        let p1: Arc<dyn Space> =
            Arc::new(PiecewiseLinearContinuousScalarSpace::new(grid.clone()).unwrap());
        let p0: Arc<dyn Space> = Arc::new(PiecewiseConstantScalarSpace::new(grid).unwrap());
        let kernel: Arc<dyn KernelEvaluator> =
            Arc::new(GreenKernel::new(GreenFunction::ModifiedHelmholtz(0.7), layer).unwrap());
        let (test, trial) = match layer {
            LayerKind::SingleLayer => (p1.clone(), p1),
            _ => (p0, p1),
        };
        LocalAssembler::new(test, trial, kernel, AccuracyOptions::default()).unwrap()
    }

    fn tight() -> AcaOptions {
        AcaOptions::default()
            .with_eps(1e-10)
            .with_minimum_block_size(4)
    }

    #[test]
    fn test_hmatrix_matches_dense() {
        let assembler = sphere_assembler(LayerKind::DoubleLayer);
        let options = AssemblyOptions::default().with_verbosity(VerbosityLevel::Low);
        let dense = assemble_dense(&assembler, &options.parallelization).unwrap();
        let hmatrix = assemble_hmatrix(&assembler, &options, &tight()).unwrap();
        assert!(!hmatrix.is_symmetric());
        assert!(hmatrix.stats().leaf_count > 1);
        assert!(relative_frobenius_error(&hmatrix.to_dense(), &dense) < 1e-6);
    }

    #[test]
    fn test_symmetric_storage_for_single_layer() {
        let assembler = sphere_assembler(LayerKind::SingleLayer);
        let options = AssemblyOptions::default().with_verbosity(VerbosityLevel::Low);
        let dense = assemble_dense(&assembler, &options.parallelization).unwrap();
        let hmatrix = assemble_hmatrix(&assembler, &options, &tight()).unwrap();
        assert!(hmatrix.is_symmetric());
        assert!(relative_frobenius_error(&hmatrix.to_dense(), &dense) < 1e-6);
    }

    #[test]
    fn test_flat_local_wrapping() {
        let assembler = sphere_assembler(LayerKind::DoubleLayer);
        let options = AssemblyOptions::default().with_verbosity(VerbosityLevel::Low);
        let dense = assemble_dense(&assembler, &options.parallelization).unwrap();
        let local = tight().with_global_assembly_before_compression(false);
        let op = assemble_aca(&assembler, &options, &local).unwrap();
        assert_eq!(op.num_rows(), dense.nrows());
        assert_eq!(op.num_cols(), dense.ncols());
        assert!(relative_frobenius_error(&to_dense(op.as_ref()), &dense) < 1e-6);
    }

    #[test]
    fn test_recompression_keeps_accuracy() {
        let assembler = sphere_assembler(LayerKind::DoubleLayer);
        let options = AssemblyOptions::default().with_verbosity(VerbosityLevel::Low);
        let dense = assemble_dense(&assembler, &options.parallelization).unwrap();
        let aca = tight().with_recompression(true);
        let hmatrix = assemble_hmatrix(&assembler, &options, &aca).unwrap();
        assert!(relative_frobenius_error(&hmatrix.to_dense(), &dense) < 1e-6);
    }
}
