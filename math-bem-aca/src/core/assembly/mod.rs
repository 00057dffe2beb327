//! Weak-form assembly
//!
//! ## Module Organization
//!
//! - [`local`] - Element-pair integrals with regular and singular quadrature
//! - [`entries`] - Arbitrary sub-blocks in global or flat-local numbering
//! - [`dense`] - Full matrix assembly
//! - [`aca_assembly`] - Hierarchical matrix assembly
//! - [`identity`] - Sparse mass matrices
//!
//! [`assemble_weak_form`] is the single entry point used by boundary
//! operators: it validates the options, optionally precomputes the singular
//! integrals and dispatches on [`AssemblyMode`].

pub mod aca_assembly;
pub mod dense;
pub mod entries;
pub mod identity;
pub mod local;

pub use aca_assembly::{assemble_aca, assemble_hmatrix};
pub use dense::assemble_dense;
pub use entries::{DofIndexing, EntryEvaluator};
pub use identity::assemble_mass_matrix;
pub use local::LocalAssembler;

use crate::core::config::{AssemblyMode, AssemblyOptions};
use crate::core::error::Result;
use crate::core::kernel::KernelEvaluator;
use crate::core::parallel::with_thread_pool;
use crate::core::space::Space;
use math_audio_linalg::{ComplexField, DenseOperator, SharedOperator};
use std::sync::Arc;
use std::time::Instant;

/// Build a [`LocalAssembler`] and fill its singular-integral cache if enabled
pub fn prepare_local_assembler<T: ComplexField>(
    test_space: Arc<dyn Space>,
    trial_space: Arc<dyn Space>,
    kernel: Arc<dyn KernelEvaluator>,
    options: &AssemblyOptions,
) -> Result<LocalAssembler<T>> {
    let mut assembler = LocalAssembler::new(test_space, trial_space, kernel, options.accuracy)?;
    if options.singular_integral_caching {
        let cached = with_thread_pool(&options.parallelization, || {
            assembler.precompute_singular_integrals()
        })??;
        if options.verbosity.reports_details() {
            log::debug!("{cached} singular element pairs cached");
        }
    }
    Ok(assembler)
}

/// Assemble the weak form of `kernel` between two spaces on global DOFs
pub fn assemble_weak_form<T: ComplexField>(
    test_space: Arc<dyn Space>,
    trial_space: Arc<dyn Space>,
    kernel: Arc<dyn KernelEvaluator>,
    options: &AssemblyOptions,
) -> Result<SharedOperator<T>> {
    options.validate()?;
    let assembler = prepare_local_assembler(test_space, trial_space, kernel, options)?;
    match &options.mode {
        AssemblyMode::Dense => {
            let start = Instant::now();
            let matrix = assemble_dense(&assembler, &options.parallelization)?;
            if options.verbosity.reports_progress() {
                log::info!(
                    "{} assembled densely ({}x{}) in {:.2?}",
                    assembler.kernel().name(),
                    matrix.nrows(),
                    matrix.ncols(),
                    start.elapsed()
                );
            }
            Ok(Arc::new(DenseOperator::new(matrix)))
        }
        AssemblyMode::Aca(aca) => assemble_aca(&assembler, options, aca),
    }
}

/// Assemble the identity (mass) operator, sparse or dense per the options
pub fn assemble_identity<T: ComplexField>(
    test_space: &dyn Space,
    trial_space: &dyn Space,
    options: &AssemblyOptions,
) -> Result<SharedOperator<T>> {
    let mass = assemble_mass_matrix::<T>(test_space, trial_space)?;
    if options.verbosity.reports_details() {
        log::debug!(
            "mass matrix {}x{} with {} non-zeros",
            test_space.global_dof_count(),
            trial_space.global_dof_count(),
            mass.nnz()
        );
    }
    if options.sparse_storage_of_mass_matrices {
        Ok(Arc::new(mass))
    } else {
        Ok(Arc::new(DenseOperator::new(mass.to_dense())))
    }
}
