//! Dense weak-form assembly
//!
//! Test elements are processed in chunks. Within a chunk every test element
//! is integrated against all trial elements in parallel, then the chunk's
//! local matrices are scattered into the global matrix on the calling thread
//! before the next chunk starts.

use super::local::LocalAssembler;
use crate::core::config::ParallelizationOptions;
use crate::core::error::Result;
use crate::core::parallel::{try_parallel_map, with_thread_pool};
use math_audio_linalg::ComplexField;
use ndarray::Array2;

/// Test elements whose local matrices are held at once
const TEST_ELEMENT_CHUNK: usize = 64;

/// Assemble the full `test dofs × trial dofs` matrix in global numbering
pub fn assemble_dense<T: ComplexField>(
    assembler: &LocalAssembler<T>,
    parallelization: &ParallelizationOptions,
) -> Result<Array2<T>> {
    let test_space = assembler.test_space();
    let trial_space = assembler.trial_space();
    let test_elements: Vec<usize> = (0..test_space.grid().element_count()).collect();
    let trial_elements: Vec<usize> = (0..trial_space.grid().element_count()).collect();

    let matrix = with_thread_pool(parallelization, || -> Result<Array2<T>> {
        let mut matrix =
            Array2::zeros((test_space.global_dof_count(), trial_space.global_dof_count()));
        for chunk in test_elements.chunks(TEST_ELEMENT_CHUNK) {
            let rows_of_locals = try_parallel_map(chunk, |&e| {
                let mut locals = vec![Array2::zeros((0, 0)); trial_elements.len()];
                assembler.evaluate_trial_batch(e, &trial_elements, &mut locals)?;
                Ok(locals)
            })?;
            for (&e, locals) in chunk.iter().zip(&rows_of_locals) {
                let test_dofs = test_space.element_global_dofs(e);
                for (f, local) in locals.iter().enumerate() {
                    let trial_dofs = trial_space.element_global_dofs(f);
                    for (i, &gi) in test_dofs.iter().enumerate() {
                        for (j, &gj) in trial_dofs.iter().enumerate() {
                            matrix[[gi, gj]] += local[[i, j]];
                        }
                    }
                }
            }
        }
        Ok(matrix)
    })??;

    log::debug!(
        "dense assembly of {}x{} matrix from {} element pairs",
        matrix.nrows(),
        matrix.ncols(),
        test_elements.len() * trial_elements.len()
    );
    Ok(matrix)
}
