//! Mass matrices `M_ij = ∫ φ_i ψ_j`

use crate::core::error::{AssemblyError, Result};
use crate::core::quadrature::triangle_quadrature;
use crate::core::space::{Space, same_grid};
use math_audio_linalg::{ComplexField, CsrMatrix};
use num_complex::Complex64;

/// Exact for products of two linear functions
const MASS_QUADRATURE_ORDER: usize = 3;

/// Assemble the mass matrix of two spaces on one grid in global numbering
pub fn assemble_mass_matrix<T: ComplexField>(
    test_space: &dyn Space,
    trial_space: &dyn Space,
) -> Result<CsrMatrix<T>> {
    if !same_grid(test_space, trial_space) {
        return Err(AssemblyError::IncompatibleSpaces(format!(
            "identity operator between {} and {} on different grids",
            test_space.name(),
            trial_space.name()
        )));
    }
    let grid = test_space.grid();
    let rule = triangle_quadrature(MASS_QUADRATURE_ORDER)?;
    let test_shapes = test_space.shape_set();
    let trial_shapes = trial_space.shape_set();
    let (nt, ns) = (test_shapes.size(), trial_shapes.size());

    let mut triplets = Vec::with_capacity(grid.element_count() * nt * ns);
    for element in 0..grid.element_count() {
        let jacobian = grid.element_geometry(element).integration_element;
        let mut local = [[0.0f64; 3]; 3];
        for p in &rule {
            let phi = test_shapes.evaluate(p.s, p.t);
            let psi = trial_shapes.evaluate(p.s, p.t);
            for i in 0..nt {
                for j in 0..ns {
                    local[i][j] += p.weight * phi[i] * psi[j] * jacobian;
                }
            }
        }
        let test_dofs = test_space.element_global_dofs(element);
        let trial_dofs = trial_space.element_global_dofs(element);
        for (i, &gi) in test_dofs.iter().enumerate() {
            for (j, &gj) in trial_dofs.iter().enumerate() {
                triplets.push((gi, gj, T::from_c64(Complex64::new(local[i][j], 0.0))));
            }
        }
    }

    Ok(CsrMatrix::from_triplets(
        test_space.global_dof_count(),
        trial_space.global_dof_count(),
        triplets,
    )?)
}
