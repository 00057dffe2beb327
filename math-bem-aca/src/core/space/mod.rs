//! Scalar function spaces on triangle grids
//!
//! A space maps every element to a local shape set and every local basis
//! function to a global DOF. Assembly also uses a *flat-local* numbering with
//! one index per (element, local function) pair, which is what the
//! hierarchical matrix clusters when global assembly before compression is
//! disabled.

mod piecewise_constant;
mod piecewise_linear;

pub use piecewise_constant::PiecewiseConstantScalarSpace;
pub use piecewise_linear::PiecewiseLinearContinuousScalarSpace;

use crate::core::grid::{Grid, Point3};
use math_audio_linalg::{ComplexField, CsrMatrix};
use std::fmt::Debug;
use std::sync::Arc;

/// Local basis on the reference triangle `{s, t >= 0, s + t <= 1}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeSet {
    /// Single constant function
    Constant,
    /// Hat functions `1 - s - t`, `s`, `t` attached to the element corners
    Linear,
}

impl ShapeSet {
    /// Number of local functions
    pub fn size(self) -> usize {
        match self {
            Self::Constant => 1,
            Self::Linear => 3,
        }
    }

    /// Evaluate all local functions at `(s, t)`
    #[inline]
    pub fn evaluate(self, s: f64, t: f64) -> [f64; 3] {
        match self {
            Self::Constant => [1.0, 0.0, 0.0],
            Self::Linear => [1.0 - s - t, s, t],
        }
    }
}

/// One local basis function of one element
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalDof {
    /// Element index
    pub element: usize,
    /// Local function index within the element's shape set
    pub local: usize,
}

/// Read-only access to a discrete function space
pub trait Space: Send + Sync + Debug {
    /// Grid the space lives on
    fn grid(&self) -> &Arc<dyn Grid>;

    /// Local basis used on every element
    fn shape_set(&self) -> ShapeSet;

    /// Number of global DOFs
    fn global_dof_count(&self) -> usize;

    /// Global DOF of each local function of an element
    fn element_global_dofs(&self, element: usize) -> &[usize];

    /// Local functions that contribute to a global DOF
    fn global_dof_local_dofs(&self, dof: usize) -> &[LocalDof];

    /// Representative point of each global DOF
    fn global_dof_positions(&self) -> Vec<Point3>;

    /// Representative point of each flat-local DOF
    fn flat_local_dof_positions(&self) -> Vec<Point3>;

    /// Short name used in log messages
    fn name(&self) -> &'static str;

    /// Number of local functions per element
    fn local_dof_count(&self) -> usize {
        self.shape_set().size()
    }

    /// Number of flat-local DOFs
    fn flat_local_dof_count(&self) -> usize {
        self.grid().element_count() * self.local_dof_count()
    }

    /// Flat-local index of a local function
    fn flat_local_index(&self, dof: LocalDof) -> usize {
        dof.element * self.local_dof_count() + dof.local
    }

    /// Local function behind a flat-local index
    fn flat_local_dof(&self, flat: usize) -> LocalDof {
        let n = self.local_dof_count();
        LocalDof {
            element: flat / n,
            local: flat % n,
        }
    }
}

/// Whether two spaces are defined on the same grid object
pub fn same_grid(a: &dyn Space, b: &dyn Space) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a.grid()), Arc::as_ptr(b.grid()))
}

/// Whether two space handles refer to the same object
pub fn same_space(a: &Arc<dyn Space>, b: &Arc<dyn Space>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// 0/1 matrix summing flat-local DOFs into global DOFs
///
/// Row `g`, column `f` is one when flat-local DOF `f` belongs to global DOF `g`,
/// so a flat-local weak form `A_loc` becomes `P_test · A_loc · P_trialᵀ`.
pub fn local_to_global_matrix<T: ComplexField>(
    space: &dyn Space,
) -> math_audio_linalg::error::Result<CsrMatrix<T>> {
    let mut triplets = Vec::with_capacity(space.flat_local_dof_count());
    for element in 0..space.grid().element_count() {
        for (local, &global) in space.element_global_dofs(element).iter().enumerate() {
            let flat = space.flat_local_index(LocalDof { element, local });
            triplets.push((global, flat, T::one()));
        }
    }
    CsrMatrix::from_triplets(
        space.global_dof_count(),
        space.flat_local_dof_count(),
        triplets,
    )
}
