//! Arbitrary sub-blocks of a weak form
//!
//! Rows and columns are DOF indices in either the global or the flat-local
//! numbering. Every requested DOF is expanded into the (element, local
//! function) pairs it is made of; each element pair is integrated once and
//! scattered into all entries it contributes to.

use super::local::LocalAssembler;
use crate::core::error::{AssemblyError, Result};
use crate::core::grid::Point3;
use crate::core::space::{LocalDof, Space};
use math_audio_linalg::ComplexField;
use ndarray::Array2;
use std::collections::BTreeMap;

/// Which DOF numbering a matrix uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DofIndexing {
    /// One index per global basis function
    Global,
    /// One index per (element, local function) pair
    FlatLocal,
}

impl DofIndexing {
    /// Number of DOFs of a space in this numbering
    pub fn dof_count(self, space: &dyn Space) -> usize {
        match self {
            Self::Global => space.global_dof_count(),
            Self::FlatLocal => space.flat_local_dof_count(),
        }
    }

    /// Representative point of every DOF
    pub fn positions(self, space: &dyn Space) -> Vec<Point3> {
        match self {
            Self::Global => space.global_dof_positions(),
            Self::FlatLocal => space.flat_local_dof_positions(),
        }
    }

    fn local_dofs(self, space: &dyn Space, dof: usize) -> Vec<LocalDof> {
        match self {
            Self::Global => space.global_dof_local_dofs(dof).to_vec(),
            Self::FlatLocal => vec![space.flat_local_dof(dof)],
        }
    }
}

/// (row or column position, local function) pairs grouped by element
type ElementGroups = BTreeMap<usize, Vec<(usize, usize)>>;

/// Evaluates weak form entries on demand
#[derive(Debug, Clone, Copy)]
pub struct EntryEvaluator<'a, T: ComplexField> {
    assembler: &'a LocalAssembler<T>,
    indexing: DofIndexing,
}

impl<'a, T: ComplexField> EntryEvaluator<'a, T> {
    /// Wrap an assembler
    pub fn new(assembler: &'a LocalAssembler<T>, indexing: DofIndexing) -> Self {
        Self {
            assembler,
            indexing,
        }
    }

    /// DOF numbering of rows and columns
    pub fn indexing(&self) -> DofIndexing {
        self.indexing
    }

    fn group(&self, space: &dyn Space, dofs: &[usize], what: &str) -> Result<ElementGroups> {
        let count = self.indexing.dof_count(space);
        let mut groups = ElementGroups::new();
        for (position, &dof) in dofs.iter().enumerate() {
            if dof >= count {
                return Err(AssemblyError::InvalidConfiguration(format!(
                    "{what} DOF {dof} is out of range for a space with {count} DOFs"
                )));
            }
            for local in self.indexing.local_dofs(space, dof) {
                groups
                    .entry(local.element)
                    .or_default()
                    .push((position, local.local));
            }
        }
        Ok(groups)
    }

    /// Dense block `A[rows, cols]`
    pub fn evaluate(&self, rows: &[usize], cols: &[usize]) -> Result<Array2<T>> {
        let test_groups = self.group(self.assembler.test_space().as_ref(), rows, "row")?;
        let trial_groups = self.group(self.assembler.trial_space().as_ref(), cols, "column")?;

        let test_elements: Vec<usize> = test_groups.keys().copied().collect();
        let mut locals = vec![Array2::zeros((0, 0)); test_elements.len()];
        let mut result = Array2::zeros((rows.len(), cols.len()));

        for (&trial_element, col_entries) in &trial_groups {
            self.assembler
                .evaluate_test_batch(&test_elements, trial_element, &mut locals)?;
            for (local, row_entries) in locals.iter().zip(test_groups.values()) {
                for &(r, i) in row_entries {
                    for &(c, j) in col_entries {
                        result[[r, c]] += local[[i, j]];
                    }
                }
            }
        }
        Ok(result)
    }
}
