//! Piecewise constant space: one DOF per element

use super::{LocalDof, ShapeSet, Space};
use crate::core::error::{AssemblyError, Result};
use crate::core::grid::{Grid, Point3};
use std::sync::Arc;

/// Discontinuous space of functions constant on each element
#[derive(Debug)]
pub struct PiecewiseConstantScalarSpace {
    grid: Arc<dyn Grid>,
    element_dofs: Vec<[usize; 1]>,
    dof_local: Vec<[LocalDof; 1]>,
}

impl PiecewiseConstantScalarSpace {
    /// Create the space on a grid
    pub fn new(grid: Arc<dyn Grid>) -> Result<Self> {
        let n = grid.element_count();
        if n == 0 {
            return Err(AssemblyError::EmptyInput(
                "piecewise constant space on a grid without elements".to_string(),
            ));
        }
        Ok(Self {
            grid,
            element_dofs: (0..n).map(|e| [e]).collect(),
            dof_local: (0..n)
                .map(|element| [LocalDof { element, local: 0 }])
                .collect(),
        })
    }
}

impl Space for PiecewiseConstantScalarSpace {
    fn grid(&self) -> &Arc<dyn Grid> {
        &self.grid
    }

    fn shape_set(&self) -> ShapeSet {
        ShapeSet::Constant
    }

    fn global_dof_count(&self) -> usize {
        self.element_dofs.len()
    }

    fn element_global_dofs(&self, element: usize) -> &[usize] {
        &self.element_dofs[element]
    }

    fn global_dof_local_dofs(&self, dof: usize) -> &[LocalDof] {
        &self.dof_local[dof]
    }

    fn global_dof_positions(&self) -> Vec<Point3> {
        (0..self.grid.element_count())
            .map(|e| self.grid.element_geometry(e).center)
            .collect()
    }

    fn flat_local_dof_positions(&self) -> Vec<Point3> {
        self.global_dof_positions()
    }

    fn name(&self) -> &'static str {
        "P0"
    }
}
