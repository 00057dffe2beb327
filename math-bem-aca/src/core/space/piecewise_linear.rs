//! Continuous piecewise linear space: one DOF per vertex

use super::{LocalDof, ShapeSet, Space};
use crate::core::error::{AssemblyError, Result};
use crate::core::grid::{Grid, Point3};
use std::sync::Arc;

/// Continuous space of functions linear on each element
///
/// Every grid vertex carries one hat function; local function `i` of an
/// element is attached to its `i`-th corner.
#[derive(Debug)]
pub struct PiecewiseLinearContinuousScalarSpace {
    grid: Arc<dyn Grid>,
    element_dofs: Vec<[usize; 3]>,
    dof_local: Vec<Vec<LocalDof>>,
}

impl PiecewiseLinearContinuousScalarSpace {
    /// Create the space on a grid
    ///
    /// Vertices that belong to no element would yield functions with empty
    /// support, so such grids are rejected.
    pub fn new(grid: Arc<dyn Grid>) -> Result<Self> {
        if grid.element_count() == 0 {
            return Err(AssemblyError::EmptyInput(
                "piecewise linear space on a grid without elements".to_string(),
            ));
        }
        let mut dof_local = vec![Vec::new(); grid.vertex_count()];
        let mut element_dofs = Vec::with_capacity(grid.element_count());
        for element in 0..grid.element_count() {
            let vertices = grid.element_vertices(element);
            for (local, &v) in vertices.iter().enumerate() {
                dof_local[v].push(LocalDof { element, local });
            }
            element_dofs.push(vertices);
        }
        if let Some(v) = dof_local.iter().position(Vec::is_empty) {
            return Err(AssemblyError::InvalidMesh(format!(
                "vertex {v} belongs to no element"
            )));
        }
        Ok(Self {
            grid,
            element_dofs,
            dof_local,
        })
    }
}

impl Space for PiecewiseLinearContinuousScalarSpace {
    fn grid(&self) -> &Arc<dyn Grid> {
        &self.grid
    }

    fn shape_set(&self) -> ShapeSet {
        ShapeSet::Linear
    }

    fn global_dof_count(&self) -> usize {
        self.dof_local.len()
    }

    fn element_global_dofs(&self, element: usize) -> &[usize] {
        &self.element_dofs[element]
    }

    fn global_dof_local_dofs(&self, dof: usize) -> &[LocalDof] {
        &self.dof_local[dof]
    }

    fn global_dof_positions(&self) -> Vec<Point3> {
        (0..self.grid.vertex_count())
            .map(|v| self.grid.vertex(v))
            .collect()
    }

    fn flat_local_dof_positions(&self) -> Vec<Point3> {
        self.element_dofs
            .iter()
            .flat_map(|vertices| vertices.iter().map(|&v| self.grid.vertex(v)))
            .collect()
    }

    fn name(&self) -> &'static str {
        "P1"
    }
}
