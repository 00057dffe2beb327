//! Boundary element weak-form assembly with hierarchical matrices
//!
//! ## Architecture
//!
//! - `config`: Assembly, ACA, accuracy and parallelization options
//! - `error`: Error type shared by every fallible operation
//! - `parallel`: Portable parallel iteration (rayon or sequential)
//! - `grid`: Flat triangle grids and test generators
//! - `space`: Piecewise constant and piecewise linear scalar spaces
//! - `kernel`: Laplace, Helmholtz and modified Helmholtz layer kernels
//! - `quadrature`: Gauss rules and Sauter-Schwab singular rules
//! - `hmatrix`: Cluster trees, block trees, ACA and the H-matrix operator
//! - `assembly`: Local, dense, ACA and mass matrix assembly
//! - `context`: Validated options handed to every weak-form request
//! - `boundary_operator`: Operators on (domain, range, dual to range) and their weak forms

pub mod assembly;
pub mod boundary_operator;
pub mod config;
pub mod context;
pub mod error;
pub mod grid;
pub mod hmatrix;
pub mod kernel;
pub mod parallel;
pub mod quadrature;
pub mod space;

// Re-exports for convenience
pub use boundary_operator::{
    BoundaryOperator, helmholtz_3d_adjoint_double_layer, helmholtz_3d_double_layer,
    helmholtz_3d_single_layer, identity_operator, laplace_3d_adjoint_double_layer,
    laplace_3d_double_layer, laplace_3d_single_layer, modified_helmholtz_3d_adjoint_double_layer,
    modified_helmholtz_3d_double_layer, modified_helmholtz_3d_single_layer,
};
pub use config::{
    AcaOptions, AccuracyOptions, AssemblyMode, AssemblyOptions, ParallelizationOptions,
    ThreadCount, VerbosityLevel,
};
pub use context::Context;
pub use error::{AssemblyError, Result};
pub use grid::{Grid, TriangleGrid, cube_grid, icosphere_grid};
pub use hmatrix::{HMatrix, HMatrixStats};
pub use kernel::{GreenFunction, GreenKernel, KernelEvaluator, LayerKind};
pub use space::{PiecewiseConstantScalarSpace, PiecewiseLinearContinuousScalarSpace, Space};
