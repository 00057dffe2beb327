//! Linear algebra building blocks for boundary element assembly
//!
//! This crate provides the scalar abstraction and the operator layer consumed
//! by the hierarchical-matrix assembly crate.
//!
//! # Features
//!
//! - **Generic Scalar Types**: Works with Complex64, Complex32, f64, f32
//! - **Linear Operators**: dense wrappers, sums, products and transposed views
//! - **Sparse Matrices**: CSR format with parallel matrix-vector products
//! - **Permutations**: validated natural/clustered index maps
//!
//! # Example
//!
//! ```ignore
//! use math_audio_linalg::{DenseOperator, LinearOperator, TransposeMode};
//!
//! let op = DenseOperator::new(matrix);
//! let y = op.apply_mode(TransposeMode::Transpose, &x);
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod operators;
pub mod permutation;
pub mod sparse;
pub mod traits;

pub use error::LinalgError;
pub use operators::{
    DenseOperator, ProductOperator, SharedOperator, SumOperator, TransposedOperator,
    frobenius_norm, relative_frobenius_error, to_dense,
};
pub use permutation::IndexPermutation;
pub use sparse::CsrMatrix;
pub use traits::{ComplexField, LinearOperator, TransposeMode};
