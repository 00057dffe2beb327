//! # BEM-ACA: Hierarchical Matrix Assembly for Boundary Integral Operators
//!
//! Discretizes Laplace, Helmholtz and modified Helmholtz boundary integral
//! operators in 3D and compresses them with adaptive cross approximation.
//!
//! ## Features
//!
//! - Dense or H-matrix (ACA) assembly selected at run time
//! - Sauter-Schwab quadrature for touching element pairs
//! - Generic over `f32`, `f64`, `Complex32` and `Complex64`
//! - Parallel leaf assembly with Rayon
//! - Adjoints, linear combinations and joint assembly of operator sums
//!
//! ## Example
//!
//! ```ignore
//! use math_audio_bem_aca::core::*;
//! use std::sync::Arc;
//!
//! let grid: Arc<dyn Grid> = Arc::new(icosphere_grid(1.0, 3)?);
//! let p0: Arc<dyn Space> = Arc::new(PiecewiseConstantScalarSpace::new(grid)?);
//! let slp = laplace_3d_single_layer::<f64>(p0.clone(), p0.clone(), p0)?;
//! let context = Context::new(AssemblyOptions::aca(AcaOptions::default()))?;
//! let matrix = slp.weak_form(&context)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

pub mod core;

pub use math_audio_linalg as linalg;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit hash (set during build)
pub const GIT_HASH: &str = env!("GIT_HASH");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert!(!GIT_HASH.is_empty());
    }
}
