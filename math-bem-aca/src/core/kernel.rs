//! Integral kernels
//!
//! All three Green's functions share the form `G(r) = exp(-γ r) / (4π r)`:
//!
//! | equation           | γ      |
//! |--------------------|--------|
//! | Laplace            | 0      |
//! | Helmholtz          | -i k   |
//! | modified Helmholtz | κ      |
//!
//! The double layer kernel differentiates with respect to the trial normal,
//! the adjoint double layer with respect to the test normal:
//!
//! ```text
//! ∂G/∂n_y = -G (γ + 1/r) (y - x)·n_y / r
//! ∂G/∂n_x = -G (γ + 1/r) (x - y)·n_x / r
//! ```
//!
//! Values are computed in double precision complex arithmetic and narrowed to
//! the result type by the assembler.

use crate::core::error::{AssemblyError, Result};
use crate::core::grid::{GeometricDependencies, Point3, dot, sub};
use math_audio_linalg::ComplexField;
use num_complex::Complex64;
use std::f64::consts::PI;
use std::fmt::Debug;
use std::sync::Arc;

/// Position and unit normal of a quadrature point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelPoint {
    /// Physical coordinates
    pub position: Point3,
    /// Unit normal of the element containing the point
    pub normal: Point3,
}

/// Strategy object evaluating a kernel between a test and a trial point
pub trait KernelEvaluator: Send + Sync + Debug {
    /// Kernel value `K(x, y)`
    fn evaluate(&self, test: &KernelPoint, trial: &KernelPoint) -> Complex64;

    /// Geometric quantities the kernel reads
    fn dependencies(&self) -> GeometricDependencies;

    /// Whether `K(x, y) = K(y, x)` for all point pairs
    fn is_symmetric(&self) -> bool;

    /// Whether all values are real
    fn is_real_valued(&self) -> bool;

    /// Name used in log and error messages
    fn name(&self) -> String;
}

/// Free-space Green's function
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GreenFunction {
    /// `1 / (4π r)`
    Laplace,
    /// `exp(i k r) / (4π r)` with wave number `k`
    Helmholtz(f64),
    /// `exp(-κ r) / (4π r)` with decay constant `κ`
    ModifiedHelmholtz(f64),
}

impl GreenFunction {
    fn gamma(self) -> Complex64 {
        match self {
            Self::Laplace => Complex64::new(0.0, 0.0),
            Self::Helmholtz(k) => Complex64::new(0.0, -k),
            Self::ModifiedHelmholtz(kappa) => Complex64::new(kappa, 0.0),
        }
    }

    fn is_real_valued(self) -> bool {
        !matches!(self, Self::Helmholtz(_))
    }

    fn label(self) -> &'static str {
        match self {
            Self::Laplace => "laplace",
            Self::Helmholtz(_) => "helmholtz",
            Self::ModifiedHelmholtz(_) => "modified helmholtz",
        }
    }

    fn validate(self) -> Result<()> {
        let parameter = match self {
            Self::Laplace => return Ok(()),
            Self::Helmholtz(k) => k,
            Self::ModifiedHelmholtz(kappa) => kappa,
        };
        if !parameter.is_finite() {
            return Err(AssemblyError::InvalidConfiguration(format!(
                "{} kernel parameter must be finite, got {parameter}",
                self.label()
            )));
        }
        Ok(())
    }
}

/// Which layer potential the kernel represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// `G(x, y)`
    SingleLayer,
    /// `∂G/∂n_y`
    DoubleLayer,
    /// `∂G/∂n_x`
    AdjointDoubleLayer,
}

/// Layer potential kernel of a Green's function
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GreenKernel {
    green: GreenFunction,
    layer: LayerKind,
    gamma: Complex64,
}

impl GreenKernel {
    /// Create a kernel; non-finite parameters are rejected
    pub fn new(green: GreenFunction, layer: LayerKind) -> Result<Self> {
        green.validate()?;
        Ok(Self {
            green,
            layer,
            gamma: green.gamma(),
        })
    }

    /// Create a kernel for result type `T`, rejecting complex kernels for real `T`
    pub fn for_scalar<T: ComplexField>(green: GreenFunction, layer: LayerKind) -> Result<Self> {
        let kernel = Self::new(green, layer)?;
        check_scalar_type::<T>(&kernel)?;
        Ok(kernel)
    }

    /// The Green's function
    pub fn green(&self) -> GreenFunction {
        self.green
    }

    /// The layer kind
    pub fn layer(&self) -> LayerKind {
        self.layer
    }
}

/// Reject complex-valued kernels for real result types
pub fn check_scalar_type<T: ComplexField>(kernel: &dyn KernelEvaluator) -> Result<()> {
    if !T::IS_COMPLEX && !kernel.is_real_valued() {
        return Err(AssemblyError::UnsupportedConfiguration(format!(
            "kernel {} is complex-valued but the result type {} is real",
            kernel.name(),
            std::any::type_name::<T>()
        )));
    }
    Ok(())
}

impl KernelEvaluator for GreenKernel {
    #[inline]
    fn evaluate(&self, test: &KernelPoint, trial: &KernelPoint) -> Complex64 {
        let diff = sub(&trial.position, &test.position);
        let r = dot(&diff, &diff).sqrt();
        if r == 0.0 {
            return Complex64::new(0.0, 0.0);
        }
        let g = (-self.gamma * r).exp() / (4.0 * PI * r);
        match self.layer {
            LayerKind::SingleLayer => g,
            LayerKind::DoubleLayer => {
                let cos = dot(&diff, &trial.normal) / r;
                -g * (self.gamma + 1.0 / r) * cos
            }
            LayerKind::AdjointDoubleLayer => {
                let cos = -dot(&diff, &test.normal) / r;
                -g * (self.gamma + 1.0 / r) * cos
            }
        }
    }

    fn dependencies(&self) -> GeometricDependencies {
        match self.layer {
            LayerKind::SingleLayer => GeometricDependencies::GLOBALS,
            _ => GeometricDependencies::GLOBALS | GeometricDependencies::NORMALS,
        }
    }

    fn is_symmetric(&self) -> bool {
        self.layer == LayerKind::SingleLayer
    }

    fn is_real_valued(&self) -> bool {
        self.green.is_real_valued()
    }

    fn name(&self) -> String {
        let layer = match self.layer {
            LayerKind::SingleLayer => "single layer",
            LayerKind::DoubleLayer => "double layer",
            LayerKind::AdjointDoubleLayer => "adjoint double layer",
        };
        format!("{} {}", self.green.label(), layer)
    }
}

/// Weighted sum of kernels, used to assemble operator sums in one pass
#[derive(Debug, Clone)]
pub struct CombinedKernel {
    terms: Vec<(Complex64, Arc<dyn KernelEvaluator>)>,
}

impl CombinedKernel {
    /// Combine `Σ αᵢ Kᵢ`; the list must not be empty
    pub fn new(terms: Vec<(Complex64, Arc<dyn KernelEvaluator>)>) -> Result<Self> {
        if terms.is_empty() {
            return Err(AssemblyError::EmptyInput(
                "combined kernel without terms".to_string(),
            ));
        }
        Ok(Self { terms })
    }
}

impl KernelEvaluator for CombinedKernel {
    fn evaluate(&self, test: &KernelPoint, trial: &KernelPoint) -> Complex64 {
        self.terms
            .iter()
            .map(|(alpha, kernel)| alpha * kernel.evaluate(test, trial))
            .sum()
    }

    fn dependencies(&self) -> GeometricDependencies {
        self.terms
            .iter()
            .fold(GeometricDependencies::NONE, |acc, (_, k)| {
                acc | k.dependencies()
            })
    }

    fn is_symmetric(&self) -> bool {
        self.terms.iter().all(|(_, k)| k.is_symmetric())
    }

    fn is_real_valued(&self) -> bool {
        self.terms
            .iter()
            .all(|(alpha, k)| alpha.im == 0.0 && k.is_real_valued())
    }

    fn name(&self) -> String {
        let names: Vec<String> = self.terms.iter().map(|(_, k)| k.name()).collect();
        format!("combination of [{}]", names.join(", "))
    }
}
