//! Boundary operators and their weak forms
//!
//! A boundary operator maps functions of its *domain* into its *range*; its
//! weak form is tested against the *dual to range*, so the discrete matrix has
//! one row per DOF of `dual_to_range` and one column per DOF of `domain`.
//!
//! # Example
//!
//! ```ignore
//! use math_audio_bem_aca::core::boundary_operator::helmholtz_3d_double_layer;
//!
//! let dlp = helmholtz_3d_double_layer::<Complex64>(p1.clone(), p1.clone(), p0.clone(), 2.0)?;
//! let adlp = dlp.adjoint();
//! let matrix = adlp.weak_form(&context)?;
//! ```

use crate::core::assembly::{assemble_identity, assemble_weak_form};
use crate::core::context::Context;
use crate::core::error::{AssemblyError, Result};
use crate::core::kernel::{
    CombinedKernel, GreenFunction, GreenKernel, KernelEvaluator, LayerKind, check_scalar_type,
};
use crate::core::space::{Space, same_grid, same_space};
use math_audio_linalg::{
    ComplexField, SharedOperator, SumOperator, TransposeMode, TransposedOperator,
};
use num_complex::Complex64;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
enum Term<T: ComplexField> {
    Integral(Arc<dyn KernelEvaluator>),
    Identity,
    Adjoint(Box<BoundaryOperator<T>>),
    Sum(Vec<(T, BoundaryOperator<T>)>),
}

/// Abstract boundary operator on three function spaces
#[derive(Clone)]
pub struct BoundaryOperator<T: ComplexField> {
    domain: Arc<dyn Space>,
    range: Arc<dyn Space>,
    dual_to_range: Arc<dyn Space>,
    label: String,
    term: Term<T>,
}

impl<T: ComplexField> fmt::Debug for BoundaryOperator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundaryOperator")
            .field("label", &self.label)
            .field("domain", &self.domain.name())
            .field("range", &self.range.name())
            .field("dual_to_range", &self.dual_to_range.name())
            .finish()
    }
}

fn check_range_pair(range: &dyn Space, dual_to_range: &dyn Space) -> Result<()> {
    if !same_grid(range, dual_to_range) {
        return Err(AssemblyError::IncompatibleSpaces(format!(
            "range {} and dual to range {} must live on the same grid",
            range.name(),
            dual_to_range.name()
        )));
    }
    Ok(())
}

impl<T: ComplexField> BoundaryOperator<T> {
    /// Integral operator with an arbitrary kernel
    ///
    /// The domain and the dual to range must share a grid, as must the range
    /// and the dual to range. Complex kernels are rejected for real `T`.
    pub fn integral(
        kernel: Arc<dyn KernelEvaluator>,
        domain: Arc<dyn Space>,
        range: Arc<dyn Space>,
        dual_to_range: Arc<dyn Space>,
    ) -> Result<Self> {
        check_range_pair(range.as_ref(), dual_to_range.as_ref())?;
        if !same_grid(domain.as_ref(), dual_to_range.as_ref()) {
            return Err(AssemblyError::IncompatibleSpaces(format!(
                "domain {} and dual to range {} must live on the same grid",
                domain.name(),
                dual_to_range.name()
            )));
        }
        check_scalar_type::<T>(kernel.as_ref())?;
        Ok(Self {
            domain,
            range,
            dual_to_range,
            label: kernel.name(),
            term: Term::Integral(kernel),
        })
    }

    /// Space of the functions the operator acts on
    pub fn domain(&self) -> &Arc<dyn Space> {
        &self.domain
    }

    /// Space the results live in
    pub fn range(&self) -> &Arc<dyn Space> {
        &self.range
    }

    /// Test space of the weak form
    pub fn dual_to_range(&self) -> &Arc<dyn Space> {
        &self.dual_to_range
    }

    /// Human-readable description
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Adjoint operator
    ///
    /// Domain and range become the old dual to range, the dual to range
    /// becomes the old domain, and the weak form is the transpose.
    pub fn adjoint(&self) -> Self {
        Self {
            domain: Arc::clone(&self.dual_to_range),
            range: Arc::clone(&self.dual_to_range),
            dual_to_range: Arc::clone(&self.domain),
            label: format!("adj({})", self.label),
            term: Term::Adjoint(Box::new(self.clone())),
        }
    }

    /// Adjoint with an explicitly chosen range
    pub fn adjoint_with_range(&self, range: Arc<dyn Space>) -> Result<Self> {
        check_range_pair(range.as_ref(), self.domain.as_ref())?;
        let mut adjoint = self.adjoint();
        adjoint.range = range;
        Ok(adjoint)
    }

    /// `self + other`; both must act on the same three spaces
    pub fn sum(&self, other: &Self) -> Result<Self> {
        let same = same_space(&self.domain, &other.domain)
            && same_space(&self.range, &other.range)
            && same_space(&self.dual_to_range, &other.dual_to_range);
        if !same {
            return Err(AssemblyError::IncompatibleSpaces(format!(
                "cannot add {} and {} on different spaces",
                self.label, other.label
            )));
        }
        let mut terms = Vec::new();
        for op in [self, other] {
            match &op.term {
                Term::Sum(inner) => terms.extend(inner.iter().cloned()),
                _ => terms.push((T::one(), op.clone())),
            }
        }
        Ok(Self {
            domain: Arc::clone(&self.domain),
            range: Arc::clone(&self.range),
            dual_to_range: Arc::clone(&self.dual_to_range),
            label: format!("{} + {}", self.label, other.label),
            term: Term::Sum(terms),
        })
    }

    /// `alpha · self`
    pub fn scaled(&self, alpha: T) -> Self {
        Self {
            domain: Arc::clone(&self.domain),
            range: Arc::clone(&self.range),
            dual_to_range: Arc::clone(&self.dual_to_range),
            label: format!("{:?} * ({})", alpha, self.label),
            term: Term::Sum(vec![(alpha, self.clone())]),
        }
    }

    /// Discrete weak form on global DOFs, `dual_to_range × domain`
    pub fn weak_form(&self, context: &Context) -> Result<SharedOperator<T>> {
        let options = context.options();
        match &self.term {
            Term::Integral(kernel) => assemble_weak_form(
                Arc::clone(&self.dual_to_range),
                Arc::clone(&self.domain),
                Arc::clone(kernel),
                options,
            ),
            Term::Identity => {
                assemble_identity(self.dual_to_range.as_ref(), self.domain.as_ref(), options)
            }
            Term::Adjoint(inner) => Ok(Arc::new(TransposedOperator::new(
                TransposeMode::Transpose,
                inner.weak_form(context)?,
            ))),
            Term::Sum(terms) => self.sum_weak_form(terms, context),
        }
    }

    fn sum_weak_form(
        &self,
        terms: &[(T, BoundaryOperator<T>)],
        context: &Context,
    ) -> Result<SharedOperator<T>> {
        let mut parts: Vec<(T, SharedOperator<T>)> = Vec::with_capacity(terms.len());
        let mut joint: Vec<(Complex64, Arc<dyn KernelEvaluator>)> = Vec::new();
        for (alpha, op) in terms {
            match &op.term {
                Term::Integral(kernel) if context.options().joint_assembly => {
                    joint.push((alpha.to_c64(), Arc::clone(kernel)));
                }
                _ => parts.push((*alpha, op.weak_form(context)?)),
            }
        }
        match joint.len() {
            0 => {}
            1 => {
                let (alpha, kernel) = joint.remove(0);
                let weak = assemble_weak_form(
                    Arc::clone(&self.dual_to_range),
                    Arc::clone(&self.domain),
                    kernel,
                    context.options(),
                )?;
                parts.push((T::from_c64(alpha), weak));
            }
            n => {
                log::debug!("joint assembly of {n} integral terms");
                let combined: Arc<dyn KernelEvaluator> = Arc::new(CombinedKernel::new(joint)?);
                check_scalar_type::<T>(combined.as_ref())?;
                let weak = assemble_weak_form(
                    Arc::clone(&self.dual_to_range),
                    Arc::clone(&self.domain),
                    combined,
                    context.options(),
                )?;
                parts.push((T::one(), weak));
            }
        }
        Ok(Arc::new(SumOperator::new(parts)?))
    }
}

fn integral_operator<T: ComplexField>(
    green: GreenFunction,
    layer: LayerKind,
    domain: Arc<dyn Space>,
    range: Arc<dyn Space>,
    dual_to_range: Arc<dyn Space>,
) -> Result<BoundaryOperator<T>> {
    let kernel = GreenKernel::for_scalar::<T>(green, layer)?;
    BoundaryOperator::integral(Arc::new(kernel), domain, range, dual_to_range)
}

/// Identity operator; its weak form is the mass matrix
pub fn identity_operator<T: ComplexField>(
    domain: Arc<dyn Space>,
    range: Arc<dyn Space>,
    dual_to_range: Arc<dyn Space>,
) -> Result<BoundaryOperator<T>> {
    check_range_pair(range.as_ref(), dual_to_range.as_ref())?;
    if !same_grid(domain.as_ref(), dual_to_range.as_ref()) {
        return Err(AssemblyError::IncompatibleSpaces(format!(
            "identity between {} and {} on different grids",
            domain.name(),
            dual_to_range.name()
        )));
    }
    Ok(BoundaryOperator {
        domain,
        range,
        dual_to_range,
        label: "identity".to_string(),
        term: Term::Identity,
    })
}

/// Laplace single layer `1 / (4π r)`
pub fn laplace_3d_single_layer<T: ComplexField>(
    domain: Arc<dyn Space>,
    range: Arc<dyn Space>,
    dual_to_range: Arc<dyn Space>,
) -> Result<BoundaryOperator<T>> {
    integral_operator(GreenFunction::Laplace, LayerKind::SingleLayer, domain, range, dual_to_range)
}

/// Laplace double layer
pub fn laplace_3d_double_layer<T: ComplexField>(
    domain: Arc<dyn Space>,
    range: Arc<dyn Space>,
    dual_to_range: Arc<dyn Space>,
) -> Result<BoundaryOperator<T>> {
    integral_operator(GreenFunction::Laplace, LayerKind::DoubleLayer, domain, range, dual_to_range)
}

/// Laplace adjoint double layer
pub fn laplace_3d_adjoint_double_layer<T: ComplexField>(
    domain: Arc<dyn Space>,
    range: Arc<dyn Space>,
    dual_to_range: Arc<dyn Space>,
) -> Result<BoundaryOperator<T>> {
    integral_operator(
        GreenFunction::Laplace,
        LayerKind::AdjointDoubleLayer,
        domain,
        range,
        dual_to_range,
    )
}

/// Helmholtz single layer with wave number `k`
pub fn helmholtz_3d_single_layer<T: ComplexField>(
    domain: Arc<dyn Space>,
    range: Arc<dyn Space>,
    dual_to_range: Arc<dyn Space>,
    k: f64,
) -> Result<BoundaryOperator<T>> {
    integral_operator(GreenFunction::Helmholtz(k), LayerKind::SingleLayer, domain, range, dual_to_range)
}

/// Helmholtz double layer with wave number `k`
pub fn helmholtz_3d_double_layer<T: ComplexField>(
    domain: Arc<dyn Space>,
    range: Arc<dyn Space>,
    dual_to_range: Arc<dyn Space>,
    k: f64,
) -> Result<BoundaryOperator<T>> {
    integral_operator(GreenFunction::Helmholtz(k), LayerKind::DoubleLayer, domain, range, dual_to_range)
}

/// Helmholtz adjoint double layer with wave number `k`
pub fn helmholtz_3d_adjoint_double_layer<T: ComplexField>(
    domain: Arc<dyn Space>,
    range: Arc<dyn Space>,
    dual_to_range: Arc<dyn Space>,
    k: f64,
) -> Result<BoundaryOperator<T>> {
    integral_operator(
        GreenFunction::Helmholtz(k),
        LayerKind::AdjointDoubleLayer,
        domain,
        range,
        dual_to_range,
    )
}

/// Modified Helmholtz single layer with decay constant `kappa`
pub fn modified_helmholtz_3d_single_layer<T: ComplexField>(
    domain: Arc<dyn Space>,
    range: Arc<dyn Space>,
    dual_to_range: Arc<dyn Space>,
    kappa: f64,
) -> Result<BoundaryOperator<T>> {
    integral_operator(
        GreenFunction::ModifiedHelmholtz(kappa),
        LayerKind::SingleLayer,
        domain,
        range,
        dual_to_range,
    )
}

/// Modified Helmholtz double layer with decay constant `kappa`
pub fn modified_helmholtz_3d_double_layer<T: ComplexField>(
    domain: Arc<dyn Space>,
    range: Arc<dyn Space>,
    dual_to_range: Arc<dyn Space>,
    kappa: f64,
) -> Result<BoundaryOperator<T>> {
    integral_operator(
        GreenFunction::ModifiedHelmholtz(kappa),
        LayerKind::DoubleLayer,
        domain,
        range,
        dual_to_range,
    )
}

/// Modified Helmholtz adjoint double layer with decay constant `kappa`
pub fn modified_helmholtz_3d_adjoint_double_layer<T: ComplexField>(
    domain: Arc<dyn Space>,
    range: Arc<dyn Space>,
    dual_to_range: Arc<dyn Space>,
    kappa: f64,
) -> Result<BoundaryOperator<T>> {
    integral_operator(
        GreenFunction::ModifiedHelmholtz(kappa),
        LayerKind::AdjointDoubleLayer,
        domain,
        range,
        dual_to_range,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{AssemblyOptions, VerbosityLevel};
    use crate::core::grid::{Grid, cube_grid};
    use crate::core::space::{PiecewiseConstantScalarSpace, PiecewiseLinearContinuousScalarSpace};
    use approx::assert_relative_eq;
    use math_audio_linalg::{LinearOperator, relative_frobenius_error, to_dense};

    struct Setup {
        p0: Arc<dyn Space>,
        p1: Arc<dyn Space>,
        context: Context,
    }

    fn setup() -> Setup {
        let grid: Arc<dyn Grid> = Arc::new(cube_grid(1).unwrap());
        Setup {
            p0: Arc::new(PiecewiseConstantScalarSpace::new(grid.clone()).unwrap()),
            p1: Arc::new(PiecewiseLinearContinuousScalarSpace::new(grid).unwrap()),
            context: Context::new(AssemblyOptions::default().with_verbosity(VerbosityLevel::Low))
                .unwrap(),
        }
    }

    #[test]
    fn test_weak_form_shape() {
        let s = setup();
        let slp =
            laplace_3d_single_layer::<f64>(s.p1.clone(), s.p0.clone(), s.p0.clone()).unwrap();
        let weak = slp.weak_form(&s.context).unwrap();
        assert_eq!(weak.num_rows(), 12);
        assert_eq!(weak.num_cols(), 8);
    }

    #[test]
    fn test_helmholtz_rejects_real_scalars() {
        let s = setup();
        assert!(matches!(
            helmholtz_3d_single_layer::<f64>(s.p0.clone(), s.p0.clone(), s.p0.clone(), 1.0),
            Err(AssemblyError::UnsupportedConfiguration(_))
        ));
        assert!(
            modified_helmholtz_3d_single_layer::<f64>(s.p0.clone(), s.p0.clone(), s.p0, 1.0)
                .is_ok()
        );
    }

    #[test]
    fn test_spaces_on_different_grids_rejected() {
        let s = setup();
        let other: Arc<dyn Space> = Arc::new(
            PiecewiseConstantScalarSpace::new(Arc::new(cube_grid(1).unwrap())).unwrap(),
        );
        assert!(matches!(
            laplace_3d_single_layer::<f64>(s.p0.clone(), other.clone(), s.p0.clone()),
            Err(AssemblyError::IncompatibleSpaces(_))
        ));
        assert!(matches!(
            identity_operator::<f64>(other, s.p0.clone(), s.p0),
            Err(AssemblyError::IncompatibleSpaces(_))
        ));
    }

    #[test]
    fn test_adjoint_swaps_spaces() {
        let s = setup();
        let dlp = laplace_3d_double_layer::<f64>(s.p1.clone(), s.p1.clone(), s.p0.clone())
            .unwrap();
        let adj = dlp.adjoint();
        assert!(same_space(adj.domain(), &s.p0));
        assert!(same_space(adj.range(), &s.p0));
        assert!(same_space(adj.dual_to_range(), &s.p1));

        let weak = to_dense(dlp.weak_form(&s.context).unwrap().as_ref());
        let weak_adj = to_dense(adj.weak_form(&s.context).unwrap().as_ref());
        assert_eq!(weak_adj, weak.t().to_owned());

        let with_range = dlp.adjoint_with_range(s.p1.clone()).unwrap();
        assert!(same_space(with_range.range(), &s.p1));
    }

    #[test]
    fn test_joint_assembly_matches_separate_terms() {
        let s = setup();
        let slp = modified_helmholtz_3d_single_layer::<Complex64>(
            s.p0.clone(),
            s.p0.clone(),
            s.p0.clone(),
            0.5,
        )
        .unwrap();
        let dlp = helmholtz_3d_double_layer::<Complex64>(s.p0.clone(), s.p0.clone(), s.p0.clone(), 2.0)
            .unwrap();
        let id = identity_operator::<Complex64>(s.p0.clone(), s.p0.clone(), s.p0.clone()).unwrap();
        let combination = slp
            .scaled(Complex64::new(0.0, 2.0))
            .sum(&dlp)
            .unwrap()
            .sum(&id.scaled(Complex64::new(0.5, 0.0)))
            .unwrap();

        let separate = to_dense(combination.weak_form(&s.context).unwrap().as_ref());
        let mut options = s.context.options().clone();
        options.enable_joint_assembly(true);
        let joint_context = Context::new(options).unwrap();
        let joint = to_dense(combination.weak_form(&joint_context).unwrap().as_ref());
        assert!(relative_frobenius_error(&joint, &separate) < 1e-12);

        let mass = to_dense(id.weak_form(&s.context).unwrap().as_ref());
        let manual = to_dense(slp.weak_form(&s.context).unwrap().as_ref())
            * Complex64::new(0.0, 2.0)
            + to_dense(dlp.weak_form(&s.context).unwrap().as_ref())
            + mass * Complex64::new(0.5, 0.0);
        assert!(relative_frobenius_error(&separate, &manual) < 1e-12);
    }

    #[test]
    fn test_sum_requires_matching_spaces() {
        let s = setup();
        let a = laplace_3d_single_layer::<f64>(s.p0.clone(), s.p0.clone(), s.p0.clone()).unwrap();
        let b = laplace_3d_single_layer::<f64>(s.p1.clone(), s.p0.clone(), s.p0.clone()).unwrap();
        assert!(a.sum(&b).is_err());
        let doubled = to_dense(a.sum(&a).unwrap().weak_form(&s.context).unwrap().as_ref());
        let single = to_dense(a.weak_form(&s.context).unwrap().as_ref());
        assert_relative_eq!(doubled[[3, 5]], 2.0 * single[[3, 5]], max_relative = 1e-13);
    }
}
