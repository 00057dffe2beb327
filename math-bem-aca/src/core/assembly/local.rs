//! Element-pair integrals
//!
//! For a test element `e` and a trial element `f` the local weak form is
//!
//! ```text
//! A_ef[i][j] = ∫_e ∫_f φ_i(x) K(x, y) ψ_j(y) dy dx
//! ```
//!
//! Disjoint pairs use a tensor product of triangle rules whose order follows
//! the distance/size heuristic of [`regular_order`]; touching pairs use the
//! Sauter-Schwab rules. Sums run in double precision complex arithmetic and
//! are narrowed to `T` once per entry.

use crate::core::config::AccuracyOptions;
use crate::core::error::{AssemblyError, Result};
use crate::core::grid::{GeometricDependencies, Grid};
use crate::core::kernel::{KernelEvaluator, KernelPoint, check_scalar_type};
use crate::core::parallel::parallel_map;
use crate::core::quadrature::{
    PairTopology, SingularRuleCache, TrianglePoint, classify_pair, regular_order,
    triangle_quadrature,
};
use crate::core::space::{Space, same_grid};
use math_audio_linalg::ComplexField;
use ndarray::Array2;
use num_complex::Complex64;
use std::collections::HashMap;
use std::sync::Arc;

/// Integrates kernels over pairs of test and trial elements
#[derive(Debug)]
pub struct LocalAssembler<T: ComplexField> {
    test_space: Arc<dyn Space>,
    trial_space: Arc<dyn Space>,
    kernel: Arc<dyn KernelEvaluator>,
    accuracy: AccuracyOptions,
    /// Triangle rules indexed by Gauss order
    regular_rules: Vec<Vec<TrianglePoint>>,
    singular_rules: SingularRuleCache,
    singular_cache: HashMap<(usize, usize), Array2<T>>,
}

impl<T: ComplexField> LocalAssembler<T> {
    /// Create an assembler after checking that the configuration is supported
    ///
    /// Fails when the spaces live on different grids, when the grid cannot
    /// supply the geometry the kernel reads, when a quadrature order is out of
    /// range, or when a complex kernel meets a real result type.
    pub fn new(
        test_space: Arc<dyn Space>,
        trial_space: Arc<dyn Space>,
        kernel: Arc<dyn KernelEvaluator>,
        accuracy: AccuracyOptions,
    ) -> Result<Self> {
        if !same_grid(test_space.as_ref(), trial_space.as_ref()) {
            return Err(AssemblyError::IncompatibleSpaces(format!(
                "test space {} and trial space {} are defined on different grids",
                test_space.name(),
                trial_space.name()
            )));
        }
        let required = kernel.dependencies()
            | GeometricDependencies::GLOBALS
            | GeometricDependencies::INTEGRATION_ELEMENTS;
        let missing = required.difference(test_space.grid().supported_dependencies());
        if missing != GeometricDependencies::NONE {
            return Err(AssemblyError::MissingGeometricDependency {
                kernel: kernel.name(),
                missing: missing.describe(),
            });
        }
        accuracy.validate()?;
        check_scalar_type::<T>(kernel.as_ref())?;

        let mut regular_rules = vec![Vec::new()];
        for order in 1..=accuracy.max_regular_order() {
            regular_rules.push(triangle_quadrature(order)?);
        }

        Ok(Self {
            test_space,
            trial_space,
            kernel,
            accuracy,
            regular_rules,
            singular_rules: SingularRuleCache::new(accuracy.singular_order)?,
            singular_cache: HashMap::new(),
        })
    }

    /// Test space
    pub fn test_space(&self) -> &Arc<dyn Space> {
        &self.test_space
    }

    /// Trial space
    pub fn trial_space(&self) -> &Arc<dyn Space> {
        &self.trial_space
    }

    /// Kernel
    pub fn kernel(&self) -> &Arc<dyn KernelEvaluator> {
        &self.kernel
    }

    fn grid(&self) -> &Arc<dyn Grid> {
        self.test_space.grid()
    }

    /// Precompute all pairs of touching elements so later lookups are read-only
    ///
    /// Returns the number of cached pairs.
    pub fn precompute_singular_integrals(&mut self) -> Result<usize> {
        let grid = Arc::clone(self.grid());
        let elements: Vec<usize> = (0..grid.element_count()).collect();
        let touching: Vec<Vec<usize>> = parallel_map(&elements, |&e| {
            let mut neighbours: Vec<usize> = grid
                .element_vertices(e)
                .iter()
                .flat_map(|&v| grid.vertex_elements(v).iter().copied())
                .collect();
            neighbours.sort_unstable();
            neighbours.dedup();
            neighbours
        });
        let pairs: Vec<(usize, usize)> = touching
            .into_iter()
            .enumerate()
            .flat_map(|(e, fs)| fs.into_iter().map(move |f| (e, f)))
            .collect();

        let this = &*self;
        let values: Vec<Result<Array2<T>>> =
            parallel_map(&pairs, |&(e, f)| this.compute_pair(e, f));
        let mut cache = HashMap::with_capacity(pairs.len());
        for (pair, value) in pairs.into_iter().zip(values) {
            cache.insert(pair, value?);
        }
        let count = cache.len();
        self.singular_cache = cache;
        log::debug!("cached {count} singular element-pair integrals");
        Ok(count)
    }

    /// Local weak form of one element pair, `test dofs × trial dofs`
    pub fn evaluate_pair(&self, test_element: usize, trial_element: usize) -> Result<Array2<T>> {
        if let Some(cached) = self.singular_cache.get(&(test_element, trial_element)) {
            return Ok(cached.clone());
        }
        self.compute_pair(test_element, trial_element)
    }

    /// Local weak forms of several test elements against one trial element
    pub fn evaluate_test_batch(
        &self,
        test_elements: &[usize],
        trial_element: usize,
        out: &mut [Array2<T>],
    ) -> Result<()> {
        if test_elements.len() != out.len() {
            return Err(AssemblyError::SizeMismatch {
                context: "test element batch",
                expected: test_elements.len(),
                found: out.len(),
            });
        }
        for (slot, &e) in out.iter_mut().zip(test_elements) {
            *slot = self.evaluate_pair(e, trial_element)?;
        }
        Ok(())
    }

    /// Local weak forms of one test element against several trial elements
    pub fn evaluate_trial_batch(
        &self,
        test_element: usize,
        trial_elements: &[usize],
        out: &mut [Array2<T>],
    ) -> Result<()> {
        if trial_elements.len() != out.len() {
            return Err(AssemblyError::SizeMismatch {
                context: "trial element batch",
                expected: trial_elements.len(),
                found: out.len(),
            });
        }
        for (slot, &f) in out.iter_mut().zip(trial_elements) {
            *slot = self.evaluate_pair(test_element, f)?;
        }
        Ok(())
    }

    fn compute_pair(&self, test_element: usize, trial_element: usize) -> Result<Array2<T>> {
        let grid = self.grid();
        let test_geo = grid.element_geometry(test_element);
        let trial_geo = grid.element_geometry(trial_element);
        let test_shapes = self.test_space.shape_set();
        let trial_shapes = self.trial_space.shape_set();
        let (nt, ns) = (test_shapes.size(), trial_shapes.size());
        let mut acc = [[Complex64::new(0.0, 0.0); 3]; 3];

        let mut add = |x: [f64; 2], y: [f64; 2], weight: f64| {
            let test_point = KernelPoint {
                position: test_geo.map(x[0], x[1]),
                normal: test_geo.normal,
            };
            let trial_point = KernelPoint {
                position: trial_geo.map(y[0], y[1]),
                normal: trial_geo.normal,
            };
            let value = self.kernel.evaluate(&test_point, &trial_point) * weight;
            let phi = test_shapes.evaluate(x[0], x[1]);
            let psi = trial_shapes.evaluate(y[0], y[1]);
            for i in 0..nt {
                for j in 0..ns {
                    acc[i][j] += value * (phi[i] * psi[j]);
                }
            }
        };

        let jacobian = test_geo.integration_element * trial_geo.integration_element;
        let pair = classify_pair(
            test_element,
            &grid.element_vertices(test_element),
            trial_element,
            &grid.element_vertices(trial_element),
        );
        if pair.topology == PairTopology::Disjoint {
            let rule = &self.regular_rules[regular_order(&self.accuracy, test_geo, trial_geo)];
            for p in rule {
                for q in rule {
                    add([p.s, p.t], [q.s, q.t], p.weight * q.weight * jacobian);
                }
            }
        } else {
            let rule = self.singular_rules.rule(&pair)?;
            for ((x, y), w) in rule
                .test_points
                .iter()
                .zip(&rule.trial_points)
                .zip(&rule.weights)
            {
                add(*x, *y, w * jacobian);
            }
        }

        Ok(Array2::from_shape_fn((nt, ns), |(i, j)| T::from_c64(acc[i][j])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::{TriangleGrid, cube_grid};
    use crate::core::kernel::{GreenFunction, GreenKernel, LayerKind};
    use crate::core::space::{PiecewiseConstantScalarSpace, PiecewiseLinearContinuousScalarSpace};
    use approx::assert_relative_eq;

    fn laplace(layer: LayerKind) -> Arc<dyn KernelEvaluator> {
        Arc::new(GreenKernel::new(GreenFunction::Laplace, layer).unwrap())
    }

    fn p0(grid: &Arc<dyn Grid>) -> Arc<dyn Space> {
        Arc::new(PiecewiseConstantScalarSpace::new(grid.clone()).unwrap())
    }

    #[test]
    fn test_coincident_integral_converges() {
        let grid: Arc<dyn Grid> = Arc::new(
            TriangleGrid::new(
                vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
                vec![[0, 1, 2]],
            )
            .unwrap(),
        );
        let space = p0(&grid);
        let self_integral = |singular_order: usize| {
            LocalAssembler::<f64>::new(
                space.clone(),
                space.clone(),
                laplace(LayerKind::SingleLayer),
                AccuracyOptions {
                    singular_order,
                    ..AccuracyOptions::default()
                },
            )
            .unwrap()
            .evaluate_pair(0, 0)
            .unwrap()[[0, 0]]
        };
        let coarse = self_integral(6);
        let medium = self_integral(10);
        let fine = self_integral(16);
        assert!(fine > 0.0);
        assert_relative_eq!(coarse, fine, max_relative = 1e-4);
        assert_relative_eq!(medium, fine, max_relative = 1e-8);
        assert!((medium - fine).abs() < (coarse - fine).abs());
    }

    #[test]
    fn test_double_layer_vanishes_on_flat_pairs() {
        // (y - x)·n_y = 0 when both points lie in one plane
        let grid: Arc<dyn Grid> = Arc::new(cube_grid(1).unwrap());
        let space = p0(&grid);
        let assembler = LocalAssembler::<f64>::new(
            space.clone(),
            space,
            laplace(LayerKind::DoubleLayer),
            AccuracyOptions::default(),
        )
        .unwrap();
        // elements 0 and 1 are the two triangles of the z = 0 face
        assert_relative_eq!(assembler.evaluate_pair(0, 1).unwrap()[[0, 0]], 0.0, epsilon = 1e-14);
        assert_relative_eq!(assembler.evaluate_pair(0, 0).unwrap()[[0, 0]], 0.0, epsilon = 1e-14);
    }

    #[test]
    fn test_self_block_of_single_layer_is_symmetric() {
        let grid: Arc<dyn Grid> = Arc::new(cube_grid(1).unwrap());
        let space: Arc<dyn Space> =
            Arc::new(PiecewiseLinearContinuousScalarSpace::new(grid.clone()).unwrap());
        let kernel: Arc<dyn KernelEvaluator> = Arc::new(
            GreenKernel::new(GreenFunction::ModifiedHelmholtz(0.5), LayerKind::SingleLayer)
                .unwrap(),
        );
        let assembler =
            LocalAssembler::<f64>::new(space.clone(), space, kernel, AccuracyOptions::default())
                .unwrap();
        let pair = assembler.evaluate_pair(0, 0).unwrap();
        assert_eq!(pair.dim(), (3, 3));
        // single layer weak form is symmetric
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(pair[[i, j]], pair[[j, i]], max_relative = 1e-10);
            }
        }
    }

    #[test]
    fn test_caching_returns_identical_values() {
        let grid: Arc<dyn Grid> = Arc::new(cube_grid(1).unwrap());
        let space = p0(&grid);
        let mut assembler = LocalAssembler::<f64>::new(
            space.clone(),
            space,
            laplace(LayerKind::SingleLayer),
            AccuracyOptions::default(),
        )
        .unwrap();
        let before = assembler.evaluate_pair(3, 4).unwrap();
        let cached = assembler.precompute_singular_integrals().unwrap();
        assert!(cached >= 12);
        assert_eq!(assembler.evaluate_pair(3, 4).unwrap(), before);

        let mut out = vec![Array2::zeros((1, 1)); 2];
        assert!(matches!(
            assembler.evaluate_test_batch(&[0, 1, 2], 5, &mut out),
            Err(AssemblyError::SizeMismatch { .. })
        ));
        assembler.evaluate_test_batch(&[0, 1], 5, &mut out).unwrap();
        assert_eq!(out[1], assembler.evaluate_pair(1, 5).unwrap());
    }

    #[test]
    fn test_rejects_incompatible_configurations() {
        let grid: Arc<dyn Grid> = Arc::new(cube_grid(1).unwrap());
        let other: Arc<dyn Grid> = Arc::new(cube_grid(1).unwrap());
        assert!(matches!(
            LocalAssembler::<f64>::new(
                p0(&grid),
                p0(&other),
                laplace(LayerKind::SingleLayer),
                AccuracyOptions::default()
            ),
            Err(AssemblyError::IncompatibleSpaces(_))
        ));

        let helmholtz: Arc<dyn KernelEvaluator> = Arc::new(
            GreenKernel::new(GreenFunction::Helmholtz(1.0), LayerKind::SingleLayer).unwrap(),
        );
        assert!(matches!(
            LocalAssembler::<f64>::new(p0(&grid), p0(&grid), helmholtz, AccuracyOptions::default()),
            Err(AssemblyError::UnsupportedConfiguration(_))
        ));

        let too_fine = AccuracyOptions {
            singular_order: 40,
            ..AccuracyOptions::default()
        };
        assert!(matches!(
            LocalAssembler::<f64>::new(
                p0(&grid),
                p0(&grid),
                laplace(LayerKind::SingleLayer),
                too_fine
            ),
            Err(AssemblyError::QuadratureOrderOutOfRange { .. })
        ));
    }
}
