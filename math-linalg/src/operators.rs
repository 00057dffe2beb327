//! Composable linear operators
//!
//! Small building blocks for the operator-algebra layer: a dense matrix wrapper,
//! linear combinations, products and transposed views of other operators.

use crate::error::{LinalgError, Result};
use crate::traits::{ComplexField, LinearOperator, TransposeMode};
use ndarray::{Array1, Array2};
use std::sync::Arc;

/// Shared handle to any linear operator
pub type SharedOperator<T> = Arc<dyn LinearOperator<T>>;

/// Dense matrix operator
#[derive(Debug, Clone)]
pub struct DenseOperator<T: ComplexField> {
    matrix: Array2<T>,
}

impl<T: ComplexField> DenseOperator<T> {
    /// Wrap a dense matrix
    pub fn new(matrix: Array2<T>) -> Self {
        Self { matrix }
    }

    /// Borrow the underlying matrix
    pub fn matrix(&self) -> &Array2<T> {
        &self.matrix
    }
}

impl<T: ComplexField> LinearOperator<T> for DenseOperator<T> {
    fn num_rows(&self) -> usize {
        self.matrix.nrows()
    }

    fn num_cols(&self) -> usize {
        self.matrix.ncols()
    }

    fn apply(&self, x: &Array1<T>) -> Array1<T> {
        self.matrix.dot(x)
    }

    fn apply_transpose(&self, x: &Array1<T>) -> Array1<T> {
        self.matrix.t().dot(x)
    }
}

/// Weighted sum `Σ αᵢ Aᵢ` of operators with identical shapes
pub struct SumOperator<T: ComplexField> {
    terms: Vec<(T, SharedOperator<T>)>,
    num_rows: usize,
    num_cols: usize,
}

impl<T: ComplexField> SumOperator<T> {
    /// Build a linear combination.
    ///
    /// Fails when the list is empty or the shapes differ.
    pub fn new(terms: Vec<(T, SharedOperator<T>)>) -> Result<Self> {
        let (num_rows, num_cols) = match terms.first() {
            Some((_, op)) => (op.num_rows(), op.num_cols()),
            None => return Err(LinalgError::EmptyCombination),
        };
        for (_, op) in &terms {
            if op.num_rows() != num_rows || op.num_cols() != num_cols {
                return Err(LinalgError::ShapeMismatch {
                    expected: (num_rows, num_cols),
                    found: (op.num_rows(), op.num_cols()),
                });
            }
        }
        Ok(Self {
            terms,
            num_rows,
            num_cols,
        })
    }

    /// Number of terms
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Whether the combination is empty (never true for a constructed sum)
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    fn accumulate(&self, x: &Array1<T>, len: usize, transposed: bool) -> Array1<T> {
        let mut y = Array1::zeros(len);
        for (alpha, op) in &self.terms {
            let part = if transposed {
                op.apply_transpose(x)
            } else {
                op.apply(x)
            };
            y.scaled_add(*alpha, &part);
        }
        y
    }
}

impl<T: ComplexField> LinearOperator<T> for SumOperator<T> {
    fn num_rows(&self) -> usize {
        self.num_rows
    }

    fn num_cols(&self) -> usize {
        self.num_cols
    }

    fn apply(&self, x: &Array1<T>) -> Array1<T> {
        self.accumulate(x, self.num_rows, false)
    }

    fn apply_transpose(&self, x: &Array1<T>) -> Array1<T> {
        self.accumulate(x, self.num_cols, true)
    }
}

/// Product `A · B` evaluated right to left
pub struct ProductOperator<T: ComplexField> {
    left: SharedOperator<T>,
    right: SharedOperator<T>,
}

impl<T: ComplexField> ProductOperator<T> {
    /// Compose two operators; the inner dimensions must agree
    pub fn new(left: SharedOperator<T>, right: SharedOperator<T>) -> Result<Self> {
        if left.num_cols() != right.num_rows() {
            return Err(LinalgError::DimensionMismatch {
                context: "operator product",
                expected: left.num_cols(),
                found: right.num_rows(),
            });
        }
        Ok(Self { left, right })
    }
}

impl<T: ComplexField> LinearOperator<T> for ProductOperator<T> {
    fn num_rows(&self) -> usize {
        self.left.num_rows()
    }

    fn num_cols(&self) -> usize {
        self.right.num_cols()
    }

    fn apply(&self, x: &Array1<T>) -> Array1<T> {
        self.left.apply(&self.right.apply(x))
    }

    fn apply_transpose(&self, x: &Array1<T>) -> Array1<T> {
        self.right.apply_transpose(&self.left.apply_transpose(x))
    }
}

/// View of an operator under a [`TransposeMode`]
pub struct TransposedOperator<T: ComplexField> {
    mode: TransposeMode,
    inner: SharedOperator<T>,
}

impl<T: ComplexField> TransposedOperator<T> {
    /// Wrap `inner` so that `apply` performs `inner.apply_mode(mode, x)`
    pub fn new(mode: TransposeMode, inner: SharedOperator<T>) -> Self {
        Self { mode, inner }
    }

    /// The wrapped mode
    pub fn mode(&self) -> TransposeMode {
        self.mode
    }
}

impl<T: ComplexField> LinearOperator<T> for TransposedOperator<T> {
    fn num_rows(&self) -> usize {
        if self.mode.is_transposed() {
            self.inner.num_cols()
        } else {
            self.inner.num_rows()
        }
    }

    fn num_cols(&self) -> usize {
        if self.mode.is_transposed() {
            self.inner.num_rows()
        } else {
            self.inner.num_cols()
        }
    }

    fn apply(&self, x: &Array1<T>) -> Array1<T> {
        self.inner.apply_mode(self.mode, x)
    }

    fn apply_transpose(&self, x: &Array1<T>) -> Array1<T> {
        self.inner
            .apply_mode(TransposeMode::Transpose.compose(self.mode), x)
    }
}

/// Materialize an operator column by column.
///
/// Intended for small operators in tests and diagnostics.
pub fn to_dense<T: ComplexField>(op: &dyn LinearOperator<T>) -> Array2<T> {
    let (m, n) = (op.num_rows(), op.num_cols());
    let mut dense = Array2::zeros((m, n));
    let mut unit = Array1::zeros(n);
    for j in 0..n {
        unit[j] = T::one();
        let column = op.apply(&unit);
        dense.column_mut(j).assign(&column);
        unit[j] = T::zero();
    }
    dense
}

/// Frobenius norm of a dense matrix
pub fn frobenius_norm<T: ComplexField>(matrix: &Array2<T>) -> f64 {
    matrix
        .iter()
        .map(|v| v.to_c64().norm_sqr())
        .sum::<f64>()
        .sqrt()
}

/// Relative Frobenius distance `‖A − B‖ / ‖B‖` (absolute when `B` is zero)
pub fn relative_frobenius_error<T: ComplexField>(a: &Array2<T>, b: &Array2<T>) -> f64 {
    let diff = a - b;
    let reference = frobenius_norm(b);
    let err = frobenius_norm(&diff);
    if reference > 0.0 {
        err / reference
    } else {
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use num_complex::Complex64;

    fn shared(m: Array2<f64>) -> SharedOperator<f64> {
        Arc::new(DenseOperator::new(m))
    }

    #[test]
    fn test_sum_and_product() {
        let a = array![[1.0, 2.0], [3.0, 4.0]];
        let b = array![[0.0, 1.0], [1.0, 0.0]];
        let sum = SumOperator::new(vec![(2.0, shared(a.clone())), (-1.0, shared(b.clone()))])
            .unwrap();
        let dense = to_dense(&sum);
        assert_relative_eq!(dense[[0, 1]], 3.0);
        assert_relative_eq!(dense[[1, 0]], 5.0);

        let prod = ProductOperator::new(shared(a.clone()), shared(b.clone())).unwrap();
        let expected = a.dot(&b);
        assert!(relative_frobenius_error(&to_dense(&prod), &expected) < 1e-14);
        let expected_t = expected.t().to_owned();
        let x = array![1.0, -1.0];
        let y = prod.apply_transpose(&x);
        let y_ref = expected_t.dot(&x);
        assert_relative_eq!(y[0], y_ref[0]);
        assert_relative_eq!(y[1], y_ref[1]);
    }

    #[test]
    fn test_sum_rejects_mismatched_shapes() {
        let a = shared(Array2::zeros((2, 2)));
        let b = shared(Array2::zeros((3, 2)));
        assert!(SumOperator::new(vec![(1.0, a), (1.0, b)]).is_err());
        assert!(SumOperator::<f64>::new(Vec::new()).is_err());
    }

    #[test]
    fn test_transposed_view() {
        let m = array![
            [Complex64::new(1.0, 1.0), Complex64::new(2.0, 0.0)],
            [Complex64::new(0.0, -3.0), Complex64::new(4.0, 2.0)],
            [Complex64::new(5.0, 0.5), Complex64::new(0.0, 1.0)]
        ];
        let inner: SharedOperator<Complex64> = Arc::new(DenseOperator::new(m.clone()));
        let herm = TransposedOperator::new(TransposeMode::ConjugateTranspose, inner);
        assert_eq!(herm.num_rows(), 2);
        assert_eq!(herm.num_cols(), 3);
        let expected = m.t().mapv(|v| v.conj());
        assert!(relative_frobenius_error(&to_dense(&herm), &expected) < 1e-14);

        // the transpose of the adjoint is the conjugate
        let x = Array1::from_vec(vec![Complex64::new(1.0, 0.0), Complex64::new(0.0, 1.0)]);
        let y = herm.apply_transpose(&x);
        let y_ref = m.mapv(|v| v.conj()).dot(&x);
        for (a, b) in y.iter().zip(y_ref.iter()) {
            assert_relative_eq!(a.re, b.re, epsilon = 1e-14);
            assert_relative_eq!(a.im, b.im, epsilon = 1e-14);
        }
    }
}
