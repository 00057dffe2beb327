//! Compressed Sparse Row (CSR) matrix format
//!
//! Used for mass matrices and for the 0/1 maps between global and
//! flat-local degree-of-freedom numberings. CSR format stores:
//! - `values`: Non-zero entries in row-major order
//! - `col_indices`: Column index for each value
//! - `row_ptrs`: Index into values/col_indices where each row starts

use crate::error::{LinalgError, Result};
use crate::traits::{ComplexField, LinearOperator};
use ndarray::{Array1, Array2};
use std::ops::Range;

#[cfg(feature = "native")]
use rayon::prelude::*;

/// Rows below this count are multiplied sequentially.
#[cfg(feature = "native")]
const PARALLEL_ROW_THRESHOLD: usize = 256;

/// Compressed Sparse Row (CSR) matrix
#[derive(Debug, Clone)]
pub struct CsrMatrix<T: ComplexField> {
    num_rows: usize,
    num_cols: usize,
    values: Vec<T>,
    col_indices: Vec<usize>,
    row_ptrs: Vec<usize>,
}

impl<T: ComplexField> CsrMatrix<T> {
    /// Create a new empty CSR matrix
    pub fn new(num_rows: usize, num_cols: usize) -> Self {
        Self {
            num_rows,
            num_cols,
            values: Vec::new(),
            col_indices: Vec::new(),
            row_ptrs: vec![0; num_rows + 1],
        }
    }

    /// Create a CSR matrix from COO (Coordinate) triplets `(row, col, value)`.
    ///
    /// Duplicate entries are summed. Entries outside the matrix are rejected.
    pub fn from_triplets(
        num_rows: usize,
        num_cols: usize,
        mut triplets: Vec<(usize, usize, T)>,
    ) -> Result<Self> {
        if let Some(&(row, col, _)) = triplets
            .iter()
            .find(|(r, c, _)| *r >= num_rows || *c >= num_cols)
        {
            return Err(LinalgError::IndexOutOfBounds {
                row,
                col,
                num_rows,
                num_cols,
            });
        }

        triplets.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let mut values: Vec<T> = Vec::with_capacity(triplets.len());
        let mut col_indices: Vec<usize> = Vec::with_capacity(triplets.len());
        let mut row_counts = vec![0usize; num_rows];
        let mut last: Option<(usize, usize)> = None;

        for (row, col, val) in triplets {
            if last == Some((row, col)) {
                if let Some(v) = values.last_mut() {
                    *v += val;
                }
                continue;
            }
            values.push(val);
            col_indices.push(col);
            row_counts[row] += 1;
            last = Some((row, col));
        }

        let mut row_ptrs = Vec::with_capacity(num_rows + 1);
        row_ptrs.push(0);
        for count in row_counts {
            let next = row_ptrs[row_ptrs.len() - 1] + count;
            row_ptrs.push(next);
        }

        Ok(Self {
            num_rows,
            num_cols,
            values,
            col_indices,
            row_ptrs,
        })
    }

    /// Number of non-zero entries
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Get the range of indices in values/col_indices for a given row
    pub fn row_range(&self, row: usize) -> Range<usize> {
        self.row_ptrs[row]..self.row_ptrs[row + 1]
    }

    /// Get the (col, value) pairs for a row
    pub fn row_entries(&self, row: usize) -> impl Iterator<Item = (usize, T)> + '_ {
        let range = self.row_range(row);
        self.col_indices[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    /// Get element at (i, j), returns 0 if not stored
    pub fn get(&self, i: usize, j: usize) -> T {
        self.row_entries(i)
            .find(|(col, _)| *col == j)
            .map(|(_, v)| v)
            .unwrap_or_else(T::zero)
    }

    /// Matrix-vector product: y = A * x
    ///
    /// Uses rayon when the `native` feature is enabled and the matrix has
    /// enough rows to benefit from it.
    pub fn matvec(&self, x: &Array1<T>) -> Array1<T> {
        assert_eq!(x.len(), self.num_cols, "Input vector size mismatch");

        #[cfg(feature = "native")]
        {
            if self.num_rows >= PARALLEL_ROW_THRESHOLD {
                let results: Vec<T> = (0..self.num_rows)
                    .into_par_iter()
                    .map(|i| self.row_dot(i, x))
                    .collect();
                return Array1::from_vec(results);
            }
        }

        Array1::from_shape_fn(self.num_rows, |i| self.row_dot(i, x))
    }

    #[inline]
    fn row_dot(&self, row: usize, x: &Array1<T>) -> T {
        let mut sum = T::zero();
        for idx in self.row_range(row) {
            sum += self.values[idx] * x[self.col_indices[idx]];
        }
        sum
    }

    /// Transpose matrix-vector product: y = A^T * x
    pub fn matvec_transpose(&self, x: &Array1<T>) -> Array1<T> {
        assert_eq!(x.len(), self.num_rows, "Input vector size mismatch");

        let mut y = Array1::from_elem(self.num_cols, T::zero());
        for i in 0..self.num_rows {
            for idx in self.row_range(i) {
                y[self.col_indices[idx]] += self.values[idx] * x[i];
            }
        }
        y
    }

    /// Explicit transpose
    pub fn transpose(&self) -> Self {
        let triplets = (0..self.num_rows)
            .flat_map(|i| self.row_entries(i).map(move |(j, v)| (j, i, v)))
            .collect();
        // entries come from a valid matrix, so the bounds check cannot fail
        Self::from_triplets(self.num_cols, self.num_rows, triplets)
            .unwrap_or_else(|_| Self::new(self.num_cols, self.num_rows))
    }

    /// Convert to dense matrix (for debugging/small matrices)
    pub fn to_dense(&self) -> Array2<T> {
        let mut dense = Array2::from_elem((self.num_rows, self.num_cols), T::zero());
        for i in 0..self.num_rows {
            for (j, v) in self.row_entries(i) {
                dense[[i, j]] = v;
            }
        }
        dense
    }
}

impl<T: ComplexField> LinearOperator<T> for CsrMatrix<T> {
    fn num_rows(&self) -> usize {
        self.num_rows
    }

    fn num_cols(&self) -> usize {
        self.num_cols
    }

    fn apply(&self, x: &Array1<T>) -> Array1<T> {
        self.matvec(x)
    }

    fn apply_transpose(&self, x: &Array1<T>) -> Array1<T> {
        self.matvec_transpose(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use num_complex::Complex64;

    #[test]
    fn test_from_triplets_sums_duplicates() {
        let triplets = vec![
            (1, 0, 2.0),
            (0, 1, 1.0),
            (1, 0, 3.0),
            (2, 2, -1.0),
        ];
        let m = CsrMatrix::from_triplets(3, 3, triplets).unwrap();
        assert_eq!(m.nnz(), 3);
        assert_relative_eq!(m.get(1, 0), 5.0);
        assert_relative_eq!(m.get(0, 1), 1.0);
        assert_relative_eq!(m.get(2, 2), -1.0);
        assert_relative_eq!(m.get(0, 0), 0.0);
    }

    #[test]
    fn test_from_triplets_rejects_out_of_range() {
        let result = CsrMatrix::from_triplets(2, 2, vec![(0, 2, 1.0)]);
        assert!(matches!(
            result,
            Err(LinalgError::IndexOutOfBounds { row: 0, col: 2, .. })
        ));
    }

    #[test]
    fn test_matvec_matches_dense() {
        let triplets = vec![
            (0, 0, Complex64::new(1.0, 1.0)),
            (0, 2, Complex64::new(0.0, 2.0)),
            (1, 1, Complex64::new(3.0, 0.0)),
            (3, 0, Complex64::new(-1.0, 0.5)),
        ];
        let m = CsrMatrix::from_triplets(4, 3, triplets).unwrap();
        let dense = m.to_dense();
        let x = Array1::from_vec(vec![
            Complex64::new(1.0, 0.0),
            Complex64::new(2.0, -1.0),
            Complex64::new(0.0, 1.0),
        ]);
        let y = m.matvec(&x);
        let y_ref = dense.dot(&x);
        for (a, b) in y.iter().zip(y_ref.iter()) {
            assert_relative_eq!(a.re, b.re);
            assert_relative_eq!(a.im, b.im);
        }

        let z = Array1::from_vec(vec![Complex64::new(1.0, 0.0); 4]);
        let t = m.matvec_transpose(&z);
        let t_ref = dense.t().dot(&z);
        for (a, b) in t.iter().zip(t_ref.iter()) {
            assert_relative_eq!(a.re, b.re);
            assert_relative_eq!(a.im, b.im);
        }
        assert_eq!(m.transpose().to_dense(), dense.t().to_owned());
    }
}
