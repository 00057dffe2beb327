//! Leaf payloads of a hierarchical matrix

use math_audio_linalg::{ComplexField, TransposeMode};
use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1};

/// Low-rank factorization `B ≈ U · Vᵀ`
#[derive(Debug, Clone, PartialEq)]
pub struct LowRankBlock<T: ComplexField> {
    /// Left factor, `rows × rank`
    pub u: Array2<T>,
    /// Right factor, `cols × rank`
    pub v: Array2<T>,
}

impl<T: ComplexField> LowRankBlock<T> {
    /// Rank-0 block of the given shape
    pub fn zero(rows: usize, cols: usize) -> Self {
        Self {
            u: Array2::zeros((rows, 0)),
            v: Array2::zeros((cols, 0)),
        }
    }

    /// Stack rank-one terms `u_l v_lᵀ` into factors
    pub fn from_terms(rows: usize, cols: usize, us: &[Array1<T>], vs: &[Array1<T>]) -> Self {
        let rank = us.len();
        let mut u = Array2::zeros((rows, rank));
        let mut v = Array2::zeros((cols, rank));
        for (l, (ul, vl)) in us.iter().zip(vs).enumerate() {
            u.column_mut(l).assign(ul);
            v.column_mut(l).assign(vl);
        }
        Self { u, v }
    }

    /// Number of rank-one terms
    pub fn rank(&self) -> usize {
        self.u.ncols()
    }

    /// Entry `(i, j)` of `U · Vᵀ`
    pub fn entry(&self, i: usize, j: usize) -> T {
        let mut sum = T::zero();
        for k in 0..self.rank() {
            sum += self.u[[i, k]] * self.v[[j, k]];
        }
        sum
    }
}

/// Payload of a leaf block
#[derive(Debug, Clone, PartialEq)]
pub enum BlockData<T: ComplexField> {
    /// Plain `rows × cols` matrix
    Dense(Array2<T>),
    /// Low-rank factors
    LowRank(LowRankBlock<T>),
}

impl<T: ComplexField> BlockData<T> {
    /// Number of rows
    pub fn num_rows(&self) -> usize {
        match self {
            Self::Dense(m) => m.nrows(),
            Self::LowRank(lr) => lr.u.nrows(),
        }
    }

    /// Number of columns
    pub fn num_cols(&self) -> usize {
        match self {
            Self::Dense(m) => m.ncols(),
            Self::LowRank(lr) => lr.v.nrows(),
        }
    }

    /// Rank of a low-rank payload
    pub fn rank(&self) -> Option<usize> {
        match self {
            Self::Dense(_) => None,
            Self::LowRank(lr) => Some(lr.rank()),
        }
    }

    /// Number of scalars held
    pub fn stored_entries(&self) -> usize {
        match self {
            Self::Dense(m) => m.len(),
            Self::LowRank(lr) => lr.u.len() + lr.v.len(),
        }
    }

    /// Materialize the block
    pub fn to_dense(&self) -> Array2<T> {
        match self {
            Self::Dense(m) => m.clone(),
            Self::LowRank(lr) => lr.u.dot(&lr.v.t()),
        }
    }

    /// `y += op(B) x` for the given mode
    ///
    /// `x` has `cols` entries and `y` has `rows` entries, swapped for transposed modes.
    pub fn apply_add(&self, mode: TransposeMode, x: ArrayView1<T>, mut y: ArrayViewMut1<T>) {
        let transposed = mode.is_transposed();
        if mode.is_conjugated() {
            // conj(B) x = conj(B conj(x))
            let xc = x.mapv(|v| v.conj());
            let product = self.product(transposed, xc.view());
            y.zip_mut_with(&product, |yi, &p| *yi += p.conj());
        } else {
            let product = self.product(transposed, x);
            y.zip_mut_with(&product, |yi, &p| *yi += p);
        }
    }

    fn product(&self, transposed: bool, x: ArrayView1<T>) -> Array1<T> {
        match (self, transposed) {
            (Self::Dense(m), false) => m.dot(&x),
            (Self::Dense(m), true) => m.t().dot(&x),
            (Self::LowRank(lr), false) => lr.u.dot(&lr.v.t().dot(&x)),
            (Self::LowRank(lr), true) => lr.v.dot(&lr.u.t().dot(&x)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use num_complex::Complex64;

    #[test]
    fn test_low_rank_matches_dense() {
        let u = array![[1.0, 0.5], [2.0, -1.0], [0.0, 3.0]];
        let v = array![[1.0, 1.0], [0.0, 2.0]];
        let lr = BlockData::LowRank(LowRankBlock { u, v });
        let dense = BlockData::Dense(lr.to_dense());
        assert_eq!(lr.stored_entries(), 10);
        assert_eq!(dense.stored_entries(), 6);

        let x = array![1.0, -2.0];
        let mut y1 = Array1::zeros(3);
        let mut y2 = Array1::zeros(3);
        lr.apply_add(TransposeMode::NoTranspose, x.view(), y1.view_mut());
        dense.apply_add(TransposeMode::NoTranspose, x.view(), y2.view_mut());
        for i in 0..3 {
            assert_relative_eq!(y1[i], y2[i], epsilon = 1e-14);
        }

        let xt = array![1.0, 0.0, 2.0];
        let mut z = Array1::zeros(2);
        lr.apply_add(TransposeMode::Transpose, xt.view(), z.view_mut());
        let expected = dense.to_dense().t().dot(&xt);
        assert_relative_eq!(z[0], expected[0], epsilon = 1e-14);
        assert_relative_eq!(z[1], expected[1], epsilon = 1e-14);
    }

    #[test]
    fn test_conjugated_modes() {
        let i = Complex64::new(0.0, 1.0);
        let one = Complex64::new(1.0, 0.0);
        let block = BlockData::Dense(array![[i, one], [one + i, -i]]);
        let x = array![one, i];
        let mut y = Array1::zeros(2);
        block.apply_add(TransposeMode::ConjugateTranspose, x.view(), y.view_mut());
        // Aᴴ x
        let expected = block.to_dense().t().mapv(|v| v.conj()).dot(&x);
        assert_relative_eq!(y[0].re, expected[0].re, epsilon = 1e-14);
        assert_relative_eq!(y[1].im, expected[1].im, epsilon = 1e-14);

        let lr = LowRankBlock::<Complex64>::zero(3, 4);
        assert_eq!(lr.rank(), 0);
        assert_eq!(lr.entry(2, 3), Complex64::new(0.0, 0.0));
    }
}
