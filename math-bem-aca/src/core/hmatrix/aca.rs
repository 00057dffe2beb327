//! Adaptive cross approximation with partial pivoting
//!
//! Builds `B ≈ Σ u_l v_lᵀ` from individual rows and columns of the block.
//! Step `k` evaluates row `i_k`, subtracts the current approximation, picks
//! the column `j_k` of largest residual modulus and evaluates that column:
//!
//! ```text
//! v_k = R(i_k, :)
//! u_k = R(:, j_k) / R(i_k, j_k)
//! ```
//!
//! The next row is the untried row where `|u_k|` is largest. Iteration stops
//! once `‖u_k‖ ‖v_k‖ <= ε ‖S_k‖_F`, with the Frobenius norm of the
//! approximation `S_k` updated incrementally.
//!
//! A residual entry counts as zero when it is below `1e-14` times the largest
//! entry sampled from the block so far, so the threshold follows the scale of
//! the block rather than an absolute floor.

use super::blocks::LowRankBlock;
use crate::core::error::Result;
use math_audio_linalg::ComplexField;
use ndarray::Array1;

/// Pivots below this multiple of the largest sampled entry count as zero
const ZERO_PIVOT_TOLERANCE: f64 = 1e-14;

/// Consecutive near-zero rows tolerated before checking a column
const MAX_ZERO_ROWS: usize = 3;

/// Row and column access to a matrix block
pub trait BlockOracle<T: ComplexField>: Sync {
    /// Number of rows
    fn rows(&self) -> usize;

    /// Number of columns
    fn cols(&self) -> usize;

    /// Write row `row` into `out` (length `cols()`)
    fn evaluate_row(&self, row: usize, out: &mut [T]) -> Result<()>;

    /// Write column `col` into `out` (length `rows()`)
    fn evaluate_column(&self, col: usize, out: &mut [T]) -> Result<()>;
}

/// Stopping parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcaSettings {
    /// Relative Frobenius tolerance
    pub eps: f64,
    /// Rank above which the block is stored dense
    pub max_rank: usize,
    /// Multiplier on the zero-pivot threshold, which is relative to the
    /// largest sampled entry
    pub scaling: f64,
}

/// Result of compressing one block
#[derive(Debug, Clone, PartialEq)]
pub enum AcaOutcome<T: ComplexField> {
    /// Converged approximation
    LowRank(LowRankBlock<T>),
    /// No acceptable approximation; the caller evaluates the block densely
    Dense,
}

/// Run partial-pivot ACA on a block
///
/// Returns [`AcaOutcome::Dense`] when the rank limit is hit before
/// convergence, when low-rank storage would exceed dense storage, or when
/// the residual cannot be certified after a run of zero rows. A rank-0 block
/// is returned only when every sampled entry is exactly zero. Errors come
/// only from the oracle.
pub fn partial_aca<T, O>(oracle: &O, settings: &AcaSettings) -> Result<AcaOutcome<T>>
where
    T: ComplexField,
    O: BlockOracle<T> + ?Sized,
{
    let (m, n) = (oracle.rows(), oracle.cols());
    if m == 0 || n == 0 {
        return Ok(AcaOutcome::LowRank(LowRankBlock::zero(m, n)));
    }

    let full_rank = m.min(n);
    let mut us: Vec<Array1<T>> = Vec::new();
    let mut vs: Vec<Array1<T>> = Vec::new();
    let mut row_tried = vec![false; m];
    let mut col_used = vec![false; n];
    let mut row = vec![T::zero(); n];
    let mut col = vec![T::zero(); m];

    let mut frob_sqr = 0.0;
    let mut largest_pivot: f64 = 0.0;
    let mut largest_entry: f64 = 0.0;
    let mut zero_rows = 0;
    let mut next_row = Some(0);

    loop {
        if us.len() == full_rank {
            break;
        }
        if us.len() >= settings.max_rank {
            return Ok(AcaOutcome::Dense);
        }
        let Some(i) = next_row else {
            break;
        };
        row_tried[i] = true;

        oracle.evaluate_row(i, &mut row)?;
        largest_entry = largest_entry.max(max_modulus(&row));
        for (ul, vl) in us.iter().zip(&vs) {
            let ui = ul[i];
            for (r, &v) in row.iter_mut().zip(vl.iter()) {
                *r -= ui * v;
            }
        }

        let tolerance = ZERO_PIVOT_TOLERANCE * settings.scaling * largest_entry.max(largest_pivot);
        let pivot_col = (0..n)
            .filter(|&j| !col_used[j])
            .map(|j| (j, row[j].modulus()))
            .fold(None, |best: Option<(usize, f64)>, (j, a)| match best {
                Some((_, b)) if b >= a => best,
                _ => Some((j, a)),
            });

        let Some((j, pivot_abs)) = pivot_col.filter(|&(_, a)| a > tolerance) else {
            zero_rows += 1;
            if zero_rows <= MAX_ZERO_ROWS {
                next_row = first_untried(&row_tried);
                continue;
            }
            // an unused column must vanish on the tried rows to certify the residual
            let Some(check_col) = col_used.iter().position(|used| !used) else {
                break;
            };
            oracle.evaluate_column(check_col, &mut col)?;
            largest_entry = largest_entry.max(max_modulus(&col));
            let tolerance = ZERO_PIVOT_TOLERANCE * settings.scaling * largest_entry.max(largest_pivot);
            subtract_column(&mut col, &us, &vs, check_col);
            let restart = (0..m)
                .filter(|&r| !row_tried[r])
                .map(|r| (r, col[r].modulus()))
                .filter(|&(_, a)| a > tolerance)
                .fold(None, |best: Option<(usize, f64)>, (r, a)| match best {
                    Some((_, b)) if b >= a => best,
                    _ => Some((r, a)),
                });
            let tried_residual = (0..m)
                .filter(|&r| row_tried[r])
                .any(|r| col[r].modulus() > tolerance);
            match restart {
                Some((r, _)) if !tried_residual => {
                    zero_rows = 0;
                    next_row = Some(r);
                    continue;
                }
                None if !tried_residual => break,
                _ => return Ok(AcaOutcome::Dense),
            }
        };

        zero_rows = 0;
        largest_pivot = largest_pivot.max(pivot_abs);
        col_used[j] = true;
        let pivot = row[j];

        oracle.evaluate_column(j, &mut col)?;
        largest_entry = largest_entry.max(max_modulus(&col));
        subtract_column(&mut col, &us, &vs, j);

        let inv_pivot = pivot.inv();
        let u: Array1<T> = col.iter().map(|&c| c * inv_pivot).collect();
        let v: Array1<T> = Array1::from_vec(row.clone());

        let u_norm = vector_norm(&u);
        let v_norm = vector_norm(&v);
        for (ul, vl) in us.iter().zip(&vs) {
            let uu = inner(ul, &u);
            let vv = inner(vl, &v);
            frob_sqr += 2.0 * (uu * vv).re;
        }
        frob_sqr += u_norm * u_norm * v_norm * v_norm;

        next_row = (0..m)
            .filter(|&r| !row_tried[r])
            .map(|r| (r, u[r].modulus()))
            .fold(None, |best: Option<(usize, f64)>, (r, a)| match best {
                Some((_, b)) if b >= a => best,
                _ => Some((r, a)),
            })
            .map(|(r, _)| r);

        us.push(u);
        vs.push(v);

        if u_norm * v_norm <= settings.eps * frob_sqr.max(0.0).sqrt() {
            break;
        }
    }

    let rank = us.len();
    if rank == 0 && largest_entry > 0.0 {
        log::trace!(
            "ACA found no pivot in a {m}x{n} block with entries up to {largest_entry:e}"
        );
        return Ok(AcaOutcome::Dense);
    }
    if rank * (m + n) > m * n {
        return Ok(AcaOutcome::Dense);
    }
    Ok(AcaOutcome::LowRank(LowRankBlock::from_terms(m, n, &us, &vs)))
}

fn max_modulus<T: ComplexField>(values: &[T]) -> f64 {
    values.iter().fold(0.0, |m, v| m.max(v.modulus()))
}

fn first_untried(tried: &[bool]) -> Option<usize> {
    tried.iter().position(|t| !t)
}

fn subtract_column<T: ComplexField>(col: &mut [T], us: &[Array1<T>], vs: &[Array1<T>], j: usize) {
    for (ul, vl) in us.iter().zip(vs) {
        let vj = vl[j];
        for (c, &u) in col.iter_mut().zip(ul.iter()) {
            *c -= u * vj;
        }
    }
}

/// `aᴴ b` in double precision
fn inner<T: ComplexField>(a: &Array1<T>, b: &Array1<T>) -> num_complex::Complex64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| x.to_c64().conj() * y.to_c64())
        .sum()
}

fn vector_norm<T: ComplexField>(a: &Array1<T>) -> f64 {
    a.iter().map(|x| x.to_c64().norm_sqr()).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use math_audio_linalg::relative_frobenius_error;
    use ndarray::Array2;
    use num_complex::Complex64;

    struct MatrixOracle<T: ComplexField>(Array2<T>);

    impl<T: ComplexField> BlockOracle<T> for MatrixOracle<T> {
        fn rows(&self) -> usize {
            self.0.nrows()
        }
        fn cols(&self) -> usize {
            self.0.ncols()
        }
        fn evaluate_row(&self, row: usize, out: &mut [T]) -> Result<()> {
            for (o, v) in out.iter_mut().zip(self.0.row(row)) {
                *o = *v;
            }
            Ok(())
        }
        fn evaluate_column(&self, col: usize, out: &mut [T]) -> Result<()> {
            for (o, v) in out.iter_mut().zip(self.0.column(col)) {
                *o = *v;
            }
            Ok(())
        }
    }

    fn settings(eps: f64) -> AcaSettings {
        AcaSettings {
            eps,
            max_rank: usize::MAX,
            scaling: 1.0,
        }
    }

    fn separated_kernel(m: usize, n: usize) -> Array2<f64> {
        Array2::from_shape_fn((m, n), |(i, j)| {
            let x = i as f64 / m as f64;
            let y = 3.0 + j as f64 / n as f64;
            1.0 / (y - x)
        })
    }

    #[test]
    fn test_recovers_exact_low_rank() {
        // rank 3 by construction
        let m = Array2::from_shape_fn((40, 30), |(i, j)| {
            let (x, y) = (i as f64, j as f64);
            1.0 + x * y + (0.1 * x).sin() * (0.2 * y).cos()
        });
        let AcaOutcome::LowRank(block) = partial_aca(&MatrixOracle(m.clone()), &settings(1e-8)).unwrap() else {
            panic!("rank-3 block should compress");
        };
        assert_eq!(block.rank(), 3);
        let approx = block.u.dot(&block.v.t());
        assert!(relative_frobenius_error(&approx, &m) < 1e-8);
    }

    #[test]
    fn test_smooth_kernel_accuracy() {
        let m = separated_kernel(60, 50);
        for eps in [1e-3, 1e-6, 1e-9] {
            let AcaOutcome::LowRank(block) = partial_aca(&MatrixOracle(m.clone()), &settings(eps)).unwrap() else {
                panic!("separated kernel should compress");
            };
            let approx = block.u.dot(&block.v.t());
            assert!(relative_frobenius_error(&approx, &m) < 10.0 * eps, "eps = {eps}");
            assert!(block.rank() < 25);
        }
    }

    #[test]
    fn test_complex_block() {
        let m = Array2::from_shape_fn((32, 24), |(i, j)| {
            let r = 4.0 + j as f64 / 24.0 - i as f64 / 32.0;
            Complex64::new(0.0, 2.0 * r).exp() / r
        });
        let AcaOutcome::LowRank(block) = partial_aca(&MatrixOracle(m.clone()), &settings(1e-6)).unwrap() else {
            panic!("complex kernel should compress");
        };
        let approx = block.u.dot(&block.v.t());
        assert!(relative_frobenius_error(&approx, &m) < 1e-5);
    }

    #[test]
    fn test_zero_block_has_rank_zero() {
        let m = Array2::<f64>::zeros((20, 10));
        let outcome = partial_aca(&MatrixOracle(m), &settings(1e-4)).unwrap();
        assert_eq!(outcome, AcaOutcome::LowRank(LowRankBlock::zero(20, 10)));
    }

    #[test]
    fn test_tiny_entries_compress_like_unit_entries() {
        let unit = separated_kernel(48, 40);
        let tiny = unit.mapv(|v| v * 1e-16);
        let AcaOutcome::LowRank(reference) = partial_aca(&MatrixOracle(unit), &settings(1e-8)).unwrap() else {
            panic!("separated kernel should compress");
        };
        let AcaOutcome::LowRank(block) = partial_aca(&MatrixOracle(tiny.clone()), &settings(1e-8)).unwrap() else {
            panic!("scaled kernel should compress");
        };
        assert!(block.rank() > 0);
        assert!(block.rank().abs_diff(reference.rank()) <= 1);
        let approx = block.u.dot(&block.v.t());
        assert!(relative_frobenius_error(&approx, &tiny) < 1e-7);
    }

    #[test]
    fn test_unresolved_nonzero_block_is_dense() {
        // threshold above every entry, so no pivot is ever accepted
        let m = separated_kernel(20, 20);
        let blind = AcaSettings {
            scaling: 1e15,
            ..settings(1e-6)
        };
        assert_eq!(
            partial_aca(&MatrixOracle(m), &blind).unwrap(),
            AcaOutcome::Dense
        );
    }

    #[test]
    fn test_rank_limit_demotes_to_dense() {
        let m = separated_kernel(40, 40);
        let limited = AcaSettings {
            max_rank: 2,
            ..settings(1e-12)
        };
        assert_eq!(
            partial_aca(&MatrixOracle(m), &limited).unwrap(),
            AcaOutcome::Dense
        );
    }

    #[test]
    fn test_full_rank_block_stays_dense() {
        let m = Array2::from_shape_fn((6, 6), |(i, j)| if i == j { 1.0 } else { 0.0 });
        assert_eq!(
            partial_aca(&MatrixOracle(m), &settings(1e-6)).unwrap(),
            AcaOutcome::Dense
        );
    }

    #[test]
    fn test_late_nonzero_rows_are_found() {
        // only the last rows are non-zero
        let mut m = Array2::<f64>::zeros((30, 30));
        for i in 25..30 {
            for j in 0..30 {
                m[[i, j]] = 1.0 + j as f64;
            }
        }
        let AcaOutcome::LowRank(block) = partial_aca(&MatrixOracle(m.clone()), &settings(1e-8)).unwrap() else {
            panic!("rank-1 block should compress");
        };
        assert_eq!(block.rank(), 1);
        let approx = block.u.dot(&block.v.t());
        assert!(relative_frobenius_error(&approx, &m) < 1e-12);
    }
}
