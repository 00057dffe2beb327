//! Gauss-Legendre quadrature rules
//!
//! Nodes are the roots of the Legendre polynomial `P_n`, found by Newton
//! iteration from the Chebyshev-like initial guess; weights follow from
//! `P_n'`. Accurate to machine precision for every supported order.

use crate::core::error::{AssemblyError, Result};
use std::f64::consts::PI;

/// Largest supported number of Gauss points per direction
pub const MAX_QUADRATURE_ORDER: usize = 30;

/// Gauss-Legendre abscissas and weights on `[-1, 1]`
///
/// Returns (points, weights) with points in ascending order.
pub fn gauss_legendre(order: usize) -> Result<(Vec<f64>, Vec<f64>)> {
    if !(1..=MAX_QUADRATURE_ORDER).contains(&order) {
        return Err(AssemblyError::QuadratureOrderOutOfRange {
            requested: order,
            maximum: MAX_QUADRATURE_ORDER,
        });
    }

    let n = order;
    let mut points = vec![0.0; n];
    let mut weights = vec![0.0; n];
    for i in 0..n.div_ceil(2) {
        let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        for _ in 0..100 {
            let (p, dp) = legendre_with_derivative(n, x);
            let dx = p / dp;
            x -= dx;
            if dx.abs() < 1e-15 {
                break;
            }
        }
        let (_, dp) = legendre_with_derivative(n, x);
        let w = 2.0 / ((1.0 - x * x) * dp * dp);
        points[i] = -x;
        points[n - 1 - i] = x;
        weights[i] = w;
        weights[n - 1 - i] = w;
    }
    if n % 2 == 1 {
        points[n / 2] = 0.0;
    }
    Ok((points, weights))
}

/// `(P_n(x), P_n'(x))` by the three-term recurrence
fn legendre_with_derivative(n: usize, x: f64) -> (f64, f64) {
    let mut p0 = 1.0;
    let mut p1 = x;
    for k in 2..=n {
        let kf = k as f64;
        let p2 = ((2.0 * kf - 1.0) * x * p1 - (kf - 1.0) * p0) / kf;
        p0 = p1;
        p1 = p2;
    }
    let p = if n == 0 { 1.0 } else { p1 };
    let dp = n as f64 * (x * p - p0) / (x * x - 1.0);
    (p, dp)
}

/// Gauss-Legendre rule mapped to `[0, 1]`
pub fn gauss_legendre_unit(order: usize) -> Result<(Vec<f64>, Vec<f64>)> {
    let (points, weights) = gauss_legendre(order)?;
    Ok((
        points.iter().map(|x| 0.5 * (x + 1.0)).collect(),
        weights.iter().map(|w| 0.5 * w).collect(),
    ))
}

/// Point of a rule on the reference triangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrianglePoint {
    /// First reference coordinate
    pub s: f64,
    /// Second reference coordinate
    pub t: f64,
    /// Weight; the weights sum to 1/2
    pub weight: f64,
}

/// Collapsed (Duffy) Gauss rule on `{s, t >= 0, s + t <= 1}` with `order²` points
///
/// Integrates polynomials of total degree `2 order - 2` exactly.
pub fn triangle_quadrature(order: usize) -> Result<Vec<TrianglePoint>> {
    let (x, w) = gauss_legendre_unit(order)?;
    let mut rule = Vec::with_capacity(order * order);
    for (&u, &wu) in x.iter().zip(&w) {
        for (&v, &wv) in x.iter().zip(&w) {
            rule.push(TrianglePoint {
                s: u,
                t: (1.0 - u) * v,
                weight: wu * wv * (1.0 - u),
            });
        }
    }
    Ok(rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gauss_legendre_2() {
        let (x, w) = gauss_legendre(2).unwrap();
        assert_eq!(x.len(), 2);
        assert_relative_eq!(x[0], -0.5773502691896257, epsilon = 1e-14);
        assert_relative_eq!(w[0], 1.0, epsilon = 1e-14);
    }

    #[test]
    fn test_gauss_weights_sum() {
        for n in 1..=MAX_QUADRATURE_ORDER {
            let (x, w) = gauss_legendre(n).unwrap();
            let sum: f64 = w.iter().sum();
            assert_relative_eq!(sum, 2.0, epsilon = 1e-13);
            assert!(x.windows(2).all(|p| p[0] < p[1]), "n={n} not sorted");
        }
    }

    #[test]
    fn test_polynomial_exactness() {
        // ∫_{-1}^{1} x^(2n-2) dx = 2 / (2n-1)
        for n in [3, 7, 12, 20] {
            let (x, w) = gauss_legendre(n).unwrap();
            let deg = 2 * n - 2;
            let integral: f64 = x.iter().zip(&w).map(|(x, w)| w * x.powi(deg as i32)).sum();
            assert_relative_eq!(integral, 2.0 / (deg as f64 + 1.0), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_order_limits() {
        assert!(gauss_legendre(0).is_err());
        assert!(matches!(
            gauss_legendre(MAX_QUADRATURE_ORDER + 1),
            Err(AssemblyError::QuadratureOrderOutOfRange { .. })
        ));
    }

    #[test]
    fn test_triangle_quadrature() {
        let rule = triangle_quadrature(4).unwrap();
        assert_eq!(rule.len(), 16);
        let area: f64 = rule.iter().map(|p| p.weight).sum();
        assert_relative_eq!(area, 0.5, epsilon = 1e-14);
        // ∫ s t = 1/24 on the reference triangle
        let st: f64 = rule.iter().map(|p| p.weight * p.s * p.t).sum();
        assert_relative_eq!(st, 1.0 / 24.0, epsilon = 1e-14);
        assert!(rule.iter().all(|p| p.s + p.t <= 1.0));
    }
}
