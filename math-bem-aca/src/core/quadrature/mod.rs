//! Numerical integration over element pairs
//!
//! ## Module Organization
//!
//! - [`gauss`] - Gauss-Legendre rules on intervals and the reference triangle
//! - [`singular`] - Sauter-Schwab rules for elements sharing a vertex, an edge or everything
//!
//! Well-separated pairs use a tensor product of two triangle rules whose order
//! depends on the distance between the elements relative to their size.

pub mod gauss;
pub mod singular;

pub use gauss::{
    MAX_QUADRATURE_ORDER, TrianglePoint, gauss_legendre, gauss_legendre_unit, triangle_quadrature,
};
pub use singular::{
    CornerAssignment, PairClassification, PairTopology, SingularRule, SingularRuleCache,
    classify_pair,
};

use crate::core::config::AccuracyOptions;
use crate::core::grid::{ElementGeometry, distance};

/// Below this distance/size ratio a pair counts as nearly touching
pub const HIGH_ACCURACY_THRESHOLD: f64 = 2.0;

/// Below this distance/size ratio a pair keeps the base order
pub const QUASI_SINGULAR_THRESHOLD: f64 = 3.0;

/// Gauss order per direction for a pair of disjoint elements
///
/// - ratio < 2.0: base order plus the near-field increase
/// - ratio < 3.0: base order
/// - ratio >= 3.0: base order minus the far-field reduction, at least one
pub fn regular_order(
    accuracy: &AccuracyOptions,
    test: &ElementGeometry,
    trial: &ElementGeometry,
) -> usize {
    let size = test.diameter.max(trial.diameter);
    let ratio = distance(&test.center, &trial.center) / size;
    if ratio < HIGH_ACCURACY_THRESHOLD {
        accuracy.regular_order + accuracy.near_field_order_increase
    } else if ratio < QUASI_SINGULAR_THRESHOLD {
        accuracy.regular_order
    } else {
        accuracy
            .regular_order
            .saturating_sub(accuracy.far_field_order_reduction)
            .max(1)
    }
}
