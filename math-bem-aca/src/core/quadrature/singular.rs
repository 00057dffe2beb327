//! Sauter-Schwab quadrature for touching element pairs
//!
//! Pairs of triangles that share a vertex, an edge or the whole element have
//! a weakly singular integrand. The rules below split the 4D domain
//! `T̂ × T̂` with `T̂ = {0 <= x2 <= x1 <= 1}` into simplices and map each one
//! to the unit hypercube with a Jacobian that cancels the singularity, so a
//! tensor Gauss rule converges exponentially.
//!
//! Both elements are parametrized over `T̂` with corners `(0,0)`, `(1,0)` and
//! `(1,1)` assigned so that the shared vertices come first and in ascending
//! global order. The rule for a pair and for the swapped pair use the same
//! point set, which keeps the weak form of an operator and of its adjoint
//! transposes of each other to rounding accuracy.

use super::gauss::gauss_legendre_unit;
use crate::core::error::Result;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// How two elements touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairTopology {
    /// No shared vertex
    Disjoint,
    /// One shared vertex
    SharedVertex,
    /// One shared edge
    SharedEdge,
    /// Same element
    Coincident,
}

/// Corner assignment of a canonical parametrization: local vertex indices
/// mapped to `(0,0)`, `(1,0)` and `(1,1)`
pub type CornerAssignment = [usize; 3];

/// Topology and corner assignments of an element pair, ordered by element index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairClassification {
    /// Topology class
    pub topology: PairTopology,
    /// Corner assignment of the element with the smaller index
    pub first: CornerAssignment,
    /// Corner assignment of the element with the larger index
    pub second: CornerAssignment,
    /// Whether the test element is the one with the larger index
    pub swapped: bool,
}

/// Classify an element pair from the global vertex indices of both elements
pub fn classify_pair(
    test_element: usize,
    test_vertices: &[usize; 3],
    trial_element: usize,
    trial_vertices: &[usize; 3],
) -> PairClassification {
    let swapped = test_element > trial_element;
    let (first, second) = if swapped {
        (trial_vertices, test_vertices)
    } else {
        (test_vertices, trial_vertices)
    };

    let mut shared: Vec<usize> = first
        .iter()
        .copied()
        .filter(|v| second.contains(v))
        .collect();
    shared.sort_unstable();

    let local = |vertices: &[usize; 3], v: usize| vertices.iter().position(|&w| w == v);
    let (topology, first_corners, second_corners) = match shared.as_slice() {
        [] => (PairTopology::Disjoint, [0, 1, 2], [0, 1, 2]),
        [v] => {
            let a = local(first, *v).unwrap_or(0);
            let b = local(second, *v).unwrap_or(0);
            (
                PairTopology::SharedVertex,
                [a, (a + 1) % 3, (a + 2) % 3],
                [b, (b + 1) % 3, (b + 2) % 3],
            )
        }
        [v0, v1] => {
            let corners = |vertices: &[usize; 3]| {
                let a = local(vertices, *v0).unwrap_or(0);
                let b = local(vertices, *v1).unwrap_or(1);
                [a, b, 3 - a - b]
            };
            (PairTopology::SharedEdge, corners(first), corners(second))
        }
        _ => (PairTopology::Coincident, [0, 1, 2], [0, 1, 2]),
    };

    PairClassification {
        topology,
        first: first_corners,
        second: second_corners,
        swapped,
    }
}

/// Quadrature rule over a pair of reference triangles
///
/// Points are element reference coordinates `(s, t)` of the test and trial
/// element; the weights already include the Sauter-Schwab Jacobians but not
/// the integration elements of the physical triangles.
#[derive(Debug, Clone, PartialEq)]
pub struct SingularRule {
    /// Points on the test element
    pub test_points: Vec<[f64; 2]>,
    /// Points on the trial element
    pub trial_points: Vec<[f64; 2]>,
    /// Weights
    pub weights: Vec<f64>,
}

impl SingularRule {
    /// Number of point pairs
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether the rule has no points
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    fn swap_sides(&self) -> Self {
        Self {
            test_points: self.trial_points.clone(),
            trial_points: self.test_points.clone(),
            weights: self.weights.clone(),
        }
    }
}

/// Points `(x, y)` on `T̂ × T̂` and the region weight for one hypercube sample
type Sample = ([f64; 2], [f64; 2], f64);

fn coincident_samples(xi: f64, e1: f64, e2: f64, e3: f64, out: &mut Vec<Sample>) {
    let w = xi * xi * xi * e1 * e1 * e2;
    let regions = [
        (
            [xi, xi * (1.0 - e1 + e1 * e2)],
            [xi * (1.0 - e1 * e2 * e3), xi * (1.0 - e1)],
        ),
        (
            [xi, xi * e1 * (1.0 - e2 + e2 * e3)],
            [xi * (1.0 - e1 * e2), xi * e1 * (1.0 - e2)],
        ),
        (
            [xi * (1.0 - e1 * e2 * e3), xi * e1 * (1.0 - e2 * e3)],
            [xi, xi * e1 * (1.0 - e2)],
        ),
    ];
    for (x, y) in regions {
        out.push((x, y, w));
        out.push((y, x, w));
    }
}

fn edge_samples(xi: f64, e1: f64, e2: f64, e3: f64, out: &mut Vec<Sample>) {
    let w0 = xi * xi * xi * e1 * e1;
    let w = w0 * e2;
    out.push((
        [xi, xi * e1 * e3],
        [xi * (1.0 - e1 * e2), xi * e1 * (1.0 - e2)],
        w0,
    ));
    out.push((
        [xi, xi * e1],
        [xi * (1.0 - e1 * e2 * e3), xi * e1 * e2 * (1.0 - e3)],
        w,
    ));
    out.push((
        [xi * (1.0 - e1 * e2), xi * e1 * (1.0 - e2)],
        [xi, xi * e1 * e2 * e3],
        w,
    ));
    out.push((
        [xi * (1.0 - e1 * e2 * e3), xi * e1 * e2 * (1.0 - e3)],
        [xi, xi * e1],
        w,
    ));
    out.push((
        [xi * (1.0 - e1 * e2 * e3), xi * e1 * (1.0 - e2 * e3)],
        [xi, xi * e1 * e2],
        w,
    ));
}

fn vertex_samples(xi: f64, e1: f64, e2: f64, e3: f64, out: &mut Vec<Sample>) {
    let w = xi * xi * xi * e2;
    let x = [xi, xi * e1];
    let y = [xi * e2, xi * e2 * e3];
    out.push((x, y, w));
    out.push((y, x, w));
}

/// Map a point of `T̂` to element reference coordinates under a corner assignment
#[inline]
fn to_element(p: [f64; 2], corners: &CornerAssignment) -> [f64; 2] {
    let mut bary = [0.0; 3];
    bary[corners[0]] = 1.0 - p[0];
    bary[corners[1]] = p[0] - p[1];
    bary[corners[2]] = p[1];
    [bary[1], bary[2]]
}

/// Build the rule for the element with the smaller index on the test side
fn build_rule(
    topology: PairTopology,
    first: &CornerAssignment,
    second: &CornerAssignment,
    order: usize,
) -> Result<SingularRule> {
    let (nodes, gauss_weights) = gauss_legendre_unit(order)?;
    let sampler: fn(f64, f64, f64, f64, &mut Vec<Sample>) = match topology {
        PairTopology::Coincident => coincident_samples,
        PairTopology::SharedEdge => edge_samples,
        PairTopology::SharedVertex => vertex_samples,
        PairTopology::Disjoint => {
            return Ok(SingularRule {
                test_points: Vec::new(),
                trial_points: Vec::new(),
                weights: Vec::new(),
            });
        }
    };

    let n = nodes.len();
    let mut rule = SingularRule {
        test_points: Vec::with_capacity(6 * n.pow(4)),
        trial_points: Vec::with_capacity(6 * n.pow(4)),
        weights: Vec::with_capacity(6 * n.pow(4)),
    };
    let mut samples = Vec::with_capacity(6);
    for (&xi, &w_xi) in nodes.iter().zip(&gauss_weights) {
        for (&e1, &w1) in nodes.iter().zip(&gauss_weights) {
            for (&e2, &w2) in nodes.iter().zip(&gauss_weights) {
                for (&e3, &w3) in nodes.iter().zip(&gauss_weights) {
                    let gw = w_xi * w1 * w2 * w3;
                    samples.clear();
                    sampler(xi, e1, e2, e3, &mut samples);
                    for &(x, y, w) in &samples {
                        rule.test_points.push(to_element(x, first));
                        rule.trial_points.push(to_element(y, second));
                        rule.weights.push(gw * w);
                    }
                }
            }
        }
    }
    Ok(rule)
}

/// Key of a cached rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RuleKey {
    topology: PairTopology,
    first: CornerAssignment,
    second: CornerAssignment,
    swapped: bool,
}

/// Lazily populated, thread-safe cache of singular rules
///
/// Each rule is built at most once; concurrent requests for a missing key
/// serialize on the write lock and find the rule already inserted.
#[derive(Debug)]
pub struct SingularRuleCache {
    order: usize,
    rules: RwLock<HashMap<RuleKey, Arc<SingularRule>>>,
}

impl SingularRuleCache {
    /// Create an empty cache for rules with `order` Gauss points per direction
    pub fn new(order: usize) -> Result<Self> {
        // validate the order once up front
        gauss_legendre_unit(order)?;
        Ok(Self {
            order,
            rules: RwLock::new(HashMap::new()),
        })
    }

    /// Rule for a classified pair, oriented test-first
    pub fn rule(&self, pair: &PairClassification) -> Result<Arc<SingularRule>> {
        let key = RuleKey {
            topology: pair.topology,
            first: pair.first,
            second: pair.second,
            swapped: pair.swapped,
        };
        {
            let rules = self.rules.read().unwrap_or_else(|e| e.into_inner());
            if let Some(rule) = rules.get(&key) {
                return Ok(Arc::clone(rule));
            }
        }

        let mut rules = self.rules.write().unwrap_or_else(|e| e.into_inner());
        if let Some(rule) = rules.get(&key) {
            return Ok(Arc::clone(rule));
        }
        let canonical = build_rule(pair.topology, &pair.first, &pair.second, self.order)?;
        let rule = Arc::new(if pair.swapped {
            canonical.swap_sides()
        } else {
            canonical
        });
        rules.insert(key, Arc::clone(&rule));
        Ok(rule)
    }

    /// Number of distinct rules built so far
    pub fn len(&self) -> usize {
        self.rules.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether no rule has been built yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
