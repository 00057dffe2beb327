//! Surface grids
//!
//! The assembler reads element connectivity, vertex adjacency and per-element
//! geometry through the [`Grid`] trait. [`TriangleGrid`] is a flat-triangle
//! implementation with precomputed geometry.

pub mod generators;

pub use generators::{cube_grid, icosphere_grid};

use crate::core::error::{AssemblyError, Result};
use std::fmt::Debug;
use std::ops::BitOr;

/// 3D point or vector
pub type Point3 = [f64; 3];

#[inline]
pub(crate) fn sub(a: &Point3, b: &Point3) -> Point3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub(crate) fn dot(a: &Point3, b: &Point3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub(crate) fn cross(a: &Point3, b: &Point3) -> Point3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub(crate) fn norm(a: &Point3) -> f64 {
    dot(a, a).sqrt()
}

#[inline]
pub(crate) fn distance(a: &Point3, b: &Point3) -> f64 {
    norm(&sub(a, b))
}

/// Set of geometric quantities a kernel or grid deals in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GeometricDependencies(u8);

impl GeometricDependencies {
    /// Nothing
    pub const NONE: Self = Self(0);
    /// Physical coordinates of quadrature points
    pub const GLOBALS: Self = Self(1);
    /// Unit normals
    pub const NORMALS: Self = Self(1 << 1);
    /// Integration elements (surface Jacobian determinants)
    pub const INTEGRATION_ELEMENTS: Self = Self(1 << 2);
    /// Everything a flat triangle grid can supply
    pub const ALL: Self = Self(0b111);

    /// Whether every flag of `other` is present
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Flags of `self` that are absent from `other`
    pub fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Human readable list of flags
    pub fn describe(self) -> String {
        let mut names = Vec::new();
        if self.contains(Self::GLOBALS) {
            names.push("global coordinates");
        }
        if self.contains(Self::NORMALS) {
            names.push("normals");
        }
        if self.contains(Self::INTEGRATION_ELEMENTS) {
            names.push("integration elements");
        }
        if names.is_empty() {
            "nothing".to_string()
        } else {
            names.join(", ")
        }
    }
}

impl BitOr for GeometricDependencies {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Precomputed geometry of a flat triangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementGeometry {
    /// Corner coordinates in local vertex order
    pub corners: [Point3; 3],
    /// Unit normal `(c1 - c0) x (c2 - c0) / |...|`
    pub normal: Point3,
    /// `|(c1 - c0) x (c2 - c0)|`, twice the area
    pub integration_element: f64,
    /// Longest edge
    pub diameter: f64,
    /// Centroid
    pub center: Point3,
}

impl ElementGeometry {
    /// Compute the geometry of a triangle; fails for degenerate triangles
    pub fn from_corners(corners: [Point3; 3]) -> Option<Self> {
        let e1 = sub(&corners[1], &corners[0]);
        let e2 = sub(&corners[2], &corners[0]);
        let n = cross(&e1, &e2);
        let jac = norm(&n);
        if !(jac.is_finite() && jac > 0.0) {
            return None;
        }
        let diameter = distance(&corners[0], &corners[1])
            .max(distance(&corners[1], &corners[2]))
            .max(distance(&corners[2], &corners[0]));
        let center = [
            (corners[0][0] + corners[1][0] + corners[2][0]) / 3.0,
            (corners[0][1] + corners[1][1] + corners[2][1]) / 3.0,
            (corners[0][2] + corners[1][2] + corners[2][2]) / 3.0,
        ];
        Some(Self {
            corners,
            normal: [n[0] / jac, n[1] / jac, n[2] / jac],
            integration_element: jac,
            diameter,
            center,
        })
    }

    /// Map reference coordinates `(s, t)` on `{s, t >= 0, s + t <= 1}` to the element
    #[inline]
    pub fn map(&self, s: f64, t: f64) -> Point3 {
        let [c0, c1, c2] = &self.corners;
        [
            c0[0] + s * (c1[0] - c0[0]) + t * (c2[0] - c0[0]),
            c0[1] + s * (c1[1] - c0[1]) + t * (c2[1] - c0[1]),
            c0[2] + s * (c1[2] - c0[2]) + t * (c2[2] - c0[2]),
        ]
    }

    /// Area of the triangle
    pub fn area(&self) -> f64 {
        0.5 * self.integration_element
    }
}

/// Read-only access to a triangulated surface
pub trait Grid: Send + Sync + Debug {
    /// Number of vertices
    fn vertex_count(&self) -> usize;

    /// Number of elements
    fn element_count(&self) -> usize;

    /// Vertex coordinates
    fn vertex(&self, index: usize) -> Point3;

    /// Vertex indices of an element in local order
    fn element_vertices(&self, element: usize) -> [usize; 3];

    /// Geometry of an element
    fn element_geometry(&self, element: usize) -> &ElementGeometry;

    /// Elements that contain a vertex, in ascending order
    fn vertex_elements(&self, vertex: usize) -> &[usize];

    /// Quantities this grid can supply to kernels
    fn supported_dependencies(&self) -> GeometricDependencies {
        GeometricDependencies::ALL
    }
}

/// Flat triangle surface mesh
#[derive(Debug, Clone)]
pub struct TriangleGrid {
    vertices: Vec<Point3>,
    elements: Vec<[usize; 3]>,
    geometry: Vec<ElementGeometry>,
    vertex_elements: Vec<Vec<usize>>,
}

impl TriangleGrid {
    /// Build a grid and precompute its geometry.
    ///
    /// Fails for empty input, non-finite vertices, out-of-range or repeated
    /// vertex indices and degenerate triangles.
    pub fn new(vertices: Vec<Point3>, elements: Vec<[usize; 3]>) -> Result<Self> {
        if vertices.is_empty() || elements.is_empty() {
            return Err(AssemblyError::EmptyInput(
                "a grid needs at least one vertex and one element".to_string(),
            ));
        }
        if let Some(index) = vertices
            .iter()
            .position(|v| v.iter().any(|c| !c.is_finite()))
        {
            return Err(AssemblyError::NonFiniteCoordinate { index });
        }

        let mut geometry = Vec::with_capacity(elements.len());
        let mut vertex_elements = vec![Vec::new(); vertices.len()];
        for (e, tri) in elements.iter().enumerate() {
            if tri.iter().any(|&v| v >= vertices.len()) {
                return Err(AssemblyError::InvalidMesh(format!(
                    "element {e} references a vertex outside 0..{}",
                    vertices.len()
                )));
            }
            if tri[0] == tri[1] || tri[1] == tri[2] || tri[0] == tri[2] {
                return Err(AssemblyError::InvalidMesh(format!(
                    "element {e} repeats a vertex"
                )));
            }
            let corners = [vertices[tri[0]], vertices[tri[1]], vertices[tri[2]]];
            let geo = ElementGeometry::from_corners(corners).ok_or_else(|| {
                AssemblyError::InvalidMesh(format!("element {e} is degenerate"))
            })?;
            geometry.push(geo);
            for &v in tri {
                vertex_elements[v].push(e);
            }
        }

        Ok(Self {
            vertices,
            elements,
            geometry,
            vertex_elements,
        })
    }

    /// Total surface area
    pub fn area(&self) -> f64 {
        self.geometry.iter().map(ElementGeometry::area).sum()
    }
}

impl Grid for TriangleGrid {
    fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    fn element_count(&self) -> usize {
        self.elements.len()
    }

    fn vertex(&self, index: usize) -> Point3 {
        self.vertices[index]
    }

    fn element_vertices(&self, element: usize) -> [usize; 3] {
        self.elements[element]
    }

    fn element_geometry(&self, element: usize) -> &ElementGeometry {
        &self.geometry[element]
    }

    fn vertex_elements(&self, vertex: usize) -> &[usize] {
        &self.vertex_elements[vertex]
    }
}
