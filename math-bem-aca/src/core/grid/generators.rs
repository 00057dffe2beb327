//! Test grid generators
//!
//! Closed surfaces with outward-oriented triangles.

use super::{Point3, TriangleGrid};
use crate::core::error::{AssemblyError, Result};
use std::collections::HashMap;

/// Generate the surface of the unit cube `[0, 1]³`
///
/// Each face is split into `divisions × divisions` squares of two triangles,
/// so `divisions = 1` gives 8 vertices and 12 elements.
pub fn cube_grid(divisions: usize) -> Result<TriangleGrid> {
    if divisions == 0 {
        return Err(AssemblyError::InvalidMesh(
            "cube needs at least one division per edge".to_string(),
        ));
    }
    let n = divisions as i64;

    // (origin, u, v) on the integer lattice with u x v pointing outward
    let faces: [([i64; 3], [i64; 3], [i64; 3]); 6] = [
        ([0, 0, 0], [0, 1, 0], [1, 0, 0]), // z = 0
        ([0, 0, n], [1, 0, 0], [0, 1, 0]), // z = 1
        ([0, 0, 0], [1, 0, 0], [0, 0, 1]), // y = 0
        ([0, n, 0], [0, 0, 1], [1, 0, 0]), // y = 1
        ([0, 0, 0], [0, 0, 1], [0, 1, 0]), // x = 0
        ([n, 0, 0], [0, 1, 0], [0, 0, 1]), // x = 1
    ];

    let mut lattice: HashMap<[i64; 3], usize> = HashMap::new();
    let mut vertices: Vec<Point3> = Vec::new();
    let mut elements: Vec<[usize; 3]> = Vec::with_capacity(12 * divisions * divisions);

    let mut vertex_at = |p: [i64; 3], vertices: &mut Vec<Point3>| -> usize {
        *lattice.entry(p).or_insert_with(|| {
            vertices.push([
                p[0] as f64 / n as f64,
                p[1] as f64 / n as f64,
                p[2] as f64 / n as f64,
            ]);
            vertices.len() - 1
        })
    };

    for (origin, u, v) in faces {
        let point = |a: i64, b: i64| -> [i64; 3] {
            [
                origin[0] + a * u[0] + b * v[0],
                origin[1] + a * u[1] + b * v[1],
                origin[2] + a * u[2] + b * v[2],
            ]
        };
        for a in 0..n {
            for b in 0..n {
                let p00 = vertex_at(point(a, b), &mut vertices);
                let p10 = vertex_at(point(a + 1, b), &mut vertices);
                let p11 = vertex_at(point(a + 1, b + 1), &mut vertices);
                let p01 = vertex_at(point(a, b + 1), &mut vertices);
                elements.push([p00, p10, p11]);
                elements.push([p00, p11, p01]);
            }
        }
    }

    TriangleGrid::new(vertices, elements)
}

/// Generate an icosphere mesh (subdivided icosahedron)
///
/// More uniform element sizes than a UV-sphere.
///
/// # Arguments
/// * `radius` - Sphere radius
/// * `subdivisions` - Number of subdivision iterations (0 = icosahedron with 20 elements,
///   each iteration multiplies the element count by 4)
pub fn icosphere_grid(radius: f64, subdivisions: usize) -> Result<TriangleGrid> {
    if !(radius.is_finite() && radius > 0.0) {
        return Err(AssemblyError::InvalidMesh(format!(
            "sphere radius must be positive, got {radius}"
        )));
    }
    let phi = (1.0 + 5.0_f64.sqrt()) / 2.0;

    let mut vertices: Vec<Point3> = vec![
        [-1.0, phi, 0.0],
        [1.0, phi, 0.0],
        [-1.0, -phi, 0.0],
        [1.0, -phi, 0.0],
        [0.0, -1.0, phi],
        [0.0, 1.0, phi],
        [0.0, -1.0, -phi],
        [0.0, 1.0, -phi],
        [phi, 0.0, -1.0],
        [phi, 0.0, 1.0],
        [-phi, 0.0, -1.0],
        [-phi, 0.0, 1.0],
    ]
    .into_iter()
    .map(project_to_unit_sphere)
    .collect();

    let mut faces: Vec<[usize; 3]> = vec![
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];

    for _ in 0..subdivisions {
        let mut refined = Vec::with_capacity(faces.len() * 4);
        let mut midpoints: HashMap<(usize, usize), usize> = HashMap::new();

        for &[v0, v1, v2] in &faces {
            let m01 = midpoint(&mut vertices, &mut midpoints, v0, v1);
            let m12 = midpoint(&mut vertices, &mut midpoints, v1, v2);
            let m20 = midpoint(&mut vertices, &mut midpoints, v2, v0);

            refined.push([v0, m01, m20]);
            refined.push([v1, m12, m01]);
            refined.push([v2, m20, m12]);
            refined.push([m01, m12, m20]);
        }
        faces = refined;
    }

    let scaled = vertices
        .iter()
        .map(|v| [v[0] * radius, v[1] * radius, v[2] * radius])
        .collect();
    TriangleGrid::new(scaled, faces)
}

fn project_to_unit_sphere(v: Point3) -> Point3 {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    [v[0] / len, v[1] / len, v[2] / len]
}

/// Get or create the projected midpoint of an edge
fn midpoint(
    vertices: &mut Vec<Point3>,
    cache: &mut HashMap<(usize, usize), usize>,
    v0: usize,
    v1: usize,
) -> usize {
    let key = (v0.min(v1), v0.max(v1));
    if let Some(&idx) = cache.get(&key) {
        return idx;
    }
    let a = vertices[v0];
    let b = vertices[v1];
    vertices.push(project_to_unit_sphere([
        (a[0] + b[0]) / 2.0,
        (a[1] + b[1]) / 2.0,
        (a[2] + b[2]) / 2.0,
    ]));
    let idx = vertices.len() - 1;
    cache.insert(key, idx);
    idx
}
