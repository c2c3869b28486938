//! Triangle surfaces and their intersection with a cutting plane.

use crate::geometry::Bounds;

use glam::DVec3;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("Mesh has no vertices")]
    Empty,

    #[error("Triangle {triangle} references vertex {vertex} of {count}")]
    IndexOutOfRange {
        triangle: usize,
        vertex: u32,
        count: usize,
    },
}

/// A polygonal surface made of triangles
#[derive(Debug, Clone)]
pub struct Mesh {
    vertices: Vec<DVec3>,
    triangles: Vec<[u32; 3]>,
    bounds: Bounds,
}

/// One line segment of a planar cut through a mesh
pub type Segment = [DVec3; 2];

impl Mesh {
    pub fn new(vertices: Vec<DVec3>, triangles: Vec<[u32; 3]>) -> Result<Self, MeshError> {
        let bounds = Bounds::new(
            vertices.iter().copied().reduce(DVec3::min).ok_or(MeshError::Empty)?,
            vertices.iter().copied().reduce(DVec3::max).ok_or(MeshError::Empty)?,
        );
        for (triangle, indices) in triangles.iter().enumerate() {
            if let Some(&vertex) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
                return Err(MeshError::IndexOutOfRange {
                    triangle,
                    vertex,
                    count: vertices.len(),
                });
            }
        }
        Ok(Self {
            vertices,
            triangles,
            bounds,
        })
    }

    pub fn vertices(&self) -> &[DVec3] {
        &self.vertices
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Cuts the surface with the plane through `origin` with `normal`.
    ///
    /// Every triangle straddling the plane contributes one segment; triangles
    /// lying in the plane are skipped.
    pub fn cut(&self, origin: DVec3, normal: DVec3) -> Vec<Segment> {
        let distances: Vec<f64> = self
            .vertices
            .iter()
            .map(|v| (*v - origin).dot(normal))
            .collect();

        self.triangles
            .iter()
            .filter_map(|tri| {
                let corners = tri.map(|i| (self.vertices[i as usize], distances[i as usize]));
                let mut points = Vec::with_capacity(3);
                for edge in 0..3 {
                    let (pa, da) = corners[edge];
                    let (pb, db) = corners[(edge + 1) % 3];
                    if da == 0.0 {
                        points.push(pa);
                    } else if da * db < 0.0 {
                        let t = da / (da - db);
                        points.push(pa + (pb - pa) * t);
                    }
                }
                points.dedup();
                match points.as_slice() {
                    [a, b] if a != b => Some([*a, *b]),
                    _ => None,
                }
            })
            .collect()
    }
}
