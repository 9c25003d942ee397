//! Mesh topology derivation: vertex deduplication, unique edges, and the
//! per-primitive clipping planes consumed by the interception classifier and
//! the packed query scans.

use std::collections::BTreeMap;

use glam::{DVec3, DVec4};
use rustc_hash::FxHashMap;

use crate::error::BuildError;
use crate::types::plane_from;

/// Derived per-face data.
#[derive(Debug)]
pub(crate) struct FaceData {
    /// Face plane with unit-length normal.
    pub plane: DVec4,
    /// Inward edge planes; plane `i` contains the edge opposite corner `i`,
    /// and its positive half-space is the prism over the triangle.
    pub edge_planes: [DVec4; 3],
    /// A point on the face plane.
    pub anchor: DVec3,
}

/// Derived per-edge data. Planes are inward-oriented: the two end caps
/// first, then up to two side planes borrowed (negated) from incident faces.
#[derive(Debug)]
pub(crate) struct EdgeData {
    pub start: u32,
    pub end: u32,
    pub planes: [DVec4; 4],
    pub num_planes: usize,
}

#[derive(Debug)]
pub(crate) struct Topology {
    pub edges: Vec<EdgeData>,
    pub faces: Vec<FaceData>,
    /// `(min(a,b), max(a,b))` -> edge index, retained for face-to-edge lookups.
    pub edge_index: FxHashMap<(u32, u32), u32>,
}

/// Reject non-finite coordinates, out-of-bounds triangle indices, and empty
/// vertex arrays before any further processing.
pub(crate) fn validate(points: &[DVec3], triangles: &[[u32; 3]]) -> Result<(), BuildError> {
    if points.is_empty() {
        return Err(BuildError::EmptyMesh);
    }
    for (vertex, p) in points.iter().enumerate() {
        if !p.is_finite() {
            return Err(BuildError::NonFiniteCoordinate { vertex });
        }
    }
    for (triangle, tri) in triangles.iter().enumerate() {
        for &index in tri {
            if index as usize >= points.len() {
                return Err(BuildError::IndexOutOfBounds { triangle, index });
            }
        }
    }
    Ok(())
}

/// Collapse exactly-coincident vertices and remap triangle indices.
///
/// When duplicates exist the surviving vertices are reordered by coordinate;
/// when the input is already unique it is left untouched.
pub(crate) fn deduplicate(points: &mut Vec<DVec3>, triangles: &mut [[u32; 3]]) {
    let mut order: Vec<u32> = (0..points.len() as u32).collect();
    order.sort_by(|&a, &b| {
        let pa = points[a as usize];
        let pb = points[b as usize];
        (pa.x, pa.y, pa.z)
            .partial_cmp(&(pb.x, pb.y, pb.z))
            .expect("coordinates validated finite")
    });

    let mut unique: Vec<DVec3> = Vec::with_capacity(points.len());
    let mut remap = vec![0u32; points.len()];
    for (i, &v) in order.iter().enumerate() {
        if i == 0 || points[v as usize] != points[order[i - 1] as usize] {
            unique.push(points[v as usize]);
        }
        remap[v as usize] = unique.len() as u32 - 1;
    }

    if unique.len() == points.len() {
        return;
    }

    *points = unique;
    for tri in triangles.iter_mut() {
        for v in tri.iter_mut() {
            *v = remap[*v as usize];
        }
    }
}

#[inline]
fn edge_key(a: u32, b: u32) -> (u32, u32) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Derive unique edges and per-face planes.
///
/// Edges are gathered in an ordered map so the final edge array is sorted by
/// its `(min, max)` vertex key, giving a stable edge numbering independent of
/// triangle order.
pub(crate) fn build(
    points: &[DVec3],
    triangles: &[[u32; 3]],
    reject_non_manifold: bool,
) -> Result<Topology, BuildError> {
    for (triangle, tri) in triangles.iter().enumerate() {
        if tri[0] == tri[1] || tri[1] == tri[2] || tri[2] == tri[0] {
            return Err(BuildError::DegenerateTriangle { triangle });
        }
    }

    // First pass: unique edges with their end-cap planes.
    let mut edge_map: BTreeMap<(u32, u32), EdgeData> = BTreeMap::new();
    for tri in triangles {
        for i in 0..3 {
            let (a, b) = edge_key(tri[i], tri[(i + 1) % 3]);
            edge_map.entry((a, b)).or_insert_with(|| {
                let start = points[a as usize];
                let end = points[b as usize];
                let n1 = (end - start).normalize();
                let n2 = (start - end).normalize();
                EdgeData {
                    start: a,
                    end: b,
                    planes: [
                        plane_from(n1, -n1.dot(start)),
                        plane_from(n2, -n2.dot(end)),
                        DVec4::ZERO,
                        DVec4::ZERO,
                    ],
                    num_planes: 2,
                }
            });
        }
    }

    // Second pass: face planes, and side planes donated to the edges.
    let mut faces = Vec::with_capacity(triangles.len());
    for (triangle, tri) in triangles.iter().enumerate() {
        let [v0, v1, v2] = *tri;
        let p0 = points[v0 as usize];
        let p1 = points[v1 as usize];
        let p2 = points[v2 as usize];

        let n = (p1 - p0).cross(p2 - p0).normalize();
        if !n.is_finite() {
            return Err(BuildError::DegenerateTriangle { triangle });
        }

        let n0 = (p2 - p1).cross(n).normalize();
        let n1 = (p0 - p2).cross(n).normalize();
        let n2 = (p1 - p0).cross(n).normalize();

        let plane0 = plane_from(-n0, n0.dot(p1));
        let plane1 = plane_from(-n1, n1.dot(p2));
        let plane2 = plane_from(-n2, n2.dot(p0));

        faces.push(FaceData {
            plane: plane_from(n, -n.dot(p0)),
            edge_planes: [plane0, plane1, plane2],
            anchor: p0,
        });

        // Each edge receives the negated inward plane of the opposite side,
        // so its positive half-space holds the incident face.
        for (key, plane) in [
            (edge_key(v0, v1), plane2),
            (edge_key(v1, v2), plane0),
            (edge_key(v2, v0), plane1),
        ] {
            let edge = edge_map
                .get_mut(&key)
                .expect("edge registered in first pass");
            if edge.num_planes < 4 {
                edge.planes[edge.num_planes] = -plane;
                edge.num_planes += 1;
            } else if reject_non_manifold {
                return Err(BuildError::NonManifoldEdge { a: key.0, b: key.1 });
            }
        }
    }

    let mut edges = Vec::with_capacity(edge_map.len());
    let mut edge_index = FxHashMap::default();
    for (key, edge) in edge_map {
        edge_index.insert(key, edges.len() as u32);
        edges.push(edge);
    }

    Ok(Topology {
        edges,
        faces,
        edge_index,
    })
}
