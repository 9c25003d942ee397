//! Interception classification: which vertices must scan which primitives.
//!
//! A vertex `v` intercepts a primitive `X` when the Voronoi cell of `v`,
//! clipped by `X`'s support planes, still contains a point strictly closer
//! to `X` than to `v`. Only intercepted primitives can steal a query from
//! the nearest-vertex answer, so per-vertex scan lists can be restricted to
//! them. The classifier explores vertices outward from the primitive's own
//! corners through the Voronoi adjacency (the set of intercepting vertices
//! is connected in the Delaunay 1-skeleton, and the defining vertices always
//! intercept), and records an axis-aligned bound of the winning region for
//! each hit.

use std::collections::VecDeque;

use glam::{DVec3, DVec4};
use rayon::prelude::*;
use rustc_hash::FxHashSet;

use crate::cell::{ConvexCell, CLIP_ID_BASE};
use crate::topology::Topology;
use crate::types::{distance_to_line_squared, distance_to_plane_squared, Aabb};
use crate::voronoi::Tessellation;

/// World-space accuracy of the region-boundary bisection. The boxes only
/// prune, so this does not affect query results.
const BISECTION_TOLERANCE: f64 = 1e-5;

/// Vertex-keyed interception lists: for each vertex, the primitives it must
/// scan and the bounding box of the region where each can win.
pub(crate) struct InterceptionLists {
    pub edges: Vec<Vec<(u32, Aabb)>>,
    pub faces: Vec<Vec<(u32, Aabb)>>,
}

pub(crate) fn classify(
    points: &[DVec3],
    triangles: &[[u32; 3]],
    topo: &Topology,
    tess: &Tessellation,
) -> InterceptionLists {
    let nb_points = points.len();

    let face_hits: Vec<Vec<(u32, Aabb)>> = (0..topo.faces.len())
        .into_par_iter()
        .map(|f| {
            let plane = topo.faces[f].plane;
            let dist = |p: DVec3| distance_to_plane_squared(p, plane);
            collect_hits(
                &triangles[f],
                &topo.faces[f].edge_planes,
                points,
                tess,
                &dist,
            )
        })
        .collect();

    let edge_hits: Vec<Vec<(u32, Aabb)>> = (0..topo.edges.len())
        .into_par_iter()
        .map(|e| {
            let edge = &topo.edges[e];
            let a = points[edge.start as usize];
            let b = points[edge.end as usize];
            let dist = |p: DVec3| distance_to_line_squared(p, a, b);
            collect_hits(
                &[edge.start, edge.end],
                &edge.planes[..edge.num_planes],
                points,
                tess,
                &dist,
            )
        })
        .collect();

    // Transpose the primitive-keyed hits into vertex-keyed lists.
    let mut edges = vec![Vec::new(); nb_points];
    let mut faces = vec![Vec::new(); nb_points];
    for (e, hits) in edge_hits.iter().enumerate() {
        for &(v, bound) in hits {
            edges[v as usize].push((e as u32, bound));
        }
    }
    for (f, hits) in face_hits.iter().enumerate() {
        for &(v, bound) in hits {
            faces[v as usize].push((f as u32, bound));
        }
    }

    InterceptionLists { edges, faces }
}

/// BFS over the Voronoi adjacency from the primitive's defining vertices,
/// returning every intercepting vertex with its region bound.
fn collect_hits(
    seeds: &[u32],
    planes: &[DVec4],
    points: &[DVec3],
    tess: &Tessellation,
    dist: &impl Fn(DVec3) -> f64,
) -> Vec<(u32, Aabb)> {
    let nb_points = points.len();
    let mut visited: FxHashSet<u32> = seeds.iter().copied().collect();
    let mut queue: VecDeque<u32> = seeds.iter().copied().collect();
    let mut hits = Vec::new();

    while let Some(v) = queue.pop_front() {
        let mut cell = tess.cells[v as usize].clone();
        for (k, &plane) in planes.iter().enumerate() {
            cell.clip_by_plane(plane, CLIP_ID_BASE + k as u32);
        }
        if cell.is_empty() {
            continue;
        }

        let mut bound = Aabb::EMPTY;
        if !intercepts(&cell, points[v as usize], dist, &mut bound) {
            continue;
        }
        hits.push((v, bound));

        for &n in &tess.neighbors[v as usize] {
            // Neighbors past nb_points are the synthetic corner sites.
            if (n as usize) < nb_points && visited.insert(n) {
                queue.push_back(n);
            }
        }
    }

    hits
}

/// Walk the clipped cell's boundary. A corner strictly closer to the
/// primitive than to the site marks an interception; every straddling
/// boundary edge contributes its equidistance point to the bound.
fn intercepts(
    cell: &ConvexCell,
    site: DVec3,
    dist: &impl Fn(DVec3) -> f64,
    bound: &mut Aabb,
) -> bool {
    let mut hit = false;
    for face in cell.faces() {
        let n = face.verts.len();
        let inside: Vec<bool> = face
            .verts
            .iter()
            .map(|&p| dist(p) < p.distance_squared(site))
            .collect();
        for i in 0..n {
            if inside[i] {
                bound.extend(face.verts[i]);
                hit = true;
            }
            let j = (i + 1) % n;
            if inside[i] != inside[j] {
                let (a, b) = if inside[i] {
                    (face.verts[i], face.verts[j])
                } else {
                    (face.verts[j], face.verts[i])
                };
                bound.extend(boundary_point(a, b, site, dist));
            }
        }
    }
    hit
}

/// Locate the point on segment `[a, b]` where the primitive and the site are
/// equidistant, with `a` on the primitive side. Plain bisection; the step
/// count follows from the segment length and the target tolerance.
fn boundary_point(a: DVec3, b: DVec3, site: DVec3, dist: &impl Fn(DVec3) -> f64) -> DVec3 {
    let mut steps = ((a - b).length() / BISECTION_TOLERANCE).log2() as i32;
    if steps <= 0 {
        steps = 1;
    }
    let (mut lo, mut hi) = (0.0f64, 1.0f64);
    for _ in 0..steps {
        let m = 0.5 * (lo + hi);
        let cur = b.lerp(a, m);
        if cur.distance_squared(site) > dist(cur) {
            hi = m;
        } else {
            lo = m;
        }
    }
    b.lerp(a, lo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::Bvh;
    use crate::topology;
    use crate::voronoi;

    fn classify_mesh(
        points: &[DVec3],
        triangles: &[[u32; 3]],
        limit: f64,
    ) -> (InterceptionLists, Topology) {
        let topo = topology::build(points, triangles, false).unwrap();
        let bvh = Bvh::build(points, 8);
        let tess = voronoi::build(points, &bvh, limit).unwrap();
        (classify(points, triangles, &topo, &tess), topo)
    }

    #[test]
    fn test_defining_vertices_intercept() {
        let points = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
        ];
        let triangles = vec![[0u32, 1, 2]];
        let (lists, topo) = classify_mesh(&points, &triangles, 10.0);

        // Every vertex of the lone face scans it.
        for v in 0..3 {
            assert!(
                lists.faces[v].iter().any(|&(f, _)| f == 0),
                "vertex {} misses the face",
                v
            );
        }
        // Every edge is scanned by both of its endpoints.
        for (e, edge) in topo.edges.iter().enumerate() {
            for v in [edge.start, edge.end] {
                assert!(
                    lists.edges[v as usize].iter().any(|&(ei, _)| ei == e as u32),
                    "vertex {} misses edge {}",
                    v,
                    e
                );
            }
        }
    }

    #[test]
    fn test_boxes_cover_the_face_region() {
        let points = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
        ];
        let triangles = vec![[0u32, 1, 2]];
        let (lists, _) = classify_mesh(&points, &triangles, 10.0);

        // The prism over the triangle extends to x = 0 at vertex 0, so the
        // box of (vertex 0, face 0) must start there.
        let &(_, bound) = lists.faces[0].iter().find(|&&(f, _)| f == 0).unwrap();
        assert!(bound.lower.x < 1e-3);
        assert!(bound.upper.x > 0.1);
        assert!(bound.lower.z < -0.1, "region extends below the face plane");
        assert!(bound.upper.z > 0.1, "region extends above the face plane");
    }

    #[test]
    fn test_boundary_point_is_equidistant() {
        let site = DVec3::new(0.0, 0.0, 0.0);
        let plane = crate::types::plane_from(DVec3::Z, -1.0);
        let dist = |p: DVec3| distance_to_plane_squared(p, plane);
        // Along the segment from (0,0,0.9) to (0,0,0.1) the equidistance
        // point to the site and the plane z=1 is z = 0.5.
        let a = DVec3::new(0.0, 0.0, 0.9); // closer to the plane
        let b = DVec3::new(0.0, 0.0, 0.1);
        let p = boundary_point(a, b, site, &dist);
        assert!((p.z - 0.5).abs() < 1e-4, "got {}", p.z);
    }

    #[test]
    fn test_far_vertices_do_not_intercept() {
        // Two distant triangles: vertices of one never intercept the other's
        // face, so scan lists stay short.
        let points = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(100.0, 0.0, 0.0),
            DVec3::new(101.0, 0.0, 0.0),
            DVec3::new(100.0, 1.0, 0.0),
        ];
        let triangles = vec![[0u32, 1, 2], [3u32, 4, 5]];
        let (lists, _) = classify_mesh(&points, &triangles, 500.0);
        for v in 0..3 {
            assert!(
                lists.faces[v].iter().all(|&(f, _)| f == 0),
                "vertex {} intercepts the far face",
                v
            );
        }
        for v in 3..6 {
            assert!(lists.faces[v].iter().all(|&(f, _)| f == 1));
        }
    }
}
