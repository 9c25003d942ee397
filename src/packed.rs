//! SIMD-packed per-vertex candidate arenas and the query-time scan.
//!
//! Each vertex owns two arrays of 4-wide records, one for intercepted edges
//! and one for intercepted faces, sorted ascending by the x-minimum of the
//! interception region. A record whose lane-0 `min_x` exceeds the query's x
//! ends the scan: `min_x <= q.x` is necessary for the region box to contain
//! the query, and later records only have larger minima. Padding lanes
//! replicate the last real lane, so they re-evaluate the same primitive and
//! never change the outcome.

use std::simd::cmp::SimdPartialOrd;
use std::simd::{f32x4, i32x4, Select};

use glam::{DVec3, Vec3};

use crate::simd::{distance_squared3, dot3, eval_plane4, LANES};
use crate::topology::Topology;
use crate::types::Aabb;

#[derive(Debug)]
pub(crate) struct PackedEdges {
    min_x: f32x4,
    start: [f32x4; 3],
    dir: [f32x4; 3],
    dir_len_squared: f32x4,
    primitive_idx: i32x4,
}

#[derive(Debug)]
pub(crate) struct PackedFaces {
    min_x: f32x4,
    face_plane: [f32x4; 4],
    edge_planes: [[f32x4; 4]; 3],
    primitive_idx: i32x4,
}

#[derive(Debug)]
pub(crate) struct PackedArenas {
    edges: Vec<Vec<PackedEdges>>,
    faces: Vec<Vec<PackedFaces>>,
}

fn pack_edge_list(
    list: &mut Vec<(u32, Aabb)>,
    points: &[DVec3],
    topo: &Topology,
    nb_points: usize,
) -> Vec<PackedEdges> {
    // Stable sort keeps equal minima in BFS discovery order.
    list.sort_by(|a, b| {
        a.1.lower
            .x
            .partial_cmp(&b.1.lower.x)
            .expect("region bounds are finite")
    });

    let num_packed = (list.len() + LANES - 1) / LANES;
    let mut out = Vec::with_capacity(num_packed);
    for p in 0..num_packed {
        let mut min_x = [0f32; LANES];
        let mut start = [[0f32; LANES]; 3];
        let mut dir = [[0f32; LANES]; 3];
        let mut dir_len_squared = [0f32; LANES];
        let mut primitive_idx = [0i32; LANES];
        for j in 0..LANES {
            // Lanes past the end replicate the last real entry.
            let (e, bound) = list[(p * LANES + j).min(list.len() - 1)];
            let edge = &topo.edges[e as usize];
            let a = points[edge.start as usize];
            let b = points[edge.end as usize];
            min_x[j] = bound.lower.x as f32;
            for d in 0..3 {
                start[d][j] = a[d] as f32;
                dir[d][j] = (b[d] - a[d]) as f32;
            }
            dir_len_squared[j] = a.distance_squared(b) as f32;
            primitive_idx[j] = nb_points as i32 + e as i32;
        }
        out.push(PackedEdges {
            min_x: f32x4::from_array(min_x),
            start: start.map(f32x4::from_array),
            dir: dir.map(f32x4::from_array),
            dir_len_squared: f32x4::from_array(dir_len_squared),
            primitive_idx: i32x4::from_array(primitive_idx),
        });
    }
    out
}

fn pack_face_list(
    list: &mut Vec<(u32, Aabb)>,
    topo: &Topology,
    nb_points: usize,
    nb_edges: usize,
) -> Vec<PackedFaces> {
    list.sort_by(|a, b| {
        a.1.lower
            .x
            .partial_cmp(&b.1.lower.x)
            .expect("region bounds are finite")
    });

    let num_packed = (list.len() + LANES - 1) / LANES;
    let mut out = Vec::with_capacity(num_packed);
    for p in 0..num_packed {
        let mut min_x = [0f32; LANES];
        let mut face_plane = [[0f32; LANES]; 4];
        let mut edge_planes = [[[0f32; LANES]; 4]; 3];
        let mut primitive_idx = [0i32; LANES];
        for j in 0..LANES {
            let (f, bound) = list[(p * LANES + j).min(list.len() - 1)];
            let face = &topo.faces[f as usize];
            min_x[j] = bound.lower.x as f32;
            for d in 0..4 {
                face_plane[d][j] = face.plane[d] as f32;
                for k in 0..3 {
                    edge_planes[k][d][j] = face.edge_planes[k][d] as f32;
                }
            }
            primitive_idx[j] = nb_points as i32 + nb_edges as i32 + f as i32;
        }
        out.push(PackedFaces {
            min_x: f32x4::from_array(min_x),
            face_plane: face_plane.map(f32x4::from_array),
            edge_planes: edge_planes.map(|p4| p4.map(f32x4::from_array)),
            primitive_idx: i32x4::from_array(primitive_idx),
        });
    }
    out
}

pub(crate) fn pack(
    mut edge_lists: Vec<Vec<(u32, Aabb)>>,
    mut face_lists: Vec<Vec<(u32, Aabb)>>,
    points: &[DVec3],
    topo: &Topology,
) -> PackedArenas {
    let nb_points = points.len();
    let nb_edges = topo.edges.len();
    PackedArenas {
        edges: edge_lists
            .iter_mut()
            .map(|list| pack_edge_list(list, points, topo, nb_points))
            .collect(),
        faces: face_lists
            .iter_mut()
            .map(|list| pack_face_list(list, topo, nb_points, nb_edges))
            .collect(),
    }
}

impl PackedArenas {
    /// Scan the packed candidates of vertex `v`, seeded with the
    /// nearest-vertex answer. Returns the winning id in the global
    /// `[vertices | edges | faces]` space with its squared distance.
    pub fn scan(&self, v: usize, q: Vec3, seed_idx: i32, seed_d2: f32) -> (i32, f32) {
        let qx = f32x4::splat(q.x);
        let qy = f32x4::splat(q.y);
        let qz = f32x4::splat(q.z);
        let zero = f32x4::splat(0.0);
        let one = f32x4::splat(1.0);

        let mut best_d2 = f32x4::splat(seed_d2);
        let mut best_idx = i32x4::splat(seed_idx);

        for pack in &self.edges[v] {
            if q.x < pack.min_x[0] {
                break;
            }

            let apx = qx - pack.start[0];
            let apy = qy - pack.start[1];
            let apz = qz - pack.start[2];
            let t = dot3(apx, apy, apz, pack.dir[0], pack.dir[1], pack.dir[2])
                / pack.dir_len_squared;

            // The projection only counts when it falls inside the segment.
            let mut mask = zero.simd_le(t) & t.simd_le(one);

            let px = t * pack.dir[0] + pack.start[0];
            let py = t * pack.dir[1] + pack.start[1];
            let pz = t * pack.dir[2] + pack.start[2];
            let d2 = distance_squared3(qx, qy, qz, px, py, pz);

            mask &= d2.simd_le(best_d2);
            best_d2 = mask.select(d2, best_d2);
            best_idx = mask.select(pack.primitive_idx, best_idx);
        }

        for pack in &self.faces[v] {
            if q.x < pack.min_x[0] {
                break;
            }

            // Inside the prism over the triangle: on the non-negative side
            // of all three inward edge planes.
            let [p0, p1, p2] = &pack.edge_planes;
            let s0 = eval_plane4(qx, qy, qz, p0[0], p0[1], p0[2], p0[3]);
            let s1 = eval_plane4(qx, qy, qz, p1[0], p1[1], p1[2], p1[3]);
            let s2 = eval_plane4(qx, qy, qz, p2[0], p2[1], p2[2], p2[3]);
            let mut mask = zero.simd_le(s0) & zero.simd_le(s1) & zero.simd_le(s2);

            let fp = &pack.face_plane;
            let e = eval_plane4(qx, qy, qz, fp[0], fp[1], fp[2], fp[3]);
            let d2 = e * e;

            mask &= d2.simd_le(best_d2);
            best_d2 = mask.select(d2, best_d2);
            best_idx = mask.select(pack.primitive_idx, best_idx);
        }

        let dists = best_d2.to_array();
        let idxs = best_idx.to_array();
        let mut bd = dists[0];
        let mut bi = idxs[0];
        for j in 1..LANES {
            if dists[j] < bd {
                bd = dists[j];
                bi = idxs[j];
            }
        }
        (bi, bd)
    }
}
