//! 4-ary SIMD bounding-volume hierarchy over the mesh vertices.
//!
//! Internal nodes hold four child boxes as one SIMD register per corner
//! coordinate, so all four point-to-box distances come out of a handful of
//! vector ops. Leaves store vertex positions in structure-of-arrays packets
//! of four lanes, padded with `(+inf, +inf, +inf, -1)`.

use std::simd::cmp::SimdPartialOrd;
use std::simd::num::SimdFloat;
use std::simd::{f32x4, i32x4, Select};

use glam::{DVec3, Vec3};

use crate::simd::{distance_squared3, length_squared3, LANES};
use crate::types::Aabb;

const MAX_STACK: usize = 64;

#[derive(Debug)]
struct Node {
    min_x: f32x4,
    min_y: f32x4,
    min_z: f32x4,
    max_x: f32x4,
    max_y: f32x4,
    max_z: f32x4,
    /// Child references, one per lane. Negative values encode leaf
    /// references as `-(leaf_id + 1)`.
    children: i32x4,
}

#[derive(Debug)]
struct LeafPacket {
    xs: f32x4,
    ys: f32x4,
    zs: f32x4,
    indices: i32x4,
}

#[derive(Debug)]
pub(crate) struct Bvh {
    nodes: Vec<Node>,
    leaves: Vec<LeafPacket>,
    /// Per-leaf `(first packet, packet count)`.
    leaf_ranges: Vec<(u32, u32)>,
    root: i32,
}

#[inline]
fn coord(p: DVec3, axis: usize) -> f64 {
    match axis {
        0 => p.x,
        1 => p.y,
        _ => p.z,
    }
}

/// Squared distances from a (broadcast) query point to the four child boxes.
#[inline]
fn p2bbox(node: &Node, qx: f32x4, qy: f32x4, qz: f32x4) -> f32x4 {
    let zero = f32x4::splat(0.0);
    let dx = (node.min_x - qx).simd_max(qx - node.max_x).simd_max(zero);
    let dy = (node.min_y - qy).simd_max(qy - node.max_y).simd_max(zero);
    let dz = (node.min_z - qz).simd_max(qz - node.max_z).simd_max(zero);
    length_squared3(dx, dy, dz)
}

impl Bvh {
    pub fn build(points: &[DVec3], packets_per_leaf: usize) -> Self {
        let mut bvh = Self {
            nodes: Vec::new(),
            leaves: Vec::new(),
            leaf_ranges: Vec::new(),
            root: -1,
        };
        if points.is_empty() {
            return bvh;
        }
        let mut indices: Vec<u32> = (0..points.len() as u32).collect();
        let mut bounds = Aabb::EMPTY;
        bvh.root = bvh.construct(points, &mut indices, 0, packets_per_leaf.max(1), &mut bounds);
        bvh
    }

    fn construct(
        &mut self,
        points: &[DVec3],
        indices: &mut [u32],
        depth: usize,
        packets_per_leaf: usize,
        bounds: &mut Aabb,
    ) -> i32 {
        if indices.len() <= packets_per_leaf * LANES {
            *bounds = Aabb::EMPTY;
            for &i in indices.iter() {
                bounds.extend(points[i as usize]);
            }

            let leaf_id = self.leaf_ranges.len() as i32;
            let first = self.leaves.len() as u32;
            let num_packets = (indices.len() + LANES - 1) / LANES;
            for p in 0..num_packets {
                let mut xs = [f32::MAX; LANES];
                let mut ys = [f32::MAX; LANES];
                let mut zs = [f32::MAX; LANES];
                let mut idx = [-1i32; LANES];
                for (j, slot) in idx.iter_mut().enumerate() {
                    let k = p * LANES + j;
                    if k < indices.len() {
                        let pt = points[indices[k] as usize];
                        xs[j] = pt.x as f32;
                        ys[j] = pt.y as f32;
                        zs[j] = pt.z as f32;
                        *slot = indices[k] as i32;
                    }
                }
                self.leaves.push(LeafPacket {
                    xs: f32x4::from_array(xs),
                    ys: f32x4::from_array(ys),
                    zs: f32x4::from_array(zs),
                    indices: i32x4::from_array(idx),
                });
            }
            self.leaf_ranges.push((first, num_packets as u32));
            return -(leaf_id + 1);
        }

        // Two-level median split: primary axis cycles with depth, secondary
        // axis refines each half into quarters.
        let d1 = depth % 3;
        let d2 = (d1 + 1) % 3;

        let mid = indices.len() / 2;
        indices.select_nth_unstable_by(mid, |&a, &b| {
            coord(points[a as usize], d1)
                .partial_cmp(&coord(points[b as usize], d1))
                .expect("coordinates validated finite")
        });
        let (lo, hi) = indices.split_at_mut(mid);

        let q1 = lo.len() / 2;
        lo.select_nth_unstable_by(q1, |&a, &b| {
            coord(points[a as usize], d2)
                .partial_cmp(&coord(points[b as usize], d2))
                .expect("coordinates validated finite")
        });
        let q2 = hi.len() / 2;
        hi.select_nth_unstable_by(q2, |&a, &b| {
            coord(points[a as usize], d2)
                .partial_cmp(&coord(points[b as usize], d2))
                .expect("coordinates validated finite")
        });

        // Reserve the node slot before recursing so children always refer
        // downward.
        let node_idx = self.nodes.len();
        self.nodes.push(Node {
            min_x: f32x4::splat(0.0),
            min_y: f32x4::splat(0.0),
            min_z: f32x4::splat(0.0),
            max_x: f32x4::splat(0.0),
            max_y: f32x4::splat(0.0),
            max_z: f32x4::splat(0.0),
            children: i32x4::splat(0),
        });

        let (a, b) = lo.split_at_mut(q1);
        let (c, d) = hi.split_at_mut(q2);
        let mut child_bounds = [Aabb::EMPTY; 4];
        let children = [
            self.construct(points, a, depth + 2, packets_per_leaf, &mut child_bounds[0]),
            self.construct(points, b, depth + 2, packets_per_leaf, &mut child_bounds[1]),
            self.construct(points, c, depth + 2, packets_per_leaf, &mut child_bounds[2]),
            self.construct(points, d, depth + 2, packets_per_leaf, &mut child_bounds[3]),
        ];

        let mut min = [[0f32; LANES]; 3];
        let mut max = [[0f32; LANES]; 3];
        for (j, cb) in child_bounds.iter().enumerate() {
            for axis in 0..3 {
                min[axis][j] = coord(cb.lower, axis) as f32;
                max[axis][j] = coord(cb.upper, axis) as f32;
            }
        }
        self.nodes[node_idx] = Node {
            min_x: f32x4::from_array(min[0]),
            min_y: f32x4::from_array(min[1]),
            min_z: f32x4::from_array(min[2]),
            max_x: f32x4::from_array(max[0]),
            max_y: f32x4::from_array(max[1]),
            max_z: f32x4::from_array(max[2]),
            children: i32x4::from_array(children),
        };

        *bounds = child_bounds[0];
        for cb in &child_bounds[1..] {
            bounds.extend_box(cb);
        }

        node_idx as i32
    }

    /// Nearest vertex to `q`: `(index, squared distance)`.
    ///
    /// On ties, the first lane to reach the minimum wins; the choice is
    /// stable across runs.
    pub fn closest(&self, q: Vec3) -> (i32, f32) {
        let qx = f32x4::splat(q.x);
        let qy = f32x4::splat(q.y);
        let qz = f32x4::splat(q.z);

        let mut best = f32::MAX;
        let mut best_idx = -1i32;

        let mut stack = [(0i32, 0.0f32); MAX_STACK];
        stack[0] = (self.root, 0.0);
        let mut len = 1usize;

        while len > 0 {
            len -= 1;
            let (node_ref, dist) = stack[len];
            if dist >= best {
                continue;
            }
            if node_ref < 0 {
                let (first, count) = self.leaf_ranges[(-node_ref - 1) as usize];
                self.scan_leaf(first, count, qx, qy, qz, &mut best, &mut best_idx);
                continue;
            }

            let node = &self.nodes[node_ref as usize];
            let dists = p2bbox(node, qx, qy, qz).to_array();
            let children = node.children.to_array();

            // Order the four children by descending distance with a fixed
            // compare-swap network, then push in that order so the nearest
            // child pops first.
            let mut order = [0usize, 1, 2, 3];
            for &(i, j) in &[(0, 1), (2, 3), (0, 2), (1, 3), (1, 2)] {
                if dists[order[i]] < dists[order[j]] {
                    order.swap(i, j);
                }
            }

            for &s in &order {
                if dists[s] < best {
                    assert!(len < MAX_STACK, "bvh traversal stack overflow");
                    stack[len] = (children[s], dists[s]);
                    len += 1;
                }
            }
        }

        (best_idx, best)
    }

    fn scan_leaf(
        &self,
        first: u32,
        count: u32,
        qx: f32x4,
        qy: f32x4,
        qz: f32x4,
        best: &mut f32,
        best_idx: &mut i32,
    ) {
        let mut min_dist = f32x4::splat(*best);
        let mut min_idx = i32x4::splat(*best_idx);

        for leaf in &self.leaves[first as usize..(first + count) as usize] {
            let d2 = distance_squared3(qx, qy, qz, leaf.xs, leaf.ys, leaf.zs);
            let keep = d2.simd_ge(min_dist);
            min_dist = min_dist.simd_min(d2);
            min_idx = keep.select(min_idx, leaf.indices);
        }

        let dists = min_dist.to_array();
        let idxs = min_idx.to_array();
        for j in 0..LANES {
            if dists[j] < *best {
                *best = dists[j];
                *best_idx = idxs[j];
            }
        }
    }

    /// Push the index of every vertex within `radius_squared` of `q`.
    ///
    /// Single precision; callers that need exactness must over-request and
    /// re-filter in double precision.
    pub fn collect_within(&self, q: Vec3, radius_squared: f32, out: &mut Vec<u32>) {
        if self.root == -1 && self.nodes.is_empty() && self.leaf_ranges.is_empty() {
            return;
        }
        let qx = f32x4::splat(q.x);
        let qy = f32x4::splat(q.y);
        let qz = f32x4::splat(q.z);
        let r = f32x4::splat(radius_squared);

        let mut stack = [0i32; MAX_STACK];
        stack[0] = self.root;
        let mut len = 1usize;

        while len > 0 {
            len -= 1;
            let node_ref = stack[len];
            if node_ref < 0 {
                let (first, count) = self.leaf_ranges[(-node_ref - 1) as usize];
                for leaf in &self.leaves[first as usize..(first + count) as usize] {
                    let d2 = distance_squared3(qx, qy, qz, leaf.xs, leaf.ys, leaf.zs);
                    let mut bits = d2.simd_le(r).to_bitmask();
                    while bits != 0 {
                        let lane = bits.trailing_zeros() as usize;
                        let idx = leaf.indices[lane];
                        if idx >= 0 {
                            out.push(idx as u32);
                        }
                        bits &= bits - 1;
                    }
                }
                continue;
            }

            let node = &self.nodes[node_ref as usize];
            let dists = p2bbox(node, qx, qy, qz).to_array();
            let children = node.children.to_array();
            for s in 0..LANES {
                if dists[s] <= radius_squared {
                    assert!(len < MAX_STACK, "bvh traversal stack overflow");
                    stack[len] = children[s];
                    len += 1;
                }
            }
        }
    }
}
