//! Convex cell clipping.
//!
//! A cell is a bounded convex polyhedron kept in primal form: one polygon
//! loop per supporting plane. Every loop edge records the id of the plane on
//! the other side, so the corner where two loops meet is identified exactly
//! by a pair of plane ids. Clipping uses those ids to compute each cut point
//! once and to stitch the new cap face topologically, without any coordinate
//! matching.
//!
//! All faces are wound counter-clockwise as seen from outside the cell; the
//! cap construction preserves this, so every polyhedron edge appears in
//! exactly two loops, once in each direction.

use glam::{DVec3, DVec4};
use rustc_hash::FxHashMap;

use crate::types::eval_plane;

/// Ids of the six walls of the initial bounding cube. They sit at the top of
/// the id space so they can never collide with site ids.
pub(crate) const WALL_ID_BASE: u32 = u32::MAX - 16;
/// Ids for transient clipping planes (primitive support planes).
pub(crate) const CLIP_ID_BASE: u32 = u32::MAX - 8;

#[derive(Debug, Clone)]
pub(crate) struct CellFace {
    /// Id of the supporting plane: a site index for bisector faces, or one
    /// of the reserved wall/clip ids.
    pub id: u32,
    /// Boundary loop.
    pub verts: Vec<DVec3>,
    /// `edge_ids[i]` is the id of the face across edge `verts[i] -> verts[i+1]`.
    pub edge_ids: Vec<u32>,
}

#[derive(Debug, Clone)]
pub(crate) struct ConvexCell {
    faces: Vec<CellFace>,
}

#[inline]
fn unit(axis: usize) -> DVec3 {
    match axis {
        0 => DVec3::X,
        1 => DVec3::Y,
        _ => DVec3::Z,
    }
}

#[inline]
fn pair_key(a: u32, b: u32) -> (u32, u32) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

impl ConvexCell {
    /// The axis-aligned cube `[-half, half]^3`.
    pub fn cube(half: f64) -> Self {
        // Walls in the order -x, +x, -y, +y, -z, +z. Each entry is the
        // outward axis with its sign plus the two in-plane axes `(v, w)`,
        // chosen so that `v × w` points outward; the loop
        // (-v-w, +v-w, +v+w, -v+w) is then counter-clockwise from outside.
        let walls: [(usize, f64, usize, usize); 6] = [
            (0, -1.0, 2, 1),
            (0, 1.0, 1, 2),
            (1, -1.0, 0, 2),
            (1, 1.0, 2, 0),
            (2, -1.0, 1, 0),
            (2, 1.0, 0, 1),
        ];

        let mut faces = Vec::with_capacity(6);
        for (wall, &(a, sign, b, c)) in walls.iter().enumerate() {
            let u = unit(a) * sign * half;
            let v = unit(b) * half;
            let w = unit(c) * half;
            // Edge k runs along the wall named by edge_ids[k]: the loop edges
            // lie at w = -half, v = +half, w = +half, v = -half in turn.
            faces.push(CellFace {
                id: WALL_ID_BASE + wall as u32,
                verts: vec![u - v - w, u + v - w, u + v + w, u - v + w],
                edge_ids: vec![
                    WALL_ID_BASE + 2 * c as u32,
                    WALL_ID_BASE + 2 * b as u32 + 1,
                    WALL_ID_BASE + 2 * c as u32 + 1,
                    WALL_ID_BASE + 2 * b as u32,
                ],
            });
        }
        Self { faces }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    #[inline]
    pub fn faces(&self) -> &[CellFace] {
        &self.faces
    }

    /// Largest squared distance from `site` to any cell corner.
    pub fn max_distance_squared(&self, site: DVec3) -> f64 {
        let mut max = 0.0f64;
        for face in &self.faces {
            for &v in &face.verts {
                max = max.max(site.distance_squared(v));
            }
        }
        max
    }

    /// Ids of the supporting planes that still bound the cell, excluding the
    /// cube walls and transient clip planes.
    pub fn neighbor_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.faces
            .iter()
            .map(|f| f.id)
            .filter(|&id| id < WALL_ID_BASE)
    }

    /// Clip the cell by `plane`, keeping the side where the plane evaluates
    /// to a non-negative value. `id` names the plane in the cell topology
    /// and must differ from every id already present.
    ///
    /// Returns `true` if the plane cut the cell.
    pub fn clip_by_plane(&mut self, plane: DVec4, id: u32) -> bool {
        let mut any_neg = false;
        let mut any_kept = false;
        let signs: Vec<Vec<f64>> = self
            .faces
            .iter()
            .map(|face| {
                face.verts
                    .iter()
                    .map(|&p| {
                        let s = eval_plane(plane, p);
                        if s < 0.0 {
                            any_neg = true;
                        } else {
                            any_kept = true;
                        }
                        s
                    })
                    .collect()
            })
            .collect();

        if !any_neg {
            return false;
        }
        if !any_kept {
            self.faces.clear();
            return true;
        }

        // Position of each cut polyhedron edge, keyed by its two face ids so
        // both incident faces use the identical point.
        let mut crossings: FxHashMap<(u32, u32), DVec3> = FxHashMap::default();
        // Directed cap segments: from-corner key -> (to-corner key, position
        // of the from-corner, id of the cut face along the segment).
        let mut cap: FxHashMap<(u32, u32), ((u32, u32), DVec3, u32)> = FxHashMap::default();

        let old_faces = std::mem::take(&mut self.faces);
        let mut new_faces = Vec::with_capacity(old_faces.len() + 1);

        for (mut face, s) in old_faces.into_iter().zip(signs) {
            let n = face.verts.len();
            if s.iter().all(|&v| v >= 0.0) {
                new_faces.push(face);
                continue;
            }
            if s.iter().all(|&v| v < 0.0) {
                continue;
            }

            let fid = face.id;
            let mut verts = Vec::with_capacity(n + 2);
            let mut edge_ids = Vec::with_capacity(n + 2);
            let mut exit_key = None;
            let mut enter = None;

            for i in 0..n {
                let j = (i + 1) % n;
                let crossing = |crossings: &mut FxHashMap<(u32, u32), DVec3>| {
                    let key = pair_key(fid, face.edge_ids[i]);
                    let pos = *crossings.entry(key).or_insert_with(|| {
                        let (a, b) = (face.verts[i], face.verts[j]);
                        a + (b - a) * (s[i] / (s[i] - s[j]))
                    });
                    (key, pos)
                };

                if s[i] >= 0.0 {
                    verts.push(face.verts[i]);
                    edge_ids.push(face.edge_ids[i]);
                    if s[j] < 0.0 {
                        // Leaving the kept half-space: the loop continues
                        // along the cut toward the re-entry point.
                        let (key, pos) = crossing(&mut crossings);
                        verts.push(pos);
                        edge_ids.push(id);
                        exit_key = Some(key);
                    }
                } else if s[j] >= 0.0 {
                    // Re-entering: the crossing stays on the original edge.
                    let (key, pos) = crossing(&mut crossings);
                    verts.push(pos);
                    edge_ids.push(face.edge_ids[i]);
                    enter = Some((key, pos));
                }
            }

            // The cap traverses this face's cut edge in the opposite
            // direction: entry corner -> exit corner, bordering `fid`.
            if let (Some((enter_key, enter_pos)), Some(exit_key)) = (enter, exit_key) {
                cap.insert(enter_key, (exit_key, enter_pos, fid));
            }

            if verts.len() >= 3 {
                face.verts = verts;
                face.edge_ids = edge_ids;
                new_faces.push(face);
            }
        }

        // Chain the cap segments into a closed loop. A chain that fails to
        // close means the cut was degenerate; the cap is dropped and the
        // cell stays otherwise intact.
        if cap.len() >= 3 {
            if let Some(&start) = cap.keys().min() {
                let mut verts = Vec::with_capacity(cap.len());
                let mut edge_ids = Vec::with_capacity(cap.len());
                let mut cur = start;
                let mut closed = true;
                for _ in 0..cap.len() {
                    match cap.get(&cur) {
                        Some(&(next, pos, fid)) => {
                            verts.push(pos);
                            edge_ids.push(fid);
                            cur = next;
                        }
                        None => {
                            closed = false;
                            break;
                        }
                    }
                }
                if closed && cur == start && verts.len() >= 3 {
                    new_faces.push(CellFace {
                        id,
                        verts,
                        edge_ids,
                    });
                }
            }
        }

        self.faces = new_faces;
        true
    }
}
