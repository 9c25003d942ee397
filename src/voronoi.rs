//! Bounded Voronoi tessellation of the mesh vertices.
//!
//! Each cell starts from the bounding cube `[-2L, 2L]^3` and is carved by
//! bisector planes of candidate sites, processed in order of increasing
//! distance. Candidates come from the vertex BVH through an expanding radius
//! gather; processing stops once the security radius guarantees that no
//! farther site can cut the cell (a site farther than twice the largest
//! corner distance has its bisector entirely outside the cell).
//!
//! The site set is the mesh vertices plus eight synthetic corner sites that
//! bound the cells of the convex hull; corner sites get ids past
//! `nb_points` and are filtered by the classifier's BFS.

use glam::{DVec3, DVec4};
use rayon::prelude::*;

use crate::bvh::Bvh;
use crate::cell::ConvexCell;
use crate::error::BuildError;
use crate::types::Aabb;

pub(crate) struct Tessellation {
    /// One cell per mesh vertex.
    pub cells: Vec<ConvexCell>,
    /// Per-vertex Voronoi neighbors, in cell face order. May include the
    /// synthetic corner sites (ids in `nb_points..nb_points + 8`).
    pub neighbors: Vec<Vec<u32>>,
}

pub(crate) fn corner_sites(limit_cube_len: f64) -> [DVec3; 8] {
    let l = 2.0 * limit_cube_len;
    [
        DVec3::new(l, l, l),
        DVec3::new(-l, l, l),
        DVec3::new(l, -l, l),
        DVec3::new(l, l, -l),
        DVec3::new(-l, -l, l),
        DVec3::new(-l, l, -l),
        DVec3::new(l, -l, -l),
        DVec3::new(-l, -l, -l),
    ]
}

/// Bisector of `site` and `other`, positive on the `site` side.
#[inline]
fn bisector(site: DVec3, other: DVec3) -> DVec4 {
    let n = site - other;
    let w = (other.length_squared() - site.length_squared()) / 2.0;
    DVec4::new(n.x, n.y, n.z, w)
}

pub(crate) fn build(
    points: &[DVec3],
    bvh: &Bvh,
    limit_cube_len: f64,
) -> Result<Tessellation, BuildError> {
    let corners = corner_sites(limit_cube_len);
    let half = 2.0 * limit_cube_len;

    // Initial gather radius from the mean spacing of a uniform scatter over
    // the mesh extent; the per-cell loop expands it as needed.
    let mut bounds = Aabb::EMPTY;
    for &p in points {
        bounds.extend(p);
    }
    let extent = (bounds.upper - bounds.lower)
        .max_element()
        .max(limit_cube_len * 1e-3);
    let r0 = 4.0 * extent / (points.len() as f64).cbrt().max(1.0);

    let cells: Result<Vec<ConvexCell>, BuildError> = (0..points.len())
        .into_par_iter()
        .map(|v| build_cell(v, points, bvh, &corners, half, r0))
        .collect();
    let cells = cells?;

    let neighbors = cells
        .iter()
        .map(|cell| cell.neighbor_ids().collect())
        .collect();

    Ok(Tessellation { cells, neighbors })
}

fn build_cell(
    v: usize,
    points: &[DVec3],
    bvh: &Bvh,
    corners: &[DVec3; 8],
    half: f64,
    r0: f64,
) -> Result<ConvexCell, BuildError> {
    let site = points[v];
    let mut cell = ConvexCell::cube(half);
    let mut max_d2 = cell.max_distance_squared(site);

    // Past this radius every site in the domain has been gathered.
    let cover_all = 4.0 * half * 3.0f64.sqrt();

    let mut gathered: Vec<u32> = Vec::new();
    let mut candidates: Vec<(f64, u32)> = Vec::new();
    let mut processed = 0usize;
    let mut radius = r0.min(cover_all);

    loop {
        // Gather every site within the current radius, sorted by
        // (distance, index). The sorted list only grows at the tail when the
        // radius expands, so `processed` stays a valid prefix length.
        candidates.clear();
        gathered.clear();
        bvh.collect_within(site.as_vec3(), (radius * radius * 1.05) as f32, &mut gathered);
        for &u in &gathered {
            if u as usize == v {
                continue;
            }
            let d2 = site.distance_squared(points[u as usize]);
            if d2 <= radius * radius {
                candidates.push((d2, u));
            }
        }
        for (k, corner) in corners.iter().enumerate() {
            let d2 = site.distance_squared(*corner);
            if d2 <= radius * radius {
                candidates.push((d2, (points.len() + k) as u32));
            }
        }
        candidates.sort_by(|a, b| a.partial_cmp(b).expect("distances are finite"));

        for i in processed..candidates.len() {
            let (d2, u) = candidates[i];
            if d2 > 4.0 * max_d2 {
                // Security radius reached: all remaining candidates are
                // farther still and cannot cut the cell.
                return Ok(cell);
            }
            let other = if (u as usize) < points.len() {
                points[u as usize]
            } else {
                corners[u as usize - points.len()]
            };
            if cell.clip_by_plane(bisector(site, other), u) {
                if cell.is_empty() {
                    return Err(BuildError::TessellationFailed {
                        vertex: v,
                        message: "cell clipped away by a bisector".into(),
                    });
                }
                max_d2 = cell.max_distance_squared(site);
            }
            processed = i + 1;
        }

        let security = 2.0 * max_d2.sqrt();
        if radius >= security || radius >= cover_all {
            return Ok(cell);
        }
        radius = (radius * 2.0).max(security * 1.01).min(cover_all);
    }
}
