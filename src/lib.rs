#![feature(portable_simd)]

//! Exact closest-point queries on triangle meshes.
//!
//! Given a triangulated surface and a query point, [`MeshProximity`] returns
//! the squared distance to the surface, the closest surface point, and the
//! primitive (vertex, edge, or face) it lies on. Construction is costly;
//! queries are low-latency and safe to run from many threads at once.
//!
//! The structure is built around per-vertex *interception lists*, derived
//! from a Voronoi diagram of the mesh vertices: a query first finds its
//! nearest mesh vertex in a 4-ary SIMD BVH, then scans only the edges and
//! faces whose Voronoi-clipped winning region could beat that vertex. The
//! scans run over x-sorted SIMD-packed records with an early exit, so they
//! are short and branch-light.
//!
//! # Example
//!
//! ```
//! use mesh_proximity::{MeshProximity, Primitive};
//!
//! let points = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
//! let triangles = [[0u32, 1, 2]];
//! let prox = MeshProximity::build(&points, &triangles, 10.0).unwrap();
//!
//! let hit = prox.closest([0.25, 0.25, 1.0]);
//! assert_eq!(hit.primitive, Primitive::Face(0));
//! assert!((hit.distance_squared - 1.0).abs() < 1e-5);
//! assert!((hit.point[2]).abs() < 1e-5);
//! ```

mod bvh;
mod cell;
mod error;
mod intercept;
mod packed;
mod simd;
mod topology;
mod types;
mod voronoi;

use glam::{DVec3, Vec3};

use bvh::Bvh;
use packed::PackedArenas;
use topology::Topology;
use types::{project_line, project_plane};

pub use error::BuildError;
pub use types::{ClosestPoint, Primitive};

/// Build-time tuning knobs.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Maximum number of 4-wide packets per BVH leaf.
    pub packets_per_leaf: usize,
    /// Fail construction when an edge is shared by more than two faces.
    /// The default keeps the first two side planes and drops the rest,
    /// making non-manifold input best-effort.
    pub reject_non_manifold: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            packets_per_leaf: 8,
            reject_non_manifold: false,
        }
    }
}

/// Acceleration structure answering exact closest-point queries against a
/// triangle mesh.
///
/// Immutable once built; see the crate docs for the overall design.
#[derive(Debug)]
pub struct MeshProximity {
    points: Vec<DVec3>,
    triangles: Vec<[u32; 3]>,
    topology: Topology,
    bvh: Bvh,
    arenas: PackedArenas,
}

impl MeshProximity {
    /// Build the acceleration structure with default configuration.
    ///
    /// `limit_cube_len` must be strictly larger than the largest absolute
    /// mesh coordinate; it bounds the transient Voronoi diagram used during
    /// construction. Exactly coincident vertices are merged and triangle
    /// indices remapped; a triangle that collapses under that merge is
    /// rejected. Every vertex should be referenced by some triangle —
    /// unreferenced vertices are answered as closest primitives like any
    /// other vertex.
    pub fn build(
        points: &[[f32; 3]],
        triangles: &[[u32; 3]],
        limit_cube_len: f32,
    ) -> Result<Self, BuildError> {
        Self::build_with(points, triangles, limit_cube_len, BuildConfig::default())
    }

    /// Build with explicit configuration.
    pub fn build_with(
        points: &[[f32; 3]],
        triangles: &[[u32; 3]],
        limit_cube_len: f32,
        config: BuildConfig,
    ) -> Result<Self, BuildError> {
        let mut points: Vec<DVec3> = points
            .iter()
            .map(|p| DVec3::new(p[0] as f64, p[1] as f64, p[2] as f64))
            .collect();
        let mut triangles = triangles.to_vec();

        topology::validate(&points, &triangles)?;

        let limit = limit_cube_len as f64;
        if !(limit.is_finite() && limit > 0.0 && limit * limit < 1e18) {
            return Err(BuildError::InvalidLimitCube {
                limit_cube_len: limit,
            });
        }
        let max_abs = points.iter().fold(0.0f64, |m, p| {
            m.max(p.x.abs()).max(p.y.abs()).max(p.z.abs())
        });
        if max_abs >= limit {
            return Err(BuildError::InvalidLimitCube {
                limit_cube_len: limit,
            });
        }

        topology::deduplicate(&mut points, &mut triangles);

        let timer = std::time::Instant::now();
        let topology = topology::build(&points, &triangles, config.reject_non_manifold)?;
        let bvh = Bvh::build(&points, config.packets_per_leaf);
        let t_topology = timer.elapsed();

        let timer = std::time::Instant::now();
        let tessellation = voronoi::build(&points, &bvh, limit)?;
        let t_voronoi = timer.elapsed();

        let timer = std::time::Instant::now();
        let lists = intercept::classify(&points, &triangles, &topology, &tessellation);
        drop(tessellation);
        let arenas = packed::pack(lists.edges, lists.faces, &points, &topology);
        let t_intercept = timer.elapsed();

        if log_enabled() {
            eprintln!(
                "mesh-proximity: {} vertices, {} edges, {} faces; topology+bvh {:?}, voronoi {:?}, interception {:?}",
                points.len(),
                topology.edges.len(),
                topology.faces.len(),
                t_topology,
                t_voronoi,
                t_intercept,
            );
        }

        Ok(Self {
            points,
            triangles,
            topology,
            bvh,
            arenas,
        })
    }

    /// Exact closest point on the mesh surface, up to single-precision
    /// rounding.
    pub fn closest(&self, q: [f32; 3]) -> ClosestPoint {
        let q = Vec3::from_array(q);
        let (v, d2) = self.bvh.closest(q);
        let (idx, d2) = self.arenas.scan(v as usize, q, v, d2);
        self.decode(q, idx, d2)
    }

    fn decode(&self, q: Vec3, idx: i32, distance_squared: f32) -> ClosestPoint {
        let nb_points = self.points.len();
        let nb_edges = self.topology.edges.len();
        let idx = idx as usize;
        let qd = q.as_dvec3();

        if idx < nb_points {
            ClosestPoint {
                distance_squared,
                point: self.points[idx].as_vec3().to_array(),
                primitive: Primitive::Vertex(idx as u32),
            }
        } else if idx < nb_points + nb_edges {
            let e = idx - nb_points;
            let edge = &self.topology.edges[e];
            let cp = project_line(
                qd,
                self.points[edge.start as usize],
                self.points[edge.end as usize],
            );
            ClosestPoint {
                distance_squared,
                point: cp.as_vec3().to_array(),
                primitive: Primitive::Edge(e as u32),
            }
        } else {
            let f = idx - nb_points - nb_edges;
            let face = &self.topology.faces[f];
            let cp = project_plane(qd, face.plane, face.anchor);
            ClosestPoint {
                distance_squared,
                point: cp.as_vec3().to_array(),
                primitive: Primitive::Face(f as u32),
            }
        }
    }

    /// Number of (deduplicated) mesh vertices.
    pub fn num_vertices(&self) -> usize {
        self.points.len()
    }

    /// Number of unique mesh edges.
    pub fn num_edges(&self) -> usize {
        self.topology.edges.len()
    }

    /// Number of triangles.
    pub fn num_faces(&self) -> usize {
        self.triangles.len()
    }

    /// Vertex positions after deduplication.
    pub fn positions(&self) -> Vec<[f32; 3]> {
        self.points
            .iter()
            .map(|p| p.as_vec3().to_array())
            .collect()
    }

    /// Triangles with (possibly remapped) vertex indices.
    pub fn faces(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    /// Endpoints `(a, b)` of a unique edge, with `a < b`.
    pub fn edge_vertices(&self, edge: u32) -> (u32, u32) {
        let e = &self.topology.edges[edge as usize];
        (e.start, e.end)
    }

    /// For every face, its three edge ids in the triangle's vertex order.
    pub fn face_edges(&self) -> Vec<[u32; 3]> {
        self.triangles
            .iter()
            .map(|tri| {
                let mut ids = [0u32; 3];
                for (i, slot) in ids.iter_mut().enumerate() {
                    let a = tri[i];
                    let b = tri[(i + 1) % 3];
                    let key = if a < b { (a, b) } else { (b, a) };
                    *slot = self.topology.edge_index[&key];
                }
                ids
            })
            .collect()
    }
}

fn log_enabled() -> bool {
    std::env::var_os("MESH_PROXIMITY_LOG").is_some()
}
