//! Error types for acceleration-structure construction.

use std::fmt;

/// Errors reported while building a [`crate::MeshProximity`].
///
/// Construction fails fast: no partial structure is kept. Queries on a
/// successfully built structure never fail.
#[derive(Debug, Clone)]
pub enum BuildError {
    /// A vertex coordinate is NaN or infinite.
    NonFiniteCoordinate { vertex: usize },

    /// A triangle references a vertex index past the end of the vertex array.
    IndexOutOfBounds { triangle: usize, index: u32 },

    /// A triangle has fewer than three distinct corners, or zero area.
    /// This can appear after vertex deduplication collapses coincident
    /// input vertices.
    DegenerateTriangle { triangle: usize },

    /// The mesh has no vertices.
    EmptyMesh,

    /// `limit_cube_len` is non-finite, too large to square in single
    /// precision, or does not strictly contain the mesh.
    InvalidLimitCube { limit_cube_len: f64 },

    /// An edge is shared by more than two faces. Only reported when
    /// [`crate::BuildConfig::reject_non_manifold`] is set; the default is to
    /// keep the first two side planes and drop the rest.
    NonManifoldEdge { a: u32, b: u32 },

    /// The vertex tessellation produced an unusable cell. This indicates an
    /// input degeneracy the clipper could not recover from.
    TessellationFailed { vertex: usize, message: String },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::NonFiniteCoordinate { vertex } => {
                write!(f, "vertex {} has a non-finite coordinate", vertex)
            }
            BuildError::IndexOutOfBounds { triangle, index } => {
                write!(
                    f,
                    "triangle {} references out-of-bounds vertex {}",
                    triangle, index
                )
            }
            BuildError::DegenerateTriangle { triangle } => {
                write!(f, "triangle {} is degenerate", triangle)
            }
            BuildError::EmptyMesh => write!(f, "mesh has no vertices"),
            BuildError::InvalidLimitCube { limit_cube_len } => {
                write!(
                    f,
                    "limit_cube_len {} does not strictly contain the mesh or is out of range",
                    limit_cube_len
                )
            }
            BuildError::NonManifoldEdge { a, b } => {
                write!(f, "edge ({}, {}) is shared by more than two faces", a, b)
            }
            BuildError::TessellationFailed { vertex, message } => {
                write!(f, "tessellation failed at vertex {}: {}", vertex, message)
            }
        }
    }
}

impl std::error::Error for BuildError {}
