//! Core types for mesh proximity queries.

use glam::{DVec3, DVec4};

/// Identity of the closest primitive on the mesh surface.
///
/// Indices are local to the primitive kind: vertex indices refer to the
/// (deduplicated) input vertex array, face indices to the input triangle
/// array, and edge indices to the unique-edge array exposed through
/// [`crate::MeshProximity::edge_vertices`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Vertex(u32),
    Edge(u32),
    Face(u32),
}

/// Result of a closest-point query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPoint {
    /// Squared Euclidean distance from the query point to the surface.
    pub distance_squared: f32,
    /// The closest point on the winning primitive.
    pub point: [f32; 3],
    /// Which primitive the closest point lies on.
    pub primitive: Primitive,
}

/// Axis-aligned bounding box, used while building interception lists.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Aabb {
    pub lower: DVec3,
    pub upper: DVec3,
}

impl Aabb {
    pub const EMPTY: Self = Self {
        lower: DVec3::INFINITY,
        upper: DVec3::NEG_INFINITY,
    };

    #[inline]
    pub fn extend(&mut self, p: DVec3) {
        self.lower = self.lower.min(p);
        self.upper = self.upper.max(p);
    }

    #[inline]
    pub fn extend_box(&mut self, other: &Aabb) {
        self.lower = self.lower.min(other.lower);
        self.upper = self.upper.max(other.upper);
    }
}

/// Plane through `(n, w)`, evaluated as `n · p + w`.
#[inline]
pub(crate) fn plane_from(n: DVec3, w: f64) -> DVec4 {
    DVec4::new(n.x, n.y, n.z, w)
}

#[inline]
pub(crate) fn eval_plane(plane: DVec4, p: DVec3) -> f64 {
    plane.x * p.x + plane.y * p.y + plane.z * p.z + plane.w
}

/// Squared distance from `p` to the infinite line through `a` and `b`.
#[inline]
pub(crate) fn distance_to_line_squared(p: DVec3, a: DVec3, b: DVec3) -> f64 {
    let ab = b - a;
    let t = (p - a).dot(ab) / ab.dot(ab);
    p.distance_squared(a + ab * t)
}

/// Squared distance from `p` to a plane with unit-length normal.
#[inline]
pub(crate) fn distance_to_plane_squared(p: DVec3, plane: DVec4) -> f64 {
    let d = eval_plane(plane, p);
    d * d
}

/// Project `p` onto the infinite line through `a` and `b`.
#[inline]
pub(crate) fn project_line(p: DVec3, a: DVec3, b: DVec3) -> DVec3 {
    let ab = b - a;
    a + ab * ((p - a).dot(ab) / ab.dot(ab))
}

/// Project `p` onto the plane through `anchor` with unit normal `plane.xyz`.
#[inline]
pub(crate) fn project_plane(p: DVec3, plane: DVec4, anchor: DVec3) -> DVec3 {
    let n = DVec3::new(plane.x, plane.y, plane.z);
    p - n * n.dot(p - anchor)
}
