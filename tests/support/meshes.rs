#![allow(dead_code)]

use std::collections::HashMap;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// =============================================================================
// Fixtures
// =============================================================================

/// The right triangle used by the literal boundary scenarios.
pub fn single_triangle() -> (Vec<[f32; 3]>, Vec<[u32; 3]>) {
    (
        vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        vec![[0, 1, 2]],
    )
}

/// Two coplanar triangles sharing the edge from (0,0,0) to (1,0,0).
pub fn coplanar_pair() -> (Vec<[f32; 3]>, Vec<[u32; 3]>) {
    (
        vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.5, 1.0, 0.0],
            [0.5, -1.0, 0.0],
        ],
        vec![[0, 1, 2], [0, 3, 1]],
    )
}

/// Tetrahedron over the origin and the three axis unit points. Face 3 is the
/// slanted face through (1,0,0), (0,1,0), (0,0,1).
pub fn tetrahedron() -> (Vec<[f32; 3]>, Vec<[u32; 3]>) {
    (
        vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ],
        vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
    )
}

/// Closed unit cube [0,1]^3 as 12 triangles.
pub fn unit_cube() -> (Vec<[f32; 3]>, Vec<[u32; 3]>) {
    let points = vec![
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [1.0, 0.0, 1.0],
        [0.0, 1.0, 1.0],
        [1.0, 1.0, 1.0],
    ];
    let triangles = vec![
        // bottom (z = 0)
        [0, 2, 1],
        [1, 2, 3],
        // top (z = 1)
        [4, 5, 6],
        [5, 7, 6],
        // front (y = 0)
        [0, 1, 4],
        [1, 5, 4],
        // back (y = 1)
        [2, 6, 3],
        [3, 6, 7],
        // left (x = 0)
        [0, 4, 2],
        [2, 4, 6],
        // right (x = 1)
        [1, 3, 5],
        [3, 7, 5],
    ];
    (points, triangles)
}

// =============================================================================
// Generators
// =============================================================================

/// Jittered heightfield over an n x n grid. Generic position: both the grid
/// coordinates and the heights are perturbed.
pub fn heightfield(n: usize, seed: u64) -> (Vec<[f32; 3]>, Vec<[u32; 3]>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut points = Vec::with_capacity(n * n);
    for j in 0..n {
        for i in 0..n {
            let x = i as f32 + rng.gen_range(-0.2..0.2);
            let y = j as f32 + rng.gen_range(-0.2..0.2);
            let z = (i as f32 * 0.7).sin() + (j as f32 * 0.5).cos() + rng.gen_range(-0.3..0.3);
            points.push([x, y, z]);
        }
    }
    let mut triangles = Vec::with_capacity(2 * (n - 1) * (n - 1));
    for j in 0..n - 1 {
        for i in 0..n - 1 {
            let a = (j * n + i) as u32;
            let b = a + 1;
            let c = a + n as u32;
            let d = c + 1;
            triangles.push([a, b, d]);
            triangles.push([a, d, c]);
        }
    }
    (points, triangles)
}

/// Sphere mesh from a subdivided octahedron, with optional radial jitter to
/// break the symmetry.
pub fn sphere_mesh(subdivisions: usize, jitter: f32, seed: u64) -> (Vec<[f32; 3]>, Vec<[u32; 3]>) {
    let mut verts: Vec<[f64; 3]> = vec![
        [1.0, 0.0, 0.0],
        [-1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, -1.0, 0.0],
        [0.0, 0.0, 1.0],
        [0.0, 0.0, -1.0],
    ];
    let mut triangles: Vec<[u32; 3]> = vec![
        [0, 2, 4],
        [2, 1, 4],
        [1, 3, 4],
        [3, 0, 4],
        [2, 0, 5],
        [1, 2, 5],
        [3, 1, 5],
        [0, 3, 5],
    ];

    for _ in 0..subdivisions {
        let mut midpoints: HashMap<(u32, u32), u32> = HashMap::new();
        let mut next = Vec::with_capacity(triangles.len() * 4);
        for &[a, b, c] in &triangles {
            let ab = midpoint(&mut verts, &mut midpoints, a, b);
            let bc = midpoint(&mut verts, &mut midpoints, b, c);
            let ca = midpoint(&mut verts, &mut midpoints, c, a);
            next.push([a, ab, ca]);
            next.push([ab, b, bc]);
            next.push([ca, bc, c]);
            next.push([ab, bc, ca]);
        }
        triangles = next;
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let points = verts
        .iter()
        .map(|v| {
            let r = if jitter > 0.0 {
                1.0 + rng.gen_range(-jitter..jitter) as f64
            } else {
                1.0
            };
            [(v[0] * r) as f32, (v[1] * r) as f32, (v[2] * r) as f32]
        })
        .collect();
    (points, triangles)
}

fn midpoint(
    verts: &mut Vec<[f64; 3]>,
    midpoints: &mut HashMap<(u32, u32), u32>,
    a: u32,
    b: u32,
) -> u32 {
    let key = if a < b { (a, b) } else { (b, a) };
    *midpoints.entry(key).or_insert_with(|| {
        let pa = verts[a as usize];
        let pb = verts[b as usize];
        let m = [
            (pa[0] + pb[0]) / 2.0,
            (pa[1] + pb[1]) / 2.0,
            (pa[2] + pb[2]) / 2.0,
        ];
        let len = (m[0] * m[0] + m[1] * m[1] + m[2] * m[2]).sqrt();
        verts.push([m[0] / len, m[1] / len, m[2] / len]);
        verts.len() as u32 - 1
    })
}

/// Uniform random query points in a box around the mesh.
pub fn random_queries(
    points: &[[f32; 3]],
    n: usize,
    margin: f32,
    seed: u64,
) -> Vec<[f32; 3]> {
    let (lo, hi) = bounding_box(points);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            [
                rng.gen_range(lo[0] - margin..hi[0] + margin),
                rng.gen_range(lo[1] - margin..hi[1] + margin),
                rng.gen_range(lo[2] - margin..hi[2] + margin),
            ]
        })
        .collect()
}

pub fn bounding_box(points: &[[f32; 3]]) -> ([f32; 3], [f32; 3]) {
    let mut lo = [f32::MAX; 3];
    let mut hi = [f32::MIN; 3];
    for p in points {
        for d in 0..3 {
            lo[d] = lo[d].min(p[d]);
            hi[d] = hi[d].max(p[d]);
        }
    }
    (lo, hi)
}

pub fn bbox_diag_squared(points: &[[f32; 3]]) -> f64 {
    let (lo, hi) = bounding_box(points);
    (0..3)
        .map(|d| (hi[d] as f64 - lo[d] as f64).powi(2))
        .sum()
}

// =============================================================================
// Exhaustive ground truth (double precision)
// =============================================================================

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn add_scaled(a: [f64; 3], b: [f64; 3], s: f64) -> [f64; 3] {
    [a[0] + b[0] * s, a[1] + b[1] * s, a[2] + b[2] * s]
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn dist_squared(a: [f64; 3], b: [f64; 3]) -> f64 {
    let d = sub(a, b);
    dot(d, d)
}

pub fn to_f64(p: [f32; 3]) -> [f64; 3] {
    [p[0] as f64, p[1] as f64, p[2] as f64]
}

/// Closest point on a triangle (Ericson, "Real-Time Collision Detection").
pub fn closest_point_on_triangle(
    p: [f64; 3],
    a: [f64; 3],
    b: [f64; 3],
    c: [f64; 3],
) -> [f64; 3] {
    let ab = sub(b, a);
    let ac = sub(c, a);
    let ap = sub(p, a);

    let d1 = dot(ab, ap);
    let d2 = dot(ac, ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = sub(p, b);
    let d3 = dot(ab, bp);
    let d4 = dot(ac, bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return add_scaled(a, ab, v);
    }

    let cp = sub(p, c);
    let d5 = dot(ab, cp);
    let d6 = dot(ac, cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return add_scaled(a, ac, w);
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return add_scaled(b, sub(c, b), w);
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    add_scaled(add_scaled(a, ab, v), ac, w)
}

/// Exhaustive minimum squared distance over all vertices, edges, and faces.
pub fn brute_force_distance_squared(
    points: &[[f32; 3]],
    triangles: &[[u32; 3]],
    q: [f32; 3],
) -> f64 {
    let qd = to_f64(q);
    let mut best = f64::MAX;
    for p in points {
        best = best.min(dist_squared(qd, to_f64(*p)));
    }
    for t in triangles {
        let a = to_f64(points[t[0] as usize]);
        let b = to_f64(points[t[1] as usize]);
        let c = to_f64(points[t[2] as usize]);
        let cp = closest_point_on_triangle(qd, a, b, c);
        best = best.min(dist_squared(qd, cp));
    }
    best
}
