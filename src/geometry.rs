//! Geometry kernel: rotation matrices, oriented boxes, point/sphere tests
//! and AABB distance helpers.
//!
//! Angles are degrees at every public entry point and radians internally.
//! Matrices are row-major `[[f64; 3]; 3]` and are only ever inverted by
//! transposition, so callers must pass orthonormal rotations.

use crate::types::Coordinate;

/// Row-major 3×3 matrix.
pub type Mat3 = [[f64; 3]; 3];

pub const IDENTITY: Mat3 = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

// ---------------------------------------------------------------------------
// Matrices
// ---------------------------------------------------------------------------

/// Combined rotation `Rz * Ry * Rx` for Euler angles given in degrees.
pub fn rotation_matrix(angles_deg: Coordinate) -> Mat3 {
    let (sx, cx) = angles_deg.x.to_radians().sin_cos();
    let (sy, cy) = angles_deg.y.to_radians().sin_cos();
    let (sz, cz) = angles_deg.z.to_radians().sin_cos();

    [
        [cy * cz, cz * sx * sy - cx * sz, sx * sz + cx * cz * sy],
        [cy * sz, cx * cz + sx * sy * sz, cx * sy * sz - cz * sx],
        [-sy, cy * sx, cx * cy],
    ]
}

pub fn transpose(m: &Mat3) -> Mat3 {
    let mut t = [[0.0; 3]; 3];
    for (r, row) in m.iter().enumerate() {
        for (c, v) in row.iter().enumerate() {
            t[c][r] = *v;
        }
    }
    t
}

pub fn mat_mul(a: &Mat3, b: &Mat3) -> Mat3 {
    let mut out = [[0.0; 3]; 3];
    for (r, out_row) in out.iter_mut().enumerate() {
        for (c, cell) in out_row.iter_mut().enumerate() {
            *cell = (0..3).map(|k| a[r][k] * b[k][c]).sum();
        }
    }
    out
}

pub fn mat_vec(m: &Mat3, v: Coordinate) -> Coordinate {
    Coordinate::new(
        m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z,
        m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z,
        m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z,
    )
}

/// Translate `p` by `-center`, then rotate it by `inverse_rotation`.
pub fn world_to_local(p: Coordinate, center: Coordinate, inverse_rotation: &Mat3) -> Coordinate {
    mat_vec(inverse_rotation, p.sub(center))
}

// ---------------------------------------------------------------------------
// Precomputed oriented box
// ---------------------------------------------------------------------------

/// Cached collision data for a solid: centre, half extents and the inverse
/// (transposed) rotation.  Rebuild whenever position, size or rotation change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrecomputedBox {
    pub center: Coordinate,
    pub half_extents: Coordinate,
    pub inverse_rotation: Mat3,
}

impl PrecomputedBox {
    /// `position` is the box's minimum corner in its parent frame.
    pub fn new(position: Coordinate, size: Coordinate, rotation_deg: Coordinate) -> Self {
        let half_extents = size.scale(0.5);
        Self {
            center: position.add(half_extents),
            half_extents,
            inverse_rotation: transpose(&rotation_matrix(rotation_deg)),
        }
    }

    pub fn to_local(&self, point: Coordinate) -> Coordinate {
        world_to_local(point, self.center, &self.inverse_rotation)
    }
}

// ---------------------------------------------------------------------------
// Containment / intersection
// ---------------------------------------------------------------------------

/// Top-down footprint test.  Only the upper-left 2×2 block of the inverse
/// rotation is used, so height never matters.
pub fn point_in_footprint(point: Coordinate, bx: &PrecomputedBox) -> bool {
    let r = &bx.inverse_rotation;
    let dx = point.x - bx.center.x;
    let dy = point.y - bx.center.y;
    let lx = r[0][0] * dx + r[0][1] * dy;
    let ly = r[1][0] * dx + r[1][1] * dy;
    lx.abs() <= bx.half_extents.x && ly.abs() <= bx.half_extents.y
}

/// Sphere vs oriented box: clamp the local point onto the box and compare
/// squared distances.
pub fn sphere_intersects_box(point: Coordinate, radius: f64, bx: &PrecomputedBox) -> bool {
    let local = bx.to_local(point);
    let h = bx.half_extents;
    let closest = Coordinate::new(
        local.x.clamp(-h.x, h.x),
        local.y.clamp(-h.y, h.y),
        local.z.clamp(-h.z, h.z),
    );
    let d = local.sub(closest);
    d.x * d.x + d.y * d.y + d.z * d.z <= radius * radius
}

/// Squared distance from `p` to an origin-centred AABB with `half` extents.
pub fn squared_distance_point_aabb(p: Coordinate, half: Coordinate) -> f64 {
    p.to_array()
        .iter()
        .zip(half.to_array())
        .map(|(&v, h)| {
            if v < -h {
                (v + h) * (v + h)
            } else if v > h {
                (v - h) * (v - h)
            } else {
                0.0
            }
        })
        .sum()
}

/// Squared distance between segment `p0..p1` and an origin-centred AABB.
///
/// Slab clipping: returns 0 when the segment penetrates the box, otherwise
/// the squared distance from `p0` to the box.
pub fn segment_aabb_distance_squared(p0: Coordinate, p1: Coordinate, half: Coordinate) -> f64 {
    let start = p0.to_array();
    let dir = p1.sub(p0).to_array();
    let h = half.to_array();

    let mut t_min = 0.0_f64;
    let mut t_max = 1.0_f64;

    for i in 0..3 {
        if dir[i].abs() < 1e-8 {
            if start[i] < -h[i] || start[i] > h[i] {
                return squared_distance_point_aabb(p0, half);
            }
        } else {
            let ood = 1.0 / dir[i];
            let mut t1 = (-h[i] - start[i]) * ood;
            let mut t2 = (h[i] - start[i]) * ood;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            t_min = t_min.max(t1);
            t_max = t_max.min(t2);
            if t_min > t_max {
                return squared_distance_point_aabb(p0, half);
            }
        }
    }

    0.0
}
