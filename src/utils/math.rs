//! Small geometric helpers shared by the scene, the meshlet builder and the passes.

use glam::{Mat4, Quat, Vec3, Vec4};

/// Forward direction of an orientation.
///
/// The engine is right-handed with -Z as forward, matching the camera's view space.
#[inline]
#[must_use]
pub fn quat_to_forward(rotation: Quat) -> Vec3 {
    (rotation * Vec3::NEG_Z).normalize_or_zero()
}

// ============================================================================
// Axis-Aligned Bounding Box
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    /// Inverted box; extending it with any point yields that point.
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::MAX),
        max: Vec3::splat(f32::MIN),
    };

    #[must_use]
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut aabb = Self::EMPTY;
        for p in points {
            aabb.extend(p);
        }
        aabb
    }

    pub fn extend(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[must_use]
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Bounding box of this box after `transform` (Arvo's method).
    #[must_use]
    pub fn transformed(&self, transform: &Mat4) -> Self {
        if self.is_empty() {
            return *self;
        }
        let center = transform.transform_point3(self.center());
        let extents = self.extents();
        let abs_x = transform.x_axis.truncate().abs() * extents.x;
        let abs_y = transform.y_axis.truncate().abs() * extents.y;
        let abs_z = transform.z_axis.truncate().abs() * extents.z;
        let half = abs_x + abs_y + abs_z;
        Self {
            min: center - half,
            max: center + half,
        }
    }
}

// ============================================================================
// Frustum
// ============================================================================

/// Six normalized planes `(n, d)` with `dot(n, p) + d >= 0` inside.
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    pub planes: [Vec4; 6],
}

impl Frustum {
    /// Gribb-Hartmann extraction for a `[0, 1]` depth range projection.
    #[must_use]
    pub fn from_matrix(m: Mat4) -> Self {
        let rows = [m.row(0), m.row(1), m.row(2), m.row(3)];
        let mut planes = [
            rows[3] + rows[0], // left
            rows[3] - rows[0], // right
            rows[3] + rows[1], // bottom
            rows[3] - rows[1], // top
            rows[2],           // near
            rows[3] - rows[2], // far
        ];
        for plane in &mut planes {
            let length = plane.truncate().length();
            if length > f32::EPSILON {
                *plane /= length;
            }
        }
        Self { planes }
    }

    /// Drops the near plane, keeping everything between the eye side and the
    /// far plane. Used with depth-clamped pipelines, where geometry in front
    /// of the near plane still rasterizes at depth 0.
    #[must_use]
    pub fn without_near(mut self) -> Self {
        self.planes[4] = Vec4::W;
        self
    }

    #[must_use]
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.truncate().dot(center) + plane.w >= -radius)
    }

    #[must_use]
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        if aabb.is_empty() {
            return false;
        }
        self.planes.iter().all(|plane| {
            let n = plane.truncate();
            // Positive vertex along the plane normal
            let p = Vec3::select(n.cmpge(Vec3::ZERO), aabb.max, aabb.min);
            n.dot(p) + plane.w >= 0.0
        })
    }
}
