//! Shadow Utilities
//!
//! Pure math for shadow mapping, kept apart from the shadow pass for reuse
//! and testability.
//!
//! # Provided Functions
//!
//! - Cascade split computation (practical split scheme)
//! - Frustum corner extraction in world space
//! - Bounding-sphere fitting with radius quantization
//! - Texel snapping of the light projection
//! - Perspective matrices for spot light shadows

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::rhi::{DescriptorIndex, INVALID_DESCRIPTOR};
use crate::scene::Camera;

/// Number of directional light cascades.
pub const SHADOW_CASCADE_COUNT: usize = 4;
pub const DIR_LIGHT_SHADOW_DIMENSION: u32 = 2048;
pub const SPOT_LIGHT_SHADOW_DIMENSION: u32 = 2048;

/// Cascade sphere radii are rounded up to multiples of `1 / RADIUS_GRANULARITY`.
const RADIUS_GRANULARITY: f32 = 16.0;

/// GPU-visible cascade record.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Cascade {
    /// SRV of the cascade's depth map.
    pub srv_index: DescriptorIndex,
    /// Far view-space distance of this cascade.
    pub split: f32,
    _pad: [i32; 2],
    pub view: Mat4,
    pub proj: Mat4,
}

impl Default for Cascade {
    fn default() -> Self {
        Self {
            srv_index: INVALID_DESCRIPTOR,
            split: 0.0,
            _pad: [0; 2],
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
        }
    }
}

impl Cascade {
    #[inline]
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.proj * self.view
    }
}

// ============================================================================
// Cascade Split Computation
// ============================================================================

/// Computes `SHADOW_CASCADE_COUNT + 1` split distances.
///
/// `split[0] == near`, `split[K] == far`; interior splits blend the
/// logarithmic (`lambda = 1`) and linear (`lambda = 0`) distributions.
/// `near` is raised to [`Camera::MIN_NEAR`] so the logarithmic term stays finite.
#[must_use]
pub fn compute_cascade_splits(near: f32, far: f32, lambda: f32) -> [f32; SHADOW_CASCADE_COUNT + 1] {
    let near = near.max(Camera::MIN_NEAR);
    let far = far.max(near + Camera::MIN_NEAR);
    let lambda = lambda.clamp(0.0, 1.0);
    let count = SHADOW_CASCADE_COUNT as f32;

    let mut splits = [0.0f32; SHADOW_CASCADE_COUNT + 1];
    splits[0] = near;
    for (i, split) in splits.iter_mut().enumerate().skip(1) {
        let p = i as f32 / count;
        let log_split = near * (far / near).powf(p);
        let linear_split = near + (far - near) * p;
        *split = lambda * log_split + (1.0 - lambda) * linear_split;
    }
    splits[SHADOW_CASCADE_COUNT] = far;
    splits
}

// ============================================================================
// Frustum Corners in World Space
// ============================================================================

/// The 8 corners of the camera frustum slice `[slice_near, slice_far]` in world space.
///
/// Near face first, counter-clockwise from bottom-left.
#[must_use]
pub fn compute_frustum_corners_world(camera: &Camera, slice_near: f32, slice_far: f32) -> [Vec3; 8] {
    let tan_half_fov = (camera.fov_y * 0.5).tan();
    let h_near = tan_half_fov * slice_near;
    let w_near = h_near * camera.aspect;
    let h_far = tan_half_fov * slice_far;
    let w_far = h_far * camera.aspect;

    // View space, RH: -Z is forward
    let corners_view = [
        Vec3::new(-w_near, -h_near, -slice_near),
        Vec3::new(w_near, -h_near, -slice_near),
        Vec3::new(w_near, h_near, -slice_near),
        Vec3::new(-w_near, h_near, -slice_near),
        Vec3::new(-w_far, -h_far, -slice_far),
        Vec3::new(w_far, -h_far, -slice_far),
        Vec3::new(w_far, h_far, -slice_far),
        Vec3::new(-w_far, h_far, -slice_far),
    ];

    let inv_view = camera.view.inverse();
    corners_view.map(|c| inv_view.transform_point3(c))
}

/// Centroid of the corners and the max distance to it, rounded up to 1/16.
#[must_use]
pub fn bounding_sphere(corners: &[Vec3; 8]) -> (Vec3, f32) {
    let center = corners.iter().copied().sum::<Vec3>() / 8.0;
    let radius = corners
        .iter()
        .map(|c| c.distance(center))
        .fold(0.0f32, f32::max);
    let radius = (radius * RADIUS_GRANULARITY).ceil() / RADIUS_GRANULARITY;
    (center, radius)
}

/// Light view looking along `direction` at `center`.
#[must_use]
pub fn light_view(center: Vec3, direction: Vec3) -> Mat4 {
    let dir = direction.try_normalize().unwrap_or(Vec3::NEG_Z);
    let up = if dir.dot(Vec3::Y).abs() > 0.999 {
        Vec3::X
    } else {
        Vec3::Y
    };
    Mat4::look_at_rh(center - dir, center, up)
}

// ============================================================================
// Texel Snapping
// ============================================================================

/// Offset (in NDC) that moves the projected world origin onto a texel center grid.
#[must_use]
pub fn texel_snap_offset(proj: &Mat4, view: &Mat4, shadow_map_size: u32) -> Vec2 {
    let half = shadow_map_size as f32 * 0.5;
    let origin = (*proj * *view) * Vec4::new(0.0, 0.0, 0.0, 1.0);
    let texel_origin = Vec2::new(origin.x, origin.y) * half;
    (texel_origin.round() - texel_origin) / half
}

/// Applies [`texel_snap_offset`] to the projection's translation.
#[must_use]
pub fn snap_to_texels(proj: Mat4, view: &Mat4, shadow_map_size: u32) -> Mat4 {
    let offset = texel_snap_offset(&proj, view, shadow_map_size);
    let mut snapped = proj;
    snapped.w_axis.x += offset.x;
    snapped.w_axis.y += offset.y;
    snapped
}

// ============================================================================
// Cascades
// ============================================================================

/// View and snapped orthographic projection for one frustum slice.
#[must_use]
pub fn build_cascade(
    camera: &Camera,
    light_direction: Vec3,
    slice_near: f32,
    slice_far: f32,
    shadow_map_size: u32,
) -> (Mat4, Mat4) {
    let corners = compute_frustum_corners_world(camera, slice_near, slice_far);
    let (center, radius) = bounding_sphere(&corners);
    let view = light_view(center, light_direction);
    let proj = Mat4::orthographic_rh(-radius, radius, -radius, radius, -radius, radius);
    (view, snap_to_texels(proj, &view, shadow_map_size))
}

/// All cascades for `camera`. `srv_index` is left invalid for the caller to fill.
#[must_use]
pub fn compute_cascades(
    camera: &Camera,
    light_direction: Vec3,
    lambda: f32,
    shadow_map_size: u32,
) -> [Cascade; SHADOW_CASCADE_COUNT] {
    let splits = compute_cascade_splits(camera.near, camera.far, lambda);
    std::array::from_fn(|i| {
        let (view, proj) = build_cascade(
            camera,
            light_direction,
            splits[i],
            splits[i + 1],
            shadow_map_size,
        );
        Cascade {
            split: splits[i + 1],
            view,
            proj,
            ..Cascade::default()
        }
    })
}

// ============================================================================
// Spot Light
// ============================================================================

/// View and perspective projection of a spot light shadow.
#[must_use]
pub fn build_spot_matrices(position: Vec3, direction: Vec3, outer_cone: f32, range: f32) -> (Mat4, Mat4) {
    let dir = direction.try_normalize().unwrap_or(Vec3::NEG_Z);
    let up = if dir.dot(Vec3::Y).abs() > 0.999 {
        Vec3::X
    } else {
        Vec3::Y
    };
    let view = Mat4::look_at_rh(position, position + dir, up);
    let fov = (outer_cone * 2.0).clamp(0.1, std::f32::consts::PI - 0.01);
    let proj = Mat4::perspective_rh(fov, 1.0, 0.1, range.max(1.0));
    (view, proj)
}
