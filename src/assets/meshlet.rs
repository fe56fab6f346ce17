//! Meshlet Builder
//!
//! Splits an indexed triangle mesh into small clusters ("meshlets") sized for
//! mesh-shader dispatch and cluster culling.
//!
//! # Output Layout
//!
//! ```text
//! meshlets[i]            -> { vertex_offset, triangle_offset, vertex_count, triangle_count }
//! meshlet_vertices[..]   -> global vertex index (u32), vertex_count entries per meshlet
//! meshlet_triangles[..]  -> local vertex index (u8), 3 per triangle, padded to 4 bytes
//! bounds[i]              -> bounding sphere + normal cone
//! ```
//!
//! # Algorithm
//!
//! Clustering, per-meshlet vertex-cache ordering and culling bounds come from
//! meshoptimizer (`meshopt::build_meshlets`, which also runs
//! `meshopt_optimizeMeshlet` on every cluster, and
//! `meshopt::compute_meshlet_bounds`). This module validates the input, trims
//! the output and converts it into the GPU records below.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use crate::errors::{EmberError, Result};

pub const MAX_MESHLET_VERTICES: usize = 64;
pub const MAX_MESHLET_TRIANGLES: usize = 124;

/// Clusters purely by locality; cones are still computed for culling.
const CONE_WEIGHT: f32 = 0.0;

// ============================================================================
// GPU Records
// ============================================================================

/// Interleaved vertex as consumed by the meshlet shaders.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    pub tangent: Vec3,
    pub bitangent: Vec3,
}

impl Vertex {
    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            normal: Vec3::Y,
            ..Self::default()
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Meshlet {
    pub vertex_offset: u32,
    pub triangle_offset: u32,
    pub vertex_count: u32,
    pub triangle_count: u32,
}

impl Meshlet {
    /// Length of this meshlet's run in `meshlet_triangles`, including padding.
    #[inline]
    #[must_use]
    pub fn padded_triangle_bytes(&self) -> u32 {
        (self.triangle_count * 3 + 3) & !3
    }
}

/// Culling data for one meshlet.
///
/// A degenerate cone has `cone_axis == 0` and `cone_cutoff == 1` and must
/// never be backface-culled.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct MeshletBounds {
    pub center: Vec3,
    pub radius: f32,
    pub cone_apex: Vec3,
    pub cone_cutoff: f32,
    pub cone_axis: Vec3,
    _pad: f32,
}

impl MeshletBounds {
    #[must_use]
    pub fn is_cone_degenerate(&self) -> bool {
        self.cone_axis == Vec3::ZERO
    }
}

// ============================================================================
// Limits & Output
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MeshletLimits {
    pub max_vertices: usize,
    pub max_triangles: usize,
}

impl Default for MeshletLimits {
    fn default() -> Self {
        Self {
            max_vertices: MAX_MESHLET_VERTICES,
            max_triangles: MAX_MESHLET_TRIANGLES,
        }
    }
}

impl MeshletLimits {
    /// Local indices are stored as `u8`, so at most 255 vertices fit. Triangle
    /// runs are 4-byte aligned, so the triangle limit must be a multiple of 4.
    pub fn validate(&self) -> Result<()> {
        if !(3..=255).contains(&self.max_vertices) {
            return Err(EmberError::InvalidSettings(format!(
                "meshlet max_vertices must be in 3..=255, got {}",
                self.max_vertices
            )));
        }
        if !(4..=512).contains(&self.max_triangles) || self.max_triangles % 4 != 0 {
            return Err(EmberError::InvalidSettings(format!(
                "meshlet max_triangles must be a multiple of 4 in 4..=512, got {}",
                self.max_triangles
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshletData {
    pub meshlets: Vec<Meshlet>,
    pub meshlet_vertices: Vec<u32>,
    pub meshlet_triangles: Vec<u8>,
    pub bounds: Vec<MeshletBounds>,
}

impl MeshletData {
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.meshlets.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.meshlets.is_empty()
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.meshlets.iter().map(|m| m.triangle_count as usize).sum()
    }

    /// Local triangle indices of meshlet `index` (without padding).
    #[must_use]
    pub fn triangles(&self, index: usize) -> &[u8] {
        let m = &self.meshlets[index];
        let start = m.triangle_offset as usize;
        &self.meshlet_triangles[start..start + m.triangle_count as usize * 3]
    }

    /// Global vertex indices of meshlet `index`.
    #[must_use]
    pub fn vertices(&self, index: usize) -> &[u32] {
        let m = &self.meshlets[index];
        let start = m.vertex_offset as usize;
        &self.meshlet_vertices[start..start + m.vertex_count as usize]
    }

    /// Triangle bytes widened to `u32`, the layout the GPU reads.
    #[must_use]
    pub fn triangles_u32(&self) -> Vec<u32> {
        self.meshlet_triangles.iter().map(|&b| u32::from(b)).collect()
    }

    /// Cuts both auxiliary arrays at the last meshlet's end.
    fn trim(&mut self) {
        match self.meshlets.last() {
            Some(last) => {
                self.meshlet_vertices
                    .truncate((last.vertex_offset + last.vertex_count) as usize);
                self.meshlet_triangles
                    .truncate((last.triangle_offset + last.padded_triangle_bytes()) as usize);
            }
            None => {
                self.meshlet_vertices.clear();
                self.meshlet_triangles.clear();
            }
        }
        self.meshlet_vertices.shrink_to_fit();
        self.meshlet_triangles.shrink_to_fit();
        self.meshlets.shrink_to_fit();
        self.bounds.shrink_to_fit();
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builds meshlets for one primitive.
///
/// Zero triangles or zero vertices produce empty output. A trailing partial
/// triangle is ignored with a warning. Indices past the vertex array are an
/// error.
pub fn build_meshlets(
    vertices: &[Vertex],
    indices: &[u32],
    limits: &MeshletLimits,
) -> Result<MeshletData> {
    limits.validate()?;

    if indices.len() % 3 != 0 {
        log::warn!(
            "Index count {} is not a multiple of 3; ignoring {} trailing indices",
            indices.len(),
            indices.len() % 3
        );
    }
    let triangle_count = indices.len() / 3;
    if triangle_count == 0 || vertices.is_empty() {
        return Ok(MeshletData::default());
    }
    let indices = &indices[..triangle_count * 3];

    if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
        return Err(EmberError::InvalidMesh(format!(
            "index {bad} out of range for {} vertices",
            vertices.len()
        )));
    }

    let adapter = meshopt::VertexDataAdapter::new(
        bytemuck::cast_slice(vertices),
        std::mem::size_of::<Vertex>(),
        std::mem::offset_of!(Vertex, position),
    )
    .map_err(|e| EmberError::InvalidMesh(format!("vertex layout rejected: {e}")))?;

    let clusters = meshopt::build_meshlets(
        indices,
        &adapter,
        limits.max_vertices,
        limits.max_triangles,
        CONE_WEIGHT,
    );

    let mut data = MeshletData {
        meshlets: clusters
            .meshlets
            .iter()
            .map(|m| Meshlet {
                vertex_offset: m.vertex_offset,
                triangle_offset: m.triangle_offset,
                vertex_count: m.vertex_count,
                triangle_count: m.triangle_count,
            })
            .collect(),
        bounds: clusters
            .iter()
            .map(|m| MeshletBounds::from(meshopt::compute_meshlet_bounds(m, &adapter)))
            .collect(),
        meshlet_vertices: clusters.vertices,
        meshlet_triangles: clusters.triangles,
    };
    data.trim();

    log::debug!(
        "Built {} meshlets from {} triangles ({} meshlet vertices)",
        data.len(),
        triangle_count,
        data.meshlet_vertices.len()
    );
    Ok(data)
}

impl From<meshopt::Bounds> for MeshletBounds {
    /// A degenerate cone keeps its apex on the sphere center.
    fn from(b: meshopt::Bounds) -> Self {
        let center = Vec3::from_array(b.center);
        let cone_axis = Vec3::from_array(b.cone_axis);
        let cone_apex = if cone_axis == Vec3::ZERO {
            center
        } else {
            Vec3::from_array(b.cone_apex)
        };
        Self {
            center,
            radius: b.radius,
            cone_apex,
            cone_cutoff: b.cone_cutoff,
            cone_axis,
            _pad: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_bounds_keep_apex_on_center() {
        let raw = meshopt::Bounds {
            center: [1.0, 2.0, 3.0],
            radius: 0.5,
            cone_apex: [0.0; 3],
            cone_axis: [0.0; 3],
            cone_cutoff: 1.0,
            cone_axis_s8: [0; 3],
            cone_cutoff_s8: 127,
        };
        let bounds = MeshletBounds::from(raw);
        assert!(bounds.is_cone_degenerate());
        assert_eq!(bounds.cone_apex, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(bounds.cone_cutoff, 1.0);
    }

    #[test]
    fn padding_rounds_to_four_bytes() {
        let m = Meshlet {
            triangle_count: 1,
            ..Meshlet::default()
        };
        assert_eq!(m.padded_triangle_bytes(), 4);
        let m = Meshlet {
            triangle_count: 4,
            ..Meshlet::default()
        };
        assert_eq!(m.padded_triangle_bytes(), 12);
    }
}
