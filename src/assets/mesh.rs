//! Mesh Assets
//!
//! A [`Mesh`] is a tree of [`MeshNode`]s. Each node exclusively owns its
//! children and zero or more [`MeshPrimitive`]s; each primitive owns the six
//! GPU buffers the meshlet pipeline reads.
//!
//! Meshes are created once at load time and torn down explicitly with
//! [`Mesh::release`] after the GPU is idle.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

use super::meshlet::{MeshletLimits, Vertex, build_meshlets};
use super::server::{Asset, AssetServer};
use super::texture::Texture;
use crate::errors::Result;
use crate::rhi::{
    BufferDesc, BufferId, DescriptorIndex, INVALID_DESCRIPTOR, Rhi, Uploader, ViewType,
};
use crate::utils::math::Aabb;

// ============================================================================
// GPU Buffer
// ============================================================================

/// A static structured buffer with one SRV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuBuffer {
    pub buffer: BufferId,
    pub srv: DescriptorIndex,
    pub size: u64,
}

impl GpuBuffer {
    /// Creates a buffer sized to `data` and enqueues the upload.
    ///
    /// Empty slices create nothing.
    pub fn upload<T: Pod>(
        rhi: &mut dyn Rhi,
        uploader: &mut Uploader,
        label: &str,
        data: &[T],
    ) -> Option<Self> {
        if data.is_empty() {
            return None;
        }
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let buffer = rhi.create_buffer(&BufferDesc::new(
            label,
            bytes.len() as u64,
            std::mem::size_of::<T>() as u32,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        ));
        let srv = rhi.create_buffer_view(buffer, ViewType::ShaderResource);
        uploader.enqueue_buffer(buffer, bytes);
        Some(Self {
            buffer,
            srv,
            size: bytes.len() as u64,
        })
    }

    #[inline]
    fn srv_of(buffer: Option<&Self>) -> DescriptorIndex {
        buffer.map_or(INVALID_DESCRIPTOR, |b| b.srv)
    }
}

// ============================================================================
// Primitive
// ============================================================================

/// Bindless indices a meshlet shader needs to fetch one primitive.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct PrimitiveGpuData {
    pub vertices: DescriptorIndex,
    pub meshlets: DescriptorIndex,
    pub meshlet_vertices: DescriptorIndex,
    pub meshlet_triangles: DescriptorIndex,
    pub meshlet_bounds: DescriptorIndex,
    pub meshlet_count: u32,
    pub material: i32,
    _pad: u32,
}

#[derive(Debug)]
pub struct MeshPrimitive {
    pub vertex_buffer: Option<GpuBuffer>,
    pub index_buffer: Option<GpuBuffer>,
    pub meshlet_buffer: Option<GpuBuffer>,
    pub meshlet_vertex_buffer: Option<GpuBuffer>,
    pub meshlet_triangle_buffer: Option<GpuBuffer>,
    pub meshlet_bounds_buffer: Option<GpuBuffer>,
    /// Index into [`Mesh::materials`].
    pub material_index: Option<usize>,
    pub vertex_count: u32,
    pub index_count: u32,
    pub meshlet_count: u32,
    pub aabb: Aabb,
}

impl MeshPrimitive {
    /// Builds meshlets for the geometry and enqueues all six buffer uploads.
    pub fn from_geometry(
        rhi: &mut dyn Rhi,
        uploader: &mut Uploader,
        label: &str,
        vertices: &[Vertex],
        indices: &[u32],
        material_index: Option<usize>,
        limits: &MeshletLimits,
    ) -> Result<Self> {
        let meshlets = build_meshlets(vertices, indices, limits)?;
        let triangles = meshlets.triangles_u32();

        Ok(Self {
            vertex_buffer: GpuBuffer::upload(rhi, uploader, &format!("{label}/Vertices"), vertices),
            index_buffer: GpuBuffer::upload(rhi, uploader, &format!("{label}/Indices"), indices),
            meshlet_buffer: GpuBuffer::upload(
                rhi,
                uploader,
                &format!("{label}/Meshlets"),
                &meshlets.meshlets,
            ),
            meshlet_vertex_buffer: GpuBuffer::upload(
                rhi,
                uploader,
                &format!("{label}/MeshletVertices"),
                &meshlets.meshlet_vertices,
            ),
            meshlet_triangle_buffer: GpuBuffer::upload(
                rhi,
                uploader,
                &format!("{label}/MeshletTriangles"),
                &triangles,
            ),
            meshlet_bounds_buffer: GpuBuffer::upload(
                rhi,
                uploader,
                &format!("{label}/MeshletBounds"),
                &meshlets.bounds,
            ),
            material_index,
            vertex_count: vertices.len() as u32,
            index_count: indices.len() as u32,
            meshlet_count: meshlets.len() as u32,
            aabb: Aabb::from_points(vertices.iter().map(|v| v.position)),
        })
    }

    /// Primitives without meshlets are skipped by every draw.
    #[inline]
    #[must_use]
    pub fn is_drawable(&self) -> bool {
        self.meshlet_count > 0
    }

    #[must_use]
    pub fn gpu_data(&self) -> PrimitiveGpuData {
        PrimitiveGpuData {
            vertices: GpuBuffer::srv_of(self.vertex_buffer.as_ref()),
            meshlets: GpuBuffer::srv_of(self.meshlet_buffer.as_ref()),
            meshlet_vertices: GpuBuffer::srv_of(self.meshlet_vertex_buffer.as_ref()),
            meshlet_triangles: GpuBuffer::srv_of(self.meshlet_triangle_buffer.as_ref()),
            meshlet_bounds: GpuBuffer::srv_of(self.meshlet_bounds_buffer.as_ref()),
            meshlet_count: self.meshlet_count,
            material: self.material_index.map_or(-1, |i| i as i32),
            _pad: 0,
        }
    }

    pub fn buffers(&self) -> impl Iterator<Item = &GpuBuffer> {
        [
            &self.vertex_buffer,
            &self.index_buffer,
            &self.meshlet_buffer,
            &self.meshlet_vertex_buffer,
            &self.meshlet_triangle_buffer,
            &self.meshlet_bounds_buffer,
        ]
        .into_iter()
        .flatten()
    }

    fn release(&self, rhi: &mut dyn Rhi) {
        for buffer in self.buffers() {
            rhi.destroy_buffer(buffer.buffer);
        }
    }
}

// ============================================================================
// Material
// ============================================================================

/// A texture reference held by a material. `path` is the asset server key.
#[derive(Debug, Clone)]
pub struct MaterialTexture {
    pub path: String,
    pub texture: Arc<Texture>,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct MaterialGpuData {
    pub base_color: Vec4,
    pub albedo: DescriptorIndex,
    pub normal: DescriptorIndex,
    pub metallic_roughness: DescriptorIndex,
    pub metallic: f32,
    pub roughness: f32,
    _pad: [f32; 3],
}

#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub base_color: Vec4,
    pub metallic: f32,
    pub roughness: f32,
    pub albedo: Option<MaterialTexture>,
    pub normal: Option<MaterialTexture>,
    pub metallic_roughness: Option<MaterialTexture>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_color: Vec4::ONE,
            metallic: 0.0,
            roughness: 1.0,
            albedo: None,
            normal: None,
            metallic_roughness: None,
        }
    }
}

impl Material {
    pub fn textures(&self) -> impl Iterator<Item = &MaterialTexture> {
        [&self.albedo, &self.normal, &self.metallic_roughness]
            .into_iter()
            .flatten()
    }

    #[must_use]
    pub fn gpu_data(&self) -> MaterialGpuData {
        let srv = |t: &Option<MaterialTexture>| t.as_ref().map_or(INVALID_DESCRIPTOR, |t| t.texture.srv);
        MaterialGpuData {
            base_color: self.base_color,
            albedo: srv(&self.albedo),
            normal: srv(&self.normal),
            metallic_roughness: srv(&self.metallic_roughness),
            metallic: self.metallic,
            roughness: self.roughness,
            _pad: [0.0; 3],
        }
    }
}

// ============================================================================
// Node & Mesh
// ============================================================================

#[derive(Debug, Default)]
pub struct MeshNode {
    pub name: String,
    /// Transform relative to the parent node.
    pub transform: Mat4,
    pub children: Vec<MeshNode>,
    pub primitives: Vec<MeshPrimitive>,
}

#[derive(Debug, Default)]
pub struct Mesh {
    /// Asset server key.
    pub path: String,
    pub root: MeshNode,
    pub materials: Vec<Material>,
}

impl Mesh {
    /// Pre-order walk over every node.
    pub fn nodes(&self) -> impl Iterator<Item = &MeshNode> {
        let mut stack = vec![&self.root];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }

    #[must_use]
    pub fn primitive_count(&self) -> usize {
        self.nodes().map(|n| n.primitives.len()).sum()
    }

    #[must_use]
    pub fn meshlet_count(&self) -> usize {
        self.nodes()
            .flat_map(|n| &n.primitives)
            .map(|p| p.meshlet_count as usize)
            .sum()
    }

    #[must_use]
    pub fn material(&self, primitive: &MeshPrimitive) -> Option<&Material> {
        self.materials.get(primitive.material_index?)
    }

    /// Frees every primitive buffer, then returns the material textures to
    /// `assets`, destroying those whose last reference this was.
    ///
    /// The GPU must be idle.
    pub fn release(&self, rhi: &mut dyn Rhi, assets: &mut AssetServer) {
        let mut freed = 0usize;
        for node in self.nodes() {
            for primitive in &node.primitives {
                primitive.release(rhi);
                freed += primitive.buffers().count();
            }
        }

        for material in &self.materials {
            for texture in material.textures() {
                if let Some(Asset::Texture(released)) = assets.give_back(&texture.path) {
                    released.destroy(rhi);
                }
            }
        }
        log::debug!("Released mesh '{}' ({freed} buffers)", self.path);
    }
}
