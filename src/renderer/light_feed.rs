//! Scene/Light Data Feed
//!
//! Rebuilds flat light arrays from the scene every frame and writes them into
//! ring buffers the lighting shaders read. Each snapshot carries the
//! world-derived values (position, forward direction, shadow matrix) the GPU
//! cannot compute itself.
//!
//! # Ring Buffers
//!
//! | Name | Contents |
//! |------|----------|
//! | `LightBuffer` | [`LightData`] header: SRV + count of each array |
//! | `DirLightBuffer` | `[DirLightData; MAX_DIRECTIONAL_LIGHTS]` |
//! | `PointLightBuffer` | `[PointLightData; MAX_POINT_LIGHTS]` |
//! | `SpotLightBuffer` | `[SpotLightData; MAX_SPOT_LIGHTS]` |

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use super::registry::ResourceRegistry;
use super::shadow_utils::build_spot_matrices;
use crate::rhi::{DescriptorIndex, Rhi, ViewType};
use crate::scene::{DirectionalLight, PointLight, Scene, SpotLight, Transform};
use crate::utils::math::quat_to_forward;

pub const MAX_DIRECTIONAL_LIGHTS: usize = 512;
pub const MAX_POINT_LIGHTS: usize = 1024;
pub const MAX_SPOT_LIGHTS: usize = 100;

pub const LIGHT_BUFFER: &str = "LightBuffer";
pub const DIR_LIGHT_BUFFER: &str = "DirLightBuffer";
pub const POINT_LIGHT_BUFFER: &str = "PointLightBuffer";
pub const SPOT_LIGHT_BUFFER: &str = "SpotLightBuffer";

const LIGHT_BUFFER_SIZE: u64 = 256;

// ============================================================================
// GPU Records
// ============================================================================

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct LightData {
    pub dir_srv: DescriptorIndex,
    pub dir_count: u32,
    pub point_srv: DescriptorIndex,
    pub point_count: u32,
    pub spot_srv: DescriptorIndex,
    pub spot_count: u32,
    _pad: [u32; 2],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct DirLightData {
    pub direction: Vec3,
    pub intensity: f32,
    pub color: Vec3,
    pub cast_shadows: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct PointLightData {
    pub position: Vec3,
    pub range: f32,
    pub color: Vec3,
    pub intensity: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct SpotLightData {
    pub position: Vec3,
    pub range: f32,
    pub direction: Vec3,
    pub intensity: f32,
    pub color: Vec3,
    pub inner_cone: f32,
    pub outer_cone: f32,
    /// SRV of the shadow map or -1.
    pub shadow_srv: DescriptorIndex,
    _pad: [u32; 2],
    /// Projection * view of the shadow map.
    pub shadow_view_proj: Mat4,
}

// ============================================================================
// Feed
// ============================================================================

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LightCounts {
    pub directional: usize,
    pub point: usize,
    pub spot: usize,
}

#[derive(Debug, Default)]
pub struct LightFeed {
    directional: Vec<DirLightData>,
    point: Vec<PointLightData>,
    spot: Vec<SpotLightData>,
}

fn array_size<T>(capacity: usize) -> u64 {
    (std::mem::size_of::<T>() * capacity) as u64
}

impl LightFeed {
    /// Registers the four light ring buffers.
    pub fn new(registry: &mut ResourceRegistry, rhi: &mut dyn Rhi) -> Self {
        registry.create_shared_ring_buffer(
            rhi,
            LIGHT_BUFFER,
            LIGHT_BUFFER_SIZE,
            std::mem::size_of::<LightData>() as u32,
        );
        registry.create_shared_ring_buffer(
            rhi,
            DIR_LIGHT_BUFFER,
            array_size::<DirLightData>(MAX_DIRECTIONAL_LIGHTS),
            std::mem::size_of::<DirLightData>() as u32,
        );
        registry.create_shared_ring_buffer(
            rhi,
            POINT_LIGHT_BUFFER,
            array_size::<PointLightData>(MAX_POINT_LIGHTS),
            std::mem::size_of::<PointLightData>() as u32,
        );
        registry.create_shared_ring_buffer(
            rhi,
            SPOT_LIGHT_BUFFER,
            array_size::<SpotLightData>(MAX_SPOT_LIGHTS),
            std::mem::size_of::<SpotLightData>() as u32,
        );

        Self {
            directional: Vec::with_capacity(MAX_DIRECTIONAL_LIGHTS),
            point: Vec::with_capacity(MAX_POINT_LIGHTS),
            spot: Vec::with_capacity(MAX_SPOT_LIGHTS),
        }
    }

    #[must_use]
    pub fn counts(&self) -> LightCounts {
        LightCounts {
            directional: self.directional.len(),
            point: self.point.len(),
            spot: self.spot.len(),
        }
    }

    #[must_use]
    pub fn spot_lights(&self) -> &[SpotLightData] {
        &self.spot
    }

    /// Snapshots the scene's lights into the ring slot of `frame_index`.
    pub fn update(
        &mut self,
        frame_index: usize,
        scene: &Scene,
        registry: &ResourceRegistry,
        rhi: &mut dyn Rhi,
    ) {
        self.gather(scene);

        let header = LightData {
            dir_srv: registry.descriptor(DIR_LIGHT_BUFFER, ViewType::ShaderResource, frame_index),
            dir_count: self.directional.len() as u32,
            point_srv: registry.descriptor(POINT_LIGHT_BUFFER, ViewType::ShaderResource, frame_index),
            point_count: self.point.len() as u32,
            spot_srv: registry.descriptor(SPOT_LIGHT_BUFFER, ViewType::ShaderResource, frame_index),
            spot_count: self.spot.len() as u32,
            _pad: [0; 2],
        };

        let write = |rhi: &mut dyn Rhi, name: &str, bytes: &[u8]| {
            if bytes.is_empty() {
                return;
            }
            if let Some(ring) = registry.ring_buffer(name) {
                ring.write(rhi, frame_index, 0, bytes);
            }
        };
        write(rhi, DIR_LIGHT_BUFFER, bytemuck::cast_slice(&self.directional));
        write(rhi, POINT_LIGHT_BUFFER, bytemuck::cast_slice(&self.point));
        write(rhi, SPOT_LIGHT_BUFFER, bytemuck::cast_slice(&self.spot));
        write(rhi, LIGHT_BUFFER, bytemuck::bytes_of(&header));
    }

    fn gather(&mut self, scene: &Scene) {
        self.directional.clear();
        self.point.clear();
        self.spot.clear();
        let world = scene.world();

        for (entity, (_, light)) in world.query::<(Transform, DirectionalLight)>() {
            if self.directional.len() == MAX_DIRECTIONAL_LIGHTS {
                log::warn!("More than {MAX_DIRECTIONAL_LIGHTS} directional lights; extra lights ignored");
                break;
            }
            let (_, rotation, _) = scene.world_transform(entity).to_scale_rotation_translation();
            self.directional.push(DirLightData {
                direction: quat_to_forward(rotation),
                intensity: light.intensity,
                color: light.color,
                cast_shadows: u32::from(light.cast_shadows),
            });
        }

        for (entity, (_, light)) in world.query::<(Transform, PointLight)>() {
            if self.point.len() == MAX_POINT_LIGHTS {
                log::warn!("More than {MAX_POINT_LIGHTS} point lights; extra lights ignored");
                break;
            }
            self.point.push(PointLightData {
                position: scene.world_transform(entity).w_axis.truncate(),
                range: light.range,
                color: light.color,
                intensity: light.intensity,
            });
        }

        for (entity, (_, light)) in world.query::<(Transform, SpotLight)>() {
            if self.spot.len() == MAX_SPOT_LIGHTS {
                log::warn!("More than {MAX_SPOT_LIGHTS} spot lights; extra lights ignored");
                break;
            }
            let (_, rotation, position) = scene.world_transform(entity).to_scale_rotation_translation();
            let direction = quat_to_forward(rotation);
            let (view, proj) = build_spot_matrices(position, direction, light.outer_cone, light.range);
            self.spot.push(SpotLightData {
                position,
                range: light.range,
                direction,
                intensity: light.intensity,
                color: light.color,
                inner_cone: light.inner_cone,
                outer_cone: light.outer_cone,
                shadow_srv: if light.cast_shadows {
                    light.shadow_index
                } else {
                    crate::rhi::INVALID_DESCRIPTOR
                },
                _pad: [0; 2],
                shadow_view_proj: proj * view,
            });
        }
    }
}
