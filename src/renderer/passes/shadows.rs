//! Shadow Pass
//!
//! Renders depth for the first shadow-casting directional light into four
//! cascades and for every shadow-casting spot light into its own map.
//!
//! # Cascades
//!
//! Each cascade covers one slice of the main camera frustum (see
//! [`compute_cascades`]). The records are written to `CascadeBuffer` every
//! frame; with `shadows.freeze` set, the last computed cascades are reused so
//! the camera can fly out and inspect them.
//!
//! # Spot Shadow Lifecycle
//!
//! ```text
//! not caster ──enable──► allocated (shadow_index = SRV) ──disable──► freed (-1)
//! ```
//!
//! Allocation happens in `sync`. Freeing also happens in `sync`, but only on
//! frames where [`RenderPass::requires_gpu_idle`] reported it, so the
//! renderer has waited for the GPU first. Entities that leave the scene are
//! freed the same way.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;

use super::{
    CASCADE_BUFFER, DEPTH_FORMAT, MESHLETS_PER_TASK, SHADOW_CASCADES, SHADOW_SAMPLER, create_target,
    shaders,
};
use crate::assets::PrimitiveGpuData;
use crate::errors::Result;
use crate::renderer::draw_list::{DrawItem, collect_draws};
use crate::renderer::pass::{PassContext, RenderContext, RenderPass, SyncContext};
use crate::renderer::shadow_utils::{
    Cascade, SHADOW_CASCADE_COUNT, build_spot_matrices, compute_cascades,
};
use crate::rhi::{
    CommandBuffer, DescriptorIndex, INVALID_DESCRIPTOR, PipelineDesc, PipelineId, ResourceLayout,
    Rhi, SamplerDesc, TextureDesc, TextureId, ViewDesc, ViewType,
};
use crate::scene::{DirectionalLight, Entity, Scene, SpotLight, Transform};
use crate::utils::math::{Frustum, quat_to_forward};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ShadowConstants {
    world: Mat4,
    view_proj: Mat4,
    primitive: PrimitiveGpuData,
}

/// A depth map owned by one spot light.
#[derive(Debug, Clone, Copy)]
struct SpotShadow {
    texture: TextureId,
    srv: DescriptorIndex,
    dsv: DescriptorIndex,
}

/// A depth target plus the matrix it is rendered with.
struct DepthJob {
    texture: TextureId,
    dsv: DescriptorIndex,
    size: u32,
    view_proj: Mat4,
    /// Casters outside this volume are skipped.
    cull: Frustum,
}

pub struct ShadowPass {
    pipeline: PipelineId,
    cascade_textures: [TextureId; SHADOW_CASCADE_COUNT],
    cascade_dsvs: [DescriptorIndex; SHADOW_CASCADE_COUNT],
    cascade_srvs: [DescriptorIndex; SHADOW_CASCADE_COUNT],
    cascades: [Cascade; SHADOW_CASCADE_COUNT],
    cascades_valid: bool,
    spot_shadows: FxHashMap<Entity, SpotShadow>,
}

impl ShadowPass {
    pub fn new(ctx: &mut PassContext) -> Result<Self> {
        let size = ctx.settings.dir_shadow_dimension;

        let mut cascade_textures = [TextureId::default(); SHADOW_CASCADE_COUNT];
        let mut cascade_dsvs = [INVALID_DESCRIPTOR; SHADOW_CASCADE_COUNT];
        let mut cascade_srvs = [INVALID_DESCRIPTOR; SHADOW_CASCADE_COUNT];
        for (i, name) in SHADOW_CASCADES.iter().enumerate() {
            cascade_textures[i] = create_target(
                ctx,
                name,
                size,
                size,
                DEPTH_FORMAT,
                &[ViewType::DepthTarget, ViewType::ShaderResource],
            );
            let texture = ctx.registry.require_texture(name);
            cascade_dsvs[i] = texture.descriptor(ViewType::DepthTarget);
            cascade_srvs[i] = texture.descriptor(ViewType::ShaderResource);
        }

        let stride = std::mem::size_of::<Cascade>();
        ctx.registry.create_shared_ring_buffer(
            ctx.rhi,
            CASCADE_BUFFER,
            (stride * SHADOW_CASCADE_COUNT) as u64,
            stride as u32,
        );
        ctx.registry.create_shared_sampler(
            ctx.rhi,
            SHADOW_SAMPLER,
            &SamplerDesc::comparison(SHADOW_SAMPLER, wgpu::CompareFunction::LessEqual),
        );

        let shaders = vec![
            ctx.load_shader(shaders::SHADOW_AS)?,
            ctx.load_shader(shaders::SHADOW_MS)?,
        ];
        let pipeline = ctx.rhi.create_pipeline(
            &PipelineDesc::mesh("Shadow Depth", shaders)
                .with_depth(DEPTH_FORMAT)
                .with_depth_clamp()
                .with_push_constants::<ShadowConstants>(),
        );

        Ok(Self {
            pipeline,
            cascade_textures,
            cascade_dsvs,
            cascade_srvs,
            cascades: [Cascade::default(); SHADOW_CASCADE_COUNT],
            cascades_valid: false,
            spot_shadows: FxHashMap::default(),
        })
    }

    /// Cascades used by the most recent frame.
    #[must_use]
    pub fn cascades(&self) -> &[Cascade; SHADOW_CASCADE_COUNT] {
        &self.cascades
    }

    /// Number of spot lights that currently own a shadow map.
    #[must_use]
    pub fn spot_shadow_count(&self) -> usize {
        self.spot_shadows.len()
    }

    fn is_stale(scene: &Scene, entity: Entity) -> bool {
        scene
            .world()
            .get::<SpotLight>(entity)
            .is_none_or(|light| !light.cast_shadows)
    }

    fn allocate_spot_shadow(rhi: &mut dyn Rhi, size: u32) -> SpotShadow {
        let texture = rhi.create_texture(&TextureDesc::new_2d(
            "SpotShadow",
            size,
            size,
            DEPTH_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        ));
        let dsv = rhi
            .create_texture_view(texture, &ViewDesc::new(ViewType::DepthTarget))
            .descriptor;
        let srv = rhi
            .create_texture_view(texture, &ViewDesc::new(ViewType::ShaderResource))
            .descriptor;
        SpotShadow { texture, srv, dsv }
    }

    fn first_directional_caster(scene: &Scene) -> Option<Vec3> {
        scene
            .world()
            .query::<(Transform, DirectionalLight)>()
            .find(|(_, (_, light))| light.cast_shadows)
            .map(|(entity, _)| {
                let (_, rotation, _) = scene.world_transform(entity).to_scale_rotation_translation();
                quat_to_forward(rotation)
            })
    }

    fn render_depth(&self, commands: &mut CommandBuffer, job: &DepthJob, draws: &[DrawItem]) {
        commands.barrier(job.texture, ResourceLayout::DepthWrite);
        commands.set_viewport(job.size, job.size);
        commands.set_render_targets(&[], Some(job.dsv));
        commands.clear_depth(job.dsv, 1.0);
        commands.set_pipeline(self.pipeline);
        for draw in draws {
            commands.push_constants(&ShadowConstants {
                world: draw.world,
                view_proj: job.view_proj,
                primitive: draw.primitive.gpu_data(),
            });
            commands.dispatch_mesh(draw.primitive.meshlet_count.div_ceil(MESHLETS_PER_TASK), 1, 1);
        }
        commands.barrier(job.texture, ResourceLayout::Common);
    }
}

impl RenderPass for ShadowPass {
    fn name(&self) -> &'static str {
        "Shadows"
    }

    fn requires_gpu_idle(&self, scene: &Scene) -> bool {
        self.spot_shadows
            .keys()
            .any(|&entity| Self::is_stale(scene, entity))
    }

    fn sync(&mut self, ctx: &mut SyncContext) {
        let stale: Vec<Entity> = self
            .spot_shadows
            .keys()
            .copied()
            .filter(|&entity| Self::is_stale(ctx.scene, entity))
            .collect();
        for entity in stale {
            if let Some(shadow) = self.spot_shadows.remove(&entity) {
                ctx.rhi.destroy_texture(shadow.texture);
                log::debug!("Freed spot shadow map of {entity:?}");
            }
            if let Some(light) = ctx.scene.world_mut().get_mut::<SpotLight>(entity) {
                light.shadow_index = INVALID_DESCRIPTOR;
                light.shadow_map = None;
            }
        }

        let enabled: Vec<Entity> = ctx
            .scene
            .world()
            .view::<SpotLight>()
            .filter(|(entity, light)| light.cast_shadows && !self.spot_shadows.contains_key(entity))
            .map(|(entity, _)| entity)
            .collect();
        for entity in enabled {
            let shadow = Self::allocate_spot_shadow(ctx.rhi, ctx.settings.spot_shadow_dimension);
            if let Some(light) = ctx.scene.world_mut().get_mut::<SpotLight>(entity) {
                light.shadow_index = shadow.srv;
                light.shadow_map = Some(shadow.texture);
            }
            self.spot_shadows.insert(entity, shadow);
            log::debug!("Allocated spot shadow map for {entity:?}");
        }
    }

    fn render(&mut self, ctx: &mut RenderContext) {
        let Some(view) = ctx.active_view() else {
            return;
        };
        let direction = Self::first_directional_caster(ctx.scene);
        if direction.is_none() && self.spot_shadows.is_empty() {
            return;
        }

        let mut jobs = Vec::new();

        if let Some(direction) = direction {
            let size = ctx.settings.dir_shadow_dimension;
            if !(view.volume.shadows.freeze && self.cascades_valid) {
                self.cascades = compute_cascades(view.camera, direction, view.volume.shadows.lambda, size);
                for (cascade, &srv) in self.cascades.iter_mut().zip(&self.cascade_srvs) {
                    cascade.srv_index = srv;
                }
                self.cascades_valid = true;
            }
            if let Some(ring) = ctx.registry.ring_buffer(CASCADE_BUFFER) {
                ring.write(
                    ctx.rhi,
                    ctx.frame.frame_index,
                    0,
                    bytemuck::cast_slice(&self.cascades),
                );
            }
            // Occluders between the light and a cascade sit in front of its
            // near plane; depth clamp flattens them onto it.
            for (i, cascade) in self.cascades.iter().enumerate() {
                let view_proj = cascade.view_projection();
                jobs.push(DepthJob {
                    texture: self.cascade_textures[i],
                    dsv: self.cascade_dsvs[i],
                    size,
                    view_proj,
                    cull: Frustum::from_matrix(view_proj).without_near(),
                });
            }
        }

        for (entity, (_, light)) in ctx.scene.world().query::<(Transform, SpotLight)>() {
            let Some(shadow) = self.spot_shadows.get(&entity) else {
                continue;
            };
            let (_, rotation, position) = ctx.scene.world_transform(entity).to_scale_rotation_translation();
            let (light_view, proj) =
                build_spot_matrices(position, quat_to_forward(rotation), light.outer_cone, light.range);
            let view_proj = proj * light_view;
            jobs.push(DepthJob {
                texture: shadow.texture,
                dsv: shadow.dsv,
                size: ctx.settings.spot_shadow_dimension,
                view_proj,
                cull: Frustum::from_matrix(view_proj),
            });
        }

        let commands = &mut ctx.frame.commands;
        commands.begin_marker(self.name());
        for job in &jobs {
            let draws = collect_draws(ctx.scene, Some(&job.cull));
            self.render_depth(commands, job, &draws);
        }
        commands.end_marker();
    }

    fn release(&mut self, rhi: &mut dyn Rhi) {
        rhi.destroy_pipeline(self.pipeline);
        for (_, shadow) in self.spot_shadows.drain() {
            rhi.destroy_texture(shadow.texture);
        }
    }
}
