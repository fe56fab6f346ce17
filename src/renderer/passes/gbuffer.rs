//! Geometry Buffer Pass
//!
//! Rasterizes every visible meshlet into the G-Buffer through the
//! amplification → mesh → pixel pipeline.
//!
//! | Target | Format | Contents |
//! |--------|--------|----------|
//! | `GBufferDepth` | `Depth32Float` | hardware depth |
//! | `GBufferNormal` | `Rgba16Float` | world normal |
//! | `GBufferAlbedo` | `Rgba8Unorm` | base color |
//! | `GBufferPBR` | `Rgba8Unorm` | metallic, roughness |
//!
//! Also owns `CameraRingBuffer`, the per-frame [`CameraData`] every later
//! screen-space pass reads.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use super::{
    CAMERA_RING_BUFFER, DEPTH_FORMAT, GBUFFER_ALBEDO, GBUFFER_DEPTH, GBUFFER_NORMAL, GBUFFER_PBR,
    HDR_FORMAT, LDR_FORMAT, MATERIAL_SAMPLER, MESHLETS_PER_TASK, create_screen_target, shaders,
};
use crate::assets::{Material, MaterialGpuData, PrimitiveGpuData};
use crate::errors::Result;
use crate::renderer::draw_list::collect_draws;
use crate::renderer::pass::{PassContext, RenderContext, RenderPass};
use crate::rhi::{
    DescriptorIndex, PipelineDesc, PipelineId, ResourceLayout, Rhi, SamplerDesc, TextureId,
    ViewType,
};
use crate::scene::Camera;
use crate::utils::math::Frustum;

const CAMERA_RING_SIZE: u64 = 512;

/// Per-frame camera record in `CameraRingBuffer`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct CameraData {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub inverse_view_projection: Mat4,
    pub position: Vec3,
    pub near: f32,
    pub far: f32,
    pub width: f32,
    pub height: f32,
    _pad: f32,
}

impl CameraData {
    #[must_use]
    pub fn new(camera: &Camera, width: u32, height: u32) -> Self {
        let view_projection = camera.view_projection();
        Self {
            view: camera.view,
            projection: camera.projection,
            view_projection,
            inverse_view_projection: view_projection.inverse(),
            position: camera.position,
            near: camera.near,
            far: camera.far,
            width: width as f32,
            height: height as f32,
            _pad: 0.0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct GBufferConstants {
    world: Mat4,
    primitive: PrimitiveGpuData,
    material: MaterialGpuData,
    camera: DescriptorIndex,
    sampler: DescriptorIndex,
    visualize_meshlets: u32,
    _pad: u32,
}

struct Target {
    texture: TextureId,
    view: DescriptorIndex,
}

pub struct GBufferPass {
    pipeline: PipelineId,
    depth: Target,
    colors: [Target; 3],
}

impl GBufferPass {
    pub fn new(ctx: &mut PassContext) -> Result<Self> {
        let targets = [ViewType::RenderTarget, ViewType::ShaderResource];
        let color = |ctx: &mut PassContext, name: &str, format: wgpu::TextureFormat| {
            let texture = create_screen_target(ctx, name, format, &targets);
            Target {
                texture,
                view: ctx.registry.require_texture(name).descriptor(ViewType::RenderTarget),
            }
        };
        let colors = [
            color(ctx, GBUFFER_NORMAL, HDR_FORMAT),
            color(ctx, GBUFFER_ALBEDO, LDR_FORMAT),
            color(ctx, GBUFFER_PBR, LDR_FORMAT),
        ];

        let depth_texture = create_screen_target(
            ctx,
            GBUFFER_DEPTH,
            DEPTH_FORMAT,
            &[ViewType::DepthTarget, ViewType::ShaderResource],
        );
        let depth = Target {
            texture: depth_texture,
            view: ctx
                .registry
                .require_texture(GBUFFER_DEPTH)
                .descriptor(ViewType::DepthTarget),
        };

        ctx.registry.create_shared_ring_buffer(
            ctx.rhi,
            CAMERA_RING_BUFFER,
            CAMERA_RING_SIZE,
            std::mem::size_of::<CameraData>() as u32,
        );
        ctx.registry.create_shared_sampler(
            ctx.rhi,
            MATERIAL_SAMPLER,
            &SamplerDesc::linear(MATERIAL_SAMPLER, wgpu::AddressMode::Repeat),
        );

        let shaders = vec![
            ctx.load_shader(shaders::GBUFFER_AS)?,
            ctx.load_shader(shaders::GBUFFER_MS)?,
            ctx.load_shader(shaders::GBUFFER_PS)?,
        ];
        let pipeline = ctx.rhi.create_pipeline(
            &PipelineDesc::mesh("GBuffer", shaders)
                .with_color_targets(&[HDR_FORMAT, LDR_FORMAT, LDR_FORMAT])
                .with_depth(DEPTH_FORMAT)
                .with_push_constants::<GBufferConstants>(),
        );

        Ok(Self {
            pipeline,
            depth,
            colors,
        })
    }
}

impl RenderPass for GBufferPass {
    fn name(&self) -> &'static str {
        "GBuffer"
    }

    fn render(&mut self, ctx: &mut RenderContext) {
        let Some(view) = ctx.active_view() else {
            return;
        };
        let frame_index = ctx.frame.frame_index;
        let (width, height) = (ctx.frame.width, ctx.frame.height);

        let camera_ring = ctx.registry.require_ring_buffer(CAMERA_RING_BUFFER);
        let camera_data = CameraData::new(view.camera, width, height);
        camera_ring.write(ctx.rhi, frame_index, 0, bytemuck::bytes_of(&camera_data));
        let camera_cbv = camera_ring.slot(frame_index).cbv;
        let sampler = ctx
            .registry
            .descriptor(MATERIAL_SAMPLER, ViewType::ShaderResource, frame_index);

        let frustum = Frustum::from_matrix(view.camera.view_projection());
        let draws = collect_draws(ctx.scene, Some(&frustum));
        let visualize_meshlets = u32::from(view.volume.geometry.visualize_meshlets);
        let fallback_material = Material::default().gpu_data();

        let commands = &mut ctx.frame.commands;
        commands.begin_marker(self.name());

        for target in &self.colors {
            commands.barrier(target.texture, ResourceLayout::ColorWrite);
        }
        commands.barrier(self.depth.texture, ResourceLayout::DepthWrite);

        let rtvs = self.colors.each_ref().map(|t| t.view);
        commands.set_viewport(width, height);
        commands.set_render_targets(&rtvs, Some(self.depth.view));
        for rtv in rtvs {
            commands.clear_render_target(rtv, [0.0; 4]);
        }
        commands.clear_depth(self.depth.view, 1.0);

        commands.set_pipeline(self.pipeline);
        for draw in &draws {
            commands.push_constants(&GBufferConstants {
                world: draw.world,
                primitive: draw.primitive.gpu_data(),
                material: draw.material.map_or(fallback_material, Material::gpu_data),
                camera: camera_cbv,
                sampler,
                visualize_meshlets,
                _pad: 0,
            });
            commands.dispatch_mesh(draw.primitive.meshlet_count.div_ceil(MESHLETS_PER_TASK), 1, 1);
        }

        for target in &self.colors {
            commands.barrier(target.texture, ResourceLayout::Common);
        }
        commands.barrier(self.depth.texture, ResourceLayout::Common);
        commands.end_marker();
    }

    fn release(&mut self, rhi: &mut dyn Rhi) {
        rhi.destroy_pipeline(self.pipeline);
    }
}
