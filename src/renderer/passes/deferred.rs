//! Deferred Lighting Pass
//!
//! Resolves the G-Buffer into `HDRColorBuffer` with one compute dispatch:
//! directional lights with cascaded shadows, point lights, spot lights with
//! their own shadow maps, and image-based ambient from the skybox.
//!
//! The split-sum BRDF lookup table is baked once during construction. That
//! bake is the only place outside the renderer's sync point that waits for
//! the GPU.

use bytemuck::{Pod, Zeroable};

use super::{
    BLACK_TEXTURE, BRDF_LUT, CAMERA_RING_BUFFER, CASCADE_BUFFER, GBUFFER_ALBEDO, GBUFFER_DEPTH,
    GBUFFER_NORMAL, GBUFFER_PBR, HDR_COLOR_BUFFER, HDR_FORMAT, SHADOW_CASCADES, SHADOW_SAMPLER,
    SSAO_TEXTURE, THREAD_GROUP_SIZE, WHITE_TEXTURE, create_screen_target, create_target,
    dispatch_fullscreen, shaders,
};
use crate::errors::Result;
use crate::renderer::light_feed::LIGHT_BUFFER;
use crate::renderer::pass::{PassContext, RenderContext, RenderPass};
use crate::rhi::{
    CommandBuffer, DescriptorIndex, PipelineId, ResourceLayout, Rhi, TextureId, ViewType,
};
use crate::scene::SpotLight;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct BrdfConstants {
    output: DescriptorIndex,
    size: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct DeferredConstants {
    depth: DescriptorIndex,
    normal: DescriptorIndex,
    albedo: DescriptorIndex,
    pbr: DescriptorIndex,
    ssao: DescriptorIndex,
    brdf: DescriptorIndex,
    lights: DescriptorIndex,
    cascades: DescriptorIndex,
    camera: DescriptorIndex,
    shadow_sampler: DescriptorIndex,
    environment: DescriptorIndex,
    output: DescriptorIndex,
    direct: f32,
    indirect: f32,
    _pad: [u32; 2],
}

pub struct DeferredPass {
    pipeline: PipelineId,
    output: TextureId,
    output_uav: DescriptorIndex,
}

impl DeferredPass {
    pub fn new(ctx: &mut PassContext) -> Result<Self> {
        Self::bake_brdf(ctx)?;

        let output = create_screen_target(
            ctx,
            HDR_COLOR_BUFFER,
            HDR_FORMAT,
            &[
                ViewType::Storage,
                ViewType::ShaderResource,
                ViewType::RenderTarget,
            ],
        );
        let output_uav = ctx
            .registry
            .require_texture(HDR_COLOR_BUFFER)
            .descriptor(ViewType::Storage);
        let pipeline = ctx.compute_pipeline::<DeferredConstants>("Deferred", shaders::DEFERRED_CS)?;

        Ok(Self {
            pipeline,
            output,
            output_uav,
        })
    }

    /// Fills the `BRDF` table and blocks until the GPU has finished it.
    fn bake_brdf(ctx: &mut PassContext) -> Result<()> {
        let size = ctx.settings.brdf_lut_size;
        let texture = create_target(
            ctx,
            BRDF_LUT,
            size,
            size,
            wgpu::TextureFormat::Rg16Float,
            &[ViewType::Storage, ViewType::ShaderResource],
        );
        let uav = ctx
            .registry
            .require_texture(BRDF_LUT)
            .descriptor(ViewType::Storage);
        let pipeline = ctx.compute_pipeline::<BrdfConstants>("BRDF LUT", shaders::BRDF_CS)?;

        let groups = size.div_ceil(THREAD_GROUP_SIZE);
        let mut commands = CommandBuffer::new();
        commands.begin_marker("BRDF");
        commands.barrier(texture, ResourceLayout::Storage);
        commands.set_pipeline(pipeline);
        commands.push_constants(&BrdfConstants { output: uav, size });
        commands.dispatch(groups, groups, 1);
        commands.barrier(texture, ResourceLayout::Common);
        commands.end_marker();

        ctx.rhi.submit(commands);
        ctx.rhi.wait();
        ctx.rhi.destroy_pipeline(pipeline);
        log::info!("Baked {size}x{size} BRDF lookup table");
        Ok(())
    }
}

impl RenderPass for DeferredPass {
    fn name(&self) -> &'static str {
        "Deferred"
    }

    fn render(&mut self, ctx: &mut RenderContext) {
        let Some(view) = ctx.active_view() else {
            return;
        };

        let registry = ctx.registry;
        let frame_index = ctx.frame.frame_index;
        let srv = |name: &str| registry.descriptor(name, ViewType::ShaderResource, frame_index);

        let inputs = [GBUFFER_DEPTH, GBUFFER_NORMAL, GBUFFER_ALBEDO, GBUFFER_PBR]
            .into_iter()
            .chain(SHADOW_CASCADES)
            .chain(view.volume.ssao.enable.then_some(SSAO_TEXTURE))
            .filter_map(|name| registry.texture(name))
            .map(|t| t.texture)
            .chain(
                ctx.scene
                    .world()
                    .view::<SpotLight>()
                    .filter_map(|(_, light)| light.shadow_map),
            )
            .chain(ctx.scene.skybox().map(|skybox| skybox.texture.id))
            .collect::<Vec<_>>();

        let constants = DeferredConstants {
            depth: srv(GBUFFER_DEPTH),
            normal: srv(GBUFFER_NORMAL),
            albedo: srv(GBUFFER_ALBEDO),
            pbr: srv(GBUFFER_PBR),
            ssao: srv(if view.volume.ssao.enable {
                SSAO_TEXTURE
            } else {
                WHITE_TEXTURE
            }),
            brdf: srv(BRDF_LUT),
            lights: registry.descriptor(LIGHT_BUFFER, ViewType::Constant, frame_index),
            cascades: srv(CASCADE_BUFFER),
            camera: registry.descriptor(CAMERA_RING_BUFFER, ViewType::Constant, frame_index),
            shadow_sampler: srv(SHADOW_SAMPLER),
            environment: ctx
                .scene
                .skybox()
                .map_or_else(|| srv(BLACK_TEXTURE), |skybox| skybox.texture.srv),
            output: self.output_uav,
            direct: view.volume.geometry.direct,
            indirect: view.volume.geometry.indirect,
            _pad: [0; 2],
        };

        let frame = &mut *ctx.frame;
        frame.commands.begin_marker(self.name());
        for &texture in &inputs {
            frame.commands.barrier(texture, ResourceLayout::Shader);
        }
        frame.commands.barrier(self.output, ResourceLayout::Storage);
        dispatch_fullscreen(frame, self.pipeline, &constants);
        frame.commands.barrier(self.output, ResourceLayout::Common);
        for &texture in &inputs {
            frame.commands.barrier(texture, ResourceLayout::Common);
        }
        frame.commands.end_marker();
    }

    fn release(&mut self, rhi: &mut dyn Rhi) {
        rhi.destroy_pipeline(self.pipeline);
    }
}
