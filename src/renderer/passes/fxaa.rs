//! FXAA (Fast Approximate Anti-Aliasing) Pass
//!
//! Detects aliased edges in `HDRColorBuffer` via luma contrast and blends
//! along them at sub-pixel precision.
//!
//! # Data Flow
//!
//! ```text
//! HDRColorBuffer ──(FXAASampler)──► FXAATemporaryTexture ──copy──► HDRColorBuffer
//! ```
//!
//! A compute shader cannot sample and write the same texture, so the result
//! lands in a temporary of the same size and format and is copied back.

use bytemuck::{Pod, Zeroable};

use super::{
    FXAA_SAMPLER, FXAA_TEMPORARY_TEXTURE, HDR_COLOR_BUFFER, HDR_FORMAT, copy_back,
    create_screen_target, dispatch_fullscreen, shaders,
};
use crate::errors::Result;
use crate::renderer::pass::{PassContext, RenderContext, RenderPass};
use crate::rhi::{
    DescriptorIndex, PipelineId, ResourceLayout, Rhi, SamplerDesc, TextureId, ViewType,
};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct FxaaConstants {
    input: DescriptorIndex,
    output: DescriptorIndex,
    sampler: DescriptorIndex,
    _pad: u32,
    /// 1 / resolution.
    texel_size: [f32; 2],
    _pad2: [u32; 2],
}

pub struct FxaaPass {
    pipeline: PipelineId,
    temporary: TextureId,
    temporary_uav: DescriptorIndex,
    sampler: DescriptorIndex,
}

impl FxaaPass {
    pub fn new(ctx: &mut PassContext) -> Result<Self> {
        let temporary = create_screen_target(
            ctx,
            FXAA_TEMPORARY_TEXTURE,
            HDR_FORMAT,
            &[ViewType::Storage, ViewType::ShaderResource],
        );
        let temporary_uav = ctx
            .registry
            .require_texture(FXAA_TEMPORARY_TEXTURE)
            .descriptor(ViewType::Storage);

        // Linear filtering is what gives FXAA its sub-pixel blend.
        let sampler = ctx
            .registry
            .create_shared_sampler(
                ctx.rhi,
                FXAA_SAMPLER,
                &SamplerDesc::linear(FXAA_SAMPLER, wgpu::AddressMode::ClampToEdge),
            )
            .descriptor;

        Ok(Self {
            pipeline: ctx.compute_pipeline::<FxaaConstants>("FXAA", shaders::FXAA_CS)?,
            temporary,
            temporary_uav,
            sampler,
        })
    }
}

impl RenderPass for FxaaPass {
    fn name(&self) -> &'static str {
        "FXAA"
    }

    fn render(&mut self, ctx: &mut RenderContext) {
        let Some(view) = ctx.active_view() else {
            return;
        };
        if !view.volume.fxaa.enable {
            return;
        }

        let color = ctx.registry.require_texture(HDR_COLOR_BUFFER);
        let frame = &mut *ctx.frame;
        let constants = FxaaConstants {
            input: color.descriptor(ViewType::ShaderResource),
            output: self.temporary_uav,
            sampler: self.sampler,
            _pad: 0,
            texel_size: [1.0 / frame.width as f32, 1.0 / frame.height as f32],
            _pad2: [0; 2],
        };

        frame.commands.begin_marker(self.name());
        frame.commands.barrier(color.texture, ResourceLayout::Shader);
        frame.commands.barrier(self.temporary, ResourceLayout::Storage);
        dispatch_fullscreen(frame, self.pipeline, &constants);
        copy_back(&mut frame.commands, self.temporary, color.texture);
        frame.commands.end_marker();
    }

    fn release(&mut self, rhi: &mut dyn Rhi) {
        rhi.destroy_pipeline(self.pipeline);
    }
}
