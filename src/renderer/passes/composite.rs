//! Composite Pass
//!
//! Tone maps `HDRColorBuffer` and applies gamma correction into
//! `LDRColorBuffer`, the image the renderer presents. Always runs while a
//! camera with a volume is active; every later pass works on the LDR image.

use bytemuck::{Pod, Zeroable};

use super::{
    HDR_COLOR_BUFFER, LDR_COLOR_BUFFER, LDR_FORMAT, create_screen_target, dispatch_fullscreen,
    shaders,
};
use crate::errors::Result;
use crate::renderer::pass::{PassContext, RenderContext, RenderPass};
use crate::rhi::{DescriptorIndex, PipelineId, ResourceLayout, Rhi, TextureId, ViewType};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct CompositeConstants {
    input: DescriptorIndex,
    output: DescriptorIndex,
    /// Reciprocal of the gamma factor.
    inverse_gamma: f32,
    _pad: u32,
}

pub struct CompositePass {
    pipeline: PipelineId,
    output: TextureId,
    output_uav: DescriptorIndex,
}

impl CompositePass {
    pub fn new(ctx: &mut PassContext) -> Result<Self> {
        let output = create_screen_target(
            ctx,
            LDR_COLOR_BUFFER,
            LDR_FORMAT,
            &[
                ViewType::Storage,
                ViewType::ShaderResource,
                ViewType::RenderTarget,
            ],
        );
        let output_uav = ctx
            .registry
            .require_texture(LDR_COLOR_BUFFER)
            .descriptor(ViewType::Storage);

        Ok(Self {
            pipeline: ctx.compute_pipeline::<CompositeConstants>("Composite", shaders::COMPOSITE_CS)?,
            output,
            output_uav,
        })
    }
}

impl RenderPass for CompositePass {
    fn name(&self) -> &'static str {
        "Composite"
    }

    fn render(&mut self, ctx: &mut RenderContext) {
        let Some(view) = ctx.active_view() else {
            return;
        };

        let input = ctx.registry.require_texture(HDR_COLOR_BUFFER);
        let factor = view.volume.gamma_correct.factor;
        let constants = CompositeConstants {
            input: input.descriptor(ViewType::ShaderResource),
            output: self.output_uav,
            inverse_gamma: if factor > 0.0 { factor.recip() } else { 1.0 },
            _pad: 0,
        };

        let frame = &mut *ctx.frame;
        frame.commands.begin_marker(self.name());
        frame.commands.barrier(input.texture, ResourceLayout::Shader);
        frame.commands.barrier(self.output, ResourceLayout::Storage);
        dispatch_fullscreen(frame, self.pipeline, &constants);
        frame.commands.barrier(self.output, ResourceLayout::Common);
        frame.commands.barrier(input.texture, ResourceLayout::Common);
        frame.commands.end_marker();
    }

    fn release(&mut self, rhi: &mut dyn Rhi) {
        rhi.destroy_pipeline(self.pipeline);
    }
}
