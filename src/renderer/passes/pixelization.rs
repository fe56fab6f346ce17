//! Pixelization: replaces each `size`×`size` block of `LDRColorBuffer` with its center sample.

use bytemuck::{Pod, Zeroable};

use super::{
    LDR_COLOR_BUFFER, LDR_FORMAT, PIXELIZATION_TEMPORARY_TEXTURE, copy_back, create_screen_target,
    dispatch_fullscreen, shaders,
};
use crate::errors::Result;
use crate::renderer::pass::{PassContext, RenderContext, RenderPass};
use crate::rhi::{DescriptorIndex, PipelineId, ResourceLayout, Rhi, TextureId, ViewType};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct PixelizationConstants {
    input: DescriptorIndex,
    output: DescriptorIndex,
    size: u32,
    _pad: u32,
}

pub struct PixelizationPass {
    pipeline: PipelineId,
    temporary: TextureId,
    temporary_uav: DescriptorIndex,
}

impl PixelizationPass {
    pub fn new(ctx: &mut PassContext) -> Result<Self> {
        let temporary = create_screen_target(
            ctx,
            PIXELIZATION_TEMPORARY_TEXTURE,
            LDR_FORMAT,
            &[ViewType::Storage, ViewType::ShaderResource],
        );
        let temporary_uav = ctx
            .registry
            .require_texture(PIXELIZATION_TEMPORARY_TEXTURE)
            .descriptor(ViewType::Storage);

        Ok(Self {
            pipeline: ctx.compute_pipeline::<PixelizationConstants>(
                "Pixelization",
                shaders::PIXELIZATION_CS,
            )?,
            temporary,
            temporary_uav,
        })
    }
}

impl RenderPass for PixelizationPass {
    fn name(&self) -> &'static str {
        "Pixelization"
    }

    fn render(&mut self, ctx: &mut RenderContext) {
        let Some(view) = ctx.active_view() else {
            return;
        };
        let settings = &view.volume.pixelization;
        if !settings.enable {
            return;
        }

        let color = ctx.registry.require_texture(LDR_COLOR_BUFFER);
        let constants = PixelizationConstants {
            input: color.descriptor(ViewType::ShaderResource),
            output: self.temporary_uav,
            size: settings.size.max(1),
            _pad: 0,
        };

        let frame = &mut *ctx.frame;
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
