//! Posterization: quantizes `HDRColorBuffer` in place to `levels` steps per channel.

use bytemuck::{Pod, Zeroable};

use super::{HDR_COLOR_BUFFER, dispatch_fullscreen, shaders};
use crate::errors::Result;
use crate::renderer::pass::{PassContext, RenderContext, RenderPass};
use crate::rhi::{DescriptorIndex, PipelineId, ResourceLayout, Rhi, ViewType};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct PosterizationConstants {
    color: DescriptorIndex,
    levels: f32,
}

pub struct PosterizationPass {
    pipeline: PipelineId,
}

impl PosterizationPass {
    pub fn new(ctx: &mut PassContext) -> Result<Self> {
        Ok(Self {
            pipeline: ctx.compute_pipeline::<PosterizationConstants>(
                "Posterization",
                shaders::POSTERIZATION_CS,
            )?,
        })
    }
}

impl RenderPass for PosterizationPass {
    fn name(&self) -> &'static str {
        "Posterization"
    }

    fn render(&mut self, ctx: &mut RenderContext) {
        let Some(view) = ctx.active_view() else {
            return;
        };
        let settings = &view.volume.posterization;
        if !settings.enable {
            return;
        }

        let color = ctx.registry.require_texture(HDR_COLOR_BUFFER);
        let constants = PosterizationConstants {
            color: color.descriptor(ViewType::Storage),
            levels: settings.levels.max(1.0),
        };

        let frame = &mut *ctx.frame;
        frame.commands.begin_marker(self.name());
        frame.commands.barrier(color.texture, ResourceLayout::Storage);
        dispatch_fullscreen(frame, self.pipeline, &constants);
        frame.commands.barrier(color.texture, ResourceLayout::Common);
        frame.commands.end_marker();
    }

    fn release(&mut self, rhi: &mut dyn Rhi) {
        rhi.destroy_pipeline(self.pipeline);
    }
}
