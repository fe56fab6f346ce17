//! Film Grain: adds animated luminance noise to `LDRColorBuffer` in place.

use bytemuck::{Pod, Zeroable};

use super::{LDR_COLOR_BUFFER, dispatch_fullscreen, shaders};
use crate::errors::Result;
use crate::renderer::pass::{PassContext, RenderContext, RenderPass};
use crate::rhi::{DescriptorIndex, PipelineId, ResourceLayout, Rhi, ViewType};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct FilmGrainConstants {
    color: DescriptorIndex,
    amount: f32,
    /// Seeds the noise so grain moves between frames.
    time: f32,
    _pad: u32,
}

pub struct FilmGrainPass {
    pipeline: PipelineId,
}

impl FilmGrainPass {
    pub fn new(ctx: &mut PassContext) -> Result<Self> {
        Ok(Self {
            pipeline: ctx.compute_pipeline::<FilmGrainConstants>("Film Grain", shaders::FILM_GRAIN_CS)?,
        })
    }
}

impl RenderPass for FilmGrainPass {
    fn name(&self) -> &'static str {
        "FilmGrain"
    }

    fn render(&mut self, ctx: &mut RenderContext) {
        let Some(view) = ctx.active_view() else {
            return;
        };
        let settings = &view.volume.film_grain;
        if !settings.enable {
            return;
        }

        let color = ctx.registry.require_texture(LDR_COLOR_BUFFER);
        let frame = &mut *ctx.frame;
        let constants = FilmGrainConstants {
            color: color.descriptor(ViewType::Storage),
            amount: settings.amount,
            time: frame.time,
            _pad: 0,
        };

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
