//! Color Grading
//!
//! Applies exposure, white balance, contrast, split toning, color filter,
//! hue shift and saturation to `HDRColorBuffer` in place, before tone
//! mapping in the composite pass.

use bytemuck::{Pod, Zeroable};

use super::{HDR_COLOR_BUFFER, dispatch_fullscreen, shaders};
use crate::errors::Result;
use crate::renderer::pass::{PassContext, RenderContext, RenderPass};
use crate::renderer::post_process::ColorGradingSettings;
use crate::rhi::{DescriptorIndex, PipelineId, ResourceLayout, Rhi, ViewType};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ColorGradingConstants {
    shadows: [f32; 4],
    highlights: [f32; 4],
    color_filter: [f32; 4],
    brightness: f32,
    exposure: f32,
    saturation: f32,
    contrast: f32,
    hue_shift: f32,
    balance: f32,
    temperature: f32,
    tint: f32,
    color: DescriptorIndex,
    _pad: [u32; 3],
}

impl ColorGradingConstants {
    fn new(settings: &ColorGradingSettings, color: DescriptorIndex) -> Self {
        Self {
            shadows: settings.shadows,
            highlights: settings.highlights,
            color_filter: settings.color_filter,
            brightness: settings.brightness,
            exposure: settings.exposure,
            saturation: settings.saturation,
            contrast: settings.contrast,
            hue_shift: settings.hue_shift,
            balance: settings.balance,
            temperature: settings.temperature,
            tint: settings.tint,
            color,
            _pad: [0; 3],
        }
    }
}

pub struct ColorGradingPass {
    pipeline: PipelineId,
}

impl ColorGradingPass {
    pub fn new(ctx: &mut PassContext) -> Result<Self> {
        Ok(Self {
            pipeline: ctx.compute_pipeline::<ColorGradingConstants>(
                "Color Grading",
                shaders::COLOR_GRADING_CS,
            )?,
        })
    }
}

impl RenderPass for ColorGradingPass {
    fn name(&self) -> &'static str {
        "ColorGrading"
    }

    fn render(&mut self, ctx: &mut RenderContext) {
        let Some(view) = ctx.active_view() else {
            return;
        };
        let settings = &view.volume.color_grading;
        if !settings.enable {
            return;
        }

        let color = ctx.registry.require_texture(HDR_COLOR_BUFFER);
        let constants = ColorGradingConstants::new(settings, color.descriptor(ViewType::Storage));

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
