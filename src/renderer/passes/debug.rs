//! Debug Overlays
//!
//! With `shadows.visualize` set, tints `LDRColorBuffer` by the cascade each
//! pixel's depth falls into, which makes split placement and texel snapping
//! visible while tuning `shadows.lambda`.

use bytemuck::{Pod, Zeroable};

use super::{
    CAMERA_RING_BUFFER, CASCADE_BUFFER, GBUFFER_DEPTH, LDR_COLOR_BUFFER, dispatch_fullscreen,
    shaders,
};
use crate::errors::Result;
use crate::renderer::pass::{PassContext, RenderContext, RenderPass};
use crate::rhi::{DescriptorIndex, PipelineId, ResourceLayout, Rhi, ViewType};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct CascadeOverlayConstants {
    color: DescriptorIndex,
    depth: DescriptorIndex,
    cascades: DescriptorIndex,
    camera: DescriptorIndex,
}

pub struct DebugPass {
    pipeline: PipelineId,
}

impl DebugPass {
    pub fn new(ctx: &mut PassContext) -> Result<Self> {
        Ok(Self {
            pipeline: ctx.compute_pipeline::<CascadeOverlayConstants>(
                "Cascade Overlay",
                shaders::DEBUG_CS,
            )?,
        })
    }
}

impl RenderPass for DebugPass {
    fn name(&self) -> &'static str {
        "Debug"
    }

    fn render(&mut self, ctx: &mut RenderContext) {
        let Some(view) = ctx.active_view() else {
            return;
        };
        if !view.volume.shadows.visualize {
            return;
        }

        let registry = ctx.registry;
        let frame_index = ctx.frame.frame_index;
        let color = registry.require_texture(LDR_COLOR_BUFFER);
        let depth = registry.require_texture(GBUFFER_DEPTH);
        let constants = CascadeOverlayConstants {
            color: color.descriptor(ViewType::Storage),
            depth: depth.descriptor(ViewType::ShaderResource),
            cascades: registry.descriptor(CASCADE_BUFFER, ViewType::ShaderResource, frame_index),
            camera: registry.descriptor(CAMERA_RING_BUFFER, ViewType::Constant, frame_index),
        };

        let frame = &mut *ctx.frame;
        frame.commands.begin_marker(self.name());
        frame.commands.barrier(depth.texture, ResourceLayout::Shader);
        frame.commands.barrier(color.texture, ResourceLayout::Storage);
        dispatch_fullscreen(frame, self.pipeline, &constants);
        frame.commands.barrier(color.texture, ResourceLayout::Common);
        frame.commands.barrier(depth.texture, ResourceLayout::Common);
        frame.commands.end_marker();
    }

    fn release(&mut self, rhi: &mut dyn Rhi) {
        rhi.destroy_pipeline(self.pipeline);
    }
}
