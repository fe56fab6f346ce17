//! Depth of Field
//!
//! Blurs `HDRColorBuffer` by circle of confusion: pixels whose linear depth
//! is within `focusRange` of `focusPoint` stay sharp. The blurred image is
//! written to `DOFTemporaryTexture` and copied back.

use bytemuck::{Pod, Zeroable};

use super::{
    DOF_TEMPORARY_TEXTURE, GBUFFER_DEPTH, HDR_COLOR_BUFFER, HDR_FORMAT, copy_back,
    create_screen_target, dispatch_fullscreen, shaders,
};
use crate::errors::Result;
use crate::renderer::pass::{PassContext, RenderContext, RenderPass};
use crate::rhi::{DescriptorIndex, PipelineId, ResourceLayout, Rhi, TextureId, ViewType};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct DofConstants {
    color: DescriptorIndex,
    depth: DescriptorIndex,
    output: DescriptorIndex,
    _pad: u32,
    focus_range: f32,
    focus_point: f32,
    near: f32,
    far: f32,
}

pub struct DofPass {
    pipeline: PipelineId,
    temporary: TextureId,
    temporary_uav: DescriptorIndex,
}

impl DofPass {
    pub fn new(ctx: &mut PassContext) -> Result<Self> {
        let temporary = create_screen_target(
            ctx,
            DOF_TEMPORARY_TEXTURE,
            HDR_FORMAT,
            &[ViewType::Storage, ViewType::ShaderResource],
        );
        let temporary_uav = ctx
            .registry
            .require_texture(DOF_TEMPORARY_TEXTURE)
            .descriptor(ViewType::Storage);

        Ok(Self {
            pipeline: ctx.compute_pipeline::<DofConstants>("Depth of Field", shaders::DOF_CS)?,
            temporary,
            temporary_uav,
        })
    }
}

impl RenderPass for DofPass {
    fn name(&self) -> &'static str {
        "DOF"
    }

    fn render(&mut self, ctx: &mut RenderContext) {
        let Some(view) = ctx.active_view() else {
            return;
        };
        let settings = &view.volume.depth_of_field;
        if !settings.enable {
            return;
        }

        let color = ctx.registry.require_texture(HDR_COLOR_BUFFER);
        let depth = ctx.registry.require_texture(GBUFFER_DEPTH);
        let constants = DofConstants {
            color: color.descriptor(ViewType::ShaderResource),
            depth: depth.descriptor(ViewType::ShaderResource),
            output: self.temporary_uav,
            _pad: 0,
            focus_range: settings.focus_range,
            focus_point: settings.focus_point,
            near: view.camera.near,
            far: view.camera.far,
        };

        let frame = &mut *ctx.frame;
        frame.commands.begin_marker(self.name());
        frame.commands.barrier(color.texture, ResourceLayout::Shader);
        frame.commands.barrier(depth.texture, ResourceLayout::Shader);
        frame.commands.barrier(self.temporary, ResourceLayout::Storage);
        dispatch_fullscreen(frame, self.pipeline, &constants);
        frame.commands.barrier(depth.texture, ResourceLayout::Common);
        copy_back(&mut frame.commands, self.temporary, color.texture);
        frame.commands.end_marker();
    }

    fn release(&mut self, rhi: &mut dyn Rhi) {
        rhi.destroy_pipeline(self.pipeline);
    }
}
