//! Screen-Space Ambient Occlusion
//!
//! Samples a hemisphere kernel around each G-Buffer point and writes an
//! occlusion factor to `SSAOTexture`. The kernel is generated once with a
//! Hammersley sequence and uploaded to `SSAOKernel`.
//!
//! When `ssao.enable` is off nothing is recorded and the deferred pass binds
//! `WhiteTexture` instead.

use std::f32::consts::TAU;

use bytemuck::{Pod, Zeroable};
use glam::Vec4;

use super::{
    CAMERA_RING_BUFFER, GBUFFER_DEPTH, GBUFFER_NORMAL, SSAO_KERNEL, SSAO_TEXTURE, create_screen_target,
    dispatch_fullscreen, shaders,
};
use crate::errors::Result;
use crate::renderer::pass::{PassContext, RenderContext, RenderPass};
use crate::rhi::{DescriptorIndex, PipelineId, ResourceLayout, Rhi, TextureId, ViewType};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct SsaoConstants {
    depth: DescriptorIndex,
    normal: DescriptorIndex,
    camera: DescriptorIndex,
    kernel: DescriptorIndex,
    output: DescriptorIndex,
    kernel_size: u32,
    radius: f32,
    power: f32,
}

/// Van der Corput radical inverse in base 2.
fn radical_inverse(mut bits: u32) -> f32 {
    bits = bits.rotate_right(16);
    bits = ((bits & 0x5555_5555) << 1) | ((bits & 0xAAAA_AAAA) >> 1);
    bits = ((bits & 0x3333_3333) << 2) | ((bits & 0xCCCC_CCCC) >> 2);
    bits = ((bits & 0x0F0F_0F0F) << 4) | ((bits & 0xF0F0_F0F0) >> 4);
    bits = ((bits & 0x00FF_00FF) << 8) | ((bits & 0xFF00_FF00) >> 8);
    bits as f32 * 2.328_306_4e-10
}

/// Tangent-space hemisphere samples (+Z up), denser towards the origin.
#[must_use]
pub fn ssao_kernel(size: u32) -> Vec<Vec4> {
    (0..size)
        .map(|i| {
            let u = (i as f32 + 0.5) / size as f32;
            let v = radical_inverse(i);
            let phi = TAU * v;
            let cos_theta = 1.0 - u;
            let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
            let t = i as f32 / size as f32;
            let scale = 0.1 + 0.9 * t * t;
            Vec4::new(
                phi.cos() * sin_theta * scale,
                phi.sin() * sin_theta * scale,
                cos_theta * scale,
                0.0,
            )
        })
        .collect()
}

pub struct SsaoPass {
    pipeline: PipelineId,
    output: TextureId,
    output_uav: DescriptorIndex,
    kernel_srv: DescriptorIndex,
    kernel_size: u32,
}

impl SsaoPass {
    pub fn new(ctx: &mut PassContext) -> Result<Self> {
        let output = create_screen_target(
            ctx,
            SSAO_TEXTURE,
            wgpu::TextureFormat::R8Unorm,
            &[ViewType::Storage, ViewType::ShaderResource],
        );
        let output_uav = ctx
            .registry
            .require_texture(SSAO_TEXTURE)
            .descriptor(ViewType::Storage);

        let kernel_size = ctx.settings.ssao_kernel_size;
        let kernel = ssao_kernel(kernel_size);
        let bytes: &[u8] = bytemuck::cast_slice(&kernel);
        let buffer = ctx.registry.create_shared_rw_buffer(
            ctx.rhi,
            SSAO_KERNEL,
            bytes.len() as u64,
            std::mem::size_of::<Vec4>() as u32,
        );
        ctx.uploader.enqueue_buffer(buffer.buffer, bytes);

        let pipeline = ctx.compute_pipeline::<SsaoConstants>("SSAO", shaders::SSAO_CS)?;

        Ok(Self {
            pipeline,
            output,
            output_uav,
            kernel_srv: buffer.srv,
            kernel_size,
        })
    }
}

impl RenderPass for SsaoPass {
    fn name(&self) -> &'static str {
        "SSAO"
    }

    fn render(&mut self, ctx: &mut RenderContext) {
        let Some(view) = ctx.active_view() else {
            return;
        };
        let settings = &view.volume.ssao;
        if !settings.enable {
            return;
        }

        let registry = ctx.registry;
        let frame_index = ctx.frame.frame_index;
        let depth = registry.require_texture(GBUFFER_DEPTH);
        let normal = registry.require_texture(GBUFFER_NORMAL);
        let constants = SsaoConstants {
            depth: depth.descriptor(ViewType::ShaderResource),
            normal: normal.descriptor(ViewType::ShaderResource),
            camera: registry.descriptor(CAMERA_RING_BUFFER, ViewType::Constant, frame_index),
            kernel: self.kernel_srv,
            output: self.output_uav,
            kernel_size: self.kernel_size,
            radius: settings.radius,
            power: settings.power,
        };

        let frame = &mut *ctx.frame;
        frame.commands.begin_marker(self.name());
        frame.commands.barrier(depth.texture, ResourceLayout::Shader);
        frame.commands.barrier(normal.texture, ResourceLayout::Shader);
        frame.commands.barrier(self.output, ResourceLayout::Storage);
        dispatch_fullscreen(frame, self.pipeline, &constants);
        frame.commands.barrier(self.output, ResourceLayout::Common);
        frame.commands.barrier(normal.texture, ResourceLayout::Common);
        frame.commands.barrier(depth.texture, ResourceLayout::Common);
        frame.commands.end_marker();
    }

    fn release(&mut self, rhi: &mut dyn Rhi) {
        rhi.destroy_pipeline(self.pipeline);
    }
}
