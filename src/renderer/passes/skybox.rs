//! Skybox Pass
//!
//! Draws a unit cube around the camera into `HDRColorBuffer`, depth-tested
//! against `GBufferDepth` so geometry stays in front. Runs only when
//! `skybox.enable` is set and the scene has a skybox.

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec4};

use super::{
    DEPTH_FORMAT, GBUFFER_DEPTH, HDR_COLOR_BUFFER, HDR_FORMAT, MATERIAL_SAMPLER, shaders,
};
use crate::assets::GpuBuffer;
use crate::errors::{EmberError, Result};
use crate::renderer::pass::{PassContext, RenderContext, RenderPass};
use crate::rhi::{DescriptorIndex, PipelineDesc, PipelineId, ResourceLayout, Rhi, ViewType};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct SkyboxConstants {
    view_projection: Mat4,
    vertices: DescriptorIndex,
    environment: DescriptorIndex,
    sampler: DescriptorIndex,
    _pad: u32,
}

/// 36 corners of a unit cube, two triangles per face.
fn cube_vertices() -> Vec<Vec4> {
    const FACES: [[usize; 4]; 6] = [
        [0, 1, 3, 2],
        [5, 4, 6, 7],
        [4, 0, 2, 6],
        [1, 5, 7, 3],
        [2, 3, 7, 6],
        [4, 5, 1, 0],
    ];
    let corner = |i: usize| {
        Vec4::new(
            if i & 1 == 0 { -1.0 } else { 1.0 },
            if i & 2 == 0 { -1.0 } else { 1.0 },
            if i & 4 == 0 { 1.0 } else { -1.0 },
            1.0,
        )
    };
    FACES
        .iter()
        .flat_map(|[a, b, c, d]| [*a, *b, *c, *a, *c, *d])
        .map(corner)
        .collect()
}

pub struct SkyboxPass {
    pipeline: PipelineId,
    cube: GpuBuffer,
    vertex_count: u32,
}

impl SkyboxPass {
    pub fn new(ctx: &mut PassContext) -> Result<Self> {
        let vertices = cube_vertices();
        let cube = GpuBuffer::upload(ctx.rhi, ctx.uploader, "Skybox Cube", &vertices)
            .ok_or_else(|| EmberError::InvalidMesh("skybox cube is empty".to_owned()))?;

        let vs = ctx.load_shader(shaders::SKYBOX_VS)?;
        let ps = ctx.load_shader(shaders::SKYBOX_PS)?;
        let pipeline = ctx.rhi.create_pipeline(
            &PipelineDesc::graphics("Skybox", vs, ps)
                .with_color_targets(&[HDR_FORMAT])
                .with_depth(DEPTH_FORMAT)
                .with_push_constants::<SkyboxConstants>(),
        );

        Ok(Self {
            pipeline,
            cube,
            vertex_count: vertices.len() as u32,
        })
    }
}

impl RenderPass for SkyboxPass {
    fn name(&self) -> &'static str {
        "Skybox"
    }

    fn render(&mut self, ctx: &mut RenderContext) {
        let Some(view) = ctx.active_view() else {
            return;
        };
        let Some(skybox) = ctx.scene.skybox() else {
            return;
        };
        if !view.volume.skybox.enable {
            return;
        }

        let registry = ctx.registry;
        let color = registry.require_texture(HDR_COLOR_BUFFER);
        let depth = registry.require_texture(GBUFFER_DEPTH);

        // Rotation only: the cube stays centered on the camera.
        let rotation = Mat4::from_mat3(Mat3::from_mat4(view.camera.view));
        let constants = SkyboxConstants {
            view_projection: view.camera.projection * rotation,
            vertices: self.cube.srv,
            environment: skybox.texture.srv,
            sampler: registry.descriptor(MATERIAL_SAMPLER, ViewType::ShaderResource, ctx.frame.frame_index),
            _pad: 0,
        };

        let (width, height) = (ctx.frame.width, ctx.frame.height);
        let commands = &mut ctx.frame.commands;
        commands.begin_marker(self.name());
        commands.barrier(skybox.texture.id, ResourceLayout::Shader);
        commands.barrier(color.texture, ResourceLayout::ColorWrite);
        commands.barrier(depth.texture, ResourceLayout::DepthWrite);
        commands.set_viewport(width, height);
        commands.set_render_targets(
            &[color.descriptor(ViewType::RenderTarget)],
            Some(depth.descriptor(ViewType::DepthTarget)),
        );
        commands.set_pipeline(self.pipeline);
        commands.push_constants(&constants);
        commands.draw(self.vertex_count, 1);
        commands.barrier(depth.texture, ResourceLayout::Common);
        commands.barrier(color.texture, ResourceLayout::Common);
        commands.barrier(skybox.texture.id, ResourceLayout::Common);
        commands.end_marker();
    }

    fn release(&mut self, rhi: &mut dyn Rhi) {
        rhi.destroy_pipeline(self.pipeline);
        rhi.destroy_buffer(self.cube.buffer);
    }
}
