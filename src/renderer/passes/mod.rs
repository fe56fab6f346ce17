//! Built-in render passes, in frame order.
//!
//! ```text
//! Shadows → GBuffer → SSAO → Deferred → Skybox → Posterization → FXAA → DOF
//!        → ColorGrading → Composite → Pixelization → FilmGrain → Debug
//! ```
//!
//! Passes talk to each other only through registry names. Producers are
//! constructed first, so a consumer may `require_*` anything registered by a
//! pass earlier in the list.

pub mod color_grading;
pub mod composite;
pub mod debug;
pub mod deferred;
pub mod dof;
pub mod film_grain;
pub mod fxaa;
pub mod gbuffer;
pub mod pixelization;
pub mod posterization;
pub mod shadows;
pub mod skybox;
pub mod ssao;

use bytemuck::Pod;

pub use color_grading::ColorGradingPass;
pub use composite::CompositePass;
pub use debug::DebugPass;
pub use deferred::DeferredPass;
pub use dof::DofPass;
pub use film_grain::FilmGrainPass;
pub use fxaa::FxaaPass;
pub use gbuffer::GBufferPass;
pub use pixelization::PixelizationPass;
pub use posterization::PosterizationPass;
pub use shadows::ShadowPass;
pub use skybox::SkyboxPass;
pub use ssao::SsaoPass;

use super::frame::Frame;
use super::pass::PassContext;
use crate::rhi::{CommandBuffer, PipelineId, ResourceLayout, TextureDesc, TextureId, ViewType};

// ============================================================================
// Registry Names
// ============================================================================

pub const WHITE_TEXTURE: &str = "WhiteTexture";
pub const BLACK_TEXTURE: &str = "BlackTexture";

pub const SHADOW_CASCADES: [&str; 4] = [
    "ShadowCascade0",
    "ShadowCascade1",
    "ShadowCascade2",
    "ShadowCascade3",
];
pub const CASCADE_BUFFER: &str = "CascadeBuffer";
pub const SHADOW_SAMPLER: &str = "ShadowSampler";

pub const GBUFFER_DEPTH: &str = "GBufferDepth";
pub const GBUFFER_NORMAL: &str = "GBufferNormal";
pub const GBUFFER_ALBEDO: &str = "GBufferAlbedo";
pub const GBUFFER_PBR: &str = "GBufferPBR";
pub const CAMERA_RING_BUFFER: &str = "CameraRingBuffer";
pub const MATERIAL_SAMPLER: &str = "MaterialSampler";

pub const SSAO_TEXTURE: &str = "SSAOTexture";
pub const SSAO_KERNEL: &str = "SSAOKernel";

pub const BRDF_LUT: &str = "BRDF";
pub const HDR_COLOR_BUFFER: &str = "HDRColorBuffer";

pub const FXAA_TEMPORARY_TEXTURE: &str = "FXAATemporaryTexture";
pub const FXAA_SAMPLER: &str = "FXAASampler";
pub const DOF_TEMPORARY_TEXTURE: &str = "DOFTemporaryTexture";
pub const LDR_COLOR_BUFFER: &str = "LDRColorBuffer";
pub const PIXELIZATION_TEMPORARY_TEXTURE: &str = "PixelizationTemporaryTexture";

// ============================================================================
// Shaders
// ============================================================================

/// Compiled shader blobs, named `<name>.<stage>.cso`.
pub mod shaders {
    pub const SHADOW_AS: &str = "shaders/shadow.as.cso";
    pub const SHADOW_MS: &str = "shaders/shadow.ms.cso";
    pub const GBUFFER_AS: &str = "shaders/gbuffer.as.cso";
    pub const GBUFFER_MS: &str = "shaders/gbuffer.ms.cso";
    pub const GBUFFER_PS: &str = "shaders/gbuffer.ps.cso";
    pub const SSAO_CS: &str = "shaders/ssao.cs.cso";
    pub const BRDF_CS: &str = "shaders/brdf.cs.cso";
    pub const DEFERRED_CS: &str = "shaders/deferred.cs.cso";
    pub const SKYBOX_VS: &str = "shaders/skybox.vs.cso";
    pub const SKYBOX_PS: &str = "shaders/skybox.ps.cso";
    pub const POSTERIZATION_CS: &str = "shaders/posterization.cs.cso";
    pub const FXAA_CS: &str = "shaders/fxaa.cs.cso";
    pub const DOF_CS: &str = "shaders/dof.cs.cso";
    pub const COLOR_GRADING_CS: &str = "shaders/color_grading.cs.cso";
    pub const COMPOSITE_CS: &str = "shaders/composite.cs.cso";
    pub const PIXELIZATION_CS: &str = "shaders/pixelization.cs.cso";
    pub const FILM_GRAIN_CS: &str = "shaders/film_grain.cs.cso";
    pub const DEBUG_CS: &str = "shaders/debug.cs.cso";
}

/// Every shader the built-in passes load at construction.
pub const SHADER_MANIFEST: &[&str] = &[
    shaders::SHADOW_AS,
    shaders::SHADOW_MS,
    shaders::GBUFFER_AS,
    shaders::GBUFFER_MS,
    shaders::GBUFFER_PS,
    shaders::SSAO_CS,
    shaders::BRDF_CS,
    shaders::DEFERRED_CS,
    shaders::SKYBOX_VS,
    shaders::SKYBOX_PS,
    shaders::POSTERIZATION_CS,
    shaders::FXAA_CS,
    shaders::DOF_CS,
    shaders::COLOR_GRADING_CS,
    shaders::COMPOSITE_CS,
    shaders::PIXELIZATION_CS,
    shaders::FILM_GRAIN_CS,
    shaders::DEBUG_CS,
];

// ============================================================================
// Helpers
// ============================================================================

/// Edge of the square thread group every screen-space compute shader uses.
pub const THREAD_GROUP_SIZE: u32 = 8;

/// Meshlets culled by one amplification shader group.
pub const MESHLETS_PER_TASK: u32 = 32;

pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const LDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

fn usage_for(views: &[ViewType]) -> wgpu::TextureUsages {
    views.iter().fold(
        wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::COPY_DST,
        |usage, ty| {
            usage
                | match ty {
                    ViewType::RenderTarget | ViewType::DepthTarget => {
                        wgpu::TextureUsages::RENDER_ATTACHMENT
                    }
                    ViewType::ShaderResource => wgpu::TextureUsages::TEXTURE_BINDING,
                    ViewType::Storage => wgpu::TextureUsages::STORAGE_BINDING,
                    ViewType::Constant => wgpu::TextureUsages::empty(),
                }
        },
    )
}

/// Registers a 2D texture named `name` with one view per entry of `views`.
pub(crate) fn create_target(
    ctx: &mut PassContext,
    name: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    views: &[ViewType],
) -> TextureId {
    let desc = TextureDesc::new_2d(name, width, height, format, usage_for(views));
    let texture = ctx.registry.create_shared_texture(ctx.rhi, name, &desc);
    for &ty in views {
        texture.add_view(ctx.rhi, ty);
    }
    texture.texture
}

/// Screen-sized variant of [`create_target`].
pub(crate) fn create_screen_target(
    ctx: &mut PassContext,
    name: &str,
    format: wgpu::TextureFormat,
    views: &[ViewType],
) -> TextureId {
    let (width, height) = (ctx.settings.width, ctx.settings.height);
    create_target(ctx, name, width, height, format, views)
}

/// Binds `pipeline`, pushes `constants` and covers the frame with thread groups.
pub(crate) fn dispatch_fullscreen<P: Pod>(frame: &mut Frame, pipeline: PipelineId, constants: &P) {
    let (x, y) = frame.groups(THREAD_GROUP_SIZE);
    frame.commands.set_pipeline(pipeline);
    frame.commands.push_constants(constants);
    frame.commands.dispatch(x, y, 1);
}

/// Copies a temporary result back into its source and returns both to `Common`.
pub(crate) fn copy_back(commands: &mut CommandBuffer, temporary: TextureId, target: TextureId) {
    commands.barrier(temporary, ResourceLayout::CopySource);
    commands.barrier(target, ResourceLayout::CopyDest);
    commands.copy_texture(temporary, target);
    commands.barrier(temporary, ResourceLayout::Common);
    commands.barrier(target, ResourceLayout::Common);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhi::ShaderStage;

    #[test]
    fn every_manifest_entry_names_a_stage() {
        for path in SHADER_MANIFEST {
            assert!(ShaderStage::from_path(path).is_some(), "{path}");
        }
    }

    #[test]
    fn storage_views_request_storage_usage() {
        let usage = usage_for(&[ViewType::Storage, ViewType::ShaderResource]);
        assert!(usage.contains(wgpu::TextureUsages::STORAGE_BINDING));
        assert!(usage.contains(wgpu::TextureUsages::TEXTURE_BINDING));
        assert!(!usage.contains(wgpu::TextureUsages::RENDER_ATTACHMENT));
    }
}
