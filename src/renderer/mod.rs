//! Renderer
//!
//! Owns the device, the shared resource registry, the asset server and the
//! ordered list of render passes, and drives them once per frame.
//!
//! # Frame Sequence
//!
//! ```text
//! flush uploads
//!   → [wait once] destroy retired assets & registry entries   (only if needed)
//!   → sync every pass
//!   → refresh camera matrices, snapshot lights
//!   → record every pass
//!   → copy LDRColorBuffer into the back buffer (if any), submit
//! ```
//!
//! The wait is batched: however many passes ask for an idle GPU, and however
//! many assets were released since the last frame, `Rhi::wait` is called at
//! most once per frame.

pub mod draw_list;
pub mod frame;
pub mod light_feed;
pub mod pass;
pub mod passes;
pub mod post_process;
pub mod registry;
pub mod settings;
pub mod shadow_utils;

use std::sync::Arc;

pub use frame::Frame;
pub use light_feed::LightFeed;
pub use pass::{PassContext, RenderContext, RenderPass, SyncContext};
pub use post_process::PostProcessVolume;
pub use registry::ResourceRegistry;
pub use settings::RendererSettings;

use crate::assets::{Asset, AssetServer, Mesh};
use crate::errors::Result;
use crate::rhi::{ResourceLayout, Rhi, TextureDesc, Uploader, ViewType};
use crate::scene::{Entity, Scene, Skybox};
use passes::{
    BLACK_TEXTURE, ColorGradingPass, CompositePass, DebugPass, DeferredPass, DofPass,
    FilmGrainPass, FxaaPass, GBufferPass, LDR_COLOR_BUFFER, PixelizationPass, PosterizationPass,
    ShadowPass, SkyboxPass, SsaoPass, WHITE_TEXTURE,
};

pub struct Renderer<R: Rhi> {
    rhi: R,
    registry: ResourceRegistry,
    assets: AssetServer,
    uploader: Uploader,
    settings: RendererSettings,
    light_feed: LightFeed,
    passes: Vec<Box<dyn RenderPass>>,
    /// Assets whose last reference was given back; destroyed after the next wait.
    retired: Vec<Asset>,
    frame_count: u64,
}

impl<R: Rhi> Renderer<R> {
    /// Builds the light feed and every pass in frame order.
    ///
    /// Fails if the settings are invalid or a pass cannot load its shaders.
    pub fn new(mut rhi: R, mut assets: AssetServer, settings: RendererSettings) -> Result<Self> {
        settings.validate()?;
        assets.set_meshlet_limits(settings.meshlet_limits);

        let mut registry = ResourceRegistry::new();
        let mut uploader = Uploader::new();

        for (name, texel) in [(WHITE_TEXTURE, [255u8; 4]), (BLACK_TEXTURE, [0, 0, 0, 255])] {
            let desc = TextureDesc::new_2d(
                name,
                1,
                1,
                wgpu::TextureFormat::Rgba8Unorm,
                wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            );
            let texture = registry.create_shared_texture(&mut rhi, name, &desc);
            texture.add_view(&mut rhi, ViewType::ShaderResource);
            uploader.enqueue_texture(texture.texture, &texel);
        }

        let light_feed = LightFeed::new(&mut registry, &mut rhi);

        let passes: Vec<Box<dyn RenderPass>> = {
            let mut ctx = PassContext {
                rhi: &mut rhi,
                registry: &mut registry,
                assets: &mut assets,
                uploader: &mut uploader,
                settings: &settings,
            };
            vec![
                Box::new(ShadowPass::new(&mut ctx)?),
                Box::new(GBufferPass::new(&mut ctx)?),
                Box::new(SsaoPass::new(&mut ctx)?),
                Box::new(DeferredPass::new(&mut ctx)?),
                Box::new(SkyboxPass::new(&mut ctx)?),
                Box::new(PosterizationPass::new(&mut ctx)?),
                Box::new(FxaaPass::new(&mut ctx)?),
                Box::new(DofPass::new(&mut ctx)?),
                Box::new(ColorGradingPass::new(&mut ctx)?),
                Box::new(CompositePass::new(&mut ctx)?),
                Box::new(PixelizationPass::new(&mut ctx)?),
                Box::new(FilmGrainPass::new(&mut ctx)?),
                Box::new(DebugPass::new(&mut ctx)?),
            ]
        };

        log::info!(
            "Renderer initialized at {}x{}: {} passes, {} shared resources",
            settings.width,
            settings.height,
            passes.len(),
            registry.len()
        );

        Ok(Self {
            rhi,
            registry,
            assets,
            uploader,
            settings,
            light_feed,
            passes,
            retired: Vec::new(),
            frame_count: 0,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn rhi(&self) -> &R {
        &self.rhi
    }

    #[inline]
    pub fn rhi_mut(&mut self) -> &mut R {
        &mut self.rhi
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    #[inline]
    #[must_use]
    pub fn assets(&self) -> &AssetServer {
        &self.assets
    }

    #[inline]
    pub fn assets_mut(&mut self) -> &mut AssetServer {
        &mut self.assets
    }

    #[must_use]
    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    #[must_use]
    pub fn light_feed(&self) -> &LightFeed {
        &self.light_feed
    }

    /// Pass names in execution order.
    pub fn pass_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.passes.iter().map(|p| p.name())
    }

    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// A [`Frame`] for the next frame number at the configured resolution.
    #[must_use]
    pub fn next_frame(&self) -> Frame {
        Frame::new(self.frame_count, self.settings.width, self.settings.height)
    }

    // ========================================================================
    // Assets
    // ========================================================================

    pub fn load_mesh(&mut self, path: &str) -> Result<Arc<Mesh>> {
        self.assets.load_mesh(&mut self.rhi, &mut self.uploader, path)
    }

    /// Drops one reference to `path`. GPU state is freed after the next wait.
    pub fn release_asset(&mut self, path: &str) {
        if let Some(asset) = self.assets.give_back(path) {
            self.retired.push(asset);
        }
    }

    /// Loads `path` as the scene's skybox, releasing the previous one.
    pub fn load_skybox(&mut self, scene: &mut Scene, path: &str) -> Result<()> {
        let texture = self
            .assets
            .load_texture(&mut self.rhi, &mut self.uploader, path)?;
        let previous = scene.set_skybox(Some(Skybox {
            path: path.to_owned(),
            texture,
        }));
        if let Some(previous) = previous {
            self.release_asset(&previous.path);
        }
        Ok(())
    }

    /// Removes `entity` and its subtree, releasing every mesh attached to them.
    pub fn despawn(&mut self, scene: &mut Scene, entity: Entity) {
        for path in scene.remove_entity(entity) {
            self.release_asset(&path);
        }
    }

    fn destroy_retired(&mut self) {
        for asset in std::mem::take(&mut self.retired) {
            match asset {
                Asset::Mesh(mesh) => mesh.release(&mut self.rhi, &mut self.assets),
                Asset::Texture(texture) => texture.destroy(&mut self.rhi),
                Asset::Shader(_) | Asset::Volume(_) => {}
            }
        }
        self.registry.destroy_retired(&mut self.rhi);
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Records and submits one frame.
    pub fn render(&mut self, mut frame: Frame, scene: &mut Scene) {
        self.uploader.flush(&mut self.rhi);

        let needs_idle = self.passes.iter().any(|p| p.requires_gpu_idle(scene))
            || !self.retired.is_empty()
            || self.registry.has_retired();
        if needs_idle {
            self.rhi.wait();
            self.destroy_retired();
        }

        {
            let mut ctx = SyncContext {
                rhi: &mut self.rhi,
                registry: &mut self.registry,
                scene,
                settings: &self.settings,
            };
            for pass in &mut self.passes {
                pass.sync(&mut ctx);
            }
        }

        scene.update();
        self.light_feed
            .update(frame.frame_index, scene, &self.registry, &mut self.rhi);

        {
            let mut ctx = RenderContext {
                frame: &mut frame,
                scene,
                registry: &self.registry,
                rhi: &mut self.rhi,
                settings: &self.settings,
            };
            for pass in &mut self.passes {
                pass.render(&mut ctx);
            }
        }

        if let Some(back_buffer) = frame.back_buffer
            && let Some(ldr) = self.registry.texture(LDR_COLOR_BUFFER)
        {
            let commands = &mut frame.commands;
            commands.begin_marker("Present");
            commands.barrier(ldr.texture, ResourceLayout::CopySource);
            commands.barrier(back_buffer, ResourceLayout::CopyDest);
            commands.copy_texture(ldr.texture, back_buffer);
            commands.barrier(back_buffer, ResourceLayout::Common);
            commands.barrier(ldr.texture, ResourceLayout::Common);
            commands.end_marker();
        }

        self.rhi.submit(frame.commands);
        self.frame_count += 1;
    }

    /// Waits for the GPU, frees everything the renderer created and hands the device back.
    pub fn shutdown(mut self) -> R {
        self.rhi.wait();
        let cached = self.assets.drain();
        self.retired.extend(cached);
        self.destroy_retired();
        for pass in &mut self.passes {
            pass.release(&mut self.rhi);
        }
        self.registry.destroy_all(&mut self.rhi);
        log::info!("Renderer shut down after {} frames", self.frame_count);
        self.rhi
    }
}
