//! Render Pass Contract
//!
//! Every stage of the frame implements [`RenderPass`]. A pass goes through
//! three phases, each with its own context:
//!
//! | Phase | Context | May mutate |
//! |-------|---------|------------|
//! | construction | [`PassContext`] | registry, device, asset cache |
//! | sync | [`SyncContext`] | registry, device, scene components |
//! | render | [`RenderContext`] | the frame's command buffer, ring slots |
//!
//! `sync` runs only after the renderer's single per-frame `wait()`, so it is
//! the one place a pass may free GPU objects created earlier.
//!
//! # Early Exit
//!
//! A pass whose input is missing (no main camera, no volume on it, effect
//! disabled) records nothing and touches no shared state. Every resource a
//! pass transitions is back in [`ResourceLayout::Common`] when `render`
//! returns.
//!
//! [`ResourceLayout::Common`]: crate::rhi::ResourceLayout::Common

use std::sync::Arc;

use super::frame::Frame;
use super::post_process::PostProcessVolume;
use super::registry::ResourceRegistry;
use super::settings::RendererSettings;
use crate::assets::AssetServer;
use crate::errors::Result;
use crate::rhi::{PipelineDesc, PipelineId, Rhi, Shader, Uploader};
use crate::scene::{Camera, Entity, Scene};

/// Construction-time access to the engine subsystems.
pub struct PassContext<'a> {
    pub rhi: &'a mut dyn Rhi,
    pub registry: &'a mut ResourceRegistry,
    pub assets: &'a mut AssetServer,
    pub uploader: &'a mut Uploader,
    pub settings: &'a RendererSettings,
}

impl PassContext<'_> {
    pub fn load_shader(&mut self, path: &str) -> Result<Arc<Shader>> {
        self.assets.load_shader(path)
    }

    /// Loads a compute shader and builds its pipeline.
    pub fn compute_pipeline<P: bytemuck::Pod>(&mut self, label: &str, path: &str) -> Result<PipelineId> {
        let shader = self.load_shader(path)?;
        let desc = PipelineDesc::compute(label, shader).with_push_constants::<P>();
        Ok(self.rhi.create_pipeline(&desc))
    }
}

/// Access granted between the frame's wait point and recording.
pub struct SyncContext<'a> {
    pub rhi: &'a mut dyn Rhi,
    pub registry: &'a mut ResourceRegistry,
    pub scene: &'a mut Scene,
    pub settings: &'a RendererSettings,
}

/// Access granted while recording.
pub struct RenderContext<'a> {
    pub frame: &'a mut Frame,
    pub scene: &'a Scene,
    pub registry: &'a ResourceRegistry,
    pub rhi: &'a mut dyn Rhi,
    pub settings: &'a RendererSettings,
}

/// The main camera together with the volume that drives this frame's effects.
#[derive(Clone, Copy)]
pub struct ActiveView<'a> {
    pub entity: Entity,
    pub camera: &'a Camera,
    pub volume: &'a PostProcessVolume,
}

/// `None` when there is no main camera or it has no volume attached.
#[must_use]
pub fn active_view(scene: &Scene) -> Option<ActiveView<'_>> {
    let (entity, camera) = scene.main_camera()?;
    let volume = camera.volume.as_deref()?;
    Some(ActiveView {
        entity,
        camera,
        volume,
    })
}

impl<'a> RenderContext<'a> {
    #[inline]
    #[must_use]
    pub fn active_view(&self) -> Option<ActiveView<'a>> {
        active_view(self.scene)
    }
}

pub trait RenderPass {
    /// Marker label and identification in logs.
    fn name(&self) -> &'static str;

    /// True if [`sync`](Self::sync) is about to free GPU objects this frame.
    ///
    /// The renderer waits for the GPU once when any pass asks for it.
    fn requires_gpu_idle(&self, _scene: &Scene) -> bool {
        false
    }

    /// Reacts to scene changes: allocation, and freeing after the wait.
    fn sync(&mut self, _ctx: &mut SyncContext) {}

    /// Records this pass into `ctx.frame.commands`.
    fn render(&mut self, ctx: &mut RenderContext);

    /// Frees GPU objects the pass owns outside the registry. The GPU is idle.
    fn release(&mut self, _rhi: &mut dyn Rhi) {}
}
