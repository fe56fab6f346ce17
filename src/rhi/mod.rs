//! Render Hardware Interface
//!
//! The renderer core never talks to a graphics API directly. Everything it
//! needs from the GPU goes through the [`Rhi`] trait:
//!
//! - resource creation/destruction (textures, buffers, samplers, pipelines)
//! - descriptor allocation (bindless indices for shader-visible views)
//! - CPU → GPU writes
//! - submission of a recorded [`CommandBuffer`] and the `wait()` stall
//!
//! Formats and usages are expressed with `wgpu`'s type vocabulary so that a
//! device-backed implementation can forward them unchanged. The
//! [`headless::HeadlessRhi`] backend records everything in memory and is what
//! the test-suite renders with.

pub mod command;
pub mod headless;
pub mod upload;

use std::sync::Arc;

use smallvec::SmallVec;

pub use command::{Command, CommandBuffer, ResourceLayout, ResourceRef};
pub use headless::HeadlessRhi;
pub use upload::Uploader;

slotmap::new_key_type! {
    /// Handle of a GPU texture.
    pub struct TextureId;
    /// Handle of a GPU buffer.
    pub struct BufferId;
    /// Handle of a GPU sampler.
    pub struct SamplerId;
    /// Handle of a compiled pipeline state object.
    pub struct PipelineId;
}

/// Index into a shader-visible descriptor heap.
pub type DescriptorIndex = i32;

/// Sentinel returned for "no descriptor".
pub const INVALID_DESCRIPTOR: DescriptorIndex = -1;

/// Number of frames the CPU may record ahead of the GPU.
///
/// Every per-frame resource (ring buffer) has exactly this many slots.
pub const FRAMES_IN_FLIGHT: usize = 3;

// ============================================================================
// Views
// ============================================================================

/// How a resource is bound to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewType {
    /// Constant buffer view (CBV).
    Constant,
    /// Color attachment (RTV).
    RenderTarget,
    /// Depth attachment (DSV).
    DepthTarget,
    /// Read-only shader view (SRV).
    ShaderResource,
    /// Read-write shader view (UAV).
    Storage,
}

/// Parameters of a texture view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewDesc {
    pub ty: ViewType,
}

impl ViewDesc {
    #[must_use]
    pub fn new(ty: ViewType) -> Self {
        Self { ty }
    }
}

/// A created texture view. The descriptor indexes the heap matching `ty`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct View {
    pub ty: ViewType,
    pub descriptor: DescriptorIndex,
}

// ============================================================================
// Resource Descriptions
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    pub label: String,
    pub width: u32,
    pub height: u32,
    /// Array layers (6 for cube maps).
    pub layers: u32,
    pub mip_levels: u32,
    pub format: wgpu::TextureFormat,
    pub usage: wgpu::TextureUsages,
}

impl TextureDesc {
    #[must_use]
    pub fn new_2d(
        label: impl Into<String>,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        Self {
            label: label.into(),
            width: width.max(1),
            height: height.max(1),
            layers: 1,
            mip_levels: 1,
            format,
            usage,
        }
    }

    /// Size in bytes of mip 0 of a single layer, when the format has a fixed block size.
    #[must_use]
    pub fn layer_size(&self) -> Option<u64> {
        let texel = self.format.block_copy_size(None)?;
        Some(u64::from(self.width) * u64::from(self.height) * u64::from(texel))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BufferDesc {
    pub label: String,
    pub size: u64,
    /// Element stride for structured views. `0` means raw bytes.
    pub stride: u32,
    pub usage: wgpu::BufferUsages,
}

impl BufferDesc {
    #[must_use]
    pub fn new(label: impl Into<String>, size: u64, stride: u32, usage: wgpu::BufferUsages) -> Self {
        Self {
            label: label.into(),
            size,
            stride,
            usage,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDesc {
    pub label: String,
    pub mag_filter: wgpu::FilterMode,
    pub min_filter: wgpu::FilterMode,
    pub address_mode: wgpu::AddressMode,
    /// Comparison function for shadow sampling.
    pub compare: Option<wgpu::CompareFunction>,
}

impl SamplerDesc {
    #[must_use]
    pub fn linear(label: impl Into<String>, address_mode: wgpu::AddressMode) -> Self {
        Self {
            label: label.into(),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            address_mode,
            compare: None,
        }
    }

    #[must_use]
    pub fn comparison(label: impl Into<String>, compare: wgpu::CompareFunction) -> Self {
        Self {
            compare: Some(compare),
            ..Self::linear(label, wgpu::AddressMode::ClampToEdge)
        }
    }
}

// ============================================================================
// Shaders & Pipelines
// ============================================================================

/// Pipeline stage a compiled shader blob targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Amplification,
    Mesh,
    Vertex,
    Pixel,
    Compute,
}

impl ShaderStage {
    /// Infers the stage from a `name.<stage>.<ext>` path such as `gbuffer.ms.cso`.
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        let mut parts = path.rsplit('.');
        let _ext = parts.next()?;
        match parts.next()? {
            "as" => Some(Self::Amplification),
            "ms" => Some(Self::Mesh),
            "vs" => Some(Self::Vertex),
            "ps" => Some(Self::Pixel),
            "cs" => Some(Self::Compute),
            _ => None,
        }
    }
}

/// Compiled shader bytecode.
#[derive(Debug)]
pub struct Shader {
    pub path: String,
    pub stage: ShaderStage,
    pub bytecode: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    /// Vertex + pixel.
    Graphics,
    /// Amplification + mesh + pixel.
    Mesh,
    Compute,
}

#[derive(Debug, Clone)]
pub struct PipelineDesc {
    pub label: String,
    pub kind: PipelineKind,
    pub shaders: Vec<Arc<Shader>>,
    pub color_formats: SmallVec<[wgpu::TextureFormat; 4]>,
    pub depth_format: Option<wgpu::TextureFormat>,
    /// Clamp depth instead of clipping at the near/far planes
    /// (`unclipped_depth` in wgpu).
    pub depth_clamp: bool,
    pub push_constant_size: u32,
}

impl PipelineDesc {
    #[must_use]
    pub fn compute(label: impl Into<String>, shader: Arc<Shader>) -> Self {
        Self {
            label: label.into(),
            kind: PipelineKind::Compute,
            shaders: vec![shader],
            color_formats: SmallVec::new(),
            depth_format: None,
            depth_clamp: false,
            push_constant_size: 0,
        }
    }

    #[must_use]
    pub fn graphics(label: impl Into<String>, vertex: Arc<Shader>, pixel: Arc<Shader>) -> Self {
        Self {
            label: label.into(),
            kind: PipelineKind::Graphics,
            shaders: vec![vertex, pixel],
            color_formats: SmallVec::new(),
            depth_format: None,
            depth_clamp: false,
            push_constant_size: 0,
        }
    }

    #[must_use]
    pub fn mesh(label: impl Into<String>, shaders: Vec<Arc<Shader>>) -> Self {
        Self {
            label: label.into(),
            kind: PipelineKind::Mesh,
            shaders,
            color_formats: SmallVec::new(),
            depth_format: None,
            depth_clamp: false,
            push_constant_size: 0,
        }
    }

    #[must_use]
    pub fn with_color_targets(mut self, formats: &[wgpu::TextureFormat]) -> Self {
        self.color_formats = formats.iter().copied().collect();
        self
    }

    #[must_use]
    pub fn with_depth(mut self, format: wgpu::TextureFormat) -> Self {
        self.depth_format = Some(format);
        self
    }

    #[must_use]
    pub fn with_depth_clamp(mut self) -> Self {
        self.depth_clamp = true;
        self
    }

    #[must_use]
    pub fn with_push_constants<T: bytemuck::Pod>(mut self) -> Self {
        self.push_constant_size = std::mem::size_of::<T>() as u32;
        self
    }
}

// ============================================================================
// Rhi Trait
// ============================================================================

/// The GPU device as seen by the renderer core.
///
/// All calls happen on the render thread. Destroying a resource the GPU may
/// still be reading is a caller bug: callers must `wait()` first.
pub trait Rhi {
    fn create_texture(&mut self, desc: &TextureDesc) -> TextureId;
    fn create_texture_view(&mut self, texture: TextureId, desc: &ViewDesc) -> View;
    /// Destroys the texture together with every view created on it.
    fn destroy_texture(&mut self, texture: TextureId);

    fn create_buffer(&mut self, desc: &BufferDesc) -> BufferId;
    /// Creates a CBV, SRV or UAV on the buffer. Other view types yield [`INVALID_DESCRIPTOR`].
    fn create_buffer_view(&mut self, buffer: BufferId, ty: ViewType) -> DescriptorIndex;
    fn destroy_buffer(&mut self, buffer: BufferId);

    fn create_sampler(&mut self, desc: &SamplerDesc) -> (SamplerId, DescriptorIndex);
    fn destroy_sampler(&mut self, sampler: SamplerId);

    fn create_pipeline(&mut self, desc: &PipelineDesc) -> PipelineId;
    fn destroy_pipeline(&mut self, pipeline: PipelineId);

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]);
    /// Replaces the contents of mip 0 / all layers.
    fn write_texture(&mut self, texture: TextureId, data: &[u8]);

    fn submit(&mut self, commands: CommandBuffer);
    /// Blocks until all submitted work has completed.
    fn wait(&mut self);
}
