//! Headless RHI backend.
//!
//! Keeps every resource in host memory and records submitted command
//! buffers instead of executing them. Descriptor indices are allocated from
//! per-heap free lists exactly like a bindless device backend would, so
//! index reuse after destruction is observable.
//!
//! Used by the test-suite and by tools that only need the CPU side of the
//! renderer (asset preprocessing, frame capture).

use slotmap::SlotMap;
use smallvec::SmallVec;

use super::{
    BufferDesc, BufferId, CommandBuffer, DescriptorIndex, INVALID_DESCRIPTOR, PipelineDesc,
    PipelineId, Rhi, SamplerDesc, SamplerId, TextureDesc, TextureId, View, ViewDesc, ViewType,
};

#[derive(Debug, Default)]
struct DescriptorHeap {
    next: DescriptorIndex,
    free: Vec<DescriptorIndex>,
}

impl DescriptorHeap {
    fn allocate(&mut self) -> DescriptorIndex {
        if let Some(index) = self.free.pop() {
            return index;
        }
        let index = self.next;
        self.next += 1;
        index
    }

    fn release(&mut self, index: DescriptorIndex) {
        if index != INVALID_DESCRIPTOR {
            self.free.push(index);
        }
    }
}

#[derive(Debug)]
struct TextureRecord {
    desc: TextureDesc,
    views: SmallVec<[View; 4]>,
    data: Vec<u8>,
}

#[derive(Debug)]
struct BufferRecord {
    desc: BufferDesc,
    views: SmallVec<[DescriptorIndex; 3]>,
    data: Vec<u8>,
}

/// Lifetime counters, never decremented.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessStats {
    pub textures_created: usize,
    pub textures_destroyed: usize,
    pub buffers_created: usize,
    pub buffers_destroyed: usize,
    pub samplers_created: usize,
    pub pipelines_created: usize,
    pub waits: usize,
    pub submissions: usize,
}

#[derive(Debug, Default)]
pub struct HeadlessRhi {
    textures: SlotMap<TextureId, TextureRecord>,
    buffers: SlotMap<BufferId, BufferRecord>,
    samplers: SlotMap<SamplerId, (SamplerDesc, DescriptorIndex)>,
    pipelines: SlotMap<PipelineId, PipelineDesc>,

    resource_heap: DescriptorHeap,
    sampler_heap: DescriptorHeap,
    rtv_heap: DescriptorHeap,
    dsv_heap: DescriptorHeap,

    submitted: Vec<CommandBuffer>,
    stats: HeadlessStats,
}

impl HeadlessRhi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn stats(&self) -> HeadlessStats {
        self.stats
    }

    #[must_use]
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    #[must_use]
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    #[must_use]
    pub fn live_samplers(&self) -> usize {
        self.samplers.len()
    }

    #[must_use]
    pub fn contains_texture(&self, texture: TextureId) -> bool {
        self.textures.contains_key(texture)
    }

    #[must_use]
    pub fn contains_buffer(&self, buffer: BufferId) -> bool {
        self.buffers.contains_key(buffer)
    }

    #[must_use]
    pub fn texture_desc(&self, texture: TextureId) -> Option<&TextureDesc> {
        self.textures.get(texture).map(|t| &t.desc)
    }

    #[must_use]
    pub fn texture_views(&self, texture: TextureId) -> Option<&[View]> {
        self.textures.get(texture).map(|t| t.views.as_slice())
    }

    #[must_use]
    pub fn texture_data(&self, texture: TextureId) -> Option<&[u8]> {
        self.textures.get(texture).map(|t| t.data.as_slice())
    }

    #[must_use]
    pub fn buffer_desc(&self, buffer: BufferId) -> Option<&BufferDesc> {
        self.buffers.get(buffer).map(|b| &b.desc)
    }

    #[must_use]
    pub fn buffer_data(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers.get(buffer).map(|b| b.data.as_slice())
    }

    #[must_use]
    pub fn pipeline_desc(&self, pipeline: PipelineId) -> Option<&PipelineDesc> {
        self.pipelines.get(pipeline)
    }

    /// Command buffers submitted so far, oldest first.
    #[must_use]
    pub fn submissions(&self) -> &[CommandBuffer] {
        &self.submitted
    }

    #[must_use]
    pub fn last_submission(&self) -> Option<&CommandBuffer> {
        self.submitted.last()
    }
}

impl Rhi for HeadlessRhi {
    fn create_texture(&mut self, desc: &TextureDesc) -> TextureId {
        self.stats.textures_created += 1;
        let size = desc.layer_size().unwrap_or(0) * u64::from(desc.layers);
        self.textures.insert(TextureRecord {
            desc: desc.clone(),
            views: SmallVec::new(),
            data: vec![0; size as usize],
        })
    }

    fn create_texture_view(&mut self, texture: TextureId, desc: &ViewDesc) -> View {
        let Some(record) = self.textures.get_mut(texture) else {
            log::error!("create_texture_view on destroyed texture {texture:?}");
            return View {
                ty: desc.ty,
                descriptor: INVALID_DESCRIPTOR,
            };
        };
        let descriptor = match desc.ty {
            ViewType::ShaderResource | ViewType::Storage => self.resource_heap.allocate(),
            ViewType::RenderTarget => self.rtv_heap.allocate(),
            ViewType::DepthTarget => self.dsv_heap.allocate(),
            ViewType::Constant => INVALID_DESCRIPTOR,
        };
        let view = View {
            ty: desc.ty,
            descriptor,
        };
        record.views.push(view);
        view
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        let Some(record) = self.textures.remove(texture) else {
            log::warn!("destroy_texture: {texture:?} already destroyed");
            return;
        };
        for view in record.views {
            match view.ty {
                ViewType::ShaderResource | ViewType::Storage => {
                    self.resource_heap.release(view.descriptor);
                }
                ViewType::RenderTarget => self.rtv_heap.release(view.descriptor),
                ViewType::DepthTarget => self.dsv_heap.release(view.descriptor),
                ViewType::Constant => {}
            }
        }
        self.stats.textures_destroyed += 1;
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> BufferId {
        self.stats.buffers_created += 1;
        self.buffers.insert(BufferRecord {
            desc: desc.clone(),
            views: SmallVec::new(),
            data: vec![0; desc.size as usize],
        })
    }

    fn create_buffer_view(&mut self, buffer: BufferId, ty: ViewType) -> DescriptorIndex {
        let Some(record) = self.buffers.get_mut(buffer) else {
            log::error!("create_buffer_view on destroyed buffer {buffer:?}");
            return INVALID_DESCRIPTOR;
        };
        match ty {
            ViewType::Constant | ViewType::ShaderResource | ViewType::Storage => {
                let index = self.resource_heap.allocate();
                record.views.push(index);
                index
            }
            ViewType::RenderTarget | ViewType::DepthTarget => INVALID_DESCRIPTOR,
        }
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        let Some(record) = self.buffers.remove(buffer) else {
            log::warn!("destroy_buffer: {buffer:?} already destroyed");
            return;
        };
        for index in record.views {
            self.resource_heap.release(index);
        }
        self.stats.buffers_destroyed += 1;
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> (SamplerId, DescriptorIndex) {
        self.stats.samplers_created += 1;
        let descriptor = self.sampler_heap.allocate();
        (self.samplers.insert((desc.clone(), descriptor)), descriptor)
    }

    fn destroy_sampler(&mut self, sampler: SamplerId) {
        if let Some((_, descriptor)) = self.samplers.remove(sampler) {
            self.sampler_heap.release(descriptor);
        }
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc) -> PipelineId {
        self.stats.pipelines_created += 1;
        self.pipelines.insert(desc.clone())
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineId) {
        self.pipelines.remove(pipeline);
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) {
        let Some(record) = self.buffers.get_mut(buffer) else {
            log::error!("write_buffer on destroyed buffer {buffer:?}");
            return;
        };
        let start = offset as usize;
        let end = start + data.len();
        if end > record.data.len() {
            log::error!(
                "write_buffer out of bounds on '{}': {end} > {}",
                record.desc.label,
                record.data.len()
            );
            return;
        }
        record.data[start..end].copy_from_slice(data);
    }

    fn write_texture(&mut self, texture: TextureId, data: &[u8]) {
        let Some(record) = self.textures.get_mut(texture) else {
            log::error!("write_texture on destroyed texture {texture:?}");
            return;
        };
        record.data.clear();
        record.data.extend_from_slice(data);
    }

    fn submit(&mut self, commands: CommandBuffer) {
        self.stats.submissions += 1;
        self.submitted.push(commands);
    }

    fn wait(&mut self) {
        self.stats.waits += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors_are_recycled_after_destroy() {
        let mut rhi = HeadlessRhi::new();
        let desc = TextureDesc::new_2d(
            "t",
            4,
            4,
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureUsages::TEXTURE_BINDING,
        );

        let a = rhi.create_texture(&desc);
        let srv = rhi.create_texture_view(a, &ViewDesc::new(ViewType::ShaderResource));
        rhi.destroy_texture(a);

        let b = rhi.create_texture(&desc);
        let reused = rhi.create_texture_view(b, &ViewDesc::new(ViewType::ShaderResource));
        assert_eq!(srv.descriptor, reused.descriptor);
        assert_eq!(rhi.live_textures(), 1);
        assert_eq!(rhi.stats().textures_destroyed, 1);
    }

    #[test]
    fn buffer_render_target_view_is_invalid() {
        let mut rhi = HeadlessRhi::new();
        let buffer = rhi.create_buffer(&BufferDesc::new("b", 16, 4, wgpu::BufferUsages::STORAGE));
        assert_eq!(
            rhi.create_buffer_view(buffer, ViewType::RenderTarget),
            INVALID_DESCRIPTOR
        );
    }

    #[test]
    fn out_of_bounds_write_is_ignored() {
        let mut rhi = HeadlessRhi::new();
        let buffer = rhi.create_buffer(&BufferDesc::new("b", 4, 4, wgpu::BufferUsages::STORAGE));
        rhi.write_buffer(buffer, 2, &[1, 2, 3, 4]);
        assert_eq!(rhi.buffer_data(buffer), Some(&[0u8, 0, 0, 0][..]));
    }
}
