//! Shared Resource Registry
//!
//! A named table of GPU resources that passes publish at construction time
//! and look up every frame. It is the only channel between passes: a
//! producer registers `"HDRColorBuffer"`, any later consumer fetches it by
//! name, and neither holds a reference to the other.
//!
//! # Lifetime
//!
//! Entries live as long as the registry. Re-registering a name replaces the
//! table entry without error; the replaced GPU objects are parked in a
//! retired list and destroyed by the renderer at its next wait point, since
//! an in-flight frame may still read them.
//!
//! # Threading
//!
//! None. All access happens on the render thread between frame boundaries.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::rhi::{
    BufferDesc, BufferId, DescriptorIndex, FRAMES_IN_FLIGHT, INVALID_DESCRIPTOR, Rhi, SamplerDesc,
    SamplerId, TextureDesc, TextureId, View, ViewDesc, ViewType,
};

// ============================================================================
// Resource Kinds
// ============================================================================

/// A texture plus the typed views created on it.
///
/// Invariant: at most one view per [`ViewType`].
#[derive(Debug, Clone)]
pub struct SharedTexture {
    pub texture: TextureId,
    pub desc: TextureDesc,
    views: SmallVec<[View; 4]>,
}

impl SharedTexture {
    /// Adds a view of `ty`.
    pub fn add_view(&mut self, rhi: &mut dyn Rhi, ty: ViewType) -> View {
        self.add_view_with(rhi, ViewDesc::new(ty))
    }

    /// Adds a view. If one of the same type exists it is returned unchanged.
    pub fn add_view_with(&mut self, rhi: &mut dyn Rhi, desc: ViewDesc) -> View {
        if let Some(existing) = self.view(desc.ty) {
            log::warn!(
                "Texture '{}' already has a {:?} view; keeping the existing one",
                self.desc.label,
                desc.ty
            );
            return existing;
        }
        let view = rhi.create_texture_view(self.texture, &desc);
        self.views.push(view);
        view
    }

    #[must_use]
    pub fn view(&self, ty: ViewType) -> Option<View> {
        self.views.iter().copied().find(|v| v.ty == ty)
    }

    #[must_use]
    pub fn views(&self) -> &[View] {
        &self.views
    }

    #[must_use]
    pub fn descriptor(&self, ty: ViewType) -> DescriptorIndex {
        self.view(ty).map_or(INVALID_DESCRIPTOR, |v| v.descriptor)
    }
}

/// A read-write structured buffer with one SRV and one UAV.
#[derive(Debug, Clone, Copy)]
pub struct SharedBuffer {
    pub buffer: BufferId,
    pub srv: DescriptorIndex,
    pub uav: DescriptorIndex,
    pub size: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct RingSlot {
    pub buffer: BufferId,
    pub cbv: DescriptorIndex,
    pub srv: DescriptorIndex,
}

/// One buffer per frame in flight.
#[derive(Debug, Clone)]
pub struct SharedRingBuffer {
    pub slots: [RingSlot; FRAMES_IN_FLIGHT],
    pub size: u64,
}

impl SharedRingBuffer {
    #[inline]
    #[must_use]
    pub fn slot(&self, frame_index: usize) -> &RingSlot {
        &self.slots[frame_index % FRAMES_IN_FLIGHT]
    }

    /// Writes `data` into the slot belonging to `frame_index`.
    pub fn write(&self, rhi: &mut dyn Rhi, frame_index: usize, offset: u64, data: &[u8]) {
        if offset + data.len() as u64 > self.size {
            log::error!(
                "Ring buffer write of {} bytes at {offset} exceeds size {}",
                data.len(),
                self.size
            );
            return;
        }
        rhi.write_buffer(self.slot(frame_index).buffer, offset, data);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SharedSampler {
    pub sampler: SamplerId,
    pub descriptor: DescriptorIndex,
}

#[derive(Debug, Clone)]
pub enum SharedResource {
    Texture(SharedTexture),
    Buffer(SharedBuffer),
    RingBuffer(SharedRingBuffer),
    Sampler(SharedSampler),
}

impl SharedResource {
    /// Resolves the bindless index for `ty` on this resource.
    ///
    /// | Kind | Accepted view types |
    /// |------|---------------------|
    /// | Texture | any view that was added |
    /// | Buffer | `ShaderResource`, `Storage` |
    /// | RingBuffer | `ShaderResource`, `Constant` (slot = `frame_index`) |
    /// | Sampler | any (the sampler's own index) |
    ///
    /// Everything else yields [`INVALID_DESCRIPTOR`].
    #[must_use]
    pub fn descriptor(&self, ty: ViewType, frame_index: usize) -> DescriptorIndex {
        match self {
            Self::Texture(texture) => texture.descriptor(ty),
            Self::Buffer(buffer) => match ty {
                ViewType::ShaderResource => buffer.srv,
                ViewType::Storage => buffer.uav,
                _ => INVALID_DESCRIPTOR,
            },
            Self::RingBuffer(ring) => {
                let slot = ring.slot(frame_index);
                match ty {
                    ViewType::ShaderResource => slot.srv,
                    ViewType::Constant => slot.cbv,
                    _ => INVALID_DESCRIPTOR,
                }
            }
            Self::Sampler(sampler) => sampler.descriptor,
        }
    }

    fn destroy(self, rhi: &mut dyn Rhi) {
        match self {
            Self::Texture(texture) => rhi.destroy_texture(texture.texture),
            Self::Buffer(buffer) => rhi.destroy_buffer(buffer.buffer),
            Self::RingBuffer(ring) => {
                for slot in ring.slots {
                    rhi.destroy_buffer(slot.buffer);
                }
            }
            Self::Sampler(sampler) => rhi.destroy_sampler(sampler.sampler),
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Debug, Default)]
pub struct ResourceRegistry {
    resources: FxHashMap<String, SharedResource>,
    retired: Vec<SharedResource>,
}

impl ResourceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&mut self, name: &str, resource: SharedResource) -> &mut SharedResource {
        if let Some(previous) = self.resources.insert(name.to_owned(), resource) {
            log::debug!("Shared resource '{name}' re-registered; retiring previous entry");
            self.retired.push(previous);
        } else {
            log::debug!("Shared resource '{name}' registered");
        }
        self.resources
            .get_mut(name)
            .unwrap_or_else(|| unreachable!("entry inserted above"))
    }

    /// Creates a texture with no views. Add them with [`SharedTexture::add_view`].
    pub fn create_shared_texture(
        &mut self,
        rhi: &mut dyn Rhi,
        name: &str,
        desc: &TextureDesc,
    ) -> &mut SharedTexture {
        let texture = rhi.create_texture(desc);
        let resource = self.register(
            name,
            SharedResource::Texture(SharedTexture {
                texture,
                desc: desc.clone(),
                views: SmallVec::new(),
            }),
        );
        match resource {
            SharedResource::Texture(texture) => texture,
            _ => unreachable!("registered as texture"),
        }
    }

    /// Creates a structured buffer with an SRV and a UAV.
    pub fn create_shared_rw_buffer(
        &mut self,
        rhi: &mut dyn Rhi,
        name: &str,
        size: u64,
        stride: u32,
    ) -> SharedBuffer {
        let buffer = rhi.create_buffer(&BufferDesc::new(
            name,
            size,
            stride,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        ));
        let shared = SharedBuffer {
            buffer,
            srv: rhi.create_buffer_view(buffer, ViewType::ShaderResource),
            uav: rhi.create_buffer_view(buffer, ViewType::Storage),
            size,
        };
        self.register(name, SharedResource::Buffer(shared));
        shared
    }

    /// Creates `FRAMES_IN_FLIGHT` CPU-written buffers, each with a CBV and an SRV.
    pub fn create_shared_ring_buffer(
        &mut self,
        rhi: &mut dyn Rhi,
        name: &str,
        size: u64,
        stride: u32,
    ) -> SharedRingBuffer {
        let slots = std::array::from_fn(|i| {
            let buffer = rhi.create_buffer(&BufferDesc::new(
                format!("{name}[{i}]"),
                size,
                stride,
                wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            ));
            RingSlot {
                buffer,
                cbv: rhi.create_buffer_view(buffer, ViewType::Constant),
                srv: rhi.create_buffer_view(buffer, ViewType::ShaderResource),
            }
        });
        let ring = SharedRingBuffer { slots, size };
        self.register(name, SharedResource::RingBuffer(ring.clone()));
        ring
    }

    pub fn create_shared_sampler(
        &mut self,
        rhi: &mut dyn Rhi,
        name: &str,
        desc: &SamplerDesc,
    ) -> SharedSampler {
        let (sampler, descriptor) = rhi.create_sampler(desc);
        let shared = SharedSampler {
            sampler,
            descriptor,
        };
        self.register(name, SharedResource::Sampler(shared));
        shared
    }

    // === Lookup ===

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SharedResource> {
        self.resources.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Descriptor of `name`, or [`INVALID_DESCRIPTOR`] if it is absent.
    #[must_use]
    pub fn descriptor(&self, name: &str, ty: ViewType, frame_index: usize) -> DescriptorIndex {
        self.get(name)
            .map_or(INVALID_DESCRIPTOR, |r| r.descriptor(ty, frame_index))
    }

    #[must_use]
    pub fn texture(&self, name: &str) -> Option<&SharedTexture> {
        match self.resources.get(name)? {
            SharedResource::Texture(texture) => Some(texture),
            _ => None,
        }
    }

    pub fn texture_mut(&mut self, name: &str) -> Option<&mut SharedTexture> {
        match self.resources.get_mut(name)? {
            SharedResource::Texture(texture) => Some(texture),
            _ => None,
        }
    }

    #[must_use]
    pub fn buffer(&self, name: &str) -> Option<&SharedBuffer> {
        match self.resources.get(name)? {
            SharedResource::Buffer(buffer) => Some(buffer),
            _ => None,
        }
    }

    #[must_use]
    pub fn ring_buffer(&self, name: &str) -> Option<&SharedRingBuffer> {
        match self.resources.get(name)? {
            SharedResource::RingBuffer(ring) => Some(ring),
            _ => None,
        }
    }

    #[must_use]
    pub fn sampler(&self, name: &str) -> Option<&SharedSampler> {
        match self.resources.get(name)? {
            SharedResource::Sampler(sampler) => Some(sampler),
            _ => None,
        }
    }

    /// Like [`texture`](Self::texture) for resources guaranteed by pass order.
    ///
    /// # Panics
    ///
    /// If `name` is not a registered texture. Passes are constructed
    /// producers-first, so this only fires on a wiring bug.
    #[must_use]
    pub fn require_texture(&self, name: &str) -> &SharedTexture {
        self.texture(name)
            .unwrap_or_else(|| panic!("shared texture '{name}' is not registered"))
    }

    /// # Panics
    ///
    /// If `name` is not a registered ring buffer.
    #[must_use]
    pub fn require_ring_buffer(&self, name: &str) -> &SharedRingBuffer {
        self.ring_buffer(name)
            .unwrap_or_else(|| panic!("shared ring buffer '{name}' is not registered"))
    }

    // === Teardown ===

    /// True if re-registration left GPU objects waiting for destruction.
    #[must_use]
    pub fn has_retired(&self) -> bool {
        !self.retired.is_empty()
    }

    /// Destroys replaced entries. Call only after the GPU is idle.
    pub fn destroy_retired(&mut self, rhi: &mut dyn Rhi) {
        for resource in self.retired.drain(..) {
            resource.destroy(rhi);
        }
    }

    /// Destroys everything. Call only after the GPU is idle.
    pub fn destroy_all(&mut self, rhi: &mut dyn Rhi) {
        self.destroy_retired(rhi);
        for (_, resource) in self.resources.drain() {
            resource.destroy(rhi);
        }
    }
}
