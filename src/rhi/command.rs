//! Command Recording
//!
//! A [`CommandBuffer`] is an ordered list of typed [`Command`]s for one frame.
//! Besides recording, it tracks the layout every touched resource was last
//! transitioned to, so the "return to `Common` after use" discipline can be
//! checked after a pass has recorded.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::{BufferId, DescriptorIndex, PipelineId, TextureId};

/// Resource state a barrier transitions into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceLayout {
    /// Shared state every pass may assume at entry.
    #[default]
    Common,
    ColorWrite,
    DepthWrite,
    /// Read from a shader stage.
    Shader,
    /// Read-write from a shader stage.
    Storage,
    CopySource,
    CopyDest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceRef {
    Texture(TextureId),
    Buffer(BufferId),
}

impl From<TextureId> for ResourceRef {
    fn from(id: TextureId) -> Self {
        Self::Texture(id)
    }
}

impl From<BufferId> for ResourceRef {
    fn from(id: BufferId) -> Self {
        Self::Buffer(id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BeginMarker(String),
    EndMarker,
    Barrier {
        resource: ResourceRef,
        from: ResourceLayout,
        to: ResourceLayout,
    },
    UavBarrier(ResourceRef),
    SetViewport {
        width: u32,
        height: u32,
    },
    SetRenderTargets {
        colors: SmallVec<[DescriptorIndex; 4]>,
        depth: Option<DescriptorIndex>,
    },
    ClearRenderTarget {
        target: DescriptorIndex,
        color: [f32; 4],
    },
    ClearDepth {
        target: DescriptorIndex,
        depth: f32,
    },
    SetPipeline(PipelineId),
    PushConstants(Vec<u8>),
    Draw {
        vertex_count: u32,
        instance_count: u32,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    DispatchMesh {
        x: u32,
        y: u32,
        z: u32,
    },
    CopyTexture {
        src: TextureId,
        dst: TextureId,
    },
}

#[derive(Debug, Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
    layouts: FxHashMap<ResourceRef, ResourceLayout>,
    marker_depth: u32,
}

impl CommandBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Current recorded layout of `resource` (`Common` if never touched).
    #[must_use]
    pub fn layout(&self, resource: impl Into<ResourceRef>) -> ResourceLayout {
        self.layouts
            .get(&resource.into())
            .copied()
            .unwrap_or_default()
    }

    /// Resources left in a layout other than `Common`.
    #[must_use]
    pub fn outstanding_transitions(&self) -> Vec<ResourceRef> {
        self.layouts
            .iter()
            .filter(|(_, layout)| **layout != ResourceLayout::Common)
            .map(|(resource, _)| *resource)
            .collect()
    }

    /// Number of begin markers without a matching end.
    #[inline]
    #[must_use]
    pub fn open_markers(&self) -> u32 {
        self.marker_depth
    }

    // === Markers ===

    pub fn begin_marker(&mut self, name: &str) {
        self.marker_depth += 1;
        self.commands.push(Command::BeginMarker(name.to_owned()));
    }

    pub fn end_marker(&mut self) {
        debug_assert!(self.marker_depth > 0, "end_marker without begin_marker");
        self.marker_depth = self.marker_depth.saturating_sub(1);
        self.commands.push(Command::EndMarker);
    }

    // === Synchronization ===

    /// Transitions `resource` into `layout`. Redundant transitions are dropped.
    pub fn barrier(&mut self, resource: impl Into<ResourceRef>, layout: ResourceLayout) {
        let resource = resource.into();
        let from = self.layout(resource);
        if from == layout {
            return;
        }
        self.layouts.insert(resource, layout);
        self.commands.push(Command::Barrier {
            resource,
            from,
            to: layout,
        });
    }

    pub fn uav_barrier(&mut self, resource: impl Into<ResourceRef>) {
        self.commands.push(Command::UavBarrier(resource.into()));
    }

    // === State ===

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.commands.push(Command::SetViewport { width, height });
    }

    pub fn set_render_targets(&mut self, colors: &[DescriptorIndex], depth: Option<DescriptorIndex>) {
        self.commands.push(Command::SetRenderTargets {
            colors: colors.iter().copied().collect(),
            depth,
        });
    }

    pub fn clear_render_target(&mut self, target: DescriptorIndex, color: [f32; 4]) {
        self.commands.push(Command::ClearRenderTarget { target, color });
    }

    pub fn clear_depth(&mut self, target: DescriptorIndex, depth: f32) {
        self.commands.push(Command::ClearDepth { target, depth });
    }

    pub fn set_pipeline(&mut self, pipeline: PipelineId) {
        self.commands.push(Command::SetPipeline(pipeline));
    }

    pub fn push_constants<T: bytemuck::Pod>(&mut self, data: &T) {
        self.commands
            .push(Command::PushConstants(bytemuck::bytes_of(data).to_vec()));
    }

    // === Work ===

    pub fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        self.commands.push(Command::Draw {
            vertex_count,
            instance_count,
        });
    }

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.commands.push(Command::Dispatch { x, y, z });
    }

    pub fn dispatch_mesh(&mut self, x: u32, y: u32, z: u32) {
        self.commands.push(Command::DispatchMesh { x, y, z });
    }

    pub fn copy_texture(&mut self, src: TextureId, dst: TextureId) {
        self.commands.push(Command::CopyTexture { src, dst });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn redundant_barrier_is_dropped() {
        let mut ids: SlotMap<TextureId, ()> = SlotMap::with_key();
        let tex = ids.insert(());

        let mut cmd = CommandBuffer::new();
        cmd.barrier(tex, ResourceLayout::Shader);
        cmd.barrier(tex, ResourceLayout::Shader);
        assert_eq!(cmd.len(), 1);
        assert_eq!(cmd.outstanding_transitions(), vec![ResourceRef::Texture(tex)]);

        cmd.barrier(tex, ResourceLayout::Common);
        assert!(cmd.outstanding_transitions().is_empty());
        assert_eq!(
            cmd.commands()[1],
            Command::Barrier {
                resource: ResourceRef::Texture(tex),
                from: ResourceLayout::Shader,
                to: ResourceLayout::Common,
            }
        );
    }

    #[test]
    fn markers_are_counted() {
        let mut cmd = CommandBuffer::new();
        cmd.begin_marker("Outer");
        cmd.begin_marker("Inner");
        assert_eq!(cmd.open_markers(), 2);
        cmd.end_marker();
        cmd.end_marker();
        assert_eq!(cmd.open_markers(), 0);
    }
}
