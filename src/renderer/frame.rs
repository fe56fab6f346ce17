use crate::rhi::{CommandBuffer, FRAMES_IN_FLIGHT, TextureId};

/// Per-frame recording context. Not persisted across frames.
#[derive(Debug)]
pub struct Frame {
    pub commands: CommandBuffer,
    /// Ring buffer slot, always `< FRAMES_IN_FLIGHT`.
    pub frame_index: usize,
    pub width: u32,
    pub height: u32,
    /// Swapchain image to present into, if any.
    pub back_buffer: Option<TextureId>,
    /// Seconds since start, for animated effects.
    pub time: f32,
}

impl Frame {
    #[must_use]
    pub fn new(frame_number: u64, width: u32, height: u32) -> Self {
        Self {
            commands: CommandBuffer::new(),
            frame_index: (frame_number % FRAMES_IN_FLIGHT as u64) as usize,
            width,
            height,
            back_buffer: None,
            time: 0.0,
        }
    }

    #[must_use]
    pub fn with_back_buffer(mut self, texture: TextureId) -> Self {
        self.back_buffer = Some(texture);
        self
    }

    #[must_use]
    pub fn with_time(mut self, time: f32) -> Self {
        self.time = time;
        self
    }

    /// Thread groups needed to cover the frame with `group`×`group` tiles.
    #[inline]
    #[must_use]
    pub fn groups(&self, group: u32) -> (u32, u32) {
        (self.width.div_ceil(group), self.height.div_ceil(group))
    }
}
