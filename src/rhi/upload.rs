//! Deferred CPU → GPU uploads.
//!
//! Asset loading enqueues data here instead of writing straight to the
//! device. The renderer flushes the queue at the start of every frame, before
//! any pass records, so every buffer is populated before its first draw.

use super::{BufferId, Rhi, TextureId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadTarget {
    Buffer { buffer: BufferId, offset: u64 },
    Texture(TextureId),
}

#[derive(Debug)]
struct PendingUpload {
    target: UploadTarget,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct Uploader {
    pending: Vec<PendingUpload>,
    pending_bytes: u64,
}

impl Uploader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue_buffer(&mut self, buffer: BufferId, data: &[u8]) {
        self.push(UploadTarget::Buffer { buffer, offset: 0 }, data);
    }

    pub fn enqueue_texture(&mut self, texture: TextureId, data: &[u8]) {
        self.push(UploadTarget::Texture(texture), data);
    }

    fn push(&mut self, target: UploadTarget, data: &[u8]) {
        self.pending_bytes += data.len() as u64;
        self.pending.push(PendingUpload {
            target,
            data: data.to_vec(),
        });
    }

    #[inline]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    #[must_use]
    pub fn pending_bytes(&self) -> u64 {
        self.pending_bytes
    }

    /// Writes every queued upload to the device. Returns the number flushed.
    pub fn flush(&mut self, rhi: &mut dyn Rhi) -> usize {
        let count = self.pending.len();
        if count == 0 {
            return 0;
        }
        log::debug!("Flushing {count} uploads ({} bytes)", self.pending_bytes);

        for upload in self.pending.drain(..) {
            match upload.target {
                UploadTarget::Buffer { buffer, offset } => {
                    rhi.write_buffer(buffer, offset, &upload.data);
                }
                UploadTarget::Texture(texture) => rhi.write_texture(texture, &upload.data),
            }
        }
        self.pending_bytes = 0;
        count
    }
}
