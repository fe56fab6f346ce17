use crate::errors::Result;
use crate::rhi::{
    DescriptorIndex, Rhi, TextureDesc, TextureId, Uploader, ViewDesc, ViewType,
};

/// A sampled 2D texture owned by the asset server.
#[derive(Debug)]
pub struct Texture {
    pub id: TextureId,
    pub srv: DescriptorIndex,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

impl Texture {
    /// Decodes an encoded image (PNG, JPEG, HDR) and enqueues its upload.
    pub fn from_image_bytes(
        rhi: &mut dyn Rhi,
        uploader: &mut Uploader,
        label: &str,
        bytes: &[u8],
    ) -> Result<Self> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = image.dimensions();
        Ok(Self::from_rgba8(
            rhi,
            uploader,
            label,
            width,
            height,
            image.as_raw(),
        ))
    }

    /// Creates a texture from tightly packed RGBA8 pixels.
    pub fn from_rgba8(
        rhi: &mut dyn Rhi,
        uploader: &mut Uploader,
        label: &str,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Self {
        let format = wgpu::TextureFormat::Rgba8Unorm;
        let id = rhi.create_texture(&TextureDesc::new_2d(
            label,
            width,
            height,
            format,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        ));
        let srv = rhi
            .create_texture_view(id, &ViewDesc::new(ViewType::ShaderResource))
            .descriptor;
        uploader.enqueue_texture(id, pixels);
        Self {
            id,
            srv,
            width,
            height,
            format,
        }
    }

    pub fn destroy(&self, rhi: &mut dyn Rhi) {
        rhi.destroy_texture(self.id);
    }
}
