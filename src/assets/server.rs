//! Asset Server
//!
//! Path-keyed, reference-counted cache for shaders, textures, meshes and
//! post-process volumes. Every successful `load_*` call takes one reference;
//! [`AssetServer::give_back`] drops one and hands the asset back to the caller
//! when the count reaches zero, so the caller can retire its GPU state at a
//! safe point.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::gltf_loader;
use super::io::AssetReader;
use super::mesh::Mesh;
use super::meshlet::MeshletLimits;
use super::texture::Texture;
use crate::errors::{EmberError, Result};
use crate::renderer::post_process::PostProcessVolume;
use crate::rhi::{Rhi, Shader, ShaderStage, Uploader};

/// A cached asset of any kind.
#[derive(Debug, Clone)]
pub enum Asset {
    Shader(Arc<Shader>),
    Texture(Arc<Texture>),
    Mesh(Arc<Mesh>),
    Volume(Arc<PostProcessVolume>),
}

impl Asset {
    fn kind(&self) -> &'static str {
        match self {
            Self::Shader(_) => "shader",
            Self::Texture(_) => "texture",
            Self::Mesh(_) => "mesh",
            Self::Volume(_) => "post-process volume",
        }
    }
}

struct Entry {
    asset: Asset,
    refs: usize,
}

pub struct AssetServer {
    reader: Box<dyn AssetReader>,
    cache: FxHashMap<String, Entry>,
    meshlet_limits: MeshletLimits,
}

impl AssetServer {
    pub fn new(reader: impl AssetReader + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            cache: FxHashMap::default(),
            meshlet_limits: MeshletLimits::default(),
        }
    }

    #[must_use]
    pub fn with_meshlet_limits(mut self, limits: MeshletLimits) -> Self {
        self.meshlet_limits = limits;
        self
    }

    pub fn set_meshlet_limits(&mut self, limits: MeshletLimits) {
        self.meshlet_limits = limits;
    }

    #[inline]
    #[must_use]
    pub fn meshlet_limits(&self) -> &MeshletLimits {
        &self.meshlet_limits
    }

    pub fn read_bytes(&self, uri: &str) -> Result<Vec<u8>> {
        self.reader.read_bytes(uri)
    }

    // === Cache ===

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    #[must_use]
    pub fn ref_count(&self, path: &str) -> usize {
        self.cache.get(path).map_or(0, |e| e.refs)
    }

    /// Takes a reference on a cached asset of the expected kind.
    fn acquire<T>(
        &mut self,
        path: &str,
        expected: &'static str,
        extract: impl FnOnce(&Asset) -> Option<Arc<T>>,
    ) -> Result<Option<Arc<T>>> {
        let Some(entry) = self.cache.get_mut(path) else {
            return Ok(None);
        };
        match extract(&entry.asset) {
            Some(asset) => {
                entry.refs += 1;
                Ok(Some(asset))
            }
            None => {
                log::error!(
                    "'{path}' is cached as a {}, requested as {expected}",
                    entry.asset.kind()
                );
                Err(EmberError::AssetTypeMismatch {
                    path: path.to_owned(),
                    expected,
                })
            }
        }
    }

    fn store(&mut self, path: &str, asset: Asset) {
        self.cache.insert(path.to_owned(), Entry { asset, refs: 1 });
    }

    /// Drops one reference. Returns the asset once nothing references it.
    pub fn give_back(&mut self, path: &str) -> Option<Asset> {
        let entry = self.cache.get_mut(path)?;
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs > 0 {
            return None;
        }
        log::debug!("Asset '{path}' released");
        self.cache.remove(path).map(|e| e.asset)
    }

    /// Evicts every entry regardless of its reference count, for teardown.
    pub fn drain(&mut self) -> Vec<Asset> {
        let assets: Vec<Asset> = self.cache.drain().map(|(_, e)| e.asset).collect();
        if !assets.is_empty() {
            log::debug!("Evicted {} cached assets", assets.len());
        }
        assets
    }

    // === Loaders ===

    pub fn load_shader(&mut self, path: &str) -> Result<Arc<Shader>> {
        if let Some(shader) = self.acquire(path, "shader", |a| match a {
            Asset::Shader(s) => Some(Arc::clone(s)),
            _ => None,
        })? {
            return Ok(shader);
        }

        let stage = ShaderStage::from_path(path).ok_or_else(|| EmberError::AssetTypeMismatch {
            path: path.to_owned(),
            expected: "shader named <name>.<as|ms|vs|ps|cs>.<ext>",
        })?;
        let bytecode = self.reader.read_bytes(path)?;
        let shader = Arc::new(Shader {
            path: path.to_owned(),
            stage,
            bytecode,
        });
        self.store(path, Asset::Shader(Arc::clone(&shader)));
        Ok(shader)
    }

    pub fn load_texture(
        &mut self,
        rhi: &mut dyn Rhi,
        uploader: &mut Uploader,
        path: &str,
    ) -> Result<Arc<Texture>> {
        if let Some(texture) = self.acquire(path, "texture", |a| match a {
            Asset::Texture(t) => Some(Arc::clone(t)),
            _ => None,
        })? {
            return Ok(texture);
        }
        let bytes = self.reader.read_bytes(path)?;
        self.insert_texture(rhi, uploader, path, &bytes)
    }

    /// Like [`load_texture`](Self::load_texture) for images embedded in
    /// another asset; `key` names the cache entry.
    pub fn load_texture_bytes(
        &mut self,
        rhi: &mut dyn Rhi,
        uploader: &mut Uploader,
        key: &str,
        bytes: &[u8],
    ) -> Result<Arc<Texture>> {
        if let Some(texture) = self.acquire(key, "texture", |a| match a {
            Asset::Texture(t) => Some(Arc::clone(t)),
            _ => None,
        })? {
            return Ok(texture);
        }
        self.insert_texture(rhi, uploader, key, bytes)
    }

    fn insert_texture(
        &mut self,
        rhi: &mut dyn Rhi,
        uploader: &mut Uploader,
        key: &str,
        bytes: &[u8],
    ) -> Result<Arc<Texture>> {
        let texture = Arc::new(Texture::from_image_bytes(rhi, uploader, key, bytes)?);
        self.store(key, Asset::Texture(Arc::clone(&texture)));
        Ok(texture)
    }

    /// Loads a glTF/GLB file, building meshlets for every primitive.
    pub fn load_mesh(
        &mut self,
        rhi: &mut dyn Rhi,
        uploader: &mut Uploader,
        path: &str,
    ) -> Result<Arc<Mesh>> {
        if let Some(mesh) = self.acquire(path, "mesh", |a| match a {
            Asset::Mesh(m) => Some(Arc::clone(m)),
            _ => None,
        })? {
            return Ok(mesh);
        }

        let bytes = self.reader.read_bytes(path)?;
        let mesh = gltf_loader::load_gltf(self, rhi, uploader, path, &bytes).map_err(|e| {
            log::error!("Failed to load mesh '{path}': {e}");
            e
        })?;
        log::info!(
            "Loaded mesh '{path}': {} primitives, {} meshlets",
            mesh.primitive_count(),
            mesh.meshlet_count()
        );
        let mesh = Arc::new(mesh);
        self.store(path, Asset::Mesh(Arc::clone(&mesh)));
        Ok(mesh)
    }

    pub fn load_volume(&mut self, path: &str) -> Result<Arc<PostProcessVolume>> {
        if let Some(volume) = self.acquire(path, "post-process volume", |a| match a {
            Asset::Volume(v) => Some(Arc::clone(v)),
            _ => None,
        })? {
            return Ok(volume);
        }
        let bytes = self.reader.read_bytes(path)?;
        let volume = Arc::new(PostProcessVolume::from_slice(&bytes)?);
        self.store(path, Asset::Volume(Arc::clone(&volume)));
        Ok(volume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryAssetReader;
    use crate::rhi::HeadlessRhi;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbaImage::from_pixel(width, height, image::Rgba([255, 0, 0, 255]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        image
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    #[test]
    fn repeated_loads_share_one_entry() {
        let mut rhi = HeadlessRhi::new();
        let mut uploader = Uploader::new();
        let mut server = AssetServer::new(MemoryAssetReader::new().with("a.png", png(2, 2)));

        let a = server.load_texture(&mut rhi, &mut uploader, "a.png").unwrap();
        let b = server.load_texture(&mut rhi, &mut uploader, "a.png").unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(server.ref_count("a.png"), 2);
        assert_eq!(rhi.live_textures(), 1);
        assert_eq!(uploader.pending(), 1);
    }

    #[test]
    fn give_back_returns_asset_on_last_reference() {
        let mut rhi = HeadlessRhi::new();
        let mut uploader = Uploader::new();
        let mut server = AssetServer::new(MemoryAssetReader::new().with("a.png", png(1, 1)));
        server.load_texture(&mut rhi, &mut uploader, "a.png").unwrap();
        server.load_texture(&mut rhi, &mut uploader, "a.png").unwrap();

        assert!(server.give_back("a.png").is_none());
        assert!(matches!(server.give_back("a.png"), Some(Asset::Texture(_))));
        assert!(server.is_empty());
        assert!(server.give_back("a.png").is_none());
    }

    #[test]
    fn kind_mismatch_is_an_error() {
        let mut rhi = HeadlessRhi::new();
        let mut uploader = Uploader::new();
        let mut server = AssetServer::new(MemoryAssetReader::new().with("a.png", png(1, 1)));
        server.load_texture(&mut rhi, &mut uploader, "a.png").unwrap();

        assert!(matches!(
            server.load_volume("a.png"),
            Err(EmberError::AssetTypeMismatch { .. })
        ));
    }

    #[test]
    fn shader_stage_comes_from_file_name() {
        let mut server = AssetServer::new(
            MemoryAssetReader::new()
                .with("shaders/fxaa.cs.cso", vec![1, 2, 3])
                .with("shaders/fxaa.bin", vec![1]),
        );

        let shader = server.load_shader("shaders/fxaa.cs.cso").unwrap();
        assert_eq!(shader.stage, ShaderStage::Compute);
        assert_eq!(shader.bytecode, vec![1, 2, 3]);
        assert!(server.load_shader("shaders/fxaa.bin").is_err());
    }

    #[test]
    fn missing_file_is_reported() {
        let mut server = AssetServer::new(MemoryAssetReader::new());
        assert!(matches!(
            server.load_shader("shaders/none.ps.cso"),
            Err(EmberError::AssetNotFound(_))
        ));
    }

    #[test]
    fn drain_evicts_referenced_entries() {
        let mut server = AssetServer::new(
            MemoryAssetReader::new().with("v.json", br#"{}"#.to_vec()),
        );
        server.load_volume("v.json").unwrap();
        server.load_volume("v.json").unwrap();

        assert_eq!(server.drain().len(), 1);
        assert!(server.is_empty());
    }
}
