//! Assets: readers, the ref-counted server, meshes and their meshlet data.

pub mod gltf_loader;
pub mod io;
pub mod mesh;
pub mod meshlet;
pub mod server;
pub mod texture;

pub use io::{AssetReader, FileAssetReader, MemoryAssetReader};
pub use mesh::{
    GpuBuffer, Material, MaterialGpuData, MaterialTexture, Mesh, MeshNode, MeshPrimitive,
    PrimitiveGpuData,
};
pub use meshlet::{
    MAX_MESHLET_TRIANGLES, MAX_MESHLET_VERTICES, Meshlet, MeshletBounds, MeshletData,
    MeshletLimits, Vertex, build_meshlets,
};
pub use server::{Asset, AssetServer};
pub use texture::Texture;
