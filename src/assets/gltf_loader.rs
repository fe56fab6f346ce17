//! glTF 2.0 import into [`Mesh`] trees.
//!
//! Only triangle-list primitives are imported. Each primitive is turned into
//! meshlets immediately; material textures are loaded through the asset
//! server so they are shared and reference-counted across meshes.

use glam::{Mat4, Vec2, Vec3, Vec4};

use super::io::resolve_relative;
use super::mesh::{Material, MaterialTexture, Mesh, MeshNode, MeshPrimitive};
use super::meshlet::Vertex;
use super::server::AssetServer;
use crate::errors::{EmberError, Result};
use crate::rhi::{Rhi, Uploader};

struct ImportContext<'a> {
    path: &'a str,
    buffers: Vec<Vec<u8>>,
}

pub fn load_gltf(
    server: &mut AssetServer,
    rhi: &mut dyn Rhi,
    uploader: &mut Uploader,
    path: &str,
    bytes: &[u8],
) -> Result<Mesh> {
    let gltf = gltf::Gltf::from_slice(bytes)?;

    let mut buffers = Vec::with_capacity(gltf.buffers().len());
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf.blob.as_deref().ok_or_else(|| {
                    EmberError::InvalidMesh(format!("'{path}' references a missing GLB chunk"))
                })?;
                buffers.push(blob.to_vec());
            }
            gltf::buffer::Source::Uri(uri) => {
                buffers.push(server.read_bytes(&resolve_relative(path, uri))?);
            }
        }
    }
    let ctx = ImportContext { path, buffers };

    let materials = gltf
        .materials()
        .map(|m| load_material(server, rhi, uploader, &ctx, &m))
        .collect();

    let mut root = MeshNode {
        name: path.to_owned(),
        transform: Mat4::IDENTITY,
        ..MeshNode::default()
    };
    if let Some(scene) = gltf.default_scene().or_else(|| gltf.scenes().next()) {
        for node in scene.nodes() {
            root.children
                .push(load_node(rhi, uploader, server, &ctx, &node)?);
        }
    }

    Ok(Mesh {
        path: path.to_owned(),
        root,
        materials,
    })
}

fn load_node(
    rhi: &mut dyn Rhi,
    uploader: &mut Uploader,
    server: &AssetServer,
    ctx: &ImportContext<'_>,
    node: &gltf::Node<'_>,
) -> Result<MeshNode> {
    let name = node
        .name()
        .map_or_else(|| format!("Node{}", node.index()), str::to_owned);

    let mut primitives = Vec::new();
    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!(
                    "{}: skipping primitive {} of '{name}' with mode {:?}",
                    ctx.path,
                    primitive.index(),
                    primitive.mode()
                );
                continue;
            }
            let label = format!("{}/{name}/{}", ctx.path, primitive.index());
            primitives.push(load_primitive(rhi, uploader, server, ctx, &primitive, &label)?);
        }
    }

    let mut children = Vec::new();
    for child in node.children() {
        children.push(load_node(rhi, uploader, server, ctx, &child)?);
    }

    Ok(MeshNode {
        name,
        transform: Mat4::from_cols_array_2d(&node.transform().matrix()),
        children,
        primitives,
    })
}

fn load_primitive(
    rhi: &mut dyn Rhi,
    uploader: &mut Uploader,
    server: &AssetServer,
    ctx: &ImportContext<'_>,
    primitive: &gltf::Primitive<'_>,
    label: &str,
) -> Result<MeshPrimitive> {
    let reader = primitive.reader(|b| ctx.buffers.get(b.index()).map(Vec::as_slice));

    let positions: Vec<Vec3> = reader
        .read_positions()
        .ok_or_else(|| EmberError::InvalidMesh(format!("{label}: missing POSITION")))?
        .map(Vec3::from)
        .collect();
    let normals: Option<Vec<Vec3>> = reader.read_normals().map(|n| n.map(Vec3::from).collect());
    let uvs: Option<Vec<Vec2>> = reader
        .read_tex_coords(0)
        .map(|t| t.into_f32().map(Vec2::from).collect());
    let tangents: Option<Vec<Vec4>> = reader.read_tangents().map(|t| t.map(Vec4::from).collect());

    let vertices: Vec<Vertex> = positions
        .iter()
        .enumerate()
        .map(|(i, &position)| {
            let normal = normals
                .as_ref()
                .and_then(|n| n.get(i).copied())
                .unwrap_or(Vec3::Y);
            let uv = uvs.as_ref().and_then(|u| u.get(i).copied()).unwrap_or_default();
            let (tangent, bitangent) = tangents
                .as_ref()
                .and_then(|t| t.get(i).copied())
                .map_or((Vec3::ZERO, Vec3::ZERO), |t| {
                    let tangent = t.truncate();
                    (tangent, normal.cross(tangent) * t.w)
                });
            Vertex {
                position,
                normal,
                uv,
                tangent,
                bitangent,
            }
        })
        .collect();

    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..vertices.len() as u32).collect(),
    };

    MeshPrimitive::from_geometry(
        rhi,
        uploader,
        label,
        &vertices,
        &indices,
        primitive.material().index(),
        server.meshlet_limits(),
    )
}

fn load_material(
    server: &mut AssetServer,
    rhi: &mut dyn Rhi,
    uploader: &mut Uploader,
    ctx: &ImportContext<'_>,
    material: &gltf::Material<'_>,
) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let mut load = |texture: Option<gltf::Texture<'_>>| {
        load_material_texture(server, rhi, uploader, ctx, texture?)
    };

    Material {
        name: material.name().unwrap_or_default().to_owned(),
        base_color: Vec4::from(pbr.base_color_factor()),
        metallic: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
        albedo: load(pbr.base_color_texture().map(|i| i.texture())),
        normal: load(material.normal_texture().map(|n| n.texture())),
        metallic_roughness: load(pbr.metallic_roughness_texture().map(|i| i.texture())),
    }
}

/// Failed texture loads are logged and leave the slot empty.
fn load_material_texture(
    server: &mut AssetServer,
    rhi: &mut dyn Rhi,
    uploader: &mut Uploader,
    ctx: &ImportContext<'_>,
    texture: gltf::Texture<'_>,
) -> Option<MaterialTexture> {
    let image = texture.source();
    let result = match image.source() {
        gltf::image::Source::Uri { uri, .. } => {
            let path = resolve_relative(ctx.path, uri);
            server
                .load_texture(rhi, uploader, &path)
                .map(|texture| MaterialTexture { path, texture })
        }
        gltf::image::Source::View { view, .. } => {
            let key = format!("{}#image{}", ctx.path, image.index());
            let bytes = ctx
                .buffers
                .get(view.buffer().index())
                .and_then(|b| b.get(view.offset()..view.offset() + view.length()));
            match bytes {
                Some(bytes) => server
                    .load_texture_bytes(rhi, uploader, &key, bytes)
                    .map(|texture| MaterialTexture { path: key, texture }),
                None => Err(EmberError::AssetIndexOutOfBounds {
                    context: format!("{} image {}", ctx.path, image.index()),
                    index: view.buffer().index(),
                }),
            }
        }
    };
    result
        .map_err(|e| log::error!("{}: texture {} not loaded: {e}", ctx.path, texture.index()))
        .ok()
}
