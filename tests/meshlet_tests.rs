//! Meshlet Builder Tests
//!
//! Tests for:
//! - Triangle conservation and per-meshlet limits
//! - Degenerate input (no triangles, no vertices, trailing indices), down to
//!   the uploaded primitive
//! - Index validation
//! - Meshlet count on a large grid, with default and widened limits
//! - Bounding spheres and normal cones
//! - Trimming of the auxiliary arrays

use glam::Vec3;

use ember::assets::{
    MAX_MESHLET_TRIANGLES, MAX_MESHLET_VERTICES, MeshPrimitive, MeshletData, MeshletLimits,
    Vertex, build_meshlets,
};
use ember::errors::EmberError;
use ember::rhi::{HeadlessRhi, INVALID_DESCRIPTOR, Uploader};

/// A flat `cols × rows` quad grid in the XZ plane with shared vertices,
/// wound so that every face normal is +Y.
fn grid(cols: u32, rows: u32) -> (Vec<Vertex>, Vec<u32>) {
    let mut vertices = Vec::new();
    for z in 0..=rows {
        for x in 0..=cols {
            vertices.push(Vertex::from_position(Vec3::new(x as f32, 0.0, z as f32)));
        }
    }
    let at = |x: u32, z: u32| z * (cols + 1) + x;
    let mut indices = Vec::new();
    for z in 0..rows {
        for x in 0..cols {
            indices.extend_from_slice(&[at(x, z), at(x, z + 1), at(x + 1, z)]);
            indices.extend_from_slice(&[at(x + 1, z), at(x, z + 1), at(x + 1, z + 1)]);
        }
    }
    (vertices, indices)
}

/// A closed box surface: six faces with outward normals.
fn cube() -> (Vec<Vertex>, Vec<u32>) {
    let p = [
        Vec3::new(-1.0, -1.0, -1.0),
        Vec3::new(1.0, -1.0, -1.0),
        Vec3::new(1.0, 1.0, -1.0),
        Vec3::new(-1.0, 1.0, -1.0),
        Vec3::new(-1.0, -1.0, 1.0),
        Vec3::new(1.0, -1.0, 1.0),
        Vec3::new(1.0, 1.0, 1.0),
        Vec3::new(-1.0, 1.0, 1.0),
    ];
    let vertices = p.iter().map(|&v| Vertex::from_position(v)).collect();
    let indices = vec![
        0, 2, 1, 0, 3, 2, // -Z
        4, 5, 6, 4, 6, 7, // +Z
        0, 1, 5, 0, 5, 4, // -Y
        3, 7, 6, 3, 6, 2, // +Y
        0, 4, 7, 0, 7, 3, // -X
        1, 2, 6, 1, 6, 5, // +X
    ];
    (vertices, indices)
}

fn assert_within_limits(data: &MeshletData, limits: &MeshletLimits) {
    for m in &data.meshlets {
        assert!(m.vertex_count as usize <= limits.max_vertices);
        assert!(m.triangle_count as usize <= limits.max_triangles);
        assert!(m.triangle_count > 0);
    }
}

// ============================================================================
// Conservation & Limits
// ============================================================================

#[test]
fn triangle_counts_sum_to_input() {
    let (vertices, indices) = grid(20, 20);
    let data = build_meshlets(&vertices, &indices, &MeshletLimits::default()).unwrap();

    assert_eq!(data.triangle_count(), indices.len() / 3);
    assert_within_limits(&data, &MeshletLimits::default());
}

#[test]
fn every_input_triangle_appears_once() {
    let (vertices, indices) = grid(12, 9);
    let data = build_meshlets(&vertices, &indices, &MeshletLimits::default()).unwrap();

    let sorted = |t: [u32; 3]| {
        let mut t = t;
        t.sort_unstable();
        t
    };
    let mut expected: Vec<[u32; 3]> = indices
        .chunks_exact(3)
        .map(|t| sorted([t[0], t[1], t[2]]))
        .collect();
    let mut produced = Vec::new();
    for i in 0..data.len() {
        let globals = data.vertices(i);
        for t in data.triangles(i).chunks_exact(3) {
            produced.push(sorted([
                globals[t[0] as usize],
                globals[t[1] as usize],
                globals[t[2] as usize],
            ]));
        }
    }
    expected.sort_unstable();
    produced.sort_unstable();
    assert_eq!(produced, expected);
}

#[test]
fn small_limits_are_respected() {
    let limits = MeshletLimits {
        max_vertices: 8,
        max_triangles: 8,
    };
    let (vertices, indices) = grid(10, 10);
    let data = build_meshlets(&vertices, &indices, &limits).unwrap();

    assert_within_limits(&data, &limits);
    assert_eq!(data.triangle_count(), 200);
}

#[test]
fn default_limits_match_constants() {
    let limits = MeshletLimits::default();
    assert_eq!(limits.max_vertices, MAX_MESHLET_VERTICES);
    assert_eq!(limits.max_triangles, MAX_MESHLET_TRIANGLES);
}

#[test]
fn invalid_limits_are_rejected() {
    let (vertices, indices) = grid(1, 1);
    for limits in [
        MeshletLimits {
            max_vertices: 256,
            max_triangles: 124,
        },
        MeshletLimits {
            max_vertices: 2,
            max_triangles: 124,
        },
        MeshletLimits {
            max_vertices: 64,
            max_triangles: 0,
        },
        MeshletLimits {
            max_vertices: 64,
            max_triangles: 126,
        },
        MeshletLimits {
            max_vertices: 64,
            max_triangles: 516,
        },
    ] {
        assert!(matches!(
            build_meshlets(&vertices, &indices, &limits),
            Err(EmberError::InvalidSettings(_))
        ));
    }
}

// ============================================================================
// Degenerate Input
// ============================================================================

#[test]
fn no_triangles_yields_empty_output() {
    let (vertices, _) = grid(2, 2);
    let data = build_meshlets(&vertices, &[], &MeshletLimits::default()).unwrap();

    assert!(data.is_empty());
    assert!(data.meshlet_vertices.is_empty());
    assert!(data.meshlet_triangles.is_empty());
    assert!(data.bounds.is_empty());
}

#[test]
fn no_vertices_yields_empty_output() {
    let data = build_meshlets(&[], &[0, 1, 2], &MeshletLimits::default()).unwrap();
    assert!(data.is_empty());
}

#[test]
fn empty_primitive_uploads_no_meshlet_buffers() {
    let mut rhi = HeadlessRhi::new();
    let mut uploader = Uploader::new();
    let (vertices, _) = grid(2, 2);

    let primitive = MeshPrimitive::from_geometry(
        &mut rhi,
        &mut uploader,
        "Empty",
        &vertices,
        &[],
        None,
        &MeshletLimits::default(),
    )
    .unwrap();

    assert_eq!(primitive.meshlet_count, 0);
    assert!(!primitive.is_drawable());
    assert!(primitive.index_buffer.is_none());
    assert!(primitive.meshlet_buffer.is_none());
    assert!(primitive.meshlet_vertex_buffer.is_none());
    assert!(primitive.meshlet_triangle_buffer.is_none());
    assert!(primitive.meshlet_bounds_buffer.is_none());
    assert_eq!(primitive.gpu_data().meshlets, INVALID_DESCRIPTOR);

    // Only the vertex data goes to the device
    let vertex_buffer = primitive.vertex_buffer.unwrap();
    assert!(rhi.contains_buffer(vertex_buffer.buffer));
    assert_eq!(rhi.live_buffers(), 1);
    assert_eq!(uploader.pending(), 1);
}

#[test]
fn trailing_indices_are_ignored() {
    let (vertices, mut indices) = grid(1, 1);
    indices.extend_from_slice(&[0, 1]);
    let data = build_meshlets(&vertices, &indices, &MeshletLimits::default()).unwrap();

    assert_eq!(data.triangle_count(), 2);
}

#[test]
fn out_of_range_index_is_an_error() {
    let (vertices, _) = grid(1, 1);
    let result = build_meshlets(&vertices, &[0, 1, 99], &MeshletLimits::default());
    assert!(matches!(result, Err(EmberError::InvalidMesh(_))));
}

// ============================================================================
// Large Mesh
// ============================================================================

#[test]
fn ten_thousand_triangles_fill_meshlets() {
    // 100 × 50 quads = 10 000 triangles; the vertex limit is lifted so only
    // the triangle limit closes meshlets.
    let (vertices, indices) = grid(100, 50);
    assert_eq!(indices.len() / 3, 10_000);

    let limits = MeshletLimits {
        max_vertices: 255,
        max_triangles: 124,
    };
    let data = build_meshlets(&vertices, &indices, &limits).unwrap();

    let minimum = 10_000usize.div_ceil(124);
    assert!(
        (minimum..=minimum + 1).contains(&data.len()),
        "expected {minimum} or {} meshlets, got {}",
        minimum + 1,
        data.len()
    );
    assert_eq!(data.triangle_count(), 10_000);
    assert_within_limits(&data, &limits);
}

#[test]
fn default_limits_split_large_grid_by_vertex_budget() {
    let (vertices, indices) = grid(100, 50);
    let limits = MeshletLimits::default();
    let data = build_meshlets(&vertices, &indices, &limits).unwrap();

    assert_eq!(data.triangle_count(), 10_000);
    assert_within_limits(&data, &limits);

    // A planar patch of V vertices holds at most 2V - 5 triangles, so 64
    // vertices never reach the 124-triangle limit and the vertex budget
    // closes every meshlet. A meshlet closes only once the next triangle
    // would push it past 64 vertices, so it already holds at least 62, and
    // each triangle brings at most 3: every meshlet but the last carries at
    // least 21 triangles.
    let lower = 10_000usize.div_ceil(MAX_MESHLET_TRIANGLES);
    let upper = 10_000usize.div_ceil(21) + 1;
    assert!(
        (lower..=upper).contains(&data.len()),
        "expected {lower}..={upper} meshlets, got {}",
        data.len()
    );
    assert!(
        data.meshlets
            .iter()
            .all(|m| (m.triangle_count as usize) < MAX_MESHLET_TRIANGLES)
    );
}

// ============================================================================
// Layout
// ============================================================================

#[test]
fn arrays_are_trimmed_to_last_meshlet() {
    let (vertices, indices) = grid(16, 16);
    let data = build_meshlets(&vertices, &indices, &MeshletLimits::default()).unwrap();

    let last = data.meshlets.last().unwrap();
    assert_eq!(
        data.meshlet_vertices.len(),
        (last.vertex_offset + last.vertex_count) as usize
    );
    assert_eq!(
        data.meshlet_triangles.len(),
        (last.triangle_offset + last.padded_triangle_bytes()) as usize
    );
    assert_eq!(data.bounds.len(), data.meshlets.len());
}

#[test]
fn triangle_runs_are_four_byte_aligned() {
    let (vertices, indices) = grid(9, 7);
    let data = build_meshlets(&vertices, &indices, &MeshletLimits::default()).unwrap();

    for m in &data.meshlets {
        assert_eq!(m.triangle_offset % 4, 0);
    }
    assert_eq!(data.triangles_u32().len(), data.meshlet_triangles.len());
}

#[test]
fn local_indices_stay_inside_meshlet() {
    let (vertices, indices) = grid(8, 8);
    let data = build_meshlets(&vertices, &indices, &MeshletLimits::default()).unwrap();

    for (i, m) in data.meshlets.iter().enumerate() {
        assert!(
            data.triangles(i)
                .iter()
                .all(|&local| u32::from(local) < m.vertex_count)
        );
    }
}

// ============================================================================
// Bounds
// ============================================================================

#[test]
fn bounding_spheres_contain_their_vertices() {
    let (vertices, indices) = grid(24, 24);
    let data = build_meshlets(&vertices, &indices, &MeshletLimits::default()).unwrap();

    for (i, bounds) in data.bounds.iter().enumerate() {
        for &v in data.vertices(i) {
            let d = vertices[v as usize].position.distance(bounds.center);
            assert!(
                d <= bounds.radius + 1e-4,
                "meshlet {i}: vertex {v} at distance {d} outside radius {}",
                bounds.radius
            );
        }
    }
}

#[test]
fn flat_meshlet_cone_axis_is_plane_normal() {
    let (vertices, indices) = grid(4, 4);
    let data = build_meshlets(&vertices, &indices, &MeshletLimits::default()).unwrap();

    for bounds in &data.bounds {
        assert!(!bounds.is_cone_degenerate());
        assert!(bounds.cone_axis.abs_diff_eq(Vec3::Y, 1e-5));
        assert!(bounds.cone_cutoff.abs() < 1e-3);
    }
}

#[test]
fn closed_surface_has_degenerate_cone() {
    let (vertices, indices) = cube();
    let data = build_meshlets(&vertices, &indices, &MeshletLimits::default()).unwrap();

    assert_eq!(data.len(), 1);
    let bounds = &data.bounds[0];
    assert!(bounds.is_cone_degenerate());
    assert!((bounds.cone_cutoff - 1.0).abs() < f32::EPSILON);
    assert_eq!(bounds.cone_apex, bounds.center);
}
