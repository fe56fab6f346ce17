//! Meshlet Builder Benchmarks
//!
//! Measures meshlet generation for flat grids of increasing size, with the
//! default limits and with a large vertex budget.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use glam::{Vec2, Vec3};

use ember::assets::{MeshletLimits, Vertex, build_meshlets};

fn grid(cols: u32, rows: u32) -> (Vec<Vertex>, Vec<u32>) {
    let mut vertices = Vec::with_capacity(((cols + 1) * (rows + 1)) as usize);
    for z in 0..=rows {
        for x in 0..=cols {
            vertices.push(Vertex {
                position: Vec3::new(x as f32, 0.0, z as f32),
                normal: Vec3::Y,
                uv: Vec2::new(x as f32 / cols as f32, z as f32 / rows as f32),
                ..Vertex::default()
            });
        }
    }

    let at = |x: u32, z: u32| z * (cols + 1) + x;
    let mut indices = Vec::with_capacity((cols * rows * 6) as usize);
    for z in 0..rows {
        for x in 0..cols {
            indices.extend_from_slice(&[at(x, z), at(x, z + 1), at(x + 1, z)]);
            indices.extend_from_slice(&[at(x + 1, z), at(x, z + 1), at(x + 1, z + 1)]);
        }
    }
    (vertices, indices)
}

fn bench_build_meshlets(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_meshlets");

    for (cols, rows) in [(16, 16), (64, 64), (100, 50), (256, 128)] {
        let (vertices, indices) = grid(cols, rows);
        let triangles = indices.len() / 3;
        group.throughput(Throughput::Elements(triangles as u64));

        group.bench_with_input(
            BenchmarkId::new("default_limits", triangles),
            &(&vertices, &indices),
            |b, (vertices, indices)| {
                let limits = MeshletLimits::default();
                b.iter(|| build_meshlets(black_box(vertices), black_box(indices), &limits));
            },
        );

        group.bench_with_input(
            BenchmarkId::new("wide_vertex_budget", triangles),
            &(&vertices, &indices),
            |b, (vertices, indices)| {
                let limits = MeshletLimits {
                    max_vertices: 255,
                    ..MeshletLimits::default()
                };
                b.iter(|| build_meshlets(black_box(vertices), black_box(indices), &limits));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_build_meshlets);
criterion_main!(benches);
