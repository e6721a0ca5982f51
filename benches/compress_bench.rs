// In meshpack-core/benches/compress_bench.rs

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use meshpack::{
    analyze_stream, compress_stream, ColorArray, CompressorConfig, ElementStream,
    GeometryCompressor, MeshReusePolicy, VertexArrays,
};

// --- MOCK MESH GENERATION ---

/// A jittered `n x n` height-field grid with per-vertex normals and colors.
struct GridMesh {
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    colors: Vec<[f32; 3]>,
    indices: Vec<u32>,
}

fn generate_grid(n: u32, seed: u64) -> GridMesh {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut mesh = GridMesh {
        positions: Vec::new(),
        normals: Vec::new(),
        colors: Vec::new(),
        indices: Vec::new(),
    };
    for j in 0..n {
        for i in 0..n {
            let h: f32 = rng.random_range(-0.25..0.25);
            mesh.positions.push([i as f32, j as f32, h]);
            let (nx, ny) = (rng.random_range(-0.3..0.3), rng.random_range(-0.3..0.3));
            let len = (nx * nx + ny * ny + 1.0f32).sqrt();
            mesh.normals.push([nx / len, ny / len, 1.0 / len]);
            mesh.colors.push([rng.random(), rng.random(), rng.random()]);
        }
    }
    for j in 0..n - 1 {
        for i in 0..n - 1 {
            let a = j * n + i;
            let (b, c) = (a + 1, a + n);
            mesh.indices.extend_from_slice(&[a, b, c, c, b, c + 1]);
        }
    }
    mesh
}

fn build_stream(mesh: &GridMesh, policy: MeshReusePolicy) -> ElementStream {
    let arrays = VertexArrays::new(&mesh.positions)
        .with_normals(&mesh.normals)
        .with_colors(ColorArray::Rgb(&mesh.colors));
    let mut stream = ElementStream::with_policy(policy);
    stream.add_indexed_triangles(arrays, &mesh.indices).unwrap();
    stream
}

// --- Benchmark Suite ---

const GRID_SIDE: u32 = 64;

fn bench_compress(c: &mut Criterion) {
    let mesh = generate_grid(GRID_SIDE, 42);
    let by_index = build_stream(&mesh, MeshReusePolicy::ByIndex);
    let no_reuse = build_stream(&mesh, MeshReusePolicy::None);

    let mut group = c.benchmark_group("Geometry Compression");
    group.throughput(Throughput::Elements(mesh.indices.len() as u64));

    group.bench_function("Compress [1] Stateless (ByIndex)", |b| {
        b.iter(|| black_box(compress_stream(black_box(&by_index)).unwrap()))
    });
    group.bench_function("Compress [2] Stateless (No Reuse)", |b| {
        b.iter(|| black_box(compress_stream(black_box(&no_reuse)).unwrap()))
    });

    let mut compressor = GeometryCompressor::new(CompressorConfig::default()).unwrap();
    group.bench_function("Compress [3] Reused Compressor (ByIndex)", |b| {
        b.iter(|| black_box(compressor.compress(black_box(&by_index)).unwrap()))
    });

    group.bench_function("Build [1] Indexed Stream (ByValue)", |b| {
        b.iter(|| black_box(build_stream(black_box(&mesh), MeshReusePolicy::ByValue)))
    });

    let compressed = compress_stream(&by_index).unwrap();
    group.throughput(Throughput::Bytes(compressed.bytes.len() as u64));
    group.bench_function("Analyze [1] Walk Command Stream", |b| {
        b.iter(|| black_box(analyze_stream(black_box(&compressed.bytes)).unwrap()))
    });

    group.finish();
}

criterion_group!(benches, bench_compress);
criterion_main!(benches);
