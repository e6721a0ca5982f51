// Integration tests for the whole compression path: element stream in,
// padded command stream out, checked with the structural walker.
use super::*;

use crate::bridge::stateless_api::analyze_stream;
use crate::config::CompressorConfig;
use crate::pipeline::huffman::{TableKind, MAX_TAG_LENGTH, MIN_SUBCOMMAND_BITS};
use crate::types::{BufferType, ColorArray, ElementStream, QuantizationTarget, VertexArrays};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

//==============================================================================
// Helpers
//==============================================================================

fn unit(v: [f32; 3]) -> [f32; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    [v[0] / len, v[1] / len, v[2] / len]
}

/// A seeded random indexed mesh with normals and RGB colors.
fn random_mesh(rng: &mut StdRng, vertices: usize, triangles: usize) -> ElementStream {
    let positions: Vec<[f32; 3]> = (0..vertices)
        .map(|_| {
            [
                rng.random_range(-50.0..50.0),
                rng.random_range(-5.0..5.0),
                rng.random_range(0.0..1.0),
            ]
        })
        .collect();
    let normals: Vec<[f32; 3]> = (0..vertices)
        .map(|_| {
            unit([
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(0.1..1.0),
            ])
        })
        .collect();
    let colors: Vec<[f32; 3]> = (0..vertices)
        .map(|_| [rng.random(), rng.random(), rng.random()])
        .collect();
    // Indices cluster around a moving window so that mesh references occur.
    let indices: Vec<u32> = (0..triangles * 3)
        .map(|i| {
            let base = (i / 3).min(vertices - 8);
            (base + rng.random_range(0..8)) as u32
        })
        .collect();

    let arrays = VertexArrays::new(&positions)
        .with_normals(&normals)
        .with_colors(ColorArray::Rgb(&colors));
    let mut stream = ElementStream::new();
    stream
        .add_indexed_triangles(arrays, &indices)
        .expect("random mesh is well-formed");
    stream
}

fn assert_tags_legal(state: &PipelineState) {
    for kind in [TableKind::Position, TableKind::Color, TableKind::Normal] {
        for d in state.tables.table(kind).leaves() {
            assert!(d.tag_length <= MAX_TAG_LENGTH, "{:?}: {:?}", kind, d);
            assert!(
                d.tag_length + kind.component_count() * d.component_bits() >= MIN_SUBCOMMAND_BITS,
                "{:?}: {:?}",
                kind,
                d
            );
        }
    }
}

//==============================================================================
// Tests
//==============================================================================

#[test]
fn test_empty_stream_is_one_padded_word() {
    let mut state = PipelineState::default();
    let geometry = compress(&ElementStream::new(), &CompressorConfig::default(), &mut state)
        .expect("empty stream compresses");

    assert_eq!(geometry.bytes.len(), 8);
    assert_eq!(geometry.header.size, 8);
    assert_eq!(geometry.header.buffer_type, BufferType::Triangle);
    assert_eq!(geometry.header.bundling_flags, 0);

    let stats = analyze_stream(&geometry.bytes).unwrap();
    assert_eq!(stats.set_states, 1);
    assert_eq!(stats.table_entries, [0, 0, 0]);
    assert_eq!(stats.vertices, 0);
}

#[test]
fn test_random_meshes_are_aligned_and_walkable() {
    let mut rng = StdRng::seed_from_u64(0x6E0_5EED);
    let mut state = PipelineState::new(16);
    for round in 0..25 {
        let vertices = rng.random_range(8..200);
        let triangles = rng.random_range(1..300);
        let stream = random_mesh(&mut rng, vertices, triangles);

        let geometry = compress(&stream, &CompressorConfig::default(), &mut state).unwrap();
        assert_eq!(geometry.bytes.len() % 8, 0, "round {}", round);
        assert_eq!(geometry.header.size, geometry.bytes.len());
        assert!(state.writer.check_finished().is_ok());
        assert_eq!(state.writer.byte_length(), geometry.bytes.len());
        // Nothing is written past the logical end.
        assert!(state.writer.raw_bytes()[geometry.bytes.len()..]
            .iter()
            .all(|&b| b == 0));
        assert_tags_legal(&state);

        let stats = analyze_stream(&geometry.bytes).unwrap();
        assert_eq!(stats.vertices, stream.vertex_count(), "round {}", round);
        assert_eq!(stats.mesh_references, stream.mesh_reference_count());
        assert_eq!(stats.bundling_flags, 0x03);
    }
}

#[test]
fn test_skewed_deltas_with_a_zero_step_stay_walkable() {
    // On [0, 65534] at 16 bits, model x maps exactly to quantized x - 32767.
    let mut x = 0.0f32;
    let mut positions = vec![[x, 0.0, 0.0]];
    for (step, times) in [(17.0, 13), (9.0, 8), (5.0, 5), (3.0, 3), (1.0, 1), (0.0, 1)] {
        for _ in 0..times {
            x += step;
            positions.push([x, 0.0, 0.0]);
        }
    }
    positions.push([65534.0, 0.0, 0.0]);

    let mut stream = ElementStream::new();
    stream.add_points(VertexArrays::new(&positions)).unwrap();
    let mut state = PipelineState::default();
    let geometry = compress(&stream, &CompressorConfig::default(), &mut state).unwrap();

    assert!(state
        .tables
        .position
        .leaves()
        .all(|d| (1..=16).contains(&d.data_length)));
    let stats = analyze_stream(&geometry.bytes).unwrap();
    assert_eq!(stats.vertices, 33);
    assert_eq!(stats.total_bytes, geometry.bytes.len());
}

#[test]
fn test_header_bounds_are_normalized() {
    let mut rng = StdRng::seed_from_u64(7);
    let stream = random_mesh(&mut rng, 64, 40);
    for bits in [4u32, 7, 12, 16] {
        let config = CompressorConfig {
            position_quant: bits,
            ..Default::default()
        };
        let geometry = compress(&stream, &config, &mut PipelineState::default()).unwrap();
        let h = &geometry.header;
        for k in 0..3 {
            assert!(h.lower_bound[k] > -1.0 && h.lower_bound[k] <= h.upper_bound[k]);
            assert!(h.upper_bound[k] < 1.0);
        }
        // The x axis is by far the longest, so it spans nearly all of (-1, 1).
        assert!(h.upper_bound[0] - h.lower_bound[0] > 1.0, "bits {}", bits);

        let (lo, hi) = h.model_bounds();
        assert!(lo[0] >= -50.5 && hi[0] <= 50.5);
    }
}

#[test]
fn test_quantization_changes_mid_stream() {
    let left = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]];
    let right = [[2.0, 0.0, 0.0], [3.0, 0.0, 0.0], [2.0, 1.0, 0.0], [3.0, 1.0, 0.0]];
    let colors = [[0.1, 0.2, 0.3], [0.4, 0.5, 0.6], [0.7, 0.8, 0.9], [1.0, 1.0, 1.0]];

    let mut stream = ElementStream::new();
    stream
        .add_triangle_strip(VertexArrays::new(&left).with_colors(ColorArray::Rgb(&colors)))
        .unwrap();
    stream.set_quantization(QuantizationTarget::Position, 6).unwrap();
    stream.set_quantization(QuantizationTarget::Color, 3).unwrap();
    stream
        .add_triangle_strip(VertexArrays::new(&right).with_colors(ColorArray::Rgb(&colors)))
        .unwrap();

    let mut state = PipelineState::default();
    let geometry = compress(&stream, &CompressorConfig::default(), &mut state).unwrap();
    assert_tags_legal(&state);

    // A quantization change produces no command of its own.
    let stats = analyze_stream(&geometry.bytes).unwrap();
    assert_eq!(stats.vertices, 8);
    assert_eq!(stats.restarts, 2);
    assert_eq!(stats.set_states, 1);
    assert_eq!(stats.bundling_flags, 0x02);

    // Coarse positions after the change leave the 10 low bits clear.
    assert!(state
        .tables
        .position
        .leaves()
        .any(|d| d.absolute && d.shift >= 10));
}

#[test]
fn test_state_reuse_is_invisible_in_output() {
    let mut rng = StdRng::seed_from_u64(99);
    let big = random_mesh(&mut rng, 150, 250);
    let small = random_mesh(&mut rng, 10, 4);
    let config = CompressorConfig::default();

    let mut shared = PipelineState::default();
    compress(&big, &config, &mut shared).unwrap();
    let reused = compress(&small, &config, &mut shared).unwrap();
    let fresh = compress(&small, &config, &mut PipelineState::default()).unwrap();
    assert_eq!(reused, fresh);
}

#[test]
fn test_invalid_config_produces_no_output() {
    let config = CompressorConfig {
        normal_quant: 7,
        ..Default::default()
    };
    let mut rng = StdRng::seed_from_u64(3);
    let stream = random_mesh(&mut rng, 20, 10);
    let mut state = PipelineState::default();
    assert!(compress(&stream, &config, &mut state).is_err());
    assert_eq!(state.writer.byte_length(), 0);
}
