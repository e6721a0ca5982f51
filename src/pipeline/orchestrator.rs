// In: src/pipeline/orchestrator.rs

//! The compression orchestrator.
//!
//! `compress` is a pure coordinator over the pipeline stages, run strictly in
//! order: quantize the element stream (collecting encoding frequencies),
//! compute the tags of all three tables, walk the quantized stream a second
//! time emitting commands, pad the writer, and package the bytes with their
//! header. Scratch state lives in a caller-owned `PipelineState` so that
//! sequential jobs can reuse its allocations.

use crate::bridge::format::{
    CompressedGeometry, CompressedGeometryHeader, MAJOR_VERSION, MINOR_MINOR_VERSION,
    MINOR_VERSION,
};
use crate::config::CompressorConfig;
use crate::error::MeshpackError;
use crate::pipeline::command_stream::CommandStream;
use crate::pipeline::emitter::{BundlingState, Emitter};
use crate::pipeline::huffman::EncodingTables;
use crate::pipeline::mesh_buffer::MeshBuffer;
use crate::pipeline::quantizer;
use crate::types::{BufferType, ElementStream};

//==================================================================================
// 1. Per-Job Scratch State
//==================================================================================

/// Everything one compression job owns. Cleared at the start of every job.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub tables: EncodingTables,
    pub mesh: MeshBuffer,
    pub writer: CommandStream,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new(CompressorConfig::default().initial_capacity_bytes)
    }
}

impl PipelineState {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            tables: EncodingTables::new(),
            mesh: MeshBuffer::new(),
            writer: CommandStream::with_capacity(capacity_bytes),
        }
    }

    pub fn clear(&mut self) {
        self.tables.clear();
        self.mesh.clear();
        self.writer.clear();
    }
}

//==================================================================================
// 2. Public Orchestration API
//==================================================================================

/// Compresses `stream` into a padded command stream and its header.
///
/// Streams built from raw vertices without a primitive helper, and empty
/// streams, are reported as triangle buffers.
pub fn compress(
    stream: &ElementStream,
    config: &CompressorConfig,
    state: &mut PipelineState,
) -> Result<CompressedGeometry, MeshpackError> {
    // 1. Reject configuration errors before touching any geometry.
    config.validate()?;
    state.clear();

    // 2. Quantization pass: fixed-point values, deltas, encoding frequencies.
    let quantized = quantizer::quantize(
        stream.elements(),
        config,
        &mut state.tables,
        &mut state.mesh,
    )?;

    // 3. Tag assignment for all three tables.
    state.tables.compute_tags()?;

    // 4. Emission: SET_STATE, table definitions, then one command per element.
    let layout = stream.layout();
    let bundling = BundlingState::new(layout.normals, layout.colors.is_some(), stream.color_kind());
    let mut emitter = Emitter::new(&state.tables, &mut state.writer, bundling);
    emitter.emit_preamble();
    for element in &quantized.elements {
        emitter.emit_element(element)?;
    }
    let counts = emitter.counts();

    // 5. Flush the pending body and pad to a 64-bit boundary.
    state.writer.finish();
    state.writer.check_finished()?;

    // 6. Package.
    let bytes = state.writer.to_bytes();
    let buffer_type = stream.buffer_type().unwrap_or(BufferType::Triangle);
    let header = CompressedGeometryHeader {
        major_version: MAJOR_VERSION,
        minor_version: MINOR_VERSION,
        minor_minor_version: MINOR_MINOR_VERSION,
        buffer_type,
        bundling_flags: bundling.flags(),
        size: bytes.len(),
        lower_bound: quantized.lower_bound,
        upper_bound: quantized.upper_bound,
        center: quantized.center,
        scale: quantized.scale,
    };

    let leaves = [
        state.tables.position.leaves().count(),
        state.tables.color.leaves().count(),
        state.tables.normal.leaves().count(),
    ];
    log::info!(
        "compressed {} elements ({} vertices, {} mesh refs) into {} bytes; table entries {:?}",
        stream.len(),
        counts.vertices,
        counts.mesh_references,
        bytes.len(),
        leaves
    );
    log_metric!(
        "event" = "compress",
        "buffer_type" = format!("{:?}", buffer_type),
        "bytes" = bytes.len(),
        "bundling_flags" = bundling.flags()
    );

    Ok(CompressedGeometry { header, bytes })
}
