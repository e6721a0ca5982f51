// In: src/bridge/stateless_api.rs

use crate::bridge::format::{CompressedGeometry, StreamStats};
use crate::bridge::inspect;
use crate::config::CompressorConfig;
use crate::error::MeshpackError;
use crate::pipeline::{self, PipelineState};
use crate::types::ElementStream;

/// Compresses one element stream with a default configuration.
pub fn compress_stream(stream: &ElementStream) -> Result<CompressedGeometry, MeshpackError> {
    compress_stream_with_config(stream, &CompressorConfig::default())
}

/// Compresses one element stream with fresh scratch state.
pub fn compress_stream_with_config(
    stream: &ElementStream,
    config: &CompressorConfig,
) -> Result<CompressedGeometry, MeshpackError> {
    let mut state = PipelineState::new(config.initial_capacity_bytes);
    pipeline::compress(stream, config, &mut state)
}

/// Analyzes a compressed command stream without reconstructing geometry.
/// This function is a thin facade over the structural walker.
pub fn analyze_stream(bytes: &[u8]) -> Result<StreamStats, MeshpackError> {
    inspect::walk_stream(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VertexArrays;

    #[test]
    fn test_analyze_stream_after_compression() {
        // 1. Arrange: a small fan.
        let positions = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
        let mut stream = ElementStream::new();
        stream
            .add_triangle_fan(VertexArrays::new(&positions))
            .unwrap();

        // 2. Act: compress it through the public API, then analyze the bytes.
        let geometry = compress_stream(&stream).unwrap();
        let stats = analyze_stream(&geometry.bytes).unwrap();

        // 3. Assert: the walker sees what was compressed.
        assert_eq!(stats.total_bytes, geometry.header.size);
        assert_eq!(stats.vertices, 4);
        assert_eq!(stats.restarts, 1);
        assert_eq!(stats.set_states, 1);
        assert!(stats.table_entries[0] >= 1);
        assert_eq!(stats.table_entries[1], 0);
        assert_eq!(stats.table_entries[2], 0);
    }
}
