// In: src/bridge/compressor.rs

use crate::bridge::format::CompressedGeometry;
use crate::config::CompressorConfig;
use crate::error::MeshpackError;
use crate::pipeline::{self, PipelineState};
use crate::types::ElementStream;

/// A high-level, stateful compressor for sequential jobs.
///
/// Scratch state is cleared between calls, keeping its allocations.
#[derive(Debug)]
pub struct GeometryCompressor {
    config: CompressorConfig,
    state: PipelineState,
    jobs: u64,
}

impl GeometryCompressor {
    /// Creates a compressor, rejecting an invalid configuration up front.
    pub fn new(config: CompressorConfig) -> Result<Self, MeshpackError> {
        config.validate()?;
        Ok(Self {
            state: PipelineState::new(config.initial_capacity_bytes),
            config,
            jobs: 0,
        })
    }

    pub fn config(&self) -> &CompressorConfig {
        &self.config
    }

    /// An empty element stream using this compressor's reuse policy.
    pub fn stream(&self) -> ElementStream {
        ElementStream::from_config(&self.config)
    }

    /// Number of jobs completed successfully.
    pub fn jobs(&self) -> u64 {
        self.jobs
    }

    pub fn compress(&mut self, stream: &ElementStream) -> Result<CompressedGeometry, MeshpackError> {
        let geometry = pipeline::compress(stream, &self.config, &mut self.state)?;
        self.jobs += 1;
        Ok(geometry)
    }
}
