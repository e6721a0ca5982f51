// In: src/bridge/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Bridge Layer
// ====================================================================================
//
// The `bridge` is the public-facing API of the meshpack library. It wraps the pure
// `pipeline` engine and owns the output format: the header metadata handed to
// consumers and the diagnostic statistics of a finished command stream.
//
// Data Flow (Compression):
//
//   1. [Stateful Facade (GeometryCompressor)] -> Receives `&ElementStream`
//         |
//         `-> reuses its `PipelineState` (tables, mesh buffer, writer) across jobs
//
//   2. [Stateless API (compress_stream)]      -> Receives `&ElementStream`
//         |
//         `-> allocates a fresh `PipelineState` for one job
//
//   3. [Pipeline Engine (pipeline::orchestrator)] -> Returns `CompressedGeometry`
//
//
// Data Flow (Diagnostics):
//
//   1. [Stateless API (analyze_stream)]       -> Receives `&[u8]` (a padded command stream)
//         |
//         `-> `inspect::walk_stream` follows the header/body interleave and the
//             encoding tables the stream defines
//
//   2. Returns `StreamStats` (command counts, table entries, padding bits)
//
// ====================================================================================
pub mod compressor;
pub mod format;
mod inspect;
pub mod stateless_api;

// --- High-Level Stateful API ---
pub use compressor::GeometryCompressor;

// --- Low-Level Stateless API ---
pub use stateless_api::{analyze_stream, compress_stream, compress_stream_with_config};

// --- Format Constants and Structs ---
pub use format::{CompressedGeometry, CompressedGeometryHeader, StreamStats};
