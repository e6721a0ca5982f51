//! This file is the root of the `meshpack` Rust crate.
//!
//! Its responsibilities are strictly limited to:
//! 1.  Declaring all the top-level modules of our library (`pipeline`, `kernels`, etc.)
//!     so the Rust compiler knows they exist.
//! 2.  Re-exporting the public surface: the `bridge` compressors, the element
//!     stream builder, the configuration, and the error type.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
//==================================================================================
// 1. Module Declarations
//==================================================================================
#[macro_use]
pub mod observability; // Make macros available throughout the crate

pub mod bridge;
pub mod config;
pub mod error;
pub mod kernels;
pub mod pipeline;
pub mod types;

//==================================================================================
// 2. Public Surface
//==================================================================================
pub use bridge::{
    analyze_stream, compress_stream, compress_stream_with_config, CompressedGeometry,
    CompressedGeometryHeader, GeometryCompressor, StreamStats,
};
pub use config::{CompressorConfig, MeshReusePolicy};
pub use error::MeshpackError;
pub use observability::enable_verbose_logging;
pub use types::{
    BufferType, Color, ColorArray, ColorKind, ElementStream, QuantizationTarget, ReplaceCode,
    StreamElement, Vertex, VertexArrays,
};
