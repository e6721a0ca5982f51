//! This module contains the pure, stateless math kernels of the compressor.
//!
//! Nothing here owns state or touches the command stream: each function maps
//! floating-point geometry into the fixed-point domains of the wire format, or
//! measures the bit cost of already-quantized values.

pub mod fixed_point;
pub mod normals;
