// In: src/bridge/format.rs

//! Defines the output structures and constants of the compressed geometry format.
//! This is the single source of truth for the header metadata handed to
//! consumers of a compressed buffer and for the diagnostic statistics returned
//! by `analyze_stream`.

use serde::{Deserialize, Serialize};

use crate::error::MeshpackError;
use crate::pipeline::command_stream::STREAM_ALIGNMENT_BITS;
use crate::pipeline::emitter::BundlingState;
use crate::types::BufferType;

//==================================================================================
// I. Format Version & Flags
//==================================================================================

/// Format revision 1.0.2.
pub const MAJOR_VERSION: u32 = 1;
pub const MINOR_VERSION: u32 = 0;
pub const MINOR_MINOR_VERSION: u32 = 2;

/// Bundling flag: vertices carry normals.
pub const NORMAL_IN_BUFFER: u32 = 0x01;
/// Bundling flag: vertices carry colors.
pub const COLOR_IN_BUFFER: u32 = 0x02;
/// Bundling flag: colors carry alpha.
pub const ALPHA_IN_BUFFER: u32 = 0x04;

impl BundlingState {
    pub fn flags(&self) -> u32 {
        (if self.normals { NORMAL_IN_BUFFER } else { 0 })
            | (if self.colors { COLOR_IN_BUFFER } else { 0 })
            | (if self.alpha { ALPHA_IN_BUFFER } else { 0 })
    }

    pub fn from_flags(flags: u32) -> Self {
        Self {
            normals: flags & NORMAL_IN_BUFFER != 0,
            colors: flags & COLOR_IN_BUFFER != 0,
            alpha: flags & ALPHA_IN_BUFFER != 0,
        }
    }
}

//==================================================================================
// II. Compressed Geometry
//==================================================================================

/// Metadata describing one compressed buffer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct CompressedGeometryHeader {
    pub major_version: u32,
    pub minor_version: u32,
    pub minor_minor_version: u32,
    pub buffer_type: BufferType,
    /// `NORMAL_IN_BUFFER | COLOR_IN_BUFFER | ALPHA_IN_BUFFER`.
    pub bundling_flags: u32,
    /// Size of the command stream in bytes.
    pub size: usize,
    /// Normalized position bounds (quantized bounds / 32768).
    pub lower_bound: [f64; 3],
    pub upper_bound: [f64; 3],
    /// Model-space center; `model = center + normalized / scale`.
    pub center: [f64; 3],
    pub scale: f64,
}

impl CompressedGeometryHeader {
    pub fn version(&self) -> (u32, u32, u32) {
        (
            self.major_version,
            self.minor_version,
            self.minor_minor_version,
        )
    }

    pub fn bundling(&self) -> BundlingState {
        BundlingState::from_flags(self.bundling_flags)
    }

    /// Maps a normalized bound back to model space.
    pub fn model_bounds(&self) -> ([f64; 3], [f64; 3]) {
        let to_model = |n: [f64; 3]| [0, 1, 2].map(|k| self.center[k] + n[k] / self.scale);
        (to_model(self.lower_bound), to_model(self.upper_bound))
    }
}

/// A compressed command stream and its header.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CompressedGeometry {
    pub header: CompressedGeometryHeader,
    pub bytes: Vec<u8>,
}

impl CompressedGeometry {
    /// Checks the header against the bytes it describes.
    pub fn validate(&self) -> Result<(), MeshpackError> {
        if self.header.version() != (MAJOR_VERSION, MINOR_VERSION, MINOR_MINOR_VERSION) {
            return Err(MeshpackError::StreamFormatError(format!(
                "unsupported format version {:?}",
                self.header.version()
            )));
        }
        if self.bytes.len() != self.header.size {
            return Err(MeshpackError::StreamFormatError(format!(
                "header size {} does not match {} bytes",
                self.header.size,
                self.bytes.len()
            )));
        }
        if self.bytes.len() % (STREAM_ALIGNMENT_BITS / 8) != 0 {
            return Err(MeshpackError::StreamFormatError(format!(
                "{} bytes is not a whole number of 64-bit words",
                self.bytes.len()
            )));
        }
        Ok(())
    }
}

//==================================================================================
// III. Diagnostics
//==================================================================================

/// The public-facing result of `analyze_stream`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub total_bytes: usize,
    pub vertices: usize,
    pub set_normals: usize,
    pub set_colors: usize,
    pub mesh_references: usize,
    pub set_states: usize,
    /// SET_TABLE commands per table: position, color, normal.
    pub table_entries: [usize; 3],
    pub no_ops: usize,
    /// Bits spent on no-op headers and bodies.
    pub padding_bits: usize,
    /// Vertices and mesh references that restart a strip.
    pub restarts: usize,
    pub mesh_pushes: usize,
    /// Flags announced by the last SET_STATE.
    pub bundling_flags: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(bytes: Vec<u8>) -> CompressedGeometry {
        CompressedGeometry {
            header: CompressedGeometryHeader {
                major_version: MAJOR_VERSION,
                minor_version: MINOR_VERSION,
                minor_minor_version: MINOR_MINOR_VERSION,
                buffer_type: BufferType::Triangle,
                bundling_flags: NORMAL_IN_BUFFER | ALPHA_IN_BUFFER,
                size: bytes.len(),
                lower_bound: [-0.5; 3],
                upper_bound: [0.5; 3],
                center: [10.0, 0.0, 0.0],
                scale: 0.5,
            },
            bytes,
        }
    }

    #[test]
    fn test_bundling_flags_round_trip() {
        let g = geometry(vec![0; 8]);
        let b = g.header.bundling();
        assert!(b.normals && !b.colors && b.alpha);
        assert_eq!(b.flags(), g.header.bundling_flags);
    }

    #[test]
    fn test_validate_checks_size_and_alignment() {
        assert!(geometry(vec![0; 16]).validate().is_ok());
        assert!(geometry(vec![0; 12]).validate().is_err());
        let mut g = geometry(vec![0; 8]);
        g.header.size = 16;
        assert!(g.validate().is_err());
        let mut g = geometry(vec![0; 8]);
        g.header.minor_minor_version = 1;
        assert!(g.validate().is_err());
    }

    #[test]
    fn test_model_bounds_undo_normalization() {
        let (lo, hi) = geometry(vec![]).header.model_bounds();
        assert_eq!(lo, [9.0, -1.0, -1.0]);
        assert_eq!(hi, [11.0, 1.0, 1.0]);
    }
}
