// In: src/error.rs

//! This module defines the single, unified error type for the entire meshpack library.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.

use thiserror::Error;

use crate::types::{BufferType, QuantizationTarget};

#[derive(Error, Debug)]
pub enum MeshpackError {
    // =========================================================================
    // === Configuration Errors (rejected before any stream processing)
    // =========================================================================
    #[error("Invalid {target} quantization: {bits} bits is outside the legal range {min}..={max}")]
    InvalidQuantization {
        target: QuantizationTarget,
        bits: u32,
        min: u32,
        max: u32,
    },

    // =========================================================================
    // === Inconsistent Input (rejected when the offending geometry is added)
    // =========================================================================
    #[error("Mixed buffer types in one stream: expected {expected:?}, found {found:?}")]
    MixedBufferType {
        expected: BufferType,
        found: BufferType,
    },

    #[error("Inconsistent vertex components: {0}")]
    InconsistentComponents(String),

    #[error("Mesh buffer reference {0} does not address a pushed vertex")]
    InvalidMeshReference(usize),

    #[error("Invalid input geometry: {0}")]
    InvalidInput(String),

    // =========================================================================
    // === Internal Invariant Violations (these are bugs)
    // =========================================================================
    #[error("Internal logic error (this is a bug): {0}")]
    InternalError(String),

    // =========================================================================
    // === Diagnostic Walker Errors
    // =========================================================================
    #[error("Command stream is malformed: {0}")]
    StreamFormatError(String),

    // =========================================================================
    // === External Error Wrappers
    // =========================================================================
    /// An error from the Serde JSON library, typically while loading a config.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// An error from a safe byte-casting operation failing.
    #[error("Slice casting error: {0}")]
    PodCast(String), // bytemuck::PodCastError doesn't impl Error
}

impl From<bytemuck::PodCastError> for MeshpackError {
    fn from(err: bytemuck::PodCastError) -> Self {
        MeshpackError::PodCast(format!("{:?}", err))
    }
}
