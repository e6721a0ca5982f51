//! This module defines the core, strongly-typed data representations used
//! throughout the meshpack pipeline.
//!
//! It includes the closed `StreamElement` sum type that callers build a job
//! from, the small enums that name quantities and topology, and the
//! `ElementStream` builder that enforces input consistency as geometry is added.

pub mod element;
pub mod stream;

pub use element::{
    BufferType, Color, ColorKind, QuantizationTarget, ReplaceCode, StreamElement, Vertex,
    VertexLayout,
};
pub use stream::{ColorArray, ElementStream, VertexArrays};
