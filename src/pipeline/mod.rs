//! The pure compression engine.
//!
//! The history buffer, encoding tables and bit writer are self-contained state
//! machines. The quantizer and emitter are the two passes over an element
//! stream, and the orchestrator runs them in order.

pub mod command_stream;
pub mod emitter;
pub mod huffman;
pub mod mesh_buffer;
pub mod orchestrator;
pub mod quantizer;

pub use orchestrator::{compress, PipelineState};

#[cfg(test)]
mod orchestrator_tests;
