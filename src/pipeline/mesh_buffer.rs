//! The mesh history buffer: a fixed-capacity circular cache mirroring the
//! decoder's 16-entry mesh buffer.
//!
//! Three independent rings live side by side, each with its own top cursor:
//! quantized vertices (consulted by the quantization pass when a mesh
//! reference replaces a delta base), value keys (point-equality lookup with a
//! precomputed hash), and index keys (raw index lookup). The builder keeps the
//! key rings in lockstep with the vertex pushes it emits, so an offset found by
//! a lookup addresses the same vertex the decoder will hold.
//!
//! Offsets are always backward distances from the most recent push: offset 0
//! is the top. Translation to a slot is pure integer math.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::kernels::normals::EncodedNormal;
use crate::types::Color;

/// Capacity of the decoder mesh buffer.
pub const MESH_BUFFER_SIZE: usize = 16;

//==================================================================================
// 1. The Ring
//==================================================================================

/// A fixed ring of `MESH_BUFFER_SIZE` optional slots.
#[derive(Debug, Clone)]
pub(crate) struct Ring<T> {
    slots: [Option<T>; MESH_BUFFER_SIZE],
    top: usize,
    pushes: usize,
}

impl<T> Ring<T> {
    fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
            top: MESH_BUFFER_SIZE - 1,
            pushes: 0,
        }
    }

    /// `top - offset`, wrapping to `top - offset + capacity` when negative.
    fn slot_for_offset(&self, offset: usize) -> usize {
        if self.top >= offset {
            self.top - offset
        } else {
            self.top + MESH_BUFFER_SIZE - offset
        }
    }

    fn push(&mut self, value: Option<T>) {
        self.top = (self.top + 1) % MESH_BUFFER_SIZE;
        self.slots[self.top] = value;
        self.pushes += 1;
    }

    fn get_by_offset(&self, offset: usize) -> Option<&T> {
        if offset >= MESH_BUFFER_SIZE || offset >= self.pushes {
            return None;
        }
        self.slots[self.slot_for_offset(offset)].as_ref()
    }

    /// Nearest (smallest offset) slot satisfying `pred`.
    fn find<F>(&self, mut pred: F) -> Option<usize>
    where
        F: FnMut(&T) -> bool,
    {
        let live = self.pushes.min(MESH_BUFFER_SIZE);
        (0..live).find(|&offset| {
            self.slots[self.slot_for_offset(offset)]
                .as_ref()
                .is_some_and(&mut pred)
        })
    }

    fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
        self.top = MESH_BUFFER_SIZE - 1;
        self.pushes = 0;
    }
}

//==================================================================================
// 2. Entry Types
//==================================================================================

/// The quantized absolute values of a pushed vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshVertex {
    pub position: [i32; 3],
    pub normal: Option<EncodedNormal>,
    pub color: Option<[i32; 4]>,
}

/// A vertex identified by its floating-point values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointKey {
    pub position: [f32; 3],
    pub normal: Option<[f32; 3]>,
    pub color: Option<Color>,
}

impl PointKey {
    /// Hash of the bit patterns, with `-0.0` folded onto `0.0` so that the
    /// hash agrees with float equality.
    fn point_hash(&self) -> u64 {
        fn feed(h: &mut DefaultHasher, v: f32) {
            (v + 0.0).to_bits().hash(h);
        }
        let mut h = DefaultHasher::new();
        self.position.iter().for_each(|&v| feed(&mut h, v));
        if let Some(n) = self.normal {
            1u8.hash(&mut h);
            n.iter().for_each(|&v| feed(&mut h, v));
        }
        if let Some(c) = self.color {
            let (values, count) = c.components();
            (count as u8).hash(&mut h);
            values[..count].iter().for_each(|&v| feed(&mut h, v));
        }
        h.finish()
    }
}

#[derive(Debug, Clone, Copy)]
struct PointEntry {
    hash: u64,
    key: PointKey,
}

/// A vertex identified by the indices it was assembled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexKey {
    pub position: u32,
    pub normal: Option<u32>,
    pub color: Option<u32>,
}

impl IndexKey {
    /// All attributes addressed by one shared index.
    pub fn shared(index: u32, normals: bool, colors: bool) -> Self {
        Self {
            position: index,
            normal: normals.then_some(index),
            color: colors.then_some(index),
        }
    }
}

//==================================================================================
// 3. The Mesh Buffer
//==================================================================================

/// Fixed-capacity history of recently pushed vertices with lookup by value,
/// by index, or by backward offset.
#[derive(Debug, Clone)]
pub struct MeshBuffer {
    vertices: Ring<MeshVertex>,
    points: Ring<PointEntry>,
    indices: Ring<IndexKey>,
}

impl Default for MeshBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshBuffer {
    pub fn new() -> Self {
        Self {
            vertices: Ring::new(),
            points: Ring::new(),
            indices: Ring::new(),
        }
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.points.clear();
        self.indices.clear();
    }

    // --- Quantized vertices ---

    pub fn push_vertex(&mut self, vertex: MeshVertex) {
        self.vertices.push(Some(vertex));
    }

    /// The vertex `offset` pushes back from the top, or `None` if that slot
    /// was never filled.
    pub fn vertex_by_offset(&self, offset: usize) -> Option<&MeshVertex> {
        self.vertices.get_by_offset(offset)
    }

    // --- Value keys ---

    pub fn push_point(&mut self, key: PointKey) {
        let hash = key.point_hash();
        self.points.push(Some(PointEntry { hash, key }));
    }

    /// Offset of the nearest pushed vertex equal to `key`.
    pub fn lookup_point(&self, key: &PointKey) -> Option<usize> {
        let hash = key.point_hash();
        self.points.find(|e| e.hash == hash && e.key == *key)
    }

    // --- Index keys ---

    /// Pushes an index key; `None` keeps the ring aligned for vertices that
    /// did not come from indexed geometry.
    pub fn push_indices(&mut self, key: Option<IndexKey>) {
        self.indices.push(key);
    }

    /// Offset of the nearest pushed vertex with exactly these indices.
    pub fn lookup_indices(&self, key: IndexKey) -> Option<usize> {
        self.indices.find(|k| *k == key)
    }

    /// Number of pushes recorded in the key rings (saturating at capacity
    /// for addressing purposes).
    pub fn addressable(&self) -> usize {
        self.points.pushes.min(MESH_BUFFER_SIZE)
    }
}

//==================================================================================
// 4. Unit Tests
//==================================================================================
