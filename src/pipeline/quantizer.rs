//! The quantization pass.
//!
//! Walks the element stream once, in order, mapping every position, color, and
//! normal into its fixed-point domain and deciding whether it is sent absolute
//! or as a delta against the previous quantity of the same kind. Each decision's
//! `(length, shift, absolute)` is recorded in the matching encoding table, so
//! that tags can be computed before anything is emitted.
//!
//! The caller's elements are never modified; the pass produces a parallel list
//! of `QuantizedElement`s that the emitter walks afterwards.

use crate::config::CompressorConfig;
use crate::error::MeshpackError;
use crate::kernels::fixed_point::{
    analyze_signed, analyze_unsigned, position_scale, quantize_color, quantize_position,
    LengthShift, FIXED_POINT_BITS, NORMALIZATION_DENOMINATOR,
};
use crate::kernels::normals::{encode_normal, EncodedNormal};
use crate::pipeline::huffman::EncodingTables;
use crate::pipeline::mesh_buffer::{MeshBuffer, MeshVertex};
use crate::types::{Color, QuantizationTarget, ReplaceCode, StreamElement};

//==================================================================================
// 1. Quantized Element Model
//==================================================================================

/// Fixed-point components ready to be written, and the encoding they need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantity {
    values: [i32; 4],
    count: usize,
    pub encoding: LengthShift,
    pub absolute: bool,
}

impl Quantity {
    fn new(values: [i32; 4], count: usize, encoding: LengthShift, absolute: bool) -> Self {
        Self {
            values,
            count,
            encoding,
            absolute,
        }
    }

    /// Absolute values or deltas, whichever is sent.
    pub fn components(&self) -> &[i32] {
        &self.values[..self.count]
    }
}

/// A normal quantity. `sextant` and `octant` are only sent when absolute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalQuantity {
    pub sextant: u8,
    pub octant: u8,
    pub data: Quantity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantizedElement {
    Vertex {
        position: Quantity,
        normal: Option<NormalQuantity>,
        color: Option<Quantity>,
        replace: ReplaceCode,
        mesh_push: bool,
    },
    Color(Quantity),
    Normal(NormalQuantity),
    MeshReference {
        replace: ReplaceCode,
        index: usize,
    },
    /// Quantization changes have no command of their own.
    QuantizationChange,
}

/// The output of the pass.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedStream {
    pub elements: Vec<QuantizedElement>,
    /// Quantized position bounds over all vertices, divided by 32768.
    pub lower_bound: [f64; 3],
    pub upper_bound: [f64; 3],
    /// Model-space center of the position bounding box.
    pub center: [f64; 3],
    /// Model-to-normalized scale at the initial position width.
    pub scale: f64,
}

//==================================================================================
// 2. The Quantizer State
//==================================================================================

/// Bounding box of every vertex position: `(center, longest axis range)`.
fn bounding_box(elements: &[StreamElement]) -> ([f64; 3], f64) {
    let mut lo = [f64::INFINITY; 3];
    let mut hi = [f64::NEG_INFINITY; 3];
    let mut any = false;
    for element in elements {
        if let StreamElement::Vertex(v) = element {
            any = true;
            for k in 0..3 {
                let p = v.position[k] as f64;
                lo[k] = lo[k].min(p);
                hi[k] = hi[k].max(p);
            }
        }
    }
    if !any {
        return ([0.0; 3], 0.0);
    }
    let center = [
        (lo[0] + hi[0]) / 2.0,
        (lo[1] + hi[1]) / 2.0,
        (lo[2] + hi[2]) / 2.0,
    ];
    let range = (0..3).map(|k| hi[k] - lo[k]).fold(0.0, f64::max);
    (center, range)
}

fn is_color(element: Option<&StreamElement>) -> bool {
    matches!(element, Some(StreamElement::Color(_)))
}

fn is_normal(element: Option<&StreamElement>) -> bool {
    matches!(element, Some(StreamElement::Normal(_)))
}

struct Quantizer<'a> {
    tables: &'a mut EncodingTables,
    mesh: &'a mut MeshBuffer,

    position_bits: u32,
    color_bits: u32,
    normal_bits: u32,

    center: [f64; 3],
    range: f64,
    scale: f64,

    last_position: Option<[i32; 3]>,
    last_color: Option<[i32; 4]>,
    color_count: usize,
    last_normal: Option<EncodedNormal>,

    force_absolute_position: bool,
    force_absolute_color: bool,
    force_absolute_normal: bool,

    qlower: [i32; 3],
    qupper: [i32; 3],
    vertices: usize,
}

impl<'a> Quantizer<'a> {
    fn new(
        config: &CompressorConfig,
        elements: &[StreamElement],
        tables: &'a mut EncodingTables,
        mesh: &'a mut MeshBuffer,
    ) -> Self {
        let (center, range) = bounding_box(elements);
        Self {
            tables,
            mesh,
            position_bits: config.quant_for(QuantizationTarget::Position),
            color_bits: config.quant_for(QuantizationTarget::Color),
            normal_bits: config.quant_for(QuantizationTarget::Normal),
            center,
            range,
            scale: position_scale(range, config.position_quant),
            last_position: None,
            last_color: None,
            color_count: 3,
            last_normal: None,
            force_absolute_position: true,
            force_absolute_color: true,
            force_absolute_normal: true,
            qlower: [i32::MAX; 3],
            qupper: [i32::MIN; 3],
            vertices: 0,
        }
    }

    // --- Per-quantity encoders ---

    fn position(&mut self, position: [f32; 3]) -> Result<([i32; 3], Quantity), MeshpackError> {
        let q = [0, 1, 2].map(|k| {
            quantize_position(position[k], self.center[k], self.scale, self.position_bits)
        });
        for k in 0..3 {
            self.qlower[k] = self.qlower[k].min(q[k]);
            self.qupper[k] = self.qupper[k].max(q[k]);
        }
        self.vertices += 1;

        let mut values = [q[0], q[1], q[2], 0];
        let mut absolute = true;
        if let (false, Some(last)) = (self.force_absolute_position, self.last_position) {
            let delta = [q[0] - last[0], q[1] - last[1], q[2] - last[2]];
            if analyze_signed(&delta).length <= FIXED_POINT_BITS {
                values = [delta[0], delta[1], delta[2], 0];
                absolute = false;
            }
        }
        let encoding = analyze_signed(&values[..3]);
        self.tables
            .position
            .add_occurrence(encoding.length, encoding.shift, absolute)?;
        self.force_absolute_position = false;
        self.last_position = Some(q);
        Ok((q, Quantity::new(values, 3, encoding, absolute)))
    }

    fn color(&mut self, color: Color) -> Result<([i32; 4], Quantity), MeshpackError> {
        let (components, count) = color.components();
        let mut q = [0i32; 4];
        for k in 0..count {
            q[k] = quantize_color(components[k], self.color_bits);
        }

        let mut values = q;
        let mut absolute = true;
        let comparable = !self.force_absolute_color && self.color_count == count;
        if let (true, Some(last)) = (comparable, self.last_color) {
            let mut delta = [0i32; 4];
            for k in 0..count {
                delta[k] = q[k] - last[k];
            }
            if analyze_signed(&delta[..count]).length <= FIXED_POINT_BITS {
                values = delta;
                absolute = false;
            }
        }
        let encoding = analyze_signed(&values[..count]);
        self.tables
            .color
            .add_occurrence(encoding.length, encoding.shift, absolute)?;
        self.force_absolute_color = false;
        self.last_color = Some(q);
        self.color_count = count;
        Ok((q, Quantity::new(values, count, encoding, absolute)))
    }

    fn normal(&mut self, normal: [f32; 3]) -> Result<(EncodedNormal, NormalQuantity), MeshpackError> {
        let e = encode_normal(normal, self.normal_bits);
        let base = self
            .last_normal
            .filter(|last| !self.force_absolute_normal && last.allows_delta_to(&e));

        let (values, encoding, absolute) = match base {
            Some(last) => {
                let delta = [e.u - last.u, e.v - last.v];
                (delta, analyze_signed(&delta), false)
            }
            None => ([e.u, e.v], analyze_unsigned(&[e.u, e.v]), true),
        };
        self.tables
            .normal
            .add_occurrence(encoding.length, encoding.shift, absolute)?;
        self.force_absolute_normal = false;
        self.last_normal = Some(e);
        let data = Quantity::new([values[0], values[1], 0, 0], 2, encoding, absolute);
        Ok((
            e,
            NormalQuantity {
                sextant: e.sextant,
                octant: e.octant,
                data,
            },
        ))
    }

    fn change_quantization(&mut self, target: QuantizationTarget, bits: u32) -> Result<(), MeshpackError> {
        target.validate(bits)?;
        match target {
            QuantizationTarget::Position => {
                self.position_bits = bits;
                self.scale = position_scale(self.range, bits);
                self.force_absolute_position = true;
            }
            QuantizationTarget::Color => {
                self.color_bits = bits;
                self.force_absolute_color = true;
            }
            QuantizationTarget::Normal => {
                self.normal_bits = bits;
                self.force_absolute_normal = true;
            }
        }
        log::debug!("{} quantization set to {} bits", target, bits);
        Ok(())
    }

    /// Re-seeds the delta bases from a referenced mesh buffer vertex.
    ///
    /// A color (normal) just before the reference keeps precedence over the
    /// buffered one, as does a color (normal) separated from the reference by
    /// a single normal (color) element.
    fn mesh_reference(
        &mut self,
        elements: &[StreamElement],
        at: usize,
        index: usize,
    ) -> Result<(), MeshpackError> {
        let vertex = *self
            .mesh
            .vertex_by_offset(index)
            .ok_or(MeshpackError::InvalidMeshReference(index))?;
        self.last_position = Some(vertex.position);

        let prev = at.checked_sub(1).map(|i| &elements[i]);
        let prev_prev = at.checked_sub(2).map(|i| &elements[i]);
        let color_overridden = is_color(prev) || (is_normal(prev) && is_color(prev_prev));
        let normal_overridden = is_normal(prev) || (is_color(prev) && is_normal(prev_prev));

        if let (false, Some(color)) = (color_overridden, vertex.color) {
            self.last_color = Some(color);
        }
        if let (false, Some(normal)) = (normal_overridden, vertex.normal) {
            self.last_normal = Some(normal);
        }
        Ok(())
    }

    fn run(&mut self, elements: &[StreamElement]) -> Result<Vec<QuantizedElement>, MeshpackError> {
        let mut out = Vec::with_capacity(elements.len());
        for (at, element) in elements.iter().enumerate() {
            let quantized = match *element {
                StreamElement::Vertex(v) => {
                    let (q_position, position) = self.position(v.position)?;
                    let normal = v.normal.map(|n| self.normal(n)).transpose()?;
                    let color = v.color.map(|c| self.color(c)).transpose()?;
                    if v.mesh_push {
                        self.mesh.push_vertex(MeshVertex {
                            position: q_position,
                            normal: normal.map(|(e, _)| e),
                            color: color.map(|(q, _)| q),
                        });
                    }
                    QuantizedElement::Vertex {
                        position,
                        normal: normal.map(|(_, n)| n),
                        color: color.map(|(_, c)| c),
                        replace: v.replace,
                        mesh_push: v.mesh_push,
                    }
                }
                StreamElement::Color(c) => QuantizedElement::Color(self.color(c)?.1),
                StreamElement::Normal(n) => QuantizedElement::Normal(self.normal(n)?.1),
                StreamElement::QuantizationChange { target, bits } => {
                    self.change_quantization(target, bits)?;
                    QuantizedElement::QuantizationChange
                }
                StreamElement::MeshReference { replace, index } => {
                    self.mesh_reference(elements, at, index)?;
                    QuantizedElement::MeshReference { replace, index }
                }
            };
            out.push(quantized);
        }
        Ok(out)
    }

    fn bounds(&self) -> ([f64; 3], [f64; 3]) {
        if self.vertices == 0 {
            return ([0.0; 3], [0.0; 3]);
        }
        (
            self.qlower.map(|q| q as f64 / NORMALIZATION_DENOMINATOR),
            self.qupper.map(|q| q as f64 / NORMALIZATION_DENOMINATOR),
        )
    }
}

//==================================================================================
// 3. Public Entry Point
//==================================================================================

/// Quantizes `elements`, populating `tables` and `mesh` (both must be clear).
pub fn quantize(
    elements: &[StreamElement],
    config: &CompressorConfig,
    tables: &mut EncodingTables,
    mesh: &mut MeshBuffer,
) -> Result<QuantizedStream, MeshpackError> {
    config.validate()?;
    let initial_scale = position_scale(bounding_box(elements).1, config.position_quant);

    let mut quantizer = Quantizer::new(config, elements, tables, mesh);
    let quantized = quantizer.run(elements)?;
    let (lower_bound, upper_bound) = quantizer.bounds();

    log_metric!(
        "event" = "quantize",
        "elements" = quantized.len(),
        "vertices" = quantizer.vertices,
        "scale" = initial_scale
    );

    Ok(QuantizedStream {
        elements: quantized,
        lower_bound,
        upper_bound,
        center: quantizer.center,
        scale: initial_scale,
    })
}

//==================================================================================
// 4. Unit Tests
//==================================================================================
