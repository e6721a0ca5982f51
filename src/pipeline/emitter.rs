//! Command emission: turns quantized elements into compression commands.
//!
//! Runs after tags are computed. Every data subcommand is the tag of the
//! canonical encoding followed by its components, each written as
//! `data_length - shift` bits of the value shifted right by `shift`. The first
//! 6 bits of the subcommand ride in the command header.

use crate::error::MeshpackError;
use crate::pipeline::command_stream::{opcode, CommandBody, CommandStream, HEADER_BITS};
use crate::pipeline::huffman::{EncodingTable, EncodingTables};
use crate::pipeline::quantizer::{NormalQuantity, QuantizedElement, Quantity};
use crate::types::{ColorKind, ReplaceCode};

//==================================================================================
// 1. Bundling State
//==================================================================================

/// Which optional components ride inside every vertex command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BundlingState {
    pub normals: bool,
    pub colors: bool,
    /// Colors carry four components.
    pub alpha: bool,
}

impl BundlingState {
    pub fn new(normals: bool, colors: bool, color_kind: Option<ColorKind>) -> Self {
        Self {
            normals,
            colors,
            alpha: color_kind == Some(ColorKind::Rgba),
        }
    }
}

const SET_STATE_BODY_BITS: u32 = 3;
const SEXTANT_BITS: u32 = 3;
const OCTANT_BITS: u32 = 3;

/// One SET_STATE command announcing `state`.
pub fn emit_state(writer: &mut CommandStream, state: BundlingState) {
    let header = opcode::SET_STATE | u32::from(state.normals);
    let body = (u32::from(state.colors) << 2) | (u32::from(state.alpha) << 1);
    writer.emit(header, HEADER_BITS, u64::from(body), SET_STATE_BODY_BITS);
}

//==================================================================================
// 2. Subcommands
//==================================================================================

fn push_components(
    body: &mut CommandBody,
    table: &EncodingTable,
    quantity: &Quantity,
) -> Result<(), MeshpackError> {
    let d = table.lookup(quantity.encoding.length, quantity.encoding.shift, quantity.absolute)?;
    body.push(u64::from(d.tag), d.tag_length);
    let width = d.component_bits();
    for &c in quantity.components() {
        body.push((c >> d.shift) as u64, width);
    }
    Ok(())
}

fn data_subcommand(table: &EncodingTable, quantity: &Quantity) -> Result<CommandBody, MeshpackError> {
    let mut body = CommandBody::EMPTY;
    push_components(&mut body, table, quantity)?;
    Ok(body)
}

fn normal_subcommand(
    table: &EncodingTable,
    normal: &NormalQuantity,
) -> Result<CommandBody, MeshpackError> {
    let q = &normal.data;
    let d = table.lookup(q.encoding.length, q.encoding.shift, q.absolute)?;
    let mut body = CommandBody::from_bits(u64::from(d.tag), d.tag_length);
    if q.absolute {
        body.push(u64::from(normal.sextant), SEXTANT_BITS);
        body.push(u64::from(normal.octant), OCTANT_BITS);
    }
    let width = d.component_bits();
    for &c in q.components() {
        body.push((c >> d.shift) as u64, width);
    }
    Ok(body)
}

//==================================================================================
// 3. The Emitter
//==================================================================================

/// Per-kind command counts, for the job summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmittedCounts {
    pub vertices: usize,
    pub colors: usize,
    pub normals: usize,
    pub mesh_references: usize,
}

pub struct Emitter<'a> {
    tables: &'a EncodingTables,
    writer: &'a mut CommandStream,
    state: BundlingState,
    counts: EmittedCounts,
}

impl<'a> Emitter<'a> {
    pub fn new(tables: &'a EncodingTables, writer: &'a mut CommandStream, state: BundlingState) -> Self {
        Self {
            tables,
            writer,
            state,
            counts: EmittedCounts::default(),
        }
    }

    pub fn counts(&self) -> EmittedCounts {
        self.counts
    }

    /// SET_STATE followed by the table definitions.
    pub fn emit_preamble(&mut self) {
        emit_state(self.writer, self.state);
        self.tables.emit_table_commands(self.writer);
    }

    pub fn emit_element(&mut self, element: &QuantizedElement) -> Result<(), MeshpackError> {
        match element {
            QuantizedElement::Vertex {
                position,
                normal,
                color,
                replace,
                mesh_push,
            } => self.emit_vertex(position, normal.as_ref(), color.as_ref(), *replace, *mesh_push),
            QuantizedElement::Color(c) => {
                let sub = data_subcommand(&self.tables.color, c)?;
                let (bits, body) = sub.split_header_bits();
                self.writer
                    .emit_command(opcode::SET_COLOR | bits, HEADER_BITS, body);
                self.counts.colors += 1;
                Ok(())
            }
            QuantizedElement::Normal(n) => {
                let sub = normal_subcommand(&self.tables.normal, n)?;
                let (bits, body) = sub.split_header_bits();
                self.writer
                    .emit_command(opcode::SET_NORMAL | bits, HEADER_BITS, body);
                self.counts.normals += 1;
                Ok(())
            }
            QuantizedElement::MeshReference { replace, index } => {
                self.emit_mesh_reference(*replace, *index);
                Ok(())
            }
            QuantizedElement::QuantizationChange => Ok(()),
        }
    }

    fn emit_vertex(
        &mut self,
        position: &Quantity,
        normal: Option<&NormalQuantity>,
        color: Option<&Quantity>,
        replace: ReplaceCode,
        mesh_push: bool,
    ) -> Result<(), MeshpackError> {
        let sub = data_subcommand(&self.tables.position, position)?;
        let (bits, mut body) = sub.split_header_bits();
        body.push(u64::from(replace.wire_code()), 2);
        body.push(u64::from(mesh_push), 1);

        match (self.state.normals, normal) {
            (true, Some(n)) => body.append(&normal_subcommand(&self.tables.normal, n)?),
            (false, None) => {}
            _ => {
                return Err(MeshpackError::InternalError(
                    "vertex normal does not match the bundling state".to_string(),
                ))
            }
        }
        match (self.state.colors, color) {
            (true, Some(c)) => push_components(&mut body, &self.tables.color, c)?,
            (false, None) => {}
            _ => {
                return Err(MeshpackError::InternalError(
                    "vertex color does not match the bundling state".to_string(),
                ))
            }
        }

        self.writer
            .emit_command(opcode::VERTEX | bits, HEADER_BITS, body);
        self.counts.vertices += 1;
        Ok(())
    }

    fn emit_mesh_reference(&mut self, replace: ReplaceCode, index: usize) {
        let code = replace.wire_code();
        let header = opcode::MESH_B_R | ((index as u32 & 0xF) << 1) | (code >> 1);
        self.writer
            .emit(header, HEADER_BITS, u64::from(code & 1), 1);
        self.counts.mesh_references += 1;
    }
}

//==================================================================================
// 4. Unit Tests
//==================================================================================
