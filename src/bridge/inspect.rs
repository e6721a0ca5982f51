// In: src/bridge/inspect.rs

//! A structural walker over a finished command stream.
//!
//! The walker follows the header/body interleave and the encoding tables the
//! stream defines, so it can find every command boundary, but it never
//! reconstructs geometry: data components are skipped, not decoded.

use bitvec::prelude::*;

use crate::bridge::format::StreamStats;
use crate::error::MeshpackError;
use crate::pipeline::command_stream::{HEADER_DATA_BITS, NOP_COUNT_BITS};
use crate::pipeline::emitter::BundlingState;
use crate::types::ReplaceCode;

//==================================================================================
// 1. Bit Reader
//==================================================================================

struct BitReader<'a> {
    bits: &'a BitSlice<u8, Msb0>,
    pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bits: bytes.view_bits::<Msb0>(),
            pos: 0,
        }
    }

    fn remaining(&self) -> usize {
        self.bits.len() - self.pos
    }

    fn check(&self, n: usize) -> Result<(), MeshpackError> {
        if n > self.remaining() {
            return Err(MeshpackError::StreamFormatError(format!(
                "needs {} bits at bit {}, only {} remain",
                n,
                self.pos,
                self.remaining()
            )));
        }
        Ok(())
    }

    fn peek(&self, n: usize) -> Result<u64, MeshpackError> {
        debug_assert!(n <= 64);
        self.check(n)?;
        if n == 0 {
            return Ok(0);
        }
        Ok(self.bits[self.pos..self.pos + n].load_be::<u64>())
    }

    fn read(&mut self, n: usize) -> Result<u64, MeshpackError> {
        let value = self.peek(n)?;
        self.pos += n;
        Ok(value)
    }

    fn skip(&mut self, n: usize) -> Result<(), MeshpackError> {
        self.check(n)?;
        self.pos += n;
        Ok(())
    }
}

//==================================================================================
// 2. Commands & Tables
//==================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    NoOp,
    EndOfStream,
    SetState(u8),
    SetTable(u8),
    MeshReference(u8),
    Vertex(u8),
    SetNormal(u8),
    SetColor(u8),
}

fn classify(header: u8) -> Result<Command, MeshpackError> {
    Ok(match header {
        0x00 => Command::EndOfStream,
        0x01 => Command::NoOp,
        h if h & 0xC0 == 0xC0 => Command::SetNormal(h),
        h if h & 0xC0 == 0x80 => Command::SetColor(h),
        h if h & 0xC0 == 0x40 => Command::Vertex(h),
        h if h & 0xE0 == 0x20 => Command::MeshReference(h),
        h if h & 0xF8 == 0x18 => Command::SetState(h),
        h if h & 0xF8 == 0x10 => Command::SetTable(h),
        h => {
            return Err(MeshpackError::StreamFormatError(format!(
                "reserved command header {:#04x}",
                h
            )))
        }
    })
}

#[derive(Debug, Clone, Copy)]
struct TableEntry {
    tag_length: usize,
    data_length: usize,
    shift: usize,
    absolute: bool,
}

impl TableEntry {
    fn width(&self) -> Result<usize, MeshpackError> {
        self.data_length.checked_sub(self.shift).ok_or_else(|| {
            MeshpackError::StreamFormatError(format!(
                "table entry shift {} exceeds length {}",
                self.shift, self.data_length
            ))
        })
    }
}

const POSITION: usize = 0;
const COLOR: usize = 1;
const NORMAL: usize = 2;
const TABLE_SLOTS: usize = 1 << HEADER_DATA_BITS;
const SET_TABLE_BODY_BITS: usize = 15;

//==================================================================================
// 3. The Walker
//==================================================================================

struct Walker {
    tables: [[Option<TableEntry>; TABLE_SLOTS]; 3],
    bundling: BundlingState,
    stats: StreamStats,
}

impl Walker {
    fn entry(&self, table: usize, prefix: u64) -> Result<TableEntry, MeshpackError> {
        self.tables[table][prefix as usize & (TABLE_SLOTS - 1)].ok_or_else(|| {
            MeshpackError::StreamFormatError(format!(
                "tag prefix {:06b} is not defined in table {}",
                prefix, table
            ))
        })
    }

    fn normal_bits(&self, e: &TableEntry) -> Result<usize, MeshpackError> {
        let angles = if e.absolute { 6 } else { 0 };
        Ok(e.tag_length + angles + 2 * e.width()?)
    }

    fn color_bits(&self, e: &TableEntry) -> Result<usize, MeshpackError> {
        let components = if self.bundling.alpha { 4 } else { 3 };
        Ok(e.tag_length + components * e.width()?)
    }

    /// Skips the part of a data subcommand that follows the header bits.
    fn skip_after_header(r: &mut BitReader<'_>, total: usize) -> Result<(), MeshpackError> {
        let rest = total.checked_sub(HEADER_DATA_BITS as usize).ok_or_else(|| {
            MeshpackError::StreamFormatError(format!(
                "{}-bit data subcommand is shorter than the header",
                total
            ))
        })?;
        r.skip(rest)
    }

    fn define_table(&mut self, header: u8, body: u64) -> Result<(), MeshpackError> {
        let table = ((header >> 1) & 0x3) as usize;
        if table > NORMAL {
            return Err(MeshpackError::StreamFormatError(
                "SET_TABLE names table 3".to_string(),
            ));
        }
        let address = (((header & 1) as u64) << 6) | (body >> 9);
        if address == 0 {
            return Err(MeshpackError::StreamFormatError(
                "SET_TABLE with an empty address".to_string(),
            ));
        }
        let tag_length = 6 - address.trailing_zeros() as usize;
        let tag = ((address >> (7 - tag_length)) & ((1 << tag_length) - 1)) as usize;
        let data_length = match ((body >> 5) & 0xF) as usize {
            0 => 16,
            n => n,
        };
        let entry = TableEntry {
            tag_length,
            data_length,
            shift: (body & 0xF) as usize,
            absolute: (body >> 4) & 1 == 1,
        };
        let span = 6 - tag_length;
        for slot in (tag << span)..((tag + 1) << span) {
            self.tables[table][slot] = Some(entry);
        }
        self.stats.table_entries[table] += 1;
        Ok(())
    }

    fn read_body(&mut self, command: Command, r: &mut BitReader<'_>) -> Result<(), MeshpackError> {
        match command {
            Command::NoOp => {
                let fill = r.read(NOP_COUNT_BITS as usize)? as usize;
                r.skip(fill)?;
                self.stats.padding_bits += NOP_COUNT_BITS as usize + fill;
            }
            Command::EndOfStream => {}
            Command::SetState(h) => {
                let body = r.read(3)?;
                self.bundling = BundlingState {
                    normals: h & 1 == 1,
                    colors: (body >> 2) & 1 == 1,
                    alpha: (body >> 1) & 1 == 1,
                };
                self.stats.set_states += 1;
                self.stats.bundling_flags = self.bundling.flags();
            }
            Command::SetTable(h) => {
                let body = r.read(SET_TABLE_BODY_BITS)?;
                self.define_table(h, body)?;
            }
            Command::MeshReference(h) => {
                let code = (u32::from(h & 1) << 1) | r.read(1)? as u32;
                if code == ReplaceCode::Restart.wire_code() {
                    self.stats.restarts += 1;
                }
                self.stats.mesh_references += 1;
            }
            Command::Vertex(h) => {
                let e = self.entry(POSITION, u64::from(h))?;
                Self::skip_after_header(r, e.tag_length + 3 * e.width()?)?;
                let code = r.read(2)? as u32;
                if code == ReplaceCode::Restart.wire_code() {
                    self.stats.restarts += 1;
                }
                if r.read(1)? == 1 {
                    self.stats.mesh_pushes += 1;
                }
                if self.bundling.normals {
                    let e = self.entry(NORMAL, r.peek(HEADER_DATA_BITS as usize)?)?;
                    r.skip(self.normal_bits(&e)?)?;
                }
                if self.bundling.colors {
                    let e = self.entry(COLOR, r.peek(HEADER_DATA_BITS as usize)?)?;
                    r.skip(self.color_bits(&e)?)?;
                }
                self.stats.vertices += 1;
            }
            Command::SetNormal(h) => {
                let e = self.entry(NORMAL, u64::from(h))?;
                Self::skip_after_header(r, self.normal_bits(&e)?)?;
                self.stats.set_normals += 1;
            }
            Command::SetColor(h) => {
                let e = self.entry(COLOR, u64::from(h))?;
                Self::skip_after_header(r, self.color_bits(&e)?)?;
                self.stats.set_colors += 1;
            }
        }
        Ok(())
    }
}

/// Walks a padded command stream and counts what it contains.
pub(crate) fn walk_stream(bytes: &[u8]) -> Result<StreamStats, MeshpackError> {
    let mut r = BitReader::new(bytes);
    let mut walker = Walker {
        tables: [[None; TABLE_SLOTS]; 3],
        bundling: BundlingState::default(),
        stats: StreamStats {
            total_bytes: bytes.len(),
            ..Default::default()
        },
    };

    // The stream behaves as if preceded by a no-op.
    let mut pending = Command::NoOp;
    while r.remaining() > 0 {
        let command = classify(r.read(8)? as u8)?;
        if command == Command::EndOfStream {
            break;
        }
        if command == Command::NoOp {
            walker.stats.no_ops += 1;
            walker.stats.padding_bits += 8;
        }
        walker.read_body(pending, &mut r)?;
        pending = command;
    }

    if !matches!(pending, Command::NoOp | Command::EndOfStream) {
        return Err(MeshpackError::StreamFormatError(format!(
            "stream ends before the body of {:?}",
            pending
        )));
    }
    Ok(walker.stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::command_stream::{opcode, CommandStream};

    #[test]
    fn test_empty_stream_has_no_commands() {
        let stats = walk_stream(&[]).unwrap();
        assert_eq!(stats, StreamStats::default());
    }

    #[test]
    fn test_padding_only_stream() {
        let mut cs = CommandStream::new();
        cs.finish();
        let bytes = cs.to_bytes();
        assert_eq!(bytes.len(), 8);
        let stats = walk_stream(&bytes).unwrap();
        assert_eq!(stats.padding_bits, 64);
        assert_eq!(stats.vertices, 0);
    }

    #[test]
    fn test_truncated_stream_is_rejected() {
        let mut cs = CommandStream::new();
        cs.emit(opcode::SET_STATE, 8, 0, 3);
        // SET_STATE header with the primed body, but no body of its own.
        let bytes = cs.to_bytes();
        assert!(matches!(
            walk_stream(&bytes),
            Err(MeshpackError::StreamFormatError(_))
        ));
    }

    #[test]
    fn test_reserved_header_is_rejected() {
        assert!(walk_stream(&[0x05, 0, 0, 0, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_vertex_with_undefined_tag_is_rejected() {
        let mut cs = CommandStream::new();
        cs.emit(opcode::VERTEX, 8, 0, 3);
        cs.finish();
        assert!(walk_stream(&cs.to_bytes()).is_err());
    }
}
