//! The bit-stream writer for compression commands.
//!
//! Commands are an 8-bit header plus a variable-length body, but the format
//! requires every header to run one step ahead of its body: the bytes after a
//! header hold the body of the *previous* command. The writer keeps exactly one
//! pending body (`last_body`) and flushes it behind the next header. The
//! stream starts as if preceded by an empty no-op, so the first header flushes
//! a 5-bit zero-count no-op body.
//!
//! Cursor convention: `byte_offset` names the byte currently being filled and
//! `bit_offset` the number of bits already used in it (1..=8), except for the
//! empty stream where both are zero. The cursor only moves to a new byte when
//! a bit is written there, which is why `byte_length()` is `byte_offset + 1`.

use crate::error::MeshpackError;

//==================================================================================
// 1. Opcodes & Format Constants
//==================================================================================

/// Command header opcodes (high bits of the 8-bit header).
pub mod opcode {
    pub const VERTEX: u32 = 0x40;
    pub const SET_NORMAL: u32 = 0xC0;
    pub const SET_COLOR: u32 = 0x80;
    pub const MESH_B_R: u32 = 0x20;
    pub const SET_STATE: u32 = 0x18;
    pub const SET_TABLE: u32 = 0x10;
    pub const EOS: u32 = 0x00;
    pub const V_NO_OP: u32 = 0x01;
}

/// Every command header is one byte.
pub const HEADER_BITS: u32 = 8;
/// Data bits carried in a data command's header, after its opcode.
pub const HEADER_DATA_BITS: u32 = 6;
/// Width of the no-op fill count field.
pub const NOP_COUNT_BITS: u32 = 5;
/// Largest no-op body: count field plus 31 fill bits.
pub const NOP_MAX_BODY_BITS: u32 = NOP_COUNT_BITS + 31;
/// Output is padded to this many bits.
pub const STREAM_ALIGNMENT_BITS: usize = 64;

/// A 24-bit no-op body: count field 19, then 19 zero bits.
const NOP_SPLIT_BODY: u32 = 19 << 19;
const NOP_SPLIT_BODY_BITS: u32 = 24;

const DEFAULT_CAPACITY: usize = 1024;

#[inline]
fn low_bits(value: u64, bits: u32) -> u64 {
    if bits >= 64 {
        value
    } else {
        value & ((1u64 << bits) - 1)
    }
}

//==================================================================================
// 2. Command Body (the lookahead payload)
//==================================================================================

const BODY_WORDS: usize = 4;
/// Largest body the register can hold.
pub const MAX_BODY_BITS: u32 = (BODY_WORDS * 64) as u32;

/// The longest real body: a vertex with a bundled absolute normal and an RGBA
/// color, every tag 6 bits and every component at full width.
const LONGEST_BODY_BITS: u32 = (6 + 3 * 16 - HEADER_DATA_BITS) // position rest
    + 2 + 1 // replace code, mesh push
    + (6 + 3 + 3 + 2 * 6) // normal
    + (6 + 4 * 16); // color
const _: () = assert!(LONGEST_BODY_BITS <= MAX_BODY_BITS);

/// A short, MSB-first bit string: a command body or a data subcommand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandBody {
    words: [u64; BODY_WORDS],
    len: u32,
}

impl CommandBody {
    pub const EMPTY: CommandBody = CommandBody {
        words: [0; BODY_WORDS],
        len: 0,
    };

    /// The low `bits` bits of `value`.
    pub fn from_bits(value: u64, bits: u32) -> Self {
        let mut body = Self::EMPTY;
        body.push(value, bits);
        body
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends the low `bits` (at most 64) bits of `value`, most significant first.
    pub fn push(&mut self, value: u64, bits: u32) {
        if bits == 0 {
            return;
        }
        debug_assert!(bits <= 64);
        debug_assert!(self.len + bits <= MAX_BODY_BITS, "command body overflow");
        let value = low_bits(value, bits);
        let word = (self.len / 64) as usize;
        let room = 64 - self.len % 64;
        if bits <= room {
            self.words[word] |= value << (room - bits);
        } else {
            let spill = bits - room;
            self.words[word] |= value >> spill;
            self.words[word + 1] |= low_bits(value, spill) << (64 - spill);
        }
        self.len += bits;
    }

    /// Reads `bits` (at most 64) bits starting at bit `start`.
    pub fn get(&self, start: u32, bits: u32) -> u64 {
        if bits == 0 {
            return 0;
        }
        debug_assert!(bits <= 64 && start + bits <= self.len);
        let word = (start / 64) as usize;
        let off = start % 64;
        let mut aligned = self.words[word] << off;
        if off != 0 && word + 1 < BODY_WORDS {
            aligned |= self.words[word + 1] >> (64 - off);
        }
        aligned >> (64 - bits)
    }

    /// Appends all of `other`.
    pub fn append(&mut self, other: &CommandBody) {
        let mut start = 0;
        while start < other.len {
            let take = (other.len - start).min(64);
            self.push(other.get(start, take), take);
            start += take;
        }
    }

    /// The bits from `start` to the end.
    pub fn tail(&self, start: u32) -> CommandBody {
        let mut out = CommandBody::EMPTY;
        let mut pos = start;
        while pos < self.len {
            let take = (self.len - pos).min(64);
            out.push(self.get(pos, take), take);
            pos += take;
        }
        out
    }

    /// Splits a data subcommand into the 6 bits that ride in the header and
    /// the remaining body. Short subcommands are left-justified in the header.
    pub fn split_header_bits(&self) -> (u32, CommandBody) {
        if self.len >= HEADER_DATA_BITS {
            (
                self.get(0, HEADER_DATA_BITS) as u32,
                self.tail(HEADER_DATA_BITS),
            )
        } else {
            (
                (self.get(0, self.len) as u32) << (HEADER_DATA_BITS - self.len),
                CommandBody::EMPTY,
            )
        }
    }
}

//==================================================================================
// 3. The Command Stream
//==================================================================================

/// A growable byte buffer with bit-precise appends and the header/body interleave.
#[derive(Debug, Clone)]
pub struct CommandStream {
    bytes: Vec<u8>,
    byte_offset: usize,
    bit_offset: u32,
    last_body: CommandBody,
}

impl Default for CommandStream {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandStream {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: vec![0; capacity.max(8)],
            byte_offset: 0,
            bit_offset: 0,
            last_body: Self::primed_body(),
        }
    }

    fn primed_body() -> CommandBody {
        CommandBody::from_bits(0, NOP_COUNT_BITS)
    }

    /// Resets for the next job, keeping the allocation.
    pub fn clear(&mut self) {
        let used = self.byte_length();
        self.bytes[..used].fill(0);
        self.byte_offset = 0;
        self.bit_offset = 0;
        self.last_body = Self::primed_body();
    }

    fn ensure_byte(&mut self, index: usize) {
        if index >= self.bytes.len() {
            let grown = (self.bytes.len() * 2).max(index + 1);
            self.bytes.resize(grown, 0);
        }
    }

    /// Appends the low `bit_count` (at most 32) bits of `value`, MSB first.
    pub fn append_bits(&mut self, value: u32, bit_count: u32) {
        debug_assert!(bit_count <= 32);
        self.append_bits_wide(value as u64, bit_count);
    }

    /// Appends the low `bit_count` (at most 64) bits of `value`, MSB first.
    pub fn append_bits_wide(&mut self, value: u64, bit_count: u32) {
        debug_assert!(bit_count <= 64);
        let value = low_bits(value, bit_count);
        let mut remaining = bit_count;
        while remaining > 0 {
            if self.bit_offset == 8 {
                self.byte_offset += 1;
                self.bit_offset = 0;
            }
            self.ensure_byte(self.byte_offset);
            let free = 8 - self.bit_offset;
            let take = free.min(remaining);
            let chunk = low_bits(value >> (remaining - take), take) as u8;
            self.bytes[self.byte_offset] |= chunk << (free - take);
            self.bit_offset += take;
            remaining -= take;
        }
    }

    fn append_body(&mut self, body: &CommandBody) {
        let mut start = 0;
        while start < body.len() {
            let take = (body.len() - start).min(64);
            self.append_bits_wide(body.get(start, take), take);
            start += take;
        }
    }

    /// Writes `header` now and the previous command's body behind it; `body`
    /// becomes the pending body.
    pub fn emit_command(&mut self, header: u32, header_bits: u32, body: CommandBody) {
        self.append_bits(header, header_bits);
        let previous = std::mem::replace(&mut self.last_body, body);
        self.append_body(&previous);
    }

    /// Convenience for bodies that fit in one word.
    pub fn emit(&mut self, header: u32, header_bits: u32, body: u64, body_bits: u32) {
        self.emit_command(header, header_bits, CommandBody::from_bits(body, body_bits));
    }

    fn append_nop_body(&mut self, total_bits: u32) {
        debug_assert!((NOP_COUNT_BITS..=NOP_MAX_BODY_BITS).contains(&total_bits));
        let fill = total_bits - NOP_COUNT_BITS;
        self.append_bits(fill, NOP_COUNT_BITS);
        self.append_bits_wide(0, fill);
    }

    /// Flushes the pending body and pads the stream to a 64-bit boundary with
    /// no-op commands. The final header's own body is never written; a decoder
    /// stops at the end of the buffer before it needs it.
    pub fn finish(&mut self) {
        // 1. A no-op header to flush the last real body.
        self.append_bits(opcode::V_NO_OP, HEADER_BITS);
        let last = std::mem::take(&mut self.last_body);
        self.append_body(&last);

        if self.bit_length() % STREAM_ALIGNMENT_BITS == 0 {
            log::debug!("command stream already aligned at {} bits", self.bit_length());
            return;
        }

        // 2. A second header; the first no-op's body becomes the padding.
        self.append_bits(opcode::V_NO_OP, HEADER_BITS);
        let mut pad = (STREAM_ALIGNMENT_BITS - self.bit_length() % STREAM_ALIGNMENT_BITS)
            % STREAM_ALIGNMENT_BITS;
        if pad < NOP_COUNT_BITS as usize {
            pad += STREAM_ALIGNMENT_BITS;
        }
        let pad = pad as u32;
        if pad <= NOP_MAX_BODY_BITS {
            self.append_nop_body(pad);
            log::debug!("padded command stream with a {}-bit no-op body", pad);
            return;
        }

        // 3. Too long for one body: a fixed 24-bit body, a third header, then
        //    the remainder (5..=36 bits) as the second no-op's body.
        self.append_bits(NOP_SPLIT_BODY, NOP_SPLIT_BODY_BITS);
        self.append_bits(opcode::V_NO_OP, HEADER_BITS);
        self.append_nop_body(pad - NOP_SPLIT_BODY_BITS - HEADER_BITS);
        log::debug!("padded command stream with split no-op bodies ({} bits)", pad);
    }

    /// Total bits written.
    pub fn bit_length(&self) -> usize {
        if self.byte_offset == 0 && self.bit_offset == 0 {
            0
        } else {
            self.byte_offset * 8 + self.bit_offset as usize
        }
    }

    /// Logical length in bytes: 0 when empty, else `byte_offset + 1`.
    pub fn byte_length(&self) -> usize {
        if self.byte_offset == 0 && self.bit_offset == 0 {
            0
        } else {
            self.byte_offset + 1
        }
    }

    /// The whole underlying buffer; may be longer than `byte_length()`.
    pub fn raw_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// A copy of the logical bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes[..self.byte_length()].to_vec()
    }

    /// Checks the post-`finish` invariants.
    pub fn check_finished(&self) -> Result<(), MeshpackError> {
        if self.bit_length() % STREAM_ALIGNMENT_BITS != 0 {
            return Err(MeshpackError::InternalError(format!(
                "command stream ends at bit {}, not on a 64-bit boundary",
                self.bit_length()
            )));
        }
        if !self.last_body.is_empty() {
            return Err(MeshpackError::InternalError(
                "command stream has a pending body after finish".to_string(),
            ));
        }
        Ok(())
    }
}

//==================================================================================
// 4. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_bits_is_msb_first() {
        let mut cs = CommandStream::with_capacity(1);
        cs.append_bits(0b101, 3);
        cs.append_bits(0b11111, 5);
        cs.append_bits(0b1, 1);
        assert_eq!(cs.byte_length(), 2);
        assert_eq!(cs.bit_length(), 9);
        assert_eq!(&cs.raw_bytes()[..2], &[0b1011_1111, 0b1000_0000]);
    }

    #[test]
    fn test_full_byte_does_not_advance_cursor() {
        let mut cs = CommandStream::new();
        cs.append_bits(0xAB, 8);
        assert_eq!(cs.byte_length(), 1);
        assert_eq!(cs.to_bytes(), vec![0xAB]);
    }

    #[test]
    fn test_wide_append_grows_buffer() {
        let mut cs = CommandStream::with_capacity(8);
        for _ in 0..10 {
            cs.append_bits_wide(0xDEAD_BEEF_CAFE_F00D, 64);
        }
        assert_eq!(cs.byte_length(), 80);
        assert_eq!(&cs.to_bytes()[..8], &0xDEAD_BEEF_CAFE_F00Du64.to_be_bytes());
        assert!(cs.raw_bytes().len() >= 80);
    }

    #[test]
    fn test_emit_command_writes_previous_body() {
        let mut cs = CommandStream::new();
        cs.emit(0xAA, 8, 0b111, 3);
        // First header, then the primed 5-bit empty no-op body.
        assert_eq!(cs.bit_length(), 13);
        assert_eq!(cs.raw_bytes()[0], 0xAA);
        assert_eq!(cs.raw_bytes()[1], 0);
        cs.emit(0x55, 8, 0, 0);
        // Second header, then the first command's body.
        assert_eq!(cs.bit_length(), 24);
        assert_eq!(cs.to_bytes(), vec![0xAA, 0b0000_0010, 0b1010_1111]);
    }

    #[test]
    fn test_finish_pads_to_64_bits_for_every_offset() {
        for lead in 0..200u32 {
            let mut cs = CommandStream::new();
            cs.emit(opcode::SET_STATE, 8, 0, 3);
            for _ in 0..lead / 32 {
                cs.append_bits_wide(u64::MAX, 32);
            }
            cs.append_bits_wide(u64::MAX, lead % 32);
            cs.finish();
            assert_eq!(cs.bit_length() % 64, 0, "lead {}", lead);
            assert_eq!(cs.byte_length() % 8, 0, "lead {}", lead);
            assert!(cs.check_finished().is_ok());
            // Nothing is set past the logical end.
            assert!(cs.raw_bytes()[cs.byte_length()..].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn test_finish_stops_when_already_aligned() {
        let mut cs = CommandStream::new();
        // 8 + 5 + 8 = 21 bits after the header pair; pad the first body so
        // that the flushing no-op lands exactly on 64.
        cs.emit(opcode::SET_STATE, 8, 0, 43);
        cs.finish();
        assert_eq!(cs.bit_length(), 64);
        // The no-op header occupies bits 13..21; its low bit is bit 20.
        assert_eq!(cs.raw_bytes()[2], 0b0000_1000);
    }

    #[test]
    fn test_clear_restores_priming() {
        let mut cs = CommandStream::new();
        cs.emit(0x18, 8, 0b101, 3);
        cs.finish();
        cs.clear();
        assert_eq!(cs.byte_length(), 0);
        cs.emit(0xFF, 8, 0, 0);
        assert_eq!(cs.to_bytes(), vec![0xFF, 0]);
        assert_eq!(cs.bit_length(), 13);
    }

    #[test]
    fn test_body_get_and_tail_cross_word_boundaries() {
        let mut body = CommandBody::EMPTY;
        body.push(0x3F, 6);
        body.push(u64::MAX, 64);
        body.push(0b10, 2);
        assert_eq!(body.len(), 72);
        assert_eq!(body.get(0, 6), 0x3F);
        assert_eq!(body.get(6, 64), u64::MAX);
        assert_eq!(body.get(70, 2), 0b10);
        let tail = body.tail(6);
        assert_eq!(tail.len(), 66);
        assert_eq!(tail.get(64, 2), 0b10);
    }

    #[test]
    fn test_split_header_bits_left_justifies_short_subcommands() {
        let (head, rest) = CommandBody::from_bits(0b101, 3).split_header_bits();
        assert_eq!(head, 0b101_000);
        assert!(rest.is_empty());
        let (head, rest) = CommandBody::from_bits(0b1100_1101, 8).split_header_bits();
        assert_eq!(head, 0b110011);
        assert_eq!(rest, CommandBody::from_bits(0b01, 2));
    }
}
