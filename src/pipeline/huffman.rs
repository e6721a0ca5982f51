//! Adaptive tag assignment for the position, color, and normal encoding tables.
//!
//! Each table counts how often every `(data_length, shift, absolute)` encoding
//! occurs during quantization, then builds a minimal-redundancy (Huffman) code
//! over those encodings. The format limits tags to 6 bits, so an over-long code
//! is repaired by merging the deepest encoding into a compatible neighbour
//! (widening the survivor) and rebuilding. Finally every encoding is widened
//! until tag plus data fill at least the 6 header bits of a data command.
//!
//! Leaves live in a flat arena addressed directly by the encoding triple.
//! Merges are recorded as `merged_into` indices and resolved once into a
//! canonical leaf per slot when tags are computed, so lookups never chase chains.

use std::cmp::Reverse;

use crate::error::MeshpackError;
use crate::pipeline::command_stream::{opcode, CommandStream, HEADER_BITS};

//==================================================================================
// 1. Constants & Table Kinds
//==================================================================================

/// Longest tag the format can address.
pub const MAX_TAG_LENGTH: u32 = 6;
/// Shortest legal tag-plus-data length for a data command.
pub const MIN_SUBCOMMAND_BITS: u32 = 6;
/// Bits in a SET_TABLE body after the header.
pub const SET_TABLE_BODY_BITS: u32 = 15;

/// The three independent tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Position,
    Color,
    Normal,
}

impl TableKind {
    /// On-wire table selector.
    pub const fn table_id(self) -> u32 {
        match self {
            TableKind::Position => 0,
            TableKind::Color => 1,
            TableKind::Normal => 2,
        }
    }

    pub const fn max_length(self) -> u32 {
        match self {
            TableKind::Position | TableKind::Color => 16,
            TableKind::Normal => 7,
        }
    }

    pub const fn max_shift(self) -> u32 {
        match self {
            TableKind::Position | TableKind::Color => 15,
            TableKind::Normal => 6,
        }
    }

    /// Components counted when checking the minimum subcommand length.
    pub const fn component_count(self) -> u32 {
        match self {
            TableKind::Position | TableKind::Color => 3,
            TableKind::Normal => 2,
        }
    }

    /// Number of distinct encodings: 544 for position and color, 112 for normals.
    pub const fn slot_count(self) -> usize {
        ((self.max_shift() + 1) * (self.max_length() + 1) * 2) as usize
    }

    fn slot_index(self, length: u32, shift: u32, absolute: bool) -> Option<usize> {
        if length > self.max_length() || shift > self.max_shift() {
            return None;
        }
        Some(((shift * (self.max_length() + 1) + length) * 2 + u32::from(absolute)) as usize)
    }
}

//==================================================================================
// 2. Encoding Descriptor (tree leaf)
//==================================================================================

/// One encoding and, once tags are computed, the tag that selects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingDescriptor {
    pub data_length: u32,
    pub shift: u32,
    pub absolute: bool,
    pub frequency: u64,
    pub tag: u32,
    pub tag_length: u32,
    /// The leaf this one was folded into during tag-length repair.
    pub merged_into: Option<usize>,
    /// No other leaf shares this leaf's absolute/relative status.
    pub unmergeable: bool,
}

impl EncodingDescriptor {
    fn new(data_length: u32, shift: u32, absolute: bool) -> Self {
        Self {
            data_length,
            shift,
            absolute,
            frequency: 0,
            tag: 0,
            tag_length: 0,
            merged_into: None,
            unmergeable: false,
        }
    }

    /// Bits sent per component.
    pub fn component_bits(&self) -> u32 {
        self.data_length - self.shift
    }

    fn same_encoding(&self, other: &EncodingDescriptor) -> bool {
        self.data_length == other.data_length
            && self.shift == other.shift
            && self.absolute == other.absolute
    }
}

#[derive(Debug, Clone, Copy)]
enum TreeNode {
    Leaf(usize),
    Internal { child0: usize, child1: usize },
}

//==================================================================================
// 3. The Encoding Table
//==================================================================================

#[derive(Debug, Clone)]
pub struct EncodingTable {
    kind: TableKind,
    leaves: Vec<EncodingDescriptor>,
    slots: Vec<Option<usize>>,
    /// Surviving leaves, in first-occurrence order.
    live: Vec<usize>,
    canonical: Vec<usize>,
    computed: bool,
}

impl EncodingTable {
    pub fn new(kind: TableKind) -> Self {
        Self {
            kind,
            leaves: Vec::new(),
            slots: vec![None; kind.slot_count()],
            live: Vec::new(),
            canonical: Vec::new(),
            computed: false,
        }
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn clear(&mut self) {
        self.leaves.clear();
        self.slots.iter_mut().for_each(|s| *s = None);
        self.live.clear();
        self.canonical.clear();
        self.computed = false;
    }

    /// True when no occurrence was ever recorded.
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Records one use of an encoding, creating its descriptor on first use.
    pub fn add_occurrence(
        &mut self,
        length: u32,
        shift: u32,
        absolute: bool,
    ) -> Result<(), MeshpackError> {
        if self.computed {
            return Err(MeshpackError::InternalError(format!(
                "{:?} table: occurrence added after tags were computed",
                self.kind
            )));
        }
        let slot = self.kind.slot_index(length, shift, absolute).ok_or_else(|| {
            MeshpackError::InternalError(format!(
                "{:?} table: encoding (length {}, shift {}) out of range",
                self.kind, length, shift
            ))
        })?;
        let leaf = match self.slots[slot] {
            Some(leaf) => leaf,
            None => {
                self.leaves
                    .push(EncodingDescriptor::new(length, shift, absolute));
                let leaf = self.leaves.len() - 1;
                self.slots[slot] = Some(leaf);
                leaf
            }
        };
        self.leaves[leaf].frequency += 1;
        Ok(())
    }

    /// Builds the code, repairs over-long tags, and widens short encodings.
    pub fn compute_tags(&mut self) -> Result<(), MeshpackError> {
        self.live = (0..self.leaves.len())
            .filter(|&i| self.leaves[i].frequency > 0 && self.leaves[i].merged_into.is_none())
            .collect();

        let mut merges = 0usize;
        if !self.live.is_empty() {
            loop {
                self.assign_tags();
                let longest = self.live.iter().map(|&l| self.leaves[l].tag_length).max();
                if longest.unwrap_or(0) <= MAX_TAG_LENGTH {
                    break;
                }
                self.merge_deepest()?;
                merges += 1;
            }
            self.expand();
        }
        self.resolve_canonical();
        self.computed = true;

        log::debug!(
            "{:?} table: {} encodings -> {} tags after {} merges",
            self.kind,
            self.leaves.len(),
            self.live.len(),
            merges
        );
        Ok(())
    }

    fn assign_tags(&mut self) {
        if self.live.len() == 1 {
            let d = &mut self.leaves[self.live[0]];
            d.tag = 0;
            d.tag_length = 0;
            return;
        }

        let mut tree: Vec<TreeNode> = self.live.iter().map(|&l| TreeNode::Leaf(l)).collect();
        let mut weight: Vec<u64> = self.live.iter().map(|&l| self.leaves[l].frequency).collect();
        let mut queue: Vec<usize> = (0..tree.len()).collect();
        queue.sort_by_key(|&n| weight[n]);

        while queue.len() > 1 {
            let child0 = queue.remove(0);
            let child1 = queue.remove(0);
            let w = weight[child0] + weight[child1];
            tree.push(TreeNode::Internal { child0, child1 });
            weight.push(w);
            let id = tree.len() - 1;
            let pos = queue.partition_point(|&n| weight[n] <= w);
            queue.insert(pos, id);
        }

        // Tags deeper than 31 bits are only ever measured, never emitted.
        let mut stack = vec![(queue[0], 0u32, 0u32)];
        while let Some((id, tag, depth)) = stack.pop() {
            match tree[id] {
                TreeNode::Leaf(l) => {
                    self.leaves[l].tag = tag;
                    self.leaves[l].tag_length = depth;
                }
                TreeNode::Internal { child0, child1 } => {
                    let extend = |bit: u32| if depth < 31 { (tag << 1) | bit } else { 0 };
                    stack.push((child1, extend(1), depth + 1));
                    stack.push((child0, extend(0), depth + 1));
                }
            }
        }
    }

    /// Folds the deepest mergeable leaf into its cheapest compatible partner.
    /// Victim and partner order are total, so the result is deterministic.
    fn merge_deepest(&mut self) -> Result<(), MeshpackError> {
        let mut order = self.live.clone();
        order.sort_by(|&a, &b| {
            let (da, db) = (&self.leaves[a], &self.leaves[b]);
            db.tag_length
                .cmp(&da.tag_length)
                .then(da.frequency.cmp(&db.frequency))
                .then(a.cmp(&b))
        });

        for victim in order {
            if self.leaves[victim].unmergeable {
                continue;
            }
            match self.best_partner(victim) {
                Some(partner) => {
                    self.merge(victim, partner);
                    return Ok(());
                }
                None => self.leaves[victim].unmergeable = true,
            }
        }
        Err(MeshpackError::InternalError(format!(
            "{:?} table: no mergeable encoding while a tag exceeds {} bits",
            self.kind, MAX_TAG_LENGTH
        )))
    }

    /// The partner whose widening costs the fewest extra bits overall.
    fn best_partner(&self, victim: usize) -> Option<usize> {
        let v = &self.leaves[victim];
        self.live
            .iter()
            .copied()
            .filter(|&p| p != victim && self.leaves[p].absolute == v.absolute)
            .min_by_key(|&p| {
                let c = &self.leaves[p];
                let width = v.data_length.max(c.data_length) - v.shift.min(c.shift);
                let cost = u64::from(width - v.component_bits()) * v.frequency
                    + u64::from(width - c.component_bits()) * c.frequency;
                (cost, Reverse(c.frequency), p)
            })
    }

    fn merge(&mut self, victim: usize, partner: usize) {
        let (v_len, v_shift, v_freq) = {
            let v = &self.leaves[victim];
            (v.data_length, v.shift, v.frequency)
        };
        {
            let p = &mut self.leaves[partner];
            p.data_length = p.data_length.max(v_len);
            p.shift = p.shift.min(v_shift);
            p.frequency += v_freq;
        }
        self.leaves[victim].merged_into = Some(partner);
        self.live.retain(|&l| l != victim);
        log::trace!(
            "{:?} table: merged encoding {} into {} -> ({}, {})",
            self.kind,
            victim,
            partner,
            self.leaves[partner].data_length,
            self.leaves[partner].shift
        );

        let duplicate = self
            .live
            .iter()
            .copied()
            .find(|&o| o != partner && self.leaves[o].same_encoding(&self.leaves[partner]));
        if let Some(dup) = duplicate {
            let freq = self.leaves[partner].frequency;
            self.leaves[dup].frequency += freq;
            self.leaves[partner].merged_into = Some(dup);
            self.live.retain(|&l| l != partner);
        }
    }

    /// Widens every live encoding until tag plus data reach the 6-bit minimum:
    /// first by lowering the shift, then by growing the data length. A zero
    /// data length is always widened; the 4-bit SET_TABLE field reads 0 as 16.
    fn expand(&mut self) {
        let components = self.kind.component_count();
        let max_length = self.kind.max_length();
        for &l in &self.live {
            let d = &mut self.leaves[l];
            while d.data_length == 0
                || d.tag_length + components * d.component_bits() < MIN_SUBCOMMAND_BITS
            {
                if d.shift > 0 {
                    d.shift -= 1;
                } else if d.data_length < max_length {
                    d.data_length += 1;
                } else {
                    break;
                }
            }
        }
    }

    fn resolve_canonical(&mut self) {
        let n = self.leaves.len();
        self.canonical = (0..n)
            .map(|start| {
                let mut at = start;
                let mut hops = 0;
                while let Some(next) = self.leaves[at].merged_into {
                    at = next;
                    hops += 1;
                    if hops > n {
                        break;
                    }
                }
                at
            })
            .collect();
    }

    /// The surviving descriptor (and tag) for an encoding seen during quantization.
    pub fn lookup(
        &self,
        length: u32,
        shift: u32,
        absolute: bool,
    ) -> Result<&EncodingDescriptor, MeshpackError> {
        if !self.computed {
            return Err(MeshpackError::InternalError(format!(
                "{:?} table: lookup before tags were computed",
                self.kind
            )));
        }
        let leaf = self
            .kind
            .slot_index(length, shift, absolute)
            .and_then(|slot| self.slots[slot])
            .ok_or_else(|| {
                MeshpackError::InternalError(format!(
                    "{:?} table: encoding (length {}, shift {}, absolute {}) was never recorded",
                    self.kind, length, shift, absolute
                ))
            })?;
        Ok(&self.leaves[self.canonical[leaf]])
    }

    /// Surviving leaves after `compute_tags`.
    pub fn leaves(&self) -> impl Iterator<Item = &EncodingDescriptor> + '_ {
        self.live.iter().map(move |&l| &self.leaves[l])
    }

    /// One SET_TABLE command per surviving leaf.
    pub fn emit_table_commands(&self, writer: &mut CommandStream) {
        for d in self.leaves() {
            let address = (d.tag << (7 - d.tag_length)) | (1 << (6 - d.tag_length));
            let header = opcode::SET_TABLE | (self.kind.table_id() << 1) | (address >> 6);
            let body = ((address & 0x3F) << 9)
                | ((d.data_length & 0xF) << 5)
                | (u32::from(d.absolute) << 4)
                | (d.shift & 0xF);
            writer.emit(header, HEADER_BITS, u64::from(body), SET_TABLE_BODY_BITS);
        }
    }
}

//==================================================================================
// 4. The Three Tables Together
//==================================================================================

#[derive(Debug, Clone)]
pub struct EncodingTables {
    pub position: EncodingTable,
    pub color: EncodingTable,
    pub normal: EncodingTable,
}

impl Default for EncodingTables {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodingTables {
    pub fn new() -> Self {
        Self {
            position: EncodingTable::new(TableKind::Position),
            color: EncodingTable::new(TableKind::Color),
            normal: EncodingTable::new(TableKind::Normal),
        }
    }

    pub fn clear(&mut self) {
        self.position.clear();
        self.color.clear();
        self.normal.clear();
    }

    pub fn compute_tags(&mut self) -> Result<(), MeshpackError> {
        self.position.compute_tags()?;
        self.color.compute_tags()?;
        self.normal.compute_tags()
    }

    pub fn emit_table_commands(&self, writer: &mut CommandStream) {
        self.position.emit_table_commands(writer);
        self.color.emit_table_commands(writer);
        self.normal.emit_table_commands(writer);
    }

    pub fn table(&self, kind: TableKind) -> &EncodingTable {
        match kind {
            TableKind::Position => &self.position,
            TableKind::Color => &self.color,
            TableKind::Normal => &self.normal,
        }
    }
}

//==================================================================================
// 5. Unit Tests
//==================================================================================
