//! The stream element model: one closed enum per thing a caller can put into
//! a compression job, and the small value types those elements carry.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MeshpackError;

//==================================================================================
// 1. Quantization Targets
//==================================================================================

/// The three geometric quantity classes that carry their own quantization
/// width and their own encoding table.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuantizationTarget {
    Position,
    Color,
    Normal,
}

impl QuantizationTarget {
    /// The inclusive range of legal widths, in bits.
    ///
    /// Positions are signed fixed point; a 1-bit signed value has no positive
    /// code, so the usable minimum is 2.
    pub const fn legal_range(self) -> (u32, u32) {
        match self {
            QuantizationTarget::Position => (2, 16),
            QuantizationTarget::Color => (2, 16),
            QuantizationTarget::Normal => (0, 6),
        }
    }

    /// Rejects a width outside [`legal_range`](Self::legal_range).
    pub fn validate(self, bits: u32) -> Result<(), MeshpackError> {
        let (min, max) = self.legal_range();
        if bits < min || bits > max {
            return Err(MeshpackError::InvalidQuantization {
                target: self,
                bits,
                min,
                max,
            });
        }
        Ok(())
    }
}

impl fmt::Display for QuantizationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QuantizationTarget::Position => "position",
            QuantizationTarget::Color => "color",
            QuantizationTarget::Normal => "normal",
        };
        f.write_str(name)
    }
}

//==================================================================================
// 2. Topology
//==================================================================================

/// The primitive class of a whole compressed buffer.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BufferType {
    Point,
    Line,
    Triangle,
}

/// Generalized-strip replacement code attached to every vertex and mesh reference.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReplaceCode {
    /// Start a new strip (counter-clockwise restart on the wire).
    Restart,
    /// Replace the middle vertex of the current triangle (fan behaviour).
    ReplaceMiddle,
    /// Replace the oldest vertex of the current triangle (strip behaviour).
    ReplaceOldest,
}

impl ReplaceCode {
    /// The 2-bit wire value.
    pub const fn wire_code(self) -> u32 {
        match self {
            ReplaceCode::Restart => 1,
            ReplaceCode::ReplaceMiddle => 2,
            ReplaceCode::ReplaceOldest => 3,
        }
    }
}

//==================================================================================
// 3. Vertex Components
//==================================================================================

/// A color with or without alpha. Components are nominally in `[0, 1]`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum Color {
    Rgb([f32; 3]),
    Rgba([f32; 4]),
}

impl Color {
    pub fn kind(&self) -> ColorKind {
        match self {
            Color::Rgb(_) => ColorKind::Rgb,
            Color::Rgba(_) => ColorKind::Rgba,
        }
    }

    /// Components padded to four (alpha = 1.0 for RGB) plus the real count.
    pub fn components(&self) -> ([f32; 4], usize) {
        match *self {
            Color::Rgb([r, g, b]) => ([r, g, b, 1.0], 3),
            Color::Rgba(c) => (c, 4),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ColorKind {
    Rgb,
    Rgba,
}

impl ColorKind {
    pub const fn component_count(self) -> usize {
        match self {
            ColorKind::Rgb => 3,
            ColorKind::Rgba => 4,
        }
    }
}

/// Which optional components every vertex of a stream carries.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    pub normals: bool,
    pub colors: Option<ColorKind>,
}

/// A single streamed vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: Option<[f32; 3]>,
    pub color: Option<Color>,
    pub replace: ReplaceCode,
    /// Push this vertex into the decoder's mesh buffer.
    pub mesh_push: bool,
}

impl Vertex {
    /// A bare position with a strip code and no mesh push.
    pub fn new(position: [f32; 3], replace: ReplaceCode) -> Self {
        Self {
            position,
            normal: None,
            color: None,
            replace,
            mesh_push: false,
        }
    }

    pub fn with_normal(mut self, normal: [f32; 3]) -> Self {
        self.normal = Some(normal);
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn pushed(mut self) -> Self {
        self.mesh_push = true;
        self
    }

    pub fn layout(&self) -> VertexLayout {
        VertexLayout {
            normals: self.normal.is_some(),
            colors: self.color.map(|c| c.kind()),
        }
    }
}

//==================================================================================
// 4. The Stream Element Sum Type
//==================================================================================

/// One entry of an element stream. Order is significant: it is both the
/// emission order and the order deltas are computed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StreamElement {
    Vertex(Vertex),
    /// Global color state for all following vertices.
    Color(Color),
    /// Global normal state for all following vertices.
    Normal([f32; 3]),
    QuantizationChange {
        target: QuantizationTarget,
        bits: u32,
    },
    /// Re-use a vertex from the mesh buffer, `index` pushes back from the top.
    MeshReference {
        replace: ReplaceCode,
        index: usize,
    },
}
