//! Normal vector encoding by octant, sextant, and two angular parameters.
//!
//! The unit sphere is folded twice. The three sign bits select an octant;
//! ordering the absolute components selects one of six sextants. What remains
//! is a small spherical triangle with corners at a coordinate axis, at an edge
//! midpoint `(1, 1, 0) / sqrt(2)` and at the octant diagonal `(1, 1, 1) / sqrt(3)`.
//! Inside it a normal is described by `u` (how far it has rotated from the
//! edge plane back toward the axis) and `v` (its elevation toward the diagonal),
//! each quantized to `bits` bits.
//!
//! Three points cannot be addressed on the `u`/`v` grid and are escaped through
//! the unused sextant codes: sextant 7 carries the six axes (octant field
//! 0..5 = +x, -x, +y, -y, +z, -z) and sextant 6 carries the eight octant
//! diagonals. Edge midpoints are the grid origin `u = v = 0`. At 0-bit
//! quantization every normal snaps to one of these 26 vectors.

use std::f64::consts::FRAC_PI_4;

/// Width of the `u`/`v` fixed-point domain.
pub const NORMAL_PARAM_BITS: u32 = 6;

/// Sextant escape code for the octant diagonals.
pub const SEXTANT_DIAGONAL: u8 = 6;
/// Sextant escape code for the coordinate axes.
pub const SEXTANT_AXIS: u8 = 7;

/// Elevation of the octant diagonal above the edge plane: `atan(1 / sqrt(2))`.
const PSI_MAX: f64 = 0.615_479_708_670_387_3;

/// A quantized normal. `u` and `v` are in the 6-bit domain (`value << (6 - bits)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncodedNormal {
    pub sextant: u8,
    pub octant: u8,
    pub u: i32,
    pub v: i32,
    pub special: bool,
}

impl EncodedNormal {
    fn axis(code: u8) -> Self {
        Self {
            sextant: SEXTANT_AXIS,
            octant: code,
            u: 0,
            v: 0,
            special: true,
        }
    }

    fn diagonal(octant: u8) -> Self {
        Self {
            sextant: SEXTANT_DIAGONAL,
            octant,
            u: 0,
            v: 0,
            special: true,
        }
    }

    /// Whether `next` may be sent as a `(du, dv)` delta against `self`.
    pub fn allows_delta_to(&self, next: &EncodedNormal) -> bool {
        !self.special
            && !next.special
            && self.sextant == next.sextant
            && self.octant == next.octant
    }
}

/// Orders `(a, b, c)` into `(major, mid, minor)` and names the sextant.
/// Returns `(sextant, major_axis, major, mid, minor)`.
fn fold_sextant(a: f64, b: f64, c: f64) -> (u8, u8, f64, f64, f64) {
    if a >= b {
        if b >= c {
            (0, 0, a, b, c)
        } else if a >= c {
            (1, 0, a, c, b)
        } else {
            (4, 2, c, a, b)
        }
    } else if a >= c {
        (2, 1, b, a, c)
    } else if b >= c {
        (3, 1, b, c, a)
    } else {
        (5, 2, c, b, a)
    }
}

/// Encodes a unit normal at `bits` (0..=6) bits per parameter.
///
/// The input is assumed to be unit length; it is renormalized to absorb
/// rounding. A zero vector encodes as `+z`.
pub fn encode_normal(normal: [f32; 3], bits: u32) -> EncodedNormal {
    let (x, y, z) = (normal[0] as f64, normal[1] as f64, normal[2] as f64);
    let len = (x * x + y * y + z * z).sqrt();
    if len.is_nan() || len <= 0.0 {
        return EncodedNormal::axis(4);
    }
    let (x, y, z) = (x / len, y / len, z / len);

    let mut octant = 0u8;
    if x < 0.0 {
        octant |= 4;
    }
    if y < 0.0 {
        octant |= 2;
    }
    if z < 0.0 {
        octant |= 1;
    }
    let (sextant, major_axis, major, mid, minor) = fold_sextant(x.abs(), y.abs(), z.abs());
    let axis_negative = match major_axis {
        0 => octant & 4 != 0,
        1 => octant & 2 != 0,
        _ => octant & 1 != 0,
    };
    let axis_code = major_axis * 2 + u8::from(axis_negative);

    if bits == 0 {
        // Nearest of axis, edge midpoint, diagonal, by dot product.
        let axis_dot = major;
        let edge_dot = (major + mid) * std::f64::consts::FRAC_1_SQRT_2;
        let diag_dot = (major + mid + minor) / 3f64.sqrt();
        return if axis_dot >= edge_dot && axis_dot >= diag_dot {
            EncodedNormal::axis(axis_code)
        } else if diag_dot > edge_dot {
            EncodedNormal::diagonal(octant)
        } else {
            EncodedNormal {
                sextant,
                octant,
                u: 0,
                v: 0,
                special: false,
            }
        };
    }

    let theta = mid.atan2(major);
    let psi = minor.atan2(major.hypot(mid));
    let u = 1.0 - theta / FRAC_PI_4;
    let v = psi / PSI_MAX;

    let steps = (1i32 << bits) as f64;
    let max = (1i32 << bits) - 1;
    let uq = (u * steps).round() as i32;
    let vq = (v * steps).round() as i32;

    if vq > max {
        return EncodedNormal::diagonal(octant);
    }
    if uq > max && vq == 0 {
        return EncodedNormal::axis(axis_code);
    }
    let shift = NORMAL_PARAM_BITS - bits;
    EncodedNormal {
        sextant,
        octant,
        u: uq.clamp(0, max) << shift,
        v: vq.clamp(0, max) << shift,
        special: false,
    }
}
