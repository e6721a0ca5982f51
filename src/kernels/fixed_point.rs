//! This module contains the pure, stateless kernels for mapping floating-point
//! positions and colors into the 16-bit signed fixed-point domain of the
//! command stream, and for measuring how many bits a group of fixed-point
//! components needs.
//!
//! Every quantized value lives in the full 16-bit domain (`value * 32768`)
//! regardless of the active width; a width of `w` bits simply zeroes the low
//! `16 - w` bits, which then show up as a right-shift in the encoding.

/// Denominator of the 16-bit fixed-point domain.
pub const NORMALIZATION_DENOMINATOR: f64 = 32768.0;

/// Width of the fixed-point domain for positions and colors.
pub const FIXED_POINT_BITS: u32 = 16;

//==================================================================================
// 1. Length / Shift Analysis
//==================================================================================

/// The number of significant bits and the common trailing-zero count of a
/// group of components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LengthShift {
    pub length: u32,
    pub shift: u32,
}

/// Bits needed to hold `v` in two's complement, including the sign bit.
/// Zero needs no bits.
pub fn signed_length(v: i32) -> u32 {
    if v == 0 {
        0
    } else if v > 0 {
        33 - v.leading_zeros()
    } else {
        33 - (!v).leading_zeros()
    }
}

/// Bits needed to hold non-negative `v`.
pub fn unsigned_length(v: i32) -> u32 {
    debug_assert!(v >= 0);
    32 - (v as u32).leading_zeros()
}

fn common_shift(values: &[i32]) -> u32 {
    let all = values.iter().fold(0i32, |acc, &v| acc | v);
    if all == 0 {
        0
    } else {
        all.trailing_zeros()
    }
}

/// Length and shift of signed components (positions, colors, signed deltas).
pub fn analyze_signed(values: &[i32]) -> LengthShift {
    LengthShift {
        length: values.iter().map(|&v| signed_length(v)).max().unwrap_or(0),
        shift: common_shift(values),
    }
}

/// Length and shift of unsigned components (absolute normal parameters).
pub fn analyze_unsigned(values: &[i32]) -> LengthShift {
    LengthShift {
        length: values.iter().map(|&v| unsigned_length(v)).max().unwrap_or(0),
        shift: common_shift(values),
    }
}

//==================================================================================
// 2. Positions
//==================================================================================

/// `(2^(w-1) - 1) / 2^(w-1)`: the largest magnitude representable at width `w`,
/// as a fraction of one.
fn one_quantum_below_one(bits: u32) -> f64 {
    let half = (1u64 << (bits - 1)) as f64;
    (half - 1.0) / half
}

/// The uniform scale that maps the longest axis of a bounding box onto
/// `(-1, 1)` with its extremes exactly one quantum inside the interval.
///
/// A degenerate box (zero extent) is treated as having unit half-extent, so
/// every position lands on the center.
pub fn position_scale(longest_range: f64, bits: u32) -> f64 {
    let range = if longest_range > 0.0 { longest_range } else { 2.0 };
    (2.0 / range) * one_quantum_below_one(bits)
}

/// Quantizes one position component into the 16-bit fixed-point domain.
///
/// The result, shifted down by `16 - bits`, always lies within
/// `[-(2^(bits-1) - 1), 2^(bits-1) - 1]`.
pub fn quantize_position(value: f32, center: f64, scale: f64, bits: u32) -> i32 {
    let limit = (1i64 << (bits - 1)) - 1;
    let normalized = (value as f64 - center) * scale;
    let q = (normalized * (1i64 << (bits - 1)) as f64).round() as i64;
    let q = q.clamp(-limit, limit);
    (q << (FIXED_POINT_BITS - bits)) as i32
}

//==================================================================================
// 3. Colors
//==================================================================================

/// Quantizes one color component into the 16-bit fixed-point domain. Input is
/// clamped to `[0, 1)`: 1.0 maps to one quantum below one.
pub fn quantize_color(value: f32, bits: u32) -> i32 {
    let limit = (1i64 << (bits - 1)) - 1;
    let clamped = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) as f64 };
    let q = ((clamped * (1i64 << (bits - 1)) as f64).floor() as i64).clamp(0, limit);
    (q << (FIXED_POINT_BITS - bits)) as i32
}

//==================================================================================
// 4. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_length_includes_sign_bit() {
        assert_eq!(signed_length(0), 0);
        assert_eq!(signed_length(1), 2);
        assert_eq!(signed_length(-1), 1);
        assert_eq!(signed_length(-2), 2);
        assert_eq!(signed_length(32767), 16);
        assert_eq!(signed_length(-32768), 16);
        assert_eq!(signed_length(65534), 17);
    }

    #[test]
    fn test_analyze_signed_common_shift() {
        let ls = analyze_signed(&[0x4000, -0x2000, 0]);
        assert_eq!(ls.length, 16);
        assert_eq!(ls.shift, 13);
        assert_eq!(analyze_signed(&[0, 0, 0]), LengthShift::default());
    }

    #[test]
    fn test_analyze_unsigned_normal_params() {
        let ls = analyze_unsigned(&[32, 0]);
        assert_eq!(ls, LengthShift { length: 6, shift: 5 });
    }

    #[test]
    fn test_position_extremes_are_one_quantum_inside() {
        for bits in 2..=16u32 {
            let scale = position_scale(10.0, bits);
            let hi = quantize_position(5.0, 0.0, scale, bits) >> (16 - bits);
            let lo = quantize_position(-5.0, 0.0, scale, bits) >> (16 - bits);
            let limit = (1i32 << (bits - 1)) - 1;
            assert_eq!(hi, limit, "bits {}", bits);
            assert_eq!(lo, -limit, "bits {}", bits);
        }
    }

    #[test]
    fn test_quantized_positions_keep_low_bits_clear() {
        let scale = position_scale(2.0, 9);
        let q = quantize_position(0.3337, 0.0, scale, 9);
        assert_eq!(q & 0x7F, 0);
    }

    #[test]
    fn test_degenerate_box_collapses_to_center() {
        let scale = position_scale(0.0, 16);
        assert_eq!(quantize_position(3.0, 3.0, scale, 16), 0);
    }

    #[test]
    fn test_color_right_endpoint_is_one_quantum_below_one() {
        assert_eq!(quantize_color(1.0, 16), 32767);
        assert_eq!(quantize_color(1.5, 9), 255 << 7);
        assert_eq!(quantize_color(-0.2, 9), 0);
        assert_eq!(quantize_color(0.5, 2), 1 << 14);
    }
}
