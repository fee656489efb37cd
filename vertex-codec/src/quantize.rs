//! Scalar quantization rules
//!
//! Converts between f32 and the packed component encodings:
//! - f32 → f16 (IEEE 754 half-float, round-to-nearest)
//! - f32 → snorm8/snorm16 (symmetric, never emits -128 / -32768)
//! - f32 → unorm8/unorm16 (saturating)
//!
//! Every encoder sanitizes non-finite input to 0 first, so no encoder can
//! produce a non-finite or out-of-range value.

use half::f16;

/// Replace NaN and ±Inf with 0.0
#[inline]
pub fn sanitize(value: f32) -> f32 {
    if value.is_finite() { value } else { 0.0 }
}

// ============================================================================
// Float Conversion
// ============================================================================

/// Convert f32 to IEEE 754 binary16 bits
///
/// Finite values beyond the f16 range clamp to ±65504 instead of overflowing to
/// infinity.
#[inline]
pub fn f32_to_f16_bits(value: f32) -> u16 {
    let clamped = sanitize(value).clamp(f16::MIN.to_f32(), f16::MAX.to_f32());
    f16::from_f32(clamped).to_bits()
}

/// Convert IEEE 754 binary16 bits to f32
#[inline]
pub fn f16_bits_to_f32(bits: u16) -> f32 {
    f16::from_bits(bits).to_f32()
}

// ============================================================================
// Signed Normalized
// ============================================================================

/// Convert f32 to signed normalized 8-bit integer (snorm8)
///
/// Maps f32 range [-1.0, 1.0] to i8 range [-127, 127], rounding half away
/// from zero.
#[inline]
pub fn f32_to_snorm8(value: f32) -> i8 {
    let clamped = sanitize(value).clamp(-1.0, 1.0);
    (clamped * 127.0).round().clamp(-127.0, 127.0) as i8
}

/// Convert f32 to signed normalized 16-bit integer (snorm16)
///
/// Maps f32 range [-1.0, 1.0] to i16 range [-32767, 32767], rounding half away
/// from zero.
#[inline]
pub fn f32_to_snorm16(value: f32) -> i16 {
    let clamped = sanitize(value).clamp(-1.0, 1.0);
    (clamped * 32767.0).round().clamp(-32767.0, 32767.0) as i16
}

/// Convert snorm8 to f32 in [-1.0, 1.0] (-128 decodes to -1.0)
#[inline]
pub fn snorm8_to_f32(value: i8) -> f32 {
    (value as f32 / 127.0).max(-1.0)
}

/// Convert snorm16 to f32 in [-1.0, 1.0] (-32768 decodes to -1.0)
#[inline]
pub fn snorm16_to_f32(value: i16) -> f32 {
    (value as f32 / 32767.0).max(-1.0)
}

// ============================================================================
// Unsigned Normalized
// ============================================================================

/// Convert f32 to unsigned normalized 8-bit integer (unorm8)
///
/// Maps f32 range [0.0, 1.0] to u8 range [0, 255].
#[inline]
pub fn f32_to_unorm8(value: f32) -> u8 {
    let clamped = sanitize(value).clamp(0.0, 1.0);
    (clamped * 255.0).round() as u8
}

/// Convert f32 to unsigned normalized 16-bit integer (unorm16)
///
/// Maps f32 range [0.0, 1.0] to u16 range [0, 65535].
#[inline]
pub fn f32_to_unorm16(value: f32) -> u16 {
    let clamped = sanitize(value).clamp(0.0, 1.0);
    (clamped * 65535.0).round() as u16
}

#[inline]
pub fn unorm8_to_f32(value: u8) -> f32 {
    value as f32 / 255.0
}

#[inline]
pub fn unorm16_to_f32(value: u16) -> f32 {
    value as f32 / 65535.0
}
