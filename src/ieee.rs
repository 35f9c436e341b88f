//! Conversion between field values and their IEEE 754 single-precision
//! wire representation.
//!
//! Field values travel through the crate as `f64` and are narrowed to
//! 32 bits only here, at the emission sites (reference values, vertical
//! coordinate lists and IEEE-packed payloads).

/// Returns the IEEE 754 single-precision bit pattern of `value`.
///
/// Wider inputs are rounded to nearest by the `f64` -> `f32` conversion.
pub fn float_to_u32(value: f64) -> u32 {
    (value as f32).to_bits()
}

/// Reconstructs a field value from its IEEE 754 single-precision bit
/// pattern. NaN and denormal patterns pass through bit-unchanged.
pub fn u32_to_float(bits: u32) -> f64 {
    f64::from(f32::from_bits(bits))
}

/// Appends `values` as big-endian IEEE 754 single-precision octets.
pub(crate) fn floats_to_be_bytes(values: &[f64], buf: &mut Vec<u8>) {
    for value in values {
        buf.extend_from_slice(&float_to_u32(*value).to_be_bytes());
    }
}

/// Reads consecutive big-endian IEEE 754 single-precision octets.
pub(crate) fn be_bytes_to_floats(buf: &[u8]) -> Vec<f64> {
    buf.chunks_exact(4)
        .map(|chunk| u32_to_float(u32::from_be_bytes(chunk.try_into().unwrap())))
        .collect()
}
