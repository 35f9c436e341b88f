//! Run length packing with level values (data representation template
//! 5.200). Only unpacking is provided; the writer never emits it.

use crate::bits::NBitwiseIterator;
use crate::error::GribError;
use crate::packers::{DecodeError, RunLengthEncodingDecodeError};

const NUM_BITS: usize = 0;
const MAX_VAL: usize = 1;
const MAX_LEVEL: usize = 2;
const DEC_SCALE: usize = 3;

pub(crate) fn unpack(tmpl: &[i64], payload: &[u8], num_points: usize) -> Result<Vec<f64>, GribError> {
    if tmpl.len() < 4 {
        return Err(DecodeError::RunLengthEncodingDecodeError(
            RunLengthEncodingDecodeError::LengthMismatch,
        )
        .into());
    }
    let nbit = tmpl[NUM_BITS].max(0) as u8;
    let maxv = tmpl[MAX_VAL].max(0) as u16;
    let max_level = tmpl[MAX_LEVEL].max(0) as usize;
    let num_digits = tmpl[DEC_SCALE].max(0) as i32;

    if tmpl.len() < 4 + max_level {
        return Err(DecodeError::RunLengthEncodingDecodeError(
            RunLengthEncodingDecodeError::LengthMismatch,
        )
        .into());
    }

    // Level 0 stands for "no value at this point".
    let mut level_map = Vec::with_capacity(max_level + 1);
    level_map.push(f64::NAN);
    let factor = 10f64.powi(-num_digits);
    for val in &tmpl[4..4 + max_level] {
        level_map.push(*val as f64 * factor);
    }

    let decoded_levels = rleunpack(payload, nbit, maxv, Some(num_points))
        .map_err(DecodeError::RunLengthEncodingDecodeError)?;

    let level_to_value = |level: &u16| -> Result<f64, DecodeError> {
        level_map
            .get(usize::from(*level))
            .copied()
            .ok_or(DecodeError::RunLengthEncodingDecodeError(
                RunLengthEncodingDecodeError::InvalidLevelValue(*level),
            ))
    };

    let decoded: Result<Vec<_>, _> = decoded_levels.iter().map(level_to_value).collect();
    Ok(decoded?)
}

// Since maxv is represented as a 16-bit integer, values are 16 bits or
// less; run lengths are accumulated in usize so a full-width stream
// cannot overflow the base computation.
fn rleunpack(
    input: &[u8],
    nbit: u8,
    maxv: u16,
    expected_len: Option<usize>,
) -> Result<Box<[u16]>, RunLengthEncodingDecodeError> {
    if nbit == 0 || nbit > 16 {
        return Err(RunLengthEncodingDecodeError::InvalidBitWidth(nbit));
    }

    let mut out_buf = match expected_len {
        Some(sz) => Vec::with_capacity(sz),
        None => Vec::new(),
    };

    let rlbase = u32::from(maxv) + 1;
    // When maxv saturates the bit width no stream value can reach
    // rlbase, so the run-length base degenerates harmlessly to 1.
    let lngu = (1usize << nbit).saturating_sub(rlbase as usize).max(1);
    let mut cached = None;
    let mut exp: usize = 1;
    let iter = NBitwiseIterator::new(input, usize::from(nbit));

    for value in iter {
        if rlbase > value {
            out_buf.push(value as u16);
            cached = Some(value as u16);
            exp = 1;
        } else {
            let prev = cached.ok_or(RunLengthEncodingDecodeError::InvalidFirstValue)?;
            let length = ((value - rlbase) as usize) * exp;
            out_buf.append(&mut vec![prev; length]);
            exp *= lngu;
        }
    }

    if let Some(len) = expected_len {
        if len != out_buf.len() {
            return Err(RunLengthEncodingDecodeError::LengthMismatch);
        }
    }

    Ok(out_buf.into_boxed_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_map_to_scaled_representative_values() {
        // nbit=8, maxv=250, two levels scaled by 10^-1.
        let tmpl = vec![8, 250, 2, 1, 105, 213];
        let payload = vec![1u8, 2, 1];
        let decoded = unpack(&tmpl, &payload, 3).unwrap();
        assert_eq!(decoded, vec![10.5, 21.3, 10.5]);
    }

    #[test]
    fn level_zero_decodes_to_nan() {
        let tmpl = vec![8, 250, 1, 0, 42];
        let payload = vec![0u8, 1];
        let decoded = unpack(&tmpl, &payload, 2).unwrap();
        assert!(decoded[0].is_nan());
        assert_eq!(decoded[1], 42.0);
    }

    #[test]
    fn run_markers_repeat_the_previous_level() {
        // maxv=250, so 253 encodes a run of (253 - 251) = 2 more copies.
        let tmpl = vec![8, 250, 3, 0, 10, 20, 30];
        let payload = vec![1u8, 253, 2, 3];
        let decoded = unpack(&tmpl, &payload, 5).unwrap();
        assert_eq!(decoded, vec![10.0, 10.0, 10.0, 20.0, 30.0]);
    }

    #[test]
    fn chained_run_markers_build_multibyte_lengths() {
        // maxv=3: markers 20 and 28 chain to (20-4) + (28-4)*252 = 6064
        // extra copies of level 1.
        let tmpl = vec![8, 3, 1, 0, 7];
        let payload = vec![1u8, 20, 28];
        let decoded = unpack(&tmpl, &payload, 6065).unwrap();
        assert_eq!(decoded.len(), 6065);
        assert!(decoded.iter().all(|v| *v == 7.0));
    }

    #[test]
    fn sixteen_bit_widths_are_decoded() {
        // Full-width levels: value 302 is a run marker past maxv=300.
        let tmpl = vec![16, 300, 1, 0, 7];
        let payload = vec![0u8, 1, 1, 46];
        let decoded = unpack(&tmpl, &payload, 2).unwrap();
        assert_eq!(decoded, vec![7.0, 7.0]);
    }

    #[test]
    fn out_of_range_bit_widths_are_rejected() {
        for nbit in [0i64, 17, 32] {
            let tmpl = vec![nbit, 3, 1, 0, 7];
            assert!(unpack(&tmpl, &[0u8; 4], 1).is_err(), "nbit {nbit}");
        }
    }

    #[test]
    fn run_marker_before_any_level_is_rejected() {
        let tmpl = vec![8, 3, 1, 0, 7];
        let payload = vec![5u8];
        assert!(unpack(&tmpl, &payload, 1).is_err());
    }
}
