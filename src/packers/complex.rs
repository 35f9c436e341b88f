//! Complex packing (data representation templates 5.2 and 5.3).
//!
//! Values are quantized as in simple packing, optionally replaced by
//! their first or second discrete differences, split into groups of
//! similar magnitude and stored as per-group (reference, width, length)
//! bit planes followed by the group value streams.

use crate::bits::{get_bits, BitWriter, FixedValueIterator, NBitwiseIterator};
use crate::error::GribError;
use crate::helpers::{grib_int_from_bytes, grib_int_to_bytes};
use crate::ieee::{float_to_u32, u32_to_float};
use crate::packers::simple::SimplePackingParam;
use crate::packers::{
    bits_for, scale_values, ComplexPackingDecodeError, DecodeError, EncodeError, PackedField,
};

// Positions within the template 5.2/5.3 value list.
const REF_VAL: usize = 0;
const BIN_SCALE: usize = 1;
const DEC_SCALE: usize = 2;
const NUM_BITS: usize = 3;
const GROUP_SPLITTING: usize = 5;
const MISSING_MGMT: usize = 6;
const PRIMARY_MISSING: usize = 7;
const SECONDARY_MISSING: usize = 8;
const NUM_GROUPS: usize = 9;
const GROUP_WIDTH_REF: usize = 10;
const GROUP_WIDTH_BITS: usize = 11;
const GROUP_LEN_REF: usize = 12;
const GROUP_LEN_INC: usize = 13;
const GROUP_LEN_LAST: usize = 14;
const GROUP_LEN_BITS: usize = 15;
const SPDIFF_ORDER: usize = 16;
const SPDIFF_OCTETS: usize = 17;

pub(crate) const MISSING_VALUE_MANAGEMENT_NONE: i64 = 0;

const TMPL_LEN_52: usize = 16;
const TMPL_LEN_53: usize = 18;

pub(crate) fn pack(tmpl_num: u16, tmpl: &[i64], values: &[f64]) -> Result<PackedField, GribError> {
    let expected = if tmpl_num == 3 { TMPL_LEN_53 } else { TMPL_LEN_52 };
    if tmpl.len() < expected {
        return Err(EncodeError::WrongNumberOfTemplateValues {
            expected,
            actual: tmpl.len(),
        }
        .into());
    }
    if tmpl[MISSING_MGMT] != MISSING_VALUE_MANAGEMENT_NONE {
        return Err(EncodeError::MissingValueManagementUnsupported(tmpl[MISSING_MGMT]).into());
    }

    let exp = tmpl[BIN_SCALE] as i32;
    let dec = tmpl[DEC_SCALE] as i32;
    let scaled = scale_values(values, exp, dec, 0);

    let mut tmpl = tmpl.to_vec();
    tmpl[REF_VAL] = i64::from(float_to_u32(scaled.ref_val));
    tmpl[GROUP_SPLITTING] = 1;
    tmpl[PRIMARY_MISSING] = 0;
    tmpl[SECONDARY_MISSING] = 0;

    // Constant and empty fields short-circuit to the zero-length form.
    if scaled.nbits == 0 {
        for pos in [
            NUM_BITS,
            NUM_GROUPS,
            GROUP_WIDTH_REF,
            GROUP_WIDTH_BITS,
            GROUP_LEN_REF,
            GROUP_LEN_INC,
            GROUP_LEN_LAST,
            GROUP_LEN_BITS,
        ] {
            tmpl[pos] = 0;
        }
        if tmpl_num == 3 {
            tmpl[SPDIFF_ORDER] = 0;
            tmpl[SPDIFF_OCTETS] = 0;
        }
        return Ok(PackedField {
            tmpl,
            payload: Vec::new(),
            num_points: values.len(),
        });
    }

    let mut work: Vec<i64> = scaled.qvals.iter().map(|q| *q as i64).collect();
    let mut payload = Vec::new();

    if tmpl_num == 3 {
        let order = tmpl[SPDIFF_ORDER];
        if !(1..=2).contains(&order) {
            return Err(EncodeError::SpatialDifferencingOrderUnsupported(order).into());
        }
        let order = order as usize;
        let first_vals = work[..order.min(work.len())].to_vec();
        difference(&mut work, order);
        let min = work.iter().copied().min().unwrap_or(0);
        for v in work.iter_mut() {
            *v -= min;
        }

        let max_mag = first_vals
            .iter()
            .chain(std::iter::once(&min))
            .map(|v| v.unsigned_abs())
            .max()
            .unwrap_or(0);
        let num_octets = (bits_for(max_mag) + 1 + 7) / 8;
        for v in first_vals.iter().chain(std::iter::once(&min)) {
            grib_int_to_bytes(*v, num_octets, &mut payload);
        }
        tmpl[SPDIFF_OCTETS] = num_octets as i64;
    }

    let groups = split_groups(&work);

    let refs: Vec<u64> = groups.iter().map(|g| g.min as u64).collect();
    let widths: Vec<usize> = groups
        .iter()
        .map(|g| bits_for((g.max - g.min) as u64))
        .collect();
    let lens: Vec<usize> = groups.iter().map(|g| g.len).collect();

    let ref_bits = bits_for(refs.iter().copied().max().unwrap_or(0));
    let width_ref = widths.iter().copied().min().unwrap_or(0);
    let width_bits = bits_for((widths.iter().copied().max().unwrap_or(0) - width_ref) as u64);
    let len_ref = lens.iter().copied().min().unwrap_or(0);
    let len_bits = bits_for((lens.iter().copied().max().unwrap_or(0) - len_ref) as u64);
    let len_last = *lens.last().unwrap_or(&0);

    append_bit_plane(&mut payload, refs.iter().copied(), ref_bits);
    append_bit_plane(&mut payload, widths.iter().map(|w| (w - width_ref) as u64), width_bits);
    append_bit_plane(&mut payload, lens.iter().map(|l| (l - len_ref) as u64), len_bits);

    let mut writer = BitWriter::new();
    let mut pos = 0;
    for (group, width) in groups.iter().zip(widths.iter()) {
        for v in &work[pos..pos + group.len] {
            writer.append((*v - group.min) as u64, *width);
        }
        pos += group.len;
    }
    payload.extend_from_slice(&writer.finish());

    tmpl[NUM_BITS] = ref_bits as i64;
    tmpl[NUM_GROUPS] = groups.len() as i64;
    tmpl[GROUP_WIDTH_REF] = width_ref as i64;
    tmpl[GROUP_WIDTH_BITS] = width_bits as i64;
    tmpl[GROUP_LEN_REF] = len_ref as i64;
    tmpl[GROUP_LEN_INC] = 1;
    tmpl[GROUP_LEN_LAST] = len_last as i64;
    tmpl[GROUP_LEN_BITS] = len_bits as i64;

    Ok(PackedField {
        tmpl,
        payload,
        num_points: values.len(),
    })
}

/// Replaces `work` with its `order`-th discrete differences, keeping
/// the first `order` entries as they are.
fn difference(work: &mut [i64], order: usize) {
    match order {
        1 => {
            for i in (1..work.len()).rev() {
                work[i] -= work[i - 1];
            }
        }
        2 => {
            for i in (2..work.len()).rev() {
                work[i] -= 2 * work[i - 1] - work[i - 2];
            }
        }
        _ => unreachable!("order validated by the caller"),
    }
}

/// One group of consecutive quantized values.
struct Group {
    min: i64,
    max: i64,
    len: usize,
}

/// Overhead estimate of opening one more group, in bits: its reference,
/// width and length entries.
const GROUP_OVERHEAD_BITS: usize = 32;

/// Greedy group splitting: runs of identical values are merged into the
/// preceding group whenever widening it is cheaper than the overhead of
/// a fresh group.
fn split_groups(work: &[i64]) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    let mut i = 0;
    while i < work.len() {
        let v = work[i];
        let mut run = 1;
        while i + run < work.len() && work[i + run] == v {
            run += 1;
        }

        match groups.last_mut() {
            Some(last) => {
                let merged_min = last.min.min(v);
                let merged_max = last.max.max(v);
                let merged_width = bits_for((merged_max - merged_min) as u64);
                let current_width = bits_for((last.max - last.min) as u64);
                let merge_cost = merged_width * (last.len + run) - current_width * last.len;
                let split_cost = GROUP_OVERHEAD_BITS;
                if merge_cost <= split_cost {
                    last.min = merged_min;
                    last.max = merged_max;
                    last.len += run;
                } else {
                    groups.push(Group {
                        min: v,
                        max: v,
                        len: run,
                    });
                }
            }
            None => groups.push(Group {
                min: v,
                max: v,
                len: run,
            }),
        }
        i += run;
    }
    groups
}

/// Appends one bit plane, padded to the next octet boundary.
fn append_bit_plane(payload: &mut Vec<u8>, values: impl Iterator<Item = u64>, nbits: usize) {
    if nbits == 0 {
        return;
    }
    let mut writer = BitWriter::new();
    for v in values {
        writer.append(v, nbits);
    }
    payload.extend_from_slice(&writer.finish());
}

fn plane_octets(count: usize, nbits: usize) -> usize {
    (count * nbits + 7) / 8
}

pub(crate) fn unpack(
    tmpl_num: u16,
    tmpl: &[i64],
    payload: &[u8],
    num_points: usize,
) -> Result<Vec<f64>, GribError> {
    let expected = if tmpl_num == 3 { TMPL_LEN_53 } else { TMPL_LEN_52 };
    if tmpl.len() < expected {
        return Err(DecodeError::ComplexPackingDecodeError(
            ComplexPackingDecodeError::LengthMismatch,
        )
        .into());
    }

    let param = SimplePackingParam {
        ref_val: u32_to_float(tmpl[REF_VAL] as u32),
        exp: tmpl[BIN_SCALE] as i32,
        dec: tmpl[DEC_SCALE] as i32,
        nbits: tmpl[NUM_BITS].max(0) as usize,
    };
    let missing_mgmt = tmpl[MISSING_MGMT];
    let num_groups = tmpl[NUM_GROUPS].max(0) as usize;

    if num_groups == 0 {
        return Ok(
            FixedValueIterator::new(param.zero_bit_value(), num_points).collect::<Vec<_>>(),
        );
    }
    if missing_mgmt != MISSING_VALUE_MANAGEMENT_NONE {
        return Err(DecodeError::ComplexPackingDecodeError(
            ComplexPackingDecodeError::NotSupported,
        )
        .into());
    }

    let mut pos = 0;

    // Spatial differencing parameters precede the bit planes.
    let (order, first_vals, min) = if tmpl_num == 3 {
        let order = tmpl[SPDIFF_ORDER].max(0) as usize;
        let num_octets = tmpl[SPDIFF_OCTETS].max(0) as usize;
        if !(1..=2).contains(&order) || num_octets == 0 {
            return Err(DecodeError::ComplexPackingDecodeError(
                ComplexPackingDecodeError::NotSupported,
            )
            .into());
        }
        if payload.len() < (order + 1) * num_octets {
            return Err(DecodeError::ComplexPackingDecodeError(
                ComplexPackingDecodeError::LengthMismatch,
            )
            .into());
        }
        let mut first_vals = Vec::with_capacity(order);
        for _ in 0..order {
            first_vals.push(grib_int_from_bytes(&payload[pos..pos + num_octets]));
            pos += num_octets;
        }
        let min = grib_int_from_bytes(&payload[pos..pos + num_octets]);
        pos += num_octets;
        (order, first_vals, min)
    } else {
        (0, Vec::new(), 0)
    };

    let ref_bits = param.nbits;
    let width_ref = tmpl[GROUP_WIDTH_REF].max(0) as usize;
    let width_bits = tmpl[GROUP_WIDTH_BITS].max(0) as usize;
    let len_ref = tmpl[GROUP_LEN_REF].max(0) as usize;
    let len_inc = tmpl[GROUP_LEN_INC].max(0) as usize;
    let len_last = tmpl[GROUP_LEN_LAST].max(0) as usize;
    let len_bits = tmpl[GROUP_LEN_BITS].max(0) as usize;

    let refs_end = pos + plane_octets(num_groups, ref_bits);
    let widths_end = refs_end + plane_octets(num_groups, width_bits);
    let lens_end = widths_end + plane_octets(num_groups, len_bits);
    if payload.len() < lens_end {
        return Err(DecodeError::ComplexPackingDecodeError(
            ComplexPackingDecodeError::LengthMismatch,
        )
        .into());
    }

    let refs = read_plane(&payload[pos..refs_end], ref_bits, num_groups);
    let widths: Vec<usize> = read_plane(&payload[refs_end..widths_end], width_bits, num_groups)
        .into_iter()
        .map(|w| w as usize + width_ref)
        .collect();
    let mut lens: Vec<usize> = read_plane(&payload[widths_end..lens_end], len_bits, num_groups)
        .into_iter()
        .map(|l| len_ref + len_inc * l as usize)
        .collect();
    if let Some(last) = lens.last_mut() {
        *last = len_last;
    }

    let data = &payload[lens_end..];
    let mut bit_pos = 0;
    let mut work: Vec<i64> = Vec::with_capacity(num_points);
    for ((reference, width), len) in refs.iter().zip(widths.iter()).zip(lens.iter()) {
        for _ in 0..*len {
            let raw = if *width == 0 {
                0
            } else {
                if bit_pos + width > data.len() * 8 {
                    return Err(DecodeError::ComplexPackingDecodeError(
                        ComplexPackingDecodeError::LengthMismatch,
                    )
                    .into());
                }
                let v = get_bits(data, bit_pos, *width);
                bit_pos += width;
                v
            };
            work.push(*reference as i64 + raw as i64 + min);
        }
    }

    if work.len() != num_points {
        return Err(DecodeError::ComplexPackingDecodeError(
            ComplexPackingDecodeError::LengthMismatch,
        )
        .into());
    }

    if tmpl_num == 3 {
        for (slot, first) in work.iter_mut().zip(first_vals.iter()) {
            *slot = *first;
        }
        undifference(&mut work, order);
    }

    Ok(work.iter().map(|v| param.apply(*v as f64)).collect())
}

/// Inverse of [`difference`].
fn undifference(work: &mut [i64], order: usize) {
    match order {
        1 => {
            for i in 1..work.len() {
                work[i] += work[i - 1];
            }
        }
        2 => {
            for i in 2..work.len() {
                work[i] += 2 * work[i - 1] - work[i - 2];
            }
        }
        _ => unreachable!("order validated by the caller"),
    }
}

fn read_plane(buf: &[u8], nbits: usize, count: usize) -> Vec<u64> {
    if nbits == 0 {
        return vec![0; count];
    }
    NBitwiseIterator::new(buf, nbits)
        .take(count)
        .map(u64::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ieee::u32_to_float;

    fn tmpl_52() -> Vec<i64> {
        let mut tmpl = vec![0i64; TMPL_LEN_52];
        tmpl[GROUP_SPLITTING] = 1;
        tmpl
    }

    fn tmpl_53(order: i64) -> Vec<i64> {
        let mut tmpl = vec![0i64; TMPL_LEN_53];
        tmpl[GROUP_SPLITTING] = 1;
        tmpl[SPDIFF_ORDER] = order;
        tmpl
    }

    #[test]
    fn differencing_round_trip() {
        for order in 1..=2usize {
            let original: Vec<i64> = vec![3, 1, 4, 1, 5, 9, 2, 6, 5, 3, 5];
            let mut work = original.clone();
            difference(&mut work, order);
            undifference(&mut work, order);
            assert_eq!(work, original, "order {order}");
        }
    }

    #[test]
    fn second_differences_of_a_ramp_vanish() {
        let mut work: Vec<i64> = (0..10).map(|i| 2 * i + 100).collect();
        difference(&mut work, 2);
        assert_eq!(work[0], 100);
        assert_eq!(work[1], 102);
        assert!(work[2..].iter().all(|v| *v == 0));
    }

    #[test]
    fn pack_unpack_identity_without_differencing() {
        let values: Vec<f64> = (0..100).map(|i| f64::from((i * 37) % 41)).collect();
        let packed = pack(2, &tmpl_52(), &values).unwrap();
        let unpacked = unpack(2, &packed.tmpl, &packed.payload, values.len()).unwrap();
        assert_eq!(unpacked, values);
    }

    #[test]
    fn pack_unpack_identity_with_second_order_differencing() {
        let values: Vec<f64> = (0..1000).map(|i| f64::from(2 * i + 100)).collect();
        let packed = pack(3, &tmpl_53(2), &values).unwrap();
        assert!(
            packed.payload.len() <= 200,
            "payload was {} bytes",
            packed.payload.len()
        );
        let unpacked = unpack(3, &packed.tmpl, &packed.payload, values.len()).unwrap();
        assert_eq!(unpacked, values);
    }

    #[test]
    fn pack_unpack_identity_with_first_order_differencing() {
        let values: Vec<f64> = (0..500).map(|i| f64::from(i) * 1.5 + 7.0).collect();
        let mut tmpl = tmpl_53(1);
        tmpl[BIN_SCALE] = -1;
        let packed = pack(3, &tmpl, &values).unwrap();
        let unpacked = unpack(3, &packed.tmpl, &packed.payload, values.len()).unwrap();
        for (a, b) in values.iter().zip(unpacked.iter()) {
            assert!((a - b).abs() < 1e-9, "{a} vs {b}");
        }
    }

    #[test]
    fn constant_field_short_circuits() {
        let values = [7.0f64; 64];
        let packed = pack(3, &tmpl_53(2), &values).unwrap();
        assert!(packed.payload.is_empty());
        assert_eq!(packed.tmpl[NUM_GROUPS], 0);
        assert_eq!(u32_to_float(packed.tmpl[REF_VAL] as u32), 7.0);

        let unpacked = unpack(3, &packed.tmpl, &packed.payload, values.len()).unwrap();
        assert_eq!(unpacked, values);
    }

    #[test]
    fn missing_value_management_is_rejected_for_packing() {
        let mut tmpl = tmpl_52();
        tmpl[MISSING_MGMT] = 1;
        assert!(pack(2, &tmpl, &[1.0, 2.0]).is_err());
    }

    #[test]
    fn negative_values_survive_differencing() {
        let values: Vec<f64> = (0..200)
            .map(|i| f64::from(i) * -3.0 + 50.0)
            .collect();
        let packed = pack(3, &tmpl_53(2), &values).unwrap();
        let unpacked = unpack(3, &packed.tmpl, &packed.payload, values.len()).unwrap();
        assert_eq!(unpacked, values);
    }

    #[test]
    fn group_splitting_isolates_outliers() {
        let mut values = vec![0.0f64; 500];
        values[250] = 1000.0;
        let packed = pack(2, &tmpl_52(), &values).unwrap();
        // One wide group for the outlier keeps the bulk at width zero.
        assert!(packed.payload.len() < 60, "payload was {} bytes", packed.payload.len());
        let unpacked = unpack(2, &packed.tmpl, &packed.payload, values.len()).unwrap();
        assert_eq!(unpacked, values);
    }
}
