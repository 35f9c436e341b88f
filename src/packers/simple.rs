//! Simple packing (data representation template 5.0).

use num::ToPrimitive;

use crate::bits::{BitWriter, FixedValueIterator, NBitwiseIterator};
use crate::error::GribError;
use crate::ieee::{float_to_u32, u32_to_float};
use crate::packers::{scale_values, DecodeError, EncodeError, PackedField, SimplePackingDecodeError};

/// Position of each entry within the template 5.0 value list.
pub(crate) const REF_VAL: usize = 0;
pub(crate) const BIN_SCALE: usize = 1;
pub(crate) const DEC_SCALE: usize = 2;
pub(crate) const NUM_BITS: usize = 3;
pub(crate) const ORIG_FIELD_TYPE: usize = 4;

pub(crate) fn pack(tmpl: &[i64], values: &[f64]) -> Result<PackedField, GribError> {
    if tmpl.len() < 5 {
        return Err(EncodeError::WrongNumberOfTemplateValues {
            expected: 5,
            actual: tmpl.len(),
        }
        .into());
    }

    let exp = tmpl[BIN_SCALE] as i32;
    let dec = tmpl[DEC_SCALE] as i32;
    let scaled = scale_values(values, exp, dec, tmpl[NUM_BITS].max(0) as usize);

    let mut tmpl = tmpl.to_vec();
    tmpl[REF_VAL] = i64::from(float_to_u32(scaled.ref_val));
    tmpl[NUM_BITS] = scaled.nbits as i64;

    // A constant field (or an empty one after bit-map contraction)
    // packs to nothing; the reference value carries the data.
    let payload = if scaled.nbits == 0 {
        Vec::new()
    } else {
        let mut writer = BitWriter::new();
        for q in &scaled.qvals {
            writer.append(*q, scaled.nbits);
        }
        writer.finish()
    };

    Ok(PackedField {
        tmpl,
        payload,
        num_points: values.len(),
    })
}

pub(crate) fn unpack(tmpl: &[i64], payload: &[u8], num_points: usize) -> Result<Vec<f64>, GribError> {
    let param = SimplePackingParam::from_tmpl(tmpl)?;

    let values = if param.nbits == 0 {
        FixedValueIterator::new(param.zero_bit_value(), num_points).collect::<Vec<_>>()
    } else {
        let iter = NBitwiseIterator::new(payload, param.nbits);
        let decoded = SimplePackingDecodeIterator::new(iter, &param)
            .take(num_points)
            .collect::<Vec<_>>();
        if decoded.len() != num_points {
            return Err(DecodeError::SimplePackingDecodeError(
                SimplePackingDecodeError::LengthMismatch,
            )
            .into());
        }
        decoded
    };
    Ok(values)
}

pub(crate) struct SimplePackingParam {
    pub(crate) ref_val: f64,
    pub(crate) exp: i32,
    pub(crate) dec: i32,
    pub(crate) nbits: usize,
}

impl SimplePackingParam {
    pub(crate) fn from_tmpl(tmpl: &[i64]) -> Result<Self, DecodeError> {
        if tmpl.len() < 5 {
            return Err(DecodeError::SimplePackingDecodeError(
                SimplePackingDecodeError::LengthMismatch,
            ));
        }
        if tmpl[ORIG_FIELD_TYPE] != 0 {
            return Err(DecodeError::SimplePackingDecodeError(
                SimplePackingDecodeError::OriginalFieldValueTypeNotSupported,
            ));
        }
        Ok(Self {
            ref_val: u32_to_float(tmpl[REF_VAL] as u32),
            exp: tmpl[BIN_SCALE] as i32,
            dec: tmpl[DEC_SCALE] as i32,
            nbits: tmpl[NUM_BITS].max(0) as usize,
        })
    }

    pub(crate) fn zero_bit_value(&self) -> f64 {
        self.ref_val * 10f64.powi(-self.dec)
    }

    pub(crate) fn apply(&self, encoded: f64) -> f64 {
        let diff = encoded * 2f64.powi(self.exp);
        (self.ref_val + diff) * 10f64.powi(-self.dec)
    }
}

pub(crate) struct SimplePackingDecodeIterator<'p, I> {
    iter: I,
    param: &'p SimplePackingParam,
}

impl<'p, I> SimplePackingDecodeIterator<'p, I> {
    pub(crate) fn new(iter: I, param: &'p SimplePackingParam) -> Self {
        Self { iter, param }
    }
}

impl<I: Iterator<Item = N>, N: ToPrimitive> Iterator for SimplePackingDecodeIterator<'_, I> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        self.iter
            .next()
            .map(|encoded| self.param.apply(encoded.to_f64().unwrap()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmpl(exp: i64, dec: i64, nbits: i64) -> Vec<i64> {
        vec![0, exp, dec, nbits, 0]
    }

    #[test]
    fn pack_unpack_identity_for_integral_values() {
        let values: Vec<f64> = (0..16).map(f64::from).collect();
        let packed = pack(&tmpl(0, 0, 8), &values).unwrap();
        assert_eq!(packed.tmpl[NUM_BITS], 8);
        assert_eq!(packed.payload.len(), 16);

        let unpacked = unpack(&packed.tmpl, &packed.payload, values.len()).unwrap();
        assert_eq!(unpacked, values);
    }

    #[test]
    fn zero_nbits_selects_the_minimum_width() {
        let values: Vec<f64> = (0..16).map(f64::from).collect();
        let packed = pack(&tmpl(0, 0, 0), &values).unwrap();
        assert_eq!(packed.tmpl[NUM_BITS], 4);
        assert_eq!(packed.payload.len(), 8);
    }

    #[test]
    fn constant_field_packs_to_nothing() {
        let values = [2.5f64; 100];
        let packed = pack(&tmpl(0, 0, 0), &values).unwrap();
        assert!(packed.payload.is_empty());
        assert_eq!(packed.tmpl[NUM_BITS], 0);
        assert_eq!(packed.tmpl[REF_VAL], i64::from(float_to_u32(2.5)));

        let unpacked = unpack(&packed.tmpl, &packed.payload, values.len()).unwrap();
        assert_eq!(unpacked, values);
    }

    #[test]
    fn empty_field_packs_to_nothing() {
        let packed = pack(&tmpl(0, 0, 0), &[]).unwrap();
        assert!(packed.payload.is_empty());
        assert_eq!(packed.num_points, 0);
        assert_eq!(unpack(&packed.tmpl, &packed.payload, 0).unwrap(), vec![]);
    }

    #[test]
    fn error_bound_follows_the_scale_factors() {
        let values: Vec<f64> = (0..100).map(|i| f64::from(i) * 0.37 - 11.1).collect();
        let exp = -2i64;
        let dec = 1i64;
        let packed = pack(&tmpl(exp, dec, 0), &values).unwrap();
        let unpacked = unpack(&packed.tmpl, &packed.payload, values.len()).unwrap();

        let bound = 2f64.powi(exp as i32) * 10f64.powi(-(dec as i32));
        for (original, recovered) in values.iter().zip(unpacked.iter()) {
            assert!(
                (original - recovered).abs() <= bound,
                "{original} vs {recovered}"
            );
        }
    }

    #[test]
    fn original_field_type_other_than_float_is_rejected() {
        let tmpl = vec![0, 0, 0, 8, 1];
        assert!(unpack(&tmpl, &[0u8; 4], 4).is_err());
    }
}
