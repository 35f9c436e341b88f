//! IEEE floating point packing (data representation template 5.4).
//!
//! Values travel verbatim as big-endian IEEE 754 words; only the
//! 32-bit precision (code table 5.7, value 1) is supported.

use crate::error::GribError;
use crate::ieee::{be_bytes_to_floats, floats_to_be_bytes};
use crate::packers::{DecodeError, EncodeError, PackedField};

const PRECISION: usize = 0;
const PRECISION_IEEE32: i64 = 1;

pub(crate) fn pack(tmpl: &[i64], values: &[f64]) -> Result<PackedField, GribError> {
    if tmpl.is_empty() {
        return Err(EncodeError::WrongNumberOfTemplateValues {
            expected: 1,
            actual: 0,
        }
        .into());
    }
    if tmpl[PRECISION] != PRECISION_IEEE32 {
        return Err(EncodeError::TemplateNumberUnsupported(4).into());
    }

    let mut payload = Vec::with_capacity(values.len() * 4);
    floats_to_be_bytes(values, &mut payload);
    Ok(PackedField {
        tmpl: tmpl.to_vec(),
        payload,
        num_points: values.len(),
    })
}

pub(crate) fn unpack(tmpl: &[i64], payload: &[u8], num_points: usize) -> Result<Vec<f64>, GribError> {
    if tmpl.first() != Some(&PRECISION_IEEE32) {
        return Err(DecodeError::TemplateNumberUnsupported(4).into());
    }
    if payload.len() < num_points * 4 {
        return Err(DecodeError::LengthMismatch.into());
    }
    Ok(be_bytes_to_floats(&payload[..num_points * 4]))
}
