//! Spectral coefficient packing (data representation templates 5.50
//! and 5.51).
//!
//! The (0, 0) coefficient is split off and stored in the template as
//! an IEEE 32-bit pattern; the remaining coefficients go through
//! simple packing (5.50) or complex packing (5.51). Template 5.51
//! requires the triangular truncation of grid definition template
//! 3.50.

use crate::error::GribError;
use crate::ieee::{float_to_u32, u32_to_float};
use crate::packers::{complex, simple, DecodeError, EncodeError, PackedField};

/// Position of the (0, 0) coefficient within template 5.50.
const REAL_00_SIMPLE: usize = 4;
/// Position of the (0, 0) coefficient within template 5.51.
const REAL_00_COMPLEX: usize = 16;

pub(crate) fn pack_simple(tmpl: &[i64], values: &[f64]) -> Result<PackedField, GribError> {
    if tmpl.len() < 5 {
        return Err(EncodeError::WrongNumberOfTemplateValues {
            expected: 5,
            actual: tmpl.len(),
        }
        .into());
    }

    let real_00 = values.first().copied().unwrap_or(0.0);
    let rest = values.get(1..).unwrap_or(&[]);

    // Simple packing sees a 5.0-shaped template; the original field
    // type slot is 0 (floating point) for spectral coefficients.
    let scratch = [tmpl[0], tmpl[1], tmpl[2], tmpl[3], 0];
    let packed = simple::pack(&scratch, rest)?;

    let mut tmpl = tmpl.to_vec();
    tmpl[..4].copy_from_slice(&packed.tmpl[..4]);
    tmpl[REAL_00_SIMPLE] = i64::from(float_to_u32(real_00));

    Ok(PackedField {
        tmpl,
        payload: packed.payload,
        num_points: values.len(),
    })
}

pub(crate) fn unpack_simple(
    tmpl: &[i64],
    payload: &[u8],
    num_points: usize,
) -> Result<Vec<f64>, GribError> {
    if tmpl.len() < 5 {
        return Err(DecodeError::LengthMismatch.into());
    }
    if num_points == 0 {
        return Ok(Vec::new());
    }

    let scratch = [tmpl[0], tmpl[1], tmpl[2], tmpl[3], 0];
    let rest = simple::unpack(&scratch, payload, num_points - 1)?;

    let mut values = Vec::with_capacity(num_points);
    values.push(u32_to_float(tmpl[REAL_00_SIMPLE] as u32));
    values.extend(rest);
    Ok(values)
}

pub(crate) fn pack_complex(
    tmpl: &[i64],
    values: &[f64],
    truncation: Option<(i64, i64, i64)>,
) -> Result<PackedField, GribError> {
    if tmpl.len() < 17 {
        return Err(EncodeError::WrongNumberOfTemplateValues {
            expected: 17,
            actual: tmpl.len(),
        }
        .into());
    }
    match truncation {
        Some((0, 0, 0)) | None => return Err(EncodeError::UnsupportedTruncation.into()),
        Some(_) => {}
    }

    let real_00 = values.first().copied().unwrap_or(0.0);
    let rest = values.get(1..).unwrap_or(&[]);

    let packed = complex::pack(2, &tmpl[..16], rest)?;

    let mut tmpl = tmpl.to_vec();
    tmpl[..16].copy_from_slice(&packed.tmpl);
    tmpl[REAL_00_COMPLEX] = i64::from(float_to_u32(real_00));

    Ok(PackedField {
        tmpl,
        payload: packed.payload,
        num_points: values.len(),
    })
}

pub(crate) fn unpack_complex(
    tmpl: &[i64],
    payload: &[u8],
    num_points: usize,
) -> Result<Vec<f64>, GribError> {
    if tmpl.len() < 17 {
        return Err(DecodeError::LengthMismatch.into());
    }
    if num_points == 0 {
        return Ok(Vec::new());
    }

    let rest = complex::unpack(2, &tmpl[..16], payload, num_points - 1)?;

    let mut values = Vec::with_capacity(num_points);
    values.push(u32_to_float(tmpl[REAL_00_COMPLEX] as u32));
    values.extend(rest);
    Ok(values)
}
