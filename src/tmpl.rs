//! Registry of grid, product and data representation templates.
//!
//! Each template is described by the ordered octet widths of its
//! entries. A negative width marks a sign-magnitude encoded entry, the
//! convention the WMO tables use for values that may be negative.
//! Templates whose tail depends on already-decoded values (e.g. the
//! number of time ranges of template 4.8) declare `needs_extension` and
//! get their variable part from [`extension_widths`].

use crate::error::{ParseError, TemplateError};
use crate::helpers::{grib_int_from_bytes, grib_int_to_bytes, grib_uint_from_bytes, grib_uint_to_bytes};

mod grid;
mod product;
mod repr;

/// Width list of one template, as registered.
#[derive(Debug, PartialEq, Eq)]
pub struct TemplateDef {
    pub number: u16,
    pub widths: &'static [i8],
    pub needs_extension: bool,
}

impl TemplateDef {
    /// Number of octets of the static part.
    pub fn static_len(&self) -> usize {
        self.widths.iter().map(|w| w.unsigned_abs() as usize).sum()
    }
}

fn find(defs: &'static [TemplateDef], sect: u8, number: u16) -> Result<&'static TemplateDef, TemplateError> {
    defs.iter()
        .find(|d| d.number == number)
        .ok_or(TemplateError::Unsupported(sect, number))
}

/// Looks up a grid definition template (Section 3).
pub fn grid_template(number: u16) -> Result<&'static TemplateDef, TemplateError> {
    find(grid::TEMPLATES, 3, number)
}

/// Looks up a product definition template (Section 4).
pub fn product_template(number: u16) -> Result<&'static TemplateDef, TemplateError> {
    find(product::TEMPLATES, 4, number)
}

/// Looks up a data representation template (Section 5).
pub fn repr_template(number: u16) -> Result<&'static TemplateDef, TemplateError> {
    find(repr::TEMPLATES, 5, number)
}

/// Computes the widths of the repeating tail of an extensible template
/// from the already-decoded static values.
pub fn extension_widths(sect: u8, number: u16, decoded: &[i64]) -> Result<Vec<i8>, TemplateError> {
    match sect {
        3 => grid::extension_widths(number, decoded),
        4 => product::extension_widths(number, decoded),
        5 => repr::extension_widths(number, decoded),
        _ => Err(TemplateError::Unsupported(sect, number)),
    }
}

/// Full width list of a template instance, extension included.
pub fn instance_widths(
    def: &TemplateDef,
    sect: u8,
    decoded: &[i64],
) -> Result<Vec<i8>, TemplateError> {
    let mut widths = def.widths.to_vec();
    if def.needs_extension {
        widths.extend(extension_widths(sect, def.number, decoded)?);
    }
    Ok(widths)
}

/// Appends template values to `buf` following `widths`.
///
/// Values must fit their declared octet width; sign-magnitude entries
/// additionally lose one bit to the sign.
pub(crate) fn encode_values(
    widths: &[i8],
    vals: &[i64],
    buf: &mut Vec<u8>,
) -> Result<(), TemplateError> {
    if widths.len() != vals.len() {
        return Err(TemplateError::WrongNumberOfValues {
            expected: widths.len(),
            actual: vals.len(),
        });
    }
    for (index, (width, val)) in widths.iter().zip(vals.iter()).enumerate() {
        let num_octets = width.unsigned_abs();
        let bits = u32::from(num_octets) * 8;
        if *width < 0 {
            if val.unsigned_abs() >= 1 << (bits - 1) {
                return Err(TemplateError::ValueOutOfRange {
                    index,
                    value: *val,
                    num_octets,
                });
            }
            grib_int_to_bytes(*val, num_octets as usize, buf);
        } else {
            if *val < 0 || (bits < 64 && val.unsigned_abs() >= 1 << bits) {
                return Err(TemplateError::ValueOutOfRange {
                    index,
                    value: *val,
                    num_octets,
                });
            }
            grib_uint_to_bytes(*val as u64, num_octets as usize, buf);
        }
    }
    Ok(())
}

/// Reads template values from `buf` at `*pos` following `widths`.
pub(crate) fn decode_values(
    widths: &[i8],
    buf: &[u8],
    pos: &mut usize,
) -> Result<Vec<i64>, ParseError> {
    let mut vals = Vec::with_capacity(widths.len());
    for width in widths {
        let num_octets = width.unsigned_abs() as usize;
        let end = *pos + num_octets;
        if end > buf.len() {
            return Err(ParseError::UnexpectedEndOfData(*pos));
        }
        let bytes = &buf[*pos..end];
        let val = if *width < 0 {
            grib_int_from_bytes(bytes)
        } else {
            grib_uint_from_bytes(bytes) as i64
        };
        vals.push(val);
        *pos = end;
    }
    Ok(vals)
}

/// Encodes a complete template instance (static part plus extension).
pub(crate) fn encode_template(
    def: &TemplateDef,
    sect: u8,
    vals: &[i64],
    buf: &mut Vec<u8>,
) -> Result<(), TemplateError> {
    let widths = instance_widths(def, sect, vals)?;
    encode_values(&widths, vals, buf)
}

/// Decodes a complete template instance (static part plus extension).
pub(crate) fn decode_template(
    def: &TemplateDef,
    sect: u8,
    buf: &[u8],
    pos: &mut usize,
) -> Result<Vec<i64>, crate::GribError> {
    let mut vals = decode_values(def.widths, buf, pos)?;
    if def.needs_extension {
        let ext = extension_widths(sect, def.number, &vals)?;
        vals.extend(decode_values(&ext, buf, pos)?);
    }
    Ok(vals)
}
