//! Data representation template widths (Code table 5.0).
//!
//! Reference values (and the spectral (0,0) coefficient) are IEEE
//! 32-bit patterns carried in 4-octet unsigned slots.

use super::TemplateDef;
use crate::error::TemplateError;

const SIMPLE: &[i8] = &[4, -2, -2, 1, 1];

const COMPLEX: &[i8] = &[4, -2, -2, 1, 1, 1, 1, 4, 4, 4, 1, 1, 4, 1, 4, 1];

const COMPLEX_SPATIAL: &[i8] = &[4, -2, -2, 1, 1, 1, 1, 4, 4, 4, 1, 1, 4, 1, 4, 1, 1, 1];

const IEEE_FLOAT: &[i8] = &[1];

const JPEG2000: &[i8] = &[4, -2, -2, 1, 1, 1, 1];

const PNG: &[i8] = &[4, -2, -2, 1, 1];

const SPECTRAL_SIMPLE: &[i8] = &[4, -2, -2, 1, 4];

const SPECTRAL_COMPLEX: &[i8] = &[4, -2, -2, 1, 1, 1, 1, 4, 4, 4, 1, 1, 4, 1, 4, 1, 4];

const RUN_LENGTH: &[i8] = &[1, 2, 2, 1];

pub(super) const TEMPLATES: &[TemplateDef] = &[
    TemplateDef {
        number: 0,
        widths: SIMPLE,
        needs_extension: false,
    },
    TemplateDef {
        number: 2,
        widths: COMPLEX,
        needs_extension: false,
    },
    TemplateDef {
        number: 3,
        widths: COMPLEX_SPATIAL,
        needs_extension: false,
    },
    TemplateDef {
        number: 4,
        widths: IEEE_FLOAT,
        needs_extension: false,
    },
    TemplateDef {
        number: 40,
        widths: JPEG2000,
        needs_extension: false,
    },
    TemplateDef {
        number: 41,
        widths: PNG,
        needs_extension: false,
    },
    TemplateDef {
        number: 50,
        widths: SPECTRAL_SIMPLE,
        needs_extension: false,
    },
    TemplateDef {
        number: 51,
        widths: SPECTRAL_COMPLEX,
        needs_extension: false,
    },
    TemplateDef {
        number: 200,
        widths: RUN_LENGTH,
        needs_extension: true,
    },
];

pub(super) fn extension_widths(number: u16, decoded: &[i64]) -> Result<Vec<i8>, TemplateError> {
    match number {
        // One scaled representative value per level; the level count
        // sits at position 2.
        200 => {
            let max_level = decoded.get(2).copied().unwrap_or(0).max(0) as usize;
            Ok(vec![2; max_level])
        }
        _ => Err(TemplateError::Unsupported(5, number)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complex_spatial_extends_complex_by_two_octets() {
        assert_eq!(&COMPLEX_SPATIAL[..COMPLEX.len()], COMPLEX);
        assert_eq!(COMPLEX_SPATIAL.len(), COMPLEX.len() + 2);
    }

    #[test]
    fn run_length_extension_carries_level_values() {
        let decoded = vec![8, 250, 5, 1];
        assert_eq!(extension_widths(200, &decoded).unwrap(), vec![2; 5]);
    }
}
