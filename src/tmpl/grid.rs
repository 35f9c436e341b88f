//! Grid definition template widths (Code table 3.1).

use super::TemplateDef;
use crate::error::TemplateError;

/// Latitude/longitude family base: shape of the earth block, Ni/Nj,
/// basic angle, first/last points, increments, scanning mode.
const LATLON: &[i8] = &[
    1, 1, 4, 1, 4, 1, 4, 4, 4, 4, 4, -4, 4, 1, -4, 4, 4, 4, 1,
];

const MERCATOR: &[i8] = &[1, 1, 4, 1, 4, 1, 4, 4, 4, -4, 4, 1, -4, -4, 4, 1, 4, 4, 4];

const POLAR_STEREOGRAPHIC: &[i8] = &[1, 1, 4, 1, 4, 1, 4, 4, 4, -4, 4, 1, -4, 4, 4, 4, 1, 1];

const LAMBERT: &[i8] = &[
    1, 1, 4, 1, 4, 1, 4, 4, 4, -4, 4, 1, -4, 4, 4, 4, 1, 1, -4, -4, -4, 4,
];

const ROTATED_LATLON: &[i8] = &[
    1, 1, 4, 1, 4, 1, 4, 4, 4, 4, 4, -4, 4, 1, -4, 4, 4, 4, 1, -4, 4, 4,
];

const STRETCHED_LATLON: &[i8] = &[
    1, 1, 4, 1, 4, 1, 4, 4, 4, 4, 4, -4, 4, 1, -4, 4, 4, 4, 1, -4, 4, 4,
];

const STRETCHED_ROTATED_LATLON: &[i8] = &[
    1, 1, 4, 1, 4, 1, 4, 4, 4, 4, 4, -4, 4, 1, -4, 4, 4, 4, 1, -4, 4, 4, -4, 4, 4,
];

const ROTATED_GAUSSIAN: &[i8] = &[
    1, 1, 4, 1, 4, 1, 4, 4, 4, 4, 4, -4, 4, 1, -4, 4, 4, 4, 1, -4, 4, 4,
];

const SPHERICAL_HARMONICS: &[i8] = &[4, 4, 4, 1, 1];

const SPACE_VIEW: &[i8] = &[
    1, 1, 4, 1, 4, 1, 4, 4, 4, -4, 4, 1, 4, 4, 4, 4, 1, 4, 4, 4, 4,
];

const AZIMUTHAL_EQUIDISTANT: &[i8] = &[1, 1, 4, 1, 4, 1, 4, 4, 4, -4, 4, 1, 4, 4, 1, 1];

const AZIMUTH_RANGE: &[i8] = &[4, 4, -4, 4, 4, 4, 1];

const ROTATED_LATLON_ARAKAWA_E: &[i8] = LATLON;

const ROTATED_LATLON_ARAKAWA_NONE: &[i8] = &[
    1, 1, 4, 1, 4, 1, 4, 4, 4, 4, 4, -4, 4, 1, -4, 4, 4, 4, 1, 4, 4,
];

pub(super) const TEMPLATES: &[TemplateDef] = &[
    TemplateDef {
        number: 0,
        widths: LATLON,
        needs_extension: false,
    },
    TemplateDef {
        number: 1,
        widths: ROTATED_LATLON,
        needs_extension: false,
    },
    TemplateDef {
        number: 2,
        widths: STRETCHED_LATLON,
        needs_extension: false,
    },
    TemplateDef {
        number: 3,
        widths: STRETCHED_ROTATED_LATLON,
        needs_extension: false,
    },
    TemplateDef {
        number: 10,
        widths: MERCATOR,
        needs_extension: false,
    },
    TemplateDef {
        number: 20,
        widths: POLAR_STEREOGRAPHIC,
        needs_extension: false,
    },
    TemplateDef {
        number: 30,
        widths: LAMBERT,
        needs_extension: false,
    },
    TemplateDef {
        number: 31,
        widths: LAMBERT,
        needs_extension: false,
    },
    TemplateDef {
        number: 40,
        widths: LATLON,
        needs_extension: false,
    },
    TemplateDef {
        number: 41,
        widths: ROTATED_GAUSSIAN,
        needs_extension: false,
    },
    TemplateDef {
        number: 50,
        widths: SPHERICAL_HARMONICS,
        needs_extension: false,
    },
    TemplateDef {
        number: 90,
        widths: SPACE_VIEW,
        needs_extension: false,
    },
    TemplateDef {
        number: 110,
        widths: AZIMUTHAL_EQUIDISTANT,
        needs_extension: false,
    },
    TemplateDef {
        number: 120,
        widths: AZIMUTH_RANGE,
        needs_extension: true,
    },
    TemplateDef {
        number: 204,
        widths: LATLON,
        needs_extension: false,
    },
    TemplateDef {
        number: 32768,
        widths: ROTATED_LATLON_ARAKAWA_E,
        needs_extension: false,
    },
    TemplateDef {
        number: 32769,
        widths: ROTATED_LATLON_ARAKAWA_NONE,
        needs_extension: false,
    },
];

pub(super) fn extension_widths(number: u16, decoded: &[i64]) -> Result<Vec<i8>, TemplateError> {
    match number {
        // One (centre azimuth, azimuthal width) pair per radial; the
        // radial count sits at position 1.
        120 => {
            let num_radials = decoded.get(1).copied().unwrap_or(0).max(0) as usize;
            let mut widths = Vec::with_capacity(num_radials * 2);
            for _ in 0..num_radials {
                widths.push(2);
                widths.push(-2);
            }
            Ok(widths)
        }
        _ => Err(TemplateError::Unsupported(3, number)),
    }
}
