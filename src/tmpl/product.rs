//! Product definition template widths (Code table 4.0).

use super::TemplateDef;
use crate::error::TemplateError;

/// Template 4.0 base: parameter, generating process, forecast time and
/// the two fixed surfaces. Most other product templates start with it.
const ANALYSIS_OR_FORECAST: &[i8] = &[1, 1, 1, 1, 1, 2, 1, 1, 4, 1, -1, -4, 1, -1, -4];

const INDIVIDUAL_ENSEMBLE: &[i8] = &[
    1, 1, 1, 1, 1, 2, 1, 1, 4, 1, -1, -4, 1, -1, -4, 1, 1, 1,
];

const DERIVED_ENSEMBLE: &[i8] = &[1, 1, 1, 1, 1, 2, 1, 1, 4, 1, -1, -4, 1, -1, -4, 1, 1];

const PROBABILITY: &[i8] = &[
    1, 1, 1, 1, 1, 2, 1, 1, 4, 1, -1, -4, 1, -1, -4, 1, 1, 1, -1, -4, -1, -4,
];

const PERCENTILE: &[i8] = &[1, 1, 1, 1, 1, 2, 1, 1, 4, 1, -1, -4, 1, -1, -4, 1];

// Statistically processed variants append the end of the overall time
// interval, the time range count, the missing count and one time range
// group; further groups are extension.
const STATISTICAL: &[i8] = &[
    1, 1, 1, 1, 1, 2, 1, 1, 4, 1, -1, -4, 1, -1, -4, 2, 1, 1, 1, 1, 1, 1, 4, 1, 1, 1, 4, 1, 4,
];

const PROBABILITY_STATISTICAL: &[i8] = &[
    1, 1, 1, 1, 1, 2, 1, 1, 4, 1, -1, -4, 1, -1, -4, 1, 1, 1, -1, -4, -1, -4, 2, 1, 1, 1, 1, 1,
    1, 4, 1, 1, 1, 4, 1, 4,
];

const PERCENTILE_STATISTICAL: &[i8] = &[
    1, 1, 1, 1, 1, 2, 1, 1, 4, 1, -1, -4, 1, -1, -4, 1, 2, 1, 1, 1, 1, 1, 1, 4, 1, 1, 1, 4, 1, 4,
];

const ENSEMBLE_STATISTICAL: &[i8] = &[
    1, 1, 1, 1, 1, 2, 1, 1, 4, 1, -1, -4, 1, -1, -4, 1, 1, 1, 2, 1, 1, 1, 1, 1, 1, 4, 1, 1, 1,
    4, 1, 4,
];

const DERIVED_STATISTICAL: &[i8] = &[
    1, 1, 1, 1, 1, 2, 1, 1, 4, 1, -1, -4, 1, -1, -4, 1, 1, 2, 1, 1, 1, 1, 1, 1, 4, 1, 1, 1, 4,
    1, 4,
];

const SPATIAL_AREA: &[i8] = &[1, 1, 1, 1, 1, 2, 1, 1, 4, 1, -1, -4, 1, -1, -4, 1, 1, 1];

/// Radar product: site position/elevation/identifiers, operating mode,
/// calibration and scan geometry. The site latitude, the reflectivity
/// calibration constant and the echo-top reference may be negative.
const RADAR: &[i8] = &[
    1, 1, 1, 1, 1, -4, 4, 2, 4, 2, 1, -1, 1, 1, 1, 2, -1, 4, 2,
];

const SATELLITE: &[i8] = &[1, 1, 1, 1, 1];

const SIMULATED_SATELLITE: &[i8] = &[1, 1, 1, 1, 1, 2, 1, 1, 4, 1];

const AEROSOL_OPTICAL: &[i8] = &[
    1, 1, 2, 1, -1, -4, -1, -4, 1, -1, -4, -1, -4, 1, 1, 1, 2, 1, 1, 4, 1, -1, -4, 1, -1, -4,
];

/// One statistically-processed time range group.
const TIME_RANGE_GROUP: &[i8] = &[1, 1, 1, 4, 1, 4];

/// One spectral band group of the satellite templates.
const BAND_GROUP: &[i8] = &[2, 2, 2, -1, -4];

pub(super) const TEMPLATES: &[TemplateDef] = &[
    TemplateDef {
        number: 0,
        widths: ANALYSIS_OR_FORECAST,
        needs_extension: false,
    },
    TemplateDef {
        number: 1,
        widths: INDIVIDUAL_ENSEMBLE,
        needs_extension: false,
    },
    TemplateDef {
        number: 2,
        widths: DERIVED_ENSEMBLE,
        needs_extension: false,
    },
    TemplateDef {
        number: 5,
        widths: PROBABILITY,
        needs_extension: false,
    },
    TemplateDef {
        number: 6,
        widths: PERCENTILE,
        needs_extension: false,
    },
    TemplateDef {
        number: 7,
        widths: ANALYSIS_OR_FORECAST,
        needs_extension: false,
    },
    TemplateDef {
        number: 8,
        widths: STATISTICAL,
        needs_extension: true,
    },
    TemplateDef {
        number: 9,
        widths: PROBABILITY_STATISTICAL,
        needs_extension: true,
    },
    TemplateDef {
        number: 10,
        widths: PERCENTILE_STATISTICAL,
        needs_extension: true,
    },
    TemplateDef {
        number: 11,
        widths: ENSEMBLE_STATISTICAL,
        needs_extension: true,
    },
    TemplateDef {
        number: 12,
        widths: DERIVED_STATISTICAL,
        needs_extension: true,
    },
    TemplateDef {
        number: 15,
        widths: SPATIAL_AREA,
        needs_extension: false,
    },
    TemplateDef {
        number: 20,
        widths: RADAR,
        needs_extension: false,
    },
    TemplateDef {
        number: 30,
        widths: SATELLITE,
        needs_extension: true,
    },
    TemplateDef {
        number: 32,
        widths: SIMULATED_SATELLITE,
        needs_extension: true,
    },
    TemplateDef {
        number: 48,
        widths: AEROSOL_OPTICAL,
        needs_extension: false,
    },
];

/// Position of the time range count within each statistical template.
fn time_range_count_pos(number: u16) -> Option<usize> {
    match number {
        8 => Some(21),
        9 => Some(28),
        10 => Some(22),
        11 => Some(24),
        12 => Some(23),
        _ => None,
    }
}

/// Position of the band count within each satellite template.
fn band_count_pos(number: u16) -> Option<usize> {
    match number {
        30 => Some(4),
        32 => Some(9),
        _ => None,
    }
}

pub(super) fn extension_widths(number: u16, decoded: &[i64]) -> Result<Vec<i8>, TemplateError> {
    if let Some(pos) = time_range_count_pos(number) {
        // The static width list already carries one group.
        let count = decoded.get(pos).copied().unwrap_or(0).max(1) as usize;
        return Ok(TIME_RANGE_GROUP.repeat(count - 1));
    }
    if let Some(pos) = band_count_pos(number) {
        let count = decoded.get(pos).copied().unwrap_or(0).max(0) as usize;
        return Ok(BAND_GROUP.repeat(count));
    }
    Err(TemplateError::Unsupported(4, number))
}
