//! Packing and unpacking of Section 7 payloads.
//!
//! Each packer consumes field values and a data representation template
//! and returns a [`PackedField`]: the packed payload together with the
//! patched template value list. Packers never mutate caller memory.

use std::fmt::{self, Display, Formatter};

use crate::codec::RasterCodec;
use crate::datatypes::{grid_shape, scan_mode_pos, spectral_truncation};
use crate::error::GribError;

pub(crate) mod bitmap;
mod complex;
mod ieee_float;
mod raster;
mod run_length;
mod simple;
mod spectral;

/// Result of packing one field: the Section 7 body and the data
/// representation template with the packer-computed entries filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedField {
    pub tmpl: Vec<i64>,
    pub payload: Vec<u8>,
    /// Number of points represented by the payload.
    pub num_points: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EncodeError {
    TemplateNumberUnsupported(u16),
    WrongNumberOfTemplateValues { expected: usize, actual: usize },
    MissingValueManagementUnsupported(i64),
    SpatialDifferencingOrderUnsupported(i64),
    UnsupportedTruncation,
    GridShapeUnavailable(u16),
    CodecError(String),
}

impl std::error::Error for EncodeError {}

impl Display for EncodeError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::TemplateNumberUnsupported(n) => {
                write!(f, "No packer for data representation template 5.{n}")
            }
            Self::WrongNumberOfTemplateValues { expected, actual } => {
                write!(f, "Packer expects {expected} template value(s), got {actual}")
            }
            Self::MissingValueManagementUnsupported(v) => {
                write!(f, "Missing value management {v} is not supported for packing")
            }
            Self::SpatialDifferencingOrderUnsupported(v) => {
                write!(f, "Spatial differencing of order {v} is not supported")
            }
            Self::UnsupportedTruncation => {
                write!(f, "Spectral truncation (J, K, M) is zero or absent")
            }
            Self::GridShapeUnavailable(n) => {
                write!(f, "Grid definition template 3.{n} does not define a raster shape")
            }
            Self::CodecError(s) => write!(f, "Raster codec failed: {s}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DecodeError {
    TemplateNumberUnsupported(u16),
    BitMapIndicatorUnsupported(u8),
    MissingPriorBitmap,
    SimplePackingDecodeError(SimplePackingDecodeError),
    ComplexPackingDecodeError(ComplexPackingDecodeError),
    RunLengthEncodingDecodeError(RunLengthEncodingDecodeError),
    CodecError(String),
    LengthMismatch,
}

impl std::error::Error for DecodeError {}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SimplePackingDecodeError {
    OriginalFieldValueTypeNotSupported,
    LengthMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ComplexPackingDecodeError {
    NotSupported,
    LengthMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RunLengthEncodingDecodeError {
    InvalidBitWidth(u8),
    InvalidFirstValue,
    LengthMismatch,
    InvalidLevelValue(u16),
}

impl From<SimplePackingDecodeError> for DecodeError {
    fn from(e: SimplePackingDecodeError) -> Self {
        Self::SimplePackingDecodeError(e)
    }
}

impl From<ComplexPackingDecodeError> for DecodeError {
    fn from(e: ComplexPackingDecodeError) -> Self {
        Self::ComplexPackingDecodeError(e)
    }
}

impl From<RunLengthEncodingDecodeError> for DecodeError {
    fn from(e: RunLengthEncodingDecodeError) -> Self {
        Self::RunLengthEncodingDecodeError(e)
    }
}

/// Grid information a packer may need beyond the field values.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GridContext<'a> {
    pub grid_tmpl_num: u16,
    pub grid_vals: &'a [i64],
    /// Whether the field was contracted through a bit map before
    /// packing; a contracted field no longer has the grid's shape.
    pub contracted: bool,
}

impl GridContext<'_> {
    /// Raster shape handed to the image codecs: the grid's (Ni, Nj),
    /// or the flat point count when a bit map removed the structure.
    /// Rows and columns swap when the scanning mode has consecutive
    /// points in the j direction (flag table 3.4, bit 3).
    fn raster_shape(&self, num_values: usize) -> Result<(usize, usize), EncodeError> {
        if self.contracted {
            return Ok((num_values, 1));
        }
        let (width, height) = grid_shape(self.grid_tmpl_num, self.grid_vals)
            .ok_or(EncodeError::GridShapeUnavailable(self.grid_tmpl_num))?;
        let swapped = scan_mode_pos(self.grid_tmpl_num)
            .and_then(|pos| self.grid_vals.get(pos))
            .map(|scan| *scan as u8 & 0b0010_0000 != 0)
            .unwrap_or(false);
        if swapped {
            Ok((height, width))
        } else {
            Ok((width, height))
        }
    }
}

/// Packs `values` following data representation template `tmpl_num`.
pub(crate) fn pack(
    tmpl_num: u16,
    tmpl: &[i64],
    values: &[f64],
    grid: GridContext,
) -> Result<PackedField, GribError> {
    let packed = match tmpl_num {
        0 => simple::pack(tmpl, values)?,
        2 | 3 => complex::pack(tmpl_num, tmpl, values)?,
        4 => ieee_float::pack(tmpl, values)?,
        40 => raster::pack(RasterCodec::Jpeg2000, tmpl, values, grid)?,
        41 => raster::pack(RasterCodec::Png, tmpl, values, grid)?,
        50 => spectral::pack_simple(tmpl, values)?,
        51 => {
            let truncation = spectral_truncation(grid.grid_tmpl_num, grid.grid_vals);
            spectral::pack_complex(tmpl, values, truncation)?
        }
        _ => return Err(EncodeError::TemplateNumberUnsupported(tmpl_num).into()),
    };
    Ok(packed)
}

/// Unpacks a Section 7 payload of `num_points` packed values.
pub(crate) fn unpack(
    tmpl_num: u16,
    tmpl: &[i64],
    payload: &[u8],
    num_points: usize,
) -> Result<Vec<f64>, GribError> {
    let values = match tmpl_num {
        0 => simple::unpack(tmpl, payload, num_points)?,
        2 | 3 => complex::unpack(tmpl_num, tmpl, payload, num_points)?,
        4 => ieee_float::unpack(tmpl, payload, num_points)?,
        40 => raster::unpack(RasterCodec::Jpeg2000, tmpl, payload, num_points)?,
        41 => raster::unpack(RasterCodec::Png, tmpl, payload, num_points)?,
        50 => spectral::unpack_simple(tmpl, payload, num_points)?,
        51 => spectral::unpack_complex(tmpl, payload, num_points)?,
        200 => run_length::unpack(tmpl, payload, num_points)?,
        _ => return Err(DecodeError::TemplateNumberUnsupported(tmpl_num).into()),
    };
    Ok(values)
}

/// Number of bits needed to represent values in `0..=max`.
pub(crate) fn bits_for(max: u64) -> usize {
    (u64::BITS - max.leading_zeros()) as usize
}

/// Scale/offset quantization shared by the simple, complex and raster
/// packers.
pub(crate) struct ScaledField {
    /// Non-negative quantized values.
    pub qvals: Vec<u64>,
    /// Reference value R, already decimally scaled.
    pub ref_val: f64,
    /// Bits needed for the largest quantized value (computed when the
    /// template requested 0).
    pub nbits: usize,
}

/// Quantizes `values` with binary scale `exp` and decimal scale `dec`.
///
/// `requested_nbits` of 0 asks for the minimum width covering the
/// value range; a non-zero width clamps out-of-range values instead.
/// A constant field comes back with `nbits == 0` and no quantized
/// values, which callers turn into the zero-length packed form.
pub(crate) fn scale_values(values: &[f64], exp: i32, dec: i32, requested_nbits: usize) -> ScaledField {
    let dscale = 10f64.powi(dec);
    let bscale = 2f64.powi(-exp);

    let mut rmin = f64::INFINITY;
    let mut rmax = f64::NEG_INFINITY;
    for v in values {
        rmin = rmin.min(*v);
        rmax = rmax.max(*v);
    }
    if values.is_empty() {
        rmin = 0.0;
        rmax = 0.0;
    }

    let ref_val = rmin * dscale;
    let qmax = ((rmax * dscale - ref_val) * bscale).round() as u64;
    if qmax == 0 {
        return ScaledField {
            qvals: Vec::new(),
            ref_val,
            nbits: 0,
        };
    }

    let nbits = if requested_nbits == 0 {
        bits_for(qmax)
    } else {
        requested_nbits
    };
    let clamp_max = if nbits >= 64 { u64::MAX } else { (1 << nbits) - 1 };

    let qvals = values
        .iter()
        .map(|v| {
            let q = ((v * dscale - ref_val) * bscale).round();
            if q <= 0.0 {
                0
            } else {
                (q as u64).min(clamp_max)
            }
        })
        .collect();

    ScaledField {
        qvals,
        ref_val,
        nbits,
    }
}
