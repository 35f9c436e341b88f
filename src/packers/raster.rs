//! Raster packing (data representation templates 5.40 and 5.41).
//!
//! The scaled integer grid is rendered as a grayscale raster and handed
//! to an image codec; both PNG and JPEG 2000 run lossless here, so the
//! quantized values survive exactly.

use log::warn;

use crate::bits::{FixedValueIterator, NBitwiseIterator};
use crate::codec::RasterCodec;
use crate::error::GribError;
use crate::ieee::float_to_u32;
use crate::packers::simple::{
    SimplePackingDecodeIterator, SimplePackingParam, NUM_BITS, REF_VAL,
};
use crate::packers::{
    scale_values, DecodeError, EncodeError, GridContext, PackedField, SimplePackingDecodeError,
};

// Template 5.40 trailing entries.
const COMPRESSION_TYPE: usize = 5;
const TARGET_RATIO: usize = 6;
const COMPRESSION_LOSSLESS: i64 = 0;
const TARGET_RATIO_MISSING: i64 = 255;

pub(crate) fn pack(
    codec: RasterCodec,
    tmpl: &[i64],
    values: &[f64],
    grid: GridContext,
) -> Result<PackedField, GribError> {
    if tmpl.len() < 5 {
        return Err(EncodeError::WrongNumberOfTemplateValues {
            expected: 5,
            actual: tmpl.len(),
        }
        .into());
    }

    let exp = tmpl[1] as i32;
    let dec = tmpl[2] as i32;
    let scaled = scale_values(values, exp, dec, 0);

    let mut tmpl = tmpl.to_vec();
    tmpl[REF_VAL] = i64::from(float_to_u32(scaled.ref_val));
    if tmpl.len() > TARGET_RATIO {
        tmpl[COMPRESSION_TYPE] = COMPRESSION_LOSSLESS;
        tmpl[TARGET_RATIO] = TARGET_RATIO_MISSING;
    }

    if scaled.nbits == 0 {
        tmpl[NUM_BITS] = 0;
        return Ok(PackedField {
            tmpl,
            payload: Vec::new(),
            num_points: values.len(),
        });
    }

    let depth = pixel_depth(scaled.nbits, codec)?;
    tmpl[NUM_BITS] = depth as i64;

    let (mut width, mut height) = grid.raster_shape(values.len())?;
    let bytes_per_sample = depth / 8;

    // A degenerate shape is rewritten to a single zero pixel so the
    // stream stays parseable downstream.
    let raster = if width < 1 || height < 1 {
        warn!("degenerate raster {width}x{height} rewritten to 1x1");
        width = 1;
        height = 1;
        vec![0u8; bytes_per_sample]
    } else {
        if width * height != values.len() {
            warn!(
                "grid shape {width}x{height} does not cover {} values; falling back to a single row",
                values.len()
            );
            width = values.len();
            height = 1;
        }
        let mut raster = Vec::with_capacity(values.len() * bytes_per_sample);
        for q in &scaled.qvals {
            let be = q.to_be_bytes();
            raster.extend_from_slice(&be[8 - bytes_per_sample..]);
        }
        raster
    };

    let mut payload = Vec::new();
    codec
        .encode(&raster, width, height, depth, &mut payload)
        .map_err(EncodeError::CodecError)?;

    Ok(PackedField {
        tmpl,
        payload,
        num_points: values.len(),
    })
}

pub(crate) fn unpack(
    codec: RasterCodec,
    tmpl: &[i64],
    payload: &[u8],
    num_points: usize,
) -> Result<Vec<f64>, GribError> {
    let param = SimplePackingParam::from_tmpl(tmpl)?;

    if param.nbits == 0 {
        return Ok(
            FixedValueIterator::new(param.zero_bit_value(), num_points).collect::<Vec<_>>(),
        );
    }

    let raster = codec.decode(payload).map_err(DecodeError::CodecError)?;
    let iter = NBitwiseIterator::new(raster.as_slice(), param.nbits);
    let decoded = SimplePackingDecodeIterator::new(iter, &param)
        .take(num_points)
        .collect::<Vec<_>>();
    if decoded.len() != num_points {
        return Err(DecodeError::SimplePackingDecodeError(
            SimplePackingDecodeError::LengthMismatch,
        )
        .into());
    }
    Ok(decoded)
}

/// Smallest codec-supported pixel depth covering `nbits`.
fn pixel_depth(nbits: usize, codec: RasterCodec) -> Result<usize, EncodeError> {
    let depth = nbits.div_ceil(8) * 8;
    if depth > codec.max_depth() {
        return Err(EncodeError::CodecError(format!(
            "dynamic range of {nbits} bit(s) exceeds the codec's {} bit pixels",
            codec.max_depth()
        )));
    }
    Ok(depth)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_4x4() -> (Vec<i64>, u16) {
        let mut grid_vals = vec![0i64; 19];
        grid_vals[7] = 4;
        grid_vals[8] = 4;
        (grid_vals, 0)
    }

    fn tmpl_png() -> Vec<i64> {
        vec![0, 0, 0, 0, 0]
    }

    fn tmpl_jpeg2000() -> Vec<i64> {
        vec![0, 0, 0, 0, 0, 0, 0]
    }

    #[test]
    fn png_round_trip_recovers_the_grid_exactly() {
        let values: Vec<f64> = (0..16).map(f64::from).collect();
        let (grid_vals, grid_tmpl_num) = grid_4x4();
        let grid = GridContext {
            grid_tmpl_num,
            grid_vals: &grid_vals,
            contracted: false,
        };

        let packed = pack(RasterCodec::Png, &tmpl_png(), &values, grid).unwrap();
        assert_eq!(packed.tmpl[NUM_BITS], 8);
        let unpacked = unpack(RasterCodec::Png, &packed.tmpl, &packed.payload, 16).unwrap();
        assert_eq!(unpacked, values);
    }

    #[test]
    fn jpeg2000_round_trip_recovers_the_grid_exactly() {
        let values: Vec<f64> = (0..16).map(|i| f64::from(i * 100)).collect();
        let (grid_vals, grid_tmpl_num) = grid_4x4();
        let grid = GridContext {
            grid_tmpl_num,
            grid_vals: &grid_vals,
            contracted: false,
        };

        let packed = pack(RasterCodec::Jpeg2000, &tmpl_jpeg2000(), &values, grid).unwrap();
        assert_eq!(packed.tmpl[NUM_BITS], 16);
        assert_eq!(packed.tmpl[COMPRESSION_TYPE], COMPRESSION_LOSSLESS);
        let unpacked = unpack(RasterCodec::Jpeg2000, &packed.tmpl, &packed.payload, 16).unwrap();
        assert_eq!(unpacked, values);
    }

    #[test]
    fn contracted_field_is_rendered_as_a_single_row() {
        let values: Vec<f64> = (0..5).map(f64::from).collect();
        let (grid_vals, grid_tmpl_num) = grid_4x4();
        let grid = GridContext {
            grid_tmpl_num,
            grid_vals: &grid_vals,
            contracted: true,
        };

        let packed = pack(RasterCodec::Png, &tmpl_png(), &values, grid).unwrap();
        let unpacked = unpack(RasterCodec::Png, &packed.tmpl, &packed.payload, 5).unwrap();
        assert_eq!(unpacked, values);
    }

    #[test]
    fn constant_field_skips_the_codec() {
        let values = [3.5f64; 16];
        let (grid_vals, grid_tmpl_num) = grid_4x4();
        let grid = GridContext {
            grid_tmpl_num,
            grid_vals: &grid_vals,
            contracted: false,
        };

        let packed = pack(RasterCodec::Png, &tmpl_png(), &values, grid).unwrap();
        assert!(packed.payload.is_empty());
        let unpacked = unpack(RasterCodec::Png, &packed.tmpl, &packed.payload, 16).unwrap();
        assert_eq!(unpacked, values);
    }

    #[test]
    fn empty_field_is_rewritten_to_a_single_zero_pixel() {
        let (grid_vals, grid_tmpl_num) = grid_4x4();
        let grid = GridContext {
            grid_tmpl_num,
            grid_vals: &grid_vals,
            contracted: true,
        };

        // An all-absent bit map leaves nothing to rasterize, but the
        // scaled field is then constant, so the codec is skipped.
        let packed = pack(RasterCodec::Png, &tmpl_png(), &[], grid).unwrap();
        assert!(packed.payload.is_empty());
        assert_eq!(packed.num_points, 0);
    }
}
