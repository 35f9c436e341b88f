//! Raster compression codecs behind the image-based data
//! representation templates.
//!
//! The variants form a closed set; each turns a grayscale raster of
//! 8, 16, 24 or 32 bits per pixel into a compressed byte stream and
//! back. Wider rasters ride on multi-channel color types (RGB/RGBA for
//! PNG), which the inverse direction flattens back into a plain
//! big-endian sample stream.

use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

mod jpeg2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterCodec {
    Png,
    Jpeg2000,
    Deflate,
}

impl RasterCodec {
    /// Maximum pixel depth the codec can represent, in bits.
    pub fn max_depth(&self) -> usize {
        match self {
            Self::Png => 32,
            Self::Jpeg2000 => 24,
            Self::Deflate => 32,
        }
    }

    /// Compresses `raster` (big-endian, `depth / 8` octets per sample,
    /// row-major) into `out`.
    pub(crate) fn encode(
        &self,
        raster: &[u8],
        width: usize,
        height: usize,
        depth: usize,
        out: &mut Vec<u8>,
    ) -> Result<(), String> {
        match self {
            Self::Png => encode_png(raster, width, height, depth, out),
            Self::Jpeg2000 => jpeg2000::encode(raster, width, height, depth, out),
            Self::Deflate => encode_deflate(raster, out),
        }
    }

    /// Decompresses `stream` back into the big-endian sample stream.
    pub(crate) fn decode(&self, stream: &[u8]) -> Result<Vec<u8>, String> {
        match self {
            Self::Png => decode_png(stream),
            Self::Jpeg2000 => jpeg2000::decode(stream),
            Self::Deflate => decode_deflate(stream),
        }
    }
}

fn png_layout(depth: usize) -> Result<(png::ColorType, png::BitDepth), String> {
    match depth {
        8 => Ok((png::ColorType::Grayscale, png::BitDepth::Eight)),
        16 => Ok((png::ColorType::Grayscale, png::BitDepth::Sixteen)),
        24 => Ok((png::ColorType::Rgb, png::BitDepth::Eight)),
        32 => Ok((png::ColorType::Rgba, png::BitDepth::Eight)),
        _ => Err(format!("unsupported PNG pixel depth: {depth}")),
    }
}

fn encode_png(
    raster: &[u8],
    width: usize,
    height: usize,
    depth: usize,
    out: &mut Vec<u8>,
) -> Result<(), String> {
    let (color_type, bit_depth) = png_layout(depth)?;
    let mut encoder = png::Encoder::new(&mut *out, width as u32, height as u32);
    encoder.set_color(color_type);
    encoder.set_depth(bit_depth);
    let mut writer = encoder.write_header().map_err(|e| e.to_string())?;
    writer.write_image_data(raster).map_err(|e| e.to_string())?;
    writer.finish().map_err(|e| e.to_string())?;
    Ok(())
}

fn decode_png(stream: &[u8]) -> Result<Vec<u8>, String> {
    let reader = std::io::Cursor::new(stream);
    let decoder = png::Decoder::new(reader);
    let mut reader = decoder.read_info().map_err(|e| e.to_string())?;
    let mut out_buf = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut out_buf).map_err(|e| e.to_string())?;
    out_buf.truncate(info.buffer_size());
    Ok(out_buf)
}

fn encode_deflate(raster: &[u8], out: &mut Vec<u8>) -> Result<(), String> {
    let mut encoder = DeflateEncoder::new(&mut *out, Compression::default());
    encoder.write_all(raster).map_err(|e| e.to_string())?;
    encoder.finish().map_err(|e| e.to_string())?;
    Ok(())
}

fn decode_deflate(stream: &[u8]) -> Result<Vec<u8>, String> {
    let mut decoder = DeflateDecoder::new(stream);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(|e| e.to_string())?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_gray8_round_trip() {
        let raster: Vec<u8> = (0..16).collect();
        let mut stream = Vec::new();
        RasterCodec::Png
            .encode(&raster, 4, 4, 8, &mut stream)
            .unwrap();
        assert_eq!(RasterCodec::Png.decode(&stream).unwrap(), raster);
    }

    #[test]
    fn png_gray16_round_trip() {
        let raster: Vec<u8> = (0..32).collect();
        let mut stream = Vec::new();
        RasterCodec::Png
            .encode(&raster, 4, 4, 16, &mut stream)
            .unwrap();
        assert_eq!(RasterCodec::Png.decode(&stream).unwrap(), raster);
    }

    #[test]
    fn png_rgb_round_trip_carries_24_bit_samples() {
        let raster: Vec<u8> = (0..12).collect();
        let mut stream = Vec::new();
        RasterCodec::Png
            .encode(&raster, 2, 2, 24, &mut stream)
            .unwrap();
        assert_eq!(RasterCodec::Png.decode(&stream).unwrap(), raster);
    }

    #[test]
    fn png_rejects_odd_depths() {
        let mut out = Vec::new();
        assert!(RasterCodec::Png.encode(&[0u8; 4], 2, 2, 12, &mut out).is_err());
    }

    #[test]
    fn deflate_round_trip() {
        let raster: Vec<u8> = (0..255).cycle().take(4096).collect();
        let mut stream = Vec::new();
        RasterCodec::Deflate
            .encode(&raster, 64, 64, 8, &mut stream)
            .unwrap();
        assert!(stream.len() < raster.len());
        assert_eq!(RasterCodec::Deflate.decode(&stream).unwrap(), raster);
    }
}
