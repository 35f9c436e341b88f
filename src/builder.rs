//! Incremental assembly of a GRIB2 message, section by section.
//!
//! Sections are strictly ordered: Section N's offset depends on
//! Section N-1's length, so the builder is a small state machine keyed
//! on the number of the last section written. Sections 4 through 7 are
//! appended atomically by [`MessageBuilder::add_field`]; a failed call
//! leaves the buffer untouched.

use crate::datatypes::Identification;
use crate::error::{BuildError, GribError};
use crate::helpers::read_as;
use crate::ieee::floats_to_be_bytes;
use crate::packers::{self, bitmap, GridContext};
use crate::tmpl;

const SECT0_MAGIC: &[u8] = b"GRIB";
const SECT0_SIZE: usize = 16;
const SECT8_MAGIC: &[u8] = b"7777";
const EDITION: u8 = 2;

const BITMAP_PRESENT: u8 = 0;
const BITMAP_PREDEFINED: u8 = 254;
const BITMAP_ABSENT: u8 = 255;

/// How a field's bit map is supplied.
#[derive(Debug, Clone, Copy)]
pub enum BitmapSpec<'a> {
    /// No bit map; every grid point carries a value (indicator 255).
    None,
    /// Bit map included with this field, one flag per grid point
    /// (indicator 0).
    Bitmap(&'a [bool]),
    /// Bit map previously defined in this message applies (indicator
    /// 254).
    Reuse,
}

/// Everything one field contributes to Sections 4-7.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef<'a> {
    pub prod_tmpl_num: u16,
    pub prod_vals: &'a [i64],
    /// Optional vertical coordinate values appended after the product
    /// definition template.
    pub coordinates: &'a [f64],
    pub repr_tmpl_num: u16,
    pub repr_vals: &'a [i64],
    pub bitmap: BitmapSpec<'a>,
    /// Field values, one per grid point.
    pub values: &'a [f64],
}

pub struct MessageBuilder {
    buf: Vec<u8>,
    last_section: u8,
    complete: bool,
    num_grid_points: usize,
    grid_tmpl_num: Option<u16>,
    grid_vals: Vec<i64>,
    prior_bitmap: Option<Vec<u8>>,
}

impl MessageBuilder {
    /// Starts a message: Section 0 with a length placeholder, followed
    /// by Section 1 carrying the identification record.
    pub fn create(discipline: u8, identification: &Identification) -> Self {
        let mut buf = Vec::with_capacity(256);
        buf.extend_from_slice(SECT0_MAGIC);
        buf.extend_from_slice(&[0, 0]); // reserved
        buf.push(discipline);
        buf.push(EDITION);
        buf.extend_from_slice(&[0u8; 8]); // total length, rewritten on every append

        let mut body = Vec::with_capacity(Identification::BODY_SIZE);
        identification.write_payload(&mut body);
        append_section(&mut buf, 1, &body);

        let mut builder = Self {
            buf,
            last_section: 1,
            complete: false,
            num_grid_points: 0,
            grid_tmpl_num: None,
            grid_vals: Vec::new(),
            prior_bitmap: None,
        };
        builder.update_total_length();
        builder
    }

    /// Appends Section 2 with centre-specific content.
    pub fn add_local_use(&mut self, data: &[u8]) -> Result<(), GribError> {
        self.check_incomplete()?;
        if self.last_section != 1 {
            return Err(BuildError::BadPredecessorSection(self.last_section).into());
        }
        append_section(&mut self.buf, 2, data);
        self.last_section = 2;
        self.update_total_length();
        self.check_lengths()
    }

    /// Appends Section 3 with the given grid definition template.
    pub fn add_grid(
        &mut self,
        tmpl_num: u16,
        vals: &[i64],
        num_points: u32,
    ) -> Result<(), GribError> {
        self.check_incomplete()?;
        if !matches!(self.last_section, 1 | 2 | 7) {
            return Err(BuildError::BadPredecessorSection(self.last_section).into());
        }

        let def = tmpl::grid_template(tmpl_num)?;
        let mut body = Vec::with_capacity(9 + def.static_len());
        body.push(0); // source of grid definition (code table 3.0)
        body.extend_from_slice(&num_points.to_be_bytes());
        body.push(0); // no optional list of numbers of points
        body.push(0);
        body.extend_from_slice(&tmpl_num.to_be_bytes());
        tmpl::encode_template(def, 3, vals, &mut body)?;

        append_section(&mut self.buf, 3, &body);
        self.last_section = 3;
        self.num_grid_points = num_points as usize;
        self.grid_tmpl_num = Some(tmpl_num);
        self.grid_vals = vals.to_vec();
        self.update_total_length();
        self.check_lengths()
    }

    /// Appends Sections 4, 5, 6 and 7 for one field.
    pub fn add_field(&mut self, field: FieldDef) -> Result<(), GribError> {
        self.check_incomplete()?;
        let grid_tmpl_num = match (self.last_section, self.grid_tmpl_num) {
            (3 | 7, Some(num)) => num,
            (1 | 2, _) | (_, None) => return Err(BuildError::MissingGridDefinition.into()),
            (n, _) => return Err(BuildError::BadPredecessorSection(n).into()),
        };

        // Bit map resolution and field contraction happen before any
        // section is written so a failure cannot leave half a field.
        let (indicator, bitmap_bits, packed_values);
        match field.bitmap {
            BitmapSpec::None => {
                indicator = BITMAP_ABSENT;
                bitmap_bits = None;
                packed_values = field.values.to_vec();
            }
            BitmapSpec::Bitmap(flags) => {
                if flags.len() != self.num_grid_points {
                    return Err(BuildError::BitmapLengthMismatch.into());
                }
                indicator = BITMAP_PRESENT;
                let bits = bitmap::pack_bitmap(flags);
                packed_values = bitmap::contract(field.values, &bits);
                bitmap_bits = Some(bits);
            }
            BitmapSpec::Reuse => {
                let bits = self
                    .prior_bitmap
                    .as_ref()
                    .ok_or(BuildError::MissingPriorBitmap)?;
                indicator = BITMAP_PREDEFINED;
                packed_values = bitmap::contract(field.values, bits);
                bitmap_bits = None;
            }
        }

        if field.repr_tmpl_num == 51 && grid_tmpl_num != 50 {
            return Err(BuildError::SphericalHarmonicGdtRequired.into());
        }

        let grid = GridContext {
            grid_tmpl_num,
            grid_vals: &self.grid_vals,
            contracted: indicator != BITMAP_ABSENT,
        };
        let packed = packers::pack(field.repr_tmpl_num, field.repr_vals, &packed_values, grid)?;

        // Section 4
        let pdt_def = tmpl::product_template(field.prod_tmpl_num)?;
        let mut sect4 = Vec::new();
        sect4.extend_from_slice(&(field.coordinates.len() as u16).to_be_bytes());
        sect4.extend_from_slice(&field.prod_tmpl_num.to_be_bytes());
        tmpl::encode_template(pdt_def, 4, field.prod_vals, &mut sect4)?;
        floats_to_be_bytes(field.coordinates, &mut sect4);

        // Section 5
        let drt_def = tmpl::repr_template(field.repr_tmpl_num)?;
        let mut sect5 = Vec::new();
        sect5.extend_from_slice(&(packed.num_points as u32).to_be_bytes());
        sect5.extend_from_slice(&field.repr_tmpl_num.to_be_bytes());
        tmpl::encode_template(drt_def, 5, &packed.tmpl, &mut sect5)?;

        // Section 6
        let mut sect6 = Vec::new();
        sect6.push(indicator);
        if let Some(bits) = &bitmap_bits {
            sect6.extend_from_slice(bits);
        }

        append_section(&mut self.buf, 4, &sect4);
        append_section(&mut self.buf, 5, &sect5);
        append_section(&mut self.buf, 6, &sect6);
        append_section(&mut self.buf, 7, &packed.payload);

        if let Some(bits) = bitmap_bits {
            self.prior_bitmap = Some(bits);
        }
        self.last_section = 7;
        self.update_total_length();
        self.check_lengths()
    }

    /// Appends the End Section and rewrites the total length; returns
    /// the final message length in octets.
    pub fn finalize(&mut self) -> Result<usize, GribError> {
        self.check_incomplete()?;
        if self.last_section != 7 {
            return Err(BuildError::BadPredecessorSection(self.last_section).into());
        }
        self.buf.extend_from_slice(SECT8_MAGIC);
        self.complete = true;
        self.update_total_length();
        self.check_lengths()?;
        Ok(self.buf.len())
    }

    /// The message as assembled so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Hands the assembled message over to the caller.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn check_incomplete(&self) -> Result<(), BuildError> {
        if self.complete {
            Err(BuildError::AlreadyComplete)
        } else {
            Ok(())
        }
    }

    fn update_total_length(&mut self) {
        let len = self.buf.len() as u64;
        self.buf[8..16].copy_from_slice(&len.to_be_bytes());
    }

    /// Verifies that the section lengths sum up to the buffer length.
    fn check_lengths(&self) -> Result<(), GribError> {
        let mut pos = SECT0_SIZE;
        let end = if self.complete {
            self.buf.len() - SECT8_MAGIC.len()
        } else {
            self.buf.len()
        };
        while pos < end {
            if pos + 5 > end {
                return Err(BuildError::InternalLengthMismatch.into());
            }
            let buf = &self.buf;
            let len = read_as!(u32, buf, pos) as usize;
            if len < 5 {
                return Err(BuildError::InternalLengthMismatch.into());
            }
            pos += len;
        }
        if pos != end {
            return Err(BuildError::InternalLengthMismatch.into());
        }
        Ok(())
    }
}

fn append_section(buf: &mut Vec<u8>, num: u8, body: &[u8]) {
    let len = (body.len() + 5) as u32;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.push(num);
    buf.extend_from_slice(body);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn identification() -> Identification {
        Identification {
            centre_id: 7,
            subcentre_id: 0,
            master_table_version: 2,
            local_table_version: 1,
            ref_time_significance: 1,
            ref_time: Utc.with_ymd_and_hms(2021, 11, 20, 18, 0, 0).unwrap(),
            prod_status: 0,
            data_type: 1,
        }
    }

    fn latlon_grid_vals(ni: i64, nj: i64) -> Vec<i64> {
        let mut vals = vec![0i64; 19];
        vals[7] = ni;
        vals[8] = nj;
        vals
    }

    fn simple_field<'a>(values: &'a [f64], prod_vals: &'a [i64], repr_vals: &'a [i64]) -> FieldDef<'a> {
        FieldDef {
            prod_tmpl_num: 0,
            prod_vals,
            coordinates: &[],
            repr_tmpl_num: 0,
            repr_vals,
            bitmap: BitmapSpec::None,
            values,
        }
    }

    #[test]
    fn created_message_has_a_valid_envelope_prefix() {
        let builder = MessageBuilder::create(0, &identification());
        let buf = builder.as_bytes();
        assert_eq!(&buf[0..4], b"GRIB");
        assert_eq!(buf[6], 0);
        assert_eq!(buf[7], 2);
        let total = u64::from_be_bytes(buf[8..16].try_into().unwrap());
        assert_eq!(total as usize, buf.len());
        assert_eq!(buf.len(), 16 + 21);
    }

    #[test]
    fn full_message_assembly() {
        let values: Vec<f64> = (0..16).map(f64::from).collect();
        let prod_vals = vec![0i64; 15];
        let repr_vals = vec![0i64, 0, 0, 8, 0];

        let mut builder = MessageBuilder::create(0, &identification());
        builder.add_local_use(b"local").unwrap();
        builder.add_grid(0, &latlon_grid_vals(4, 4), 16).unwrap();
        builder
            .add_field(simple_field(&values, &prod_vals, &repr_vals))
            .unwrap();
        let total_len = builder.finalize().unwrap();
        let message = builder.into_bytes();

        assert_eq!(message.len(), total_len);
        assert_eq!(&message[message.len() - 4..], b"7777");
        let total = u64::from_be_bytes(message[8..16].try_into().unwrap());
        assert_eq!(total as usize, message.len());
    }

    #[test]
    fn operations_on_a_finalized_message_are_rejected() {
        let values = [0.0f64; 4];
        let prod_vals = vec![0i64; 15];
        let repr_vals = vec![0i64, 0, 0, 8, 0];
        let mut builder = MessageBuilder::create(0, &identification());
        builder.add_grid(0, &latlon_grid_vals(2, 2), 4).unwrap();
        builder
            .add_field(simple_field(&values, &prod_vals, &repr_vals))
            .unwrap();
        builder.finalize().unwrap();

        assert_eq!(
            builder
                .add_field(simple_field(&values, &prod_vals, &repr_vals))
                .unwrap_err(),
            GribError::BuildError(BuildError::AlreadyComplete)
        );
        assert_eq!(
            builder.finalize().unwrap_err(),
            GribError::BuildError(BuildError::AlreadyComplete)
        );
    }

    #[test]
    fn local_use_after_grid_is_rejected() {
        let mut builder = MessageBuilder::create(0, &identification());
        builder.add_grid(0, &latlon_grid_vals(2, 2), 4).unwrap();
        assert_eq!(
            builder.add_local_use(b"x").unwrap_err(),
            GribError::BuildError(BuildError::BadPredecessorSection(3))
        );
    }

    #[test]
    fn field_before_grid_is_rejected() {
        let values = [0.0f64; 4];
        let prod_vals = vec![0i64; 15];
        let repr_vals = vec![0i64, 0, 0, 8, 0];
        let mut builder = MessageBuilder::create(0, &identification());
        assert_eq!(
            builder
                .add_field(simple_field(&values, &prod_vals, &repr_vals))
                .unwrap_err(),
            GribError::BuildError(BuildError::MissingGridDefinition)
        );
    }

    #[test]
    fn finalize_without_a_field_is_rejected() {
        let mut builder = MessageBuilder::create(0, &identification());
        builder.add_grid(0, &latlon_grid_vals(2, 2), 4).unwrap();
        assert_eq!(
            builder.finalize().unwrap_err(),
            GribError::BuildError(BuildError::BadPredecessorSection(3))
        );
    }

    #[test]
    fn bitmap_reuse_without_antecedent_is_rejected() {
        let values = [0.0f64; 4];
        let prod_vals = vec![0i64; 15];
        let repr_vals = vec![0i64, 0, 0, 8, 0];
        let mut builder = MessageBuilder::create(0, &identification());
        builder.add_grid(0, &latlon_grid_vals(2, 2), 4).unwrap();
        let mut field = simple_field(&values, &prod_vals, &repr_vals);
        field.bitmap = BitmapSpec::Reuse;
        assert_eq!(
            builder.add_field(field).unwrap_err(),
            GribError::BuildError(BuildError::MissingPriorBitmap)
        );
    }

    #[test]
    fn spectral_packing_requires_a_spectral_grid() {
        let values = [0.0f64; 4];
        let prod_vals = vec![0i64; 15];
        let repr_vals = vec![0i64; 17];
        let mut builder = MessageBuilder::create(0, &identification());
        builder.add_grid(0, &latlon_grid_vals(2, 2), 4).unwrap();
        let mut field = simple_field(&values, &prod_vals, &repr_vals);
        field.repr_tmpl_num = 51;
        assert_eq!(
            builder.add_field(field).unwrap_err(),
            GribError::BuildError(BuildError::SphericalHarmonicGdtRequired)
        );
    }

    #[test]
    fn bitmap_length_must_cover_the_grid() {
        let values = [0.0f64; 4];
        let prod_vals = vec![0i64; 15];
        let repr_vals = vec![0i64, 0, 0, 8, 0];
        let flags = [true; 3];
        let mut builder = MessageBuilder::create(0, &identification());
        builder.add_grid(0, &latlon_grid_vals(2, 2), 4).unwrap();
        let mut field = simple_field(&values, &prod_vals, &repr_vals);
        field.bitmap = BitmapSpec::Bitmap(&flags);
        assert_eq!(
            builder.add_field(field).unwrap_err(),
            GribError::BuildError(BuildError::BitmapLengthMismatch)
        );
    }

    #[test]
    fn failed_field_leaves_the_buffer_untouched() {
        let values = [0.0f64; 4];
        let prod_vals = vec![0i64; 15];
        let repr_vals = vec![0i64, 0, 0, 8, 0];
        let mut builder = MessageBuilder::create(0, &identification());
        builder.add_grid(0, &latlon_grid_vals(2, 2), 4).unwrap();
        let len_before = builder.as_bytes().len();

        let mut field = simple_field(&values, &prod_vals, &repr_vals);
        field.prod_tmpl_num = 250; // not registered
        assert!(builder.add_field(field).is_err());
        assert_eq!(builder.as_bytes().len(), len_before);
    }

    #[test]
    fn section_lengths_always_sum_to_the_buffer_length() {
        let values: Vec<f64> = (0..4).map(f64::from).collect();
        let prod_vals = vec![0i64; 15];
        let repr_vals = vec![0i64, 0, 0, 8, 0];
        let mut builder = MessageBuilder::create(0, &identification());

        let check = |b: &MessageBuilder| {
            let total = u64::from_be_bytes(b.as_bytes()[8..16].try_into().unwrap());
            assert_eq!(total as usize, b.as_bytes().len());
        };
        check(&builder);
        builder.add_grid(0, &latlon_grid_vals(2, 2), 4).unwrap();
        check(&builder);
        builder
            .add_field(simple_field(&values, &prod_vals, &repr_vals))
            .unwrap();
        check(&builder);
    }
}
