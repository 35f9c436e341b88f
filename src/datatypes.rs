use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use std::fmt::{self, Display, Formatter};

use crate::error::ParseError;
use crate::helpers::read_as;

/// Identification record carried in Section 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identification {
    /// Identification of originating/generating centre (see Common Code Table C-1)
    pub centre_id: u16,
    /// Identification of originating/generating sub-centre (allocated by
    /// originating/generating centre)
    pub subcentre_id: u16,
    /// GRIB Master Tables Version Number (see Code Table 1.0)
    pub master_table_version: u8,
    /// GRIB Local Tables Version Number (see Code Table 1.1)
    pub local_table_version: u8,
    /// Significance of Reference Time (see Code Table 1.2)
    pub ref_time_significance: u8,
    /// Reference time of data
    pub ref_time: DateTime<Utc>,
    /// Production status of processed data in this GRIB message
    /// (see Code Table 1.3)
    pub prod_status: u8,
    /// Type of processed data in this GRIB message (see Code Table 1.4)
    pub data_type: u8,
}

impl Identification {
    /// Section 1 body size in octets (octets 6-21).
    pub(crate) const BODY_SIZE: usize = 16;

    pub(crate) fn from_payload(buf: &[u8]) -> Result<Self, ParseError> {
        if buf.len() < Self::BODY_SIZE {
            return Err(ParseError::UnexpectedEndOfData(buf.len()));
        }
        let ref_time = Utc
            .with_ymd_and_hms(
                i32::from(read_as!(u16, buf, 7)),
                u32::from(buf[9]),
                u32::from(buf[10]),
                u32::from(buf[11]),
                u32::from(buf[12]),
                u32::from(buf[13]),
            )
            .single()
            .ok_or(ParseError::ReadError(
                "invalid reference time in Section 1".to_owned(),
            ))?;
        Ok(Self {
            centre_id: read_as!(u16, buf, 0),
            subcentre_id: read_as!(u16, buf, 2),
            master_table_version: buf[4],
            local_table_version: buf[5],
            ref_time_significance: buf[6],
            ref_time,
            prod_status: buf[14],
            data_type: buf[15],
        })
    }

    pub(crate) fn write_payload(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.centre_id.to_be_bytes());
        buf.extend_from_slice(&self.subcentre_id.to_be_bytes());
        buf.push(self.master_table_version);
        buf.push(self.local_table_version);
        buf.push(self.ref_time_significance);
        buf.extend_from_slice(&(self.ref_time.year() as u16).to_be_bytes());
        buf.push(self.ref_time.month() as u8);
        buf.push(self.ref_time.day() as u8);
        buf.push(self.ref_time.hour() as u8);
        buf.push(self.ref_time.minute() as u8);
        buf.push(self.ref_time.second() as u8);
        buf.push(self.prod_status);
        buf.push(self.data_type);
    }

    /// Section 1 identification values in the order they appear on the
    /// wire, for query matching.
    pub(crate) fn query_vals(&self) -> [i64; 13] {
        [
            i64::from(self.centre_id),
            i64::from(self.subcentre_id),
            i64::from(self.master_table_version),
            i64::from(self.local_table_version),
            i64::from(self.ref_time_significance),
            i64::from(self.ref_time.year()),
            i64::from(self.ref_time.month()),
            i64::from(self.ref_time.day()),
            i64::from(self.ref_time.hour()),
            i64::from(self.ref_time.minute()),
            i64::from(self.ref_time.second()),
            i64::from(self.prod_status),
            i64::from(self.data_type),
        ]
    }
}

impl Display for Identification {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "\
Originating/generating centre:          {}
Originating/generating sub-centre:      {}
GRIB Master Tables Version Number:      {}
GRIB Local Tables Version Number:       {}
Significance of Reference Time:         {}
Reference time of data:                 {}
Production status of processed data:    {}
Type of processed data:                 {}\
",
            self.centre_id,
            self.subcentre_id,
            self.master_table_version,
            self.local_table_version,
            self.ref_time_significance,
            self.ref_time,
            self.prod_status,
            self.data_type
        )
    }
}

/// A single decoded field, owned by the caller after extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct GribField {
    /// Discipline - GRIB Master Table Number (see Code Table 0.0)
    pub discipline: u8,
    pub identification: Identification,
    /// Grid Definition Template Number
    pub grid_tmpl_num: u16,
    pub grid_vals: Vec<i64>,
    /// Number of grid points of the grid definition
    pub num_points: usize,
    /// Product Definition Template Number
    pub prod_tmpl_num: u16,
    pub prod_vals: Vec<i64>,
    /// Optional vertical coordinate value list trailing the product
    /// definition template
    pub coordinates: Vec<f64>,
    /// Data Representation Template Number
    pub repr_tmpl_num: u16,
    pub repr_vals: Vec<i64>,
    /// Number of points actually present in Section 7
    pub num_packed_points: usize,
    /// Bit-map indicator (see Code Table 6.0)
    pub bitmap_indicator: u8,
    /// Bit map, one bit per grid point, MSB first; `None` when the
    /// indicator is 255
    pub bitmap: Option<Vec<u8>>,
    /// Unpacked field values, expanded to `num_points` entries
    pub values: Vec<f64>,
}

impl GribField {
    /// Scanning mode flags from the grid definition template, for the
    /// templates that carry them.
    pub fn scan_mode(&self) -> Option<u8> {
        let pos = scan_mode_pos(self.grid_tmpl_num)?;
        self.grid_vals.get(pos).map(|v| *v as u8)
    }

    /// Shape of the grid as (Ni, Nj), for the grid templates with
    /// regular rows.
    pub fn grid_shape(&self) -> Option<(usize, usize)> {
        grid_shape(self.grid_tmpl_num, &self.grid_vals)
    }
}

/// Position of the scanning mode octet within a grid template.
pub(crate) fn scan_mode_pos(grid_tmpl_num: u16) -> Option<usize> {
    match grid_tmpl_num {
        0 | 1 | 2 | 3 | 40 | 41 | 204 | 32768 | 32769 => Some(18),
        10 => Some(15),
        20 | 30 | 31 => Some(17),
        90 => Some(16),
        110 => Some(15),
        _ => None,
    }
}

/// (Ni, Nj) of a grid template with a rectangular point layout.
pub(crate) fn grid_shape(grid_tmpl_num: u16, grid_vals: &[i64]) -> Option<(usize, usize)> {
    match grid_tmpl_num {
        0 | 1 | 2 | 3 | 10 | 20 | 30 | 31 | 40 | 41 | 90 | 110 | 204 | 32768 | 32769 => {
            match (grid_vals.get(7), grid_vals.get(8)) {
                (Some(ni), Some(nj)) => Some((*ni as usize, *nj as usize)),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Triangular truncation (J, K, M) of grid template 3.50.
pub(crate) fn spectral_truncation(
    grid_tmpl_num: u16,
    grid_vals: &[i64],
) -> Option<(i64, i64, i64)> {
    if grid_tmpl_num != 50 {
        return None;
    }
    match (grid_vals.first(), grid_vals.get(1), grid_vals.get(2)) {
        (Some(j), Some(k), Some(m)) => Some((*j, *k, *m)),
        _ => None,
    }
}
