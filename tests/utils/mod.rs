#![allow(dead_code)]

use chrono::{TimeZone, Utc};

use gribforge::{BitmapSpec, FieldDef, Identification, MessageBuilder};

pub fn identification() -> Identification {
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

pub fn latlon_grid_vals(ni: i64, nj: i64) -> Vec<i64> {
    let mut vals = vec![0i64; 19];
    vals[7] = ni;
    vals[8] = nj;
    vals
}

/// Product template 4.0 values with the given parameter category and
/// number.
pub fn prod_vals(category: i64, number: i64) -> Vec<i64> {
    let mut vals = vec![0i64; 15];
    vals[0] = category;
    vals[1] = number;
    vals
}

/// One-field message with simple packing and no bit map.
pub fn simple_message(discipline: u8, category: i64, number: i64, values: &[f64]) -> Vec<u8> {
    let mut builder = MessageBuilder::create(discipline, &identification());
    builder
        .add_grid(0, &latlon_grid_vals(values.len() as i64, 1), values.len() as u32)
        .unwrap();
    builder
        .add_field(FieldDef {
            prod_tmpl_num: 0,
            prod_vals: &prod_vals(category, number),
            coordinates: &[],
            repr_tmpl_num: 0,
            repr_vals: &[0, 0, 0, 0, 0],
            bitmap: BitmapSpec::None,
            values,
        })
        .unwrap();
    builder.finalize().unwrap();
    builder.into_bytes()
}
