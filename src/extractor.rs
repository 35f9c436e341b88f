//! Walking an assembled message and extracting decoded fields.

use std::io::{Read, Seek};

use crate::datatypes::{GribField, Identification};
use crate::error::{GribError, ParseError};
use crate::helpers::read_as;
use crate::ieee::be_bytes_to_floats;
use crate::index::IndexRecord;
use crate::packers::{self, bitmap, DecodeError};
use crate::reader::{MessageSections, RawSection, SeekableGrib2Reader};
use crate::search::FieldQuery;
use crate::tmpl;

const BITMAP_PRESENT: u8 = 0;
const BITMAP_PREDEFINED: u8 = 254;
const BITMAP_ABSENT: u8 = 255;

/// Extracts the first field of `buf` that survives `skip` and matches
/// `query`. Grid points masked out by a bit map receive `missing`.
///
/// `skip` counts fields from the start of the message, matching or
/// not, so iterating `skip = 0, 1, 2, ...` with an all-wildcard query
/// visits every field in on-file order.
pub fn extract_field(
    buf: &[u8],
    skip: usize,
    query: &FieldQuery,
    missing: f64,
) -> Result<GribField, GribError> {
    let mut sections = MessageSections::new(buf)?;

    let sect0 = next_section(&mut sections, buf.len())?;
    let discipline = sect0.bytes[6];

    let sect1 = next_section(&mut sections, buf.len())?;
    if sect1.num != 1 {
        return Err(ParseError::InvalidSectionOrder(sect1.offset).into());
    }
    let identification = Identification::from_payload(sect1.body())?;

    let mut grid: Option<(u16, Vec<i64>, usize)> = None;
    let mut prior_bitmap: Option<Vec<u8>> = None;
    let mut field_index = 0usize;

    loop {
        let sect = next_section(&mut sections, buf.len())?;
        match sect.num {
            2 => continue,
            3 => {
                let body = sect.body();
                if body.len() < 9 {
                    return Err(ParseError::UnexpectedEndOfData(sect.offset).into());
                }
                let num_points = read_as!(u32, body, 1) as usize;
                let tmpl_num = read_as!(u16, body, 7);
                let def = tmpl::grid_template(tmpl_num)?;
                let mut pos = 9;
                let vals = tmpl::decode_template(def, 3, body, &mut pos)?;
                grid = Some((tmpl_num, vals, num_points));
            }
            4 => {
                let (grid_tmpl_num, grid_vals, num_points) = match &grid {
                    Some((num, vals, points)) => (*num, vals.clone(), *points),
                    None => return Err(ParseError::NoGridDefinition(sect.offset).into()),
                };

                let (prod_tmpl_num, prod_vals, coordinates) = decode_sect4(&sect)?;
                let sect5 = expect_section(&mut sections, 5, buf.len())?;
                let (repr_tmpl_num, repr_vals, num_packed) = decode_sect5(&sect5)?;
                let sect6 = expect_section(&mut sections, 6, buf.len())?;
                let sect7 = expect_section(&mut sections, 7, buf.len())?;

                if sect6.body().is_empty() {
                    return Err(ParseError::UnexpectedEndOfData(sect6.offset).into());
                }
                let indicator = sect6.body()[0];
                let field_bitmap = match indicator {
                    BITMAP_PRESENT => {
                        let bits = sect6.body()[1..].to_vec();
                        prior_bitmap = Some(bits.clone());
                        Some(bits)
                    }
                    BITMAP_PREDEFINED => Some(
                        prior_bitmap
                            .clone()
                            .ok_or(DecodeError::MissingPriorBitmap)?,
                    ),
                    BITMAP_ABSENT => None,
                    _ => return Err(DecodeError::BitMapIndicatorUnsupported(indicator).into()),
                };

                if field_index < skip {
                    field_index += 1;
                    continue;
                }
                field_index += 1;

                let matched = query.matches_discipline(discipline)
                    && query.matches_identification(&identification)
                    && query.matches_product(prod_tmpl_num, &prod_vals)
                    && query.matches_grid(grid_tmpl_num, &grid_vals);
                if !matched {
                    continue;
                }

                if let Some(bits) = &field_bitmap {
                    if bits.len() * 8 < num_points {
                        return Err(DecodeError::LengthMismatch.into());
                    }
                    if bitmap::count_present(bits, num_points) != num_packed {
                        return Err(DecodeError::LengthMismatch.into());
                    }
                }

                let packed_values =
                    packers::unpack(repr_tmpl_num, &repr_vals, sect7.body(), num_packed)?;

                let values = match &field_bitmap {
                    Some(bits) => bitmap::BitmapExpandIterator::new(
                        bits,
                        packed_values.into_iter(),
                        missing,
                        num_points,
                    )
                    .collect(),
                    None => packed_values,
                };

                return Ok(GribField {
                    discipline,
                    identification,
                    grid_tmpl_num,
                    grid_vals,
                    num_points,
                    prod_tmpl_num,
                    prod_vals,
                    coordinates,
                    repr_tmpl_num,
                    repr_vals,
                    num_packed_points: num_packed,
                    bitmap_indicator: indicator,
                    bitmap: field_bitmap,
                    values,
                });
            }
            8 => return Err(GribError::NotFound),
            5 | 6 | 7 => return Err(ParseError::InvalidSectionOrder(sect.offset).into()),
            n => return Err(ParseError::UnknownSectionNumber(n).into()),
        }
    }
}

/// Counts the fields (Section 4 occurrences) of one message.
pub fn count_fields(buf: &[u8]) -> Result<usize, GribError> {
    let sections = MessageSections::new(buf)?;
    let mut count = 0;
    for sect in sections {
        if sect?.num == 4 {
            count += 1;
        }
    }
    Ok(count)
}

/// Extracts the field an index record points at, seeking through the
/// original data source.
pub fn extract_indexed<R: Read + Seek>(
    reader: &mut SeekableGrib2Reader<R>,
    record: &IndexRecord,
    missing: f64,
) -> Result<GribField, GribError> {
    let location = crate::reader::MessageLocation {
        offset: record.msg_offset,
        total_length: record.total_msg_length,
        discipline: record.discipline,
    };
    let buf = reader.read_message_bytes(&location)?;
    extract_field(
        &buf,
        record.field_seq as usize,
        &FieldQuery::any(),
        missing,
    )
}

fn decode_sect4(sect: &RawSection) -> Result<(u16, Vec<i64>, Vec<f64>), GribError> {
    let body = sect.body();
    if body.len() < 4 {
        return Err(ParseError::UnexpectedEndOfData(sect.offset).into());
    }
    let num_coordinates = read_as!(u16, body, 0) as usize;
    let tmpl_num = read_as!(u16, body, 2);
    let def = tmpl::product_template(tmpl_num)?;
    let mut pos = 4;
    let vals = tmpl::decode_template(def, 4, body, &mut pos)?;
    if body.len() < pos + num_coordinates * 4 {
        return Err(ParseError::UnexpectedEndOfData(sect.offset).into());
    }
    let coordinates = be_bytes_to_floats(&body[pos..pos + num_coordinates * 4]);
    Ok((tmpl_num, vals, coordinates))
}

fn decode_sect5(sect: &RawSection) -> Result<(u16, Vec<i64>, usize), GribError> {
    let body = sect.body();
    if body.len() < 6 {
        return Err(ParseError::UnexpectedEndOfData(sect.offset).into());
    }
    let num_packed = read_as!(u32, body, 0) as usize;
    let tmpl_num = read_as!(u16, body, 4);
    let def = tmpl::repr_template(tmpl_num)?;
    let mut pos = 6;
    let vals = tmpl::decode_template(def, 5, body, &mut pos)?;
    Ok((tmpl_num, vals, num_packed))
}

fn next_section<'a>(
    sections: &mut MessageSections<'a>,
    end: usize,
) -> Result<RawSection<'a>, GribError> {
    match sections.next() {
        Some(result) => Ok(result?),
        None => Err(ParseError::UnexpectedEndOfData(end).into()),
    }
}

fn expect_section<'a>(
    sections: &mut MessageSections<'a>,
    num: u8,
    end: usize,
) -> Result<RawSection<'a>, GribError> {
    let sect = next_section(sections, end)?;
    if sect.num != num {
        return Err(ParseError::InvalidSectionOrder(sect.offset).into());
    }
    Ok(sect)
}
